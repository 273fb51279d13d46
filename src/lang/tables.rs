// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Built-in language tables.
//!
//! Receiver groups (`receiver`, `handle`) let the extractor drop look-alike
//! calls on non-span objects, such as `res.end()` or DOM `setAttribute`.

use super::profile::{
    BlockStyle, CallShape, CommentSyntax, ConstructKind::*, EntryKind, EntryShape,
    LanguageProfile, ScopeStyle,
};
use super::Language;

const C_COMMENTS: CommentSyntax = CommentSyntax {
    line: &["//"],
    block: Some(("/*", "*/")),
};

// ============================================================================
// Go
// ============================================================================

static GO: LanguageProfile = LanguageProfile {
    language: Language::Go,
    comments: C_COMMENTS,
    strings: &["`", "\"", "'"],
    block_style: BlockStyle::Braces,
    call_shapes: &[
        CallShape::named(
            SpanStart,
            r"(?:\b\w+\s*,\s*)?(?:\b(?P<handle>\w+)\s*:?=\s*)?\b\w*[tT]racer\w*(?:\([^()]*\))?\.Start\(",
            1,
        ),
        CallShape::bare(SpanEnd, r"(?P<deferred>\bdefer\s+)?\b(?P<handle>\w+)\.End\("),
        CallShape::named(
            AttributeSet,
            r"\battribute\.(?:String|Int|Int64|Float64|Bool|StringSlice|IntSlice|Int64Slice|Float64Slice|BoolSlice|Key)\(",
            0,
        ),
        CallShape::named(EventAdd, r"\b(?P<receiver>\w+)\.AddEvent\(", 0),
        CallShape::named(ErrorRecord, r"\b(?P<receiver>\w+)\.RecordError\(", 0),
        CallShape::named(StatusSet, r"\b(?P<receiver>\w+)\.SetStatus\(", 0),
        CallShape::named(
            MetricInstrument,
            r"\b\w+\.(?:Int64|Float64)(?:Counter|UpDownCounter|Histogram|Gauge|ObservableCounter|ObservableUpDownCounter|ObservableGauge)\(",
            0,
        ),
    ],
    functions: &[
        r"^func\s+(?:\([^)]*\)\s*)?(?P<name>\w+)\s*(?:\[[^\]]*\])?\s*\((?P<params>[^)]*)\)",
        r"\bfunc\s*\((?P<params>[^)]*)\)",
    ],
    loops: &[r"^for\b"],
    control_keywords: &["if", "for", "switch", "select", "go", "defer", "return"],
    entry_shapes: &[
        EntryShape {
            kind: EntryKind::Http,
            pattern: r"http\.ResponseWriter|\*http\.Request\b|\*gin\.Context\b|\becho\.Context\b|\*fiber\.Ctx\b",
        },
        EntryShape {
            kind: EntryKind::Rpc,
            pattern: r"context\.Context\s*,\s*\w+\s+\*(?:\w+\.)?\w+(?:Request|Req)\b|\bgrpc\.ServerStream\b|\w+_\w+Server\b",
        },
        EntryShape {
            kind: EntryKind::Consumer,
            pattern: r"sarama\.ConsumerGroupSession|\*kafka\.Message\b|\bamqp\.Delivery\b|\*sqs\.Message\b|\*pubsub\.Message\b|\bevents\.SQSEvent\b",
        },
    ],
    entry_functions: &["main", "ServeHTTP", "Handle", "HandleMessage", "ConsumeClaim"],
    error_propagation: &[r"\breturn\b[^\n;]*\b{err}\b", r"\bpanic\(\s*{err}\b"],
    exits: &[r"\breturn\b", r"\bpanic\("],
    exit_guards: &[],
};

// ============================================================================
// Python
// ============================================================================

static PYTHON: LanguageProfile = LanguageProfile {
    language: Language::Python,
    comments: CommentSyntax {
        line: &["#"],
        block: None,
    },
    strings: &["\"\"\"", "'''", "\"", "'"],
    block_style: BlockStyle::Indentation,
    call_shapes: &[
        CallShape::scoped(
            r"\bwith\s+(?:[\w.]+\.)?start_as_current_span\(",
            0,
            ScopeStyle::Block,
        ),
        CallShape::scoped(r"\bwith\s+(?:[\w.]+\.)?start_span\(", 0, ScopeStyle::Block),
        CallShape::scoped(r"@(?:[\w.]+\.)?start_as_current_span\(", 0, ScopeStyle::Block),
        CallShape::named(
            SpanStart,
            r"(?:\b(?P<handle>\w+)\s*=\s*)?(?:[\w.]+\.)?start_span\(",
            0,
        ),
        CallShape::bare(SpanEnd, r"\b(?P<handle>\w+)\.end\(\s*\)"),
        CallShape::named(
            AttributeSet,
            r"(?P<receiver>[\w.]+(?:\(\))?)\.set_attribute\(",
            0,
        ),
        CallShape::named(EventAdd, r"(?P<receiver>[\w.]+(?:\(\))?)\.add_event\(", 0),
        CallShape::named(
            ErrorRecord,
            r"(?P<receiver>[\w.]+(?:\(\))?)\.record_exception\(",
            0,
        ),
        CallShape::named(StatusSet, r"(?P<receiver>[\w.]+(?:\(\))?)\.set_status\(", 0),
        CallShape::named(
            MetricInstrument,
            r"\b\w+\.create_(?:counter|up_down_counter|histogram|gauge|observable_counter|observable_up_down_counter|observable_gauge)\(",
            0,
        ),
    ],
    functions: &[r"^(?:async\s+)?def\s+(?P<name>\w+)\s*\((?P<params>.*)\)\s*(?:->.*)?$"],
    loops: &[r"^(?:async\s+)?(?:for|while)\b"],
    control_keywords: &["if", "elif", "else", "for", "while", "with", "try", "except", "finally"],
    entry_shapes: &[
        EntryShape {
            kind: EntryKind::Rpc,
            pattern: r"\brequest\s*,\s*context\b|\bcontext\s*:\s*grpc\b|\bgrpc\.ServicerContext\b",
        },
        EntryShape {
            kind: EntryKind::Http,
            pattern: r"@\w+\.(?:route|get|post|put|delete|patch|api_route|websocket)\(|\brequest\s*(?::\s*\w*Request\b|[,)])|\bHttpRequest\b",
        },
        EntryShape {
            kind: EntryKind::Consumer,
            pattern: r"@\w+\.(?:task|subscriber|consumer|agent)\b|\b(?:event|message|msg|record)\s*,\s*context\b|\bConsumerRecord\b",
        },
    ],
    entry_functions: &["main", "handler", "lambda_handler"],
    error_propagation: &[r"\braise\b"],
    exits: &[r"\breturn\b", r"\braise\b"],
    exit_guards: &[r"\bfinally\s*:"],
};

// ============================================================================
// JavaScript / TypeScript
// ============================================================================

const JAVASCRIPT_TABLE: LanguageProfile = LanguageProfile {
    language: Language::JavaScript,
    comments: C_COMMENTS,
    strings: &["`", "\"", "'"],
    block_style: BlockStyle::Braces,
    call_shapes: &[
        CallShape::named(
            SpanStart,
            r"(?:\b(?:const|let|var)\s+)?(?:\b(?P<handle>\w+)\s*=\s*)?(?:[\w.]+\.)?startSpan\(",
            0,
        ),
        CallShape::scoped(r"(?:[\w.]+\.)?startActiveSpan\(", 0, ScopeStyle::Call),
        CallShape::bare(SpanEnd, r"\b(?P<handle>\w+)\??\.end\(\s*\)"),
        CallShape::named(
            AttributeSet,
            r"(?:(?P<receiver>[\w.]+(?:\(\))?)\s*)?\??\.setAttribute\(",
            0,
        ),
        CallShape::named(
            EventAdd,
            r"(?:(?P<receiver>[\w.]+(?:\(\))?)\s*)?\??\.addEvent\(",
            0,
        ),
        CallShape::named(
            ErrorRecord,
            r"(?:(?P<receiver>[\w.]+(?:\(\))?)\s*)?\??\.recordException\(",
            0,
        ),
        CallShape::named(
            StatusSet,
            r"(?:(?P<receiver>[\w.]+(?:\(\))?)\s*)?\??\.setStatus\(",
            0,
        ),
        CallShape::named(
            MetricInstrument,
            r"\b\w+\.create(?:Counter|UpDownCounter|Histogram|Gauge|ObservableCounter|ObservableUpDownCounter|ObservableGauge)\(",
            0,
        ),
    ],
    functions: &[
        r"^(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*(?P<name>\w*)\s*\((?P<params>[^)]*)\)",
        r"^(?:export\s+)?(?:const|let|var)\s+(?P<name>\w+)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:function\s*\w*\s*)?\((?P<params>[^)]*)\)",
        r"^(?:export\s+)?(?:const|let|var)\s+(?P<name>\w+)\s*=\s*(?:async\s+)?(?P<params>\w+)\s*=>",
        r"^(?:(?:public|private|protected|static|async|override|readonly|get|set)\s+)*(?P<name>\w+)\s*\((?P<params>[^)]*)\)\s*(?::\s*[^=]+)?$",
        r"\bfunction\s*\*?\s*(?P<name>\w*)\s*\((?P<params>[^)]*)\)\s*$",
        r"(?:async\s+)?\((?P<params>[^)]*)\)\s*(?::\s*[\w<>\[\]|, ]+)?\s*=>\s*$",
        r"(?:async\s+)?\b(?P<params>\w+)\s*=>\s*$",
    ],
    loops: &[r"^(?:for|while|do)\b", r"\.(?:forEach|map|flatMap)\s*\("],
    control_keywords: &[
        "if", "for", "while", "switch", "catch", "function", "return", "with", "do", "else",
        "try", "finally",
    ],
    entry_shapes: &[
        EntryShape {
            kind: EntryKind::Http,
            pattern: r"\(\s*req\s*,\s*res\b|\b(?:req|request)\s*:\s*(?:Request|FastifyRequest|NextRequest|NextApiRequest|IncomingMessage)\b|^(?:app|router|server|fastify)\.(?:get|post|put|delete|patch|all|route)\(",
        },
        EntryShape {
            kind: EntryKind::Rpc,
            pattern: r"\bcall\s*,\s*callback\b|\bServerUnaryCall\b",
        },
        EntryShape {
            kind: EntryKind::Consumer,
            pattern: r"\beachMessage\b|\beachBatch\b|\bevent\s*,\s*context\b|\bSQSEvent\b|\bmessage\s*:\s*(?:Message|ConsumeMessage)\b",
        },
    ],
    entry_functions: &["handler", "main"],
    error_propagation: &[r"\bthrow\b", r"\bPromise\.reject\(", r"\breject\(\s*{err}\b"],
    exits: &[r"\breturn\b", r"\bthrow\b"],
    exit_guards: &[r"\bfinally\b"],
};

static JAVASCRIPT: LanguageProfile = JAVASCRIPT_TABLE;

static TYPESCRIPT: LanguageProfile = LanguageProfile {
    language: Language::TypeScript,
    ..JAVASCRIPT_TABLE
};

// ============================================================================
// Java (also Kotlin and Scala)
// ============================================================================

static JAVA: LanguageProfile = LanguageProfile {
    language: Language::Java,
    comments: C_COMMENTS,
    strings: &["\"\"\"", "\"", "'"],
    block_style: BlockStyle::Braces,
    call_shapes: &[
        CallShape::named(
            SpanStart,
            r"(?:\bSpan\s+)?(?:\b(?P<handle>\w+)\s*=\s*)?(?:[\w.]+\.)?spanBuilder\(",
            0,
        ),
        CallShape::bare(SpanEnd, r"\b(?P<handle>\w+)\.end\(\s*\)"),
        CallShape::named(
            AttributeSet,
            r"(?:(?P<receiver>[\w.]+(?:\(\))?)\s*)?\.setAttribute\(\s*(?:AttributeKey\.\w+\(\s*)?",
            0,
        ),
        CallShape::named(EventAdd, r"(?:(?P<receiver>[\w.]+(?:\(\))?)\s*)?\.addEvent\(", 0),
        CallShape::named(
            ErrorRecord,
            r"(?:(?P<receiver>[\w.]+(?:\(\))?)\s*)?\.recordException\(",
            0,
        ),
        CallShape::named(StatusSet, r"(?:(?P<receiver>[\w.]+(?:\(\))?)\s*)?\.setStatus\(", 0),
        CallShape::named(
            MetricInstrument,
            r"\b\w+\.(?:counterBuilder|upDownCounterBuilder|histogramBuilder|gaugeBuilder)\(",
            0,
        ),
    ],
    functions: &[
        r"^(?:@\w+(?:\([^)]*\))?\s+)*(?:(?:public|private|protected|static|final|synchronized|abstract|native|default|override|open|suspend|internal|fun)\s+)*(?:<[^>]+>\s+)?(?:[\w.<>\[\],?]+\s+)?(?P<name>\w+)\s*\((?P<params>[^)]*)\)\s*(?::\s*[\w.<>?]+\s*)?(?:throws\s+[\w.,\s]+)?$",
    ],
    loops: &[r"^(?:for|while|do)\b", r"\.forEach\s*\("],
    control_keywords: &[
        "if", "for", "while", "switch", "catch", "synchronized", "try", "else", "return", "new",
        "do", "when",
    ],
    entry_shapes: &[
        EntryShape {
            kind: EntryKind::Http,
            pattern: r"@(?:Get|Post|Put|Delete|Patch|Request)Mapping\b|\bHttpServletRequest\b|@(?:GET|POST|PUT|DELETE|PATCH|Path)\b|\bServerRequest\b|\bHttpExchange\b",
        },
        EntryShape {
            kind: EntryKind::Rpc,
            pattern: r"\bStreamObserver<",
        },
        EntryShape {
            kind: EntryKind::Consumer,
            pattern: r"@(?:KafkaListener|RabbitListener|JmsListener|SqsListener|StreamListener)\b|\bConsumerRecords?<|\bSQSEvent\b",
        },
    ],
    entry_functions: &["main", "doGet", "doPost", "service", "handleRequest"],
    error_propagation: &[r"\bthrow\b"],
    exits: &[r"\breturn\b", r"\bthrow\b"],
    exit_guards: &[r"\bfinally\b"],
};

// ============================================================================
// C#
// ============================================================================

static CSHARP: LanguageProfile = LanguageProfile {
    language: Language::CSharp,
    comments: C_COMMENTS,
    strings: &["\"\"\"", "\"", "'"],
    block_style: BlockStyle::Braces,
    call_shapes: &[
        CallShape::scoped(
            r"\busing\s+var\s+(?P<handle>\w+)\s*=\s*(?:[\w.]+\.)?StartActivity\(",
            0,
            ScopeStyle::EnclosingBlock,
        ),
        CallShape::scoped(
            r"\busing\s*\(\s*var\s+(?P<handle>\w+)\s*=\s*(?:[\w.]+\.)?StartActivity\(",
            0,
            ScopeStyle::Block,
        ),
        CallShape::named(
            SpanStart,
            r"(?:\b(?:var|Activity\??)\s+)?(?:\b(?P<handle>\w+)\s*=\s*)?(?:[\w.]+\.)?StartActivity\(",
            0,
        ),
        CallShape::bare(SpanEnd, r"\b(?P<handle>\w+)\??\.(?:Stop|Dispose)\(\s*\)"),
        CallShape::named(
            AttributeSet,
            r"(?:(?P<receiver>[\w.]+)\s*)?\??\.(?:SetTag|AddTag)\(",
            0,
        ),
        CallShape::named(
            EventAdd,
            r"(?:(?P<receiver>[\w.]+)\s*)?\??\.AddEvent\(\s*new\s+ActivityEvent\(",
            0,
        ),
        CallShape::named(
            ErrorRecord,
            r"(?:(?P<receiver>[\w.]+)\s*)?\??\.(?:RecordException|AddException)\(",
            0,
        ),
        CallShape::named(StatusSet, r"(?:(?P<receiver>[\w.]+)\s*)?\??\.SetStatus\(", 0),
        CallShape::named(
            MetricInstrument,
            r"\b\w+\.Create(?:Counter|UpDownCounter|Histogram|Gauge|ObservableCounter|ObservableUpDownCounter|ObservableGauge)<[\w?]+>\(",
            0,
        ),
    ],
    functions: &[
        r"^(?:\[[^\]]*\]\s*)*(?:(?:public|private|protected|internal|static|async|override|virtual|sealed|abstract|extern|unsafe|new|partial)\s+)*(?:[\w.<>\[\],?]+\s+)?(?P<name>\w+)\s*(?:<[^>]+>)?\s*\((?P<params>[^)]*)\)\s*(?:where\s+.*)?$",
        r"(?:async\s+)?\((?P<params>[^)]*)\)\s*=>\s*$",
    ],
    loops: &[
        r"^(?:for|foreach|while|do)\b",
        r"\.ForEach\s*\(",
        r"\bParallel\.For(?:Each)?(?:Async)?\s*\(",
    ],
    control_keywords: &[
        "if", "for", "foreach", "while", "switch", "catch", "using", "lock", "fixed", "else",
        "try", "return", "do", "nameof", "typeof", "sizeof", "when",
    ],
    entry_shapes: &[
        EntryShape {
            kind: EntryKind::Http,
            pattern: r"\[Http(?:Get|Post|Put|Delete|Patch)\b|\[Route\(|\bHttpContext\b|\bHttpRequest\b|\bIActionResult\b|\bActionResult<",
        },
        EntryShape {
            kind: EntryKind::Rpc,
            pattern: r"\bServerCallContext\b",
        },
        EntryShape {
            kind: EntryKind::Consumer,
            pattern: r"\bConsumeContext<|\bConsumeResult<|\bProcessMessageEventArgs\b|\bServiceBusReceivedMessage\b|\[(?:ServiceBusTrigger|QueueTrigger|KafkaTrigger)\b",
        },
    ],
    entry_functions: &["Main", "Consume", "Invoke", "InvokeAsync", "ExecuteAsync"],
    error_propagation: &[r"\bthrow\b"],
    exits: &[r"\breturn\b", r"\bthrow\b"],
    exit_guards: &[r"\bfinally\b"],
};

/// The static table for a language.
pub fn profile_for(language: Language) -> &'static LanguageProfile {
    match language {
        Language::Go => &GO,
        Language::Python => &PYTHON,
        Language::JavaScript => &JAVASCRIPT,
        Language::TypeScript => &TYPESCRIPT,
        Language::Java => &JAVA,
        Language::CSharp => &CSHARP,
    }
}
