// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Benchmarks for extraction, context building and lexical retrieval.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use tracelint::context::build_context;
use tracelint::extract::{extract, SourceUnit};
use tracelint::lang::{Language, ProfileRegistry};
use tracelint::rag::{KnowledgeCorpus, LexicalRetriever, RetrievalOracle};
use tracelint::report::{reduce, Finding, Location, RuleCategory};

/// Sample Go handler with nested spans, attributes and error recording.
const SAMPLE_GO: &str = r#"
package users

func HandleGetUser(w http.ResponseWriter, r *http.Request) {
	ctx, span := tracer.Start(r.Context(), "GET /users/{id}", trace.WithSpanKind(trace.SpanKindServer))
	defer span.End()
	id := r.URL.Query().Get("id")
	span.SetAttributes(attribute.String("user.id", id), attribute.String("userId", id))
	user, err := loadUser(ctx, id)
	if err != nil {
		span.RecordError(err)
		http.Error(w, err.Error(), 500)
		return
	}
	json.NewEncoder(w).Encode(user)
}

func loadUser(ctx context.Context, id string) (*User, error) {
	ctx, span := tracer.Start(ctx, "loadUser")
	defer span.End()
	for _, shard := range shards {
		_, child := tracer.Start(ctx, fmt.Sprintf("query shard %d", shard))
		child.End()
	}
	u, err := repo.Find(ctx, id)
	if err != nil {
		span.RecordError(err)
		return nil, err
	}
	return u, nil
}
"#;

/// Sample Python worker.
const SAMPLE_PY: &str = r#"
@app.route("/orders/<order_id>")
def get_order(order_id):
    with tracer.start_as_current_span("GET /orders/{id}") as span:
        span.set_attribute("order.id", order_id)
        for item in load_items(order_id):
            with tracer.start_as_current_span(f"item {item.id}"):
                process(item)
        try:
            return fetch(order_id)
        except Exception as e:
            span.record_exception(e)
            raise
"#;

fn repeated(sample: &str, times: usize) -> String {
    sample.repeat(times)
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");
    for (language, sample) in [(Language::Go, SAMPLE_GO), (Language::Python, SAMPLE_PY)] {
        let profile = ProfileRegistry::global().get(language).unwrap();
        for times in [1, 20] {
            let text = repeated(sample, times);
            group.throughput(Throughput::Bytes(text.len() as u64));
            let unit = SourceUnit::new("bench", language, text);
            group.bench_with_input(
                BenchmarkId::new(language.as_str(), times),
                &unit,
                |b, unit| b.iter(|| black_box(extract(black_box(unit), profile))),
            );
        }
    }
    group.finish();
}

fn bench_build_context(c: &mut Criterion) {
    let profile = ProfileRegistry::global().get(Language::Go).unwrap();
    let unit = SourceUnit::new("bench.go", Language::Go, repeated(SAMPLE_GO, 20));
    let extraction = extract(&unit, profile);

    c.bench_function("build_context_go_x20", |b| {
        b.iter(|| black_box(build_context(&unit, &extraction, profile, &[])))
    });
}

fn bench_lexical_query(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let retriever = LexicalRetriever::new(Arc::new(KnowledgeCorpus::builtin()));

    c.bench_function("lexical_query", |b| {
        b.to_async(&runtime).iter(|| async {
            black_box(
                retriever
                    .query("span name camelCase function name low cardinality", 3)
                    .await
                    .unwrap(),
            )
        })
    });
}

fn bench_reduce(c: &mut Criterion) {
    let findings: Vec<Finding> = (0..500)
        .map(|i| {
            let location = Location {
                line: i / 3 + 1,
                column: 1,
                offset: (i / 3) * 40,
            };
            let category = if i % 2 == 0 {
                RuleCategory::NamingConvention
            } else {
                RuleCategory::BoundaryViolation
            };
            Finding::new("bench.go", "go", location, category, format!("finding {i}"))
                .with_confidence(0.5)
        })
        .collect();

    c.bench_function("reduce_500", |b| b.iter(|| black_box(reduce(findings.clone()))));
}

criterion_group!(
    benches,
    bench_extract,
    bench_build_context,
    bench_lexical_query,
    bench_reduce
);
criterion_main!(benches);
