// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! tracelint main entry point - CLI and commands.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use tracelint::cli::{render_corpus_stats, render_passages, render_report, OutputFormat};
use tracelint::config::{self, CliOptions, ResolvedConfig};
use tracelint::judge::create_judge;
use tracelint::rag::{create_retriever, KnowledgeCorpus};
use tracelint::telemetry::{init_telemetry, TelemetryConfig, Verbosity};
use tracelint::{Analyzer, CancellationFlag, Language, ProgressFn, RunReport, Severity};

/// tracelint version string.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// tracelint - find telemetry instrumentation anti-patterns.
#[derive(Parser)]
#[command(name = "tracelint")]
#[command(author, version, about = "Find telemetry instrumentation anti-patterns", long_about = None)]
struct Cli {
    /// Judge provider
    #[arg(short, long, global = true, env = "TRACELINT_PROVIDER")]
    provider: Option<Provider>,

    /// Judge model
    #[arg(short, long, global = true, env = "TRACELINT_MODEL")]
    model: Option<String>,

    /// Base URL for the judge API
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Rule corpus: a markdown file or a directory of them
    #[arg(short = 'k', long, global = true)]
    knowledge_base: Option<PathBuf>,

    /// Show per-file progress logs
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Show debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Log filter directive, e.g. `tracelint::synth=debug`
    #[arg(long, global = true, env = "TRACELINT_LOG")]
    log_filter: Option<String>,

    /// Print timing and oracle metrics to stderr when done
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Judge providers.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Provider {
    /// Detect from the environment
    Auto,
    /// OpenAI - GPT models
    Openai,
    /// Anthropic - Claude models
    Anthropic,
    /// Ollama - local models
    Ollama,
    /// Built-in heuristics, no network
    Offline,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Auto => write!(f, "auto"),
            Provider::Openai => write!(f, "openai"),
            Provider::Anthropic => write!(f, "anthropic"),
            Provider::Ollama => write!(f, "ollama"),
            Provider::Offline => write!(f, "offline"),
        }
    }
}

/// Options shared by `analyze` and `scan`.
#[derive(clap::Args)]
struct RunArgs {
    /// Free text appended to every rule query
    #[arg(long)]
    focus: Option<String>,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Hide findings below this confidence
    #[arg(short = 't', long)]
    confidence_threshold: Option<f32>,

    /// Use the heuristic judge and lexical retrieval, no network
    #[arg(long)]
    offline: bool,

    /// Exit non-zero when a finding at or above this severity is reported
    #[arg(long)]
    fail_on: Option<Severity>,
}

/// Subcommands for tracelint.
#[derive(Subcommand)]
enum Commands {
    /// Analyze one source file
    Analyze {
        file: PathBuf,

        /// Override language detection
        #[arg(short, long)]
        language: Option<Language>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Analyze every supported file under a directory
    Scan {
        dir: PathBuf,

        /// Only files matching these globs
        #[arg(long = "pattern")]
        patterns: Vec<String>,

        /// Skip files matching these globs
        #[arg(long = "exclude")]
        excludes: Vec<String>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Search the rule corpus
    Ask {
        question: String,

        /// Number of passages to show
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },

    /// Show rule corpus statistics
    Kb,

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Initialize a new configuration file
    Init,

    /// Show version information
    Version,
}

/// Config subcommand actions.
#[derive(Subcommand)]
enum ConfigAction {
    /// Show the resolved configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _telemetry = init_telemetry(&telemetry_config(&cli))?;

    let result = handle_command(&cli).await;

    if cli.metrics {
        print_metrics();
    }
    let failed_on = result?;
    if failed_on {
        std::process::exit(1);
    }
    Ok(())
}

fn telemetry_config(cli: &Cli) -> TelemetryConfig {
    let verbosity = if cli.debug {
        Verbosity::Debug
    } else if cli.verbose {
        Verbosity::Verbose
    } else {
        Verbosity::Quiet
    };
    TelemetryConfig::for_verbosity(verbosity)
        .with_filter(cli.log_filter.as_deref())
        .with_ansi(std::io::stderr().is_terminal())
}

#[cfg(feature = "telemetry")]
fn print_metrics() {
    let snapshot = tracelint::telemetry::GLOBAL_METRICS.snapshot();
    eprintln!("\n{}", snapshot.format_report());
}

#[cfg(not(feature = "telemetry"))]
fn print_metrics() {
    eprintln!("{}", "Metrics are not collected in this build".dimmed());
}

fn base_options(cli: &Cli) -> CliOptions {
    CliOptions {
        provider: cli.provider.map(|p| p.to_string()),
        model: cli.model.clone(),
        base_url: cli.base_url.clone(),
        knowledge_base: cli.knowledge_base.clone(),
        ..Default::default()
    }
}

fn run_options(cli: &Cli, run: &RunArgs) -> CliOptions {
    CliOptions {
        offline: run.offline,
        confidence_threshold: run.confidence_threshold,
        focus: run.focus.clone(),
        ..base_options(cli)
    }
}

fn workspace_root_for(target: &Path) -> anyhow::Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    let absolute = if target.is_absolute() {
        target.to_path_buf()
    } else {
        cwd.join(target)
    };
    Ok(config::find_workspace_root(&absolute).unwrap_or(cwd))
}

/// Returns true when `--fail-on` matched a finding.
async fn handle_command(cli: &Cli) -> anyhow::Result<bool> {
    match &cli.command {
        Commands::Analyze {
            file,
            language,
            run,
        } => {
            let config = config::load_config(&workspace_root_for(file)?, run_options(cli, run))?;
            let analyzer = build_analyzer(&config).await?;
            watch_ctrl_c(analyzer.cancellation());
            let report = analyzer.analyze_file_as(file, *language).await?;
            finish(report, &config, run)
        }
        Commands::Scan {
            dir,
            patterns,
            excludes,
            run,
        } => {
            let options = CliOptions {
                include_patterns: patterns.clone(),
                exclude_patterns: excludes.clone(),
                ..run_options(cli, run)
            };
            let config = config::load_config(&workspace_root_for(dir)?, options)?;
            let analyzer = build_analyzer(&config).await?;
            watch_ctrl_c(analyzer.cancellation());

            let files = analyzer.discover(dir)?;
            let bar = progress_bar(files.len() as u64, run.format);
            let tick = bar.clone();
            let progress: ProgressFn = Arc::new(move |path: &Path| {
                tick.set_message(path.display().to_string());
                tick.inc(1);
            });
            let result = analyzer.analyze_files(files, Some(progress)).await;
            bar.finish_and_clear();
            finish(result?, &config, run)
        }
        Commands::Ask { question, top_k } => {
            let config = config::load_config(&workspace_root_for(Path::new("."))?, base_options(cli))?;
            let corpus = Arc::new(load_corpus(&config)?);
            let retriever = create_retriever(&config.retrieval_config(), corpus).await?;
            let passages = retriever.query(question, *top_k).await?;
            print!("{}", render_passages(&passages));
            Ok(false)
        }
        Commands::Kb => {
            let config = config::load_config(&workspace_root_for(Path::new("."))?, base_options(cli))?;
            let corpus = load_corpus(&config)?;
            print!("{}", render_corpus_stats(&corpus.stats()));
            Ok(false)
        }
        Commands::Config { action } => {
            match action {
                Some(ConfigAction::Show) | None => {
                    let root = workspace_root_for(Path::new("."))?;
                    let config = config::load_config(&root, base_options(cli))?;
                    println!("{}", serde_json::to_string_pretty(&config)?);
                }
            }
            Ok(false)
        }
        Commands::Init => {
            let workspace_root = std::env::current_dir()?;
            let path = config::init_config(&workspace_root, None)?;
            println!("Created config file: {}", path.display());
            Ok(false)
        }
        Commands::Version => {
            println!("tracelint {}", VERSION);
            Ok(false)
        }
    }
}

fn load_corpus(config: &ResolvedConfig) -> anyhow::Result<KnowledgeCorpus> {
    match &config.knowledge_base {
        Some(path) => KnowledgeCorpus::load(path)
            .with_context(|| format!("loading knowledge base {}", path.display())),
        None => Ok(KnowledgeCorpus::builtin()),
    }
}

async fn build_analyzer(config: &ResolvedConfig) -> anyhow::Result<Analyzer> {
    let corpus = Arc::new(load_corpus(config)?);
    let retrieval = create_retriever(&config.retrieval_config(), corpus).await?;
    let judge = create_judge(config).context("creating judge")?;
    tracing::info!(
        retrieval = retrieval.name(),
        judge = judge.name(),
        "Oracles ready"
    );
    Ok(Analyzer::new(config.clone(), retrieval, judge))
}

/// First Ctrl-C stops new oracle calls; in-flight calls finish.
fn watch_ctrl_c(cancel: CancellationFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Cancelling, waiting for in-flight calls...".yellow());
            cancel.cancel();
        }
    });
}

fn progress_bar(len: u64, format: OutputFormat) -> ProgressBar {
    if matches!(format, OutputFormat::Json | OutputFormat::Markdown) {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len);
    let style = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar
}

fn finish(mut report: RunReport, config: &ResolvedConfig, run: &RunArgs) -> anyhow::Result<bool> {
    report.apply_threshold(config.confidence_threshold);
    println!("{}", render_report(&report, run.format)?);
    Ok(run.fail_on.is_some_and(|severity| report.fails_on(severity)))
}
