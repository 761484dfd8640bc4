use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use aisert_core::{
    AisertConfig, AisertReport, BackendRegistry, ConfigSource, Content, Plan, ValidatorKind,
};
use aisert_runtime::{BatchRunner, DEFAULT_CONCURRENCY};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};

mod logging;

/// Every report passed.
const EXIT_PASSED: u8 = 0;
/// At least one report failed.
const EXIT_FAILED: u8 = 1;
/// Bad arguments, unreadable input, an invalid plan or a backend missing
/// from this build.
const EXIT_USAGE: u8 = 2;

#[derive(Debug, Parser)]
#[command(
    name = "aisert",
    version,
    about = "Validate LLM responses against declarative rule plans"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a rule plan against one or more responses.
    Check(CheckArgs),
    /// Print the resolved configuration.
    Config(ConfigArgs),
    /// List the token and embedding backends compiled into this binary.
    Providers,
}

#[derive(Debug, clap::Args)]
struct CheckArgs {
    /// Rule plan (YAML, or JSON for `.json`).
    #[arg(long)]
    rules: PathBuf,

    /// Configuration file (YAML for `.yaml`/`.yml`, JSON otherwise).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Parse each response as JSON instead of treating it as text.
    #[arg(long, default_value_t = false)]
    json_content: bool,

    /// Stop each response at its first failing rule.
    #[arg(long, default_value_t = false)]
    strict: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Responses validated at once.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Response files; `-` reads stdin.
    #[arg(required = true)]
    files: Vec<String>,
}

#[derive(Debug, clap::Args)]
struct ConfigArgs {
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_tracing();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Check(args) => run_check(args).await,
        Commands::Config(args) => run_config(args),
        Commands::Providers => run_providers(),
    };

    match outcome {
        Ok(code) => ExitCode::from(code),
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(EXIT_USAGE)
        }
    }
}

async fn run_check(args: CheckArgs) -> Result<u8> {
    let mut plan = Plan::from_file(&args.rules)
        .with_context(|| format!("failed to load rule plan `{}`", args.rules.display()))?;
    if args.strict {
        plan = plan.strict(true);
    }

    let config = resolve_config(args.config.as_deref());
    let registry = aisert_runtime::registry();
    ensure_backends(&plan, &config, &registry)?;

    let contents = args
        .files
        .iter()
        .map(|source| read_content(source, args.json_content))
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(
        rules = %args.rules.display(),
        steps = plan.steps.len(),
        files = contents.len(),
        concurrency = args.concurrency,
        provider = %config.model_provider,
        "running rule plan"
    );

    let runner = BatchRunner::new(registry, config, args.concurrency);
    let reports = runner.run(contents, &plan).await?;

    match args.format {
        OutputFormat::Text => print_text(&args.files, &reports),
        OutputFormat::Json => print_json(&args.files, &reports)?,
    }

    if reports.iter().all(AisertReport::passed) {
        Ok(EXIT_PASSED)
    } else {
        Ok(EXIT_FAILED)
    }
}

fn run_config(args: ConfigArgs) -> Result<u8> {
    let config = resolve_config(args.config.as_deref());
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(EXIT_PASSED)
}

fn run_providers() -> Result<u8> {
    let registry = aisert_runtime::registry();
    let providers = registry.available_providers();
    if providers.is_empty() {
        println!("token providers: (none)");
    } else {
        println!("token providers: {}", providers.join(", "));
    }
    println!(
        "embeddings: {}",
        if registry.has_embedder() { "available" } else { "unavailable" }
    );
    Ok(EXIT_PASSED)
}

/// Refuse to run token or semantic steps this binary cannot serve.
fn ensure_backends(plan: &Plan, config: &AisertConfig, registry: &BackendRegistry) -> Result<()> {
    if plan.uses(ValidatorKind::Token) && !registry.has_provider(&config.model_provider) {
        let available = registry.available_providers();
        bail!(
            "token provider '{}' is not available in this build (available: {}); \
             rebuild with its cargo feature or set model_provider in --config",
            config.model_provider,
            if available.is_empty() { "none".to_string() } else { available.join(", ") }
        );
    }
    if plan.uses(ValidatorKind::Semantic) && !registry.has_embedder() {
        bail!(
            "semantic steps need embeddings, which are not available in this build; \
             rebuild with the `local-embeddings` feature"
        );
    }
    Ok(())
}

/// Unreadable or malformed configuration falls back to defaults, like the
/// library does.
fn resolve_config(path: Option<&Path>) -> AisertConfig {
    match path {
        Some(path) => ConfigSource::from(path).resolve(),
        None => ConfigSource::Default.resolve(),
    }
}

fn read_content(source: &str, as_json: bool) -> Result<Content> {
    let raw = if source == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read response from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("failed to read response `{source}`"))?
    };

    if as_json {
        let value: Value = serde_json::from_str(&raw)
            .with_context(|| format!("response `{source}` is not valid JSON"))?;
        Ok(Content::from(value))
    } else {
        Ok(Content::from(raw))
    }
}

fn print_text(sources: &[String], reports: &[AisertReport]) {
    for (source, report) in sources.iter().zip(reports) {
        if sources.len() > 1 {
            println!("== {source} ==");
        }
        println!("{report}");
    }
}

fn print_json(sources: &[String], reports: &[AisertReport]) -> Result<()> {
    let entries: Vec<Value> = sources
        .iter()
        .zip(reports)
        .map(|(source, report)| {
            let mut entry = report.to_json();
            entry["source"] = json!(source);
            entry
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}
