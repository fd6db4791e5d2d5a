//! CLI command definitions for docuforge.
//!
//! `run` drives the full pipeline and writes a production package, `health`
//! checks the installation and `techniques` manages the vector library.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::agents::{DEFAULT_AUDIENCE, DEFAULT_DURATION_MINUTES, DEFAULT_STYLE};
use crate::export::export_package;
use crate::health::{run_health_checks, HealthCheck};
use crate::pipeline::{build_provider, Orchestrator, PipelineConfig, PipelineRun, ProviderKind};
use crate::state::PipelineState;
use crate::vector::{seed_techniques, InMemoryVectorStore, VectorStore};

/// Library file used when neither flag nor environment names one.
const DEFAULT_LIBRARY_PATH: &str = "data/techniques.json";

/// Viral documentary generator driven by LLM research and writing agents.
#[derive(Parser)]
#[command(name = "docuforge")]
#[command(about = "Research, plan and script viral documentaries with LLM agents")]
#[command(version)]
#[command(
    long_about = "docuforge runs three gatekeepers (research, viral analysis, content synthesis) over a topic and writes a production package: script, visual architecture, production notes and research citations.\n\nExample usage:\n  docuforge run --topic \"The science of procrastination\" --audience students --duration 12"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the full pipeline for a topic and export the production package.
    Run(RunArgs),

    /// Check runtime, secrets, directories and (optionally) the live API.
    Health(HealthArgs),

    /// Manage the viral technique library.
    Techniques(TechniquesArgs),
}

/// Arguments for `docuforge run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Documentary topic.
    #[arg(short, long)]
    pub topic: String,

    /// Target audience.
    #[arg(short, long, default_value = DEFAULT_AUDIENCE)]
    pub audience: String,

    /// Video style.
    #[arg(short, long, default_value = DEFAULT_STYLE)]
    pub style: String,

    /// Target length in minutes.
    #[arg(short, long, default_value_t = DEFAULT_DURATION_MINUTES)]
    pub duration: f64,

    /// Output directory root; the package lands in a per-topic subdirectory.
    #[arg(short, long, env = "DOCUFORGE_OUTPUT_DIR")]
    pub output: Option<String>,

    /// Model id for every stage.
    #[arg(short, long, env = "DOCUFORGE_MODEL")]
    pub model: Option<String>,

    /// LLM provider: anthropic or openai.
    #[arg(long, env = "DOCUFORGE_PROVIDER")]
    pub provider: Option<String>,

    /// Stop at the first gatekeeper below its confidence threshold.
    #[arg(long)]
    pub halt_on_low_confidence: bool,

    /// Skip writing the production package.
    #[arg(long)]
    pub no_export: bool,

    /// Output JSON summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `docuforge health`.
#[derive(Parser, Debug)]
pub struct HealthArgs {
    /// Also make one live call to the configured provider.
    #[arg(long)]
    pub live: bool,

    /// Output JSON instead of PASS/FAIL lines.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `docuforge techniques`.
#[derive(Parser, Debug)]
pub struct TechniquesArgs {
    #[command(subcommand)]
    pub command: TechniquesSubcommand,

    /// Technique library file.
    #[arg(long, env = "DOCUFORGE_TECHNIQUES_PATH", global = true)]
    pub library: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
pub enum TechniquesSubcommand {
    /// Write the starter library into the library file.
    Seed,

    /// Show the techniques closest to a query.
    Search {
        /// Free-text query.
        query: String,

        /// Number of matches.
        #[arg(short = 'k', long, default_value_t = 5)]
        top_k: usize,
    },

    /// Counts by category and average effectiveness.
    Stats,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_pipeline_command(args).await,
        Commands::Health(args) => run_health_command(args).await,
        Commands::Techniques(args) => run_techniques_command(args).await,
    }
}

// ============================================================================
// Run Command Implementation
// ============================================================================

/// Lower-case ASCII words joined by `-`, for per-topic directories.
pub fn slugify(topic: &str) -> String {
    let slug = topic
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "documentary".to_string()
    } else {
        slug
    }
}

fn apply_run_overrides(mut config: PipelineConfig, args: &RunArgs) -> anyhow::Result<PipelineConfig> {
    if let Some(provider) = &args.provider {
        config = config.with_provider(provider.parse::<ProviderKind>()?);
    }
    if let Some(model) = &args.model {
        config = config.with_model(model.as_str());
    }
    if let Some(output) = &args.output {
        config = config.with_output_dir(output.as_str());
    }
    if args.halt_on_low_confidence {
        config = config.with_halt_on_low_confidence(true);
    }
    config.validate()?;
    Ok(config)
}

#[derive(Debug, Serialize)]
struct RunOutput<'a> {
    topic: &'a str,
    stages: &'a [crate::pipeline::StageSummary],
    halted_at: Option<&'a str>,
    production_ready: bool,
    errors: &'a [String],
    package_dir: Option<String>,
}

async fn run_pipeline_command(args: RunArgs) -> anyhow::Result<()> {
    if !(args.duration.is_finite() && args.duration > 0.0) {
        anyhow::bail!("--duration must be a positive number of minutes");
    }
    let config = apply_run_overrides(PipelineConfig::from_env()?, &args)?;
    let orchestrator = Orchestrator::from_config(config.clone())
        .await
        .context("Failed to set up the pipeline")?;

    let seed = PipelineState::create(json!({
        "topic": args.topic,
        "target_audience": args.audience,
        "video_style": args.style,
        "duration_minutes": args.duration,
    }))?;

    info!(topic = %args.topic, provider = %config.provider, model = %config.model, "Starting pipeline");
    let run = orchestrator.run(seed).await;

    let package_dir = if args.no_export {
        None
    } else {
        let dir = config.output_dir.join(slugify(&args.topic));
        let package = export_package(&run.state, &dir)
            .with_context(|| format!("Failed to export package to {}", dir.display()))?;
        Some(package.dir)
    };

    if args.json {
        let output = RunOutput {
            topic: &args.topic,
            stages: &run.stages,
            halted_at: run.halted_at.as_deref(),
            production_ready: run.state.get_bool("production_ready").unwrap_or(false),
            errors: run.state.errors(),
            package_dir: package_dir.as_ref().map(|d| d.display().to_string()),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_run_summary(&run, package_dir.as_deref());
    }
    Ok(())
}

fn print_run_summary(run: &PipelineRun, package_dir: Option<&Path>) {
    println!("\n=== Pipeline Results ===");
    for stage in &run.stages {
        println!(
            "{} {:<10} confidence {:.2} (threshold {:.2}, {} errors, {:.1}s)",
            if stage.passed { "✓" } else { "✗" },
            stage.name,
            stage.confidence,
            stage.threshold,
            stage.errors_added,
            stage.duration.as_secs_f64()
        );
    }
    if let Some(stage) = &run.halted_at {
        println!("Halted after: {}", stage);
    }
    println!(
        "Production ready: {}",
        if run.state.get_bool("production_ready").unwrap_or(false) { "yes" } else { "no" }
    );
    for error in run.state.errors() {
        println!("    error: {}", error);
    }
    if let Some(dir) = package_dir {
        println!("  Package: {}", dir.display());
    }
}

// ============================================================================
// Health Command Implementation
// ============================================================================

async fn run_health_command(args: HealthArgs) -> anyhow::Result<()> {
    let config = PipelineConfig::from_env()?;
    let env = |key: &str| std::env::var(key).ok();

    let report = if args.live {
        match build_provider(&config) {
            Ok(provider) => run_health_checks(&config, &env, Some(provider.as_ref())).await,
            Err(e) => {
                let mut report = run_health_checks(&config, &env, None).await;
                report.checks.push(HealthCheck::fail("live", e.to_string()));
                report
            }
        }
    } else {
        run_health_checks(&config, &env, None).await
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.render());
    }

    let code = report.exit_code();
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

// ============================================================================
// Techniques Command Implementation
// ============================================================================

fn library_path(args: &TechniquesArgs) -> PathBuf {
    PathBuf::from(args.library.as_deref().unwrap_or(DEFAULT_LIBRARY_PATH))
}

async fn run_techniques_command(args: TechniquesArgs) -> anyhow::Result<()> {
    let path = library_path(&args);
    let store = InMemoryVectorStore::open(&path)
        .await
        .with_context(|| format!("Failed to open technique library {}", path.display()))?;

    match args.command {
        TechniquesSubcommand::Seed => {
            let written = seed_techniques(&store).await?;
            store.save(&path).await?;
            println!(
                "✓ Seeded {} techniques ({} total) into {}",
                written,
                store.count().await?,
                path.display()
            );
        }
        TechniquesSubcommand::Search { query, top_k } => {
            if store.is_empty().await {
                seed_techniques(&store).await?;
            }
            let matches = store.query(&query, top_k).await?;
            if matches.is_empty() {
                println!("No techniques found");
            }
            for (i, hit) in matches.iter().enumerate() {
                println!("{}. [{:.1}%] {}", i + 1, hit.similarity * 100.0, hit.id);
                println!("   {}", hit.document);
            }
        }
        TechniquesSubcommand::Stats => {
            let stats = store.stats().await;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
