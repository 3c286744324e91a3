//! Jobgraph CLI - build a career knowledge graph from job history

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use jobgraph_core::analysis::{
    AnalysisOrchestrator, AnalysisReport, ExtractedSkill, JobExperienceInput, NormalizedJob,
    StepOutcome,
};
use jobgraph_core::config::Config;
use jobgraph_core::extraction::{JobNormalizer, SkillExtractor};
use jobgraph_core::graph::{SqliteGraphStore, StalenessPolicy};
use jobgraph_core::llm::{LlmClient, TextCompletion};
use jobgraph_core::storage::Database;
use jobgraph_core::taxonomy::{OnetClient, StaticTaxonomySource, TaxonomyIngestor, TaxonomySource};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "jobgraph")]
#[command(author, version, about = "Career knowledge graph builder", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Graph database file (defaults to graph.database_path, then the config directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one job experience into the graph
    Analyze {
        /// JSON file with `job` and optional `normalized` and `skills`
        #[arg(short, long)]
        input: PathBuf,
        /// Read taxonomy payloads from this JSON file instead of O*NET
        #[arg(long)]
        taxonomy_file: Option<PathBuf>,
        /// Never call the completion service
        #[arg(long)]
        offline: bool,
    },

    /// Check whether an occupation's taxonomy needs refreshing
    Stale {
        /// Occupation code, e.g. 15-1252.00
        code: String,
        /// Threshold in days (defaults to analysis.staleness_days)
        #[arg(long)]
        days: Option<u32>,
    },

    /// Fetch and ingest an occupation's taxonomy
    Ingest {
        /// Occupation code, e.g. 15-1252.00
        code: String,
        /// Read the payload from this JSON file instead of O*NET
        #[arg(long)]
        taxonomy_file: Option<PathBuf>,
    },

    /// Show node and edge counts
    Stats,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show the configuration file path
    Path,
}

/// Contents of the `analyze --input` file
#[derive(Debug, Deserialize)]
struct AnalyzeInput {
    job: JobExperienceInput,
    #[serde(default)]
    normalized: Option<NormalizedJob>,
    #[serde(default)]
    skills: Option<Vec<ExtractedSkill>>,
}

/// Stand-in completion service for `--offline`
struct OfflineCompletion;

#[async_trait]
impl TextCompletion for OfflineCompletion {
    async fn complete(&self, _prompt: &str) -> jobgraph_core::Result<String> {
        Err(jobgraph_core::Error::LLMError(
            "completion service disabled (--offline)".to_string(),
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let directive = if cli.verbose { "jobgraph=debug" } else { "jobgraph=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Analyze {
            ref input,
            ref taxonomy_file,
            offline,
        } => cmd_analyze(&cli, input, taxonomy_file.as_deref(), offline).await,

        Commands::Stale { ref code, days } => cmd_stale(&cli, code, days).await,

        Commands::Ingest {
            ref code,
            ref taxonomy_file,
        } => cmd_ingest(&cli, code, taxonomy_file.as_deref()).await,

        Commands::Stats => cmd_stats(&cli).await,

        Commands::Config { ref action } => cmd_config(action, cli.format),
    }
}

// ============================================================================
// Helpers
// ============================================================================

async fn open_store(cli: &Cli, config: &Config) -> anyhow::Result<SqliteGraphStore> {
    let path = match &cli.db {
        Some(path) => path.clone(),
        None => config.graph.resolved_path()?,
    };
    debug!(path = %path.display(), "Opening graph database");
    let db = Database::open(&path)
        .await
        .with_context(|| format!("Failed to open graph database at {}", path.display()))?;
    Ok(SqliteGraphStore::new(db.pool().clone()))
}

fn taxonomy_source(
    config: &Config,
    taxonomy_file: Option<&Path>,
) -> anyhow::Result<Arc<dyn TaxonomySource>> {
    match taxonomy_file {
        Some(path) => {
            let source = StaticTaxonomySource::from_json_file(path)
                .with_context(|| format!("Failed to read taxonomy file {}", path.display()))?;
            info!(occupations = source.len(), "Using taxonomy file");
            Ok(Arc::new(source))
        }
        None => Ok(Arc::new(OnetClient::from_config(&config.taxonomy)?)),
    }
}

fn completion_service(config: &Config, offline: bool) -> anyhow::Result<Arc<dyn TextCompletion>> {
    if offline {
        return Ok(Arc::new(OfflineCompletion));
    }
    Ok(Arc::new(LlmClient::from_config(&config.llm)?))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_analyze(
    cli: &Cli,
    input: &Path,
    taxonomy_file: Option<&Path>,
    offline: bool,
) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if offline {
        config.analysis.llm_fallback = false;
        config.analysis.line_mapping = false;
    }

    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read input file {}", input.display()))?;
    let AnalyzeInput {
        job,
        normalized,
        skills,
    } = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid analysis input in {}", input.display()))?;

    let store = open_store(cli, &config).await?;
    let taxonomy = taxonomy_source(&config, taxonomy_file)?;
    let completion = completion_service(&config, offline)?;

    let normalized = match normalized {
        Some(normalized) => normalized,
        None => JobNormalizer::new(completion.clone()).normalize(&job).await?,
    };
    let skills = match skills {
        Some(skills) => skills,
        None => SkillExtractor::new(completion.clone()).extract(&job).await?,
    };

    let orchestrator =
        AnalysisOrchestrator::new(store, taxonomy, completion, config.analysis.clone());
    let report = orchestrator.analyze(&job, &normalized, &skills).await?;

    match cli.format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => {
            print_report(&report);
            Ok(())
        }
    }
}

fn print_report(report: &AnalysisReport) {
    println!("Analysis of '{}' (run {})", report.experience_id, report.run_id);
    for record in &report.steps {
        let subject = record
            .subject
            .as_deref()
            .map(|s| format!(" [{}]", s))
            .unwrap_or_default();
        match &record.outcome {
            StepOutcome::Completed => println!("  [OK] {}{}", record.step, subject),
            StepOutcome::Skipped(reason) => {
                println!("  [--] {}{}: {}", record.step, subject, reason)
            }
            StepOutcome::Failed(message) => {
                println!("  [!!] {}{}: {}", record.step, subject, message)
            }
        }
    }
    println!();
    println!("  Occupations mapped: {}", report.occupations_mapped);
    println!("  Skills written:     {}", report.skills_written);
    if let Some(mapping) = &report.mapping {
        println!(
            "  Skill mappings:     {} demonstrates, {} related ({:?})",
            mapping.demonstrates, mapping.related, mapping.strategy
        );
    }
    println!("  Description lines:  {}", report.description_lines);
    if !report.is_complete() {
        println!();
        println!("Analysis finished with {} failed step(s).", report.failed_steps().len());
    }
}

#[derive(Serialize)]
struct StaleOutput<'a> {
    code: &'a str,
    stale: bool,
    threshold_days: u32,
    taxonomy_updated_at: Option<String>,
}

async fn cmd_stale(cli: &Cli, code: &str, days: Option<u32>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let store = open_store(cli, &config).await?;
    let threshold_days = days.unwrap_or(config.analysis.staleness_days);

    let policy = StalenessPolicy::new(store.clone(), threshold_days);
    let stale = policy.is_stale(code).await;
    let updated_at = store.taxonomy_updated_at(code).await.ok().flatten();

    match cli.format {
        OutputFormat::Json => print_json(&StaleOutput {
            code,
            stale,
            threshold_days,
            taxonomy_updated_at: updated_at.map(|t| t.to_rfc3339()),
        }),
        OutputFormat::Text => {
            let state = if stale { "stale" } else { "fresh" };
            match updated_at {
                Some(at) => println!(
                    "{}: {} (ingested {}, threshold {} days)",
                    code,
                    state,
                    at.format("%Y-%m-%d %H:%M:%S"),
                    threshold_days
                ),
                None => println!("{}: {} (never ingested)", code, state),
            }
            Ok(())
        }
    }
}

async fn cmd_ingest(cli: &Cli, code: &str, taxonomy_file: Option<&Path>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let store = open_store(cli, &config).await?;
    let source = taxonomy_source(&config, taxonomy_file)?;

    let payload = source.fetch_occupation(code).await?;
    let summary = TaxonomyIngestor::new(store).ingest(code, &payload).await?;

    match cli.format {
        OutputFormat::Json => print_json(&summary),
        OutputFormat::Text => {
            println!("Ingested taxonomy for {}", summary.code);
            println!("  Skills:       {}", summary.skills);
            println!(
                "  Technologies: {} ({} categorized)",
                summary.technologies, summary.categories
            );
            println!("  Tasks:        {}", summary.tasks);
            println!("  Activities:   {}", summary.activities);
            if summary.skipped > 0 {
                println!("  Skipped:      {} (no usable name)", summary.skipped);
            }
            Ok(())
        }
    }
}

async fn cmd_stats(cli: &Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    let store = open_store(cli, &config).await?;
    let stats = store.stats().await?;

    match cli.format {
        OutputFormat::Json => print_json(&stats),
        OutputFormat::Text => {
            println!("Nodes ({}):", stats.total_nodes());
            for (label, count) in &stats.nodes {
                println!("  {:<20} {}", label, count);
            }
            println!("Edges ({}):", stats.total_edges());
            for (rel_type, count) in &stats.edges {
                println!("  {:<22} {}", rel_type, count);
            }
            Ok(())
        }
    }
}

fn cmd_config(action: &ConfigAction, format: OutputFormat) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            println!("{}", config.get(key)?);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(key, value)?;
            config.save()?;
            println!("Set {} = {}", key, value);
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let entries = config.list()?;
            if format == OutputFormat::Json {
                let map: serde_json::Map<String, serde_json::Value> = entries
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect();
                return print_json(&map);
            }
            for (key, value) in entries {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            println!("Configuration reset to defaults.");
        }
        ConfigAction::Path => {
            println!("{}", Config::config_path()?.display());
        }
    }
    Ok(())
}
