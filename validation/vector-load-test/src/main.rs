//! Load test CLI for Milvus-style vector databases.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use vector_load_test::{LoadRunner, ResultsReport, RunConfig, RunOutcome};

#[derive(Parser)]
#[command(name = "vector-load-test")]
#[command(about = "Round-based insert/search load generator for vector databases", long_about = None)]
struct Cli {
    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a load test from a scenario file
    Run {
        /// Path to scenario YAML file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Override backend address
        #[arg(short, long, env = "MILVUS_ADDRESS")]
        address: Option<String>,

        /// Override number of rounds
        #[arg(short, long)]
        rounds: Option<u64>,

        /// Override invocations per round
        #[arg(short, long)]
        units_per_round: Option<usize>,

        /// Override RNG seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override output directory
        #[arg(short = 'd', long)]
        output_dir: Option<PathBuf>,

        /// Report format
        #[arg(short, long, value_enum, default_value = "table")]
        output: ReportFormat,
    },

    /// Run a short random mix with built-in parameters
    Quick {
        /// Backend address
        #[arg(short, long, env = "MILVUS_ADDRESS", default_value = "http://localhost:19530")]
        address: String,

        /// Number of rounds
        #[arg(short, long, default_value = "10")]
        rounds: u64,

        /// Invocations per round
        #[arg(short, long, default_value = "12")]
        units_per_round: usize,

        /// Output directory
        #[arg(short = 'd', long, default_value = "results")]
        output_dir: PathBuf,
    },

    /// List available scenarios
    List {
        /// Scenarios directory
        #[arg(short, long, default_value = "scenarios")]
        dir: PathBuf,
    },
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    match cli.command {
        Commands::Run {
            scenario,
            address,
            rounds,
            units_per_round,
            seed,
            output_dir,
            output,
        } => {
            info!(scenario = %scenario.display(), "Loading scenario");
            let mut config = RunConfig::from_file(&scenario)?;

            // Apply overrides
            if let Some(a) = address {
                config.backend.address = a;
            }
            if let Some(r) = rounds {
                config.workload.total_rounds = r;
            }
            if let Some(u) = units_per_round {
                config.workload.units_per_round = u;
            }
            if let Some(s) = seed {
                config.workload.seed = Some(s);
            }
            if let Some(d) = output_dir {
                config.output.dir = d;
            }

            config.validate()?;
            let outcome = LoadRunner::new(config)?.with_progress(true).run().await?;
            finish(outcome, output)
        }
        Commands::Quick {
            address,
            rounds,
            units_per_round,
            output_dir,
        } => {
            let mut config = RunConfig::default();
            config.name = "quick".to_string();
            config.description = "Quick random insert/search mix".to_string();
            config.backend.address = address;
            config.workload.total_rounds = rounds;
            config.workload.units_per_round = units_per_round;
            config.output.dir = output_dir;

            config.validate()?;
            let outcome = LoadRunner::new(config)?.with_progress(true).run().await?;
            finish(outcome, ReportFormat::Table)
        }
        Commands::List { dir } => {
            let entries = std::fs::read_dir(&dir)
                .with_context(|| format!("reading scenarios directory {}", dir.display()))?;

            let mut scenarios = Vec::new();
            for entry in entries.flatten() {
                let path = entry.path();
                if !matches!(
                    path.extension().and_then(|s| s.to_str()),
                    Some("yaml") | Some("yml")
                ) {
                    continue;
                }
                match RunConfig::from_file(&path) {
                    Ok(config) => {
                        let filename = entry.file_name().to_string_lossy().to_string();
                        scenarios.push((filename, config.name, config.description));
                    }
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping invalid scenario"),
                }
            }
            scenarios.sort_by(|a, b| a.0.cmp(&b.0));

            println!("Available scenarios in {}:", dir.display());
            println!();
            if scenarios.is_empty() {
                println!("No scenario files found");
            }
            for (filename, name, desc) in scenarios {
                println!("  {} - {}", filename, name);
                println!("    {}", desc);
                println!();
            }
            Ok(())
        }
    }
}

/// Print the report and turn a run failure into the process exit status.
fn finish(outcome: RunOutcome, format: ReportFormat) -> anyhow::Result<()> {
    match format {
        ReportFormat::Table => println!("{}", ResultsReport::format_table(&outcome.summary)),
        ReportFormat::Json => println!("{}", ResultsReport::format_json(&outcome.summary)?),
    }
    for series in &outcome.exported {
        info!(
            class = %series.class,
            path = %series.path.display(),
            samples = series.samples,
            "Exported"
        );
    }

    match outcome.error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
