//! Digest CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration** — load `digest.toml` (or the `--config` path),
//!    overlay the environment and validate the result.
//! 2. **Wire observability** — configure `tracing-subscriber` with a JSON layer
//!    and, when `OTEL_EXPORTER_OTLP_ENDPOINT` is set, an OpenTelemetry OTLP
//!    exporter. All `tracing` spans and structured events emitted by every
//!    crate in the workspace flow through this layer.
//! 3. **Construct infrastructure** — create the concrete adapters
//!    (`GithubClient`, `SlackClient`, `OpenAiProvider`, the registry source)
//!    and inject them into `PipelineExecutor`.
//! 4. **Select trigger mode** — based on the subcommand:
//!    - `serve` — arm the schedule tickers, start the slash-command receiver
//!      and feed every trigger to the `RunCoordinator` until Ctrl-C.
//!    - `run` — trigger one pipeline manually and wait for its report.
//!    - `schedule` — print the armed schedules and their next fire times.

mod config;
mod telemetry;
mod wiring;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use nodes::{RunCoordinator, RunReport, SourceStatus, TriggerOutcome};
use pipeline::{PipelineKind, TriggerEvent};

use crate::config::{load_config, Config, Secrets};

/// How many upcoming fire times `schedule` prints per pipeline.
const UPCOMING_FIRES: usize = 3;

#[derive(Parser)]
#[command(
    name = "digest",
    about = "Scheduled and on-demand activity digests posted to chat",
    version
)]
struct Cli {
    /// Path to the configuration file (defaults to ./digest.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the schedules and the slash-command receiver until interrupted.
    Serve,
    /// Run one pipeline now and print its report.
    Run {
        /// Pipeline to run: commits, channel or lookup.
        kind: PipelineKind,
        /// Query text for lookup runs.
        query: Vec<String>,
    },
    /// Show the configured schedules and when they next fire.
    Schedule,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let secrets = Secrets::from_env();
    let telemetry = telemetry::init()?;

    let result = match cli.command {
        Commands::Serve => wiring::serve(&config, &secrets).await,
        Commands::Run { kind, query } => run_once(&config, &secrets, kind, query.join(" ")).await,
        Commands::Schedule => print_schedules(&config),
    };

    telemetry.shutdown();
    result
}

async fn run_once(
    config: &Config,
    secrets: &Secrets,
    kind: PipelineKind,
    text: String,
) -> Result<()> {
    if kind == PipelineKind::Lookup && text.trim().is_empty() {
        bail!("lookup needs a query, e.g. `digest run lookup acme`");
    }

    let coordinator = RunCoordinator::new(Arc::new(wiring::build_executor(config, secrets)?));
    match coordinator.trigger(TriggerEvent::manual(kind, text)).await {
        TriggerOutcome::Started { handle, .. } => {
            let report = handle.await?;
            print_report(&report);
            if report.failed() > 0 {
                bail!(
                    "{} of {} messages could not be delivered",
                    report.failed(),
                    report.deliveries.len()
                );
            }
            Ok(())
        }
        TriggerOutcome::AlreadyRunning => bail!("a {kind} run is already in progress"),
        TriggerOutcome::NotConfigured => bail!("the {kind} pipeline is disabled in the configuration"),
    }
}

fn print_report(report: &RunReport) {
    println!("run:       {}", report.run_id);
    println!("pipeline:  {}", report.kind);
    match &report.source {
        SourceStatus::Available => println!("source:    available"),
        SourceStatus::Unavailable(reason) => println!("source:    unavailable ({reason})"),
        SourceStatus::NotConfigured => println!("source:    not configured"),
    }
    println!("records:   {}", report.records);
    println!("enriched:  {}", report.enriched);
    println!(
        "delivered: {} of {}",
        report.delivered(),
        report.deliveries.len()
    );
}

fn print_schedules(config: &Config) -> Result<()> {
    let tickers = wiring::tickers(config)?;
    if tickers.is_empty() {
        println!("No scheduled pipelines are enabled.");
        return Ok(());
    }

    let now = Utc::now();
    for ticker in tickers {
        println!("{:<9} {}", ticker.kind().as_str(), ticker.schedule());
        let mut after = now;
        for _ in 0..UPCOMING_FIRES {
            match ticker.schedule().next_after(after) {
                Some(next) => {
                    println!("          next {}", next.format("%Y-%m-%d %H:%M UTC"));
                    after = next;
                }
                None => {
                    println!("          never fires");
                    break;
                }
            }
        }
    }
    Ok(())
}
