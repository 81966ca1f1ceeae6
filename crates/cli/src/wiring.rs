//! Adapter construction and trigger loops.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use github::GithubClient;
use listener::{command_inbox, serve_commands, CommandsState, ScheduleTicker};
use llm::OpenAiProvider;
use nodes::{
    ChannelPipeline, CommitPipeline, LookupPipeline, PipelineExecutor, RunCoordinator,
    TriggerOutcome,
};
use pipeline::{
    ChannelId, Enricher, EventSource, FetchWindow, PipelineKind, RegistrySource, RepositoryId,
    SummaryProvider,
};
use registry::{CsvRegistry, SheetsRegistry};
use slack::SlackClient;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::{Config, RegistryConfig, Secrets};

/// Slash commands waiting for the coordinator loop.
const COMMAND_QUEUE: usize = 32;

/// How long shutdown waits for runs in flight to finish delivering.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(120);

fn channel_id(value: &str, setting: &str) -> Result<ChannelId> {
    ChannelId::new(value.trim()).with_context(|| format!("{setting} must not be blank"))
}

fn provider(
    config: &Config,
    secrets: &Secrets,
    model: &str,
) -> Result<Option<Arc<dyn SummaryProvider>>> {
    let provider = OpenAiProvider::from_key(
        &config.ai.base_url,
        secrets.openai_api_key.as_deref(),
        model,
    )?;
    Ok(provider.map(|p| Arc::new(p) as Arc<dyn SummaryProvider>))
}

fn registry_source(config: &Config, secrets: &Secrets) -> Result<Arc<dyn RegistrySource>> {
    Ok(match &config.lookup.registry {
        RegistryConfig::Csv { path } => Arc::new(CsvRegistry::new(path.clone())),
        RegistryConfig::Sheets {
            spreadsheet_id,
            range,
            api_base,
        } => {
            let Some(key) = secrets.google_sheets_api_key.as_deref() else {
                bail!("GOOGLE_SHEETS_API_KEY must be set to read the registry from a spreadsheet");
            };
            Arc::new(SheetsRegistry::new(
                api_base.as_str(),
                spreadsheet_id.as_str(),
                range.as_str(),
                key,
            )?)
        }
    })
}

/// Builds the executor with every pipeline the configuration enables.
pub fn build_executor(config: &Config, secrets: &Secrets) -> Result<PipelineExecutor> {
    let Some(token) = secrets.slack_bot_token.as_deref() else {
        bail!("SLACK_BOT_TOKEN must be set");
    };
    let slack = Arc::new(SlackClient::new(config.slack.api_base.as_str(), token)?);
    let bot_channel = channel_id(&config.slack.bot_channel, "slack.bot_channel")?;
    let mut executor = PipelineExecutor::new(slack.clone());

    if config.commits.enabled {
        let repository = RepositoryId::new(config.github.owner.trim(), config.github.repo.trim())
            .context("github.owner and github.repo must not be blank")?;
        let source = GithubClient::new(
            config.github.api_base.as_str(),
            secrets.github_token.as_deref(),
            repository,
        )?;
        let enricher = if config.ai.enabled {
            Enricher::new(provider(config, secrets, &config.ai.commit_model)?)
        } else {
            Enricher::disabled()
        };
        executor = executor.with_commits(CommitPipeline {
            source: Arc::new(source),
            window: FetchWindow::new(config.commit_lookback()?, config.commits.max_commits),
            enricher,
            channel: bot_channel.clone(),
        });
    }

    if config.channel.enabled {
        executor = executor.with_channel(ChannelPipeline {
            history: slack.clone(),
            resolver: slack.clone(),
            source_channel: channel_id(&config.slack.summary_channel, "slack.summary_channel")?,
            window: FetchWindow::new(config.channel_lookback()?, config.channel.max_messages),
            enricher: Enricher::new(provider(config, secrets, &config.ai.channel_model)?),
            channel: bot_channel.clone(),
        });
    }

    if config.lookup.enabled {
        executor = executor.with_lookup(LookupPipeline {
            registry: registry_source(config, secrets)?,
            threshold: config.lookup.threshold,
            enricher: Enricher::new(provider(config, secrets, &config.ai.lookup_model)?),
            channel: bot_channel,
        });
    }

    Ok(executor)
}

/// The enabled schedules, one ticker per scheduled pipeline.
pub fn tickers(config: &Config) -> Result<Vec<ScheduleTicker>> {
    let mut tickers = Vec::new();
    if config.commits.enabled {
        tickers.push(ScheduleTicker::new(PipelineKind::Commits, config.commit_schedule()?));
    }
    if config.channel.enabled {
        tickers.push(ScheduleTicker::new(
            PipelineKind::ChannelHistory,
            config.channel_schedule()?,
        ));
    }
    Ok(tickers)
}

/// Feeds every event from `source` to the coordinator until the source ends.
async fn drive(mut source: impl EventSource, coordinator: RunCoordinator) {
    while let Some(event) = source.next_event().await {
        let kind = event.kind;
        match coordinator.trigger(event).await {
            TriggerOutcome::Started { run_id, .. } => {
                info!(pipeline = %kind, run_id = %run_id, "Run started");
            }
            TriggerOutcome::AlreadyRunning => {
                info!(pipeline = %kind, "Trigger rejected; run already in progress");
            }
            TriggerOutcome::NotConfigured => {
                warn!(pipeline = %kind, "Trigger for unconfigured pipeline");
            }
        }
    }
}

/// Runs schedule tickers and the slash-command receiver until Ctrl-C.
///
/// Shutdown stops taking triggers first, then lets runs already in flight
/// finish within [`SHUTDOWN_GRACE`].
pub async fn serve(config: &Config, secrets: &Secrets) -> Result<()> {
    let coordinator = RunCoordinator::new(Arc::new(build_executor(config, secrets)?));
    let mut tasks = JoinSet::new();

    for ticker in tickers(config)? {
        info!(pipeline = %ticker.kind(), schedule = %ticker.schedule(), "Schedule armed");
        tasks.spawn(drive(ticker, coordinator.clone()));
    }

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = match secrets.slack_signing_secret.as_deref() {
        Some(secret) => {
            let bind = &config.slack.bind;
            let addr: SocketAddr = bind
                .parse()
                .with_context(|| format!("slack.bind '{bind}' is not a socket address"))?;
            let (sender, inbox) = command_inbox(COMMAND_QUEUE);
            tasks.spawn(drive(inbox, coordinator.clone()));

            let state = CommandsState::new(secret, sender);
            Some(tokio::spawn(async move {
                let shutdown = async move {
                    let _ = stop_rx.await;
                };
                if let Err(e) = serve_commands(addr, state, shutdown).await {
                    error!(addr = %addr, error = %e, "Slash-command receiver stopped");
                }
            }))
        }
        None => {
            warn!("SLACK_SIGNING_SECRET is not set; slash commands are disabled");
            None
        }
    };

    info!("Digest is running");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Shutting down");
    tasks.abort_all();
    while tasks.join_next().await.is_some() {}
    if let Some(server) = server {
        let _ = stop_tx.send(());
        let _ = server.await;
    }
    if coordinator.drain(SHUTDOWN_GRACE).await {
        info!("All runs finished");
    }
    Ok(())
}
