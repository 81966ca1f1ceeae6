//! `PipelineExecutor`: one run of one pipeline, start to finish.
//!
//! Stages always run in the same order: record source, normaliser, enricher,
//! renderer, dispatcher. Every stage failure is absorbed here and reflected
//! in the [`RunReport`]; a run never returns an error.

use std::sync::Arc;

use pipeline::normalize::normalize;
use pipeline::render::{
    no_match_message, render_channel_digest, render_commit_digest, render_entry,
};
use pipeline::{
    ChannelId, CommitSource, EnrichmentInput, Enricher, FetchWindow, HistorySource,
    IdentityResolver, MatchSet, MessageSink, PipelineKind, PipelineRunId, RawRecords,
    RegistrySource, Timestamp, TriggerOrigin,
};
use tracing::{debug, info, warn};

use crate::dispatch::{DeliveryReport, Dispatcher};
use crate::sources::{fetch_channel_history, fetch_commits, search_registry};
use crate::IdentityCache;

// ---------------------------------------------------------------------------
// Pipeline definitions
// ---------------------------------------------------------------------------

/// Daily commit digest.
pub struct CommitPipeline {
    pub source: Arc<dyn CommitSource>,
    pub window: FetchWindow,
    pub enricher: Enricher,
    /// Where the digest is posted.
    pub channel: ChannelId,
}

/// Weekly channel digest.
pub struct ChannelPipeline {
    pub history: Arc<dyn HistorySource>,
    pub resolver: Arc<dyn IdentityResolver>,
    /// The channel whose history is summarised.
    pub source_channel: ChannelId,
    pub window: FetchWindow,
    pub enricher: Enricher,
    /// Where the digest is posted.
    pub channel: ChannelId,
}

/// Contact registry lookup. Each match is posted as its own message.
pub struct LookupPipeline {
    pub registry: Arc<dyn RegistrySource>,
    pub threshold: f64,
    pub enricher: Enricher,
    /// Where matched entries are posted.
    pub channel: ChannelId,
}

// ---------------------------------------------------------------------------
// Run reports
// ---------------------------------------------------------------------------

/// Whether the run's record source delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceStatus {
    Available,
    /// The fetch failed; the run continued with zero records.
    Unavailable(String),
    /// No pipeline of this kind is configured.
    NotConfigured,
}

/// What one run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run_id: PipelineRunId,
    pub kind: PipelineKind,
    pub source: SourceStatus,
    /// Normalised records (or registry matches) the run worked from.
    pub records: usize,
    /// Messages that carried a generated summary block.
    pub enriched: usize,
    pub deliveries: Vec<DeliveryReport>,
}

impl RunReport {
    fn new(run_id: PipelineRunId, kind: PipelineKind) -> Self {
        Self {
            run_id,
            kind,
            source: SourceStatus::Available,
            records: 0,
            enriched: 0,
            deliveries: Vec::new(),
        }
    }

    pub fn delivered(&self) -> usize {
        self.deliveries.iter().filter(|d| d.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.deliveries.len() - self.delivered()
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct PipelineExecutor {
    dispatcher: Dispatcher,
    commits: Option<CommitPipeline>,
    channel: Option<ChannelPipeline>,
    lookup: Option<LookupPipeline>,
}

impl PipelineExecutor {
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self {
            dispatcher: Dispatcher::new(sink),
            commits: None,
            channel: None,
            lookup: None,
        }
    }

    pub fn with_commits(mut self, pipeline: CommitPipeline) -> Self {
        self.commits = Some(pipeline);
        self
    }

    pub fn with_channel(mut self, pipeline: ChannelPipeline) -> Self {
        self.channel = Some(pipeline);
        self
    }

    pub fn with_lookup(mut self, pipeline: LookupPipeline) -> Self {
        self.lookup = Some(pipeline);
        self
    }

    pub fn is_configured(&self, kind: PipelineKind) -> bool {
        match kind {
            PipelineKind::Commits => self.commits.is_some(),
            PipelineKind::ChannelHistory => self.channel.is_some(),
            PipelineKind::Lookup => self.lookup.is_some(),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Executes one run. On-demand invokers are told about each failed
    /// delivery in their reply channel; scheduled runs only log.
    pub async fn run(
        &self,
        run_id: PipelineRunId,
        kind: PipelineKind,
        origin: &TriggerOrigin,
    ) -> RunReport {
        let now = Timestamp::now();
        info!(run_id = %run_id, pipeline = %kind, "Starting run");

        let mut report = RunReport::new(run_id, kind);
        match kind {
            PipelineKind::Commits => match &self.commits {
                Some(p) => self.run_commits(p, now, &mut report).await,
                None => report.source = SourceStatus::NotConfigured,
            },
            PipelineKind::ChannelHistory => match &self.channel {
                Some(p) => self.run_channel(p, now, &mut report).await,
                None => report.source = SourceStatus::NotConfigured,
            },
            PipelineKind::Lookup => match &self.lookup {
                Some(p) => self.run_lookup(p, origin, &mut report).await,
                None => report.source = SourceStatus::NotConfigured,
            },
        }

        if let Some(reply) = origin.reply_channel() {
            let total = report.deliveries.len();
            for failure in report.deliveries.iter().filter(|d| !d.is_success()) {
                if let Err(e) = &failure.result {
                    let notice = format!(
                        "Could not post {kind} message {} of {total} to <#{}>: {e}",
                        failure.position, failure.channel
                    );
                    self.dispatcher.notify(reply, &notice).await;
                }
            }
        }

        info!(
            run_id = %run_id,
            pipeline = %kind,
            records = report.records,
            enriched = report.enriched,
            delivered = report.delivered(),
            failed = report.failed(),
            "Run finished"
        );
        report
    }

    async fn run_commits(&self, p: &CommitPipeline, now: Timestamp, report: &mut RunReport) {
        let commits = match fetch_commits(p.source.as_ref(), &p.window, now).await {
            Ok(commits) => commits,
            Err(e) => {
                warn!(error = %e, "Commit source unavailable; reporting no activity");
                report.source = SourceStatus::Unavailable(e.to_string());
                Vec::new()
            }
        };

        let raw = RawRecords::Commits(commits);
        debug!(fetched = raw.len(), "Normalising commits");
        let grouped = normalize(raw);
        let enrichment = p.enricher.enrich(EnrichmentInput::Commits(&grouped)).await;
        let text = render_commit_digest(
            p.source.repository(),
            p.window.lookback().num_hours(),
            &grouped,
            &enrichment,
        );

        report.records = grouped.total();
        report.enriched = usize::from(enrichment.is_available() && !grouped.is_empty());
        report.deliveries = self.dispatcher.deliver_all(&p.channel, &[text]).await;
    }

    async fn run_channel(&self, p: &ChannelPipeline, now: Timestamp, report: &mut RunReport) {
        // Lives exactly as long as this run.
        let identities = IdentityCache::new(p.resolver.clone());
        let messages = match fetch_channel_history(
            p.history.clone(),
            &identities,
            &p.source_channel,
            &p.window,
            now,
        )
        .await
        {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, "Channel history unavailable; reporting no activity");
                report.source = SourceStatus::Unavailable(e.to_string());
                Vec::new()
            }
        };

        let raw = RawRecords::Messages(messages);
        debug!(fetched = raw.len(), "Normalising messages");
        let grouped = normalize(raw);
        let enrichment = p.enricher.enrich(EnrichmentInput::Messages(&grouped)).await;
        let text = render_channel_digest(p.window.lookback().num_days(), &grouped, &enrichment);

        report.records = grouped.total();
        report.enriched = usize::from(enrichment.is_available() && !grouped.is_empty());
        report.deliveries = self.dispatcher.deliver_all(&p.channel, &[text]).await;
    }

    async fn run_lookup(&self, p: &LookupPipeline, origin: &TriggerOrigin, report: &mut RunReport) {
        let query = origin.text().trim();
        let matches = match search_registry(p.registry.as_ref(), p.threshold, query).await {
            Ok(matches) => matches,
            Err(e) => {
                warn!(error = %e, "Contact registry unavailable; reporting no match");
                report.source = SourceStatus::Unavailable(e.to_string());
                MatchSet::new(query, Vec::new())
            }
        };
        report.records = matches.len();

        if matches.is_empty() {
            let target = origin.reply_channel().unwrap_or(&p.channel);
            report.deliveries = self
                .dispatcher
                .deliver_all(target, &[no_match_message(query)])
                .await;
            return;
        }

        let mut messages = Vec::with_capacity(matches.len());
        for entry in matches.entries() {
            let enrichment = p.enricher.enrich(EnrichmentInput::Entry(entry)).await;
            if enrichment.is_available() {
                report.enriched += 1;
            }
            messages.push(render_entry(entry, &enrichment));
        }
        report.deliveries = self.dispatcher.deliver_all(&p.channel, &messages).await;
    }
}
