//! Enricher: best-effort summarisation through a [`SummaryProvider`].
//!
//! The enricher never fails. It short-circuits without calling out when it is
//! disabled, has no provider (no credential configured), or has nothing to
//! summarise; a failed call is logged and reported as
//! [`UnavailableReason::Failed`].

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    CompletionRequest, EnrichmentResult, GroupedRecords, RegistryEntry, SummaryProvider,
    UnavailableReason,
};

/// What to summarise.
#[derive(Debug, Clone, Copy)]
pub enum EnrichmentInput<'a> {
    /// A commit digest.
    Commits(&'a GroupedRecords),
    /// A channel history digest.
    Messages(&'a GroupedRecords),
    /// One contact registry entry.
    Entry(&'a RegistryEntry),
}

impl EnrichmentInput<'_> {
    fn is_empty(&self) -> bool {
        match self {
            EnrichmentInput::Commits(g) | EnrichmentInput::Messages(g) => g.is_empty(),
            EnrichmentInput::Entry(_) => false,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            EnrichmentInput::Commits(_) => "commits",
            EnrichmentInput::Messages(_) => "messages",
            EnrichmentInput::Entry(_) => "entry",
        }
    }
}

/// Summarisation stage for one pipeline.
#[derive(Clone)]
pub struct Enricher {
    state: EnricherState,
}

#[derive(Clone)]
enum EnricherState {
    Disabled,
    MissingCredential,
    Ready(Arc<dyn SummaryProvider>),
}

impl Enricher {
    /// An enricher that calls `provider`, or reports a missing credential
    /// when there is none.
    pub fn new(provider: Option<Arc<dyn SummaryProvider>>) -> Self {
        let state = match provider {
            Some(p) => EnricherState::Ready(p),
            None => EnricherState::MissingCredential,
        };
        Self { state }
    }

    /// An enricher switched off by configuration.
    pub fn disabled() -> Self {
        Self {
            state: EnricherState::Disabled,
        }
    }

    pub async fn enrich(&self, input: EnrichmentInput<'_>) -> EnrichmentResult {
        let provider = match &self.state {
            EnricherState::Disabled => {
                return EnrichmentResult::Unavailable(UnavailableReason::Disabled)
            }
            EnricherState::MissingCredential => {
                debug!(input = input.label(), "No summary credential configured; skipping");
                return EnrichmentResult::Unavailable(UnavailableReason::MissingCredential);
            }
            EnricherState::Ready(p) => p,
        };
        if input.is_empty() {
            return EnrichmentResult::Unavailable(UnavailableReason::EmptyInput);
        }

        let request = build_request(input);
        match provider.complete(request).await {
            Ok(text) if !text.trim().is_empty() => EnrichmentResult::Text(text),
            Ok(_) => {
                warn!(input = input.label(), "Summary provider returned an empty completion");
                EnrichmentResult::Unavailable(UnavailableReason::Failed)
            }
            Err(e) => {
                warn!(input = input.label(), error = %e, "Summary generation failed");
                EnrichmentResult::Unavailable(UnavailableReason::Failed)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Prompt templates
// ---------------------------------------------------------------------------

const COMMIT_INSTRUCTION: &str = "You summarise git activity for a development team.";

const COMMIT_TEMPLATE: &str = "Please summarize the following git commits from the repository:

{records}

Create a concise, human-readable summary that:
1. Identifies major features or changes
2. Groups related commits together
3. Highlights important bug fixes
4. Explains technical changes in plain language
5. Keeps it brief";

const CHANNEL_INSTRUCTION: &str = "You are a newsletter author writing about the ongoing business of our games studio. \
Create a concise summary of the following chat messages from the past week. \
Focus on key topics, decisions, and questions. \
Group related discussions together and highlight important information. \
Write in fluid language, that is easy to understand, with little superlatives.";

const LOOKUP_INSTRUCTION: &str = "You are an expert startup assistant.";

const LOOKUP_TEMPLATE: &str = "Based on the following notes, give:
1. A one-line company summary
2. What type of investments or publishing the person or company normally does

Notes: {notes}
Type: {type}
Status: {status}";

#[derive(Serialize)]
struct CommitView<'a> {
    author: &'a str,
    message: &'a str,
    date: String,
}

fn build_request(input: EnrichmentInput<'_>) -> CompletionRequest {
    match input {
        EnrichmentInput::Commits(grouped) => {
            let view: Vec<CommitView<'_>> = grouped
                .records()
                .map(|r| CommitView {
                    author: r.actor(),
                    message: r.body(),
                    date: r.occurred_at().to_string(),
                })
                .collect();
            // Serialising borrowed strings cannot fail.
            let records = serde_json::to_string_pretty(&view).unwrap_or_default();
            CompletionRequest {
                instruction: COMMIT_INSTRUCTION.to_string(),
                content: COMMIT_TEMPLATE.replace("{records}", &records),
                temperature: Some(0.7),
                max_tokens: None,
            }
        }
        EnrichmentInput::Messages(grouped) => {
            let mut records: Vec<_> = grouped.records().collect();
            records.sort_by_key(|r| r.occurred_at());
            let lines: Vec<String> = records
                .iter()
                .map(|r| format!("[{}] {}: {}", r.occurred_at(), r.actor(), r.body()))
                .collect();
            CompletionRequest {
                instruction: CHANNEL_INSTRUCTION.to_string(),
                content: format!(
                    "Please summarize these chat messages from the past week:\n\n{}",
                    lines.join("\n")
                ),
                temperature: None,
                max_tokens: Some(1500),
            }
        }
        EnrichmentInput::Entry(entry) => CompletionRequest {
            instruction: LOOKUP_INSTRUCTION.to_string(),
            content: LOOKUP_TEMPLATE
                .replace("{notes}", entry.field(RegistryEntry::NOTES).unwrap_or("No notes"))
                .replace("{type}", entry.field(RegistryEntry::TYPE).unwrap_or("Unknown"))
                .replace("{status}", entry.field(RegistryEntry::STATUS).unwrap_or("Unknown")),
            temperature: None,
            max_tokens: None,
        },
    }
}
