//! Port traits: the contracts the pipeline expects from its collaborators.
//!
//! Infrastructure crates implement these; orchestration code only ever holds
//! them as `Arc<dyn Trait>`. All traits are `Send + Sync` so a single adapter
//! instance can serve overlapping runs of different pipelines.

use async_trait::async_trait;

use crate::{
    ActorId, ChannelId, Cursor, DeliveryError, EnrichmentError, HistoryPage, IdentityError,
    RawCommit, RegistryEntry, RegistryError, RepositoryId, SourceError, Timestamp, TriggerEvent,
};

// ---------------------------------------------------------------------------
// Record sources
// ---------------------------------------------------------------------------

/// Source-control commit history.
#[async_trait]
pub trait CommitSource: Send + Sync {
    /// The repository this source reads.
    fn repository(&self) -> &RepositoryId;

    /// Commits made at or after `since`, newest first as the upstream orders
    /// them, at most `limit` of them. One upstream request, no cursor.
    async fn list_commits(
        &self,
        since: Timestamp,
        limit: usize,
    ) -> Result<Vec<RawCommit>, SourceError>;
}

/// Paginated chat-channel history.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Fetches one page of at most `limit` messages posted at or after
    /// `oldest`, continuing from `cursor` when given.
    async fn history_page(
        &self,
        channel: &ChannelId,
        cursor: Option<&Cursor>,
        oldest: Timestamp,
        limit: usize,
    ) -> Result<HistoryPage, SourceError>;
}

/// Maps a chat actor id to a human-readable display name.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn display_name(&self, actor: &ActorId) -> Result<String, IdentityError>;
}

/// The full contact registry, loaded once per lookup run.
#[async_trait]
pub trait RegistrySource: Send + Sync {
    async fn load(&self) -> Result<Vec<RegistryEntry>, RegistryError>;
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

/// One chat-style completion call: a fixed instruction plus serialised input.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System-role instruction describing the desired output.
    pub instruction: String,
    /// User-role content carrying the serialised records.
    pub content: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// A generative-text capability.
///
/// Implementations return the model output verbatim (surrounding whitespace
/// aside); they never substitute placeholder text on failure.
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, EnrichmentError>;
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// Posts a message to a channel.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn post_message(&self, channel: &ChannelId, text: &str) -> Result<(), DeliveryError>;
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

/// A stream of run requests (schedule ticks, inbound commands).
///
/// Returns `None` once the source is exhausted or shut down.
#[async_trait]
pub trait EventSource: Send {
    async fn next_event(&mut self) -> Option<TriggerEvent>;
}
