//! Core domain for Digest.
//!
//! This crate contains every domain concept of the Aggregate–Summarize–Deliver
//! pipeline: newtype identifiers, raw and normalised record types, the error
//! taxonomy, the port traits infrastructure crates implement, and the pure
//! stages (normalisation, rendering, fuzzy matching, bounded pagination,
//! schedule expressions) plus the best-effort enrichment stage.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no network I/O
//! dependencies. It defines *what* is needed; infrastructure crates define
//! *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ChannelId`, `ActorId`, `RepositoryId`, etc.) |
//! | [`types`] | Value types (`ActivityRecord`, `GroupedRecords`, `FetchWindow`, `MatchSet`, etc.) |
//! | [`errors`] | Per-seam error types |
//! | [`ports`] | Collaborator traits (`CommitSource`, `HistorySource`, `MessageSink`, etc.) |
//! | [`normalize`] | Raw records to grouped activity records |
//! | [`enrich`] | Best-effort summarisation with fallback |
//! | [`render`] | Message bodies |
//! | [`fuzzy`] | Registry search index |
//! | [`pagination`] | Bounded cursor walking |
//! | [`schedule`] | Five-field schedule expressions |

pub mod enrich;
pub mod errors;
pub mod fuzzy;
pub mod identifiers;
pub mod normalize;
pub mod pagination;
pub mod ports;
pub mod render;
pub mod schedule;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use enrich::{EnrichmentInput, Enricher};
pub use errors::{
    DeliveryError, EnrichmentError, IdentityError, RegistryError, ScheduleError, SourceError,
};
pub use fuzzy::FuzzyIndex;
pub use identifiers::{ActorId, ChannelId, Cursor, PipelineRunId, RepositoryId};
pub use pagination::{HistoryPager, PageRequest, HISTORY_PAGE_SIZE};
pub use ports::{
    CommitSource, CompletionRequest, EventSource, HistorySource, IdentityResolver, MessageSink,
    RegistrySource, SummaryProvider,
};
pub use schedule::Schedule;
pub use types::{
    ActivityRecord, ActorGroup, CommandContext, EnrichmentResult, FetchWindow, GroupedRecords,
    HistoryPage, MatchSet, PipelineKind, RawCommit, RawMessage, RawRecords, RegistryEntry,
    ScoredEntry, SourceMeta, Timestamp, TriggerEvent, TriggerOrigin, UnavailableReason,
    UnknownPipelineKind,
};
