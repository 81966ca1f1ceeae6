//! Digest orchestration.
//!
//! This crate sequences the stages defined in [`pipeline`]: it fetches
//! bounded batches from the record sources, resolves actor identities
//! through a per-run cache, drives normalise, enrich and render, and hands
//! the resulting messages to the dispatcher. The [`RunCoordinator`] decides
//! which trigger events become runs.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Everything here talks to the outside world only
//! through the port traits in [`pipeline::ports`]. It contains no domain
//! rules of its own.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identity`] | Per-run actor name cache |
//! | [`sources`] | Bounded record fetching for each pipeline kind |
//! | [`dispatch`] | Message delivery and per-message reports |
//! | [`executor`] | One run, source to dispatch |
//! | [`coordinator`] | Trigger intake and per-kind mutual exclusion |

pub mod coordinator;
pub mod dispatch;
pub mod executor;
pub mod identity;
pub mod sources;

pub use coordinator::{acknowledgement, RunCoordinator, RunHandle, TriggerOutcome};
pub use dispatch::{DeliveryReport, Dispatcher};
pub use executor::{
    ChannelPipeline, CommitPipeline, LookupPipeline, PipelineExecutor, RunReport, SourceStatus,
};
pub use identity::IdentityCache;
