//! Digest trigger event sources.
//!
//! Implements [`pipeline::EventSource`] with two backends:
//!
//! - [`ScheduleTicker`]: one per scheduled pipeline. Sleeps until the next
//!   time its schedule expression fires, then emits a scheduled trigger.
//! - [`CommandInbox`]: receives triggers from the slash-command HTTP
//!   receiver ([`commands_router`]), which verifies Slack's request
//!   signature and answers immediately, before any run starts.
//!
//! ## Deployment
//!
//! | Mode | Event sources | Notes |
//! |------|---------------|-------|
//! | `digest run` | none (single-shot trigger synthesised in `cli`) | |
//! | `digest serve` | one `ScheduleTicker` per enabled schedule + `CommandInbox` | Requires a public HTTPS endpoint for slash commands |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP, signature checks and clocks live here. The
//! [`pipeline`] crate sees only [`pipeline::EventSource`] and
//! [`pipeline::TriggerEvent`].

mod commands;
mod signature;
mod ticker;

pub use commands::{
    command_inbox, commands_router, kind_for_command, serve_commands, CommandInbox,
    CommandSender, CommandsState, SlashCommand, COMMANDS_PATH,
};
pub use signature::{verify_signature, SignatureError, MAX_CLOCK_SKEW_SECS};
pub use ticker::ScheduleTicker;
