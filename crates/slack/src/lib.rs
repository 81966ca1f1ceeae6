//! Digest Slack adapter.
//!
//! One [`SlackClient`] implements three of the [`pipeline`] ports over the
//! Slack Web API:
//!
//! | Port | Method |
//! |------|--------|
//! | [`pipeline::MessageSink`] | `chat.postMessage` |
//! | [`pipeline::HistorySource`] | `conversations.history` |
//! | [`pipeline::IdentityResolver`] | `users.info` |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Token handling, request encoding and Slack's
//! `"ok": false` error envelope are dealt with here. The [`pipeline`] crate
//! sees only its own record and error types.

mod client;
mod wire;

pub use client::{SlackClient, SlackClientError, DEFAULT_API_BASE};
