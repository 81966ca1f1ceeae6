//! Digest GitHub adapter.
//!
//! Implements [`pipeline::CommitSource`] against the GitHub REST API with a
//! plain `reqwest` client. Only the commit listing endpoint is used.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules.
//! Authentication, request headers and wire formats are handled here; the
//! [`pipeline`] crate only ever sees [`pipeline::RawCommit`].

mod client;
mod wire;

pub use client::{GithubClient, GithubClientError, DEFAULT_API_BASE};
