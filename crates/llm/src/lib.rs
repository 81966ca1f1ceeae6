//! Digest generative-text adapter.
//!
//! Implements [`pipeline::SummaryProvider`] for OpenAI's chat completions
//! API. Any endpoint speaking the same protocol works by overriding the base
//! URL.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, request formatting and response
//! parsing live here. The [`pipeline`] crate sees only
//! [`pipeline::SummaryProvider`] and decides itself what to do on failure;
//! this crate never substitutes placeholder text.

mod openai;

pub use openai::{OpenAiProvider, OpenAiProviderError, DEFAULT_BASE_URL, DEFAULT_MODEL};
