//! Error taxonomy for the Digest pipeline.
//!
//! Each collaborator seam has its own error type. None of them is fatal: the
//! orchestration layer maps every one of them to a degraded outcome (no
//! records, no summary block, an "Unknown User" placeholder, or a logged
//! delivery failure) and the pipeline always returns to idle.

use thiserror::Error;

use crate::ActorId;

// ---------------------------------------------------------------------------
// Record sources
// ---------------------------------------------------------------------------

/// An upstream fetch failed or returned an error status.
///
/// The pipeline treats this as "zero records" and says so explicitly in the
/// delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The request never produced a response (connect, TLS, timeout).
    #[error("source request failed: {0}")]
    Transport(String),

    /// The upstream answered with a non-success status.
    #[error("source returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The upstream reported an application-level error in a success response.
    #[error("source rejected the request: {0}")]
    Api(String),

    /// The response body could not be decoded.
    #[error("source response was malformed: {0}")]
    Malformed(String),
}

// ---------------------------------------------------------------------------
// Identity resolution
// ---------------------------------------------------------------------------

/// An actor id could not be turned into a display name.
///
/// Callers substitute the literal "Unknown User" and continue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("identity lookup failed: {0}")]
    Transport(String),

    #[error("identity lookup returned HTTP {status}")]
    Status { status: u16 },

    #[error("identity lookup rejected: {0}")]
    Api(String),

    /// The platform knows the user but reports no usable name.
    #[error("no display name for actor {0}")]
    NotFound(ActorId),
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

/// The generative-text call failed. Logged, then reported downstream as
/// [`crate::EnrichmentResult::Unavailable`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrichmentError {
    #[error("completion request failed: {0}")]
    Transport(String),

    #[error("completion endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("completion response was malformed: {0}")]
    Malformed(String),
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// Posting a message to a channel failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("post request failed: {0}")]
    Transport(String),

    #[error("messaging platform returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The platform accepted the request but refused the message
    /// (e.g. Slack `{"ok": false, "error": "channel_not_found"}`).
    #[error("messaging platform rejected the message: {0}")]
    Rejected(String),
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Loading the contact registry failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("registry file could not be read: {0}")]
    Io(String),

    #[error("registry could not be parsed: {0}")]
    Parse(String),

    #[error("registry request failed: {0}")]
    Transport(String),

    #[error("registry endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

// ---------------------------------------------------------------------------
// Schedules
// ---------------------------------------------------------------------------

/// A schedule expression or its day/time inputs are invalid.
///
/// Produced at configuration load time; the process never starts with an
/// invalid schedule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("invalid schedule expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("unknown day name '{0}'")]
    InvalidDay(String),

    #[error("invalid time '{0}' (expected HH:MM)")]
    InvalidTime(String),
}
