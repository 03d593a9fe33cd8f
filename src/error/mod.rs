//! Error Handling Module
//!
//! One crate-wide error type with classification helpers. The failure
//! classifier (`jobs::classifier`) never constructs errors itself; it
//! returns typed outcomes. The adaptive poller is the first layer that is
//! allowed to fail, and it fails only with classified, typed errors.

use thiserror::Error;

/// Errors produced by the bridge core.
#[derive(Error, Debug, Clone)]
pub enum GenError {
    /// The remote job record has not materialized yet. Tolerated by the
    /// poller within its warm-up grace window, fatal beyond it.
    #[error("job record not found: {0}")]
    RecordNotFound(String),

    /// The prompt or the generated content was rejected by the vendor's
    /// policy filter. Never retried.
    #[error("content filtered: {0}")]
    ContentFiltered(String),

    /// The account has no generation credit left. Never retried, kept
    /// distinguishable so callers can react (e.g. by refilling balance).
    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    /// Generic terminal generation failure with a best-effort message.
    #[error("generation failed: {message}")]
    GenerationFailed {
        code: Option<String>,
        message: String,
    },

    /// A poll loop hit its count or time ceiling with zero items produced.
    /// With partial items the poller degrades to a successful outcome
    /// instead of raising this.
    #[error("poll timed out after {poll_count} polls ({elapsed_secs}s) with no items")]
    PollTimeout { poll_count: u32, elapsed_secs: u64 },

    /// Transport-class failure at the submission or probe boundary.
    /// Retryable with a small bounded retry; never retried inside the poll
    /// loop itself.
    #[error("transport error: {0}")]
    TransportError(String),

    /// The live event stream terminated abnormally. Streaming consumers
    /// observe this instead of a terminal marker.
    #[error("stream error: {0}")]
    StreamError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    /// The caller disconnected or cancelled the session.
    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse error category for callers that react to classes of failure
/// rather than individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Policy violation, surfaced immediately and never retried.
    Policy,
    /// Out of credit, surfaced immediately and never retried.
    Quota,
    /// Transient condition at the transport/probe boundary.
    Transient,
    /// A bounded wait ran out without producing anything.
    Timeout,
    /// The live connection failed mid-stream.
    Stream,
    /// Malformed input or payload.
    Protocol,
    Cancelled,
    Fatal,
}

impl GenError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ContentFiltered(_) => ErrorCategory::Policy,
            Self::QuotaExhausted(_) => ErrorCategory::Quota,
            Self::RecordNotFound(_) | Self::TransportError(_) => ErrorCategory::Transient,
            Self::PollTimeout { .. } => ErrorCategory::Timeout,
            Self::StreamError(_) => ErrorCategory::Stream,
            Self::ParseError(_) | Self::InvalidRequest(_) => ErrorCategory::Protocol,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::GenerationFailed { .. } | Self::Internal(_) => ErrorCategory::Fatal,
        }
    }

    /// Whether a bounded retry at the submission/probe boundary is
    /// appropriate. Policy and quota failures are never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransportError(_) | Self::RecordNotFound(_))
    }
}

impl From<serde_json::Error> for GenError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(format!("JSON error: {err}"))
    }
}
