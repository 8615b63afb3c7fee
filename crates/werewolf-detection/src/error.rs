//! Error types for the detection pipeline.
//!
//! [`CompletionError`] is what the external text-completion capability
//! reports. [`DetectionError`] is what a scorer reports; none of its
//! variants is ever fatal to a match.

use crate::scorer::ScorerKind;

/// Failures of the external text-completion capability.
///
/// All three are retryable; after the retry budget the caller degrades.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    /// Network failure or timeout.
    #[error("completion service unavailable: {reason}")]
    Unavailable {
        /// What went wrong.
        reason: String,
    },

    /// The service is throttling requests.
    #[error("completion service rate limited")]
    RateLimited {
        /// Suggested wait before the next attempt, if the service gave one.
        retry_after_ms: Option<u64>,
    },

    /// The service answered with something unusable.
    #[error("invalid completion response: {reason}")]
    InvalidResponse {
        /// Why the response was rejected.
        reason: String,
    },
}

/// Errors raised while scoring a message.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    /// A scorer could not produce a verdict. No evidence is emitted for it.
    #[error("{scorer} scorer unavailable: {source}")]
    ScorerUnavailable {
        /// Which scorer failed.
        scorer: ScorerKind,
        /// The underlying completion failure.
        source: CompletionError,
    },

    /// A built-in detection pattern failed to compile.
    #[error("invalid detection pattern: {source}")]
    Pattern {
        /// The underlying regex error.
        #[from]
        source: regex::Error,
    },

    /// A prompt template failed to load or render.
    #[error("prompt template error: {0}")]
    Template(String),
}
