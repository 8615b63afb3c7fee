//! Error types for the werewolf-agents crate.

/// Errors raised while setting up decision makers.
///
/// Deciding itself never fails: an empty or unrankable candidate set
/// produces an abstain or a [`DecisionFallback`](crate::DecisionFallback).
#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    /// The decision configuration is internally inconsistent.
    #[error("invalid decision configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with it.
        reason: String,
    },
}
