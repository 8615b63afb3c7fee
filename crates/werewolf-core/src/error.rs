//! Error types for the werewolf-core crate.
//!
//! Only [`MatchError::StateCorruption`] and the component errors wrapped
//! here abort a match. An [`MatchError::InvalidTarget`] is built for the
//! log line and then replaced by an abstention; it never escapes a phase.

use werewolf_agents::DecisionError;
use werewolf_detection::DetectionError;
use werewolf_inference::InferenceError;
use werewolf_ledger::LedgerError;
use werewolf_types::{ActionKind, PlayerId};

use crate::config::ConfigError;

/// Errors raised while running a match.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// A submitted action named a player outside the legal candidate set.
    #[error("{player} submitted illegal {kind:?} target {target}")]
    InvalidTarget {
        /// The acting player.
        player: PlayerId,
        /// The action kind.
        kind: ActionKind,
        /// The rejected target.
        target: PlayerId,
    },

    /// A player was asked for an action their role or state does not allow.
    #[error("{player} is not eligible to {kind:?}")]
    NotEligible {
        /// The player.
        player: PlayerId,
        /// The action kind.
        kind: ActionKind,
    },

    /// A game invariant was violated. The match must stop.
    #[error("state corruption: {reason}")]
    StateCorruption {
        /// What was found to be inconsistent.
        reason: String,
    },

    /// The match configuration is unusable.
    #[error("configuration error: {source}")]
    Config {
        /// The underlying configuration error.
        #[from]
        source: ConfigError,
    },

    /// The trust ledger rejected an update.
    #[error("trust ledger error: {source}")]
    Ledger {
        /// The underlying ledger error.
        #[from]
        source: LedgerError,
    },

    /// The suspicion model rejected an update.
    #[error("inference error: {source}")]
    Inference {
        /// The underlying inference error.
        #[from]
        source: InferenceError,
    },

    /// The detection pipeline could not be built.
    #[error("detection setup error: {source}")]
    Detection {
        /// The underlying detection error.
        #[from]
        source: DetectionError,
    },

    /// The decision makers could not be built.
    #[error("decision setup error: {source}")]
    Decision {
        /// The underlying decision error.
        #[from]
        source: DecisionError,
    },
}

impl MatchError {
    /// Shorthand for a [`MatchError::StateCorruption`].
    pub fn corruption(reason: impl Into<String>) -> Self {
        Self::StateCorruption {
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors that must abort the match.
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::InvalidTarget { .. } | Self::NotEligible { .. })
    }
}

/// Errors an [`ActionSource`](crate::source::ActionSource) may report.
///
/// Every variant is treated as an abstention by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The agent behind the source could not be reached.
    #[error("action source unavailable: {reason}")]
    Unavailable {
        /// Description of the failure.
        reason: String,
    },

    /// The agent answered with something that is not a decision.
    #[error("unparseable decision: {reason}")]
    Malformed {
        /// Description of the failure.
        reason: String,
    },
}
