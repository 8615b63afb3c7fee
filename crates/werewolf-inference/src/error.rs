//! Error types for the werewolf-inference crate.

use werewolf_types::PlayerId;

/// Errors raised by the inference engine and the parameter registry.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    /// Evidence named a player who was never seated.
    #[error("unknown player {player} in suspicion model")]
    UnknownPlayer {
        /// The player that was looked up.
        player: PlayerId,
    },

    /// The inference configuration is internally inconsistent.
    #[error("invalid inference configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with it.
        reason: String,
    },

    /// A parameter set was published with a version that does not advance.
    #[error("stale calibration version {offered}; current is {current}")]
    StaleVersion {
        /// Version currently in force.
        current: u64,
        /// Version that was offered.
        offered: u64,
    },
}
