//! Error types for the self-play binary.
//!
//! [`EngineError`] wraps every failure that can stop the driver before or
//! between matches. A single failed match is logged and counted instead.

use werewolf_agents::DecisionError;
use werewolf_calibrator::CalibrationError;
use werewolf_core::ConfigError;
use werewolf_db::DbError;

/// Top-level error for the self-play binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The match archive database could not be reached or migrated.
    #[error("database error: {source}")]
    Database {
        /// The underlying database error.
        #[from]
        source: DbError,
    },

    /// The calibrator rejected its configuration.
    #[error("calibrator error: {source}")]
    Calibrator {
        /// The underlying calibration error.
        #[from]
        source: CalibrationError,
    },

    /// The decision makers rejected their configuration.
    #[error("decision error: {source}")]
    Decision {
        /// The underlying decision error.
        #[from]
        source: DecisionError,
    },

    /// The concurrency limiter was closed while matches were pending.
    #[error("scheduler error: {message}")]
    Scheduler {
        /// What went wrong.
        message: String,
    },
}
