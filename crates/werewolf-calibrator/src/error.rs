//! Error types for the werewolf-calibrator crate.
//!
//! None of these ever reach gameplay. A failed calibration run leaves the
//! previous parameter version in force.

use werewolf_inference::InferenceError;
use werewolf_types::MatchId;

/// Errors raised by a match archive backend.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The storage backend failed.
    #[error("archive backend error: {reason}")]
    Backend {
        /// What went wrong.
        reason: String,
    },

    /// A stored record could not be decoded.
    #[error("archived match {match_id} could not be decoded: {reason}")]
    Corrupt {
        /// The undecodable record.
        match_id: MatchId,
        /// Why decoding failed.
        reason: String,
    },
}

/// Errors raised while retraining calibration parameters.
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    /// Not enough archived matches to fit anything.
    #[error("insufficient calibration data: {have} usable matches, need {need}")]
    InsufficientData {
        /// Usable matches available.
        have: usize,
        /// Minimum required.
        need: usize,
    },

    /// Every archived match in the window was unusable.
    #[error("malformed archive: {skipped} records rejected")]
    Malformed {
        /// Number of rejected records.
        skipped: usize,
    },

    /// The archive could not be read or written.
    #[error("archive error: {source}")]
    Archive {
        /// The underlying archive error.
        #[from]
        source: ArchiveError,
    },

    /// The registry refused the new parameter version.
    #[error("publish failed: {source}")]
    Publish {
        /// The underlying registry error.
        #[from]
        source: InferenceError,
    },

    /// The calibrator configuration is internally inconsistent.
    #[error("invalid calibrator configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with it.
        reason: String,
    },
}
