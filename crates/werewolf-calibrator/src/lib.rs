//! Online calibration for the werewolf decision engine.
//!
//! Finished matches are archived; every few matches the weak-evidence
//! weights are refitted against who actually turned out to be a wolf and
//! published as a new immutable parameter version. Running matches pick the
//! new version up at their next refresh point, never mid-phase.
//!
//! # Modules
//!
//! - [`archive`] -- The [`MatchArchive`] capability and [`InMemoryArchive`]
//! - [`calibrator`] -- Trigger logic and publishing
//! - [`config`] -- Trigger and fit settings
//! - [`fit`] -- The statistical fit
//! - [`error`] -- Error types

pub mod archive;
pub mod calibrator;
pub mod config;
pub mod error;
pub mod fit;

pub use archive::{ArchivedMatch, InMemoryArchive, MatchArchive};
pub use calibrator::{CalibrationReport, Calibrator};
pub use config::CalibratorConfig;
pub use error::{ArchiveError, CalibrationError};
pub use fit::{Fit, KindFit, check_record, fit};
