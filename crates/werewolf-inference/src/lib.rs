//! Suspicion inference for the werewolf decision engine.
//!
//! Turns the evidence stream into a per-player probability of being
//! wolf-aligned, and holds the versioned calibration parameters that tune
//! how much weak evidence counts.
//!
//! # Modules
//!
//! - [`config`] -- Bounds and base likelihood ratios
//! - [`engine`] -- The [`SuspicionEngine`]
//! - [`params`] -- [`CalibrationParams`] and the single-writer [`ParamsRegistry`]
//! - [`error`] -- Error types

pub mod config;
pub mod engine;
pub mod error;
pub mod params;

pub use config::InferenceConfig;
pub use engine::{Observation, SuspicionEngine, likelihood_ratio, safe_divide};
pub use error::InferenceError;
pub use params::{CalibrationParams, ParamsHandle, ParamsRegistry};
