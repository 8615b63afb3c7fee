//! Calibrator configuration.

use serde::Deserialize;

use crate::error::CalibrationError;

/// When to retrain and how to fit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CalibratorConfig {
    /// Retrain after this many newly completed matches.
    #[serde(default = "default_retrain_interval")]
    pub retrain_interval: usize,

    /// Archived matches required before the first fit.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Observations of a kind required before its weight is refitted.
    #[serde(default = "default_min_observations")]
    pub min_observations: usize,

    /// Pseudo-count added to every cell of the contingency table.
    #[serde(default = "default_laplace_alpha")]
    pub laplace_alpha: f64,

    /// Upper clamp on a fitted log-likelihood ratio.
    #[serde(default = "default_max_log_lr")]
    pub max_log_lr: f64,

    /// Log-likelihood ratio that maps to weight `1.0`.
    #[serde(default = "default_reference_log_lr")]
    pub reference_log_lr: f64,

    /// Most recent matches kept for fitting.
    #[serde(default = "default_window")]
    pub window: usize,
}

impl Default for CalibratorConfig {
    fn default() -> Self {
        Self {
            retrain_interval: default_retrain_interval(),
            min_samples: default_min_samples(),
            min_observations: default_min_observations(),
            laplace_alpha: default_laplace_alpha(),
            max_log_lr: default_max_log_lr(),
            reference_log_lr: default_reference_log_lr(),
            window: default_window(),
        }
    }
}

impl CalibratorConfig {
    /// Check that the trigger and fit settings are usable.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        if self.retrain_interval == 0 {
            return Err(CalibrationError::InvalidConfig {
                reason: String::from("retrain_interval must be at least 1"),
            });
        }
        if self.window < self.min_samples {
            return Err(CalibrationError::InvalidConfig {
                reason: format!(
                    "window {} cannot hold min_samples {}",
                    self.window, self.min_samples
                ),
            });
        }
        if !(self.laplace_alpha > 0.0 && self.max_log_lr > 0.0 && self.reference_log_lr > 0.0) {
            return Err(CalibrationError::InvalidConfig {
                reason: String::from("laplace_alpha, max_log_lr and reference_log_lr must be positive"),
            });
        }
        Ok(())
    }
}

const fn default_retrain_interval() -> usize {
    5
}

const fn default_min_samples() -> usize {
    20
}

const fn default_min_observations() -> usize {
    10
}

const fn default_laplace_alpha() -> f64 {
    1.0
}

const fn default_max_log_lr() -> f64 {
    2.0
}

const fn default_reference_log_lr() -> f64 {
    0.5
}

const fn default_window() -> usize {
    500
}
