//! Inference engine configuration.

use serde::Deserialize;

use crate::error::InferenceError;

/// Numeric bounds and base likelihood ratios for the suspicion model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InferenceConfig {
    /// Lowest wolf-probability any living player can have.
    #[serde(default = "default_floor")]
    pub floor: f64,

    /// Highest wolf-probability any living player can have.
    #[serde(default = "default_ceiling")]
    pub ceiling: f64,

    /// Likelihood ratio of a seer check (applied as `r:1` or `1:r`).
    #[serde(default = "default_check_ratio")]
    pub check_ratio: f64,

    /// Log-likelihood per trust point of weak evidence, before the
    /// calibrated per-kind weight is applied.
    #[serde(default = "default_weak_scale")]
    pub weak_scale: f64,

    /// Largest log-odds shift a single update may apply.
    #[serde(default = "default_max_log_shift")]
    pub max_log_shift: f64,

    /// How strongly trust scores shade the blended suspicion, in log-odds
    /// per full trust range.
    #[serde(default = "default_trust_feature_weight")]
    pub trust_feature_weight: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            floor: default_floor(),
            ceiling: default_ceiling(),
            check_ratio: default_check_ratio(),
            weak_scale: default_weak_scale(),
            max_log_shift: default_max_log_shift(),
            trust_feature_weight: default_trust_feature_weight(),
        }
    }
}

impl InferenceConfig {
    /// Check that bounds and ratios are usable.
    pub fn validate(&self) -> Result<(), InferenceError> {
        if !(self.floor > 0.0 && self.floor < self.ceiling && self.ceiling < 1.0) {
            return Err(InferenceError::InvalidConfig {
                reason: format!(
                    "need 0 < floor < ceiling < 1, got floor {} ceiling {}",
                    self.floor, self.ceiling
                ),
            });
        }
        if !(self.check_ratio > 1.0 && self.check_ratio.is_finite()) {
            return Err(InferenceError::InvalidConfig {
                reason: format!("check_ratio {} must be a finite value above 1", self.check_ratio),
            });
        }
        if !(self.weak_scale >= 0.0 && self.max_log_shift > 0.0) {
            return Err(InferenceError::InvalidConfig {
                reason: String::from("weak_scale must be non-negative and max_log_shift positive"),
            });
        }
        Ok(())
    }
}

const fn default_floor() -> f64 {
    0.01
}

const fn default_ceiling() -> f64 {
    0.99
}

const fn default_check_ratio() -> f64 {
    9.0
}

const fn default_weak_scale() -> f64 {
    0.02
}

const fn default_max_log_shift() -> f64 {
    4.0
}

const fn default_trust_feature_weight() -> f64 {
    1.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        InferenceConfig::default().validate().unwrap();
    }

    #[test]
    fn floor_above_ceiling_is_rejected() {
        let config = InferenceConfig {
            floor: 0.6,
            ceiling: 0.4,
            ..InferenceConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: InferenceConfig = serde_yml::from_str("check_ratio: 12.0\n").unwrap();
        assert!((config.check_ratio - 12.0).abs() < f64::EPSILON);
        assert!((config.floor - 0.01).abs() < f64::EPSILON);
    }
}
