//! Configuration loading and typed config structures for a match.
//!
//! One [`GameConfig`] is built per process (usually from a YAML file) and
//! handed to every [`Match`](crate::orchestrator::Match) constructor. Each
//! component owns its own section type; this module only aggregates them
//! and checks that the combination is usable. Nothing here is read again
//! after a match starts.

use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use werewolf_agents::DecisionConfig;
use werewolf_calibrator::CalibratorConfig;
use werewolf_detection::DetectionConfig;
use werewolf_inference::InferenceConfig;
use werewolf_ledger::TrustConfig;
use werewolf_types::Role;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A section parsed but holds values that cannot work together.
    #[error("invalid {section} configuration: {reason}")]
    Invalid {
        /// The offending section.
        section: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GameConfig {
    /// Seating, deadlines and round cap.
    #[serde(default, rename = "match")]
    pub game: MatchConfig,

    /// Trust ledger range, decay and evidence deltas.
    #[serde(default)]
    pub trust: TrustConfig,

    /// Suspicion model bounds and likelihood settings.
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Detection scorers.
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Role decision thresholds.
    #[serde(default)]
    pub decisions: DecisionConfig,

    /// Online calibration trigger and fit.
    #[serde(default)]
    pub calibrator: CalibratorConfig,

    /// Match archive connection.
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl GameConfig {
    /// Load configuration from a YAML file.
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a YAML string.
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Override deployment settings with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DATABASE_URL") {
            self.database.url = Some(val);
        }
        if let Ok(val) = std::env::var("WEREWOLF_PHASE_TIMEOUT_MS") {
            match val.parse::<u64>() {
                Ok(ms) => self.game.phase_timeout_ms = ms,
                Err(e) => warn!(value = %val, error = %e, "ignoring WEREWOLF_PHASE_TIMEOUT_MS"),
            }
        }
    }

    /// Check every section and the ranges they share.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.game.validate()?;
        self.trust.validate().map_err(|e| invalid("trust", e))?;
        self.inference.validate().map_err(|e| invalid("inference", e))?;
        self.decisions.validate().map_err(|e| invalid("decisions", e))?;
        self.calibrator.validate().map_err(|e| invalid("calibrator", e))?;

        let detection = &self.detection;
        if detection.completion_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                section: "detection",
                reason: String::from("completion_timeout_ms must be positive"),
            });
        }
        for (name, value) in [
            ("injection_threshold", detection.injection_threshold),
            ("quote_similarity", detection.quote_similarity),
            ("speech_neutral_band", detection.speech_neutral_band),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid {
                    section: "detection",
                    reason: format!("{name} {value} must lie in [0, 1]"),
                });
            }
        }
        Ok(())
    }
}

fn invalid(section: &'static str, err: impl core::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        section,
        reason: err.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

/// When a running match picks up newly published calibration parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Keep the version the match started with until it ends.
    #[default]
    MatchBoundary,
    /// Re-read the registry before every phase.
    PhaseBoundary,
}

/// Seating and pacing of a single match.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MatchConfig {
    /// Roles dealt, one per seat. Shuffled by the driver, not here.
    #[serde(default = "default_roles")]
    pub roles: Vec<Role>,

    /// Deadline for a whole phase. Every request and speech of the phase
    /// shares it.
    #[serde(default = "default_phase_timeout_ms")]
    pub phase_timeout_ms: u64,

    /// Rounds played before the match is called a draw.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Hold a sheriff election on the first day.
    #[serde(default = "default_true")]
    pub sheriff_election: bool,

    /// Weight of the sheriff's day vote.
    #[serde(default = "default_sheriff_vote_weight")]
    pub sheriff_vote_weight: Decimal,

    /// When calibration updates reach this match.
    #[serde(default)]
    pub params_refresh: RefreshPolicy,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            roles: default_roles(),
            phase_timeout_ms: default_phase_timeout_ms(),
            max_rounds: default_max_rounds(),
            sheriff_election: true,
            sheriff_vote_weight: default_sheriff_vote_weight(),
            params_refresh: RefreshPolicy::default(),
        }
    }
}

impl MatchConfig {
    /// Deadline as a [`Duration`].
    pub const fn phase_timeout(&self) -> Duration {
        Duration::from_millis(self.phase_timeout_ms)
    }

    /// Number of wolf-aligned seats.
    pub fn wolf_count(&self) -> usize {
        self.roles.iter().filter(|r| r.is_wolf_aligned()).count()
    }

    /// Check that the seating can produce a real match.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let wolves = self.wolf_count();
        let good = self.roles.len().saturating_sub(wolves);
        if wolves == 0 || good <= wolves {
            return Err(ConfigError::Invalid {
                section: "match",
                reason: format!("{wolves} wolves against {good} good players cannot start a match"),
            });
        }
        for unique in [Role::Seer, Role::Witch, Role::Guard] {
            if self.roles.iter().filter(|r| **r == unique).count() > 1 {
                return Err(ConfigError::Invalid {
                    section: "match",
                    reason: format!("at most one {unique} may be seated"),
                });
            }
        }
        if self.phase_timeout_ms == 0 || self.max_rounds == 0 {
            return Err(ConfigError::Invalid {
                section: "match",
                reason: String::from("phase_timeout_ms and max_rounds must be positive"),
            });
        }
        if self.sheriff_vote_weight < Decimal::ONE {
            return Err(ConfigError::Invalid {
                section: "match",
                reason: format!("sheriff_vote_weight {} must be at least 1", self.sheriff_vote_weight),
            });
        }
        Ok(())
    }
}

fn default_roles() -> Vec<Role> {
    let mut roles = vec![Role::Wolf; 3];
    roles.extend([
        Role::WolfKing,
        Role::Seer,
        Role::Witch,
        Role::Guard,
        Role::Hunter,
    ]);
    roles.extend([Role::Villager; 4]);
    roles
}

const fn default_phase_timeout_ms() -> u64 {
    5000
}

const fn default_max_rounds() -> u32 {
    20
}

const fn default_true() -> bool {
    true
}

const fn default_sheriff_vote_weight() -> Decimal {
    Decimal::TWO
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// Match archive connection settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL URL. Without one, matches are archived in memory.
    #[serde(default)]
    pub url: Option<String>,

    /// Connection pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

const fn default_max_connections() -> u32 {
    5
}
