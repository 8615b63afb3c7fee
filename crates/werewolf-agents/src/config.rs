//! Decision maker configuration.

use serde::Deserialize;

use crate::error::DecisionError;

/// Role-specific switches, thresholds and ranking bonuses.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DecisionConfig {
    /// Guard protects nobody on the first night.
    #[serde(default)]
    pub guard_first_night_empty: bool,

    /// Guard may protect itself.
    #[serde(default)]
    pub guard_self_protect: bool,

    /// Witch saves a victim whose wolf-probability is below this.
    #[serde(default = "default_save_threshold")]
    pub save_threshold: f64,

    /// Witch saves whoever is attacked on the first night.
    #[serde(default = "default_true")]
    pub always_save_first_night: bool,

    /// Witch may save herself.
    #[serde(default)]
    pub witch_self_save: bool,

    /// Witch uses at most one potion per night.
    #[serde(default = "default_true")]
    pub one_potion_per_night: bool,

    /// Witch poisons only a suspect at or above this wolf-probability.
    #[serde(default = "default_poison_threshold")]
    pub poison_threshold: f64,

    /// Hunter shoots only a suspect at or above this wolf-probability.
    #[serde(default = "default_shoot_threshold")]
    pub shoot_threshold: f64,

    /// Subtracted from the poison and shoot thresholds late in the match.
    #[serde(default = "default_endgame_relief")]
    pub endgame_relief: f64,

    /// Seer, witch, guard and hunter run for sheriff at or above this trust
    /// in themselves, on the `[0, 1]` trust scale.
    #[serde(default = "default_sheriff_run_god")]
    pub sheriff_run_god: f64,

    /// Villagers run for sheriff at or above this trust.
    #[serde(default = "default_sheriff_run_villager")]
    pub sheriff_run_villager: f64,

    /// Wolves run for sheriff at or above this trust.
    #[serde(default = "default_sheriff_run_wolf")]
    pub sheriff_run_wolf: f64,

    /// A dying good sheriff passes the badge only to a player trusted at
    /// least this much, and tears it up otherwise.
    #[serde(default = "default_badge_min_trust")]
    pub badge_min_trust: f64,

    /// Ranking bonus for the sheriff.
    #[serde(default = "default_sheriff_bonus")]
    pub sheriff_bonus: f64,

    /// Ranking bonus for a claimed seer.
    #[serde(default = "default_seer_claim_bonus")]
    pub seer_claim_bonus: f64,

    /// Ranking bonus for a claimed witch.
    #[serde(default = "default_witch_claim_bonus")]
    pub witch_claim_bonus: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            guard_first_night_empty: false,
            guard_self_protect: false,
            save_threshold: default_save_threshold(),
            always_save_first_night: true,
            witch_self_save: false,
            one_potion_per_night: true,
            poison_threshold: default_poison_threshold(),
            shoot_threshold: default_shoot_threshold(),
            endgame_relief: default_endgame_relief(),
            sheriff_run_god: default_sheriff_run_god(),
            sheriff_run_villager: default_sheriff_run_villager(),
            sheriff_run_wolf: default_sheriff_run_wolf(),
            badge_min_trust: default_badge_min_trust(),
            sheriff_bonus: default_sheriff_bonus(),
            seer_claim_bonus: default_seer_claim_bonus(),
            witch_claim_bonus: default_witch_claim_bonus(),
        }
    }
}

impl DecisionConfig {
    /// Check that every threshold is a probability.
    pub fn validate(&self) -> Result<(), DecisionError> {
        let thresholds = [
            ("save_threshold", self.save_threshold),
            ("poison_threshold", self.poison_threshold),
            ("shoot_threshold", self.shoot_threshold),
            ("endgame_relief", self.endgame_relief),
            ("sheriff_run_god", self.sheriff_run_god),
            ("sheriff_run_villager", self.sheriff_run_villager),
            ("sheriff_run_wolf", self.sheriff_run_wolf),
            ("badge_min_trust", self.badge_min_trust),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(DecisionError::InvalidConfig {
                    reason: format!("{name} {value} must lie in [0, 1]"),
                });
            }
        }
        let bonuses = [self.sheriff_bonus, self.seer_claim_bonus, self.witch_claim_bonus];
        if bonuses.iter().any(|b| !b.is_finite() || *b < 0.0) {
            return Err(DecisionError::InvalidConfig {
                reason: String::from("ranking bonuses must be finite and non-negative"),
            });
        }
        Ok(())
    }
}

const fn default_true() -> bool {
    true
}

const fn default_save_threshold() -> f64 {
    0.5
}

const fn default_poison_threshold() -> f64 {
    0.7
}

const fn default_shoot_threshold() -> f64 {
    0.5
}

const fn default_endgame_relief() -> f64 {
    0.1
}

const fn default_sheriff_run_god() -> f64 {
    0.5
}

const fn default_sheriff_run_villager() -> f64 {
    0.6
}

const fn default_sheriff_run_wolf() -> f64 {
    0.7
}

const fn default_badge_min_trust() -> f64 {
    0.5
}

const fn default_sheriff_bonus() -> f64 {
    0.2
}

const fn default_seer_claim_bonus() -> f64 {
    0.3
}

const fn default_witch_claim_bonus() -> f64 {
    0.2
}
