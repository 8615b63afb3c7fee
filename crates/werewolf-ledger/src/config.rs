//! Trust ledger configuration and evidence strength constructors.
//!
//! Every evidence record produced by the engine gets its signed strength
//! from this table, so the ledger and the components that emit evidence
//! agree on what "a seer said wolf" is worth in trust points.

use rust_decimal::Decimal;
use serde::Deserialize;

use werewolf_types::{Evidence, EvidenceKind, PlayerId};

use crate::error::LedgerError;

/// Trust score bounds, decay, and per-kind deltas.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrustConfig {
    /// Lowest possible trust score.
    #[serde(default = "default_min_score")]
    pub min_score: Decimal,

    /// Highest possible trust score.
    #[serde(default = "default_max_score")]
    pub max_score: Decimal,

    /// Neutral score every player starts at and decays toward.
    #[serde(default = "default_neutral_score")]
    pub neutral_score: Decimal,

    /// Fraction of the distance to neutral removed at each round start.
    #[serde(default = "default_decay_rate")]
    pub decay_rate: Decimal,

    /// Number of recent changes kept per player.
    #[serde(default = "default_history_len")]
    pub history_len: usize,

    /// Delta for a seer check that came back wolf.
    #[serde(default = "default_check_wolf_delta")]
    pub check_wolf_delta: Decimal,

    /// Delta for a seer check that came back good.
    #[serde(default = "default_check_good_delta")]
    pub check_good_delta: Decimal,

    /// Delta for an injection attempt at full confidence.
    #[serde(default = "default_injection_delta")]
    pub injection_delta: Decimal,

    /// Delta for a speech in which every quotation was false.
    #[serde(default = "default_false_quote_delta")]
    pub false_quote_delta: Decimal,

    /// Points per unit of speech quality away from 0.5.
    #[serde(default = "default_speech_scale")]
    pub speech_scale: Decimal,

    /// Delta for voting a certain wolf (negated for a certain good player).
    #[serde(default = "default_vote_delta")]
    pub vote_delta: Decimal,

    /// Delta for a player who survived a wolf attack thanks to protection.
    #[serde(default = "default_protect_delta")]
    pub protect_delta: Decimal,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            max_score: default_max_score(),
            neutral_score: default_neutral_score(),
            decay_rate: default_decay_rate(),
            history_len: default_history_len(),
            check_wolf_delta: default_check_wolf_delta(),
            check_good_delta: default_check_good_delta(),
            injection_delta: default_injection_delta(),
            false_quote_delta: default_false_quote_delta(),
            speech_scale: default_speech_scale(),
            vote_delta: default_vote_delta(),
            protect_delta: default_protect_delta(),
        }
    }
}

impl TrustConfig {
    /// Check that the bounds and rates are consistent.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.min_score >= self.max_score {
            return Err(LedgerError::InvalidConfig {
                reason: format!(
                    "min_score {} must be below max_score {}",
                    self.min_score, self.max_score
                ),
            });
        }
        if self.neutral_score < self.min_score || self.neutral_score > self.max_score {
            return Err(LedgerError::InvalidConfig {
                reason: format!("neutral_score {} is outside the score range", self.neutral_score),
            });
        }
        if self.decay_rate.is_sign_negative() || self.decay_rate > Decimal::ONE {
            return Err(LedgerError::InvalidConfig {
                reason: format!("decay_rate {} must lie in [0, 1]", self.decay_rate),
            });
        }
        if self.check_wolf_delta >= Decimal::ZERO || self.check_good_delta <= Decimal::ZERO {
            return Err(LedgerError::InvalidConfig {
                reason: String::from("check deltas must be negative for wolf and positive for good"),
            });
        }
        Ok(())
    }

    /// Clamp a score into the configured range.
    pub fn clamp(&self, score: Decimal) -> Decimal {
        score.clamp(self.min_score, self.max_score)
    }

    // -----------------------------------------------------------------------
    // Evidence constructors
    // -----------------------------------------------------------------------

    /// A seer's private check result on `target`.
    pub fn check_result(&self, seer: PlayerId, target: PlayerId, is_wolf: bool, round: u32) -> Evidence {
        let strength = if is_wolf {
            self.check_wolf_delta
        } else {
            self.check_good_delta
        };
        Evidence::new(EvidenceKind::CheckResult, seer, Some(target), strength, round)
    }

    /// An injection attempt detected in `speaker`'s message.
    pub fn injection(&self, speaker: PlayerId, confidence: f64, round: u32) -> Evidence {
        let strength = scaled(self.injection_delta, confidence.clamp(0.0, 1.0));
        Evidence::new(EvidenceKind::InjectionDetected, speaker, None, strength, round)
    }

    /// A misquotation by `speaker`. `false_ratio` is the share of the
    /// speaker's quotations that did not match the transcript.
    pub fn false_quote(
        &self,
        speaker: PlayerId,
        quoted: Option<PlayerId>,
        false_ratio: f64,
        round: u32,
    ) -> Evidence {
        let strength = scaled(self.false_quote_delta, false_ratio.clamp(0.0, 1.0));
        Evidence::new(EvidenceKind::FalseQuote, speaker, quoted, strength, round)
    }

    /// Logical quality of `speaker`'s speech, where 0.5 is neutral.
    pub fn speech_quality(&self, speaker: PlayerId, quality: f64, round: u32) -> Evidence {
        let centred = quality.clamp(0.0, 1.0) - 0.5;
        let strength = scaled(self.speech_scale, centred);
        Evidence::new(EvidenceKind::SpeechQuality, speaker, None, strength, round)
    }

    /// A day vote from `voter` against `target`, weighed by how likely
    /// `target` currently looks to be a wolf.
    pub fn vote_cast(
        &self,
        voter: PlayerId,
        target: PlayerId,
        target_wolf_probability: f64,
        round: u32,
    ) -> Evidence {
        let lean = target_wolf_probability.clamp(0.0, 1.0).mul_add(2.0, -1.0);
        let strength = scaled(self.vote_delta, lean);
        Evidence::new(EvidenceKind::VoteCast, voter, Some(target), strength, round)
    }

    /// `target` was attacked by the wolves and survived thanks to `protector`.
    pub fn protect_outcome(&self, protector: PlayerId, target: PlayerId, round: u32) -> Evidence {
        Evidence::new(
            EvidenceKind::ProtectOutcome,
            protector,
            Some(target),
            self.protect_delta,
            round,
        )
    }
}

/// `base * factor`, rounded to two places. Out-of-range factors give zero.
fn scaled(base: Decimal, factor: f64) -> Decimal {
    Decimal::try_from(factor)
        .ok()
        .and_then(|f| base.checked_mul(f))
        .map_or(Decimal::ZERO, |d| d.round_dp(2))
}

const fn default_min_score() -> Decimal {
    Decimal::ZERO
}

const fn default_max_score() -> Decimal {
    Decimal::ONE_HUNDRED
}

const fn default_neutral_score() -> Decimal {
    Decimal::from_parts(50, 0, 0, false, 0)
}

const fn default_decay_rate() -> Decimal {
    Decimal::from_parts(1, 0, 0, false, 1)
}

const fn default_history_len() -> usize {
    10
}

const fn default_check_wolf_delta() -> Decimal {
    Decimal::from_parts(30, 0, 0, true, 0)
}

const fn default_check_good_delta() -> Decimal {
    Decimal::from_parts(15, 0, 0, false, 0)
}

const fn default_injection_delta() -> Decimal {
    Decimal::from_parts(20, 0, 0, true, 0)
}

const fn default_false_quote_delta() -> Decimal {
    Decimal::from_parts(15, 0, 0, true, 0)
}

const fn default_speech_scale() -> Decimal {
    Decimal::from_parts(20, 0, 0, false, 0)
}

const fn default_vote_delta() -> Decimal {
    Decimal::from_parts(5, 0, 0, false, 0)
}

const fn default_protect_delta() -> Decimal {
    Decimal::from_parts(10, 0, 0, false, 0)
}
