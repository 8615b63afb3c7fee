//! The suspicion inference engine.
//!
//! Holds `P(wolf | evidence)` for every living player. Each evidence item
//! shifts its subject's log-odds by a log-likelihood ratio, after which
//! the distribution is rescaled so the living players together carry the
//! expected number of wolves, then clamped to `[floor, ceiling]`.
//!
//! Check results carry a fixed strong ratio. Weak evidence is scaled by
//! its trust-point strength and the calibrated per-kind weight. Detection
//! findings about the same speaker in the same round share a cause, so
//! they are combined by geometric mean (the mean of their log ratios)
//! instead of multiplied.
//!
//! All state lives in ordered maps and every float operation happens in a
//! fixed order, so identical inputs give bit-identical outputs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

use werewolf_ledger::TrustLedger;
use werewolf_types::{Evidence, PlayerId};

use crate::config::InferenceConfig;
use crate::error::InferenceError;
use crate::params::CalibrationParams;

/// Denominators smaller than this are treated as zero.
const EPSILON: f64 = 1e-10;

/// `numerator / denominator`, or `fallback` when the denominator vanishes.
pub fn safe_divide(numerator: f64, denominator: f64, fallback: f64) -> f64 {
    if denominator.abs() < EPSILON {
        fallback
    } else {
        numerator / denominator
    }
}

/// Likelihood ratio `P(e | wolf) / P(e | good)`; `1.0` when undefined.
pub fn likelihood_ratio(p_given_wolf: f64, p_given_good: f64) -> f64 {
    safe_divide(p_given_wolf, p_given_good, 1.0)
}

fn logit(p: f64) -> f64 {
    let q = p.clamp(EPSILON, 1.0 - EPSILON);
    (q / (1.0 - q)).ln()
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[allow(clippy::cast_precision_loss)]
const fn count_as_f64(n: usize) -> f64 {
    n as f64
}

/// Outcome of observing a single evidence item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Whose probability moved.
    pub subject: PlayerId,
    /// Log-odds shift actually applied.
    pub log_shift: f64,
    /// Subject's probability after rescaling and clamping.
    pub posterior: f64,
}

/// Per-match wolf-probability model.
#[derive(Debug, Clone)]
pub struct SuspicionEngine {
    config: InferenceConfig,
    params: Arc<CalibrationParams>,
    seated: BTreeSet<PlayerId>,
    living: BTreeMap<PlayerId, f64>,
    wolf_mass: f64,
    prior: f64,
    correlated: BTreeMap<(PlayerId, u32), Vec<f64>>,
}

impl SuspicionEngine {
    /// Seat `players`, of whom `wolves` are wolf-aligned.
    ///
    /// Every player starts at the prior `wolves / players`.
    pub fn new(
        config: InferenceConfig,
        params: Arc<CalibrationParams>,
        players: impl IntoIterator<Item = PlayerId>,
        wolves: usize,
    ) -> Self {
        let seated: BTreeSet<PlayerId> = players.into_iter().collect();
        let wolf_mass = count_as_f64(wolves);
        let prior = safe_divide(wolf_mass, count_as_f64(seated.len()), 0.0)
            .clamp(config.floor, config.ceiling);
        let living = seated.iter().map(|p| (*p, prior)).collect();
        Self {
            config,
            params,
            seated,
            living,
            wolf_mass,
            prior,
            correlated: BTreeMap::new(),
        }
    }

    /// Starting probability every player was seated with.
    pub const fn prior(&self) -> f64 {
        self.prior
    }

    /// Calibration version currently applied.
    pub fn params_version(&self) -> u64 {
        self.params.version
    }

    /// Swap to a new parameter version. Only call between phases.
    pub fn set_params(&mut self, params: Arc<CalibrationParams>) {
        debug!(
            from = self.params.version,
            to = params.version,
            "suspicion model switched calibration version"
        );
        self.params = params;
    }

    /// Current wolf-probability of a living player.
    pub fn probability(&self, player: PlayerId) -> Option<f64> {
        self.living.get(&player).copied()
    }

    /// Probabilities of every living player, ordered by seat.
    pub fn snapshot(&self) -> BTreeMap<PlayerId, f64> {
        self.living.clone()
    }

    /// Log-likelihood ratio `evidence` contributes on its own.
    pub fn log_likelihood(&self, evidence: &Evidence) -> f64 {
        let raw = if evidence.kind.is_strong() {
            let strong = self.config.check_ratio.ln();
            if evidence.strength.is_sign_negative() {
                strong
            } else {
                -strong
            }
        } else {
            let points = evidence.strength.to_f64().unwrap_or(0.0);
            -points * self.config.weak_scale * self.params.weight(evidence.kind)
        };
        raw.clamp(-self.config.max_log_shift, self.config.max_log_shift)
    }

    /// Update the model with one evidence item.
    ///
    /// Returns `Ok(None)` when the subject is already dead.
    pub fn observe(&mut self, evidence: &Evidence) -> Result<Option<Observation>, InferenceError> {
        let subject = evidence.subject();
        if !self.seated.contains(&subject) {
            return Err(InferenceError::UnknownPlayer { player: subject });
        }
        if !self.living.contains_key(&subject) {
            debug!(player = %subject, kind = ?evidence.kind, "evidence about a dead player ignored");
            return Ok(None);
        }

        let single = self.log_likelihood(evidence);
        let shift = if evidence.kind.is_correlated() && evidence.strength != Decimal::ZERO {
            self.correlated_shift(subject, evidence.round, single)
        } else {
            single
        };

        self.shift_log_odds(subject, shift);
        self.rebalance();

        let posterior = self.probability(subject).unwrap_or(self.config.floor);
        debug!(
            player = %subject,
            kind = ?evidence.kind,
            log_shift = shift,
            posterior,
            "suspicion updated"
        );
        Ok(Some(Observation {
            subject,
            log_shift: shift,
            posterior,
        }))
    }

    /// Remove a dead player and spread their mass over the living.
    pub fn remove_player(&mut self, player: PlayerId) -> Option<f64> {
        let removed = self.living.remove(&player)?;
        self.correlated.retain(|(p, _), _| *p != player);
        self.rebalance();
        debug!(player = %player, last_probability = removed, "player removed from suspicion model");
        Some(removed)
    }

    /// Suspicion shaded by the trust ledger.
    ///
    /// Low trust nudges the log-odds up and high trust nudges them down,
    /// by at most `trust_feature_weight / 2` in either direction.
    pub fn blended(&self, ledger: &TrustLedger) -> BTreeMap<PlayerId, f64> {
        let config = ledger.config();
        let range = config
            .max_score
            .checked_sub(config.min_score)
            .and_then(|r| r.to_f64())
            .unwrap_or(1.0);
        let neutral = config.neutral_score.to_f64().unwrap_or(0.0);

        self.living
            .iter()
            .map(|(player, p)| {
                let trust = ledger
                    .score(*player)
                    .and_then(|s| s.to_f64())
                    .unwrap_or(neutral);
                let lean = safe_divide(neutral - trust, range, 0.0);
                let shaded = sigmoid(logit(*p) + lean * self.config.trust_feature_weight);
                (*player, shaded.clamp(self.config.floor, self.config.ceiling))
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Log shift that moves a correlated group from its old geometric mean
    /// to its new one.
    fn correlated_shift(&mut self, subject: PlayerId, round: u32, single: f64) -> f64 {
        let group = self.correlated.entry((subject, round)).or_default();
        let before = mean(group);
        group.push(single);
        let after = mean(group);
        after - before
    }

    fn shift_log_odds(&mut self, subject: PlayerId, shift: f64) {
        let cap = self.config.max_log_shift;
        if let Some(p) = self.living.get_mut(&subject) {
            *p = sigmoid(logit(*p) + shift.clamp(-cap, cap));
        }
    }

    /// Rescale so the living carry `wolf_mass`, then clamp.
    fn rebalance(&mut self) {
        let total: f64 = self.living.values().sum();
        let target = self.wolf_mass.min(count_as_f64(self.living.len()) * self.config.ceiling);
        let scale = safe_divide(target, total, 1.0);
        for p in self.living.values_mut() {
            *p = (*p * scale).clamp(self.config.floor, self.config.ceiling);
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    safe_divide(values.iter().sum(), count_as_f64(values.len()), 0.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use rust_decimal_macros::dec;
    use werewolf_ledger::TrustConfig;
    use werewolf_types::EvidenceKind;

    use super::*;

    fn seats(n: u32) -> Vec<PlayerId> {
        (1..=n).map(PlayerId::new).collect()
    }

    fn engine() -> SuspicionEngine {
        SuspicionEngine::new(
            InferenceConfig::default(),
            Arc::new(CalibrationParams::baseline()),
            seats(9),
            3,
        )
    }

    fn total(engine: &SuspicionEngine) -> f64 {
        engine.snapshot().values().sum()
    }

    #[test]
    fn prior_is_wolf_share() {
        let e = engine();
        assert!((e.prior() - 1.0 / 3.0).abs() < 1e-12);
        assert!((total(&e) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn wolf_check_raises_probability() {
        let mut e = engine();
        let trust = TrustConfig::default();
        let before = e.probability(PlayerId::new(6)).unwrap();
        let ev = trust.check_result(PlayerId::new(1), PlayerId::new(6), true, 1);
        let obs = e.observe(&ev).unwrap().unwrap();
        assert!(obs.posterior > before);
        assert!((obs.log_shift - 9.0_f64.ln()).abs() < 1e-12);
        assert!((total(&e) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn good_check_lowers_probability() {
        let mut e = engine();
        let trust = TrustConfig::default();
        let before = e.probability(PlayerId::new(2)).unwrap();
        let ev = trust.check_result(PlayerId::new(1), PlayerId::new(2), false, 1);
        e.observe(&ev).unwrap();
        assert!(e.probability(PlayerId::new(2)).unwrap() < before);
    }

    #[test]
    fn probabilities_stay_in_bounds_under_repeated_checks() {
        let mut e = engine();
        let trust = TrustConfig::default();
        for _ in 0..50 {
            let ev = trust.check_result(PlayerId::new(1), PlayerId::new(4), true, 1);
            e.observe(&ev).unwrap();
            let ev = trust.check_result(PlayerId::new(1), PlayerId::new(5), false, 1);
            e.observe(&ev).unwrap();
        }
        for p in e.snapshot().values() {
            assert!((0.01..=0.99).contains(p));
        }
        assert!((e.probability(PlayerId::new(4)).unwrap() - 0.99).abs() < 1e-9);
        assert!((e.probability(PlayerId::new(5)).unwrap() - 0.01).abs() < 1e-9);
    }

    #[test]
    fn dead_player_mass_is_redistributed() {
        let mut e = engine();
        let trust = TrustConfig::default();
        let ev = trust.check_result(PlayerId::new(1), PlayerId::new(3), true, 1);
        e.observe(&ev).unwrap();
        let others_before = e.probability(PlayerId::new(7)).unwrap();

        e.remove_player(PlayerId::new(3)).unwrap();
        assert!(e.probability(PlayerId::new(3)).is_none());
        assert!(e.probability(PlayerId::new(7)).unwrap() > others_before);
        assert!((total(&e) - 3.0).abs() < 1e-9);

        let late = trust.injection(PlayerId::new(3), 1.0, 2);
        assert!(e.observe(&late).unwrap().is_none());
    }

    #[test]
    fn unknown_subject_is_an_error() {
        let mut e = engine();
        let ev = TrustConfig::default().injection(PlayerId::new(40), 1.0, 1);
        assert!(matches!(
            e.observe(&ev),
            Err(InferenceError::UnknownPlayer { .. })
        ));
    }

    #[test]
    fn correlated_findings_combine_by_geometric_mean() {
        let trust = TrustConfig::default();
        let speaker = PlayerId::new(8);

        let mut once = engine();
        let injection = trust.injection(speaker, 1.0, 1);
        once.observe(&injection).unwrap();

        let mut twice = engine();
        twice.observe(&injection).unwrap();
        let same_again = trust.injection(speaker, 1.0, 1);
        let obs = twice.observe(&same_again).unwrap().unwrap();

        assert!(obs.log_shift.abs() < 1e-12);
        assert!(
            (once.probability(speaker).unwrap() - twice.probability(speaker).unwrap()).abs() < 1e-9
        );
    }

    #[test]
    fn votes_for_likely_good_players_are_suspicious() {
        let mut e = engine();
        let trust = TrustConfig::default();
        let voter = PlayerId::new(2);
        let before = e.probability(voter).unwrap();
        let ev = trust.vote_cast(voter, PlayerId::new(5), 0.05, 1);
        e.observe(&ev).unwrap();
        assert!(e.probability(voter).unwrap() > before);
    }

    #[test]
    fn calibrated_weight_scales_weak_evidence() {
        let trust = TrustConfig::default();
        let ev = trust.speech_quality(PlayerId::new(3), 0.0, 1);

        let base = engine();
        let mut doubled_params = CalibrationParams::baseline();
        doubled_params.version = 1;
        doubled_params.weights.insert(EvidenceKind::SpeechQuality, 2.0);
        let mut doubled = engine();
        doubled.set_params(Arc::new(doubled_params));

        assert!((doubled.log_likelihood(&ev) - 2.0 * base.log_likelihood(&ev)).abs() < 1e-12);
        assert_eq!(doubled.params_version(), 1);
    }

    #[test]
    fn identical_inputs_give_bit_identical_outputs() {
        let trust = TrustConfig::default();
        let stream = vec![
            trust.check_result(PlayerId::new(1), PlayerId::new(6), true, 1),
            trust.injection(PlayerId::new(4), 0.7, 1),
            trust.false_quote(PlayerId::new(4), Some(PlayerId::new(2)), 0.5, 1),
            trust.vote_cast(PlayerId::new(2), PlayerId::new(6), 0.6, 1),
            trust.speech_quality(PlayerId::new(9), 0.2, 2),
            trust.protect_outcome(PlayerId::new(5), PlayerId::new(3), 2),
        ];
        let run = || {
            let mut e = engine();
            for ev in &stream {
                e.observe(ev).unwrap();
            }
            e.remove_player(PlayerId::new(7));
            e.snapshot()
                .into_iter()
                .map(|(p, v)| (p, v.to_bits()))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn low_trust_shades_blended_suspicion_up() {
        let e = engine();
        let mut ledger = TrustLedger::new(TrustConfig::default(), seats(9));
        let ev = ledger.config().injection(PlayerId::new(2), 1.0, 1);
        ledger.record(&ev).unwrap();
        assert_eq!(ledger.score(PlayerId::new(2)), Some(dec!(30)));

        let blended = e.blended(&ledger);
        let prior = e.prior();
        assert!(blended.get(&PlayerId::new(2)).copied().unwrap() > prior);
        assert!((blended.get(&PlayerId::new(3)).copied().unwrap() - prior).abs() < 1e-12);
    }

    #[test]
    fn likelihood_ratio_handles_zero_denominator() {
        assert_eq!(likelihood_ratio(0.5, 0.0), 1.0);
        assert!((likelihood_ratio(0.9, 0.1) - 9.0).abs() < 1e-12);
    }
}
