//! Fitting weak-evidence weights against match outcomes.
//!
//! For every weak evidence kind the archive yields a 2x2 table: did the
//! evidence point toward "wolf" or "good", and was its subject actually a
//! wolf. The fitted log-likelihood ratio is half the Laplace-smoothed log
//! diagnostic odds ratio of that table, so a kind that never agrees with
//! the outcome more often than chance fits to zero. Newer matches count
//! more: recency weights rise linearly from 0.5 to 1.0 across the window.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use werewolf_inference::{CalibrationParams, likelihood_ratio};
use werewolf_types::{EvidenceKind, MatchRecord};

use crate::config::CalibratorConfig;
use crate::error::CalibrationError;

/// Outcome of fitting one evidence kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KindFit {
    /// The evidence kind.
    pub kind: EvidenceKind,
    /// Unweighted number of observations.
    pub observations: usize,
    /// Fitted log-likelihood ratio, before clamping.
    pub log_lr: f64,
    /// Resulting weight.
    pub weight: f64,
    /// `false` when there were too few observations and the previous
    /// weight was kept.
    pub refitted: bool,
}

/// Result of a full fit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fit {
    /// New weight per weak kind.
    pub weights: BTreeMap<EvidenceKind, f64>,
    /// Per-kind details.
    pub kinds: Vec<KindFit>,
    /// Records used.
    pub used: usize,
    /// Records rejected as malformed.
    pub skipped: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct Table {
    wolf_pointing_wolf: f64,
    wolf_pointing_good: f64,
    good_pointing_wolf: f64,
    good_pointing_good: f64,
    observations: usize,
}

/// Why `record` cannot be used for fitting, if it cannot.
pub fn check_record(record: &MatchRecord) -> Result<(), String> {
    if record.roles.is_empty() {
        return Err(String::from("no role assignments"));
    }
    let mut seats: Vec<_> = record.roles.iter().map(|r| r.player).collect();
    seats.sort_unstable();
    let before = seats.len();
    seats.dedup();
    if seats.len() != before {
        return Err(String::from("duplicate seat in role assignments"));
    }
    if let Some(e) = record.evidence.iter().find(|e| record.role_of(e.subject()).is_none()) {
        return Err(format!("evidence about unseated player {}", e.subject()));
    }
    Ok(())
}

/// Fit weights on `records` (oldest first). Kinds with too few
/// observations keep their weight from `previous`.
pub fn fit(
    config: &CalibratorConfig,
    records: &[MatchRecord],
    previous: &CalibrationParams,
) -> Result<Fit, CalibrationError> {
    let usable: Vec<&MatchRecord> = records
        .iter()
        .filter(|record| match check_record(record) {
            Ok(()) => true,
            Err(reason) => {
                warn!(match_id = %record.match_id, reason = %reason, "skipping malformed match record");
                false
            }
        })
        .collect();
    let skipped = records.len().saturating_sub(usable.len());
    if usable.is_empty() && skipped > 0 {
        return Err(CalibrationError::Malformed { skipped });
    }
    if usable.len() < config.min_samples {
        return Err(CalibrationError::InsufficientData {
            have: usable.len(),
            need: config.min_samples,
        });
    }

    let mut tables: BTreeMap<EvidenceKind, Table> =
        EvidenceKind::WEAK.iter().map(|k| (*k, Table::default())).collect();
    let last = usable.len().saturating_sub(1);
    for (index, record) in usable.iter().enumerate() {
        let recency = recency_weight(index, last);
        for evidence in &record.evidence {
            let Some(table) = tables.get_mut(&evidence.kind) else {
                continue;
            };
            if evidence.strength.is_zero() {
                continue;
            }
            let Some(was_wolf) = record.was_wolf(evidence.subject()) else {
                continue;
            };
            let cell = match (was_wolf, evidence.is_suspicious()) {
                (true, true) => &mut table.wolf_pointing_wolf,
                (true, false) => &mut table.wolf_pointing_good,
                (false, true) => &mut table.good_pointing_wolf,
                (false, false) => &mut table.good_pointing_good,
            };
            *cell += recency;
            table.observations = table.observations.saturating_add(1);
        }
    }

    let mut weights = BTreeMap::new();
    let mut kinds = Vec::with_capacity(tables.len());
    for (kind, table) in tables {
        let log_lr = half_log_odds_ratio(&table, config.laplace_alpha);
        let refitted = table.observations >= config.min_observations;
        let weight = if refitted {
            log_lr.clamp(0.0, config.max_log_lr) / config.reference_log_lr
        } else {
            previous.weight(kind)
        };
        debug!(kind = ?kind, observations = table.observations, log_lr, weight, refitted, "kind fitted");
        weights.insert(kind, weight);
        kinds.push(KindFit {
            kind,
            observations: table.observations,
            log_lr,
            weight,
            refitted,
        });
    }

    Ok(Fit {
        weights,
        kinds,
        used: usable.len(),
        skipped,
    })
}

/// 0.5 for the oldest record, 1.0 for the newest.
fn recency_weight(index: usize, last: usize) -> f64 {
    if last == 0 {
        return 1.0;
    }
    let position = u32::try_from(index).map_or(f64::from(u32::MAX), f64::from);
    let span = u32::try_from(last).map_or(f64::from(u32::MAX), f64::from);
    0.5f64.mul_add(position / span, 0.5)
}

fn half_log_odds_ratio(table: &Table, alpha: f64) -> f64 {
    let agree = (table.wolf_pointing_wolf + alpha) * (table.good_pointing_good + alpha);
    let disagree = (table.good_pointing_wolf + alpha) * (table.wolf_pointing_good + alpha);
    0.5 * likelihood_ratio(agree, disagree).ln()
}
