//! The trust score ledger.
//!
//! # Invariants
//!
//! - Every score stays inside `[min_score, max_score]` after every call.
//! - Decay runs at most once per round, before that round's evidence.
//! - At most `history_len` changes are retained per player.

use std::collections::{BTreeMap, VecDeque};

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use werewolf_types::{Evidence, EvidenceKind, PlayerId};

use crate::config::TrustConfig;
use crate::error::LedgerError;

/// One applied change, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrustChange {
    /// Round in which the change was applied.
    pub round: u32,
    /// Evidence kind that caused it.
    pub kind: EvidenceKind,
    /// Delta actually applied after clamping.
    pub applied: Decimal,
    /// Score after the change.
    pub score: Decimal,
}

/// Bounded per-player trust scores.
#[derive(Debug, Clone)]
pub struct TrustLedger {
    config: TrustConfig,
    scores: BTreeMap<PlayerId, Decimal>,
    history: BTreeMap<PlayerId, VecDeque<TrustChange>>,
    last_decayed_round: Option<u32>,
}

impl TrustLedger {
    /// Create a ledger with every player at the neutral score.
    pub fn new(config: TrustConfig, players: impl IntoIterator<Item = PlayerId>) -> Self {
        let neutral = config.clamp(config.neutral_score);
        let scores = players.into_iter().map(|p| (p, neutral)).collect();
        Self {
            config,
            scores,
            history: BTreeMap::new(),
            last_decayed_round: None,
        }
    }

    /// The configuration this ledger was built with.
    pub const fn config(&self) -> &TrustConfig {
        &self.config
    }

    /// Pull every score toward neutral by `decay_rate`.
    ///
    /// Calling this again for a round that was already decayed does nothing.
    pub fn begin_round(&mut self, round: u32) {
        if self.last_decayed_round.is_some_and(|last| last >= round) {
            return;
        }
        self.last_decayed_round = Some(round);

        let neutral = self.config.neutral_score;
        let rate = self.config.decay_rate;
        for score in self.scores.values_mut() {
            let pulled = neutral
                .checked_sub(*score)
                .and_then(|gap| gap.checked_mul(rate))
                .and_then(|step| score.checked_add(step))
                .unwrap_or(*score);
            *score = self.config.clamp(pulled);
        }
        debug!(round, players = self.scores.len(), "trust scores decayed");
    }

    /// Apply `evidence` to `player`'s score and return the new score.
    pub fn update(&mut self, player: PlayerId, evidence: &Evidence) -> Result<Decimal, LedgerError> {
        let current = *self
            .scores
            .get(&player)
            .ok_or(LedgerError::UnknownPlayer { player })?;

        let raw = current
            .checked_add(evidence.strength)
            .ok_or(LedgerError::Overflow {
                player,
                score: current,
                delta: evidence.strength,
            })?;
        let next = self.config.clamp(raw);
        self.scores.insert(player, next);

        let change = TrustChange {
            round: evidence.round,
            kind: evidence.kind,
            applied: next.saturating_sub(current),
            score: next,
        };
        let history = self.history.entry(player).or_default();
        history.push_back(change);
        while history.len() > self.config.history_len {
            history.pop_front();
        }

        debug!(
            player = %player,
            kind = ?evidence.kind,
            strength = %evidence.strength,
            score = %next,
            "trust updated"
        );
        Ok(next)
    }

    /// Apply `evidence` to its subject.
    pub fn record(&mut self, evidence: &Evidence) -> Result<Decimal, LedgerError> {
        self.update(evidence.subject(), evidence)
    }

    /// Current score for `player`.
    pub fn score(&self, player: PlayerId) -> Option<Decimal> {
        self.scores.get(&player).copied()
    }

    /// All scores, ordered by seat.
    pub const fn scores(&self) -> &BTreeMap<PlayerId, Decimal> {
        &self.scores
    }

    /// Recent changes for `player`, oldest first.
    pub fn history(&self, player: PlayerId) -> impl Iterator<Item = &TrustChange> {
        self.history.get(&player).into_iter().flatten()
    }
}
