//! Decision outcomes and the shared ranking step.
//!
//! Every decision maker ranks its legal candidates with a role-specific
//! score and picks the highest. Ties go to the lowest seat, so the same
//! inputs always give the same target. When a candidate has no scores the
//! ranking is not meaningful and the pick falls back to the lowest trust.

use core::cmp::Ordering;

use serde::Serialize;

use werewolf_types::{Decision, PlayerId, Role};

use crate::context::DecisionContext;

/// Why a decision maker could not rank candidates by its own criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DecisionFallback {
    /// A candidate had no wolf-probability; the lowest trust was picked.
    MissingProbability,
    /// A candidate had no trust score either; the lowest seat was picked.
    MissingTrust,
}

impl core::fmt::Display for DecisionFallback {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingProbability => f.write_str("missing wolf-probability, picked lowest trust"),
            Self::MissingTrust => f.write_str("missing trust, picked lowest seat"),
        }
    }
}

/// A decision plus the reasoning behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionOutcome {
    /// The chosen target or abstain.
    pub decision: Decision,
    /// Human-readable reason, for logs.
    pub reason: String,
    /// Set when the ranking fell back.
    pub fallback: Option<DecisionFallback>,
}

impl DecisionOutcome {
    /// Abstain for `reason`.
    pub fn abstain(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Abstain,
            reason: reason.into(),
            fallback: None,
        }
    }

    /// Act on `target` for `reason`.
    pub fn target(target: PlayerId, reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Target(target),
            reason: reason.into(),
            fallback: None,
        }
    }
}

/// Scores of one candidate, handed to a ranking function.
#[derive(Debug, Clone, Copy)]
pub struct Scores {
    /// The candidate.
    pub player: PlayerId,
    /// Wolf-probability.
    pub p_wolf: f64,
    /// Trust on `[0, 1]`.
    pub trust: f64,
    /// Publicly claimed role.
    pub claim: Option<Role>,
    /// Candidate is the sheriff.
    pub sheriff: bool,
}

/// The winner of a ranking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pick {
    /// Ranked by the decision maker's own score.
    Ranked {
        /// Chosen player.
        player: PlayerId,
        /// Its score.
        score: f64,
        /// Its wolf-probability.
        p_wolf: f64,
    },
    /// Ranking was impossible.
    Fallback {
        /// Chosen player.
        player: PlayerId,
        /// Why.
        reason: DecisionFallback,
    },
}

impl Pick {
    /// The chosen player.
    pub const fn player(self) -> PlayerId {
        match self {
            Self::Ranked { player, .. } | Self::Fallback { player, .. } => player,
        }
    }
}

/// Pick the highest-scoring candidate; ties go to the lowest seat.
///
/// `candidates` must be sorted by seat. Returns `None` only when empty.
pub fn rank(
    ctx: &DecisionContext,
    candidates: &[PlayerId],
    score: impl Fn(&Scores) -> f64,
) -> Option<Pick> {
    let mut scored = Vec::with_capacity(candidates.len());
    for &player in candidates {
        let (Some(p_wolf), Some(trust)) = (ctx.probability(player), ctx.trust_unit(player)) else {
            return lowest_trust(ctx, candidates);
        };
        scored.push(Scores {
            player,
            p_wolf,
            trust,
            claim: ctx.claim(player),
            sheriff: ctx.sheriff == Some(player),
        });
    }

    let mut best: Option<Pick> = None;
    for s in &scored {
        let value = score(s);
        let better = match best {
            Some(Pick::Ranked { score: top, .. }) => value.total_cmp(&top) == Ordering::Greater,
            _ => true,
        };
        if better {
            best = Some(Pick::Ranked {
                player: s.player,
                score: value,
                p_wolf: s.p_wolf,
            });
        }
    }
    best
}

fn lowest_trust(ctx: &DecisionContext, candidates: &[PlayerId]) -> Option<Pick> {
    match ctx.least_trusted(candidates) {
        Some(player) => Some(Pick::Fallback {
            player,
            reason: DecisionFallback::MissingProbability,
        }),
        None => candidates.first().map(|&player| Pick::Fallback {
            player,
            reason: DecisionFallback::MissingTrust,
        }),
    }
}

/// Turn a pick into an outcome, describing a ranked pick with `describe`.
pub fn outcome_of(pick: Pick, describe: impl FnOnce(PlayerId, f64) -> String) -> DecisionOutcome {
    match pick {
        Pick::Ranked { player, score, .. } => DecisionOutcome::target(player, describe(player, score)),
        Pick::Fallback { player, reason } => DecisionOutcome {
            decision: Decision::Target(player),
            reason: format!("{player}: {reason}"),
            fallback: Some(reason),
        },
    }
}
