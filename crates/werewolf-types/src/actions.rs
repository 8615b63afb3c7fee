//! Request/response types for the per-phase action contract.
//!
//! The orchestrator sends an [`ActionRequest`] to whatever drives a player
//! (a rule-based agent, a remote model, a test script) and receives a
//! [`Decision`]. Anything other than a legal target is treated as
//! [`Decision::Abstain`].

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ActionKind, Phase, Role};
use crate::ids::{MatchId, PlayerId};

/// The answer to an action request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Decision {
    /// Act on the given player.
    Target(PlayerId),
    /// Take no action this phase.
    Abstain,
}

impl Decision {
    /// The chosen player, if any.
    pub const fn target(self) -> Option<PlayerId> {
        match self {
            Self::Target(id) => Some(id),
            Self::Abstain => None,
        }
    }

    /// Returns `true` for [`Decision::Abstain`].
    pub const fn is_abstain(self) -> bool {
        matches!(self, Self::Abstain)
    }
}

impl From<Option<PlayerId>> for Decision {
    fn from(target: Option<PlayerId>) -> Self {
        target.map_or(Self::Abstain, Self::Target)
    }
}

impl core::fmt::Display for Decision {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Target(id) => write!(f, "{id}"),
            Self::Abstain => f.write_str("abstain"),
        }
    }
}

/// A request for one player's action in the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ActionRequest {
    /// The match the request belongs to.
    pub match_id: MatchId,
    /// Round (day counter).
    pub round: u32,
    /// Phase the action is requested in.
    pub phase: Phase,
    /// The acting player.
    pub player: PlayerId,
    /// The acting player's role.
    pub role: Role,
    /// What is being asked for.
    pub kind: ActionKind,
    /// Legal targets, sorted by seat. Never contains dead players.
    pub candidates: Vec<PlayerId>,
    /// Tonight's wolf victim, only present on witch save requests.
    pub night_victim: Option<PlayerId>,
}

impl ActionRequest {
    /// Returns `true` if `decision` is abstain or names a listed candidate.
    pub fn permits(&self, decision: Decision) -> bool {
        decision
            .target()
            .is_none_or(|id| self.candidates.contains(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(candidates: Vec<PlayerId>) -> ActionRequest {
        ActionRequest {
            match_id: MatchId::new(),
            round: 1,
            phase: Phase::DayVote,
            player: PlayerId::new(1),
            role: Role::Villager,
            kind: ActionKind::Vote,
            candidates,
            night_victim: None,
        }
    }

    #[test]
    fn abstain_is_always_permitted() {
        let req = request(Vec::new());
        assert!(req.permits(Decision::Abstain));
    }

    #[test]
    fn target_outside_candidates_is_rejected() {
        let req = request(vec![PlayerId::new(2), PlayerId::new(3)]);
        assert!(req.permits(Decision::Target(PlayerId::new(3))));
        assert!(!req.permits(Decision::Target(PlayerId::new(9))));
    }

    #[test]
    fn decision_from_option() {
        assert_eq!(Decision::from(None), Decision::Abstain);
        assert_eq!(
            Decision::from(Some(PlayerId::new(4))).target(),
            Some(PlayerId::new(4))
        );
    }
}
