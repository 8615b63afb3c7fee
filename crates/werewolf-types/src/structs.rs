//! Core entity structs: players, transcripts, and archived match records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{DeathCause, EvidenceKind, Faction, Role, Winner};
use crate::evidence::Evidence;
use crate::ids::{MatchId, PlayerId};

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A seated player and everything the engine believes about them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Player {
    /// Seat number, unique within the match.
    pub id: PlayerId,
    /// Display name, unique within the match.
    pub name: String,
    /// The role dealt at match start. Hidden from other players.
    pub role: Role,
    /// Whether the player is still in the game.
    pub alive: bool,
    /// Why the player died, if they did.
    pub death_cause: Option<DeathCause>,
    /// Self-declared role. Untrusted.
    pub claimed_role: Option<Role>,
    /// Heuristic trust score, clamped to the ledger's range.
    #[ts(as = "String")]
    pub trust_score: Decimal,
    /// Posterior probability of being wolf-aligned.
    pub wolf_probability: f64,
    /// Day votes cast, in order.
    pub vote_history: Vec<VoteRecord>,
    /// Detection findings raised against this player's speeches.
    pub speech_flags: Vec<SpeechFlag>,
}

impl Player {
    /// Create a living player with neutral scores.
    pub fn new(
        id: PlayerId,
        name: impl Into<String>,
        role: Role,
        trust_score: Decimal,
        wolf_probability: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            alive: true,
            death_cause: None,
            claimed_role: None,
            trust_score,
            wolf_probability,
            vote_history: Vec::new(),
            speech_flags: Vec::new(),
        }
    }

    /// The side this player wins with.
    pub const fn faction(&self) -> Faction {
        self.role.faction()
    }
}

/// One day vote cast by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct VoteRecord {
    /// Round the vote was cast in.
    pub round: u32,
    /// Who the vote was for. `None` for an abstention.
    pub target: Option<PlayerId>,
}

/// A detection finding attached to a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SpeechFlag {
    /// Round the flagged speech was made in.
    pub round: u32,
    /// Which scorer raised the flag.
    pub kind: EvidenceKind,
    /// Signed strength of the resulting evidence.
    #[ts(as = "String")]
    pub strength: Decimal,
}

/// A single speech in the day transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Speech {
    /// Who spoke.
    pub speaker: PlayerId,
    /// Round the speech was made in.
    pub round: u32,
    /// Raw text as received.
    pub text: String,
}

// ---------------------------------------------------------------------------
// Archive records
// ---------------------------------------------------------------------------

/// A player's dealt role, as recorded at match end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RoleAssignment {
    /// The seat.
    pub player: PlayerId,
    /// The role dealt to that seat.
    pub role: Role,
}

/// The minimal record of a finished match needed for calibration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MatchRecord {
    /// The match this record describes.
    pub match_id: MatchId,
    /// Final role assignments, sorted by seat.
    pub roles: Vec<RoleAssignment>,
    /// Every evidence record in the order it was submitted.
    pub evidence: Vec<Evidence>,
    /// The winning side.
    pub winner: Winner,
    /// Rounds played.
    pub rounds: u32,
    /// Calibration parameter version the match started with.
    pub params_version: u64,
    /// Wall-clock time the match ended.
    pub finished_at: DateTime<Utc>,
}

impl MatchRecord {
    /// The role dealt to `player`, if they were seated.
    pub fn role_of(&self, player: PlayerId) -> Option<Role> {
        self.roles
            .iter()
            .find(|assignment| assignment.player == player)
            .map(|assignment| assignment.role)
    }

    /// Returns `true` if `player` was wolf-aligned.
    pub fn was_wolf(&self, player: PlayerId) -> Option<bool> {
        self.role_of(player).map(Role::is_wolf_aligned)
    }
}
