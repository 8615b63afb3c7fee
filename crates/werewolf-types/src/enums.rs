//! Enumeration types for the werewolf decision engine.
//!
//! Roles form a closed set. Anything that depends on "what can this role
//! do" goes through [`Role::faction`] and the capability table in
//! `werewolf-agents`, never through open-ended dispatch.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Roles and factions
// ---------------------------------------------------------------------------

/// A role dealt to a player at match start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Role {
    /// Plain good-aligned player with no night ability.
    Villager,
    /// Wolf-aligned player; joins the nightly kill.
    Wolf,
    /// Checks one player's alignment each night.
    Seer,
    /// Holds one antidote and one poison for the whole match.
    Witch,
    /// Protects one player each night, never the same player twice in a row.
    Guard,
    /// May shoot one player on death unless poisoned.
    Hunter,
    /// Wolf-aligned player with a revenge shot on death.
    WolfKing,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Villager,
        Self::Wolf,
        Self::Seer,
        Self::Witch,
        Self::Guard,
        Self::Hunter,
        Self::WolfKing,
    ];

    /// The side this role wins with.
    pub const fn faction(self) -> Faction {
        match self {
            Self::Wolf | Self::WolfKing => Faction::Wolves,
            Self::Villager | Self::Seer | Self::Witch | Self::Guard | Self::Hunter => Faction::Good,
        }
    }

    /// Returns `true` for wolf-aligned roles.
    pub const fn is_wolf_aligned(self) -> bool {
        matches!(self.faction(), Faction::Wolves)
    }

    /// Lower-case label used in logs and prompts.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Villager => "villager",
            Self::Wolf => "wolf",
            Self::Seer => "seer",
            Self::Witch => "witch",
            Self::Guard => "guard",
            Self::Hunter => "hunter",
            Self::WolfKing => "wolf_king",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two sides of the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Faction {
    /// Villagers and every special good role.
    Good,
    /// Wolves and the `WolfKing`.
    Wolves,
}

/// The final outcome of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Winner {
    /// Every wolf-aligned player is dead.
    Good,
    /// Living wolves are at least as many as living good players.
    Wolves,
    /// The round cap was reached without a decision.
    Draw,
}

impl Winner {
    /// The faction that won, if any.
    pub const fn faction(self) -> Option<Faction> {
        match self {
            Self::Good => Some(Faction::Good),
            Self::Wolves => Some(Faction::Wolves),
            Self::Draw => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// A state of the match state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Phase {
    /// Night actions are collected and resolved.
    Night,
    /// First-day election of the sheriff, whose vote carries extra weight.
    SheriffElection,
    /// Living players speak in seat order.
    DayDiscussion,
    /// Living players vote to exile one player.
    DayVote,
    /// A dying sheriff hands on the badge and players who just died use
    /// an unused shoot ability.
    RevengeWindow,
    /// Win conditions are evaluated.
    WinCheck,
    /// Terminal state.
    GameOver,
}

/// Coarse stage of the match, used to shade decision thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum GameStage {
    /// Days 1-2.
    Early,
    /// Days 3-5.
    Mid,
    /// Day 6 onward.
    Late,
    /// Five or fewer players alive, regardless of day.
    Critical,
}

impl GameStage {
    /// Classify a day given the number of living players.
    pub const fn classify(day: u32, alive: usize) -> Self {
        if alive <= 5 {
            Self::Critical
        } else if day >= 6 {
            Self::Late
        } else if day >= 3 {
            Self::Mid
        } else {
            Self::Early
        }
    }
}

// ---------------------------------------------------------------------------
// Actions and deaths
// ---------------------------------------------------------------------------

/// The kind of action a decision maker is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ActionKind {
    /// Wolves choose a night victim.
    Kill,
    /// Guard chooses a player to protect.
    Protect,
    /// Seer chooses a player to check.
    Check,
    /// Witch decides whether to save the night victim.
    Save,
    /// Witch chooses a player to poison.
    Poison,
    /// Day vote for exile.
    Vote,
    /// Hunter or `WolfKing` revenge shot.
    Shoot,
    /// Whether to run for sheriff. Naming oneself means running.
    Candidacy,
    /// Sheriff election ballot among the candidates.
    SheriffVote,
    /// A dying sheriff hands the badge on. Abstaining tears it up.
    PassBadge,
}

/// Why a player died. A player dies from at most one cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum DeathCause {
    /// Unblocked wolf kill.
    WolfKill,
    /// Witch poison. Disables revenge shots.
    Poison,
    /// Exiled by the day vote.
    Exiled,
    /// Shot by a Hunter or `WolfKing`.
    Shot,
}

impl DeathCause {
    /// Returns `true` if dying this way still allows a revenge shot.
    pub const fn permits_revenge(self) -> bool {
        !matches!(self, Self::Poison)
    }
}

impl core::fmt::Display for DeathCause {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            Self::WolfKill => "wolf_kill",
            Self::Poison => "poison",
            Self::Exiled => "exiled",
            Self::Shot => "shot",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Evidence kinds
// ---------------------------------------------------------------------------

/// The kind of observation an [`Evidence`](crate::Evidence) record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum EvidenceKind {
    /// A Seer's check result. Strong evidence.
    CheckResult,
    /// A day vote cast by the source against the target.
    VoteCast,
    /// The source's message tried to impersonate system instructions.
    InjectionDetected,
    /// The source misquoted another player's recorded statement.
    FalseQuote,
    /// Logical quality of the source's speech.
    SpeechQuality,
    /// The target was attacked at night and survived thanks to protection.
    ProtectOutcome,
}

impl EvidenceKind {
    /// Evidence kinds whose likelihood ratios are tuned by the calibrator.
    pub const WEAK: [Self; 5] = [
        Self::VoteCast,
        Self::InjectionDetected,
        Self::FalseQuote,
        Self::SpeechQuality,
        Self::ProtectOutcome,
    ];

    /// Returns `true` for skill-check results.
    pub const fn is_strong(self) -> bool {
        matches!(self, Self::CheckResult)
    }

    /// Returns `true` for kinds produced by the detection pipeline.
    ///
    /// Detection findings about the same speaker in the same round share
    /// a cause and are combined as correlated evidence.
    pub const fn is_correlated(self) -> bool {
        matches!(
            self,
            Self::InjectionDetected | Self::FalseQuote | Self::SpeechQuality
        )
    }

    /// Returns `true` if the evidence is about its source player rather
    /// than its target.
    pub const fn concerns_source(self) -> bool {
        matches!(
            self,
            Self::VoteCast | Self::InjectionDetected | Self::FalseQuote | Self::SpeechQuality
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wolf_king_is_wolf_aligned() {
        assert!(Role::WolfKing.is_wolf_aligned());
        assert!(Role::Wolf.is_wolf_aligned());
        assert!(!Role::Hunter.is_wolf_aligned());
        assert_eq!(Role::Seer.faction(), Faction::Good);
    }

    #[test]
    fn poison_blocks_revenge() {
        assert!(!DeathCause::Poison.permits_revenge());
        assert!(DeathCause::WolfKill.permits_revenge());
        assert!(DeathCause::Exiled.permits_revenge());
    }

    #[test]
    fn stage_classification() {
        assert_eq!(GameStage::classify(1, 9), GameStage::Early);
        assert_eq!(GameStage::classify(4, 9), GameStage::Mid);
        assert_eq!(GameStage::classify(7, 9), GameStage::Late);
        assert_eq!(GameStage::classify(1, 5), GameStage::Critical);
    }

    #[test]
    fn weak_kinds_exclude_check_results() {
        assert!(!EvidenceKind::WEAK.contains(&EvidenceKind::CheckResult));
        assert!(EvidenceKind::CheckResult.is_strong());
    }
}
