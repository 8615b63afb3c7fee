//! Authoritative game state for one match.
//!
//! The orchestrator is the only owner. Every other component receives a
//! shared reference; all mutation goes through the methods here, and each
//! of them refuses (with [`MatchError::StateCorruption`]) to break a game
//! invariant rather than silently repairing it.
//!
//! # Invariants
//!
//! - The seating never changes: `alive + dead == seated` at all times.
//! - Witch potions are consumed at most once each.
//! - The guard never protects the same player two nights in a row.
//! - A revenge shot is gone once fired or once its holder is poisoned.
//! - A player's vote history never outgrows the number of day votes held.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use werewolf_agents::capabilities;
use werewolf_types::{
    DeathCause, Evidence, MatchId, Phase, Player, PlayerId, Role, RoleAssignment, SpeechFlag,
    VoteRecord, Winner,
};

use crate::error::MatchError;

/// Complete state of a running match.
#[derive(Debug, Clone, Serialize)]
pub struct GameState {
    match_id: MatchId,
    round: u32,
    phase: Phase,
    players: BTreeMap<PlayerId, Player>,
    sheriff: Option<PlayerId>,
    antidote_used: bool,
    poison_used: bool,
    guard_last: Option<PlayerId>,
    can_shoot: BTreeMap<PlayerId, bool>,
    checked: BTreeSet<PlayerId>,
    day_votes: u32,
    winner: Option<Winner>,
}

impl GameState {
    /// Seat `players` and start at the first night.
    pub fn new(match_id: MatchId, players: Vec<Player>) -> Result<Self, MatchError> {
        let mut seated = BTreeMap::new();
        let mut names = BTreeSet::new();
        for player in players {
            if !names.insert(player.name.clone()) {
                return Err(MatchError::corruption(format!("duplicate player name {}", player.name)));
            }
            let id = player.id;
            if seated.insert(id, player).is_some() {
                return Err(MatchError::corruption(format!("duplicate seat {id}")));
            }
        }
        let can_shoot = seated
            .values()
            .filter(|p| capabilities(p.role).revenge)
            .map(|p| (p.id, true))
            .collect();

        Ok(Self {
            match_id,
            round: 1,
            phase: Phase::Night,
            players: seated,
            sheriff: None,
            antidote_used: false,
            poison_used: false,
            guard_last: None,
            can_shoot,
            checked: BTreeSet::new(),
            day_votes: 0,
            winner: None,
        })
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// The match this state belongs to.
    pub const fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// Day counter, starting at 1.
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// Phase about to run (or [`Phase::GameOver`]).
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// One player by seat.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Every seated player, ordered by seat.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Number of seats.
    pub fn seated(&self) -> usize {
        self.players.len()
    }

    /// Living players, ordered by seat.
    pub fn alive(&self) -> Vec<PlayerId> {
        self.players.values().filter(|p| p.alive).map(|p| p.id).collect()
    }

    /// Returns `true` if `id` is seated and alive.
    pub fn is_alive(&self, id: PlayerId) -> bool {
        self.players.get(&id).is_some_and(|p| p.alive)
    }

    /// Role dealt to `id`.
    pub fn role_of(&self, id: PlayerId) -> Option<Role> {
        self.players.get(&id).map(|p| p.role)
    }

    /// Living holders of `role`, ordered by seat.
    pub fn living_with(&self, role: Role) -> Vec<PlayerId> {
        self.players
            .values()
            .filter(|p| p.alive && p.role == role)
            .map(|p| p.id)
            .collect()
    }

    /// Living wolf-aligned players, ordered by seat.
    pub fn living_wolves(&self) -> Vec<PlayerId> {
        self.players
            .values()
            .filter(|p| p.alive && p.role.is_wolf_aligned())
            .map(|p| p.id)
            .collect()
    }

    /// Every wolf-aligned seat, living or dead.
    pub fn wolf_pack(&self) -> BTreeSet<PlayerId> {
        self.players
            .values()
            .filter(|p| p.role.is_wolf_aligned())
            .map(|p| p.id)
            .collect()
    }

    /// Current sheriff.
    pub const fn sheriff(&self) -> Option<PlayerId> {
        self.sheriff
    }

    /// Witch antidote still unused.
    pub const fn antidote_available(&self) -> bool {
        !self.antidote_used
    }

    /// Witch poison still unused.
    pub const fn poison_available(&self) -> bool {
        !self.poison_used
    }

    /// Player the guard protected on the previous night.
    pub const fn last_protected(&self) -> Option<PlayerId> {
        self.guard_last
    }

    /// Whether `id` still holds a revenge shot.
    pub fn can_shoot(&self, id: PlayerId) -> bool {
        self.can_shoot.get(&id).copied().unwrap_or(false)
    }

    /// Players the seer has already checked.
    pub const fn checked(&self) -> &BTreeSet<PlayerId> {
        &self.checked
    }

    /// Day votes held so far.
    pub const fn day_votes(&self) -> u32 {
        self.day_votes
    }

    /// Winner, once decided.
    pub const fn winner(&self) -> Option<Winner> {
        self.winner
    }

    /// Which side has won, judged on who is alive now.
    ///
    /// Good wins when no wolf is left; wolves win once they are at least as
    /// many as the good players.
    pub fn evaluate_winner(&self) -> Option<Winner> {
        let wolves = self.living_wolves().len();
        let alive = self.players.values().filter(|p| p.alive).count();
        let good = alive.saturating_sub(wolves);
        if wolves == 0 {
            Some(Winner::Good)
        } else if wolves >= good {
            Some(Winner::Wolves)
        } else {
            None
        }
    }

    /// Final role assignments, ordered by seat.
    pub fn role_assignments(&self) -> Vec<RoleAssignment> {
        self.players
            .values()
            .map(|p| RoleAssignment {
                player: p.id,
                role: p.role,
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Phase bookkeeping
    // -----------------------------------------------------------------------

    /// Move to `phase` within the current round.
    pub fn set_phase(&mut self, phase: Phase) {
        debug!(match_id = %self.match_id, round = self.round, from = ?self.phase, to = ?phase, "phase transition");
        self.phase = phase;
    }

    /// Start the next round's night.
    pub fn next_round(&mut self) {
        self.round = self.round.saturating_add(1);
        self.phase = Phase::Night;
    }

    /// Open a day vote. Each living player may now record one vote.
    pub fn open_day_vote(&mut self) {
        self.day_votes = self.day_votes.saturating_add(1);
    }

    /// End the match.
    pub fn finish(&mut self, winner: Winner) {
        self.winner = Some(winner);
        self.phase = Phase::GameOver;
        info!(match_id = %self.match_id, round = self.round, winner = ?winner, "match over");
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Record `id`'s death.
    pub fn kill(&mut self, id: PlayerId, cause: DeathCause) -> Result<(), MatchError> {
        let player = self.living_mut(id)?;
        player.alive = false;
        player.death_cause = Some(cause);
        if let (DeathCause::Poison, Some(shot)) = (cause, self.can_shoot.get_mut(&id)) {
            *shot = false;
        }
        if self.sheriff == Some(id) {
            self.sheriff = None;
        }
        info!(match_id = %self.match_id, round = self.round, player = %id, cause = %cause, "player died");
        Ok(())
    }

    /// Hand the sheriff badge to a living player, or drop it.
    pub fn set_sheriff(&mut self, id: Option<PlayerId>) -> Result<(), MatchError> {
        if let Some(id) = id {
            self.living_mut(id)?;
        }
        self.sheriff = id;
        Ok(())
    }

    /// Use up the witch's antidote.
    pub fn consume_antidote(&mut self) -> Result<(), MatchError> {
        if self.antidote_used {
            return Err(MatchError::corruption("antidote used twice"));
        }
        self.antidote_used = true;
        Ok(())
    }

    /// Use up the witch's poison.
    pub fn consume_poison(&mut self) -> Result<(), MatchError> {
        if self.poison_used {
            return Err(MatchError::corruption("poison used twice"));
        }
        self.poison_used = true;
        Ok(())
    }

    /// Record tonight's guard target. `None` when the guard did not act.
    pub fn set_guard_target(&mut self, target: Option<PlayerId>) -> Result<(), MatchError> {
        if target.is_some() && target == self.guard_last {
            return Err(MatchError::corruption(format!(
                "guard protected {} on consecutive nights",
                target.map_or_else(String::new, |t| t.to_string())
            )));
        }
        self.guard_last = target;
        Ok(())
    }

    /// Use up `id`'s revenge shot.
    pub fn consume_shot(&mut self, id: PlayerId) -> Result<(), MatchError> {
        match self.can_shoot.get_mut(&id) {
            Some(shot) if *shot => {
                *shot = false;
                Ok(())
            }
            _ => Err(MatchError::corruption(format!("{id} fired a shot it does not hold"))),
        }
    }

    /// Remember that the seer has checked `target`.
    pub fn mark_checked(&mut self, target: PlayerId) {
        self.checked.insert(target);
    }

    /// Append a day vote to `voter`'s history.
    pub fn record_vote(&mut self, voter: PlayerId, target: Option<PlayerId>) -> Result<(), MatchError> {
        let round = self.round;
        let limit = usize::try_from(self.day_votes).unwrap_or(usize::MAX);
        let player = self.living_mut(voter)?;
        if player.vote_history.len() >= limit {
            return Err(MatchError::corruption(format!("{voter} voted twice in one day")));
        }
        player.vote_history.push(VoteRecord { round, target });
        Ok(())
    }

    /// Record a self-declared role.
    pub fn set_claim(&mut self, id: PlayerId, role: Role) {
        if let Some(player) = self.players.get_mut(&id) {
            player.claimed_role = Some(role);
        }
    }

    /// Attach a detection finding to `id`.
    pub fn push_flag(&mut self, id: PlayerId, evidence: &Evidence) {
        if let Some(player) = self.players.get_mut(&id) {
            player.speech_flags.push(SpeechFlag {
                round: evidence.round,
                kind: evidence.kind,
                strength: evidence.strength,
            });
        }
    }

    /// Copy the latest trust and suspicion scores onto the players.
    ///
    /// Players missing from `probabilities` (the dead) keep their last value.
    pub fn sync_scores(
        &mut self,
        trust: &BTreeMap<PlayerId, Decimal>,
        probabilities: &BTreeMap<PlayerId, f64>,
    ) {
        for player in self.players.values_mut() {
            if let Some(score) = trust.get(&player.id) {
                player.trust_score = *score;
            }
            if let Some(p) = probabilities.get(&player.id) {
                player.wolf_probability = *p;
            }
        }
    }

    /// Verify the state invariants that depend on the score ranges.
    pub fn check_invariants(
        &self,
        trust_range: (Decimal, Decimal),
        probability_range: (f64, f64),
    ) -> Result<(), MatchError> {
        let limit = usize::try_from(self.day_votes).unwrap_or(usize::MAX);
        for player in self.players.values() {
            if player.trust_score < trust_range.0 || player.trust_score > trust_range.1 {
                return Err(MatchError::corruption(format!(
                    "{} trust {} outside [{}, {}]",
                    player.id, player.trust_score, trust_range.0, trust_range.1
                )));
            }
            let p = player.wolf_probability;
            if !(probability_range.0..=probability_range.1).contains(&p) {
                return Err(MatchError::corruption(format!(
                    "{} wolf-probability {p} outside [{}, {}]",
                    player.id, probability_range.0, probability_range.1
                )));
            }
            if player.vote_history.len() > limit {
                return Err(MatchError::corruption(format!(
                    "{} has {} votes after {} day votes",
                    player.id,
                    player.vote_history.len(),
                    self.day_votes
                )));
            }
            if player.alive == player.death_cause.is_some() {
                return Err(MatchError::corruption(format!(
                    "{} alive flag disagrees with death cause",
                    player.id
                )));
            }
        }
        Ok(())
    }

    fn living_mut(&mut self, id: PlayerId) -> Result<&mut Player, MatchError> {
        match self.players.get_mut(&id) {
            Some(player) if player.alive => Ok(player),
            Some(_) => Err(MatchError::corruption(format!("{id} is dead but was asked to act"))),
            None => Err(MatchError::corruption(format!("{id} is not seated"))),
        }
    }
}
