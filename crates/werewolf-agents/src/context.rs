//! The read-only view a decision maker ranks candidates against.
//!
//! The orchestrator builds one [`DecisionContext`] per request from its game
//! state, trust ledger and suspicion snapshot. Decision makers never see or
//! mutate the game state itself.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use werewolf_types::{DeathCause, GameStage, PlayerId, Role};

/// Ability flags relevant to the acting player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AbilityState {
    /// Guard: target protected on the previous night.
    pub last_protected: Option<PlayerId>,
    /// Seer: players already checked.
    pub checked: BTreeSet<PlayerId>,
    /// Witch: antidote still unused.
    pub antidote_available: bool,
    /// Witch: poison still unused.
    pub poison_available: bool,
    /// Witch: a potion was already used tonight.
    pub potion_used_tonight: bool,
    /// Witch: tonight's wolf victim.
    pub night_victim: Option<PlayerId>,
    /// Hunter and wolf king: revenge shot still available.
    pub can_shoot: bool,
    /// How the acting player died, for revenge requests.
    pub death_cause: Option<DeathCause>,
}

/// Everything a decision maker may look at for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionContext {
    /// Round (day counter).
    pub round: u32,
    /// Coarse match progress.
    pub stage: GameStage,
    /// The acting player.
    pub actor: PlayerId,
    /// The acting player's role.
    pub role: Role,
    /// Known wolf teammates. Empty for good roles.
    pub allies: BTreeSet<PlayerId>,
    /// Current wolf-probability of each living player.
    pub wolf_probability: BTreeMap<PlayerId, f64>,
    /// Current trust score of each living player.
    pub trust: BTreeMap<PlayerId, Decimal>,
    /// Lowest and highest possible trust score.
    pub trust_bounds: (Decimal, Decimal),
    /// Current sheriff.
    pub sheriff: Option<PlayerId>,
    /// Publicly claimed roles.
    pub claims: BTreeMap<PlayerId, Role>,
    /// Ability flags of the acting player.
    pub abilities: AbilityState,
}

impl DecisionContext {
    /// A context with no scores, no claims and default trust bounds.
    pub fn new(round: u32, stage: GameStage, actor: PlayerId, role: Role) -> Self {
        Self {
            round,
            stage,
            actor,
            role,
            allies: BTreeSet::new(),
            wolf_probability: BTreeMap::new(),
            trust: BTreeMap::new(),
            trust_bounds: (Decimal::ZERO, Decimal::ONE_HUNDRED),
            sheriff: None,
            claims: BTreeMap::new(),
            abilities: AbilityState::default(),
        }
    }

    /// Wolf-probability of `player`, if known.
    pub fn probability(&self, player: PlayerId) -> Option<f64> {
        self.wolf_probability.get(&player).copied()
    }

    /// Trust of `player` mapped onto `[0, 1]`, if known.
    pub fn trust_unit(&self, player: PlayerId) -> Option<f64> {
        let score = *self.trust.get(&player)?;
        let (min, max) = self.trust_bounds;
        let range = max.checked_sub(min).filter(|r| r.is_sign_positive() && !r.is_zero())?;
        score
            .checked_sub(min)
            .and_then(|offset| offset.checked_div(range))
            .and_then(|unit| unit.to_f64())
            .map(|unit| unit.clamp(0.0, 1.0))
    }

    /// Lowest-trusted player among `candidates`; ties go to the lowest seat.
    ///
    /// `None` if `candidates` is empty or any of them has no trust score.
    pub fn least_trusted(&self, candidates: &[PlayerId]) -> Option<PlayerId> {
        self.trusted(candidates)?
            .into_iter()
            .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
            .map(|(player, _)| player)
    }

    /// Highest-trusted player among `candidates`; ties go to the lowest seat.
    ///
    /// `None` if `candidates` is empty or any of them has no trust score.
    pub fn most_trusted(&self, candidates: &[PlayerId]) -> Option<PlayerId> {
        self.trusted(candidates)?
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
            .map(|(player, _)| player)
    }

    fn trusted(&self, candidates: &[PlayerId]) -> Option<Vec<(PlayerId, Decimal)>> {
        candidates
            .iter()
            .map(|&p| self.trust.get(&p).map(|t| (p, *t)))
            .collect()
    }

    /// Returns `true` if `player` is one of the actor's wolf teammates.
    pub fn is_ally(&self, player: PlayerId) -> bool {
        self.allies.contains(&player)
    }

    /// Role `player` has publicly claimed.
    pub fn claim(&self, player: PlayerId) -> Option<Role> {
        self.claims.get(&player).copied()
    }

    /// Returns `true` in the late or critical stage.
    pub const fn is_endgame(&self) -> bool {
        matches!(self.stage, GameStage::Late | GameStage::Critical)
    }
}
