//! Night skill resolution.
//!
//! Given the night's submitted actions, [`resolve`] produces the
//! authoritative outcome in a fixed precedence: guard protect, wolf kill,
//! witch save and poison, seer check. It reads the state and never mutates
//! it, so applying it twice to the same input yields the same outcome.
//!
//! - Protect or save cancels the kill. Both together still cancel it once.
//! - Poison always lands; the guard cannot block it.
//! - A player dies at most once per night. When poison and an unblocked
//!   kill hit the same player, the recorded cause is poison.

use serde::Serialize;
use tracing::debug;

use werewolf_types::{DeathCause, PlayerId};

use crate::error::MatchError;
use crate::state::GameState;

/// Actions submitted during one night. Rebuilt from scratch every night.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NightActions {
    /// The guard who acted.
    pub guard: Option<PlayerId>,
    /// Player the guard protected.
    pub protect: Option<PlayerId>,
    /// The wolves' agreed victim.
    pub kill: Option<PlayerId>,
    /// The witch who acted.
    pub witch: Option<PlayerId>,
    /// Player the witch saved with the antidote.
    pub save: Option<PlayerId>,
    /// Player the witch poisoned.
    pub poison: Option<PlayerId>,
    /// The seer who acted.
    pub seer: Option<PlayerId>,
    /// Player the seer checked.
    pub check: Option<PlayerId>,
}

/// One death produced by resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Death {
    /// Who died.
    pub player: PlayerId,
    /// Recorded cause.
    pub cause: DeathCause,
}

/// The wolves' victim survived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Survival {
    /// The victim.
    pub player: PlayerId,
    /// The guard was on them.
    pub protected: bool,
    /// The witch spent the antidote on them.
    pub saved: bool,
}

/// The seer's private result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckReveal {
    /// The seer.
    pub seer: PlayerId,
    /// Who was checked.
    pub target: PlayerId,
    /// Whether the target is wolf-aligned.
    pub is_wolf: bool,
}

/// Authoritative result of one night.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NightOutcome {
    /// Deaths, ordered by seat.
    pub deaths: Vec<Death>,
    /// Set when the kill was cancelled.
    pub survival: Option<Survival>,
    /// Seer's result, if a check was made.
    pub reveal: Option<CheckReveal>,
}

impl NightOutcome {
    /// Returns `true` if `player` died tonight.
    pub fn died(&self, player: PlayerId) -> bool {
        self.deaths.iter().any(|d| d.player == player)
    }
}

/// Resolve `actions` against `state`.
///
/// Every target must be alive; anything else means the orchestrator let an
/// illegal action through and is reported as state corruption.
pub fn resolve(actions: &NightActions, state: &GameState) -> Result<NightOutcome, MatchError> {
    for (label, target) in [
        ("protect", actions.protect),
        ("kill", actions.kill),
        ("save", actions.save),
        ("poison", actions.poison),
        ("check", actions.check),
    ] {
        if let Some(target) = target.filter(|t| !state.is_alive(*t)) {
            return Err(MatchError::corruption(format!("{label} target {target} is not alive")));
        }
    }
    if actions.save.is_some() && actions.save != actions.kill {
        return Err(MatchError::corruption("witch saved a player the wolves did not attack"));
    }

    let mut outcome = NightOutcome::default();

    // 1-2. Protect and kill.
    let protected = actions.kill.is_some() && actions.protect == actions.kill;

    // 3. Save and poison.
    let saved = actions.save.is_some();
    if let Some(victim) = actions.kill {
        if protected || saved {
            outcome.survival = Some(Survival {
                player: victim,
                protected,
                saved,
            });
        } else if actions.poison != Some(victim) {
            outcome.deaths.push(Death {
                player: victim,
                cause: DeathCause::WolfKill,
            });
        }
    }
    if let Some(target) = actions.poison {
        outcome.deaths.push(Death {
            player: target,
            cause: DeathCause::Poison,
        });
        if outcome.survival.is_some_and(|s| s.player == target) {
            outcome.survival = None;
        }
    }
    outcome.deaths.sort_by_key(|d| d.player);

    // 4. Check.
    if let (Some(seer), Some(target)) = (actions.seer, actions.check) {
        let is_wolf = state
            .role_of(target)
            .is_some_and(werewolf_types::Role::is_wolf_aligned);
        outcome.reveal = Some(CheckReveal {
            seer,
            target,
            is_wolf,
        });
    }

    debug!(
        match_id = %state.match_id(),
        round = state.round(),
        deaths = outcome.deaths.len(),
        survival = ?outcome.survival,
        "night resolved"
    );
    Ok(outcome)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;
    use werewolf_types::{MatchId, Player, Role};

    use super::*;

    fn seat(n: u32) -> PlayerId {
        PlayerId::new(n)
    }

    /// 1 wolf, 2 wolf, 3 seer, 4 witch, 5 guard, 6 hunter, 7-8 villagers.
    fn state() -> GameState {
        let roles = [
            Role::Wolf,
            Role::Wolf,
            Role::Seer,
            Role::Witch,
            Role::Guard,
            Role::Hunter,
            Role::Villager,
            Role::Villager,
        ];
        let players = roles
            .iter()
            .zip(1_u32..)
            .map(|(role, n)| Player::new(seat(n), format!("p{n}"), *role, dec!(50), 0.25))
            .collect();
        GameState::new(MatchId::new(), players).unwrap()
    }

    #[test]
    fn unblocked_kill_dies() {
        let actions = NightActions {
            kill: Some(seat(7)),
            ..NightActions::default()
        };
        let out = resolve(&actions, &state()).unwrap();
        assert_eq!(
            out.deaths,
            vec![Death {
                player: seat(7),
                cause: DeathCause::WolfKill
            }]
        );
        assert!(out.survival.is_none());
    }

    #[test]
    fn save_and_protect_cancel_once() {
        let actions = NightActions {
            guard: Some(seat(5)),
            protect: Some(seat(7)),
            kill: Some(seat(7)),
            witch: Some(seat(4)),
            save: Some(seat(7)),
            ..NightActions::default()
        };
        let out = resolve(&actions, &state()).unwrap();
        assert!(out.deaths.is_empty());
        assert_eq!(
            out.survival,
            Some(Survival {
                player: seat(7),
                protected: true,
                saved: true
            })
        );
    }

    #[test]
    fn poison_on_the_kill_target_records_poison() {
        let actions = NightActions {
            kill: Some(seat(6)),
            witch: Some(seat(4)),
            poison: Some(seat(6)),
            ..NightActions::default()
        };
        let out = resolve(&actions, &state()).unwrap();
        assert_eq!(
            out.deaths,
            vec![Death {
                player: seat(6),
                cause: DeathCause::Poison
            }]
        );
    }

    #[test]
    fn poison_beats_protection() {
        let actions = NightActions {
            guard: Some(seat(5)),
            protect: Some(seat(6)),
            kill: Some(seat(6)),
            witch: Some(seat(4)),
            poison: Some(seat(6)),
            ..NightActions::default()
        };
        let out = resolve(&actions, &state()).unwrap();
        assert!(out.died(seat(6)));
        assert!(out.survival.is_none());
        assert_eq!(out.deaths.len(), 1);
    }

    #[test]
    fn deaths_are_ordered_by_seat() {
        let actions = NightActions {
            kill: Some(seat(8)),
            witch: Some(seat(4)),
            poison: Some(seat(3)),
            ..NightActions::default()
        };
        let out = resolve(&actions, &state()).unwrap();
        let seats: Vec<_> = out.deaths.iter().map(|d| d.player).collect();
        assert_eq!(seats, vec![seat(3), seat(8)]);
    }

    #[test]
    fn check_reveals_alignment() {
        let actions = NightActions {
            seer: Some(seat(3)),
            check: Some(seat(2)),
            ..NightActions::default()
        };
        let out = resolve(&actions, &state()).unwrap();
        assert_eq!(
            out.reveal,
            Some(CheckReveal {
                seer: seat(3),
                target: seat(2),
                is_wolf: true
            })
        );
    }

    #[test]
    fn dead_target_is_corruption() {
        let mut s = state();
        s.kill(seat(7), DeathCause::Exiled).unwrap();
        let actions = NightActions {
            kill: Some(seat(7)),
            ..NightActions::default()
        };
        assert!(matches!(
            resolve(&actions, &s),
            Err(MatchError::StateCorruption { .. })
        ));
    }

    #[test]
    fn save_without_matching_kill_is_corruption() {
        let actions = NightActions {
            kill: Some(seat(7)),
            save: Some(seat(8)),
            ..NightActions::default()
        };
        assert!(resolve(&actions, &state()).is_err());
    }

    #[test]
    fn resolution_is_repeatable() {
        let s = state();
        let actions = NightActions {
            guard: Some(seat(5)),
            protect: Some(seat(3)),
            kill: Some(seat(8)),
            witch: Some(seat(4)),
            poison: Some(seat(1)),
            seer: Some(seat(3)),
            check: Some(seat(7)),
            ..NightActions::default()
        };
        let first = resolve(&actions, &s).unwrap();
        for _ in 0..5 {
            assert_eq!(resolve(&actions, &s).unwrap(), first);
        }
    }
}
