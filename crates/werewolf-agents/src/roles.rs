//! Role capability table and decision dispatch.
//!
//! Roles are a closed set. What a role may do is a row in
//! [`capabilities`]; which function decides an action is a row in
//! [`decision_maker`]. The wolf king is a wolf with the revenge capability
//! attached, not a separate decision bundle.

use tracing::{debug, warn};

use werewolf_types::{ActionKind, PlayerId, Role};

use crate::config::DecisionConfig;
use crate::context::DecisionContext;
use crate::decision::DecisionOutcome;
use crate::error::DecisionError;
use crate::makers::{self, DecideFn};

/// What a role is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Night actions, in the order they are requested.
    pub night: &'static [ActionKind],
    /// May shoot on death.
    pub revenge: bool,
    /// Knows the other wolf-aligned players.
    pub knows_pack: bool,
}

impl Capabilities {
    /// Returns `true` if the role may be asked for `kind`. Every role votes
    /// and takes part in the sheriff election.
    pub fn permits(&self, kind: ActionKind) -> bool {
        match kind {
            ActionKind::Vote | ActionKind::Candidacy | ActionKind::SheriffVote | ActionKind::PassBadge => true,
            ActionKind::Shoot => self.revenge,
            other => self.night.contains(&other),
        }
    }
}

/// The capability row for `role`.
pub const fn capabilities(role: Role) -> Capabilities {
    match role {
        Role::Villager => Capabilities {
            night: &[],
            revenge: false,
            knows_pack: false,
        },
        Role::Wolf => Capabilities {
            night: &[ActionKind::Kill],
            revenge: false,
            knows_pack: true,
        },
        Role::WolfKing => Capabilities {
            night: &[ActionKind::Kill],
            revenge: true,
            knows_pack: true,
        },
        Role::Seer => Capabilities {
            night: &[ActionKind::Check],
            revenge: false,
            knows_pack: false,
        },
        Role::Witch => Capabilities {
            night: &[ActionKind::Save, ActionKind::Poison],
            revenge: false,
            knows_pack: false,
        },
        Role::Guard => Capabilities {
            night: &[ActionKind::Protect],
            revenge: false,
            knows_pack: false,
        },
        Role::Hunter => Capabilities {
            night: &[],
            revenge: true,
            knows_pack: false,
        },
    }
}

/// The decision maker for `kind`.
pub const fn decision_maker(kind: ActionKind) -> DecideFn {
    match kind {
        ActionKind::Kill => makers::kill,
        ActionKind::Protect => makers::protect,
        ActionKind::Check => makers::check,
        ActionKind::Save => makers::save,
        ActionKind::Poison => makers::poison,
        ActionKind::Vote => makers::vote,
        ActionKind::Shoot => makers::shoot,
        ActionKind::Candidacy => makers::candidacy,
        ActionKind::SheriffVote => makers::sheriff_vote,
        ActionKind::PassBadge => makers::pass_badge,
    }
}

/// Legality filters plus dispatch to the per-kind decision makers.
#[derive(Debug, Clone)]
pub struct DecisionMakers {
    config: DecisionConfig,
}

impl DecisionMakers {
    /// Validate `config` and build the dispatcher.
    pub fn new(config: DecisionConfig) -> Result<Self, DecisionError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The active configuration.
    pub const fn config(&self) -> &DecisionConfig {
        &self.config
    }

    /// Reduce `pool` to the legal targets of `kind`.
    ///
    /// `pool` is the living players, or the declared candidates for a
    /// sheriff ballot.
    ///
    /// The result is sorted by seat and deduplicated.
    pub fn legal_candidates(
        &self,
        kind: ActionKind,
        ctx: &DecisionContext,
        pool: &[PlayerId],
    ) -> Vec<PlayerId> {
        let mut out: Vec<PlayerId> = pool.to_vec();
        out.sort_unstable();
        out.dedup();

        let actor = ctx.actor;
        match kind {
            ActionKind::Protect => {
                out.retain(|p| Some(*p) != ctx.abilities.last_protected);
                if !self.config.guard_self_protect {
                    out.retain(|p| *p != actor);
                }
            }
            ActionKind::Save => {
                out.retain(|p| Some(*p) == ctx.abilities.night_victim);
                if !self.config.witch_self_save {
                    out.retain(|p| *p != actor);
                }
            }
            ActionKind::Check => {
                out.retain(|p| *p != actor && !ctx.abilities.checked.contains(p));
            }
            ActionKind::Kill => {
                out.retain(|p| *p != actor && !ctx.is_ally(*p));
            }
            ActionKind::Candidacy => {
                out.retain(|p| *p == actor);
            }
            ActionKind::Vote
            | ActionKind::Poison
            | ActionKind::Shoot
            | ActionKind::SheriffVote
            | ActionKind::PassBadge => {
                out.retain(|p| *p != actor);
            }
        }
        out
    }

    /// Decide `kind` for the actor in `ctx` among `candidates`.
    ///
    /// Never fails: a role without the capability, or an empty legal set,
    /// abstains.
    pub fn decide(
        &self,
        kind: ActionKind,
        candidates: &[PlayerId],
        ctx: &DecisionContext,
    ) -> DecisionOutcome {
        if !capabilities(ctx.role).permits(kind) {
            return DecisionOutcome::abstain(format!("{} cannot {kind:?}", ctx.role));
        }
        let legal = self.legal_candidates(kind, ctx, candidates);
        if legal.is_empty() {
            return DecisionOutcome::abstain("no legal candidates");
        }

        let outcome = decision_maker(kind)(&self.config, &legal, ctx);
        if let Some(fallback) = outcome.fallback {
            warn!(
                player = %ctx.actor,
                role = %ctx.role,
                kind = ?kind,
                round = ctx.round,
                fallback = %fallback,
                "decision fell back"
            );
        } else {
            debug!(
                player = %ctx.actor,
                role = %ctx.role,
                kind = ?kind,
                round = ctx.round,
                decision = %outcome.decision,
                reason = %outcome.reason,
                "decision made"
            );
        }
        outcome
    }
}
