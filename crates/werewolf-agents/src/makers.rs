//! One decision maker per action kind.
//!
//! Each function receives candidates that already passed the legality
//! filter (sorted, non-empty) and returns a target or abstain. None of them
//! can fail.

use werewolf_types::{DeathCause, PlayerId, Role};

use crate::config::DecisionConfig;
use crate::context::DecisionContext;
use crate::decision::{DecisionOutcome, Pick, Scores, outcome_of, rank};

/// Signature shared by every decision maker.
pub type DecideFn = fn(&DecisionConfig, &[PlayerId], &DecisionContext) -> DecisionOutcome;

// ---------------------------------------------------------------------------
// Shared scoring
// ---------------------------------------------------------------------------

/// Bonus for players the wolves most want gone.
fn role_bonus(config: &DecisionConfig, s: &Scores) -> f64 {
    let claim = match s.claim {
        Some(Role::Seer) => config.seer_claim_bonus,
        Some(Role::Witch) => config.witch_claim_bonus,
        _ => 0.0,
    };
    let sheriff = if s.sheriff { config.sheriff_bonus } else { 0.0 };
    claim + sheriff
}

/// `threshold` lowered by the endgame relief late in the match.
fn effective(config: &DecisionConfig, ctx: &DecisionContext, threshold: f64) -> f64 {
    if ctx.is_endgame() {
        (threshold - config.endgame_relief).max(0.0)
    } else {
        threshold
    }
}

// ---------------------------------------------------------------------------
// Day
// ---------------------------------------------------------------------------

/// Day vote. Good players vote the top suspect; wolves vote the most
/// trusted player outside the pack.
pub fn vote(_config: &DecisionConfig, candidates: &[PlayerId], ctx: &DecisionContext) -> DecisionOutcome {
    if ctx.role.is_wolf_aligned() {
        let outsiders: Vec<PlayerId> = candidates.iter().copied().filter(|p| !ctx.is_ally(*p)).collect();
        return rank(ctx, &outsiders, |s| s.trust).map_or_else(
            || DecisionOutcome::abstain("only teammates left to vote"),
            |pick| outcome_of(pick, |p, t| format!("vote {p}: most trusted outsider ({t:.2})")),
        );
    }
    rank(ctx, candidates, |s| s.p_wolf).map_or_else(
        || DecisionOutcome::abstain("no candidates"),
        |pick| outcome_of(pick, |p, w| format!("vote {p}: highest wolf-probability ({w:.2})")),
    )
}

// ---------------------------------------------------------------------------
// Sheriff
// ---------------------------------------------------------------------------

/// Whether to run for sheriff. Special good roles run on modest trust in
/// themselves, wolves only when they look clean.
pub fn candidacy(config: &DecisionConfig, candidates: &[PlayerId], ctx: &DecisionContext) -> DecisionOutcome {
    let me = ctx.actor;
    if !candidates.contains(&me) {
        return DecisionOutcome::abstain("not eligible to run");
    }
    let threshold = match ctx.role {
        Role::Seer | Role::Witch | Role::Guard | Role::Hunter => config.sheriff_run_god,
        Role::Wolf | Role::WolfKing => config.sheriff_run_wolf,
        Role::Villager => config.sheriff_run_villager,
    };
    match ctx.trust_unit(me) {
        Some(trust) if trust >= threshold => {
            DecisionOutcome::target(me, format!("run for sheriff: trust {trust:.2} >= {threshold:.2}"))
        }
        Some(trust) => DecisionOutcome::abstain(format!("stay out: trust {trust:.2} < {threshold:.2}")),
        None => DecisionOutcome::abstain("own trust unknown"),
    }
}

/// Sheriff ballot. Good players back the most trusted, least suspected
/// candidate; wolves back a teammate, or else the weakest-looking outsider.
pub fn sheriff_vote(_config: &DecisionConfig, candidates: &[PlayerId], ctx: &DecisionContext) -> DecisionOutcome {
    if ctx.role.is_wolf_aligned() {
        let allies: Vec<PlayerId> = candidates.iter().copied().filter(|p| ctx.is_ally(*p)).collect();
        if let Some(pick) = rank(ctx, &allies, |s| s.trust) {
            return outcome_of(pick, |p, t| format!("sheriff {p}: teammate ({t:.2})"));
        }
        return rank(ctx, candidates, |s| s.p_wolf).map_or_else(
            || DecisionOutcome::abstain("no candidates"),
            |pick| outcome_of(pick, |p, w| format!("sheriff {p}: weakest outsider ({w:.2})")),
        );
    }
    rank(ctx, candidates, |s| 0.5f64.mul_add(s.trust, 0.5 * (1.0 - s.p_wolf))).map_or_else(
        || DecisionOutcome::abstain("no candidates"),
        |pick| outcome_of(pick, |p, v| format!("sheriff {p}: most reliable ({v:.2})")),
    )
}

/// Badge transfer on the sheriff's death. Good sheriffs pass to the most
/// trusted player if trusted enough, wolves to a teammate; otherwise the
/// badge is torn up.
pub fn pass_badge(config: &DecisionConfig, candidates: &[PlayerId], ctx: &DecisionContext) -> DecisionOutcome {
    if ctx.role.is_wolf_aligned() {
        let allies: Vec<PlayerId> = candidates.iter().copied().filter(|p| ctx.is_ally(*p)).collect();
        return ctx.most_trusted(&allies).map_or_else(
            || DecisionOutcome::abstain("tear badge: no teammate left"),
            |p| DecisionOutcome::target(p, format!("badge to {p}: teammate")),
        );
    }
    let Some(heir) = ctx.most_trusted(candidates) else {
        return DecisionOutcome::abstain("tear badge: trust unknown");
    };
    match ctx.trust_unit(heir) {
        Some(trust) if trust >= config.badge_min_trust => {
            DecisionOutcome::target(heir, format!("badge to {heir}: most trusted ({trust:.2})"))
        }
        _ => DecisionOutcome::abstain(format!("tear badge: nobody trusted above {:.2}", config.badge_min_trust)),
    }
}

// ---------------------------------------------------------------------------
// Night
// ---------------------------------------------------------------------------

/// Wolf kill. Targets the biggest threat: trusted, unsuspected, and
/// preferably a claimed seer or witch or the sheriff.
pub fn kill(config: &DecisionConfig, candidates: &[PlayerId], ctx: &DecisionContext) -> DecisionOutcome {
    rank(ctx, candidates, |s| {
        0.5f64.mul_add(s.trust, 0.5 * (1.0 - s.p_wolf)) + role_bonus(config, s)
    })
    .map_or_else(
        || DecisionOutcome::abstain("no kill target"),
        |pick| outcome_of(pick, |p, t| format!("kill {p}: highest threat ({t:.2})")),
    )
}

/// Guard protect. Shields the most trusted, least suspected player.
pub fn protect(config: &DecisionConfig, candidates: &[PlayerId], ctx: &DecisionContext) -> DecisionOutcome {
    if config.guard_first_night_empty && ctx.round <= 1 {
        return DecisionOutcome::abstain("first night empty guard");
    }
    rank(ctx, candidates, |s| (1.0 - s.p_wolf).mul_add(s.trust, role_bonus(config, s))).map_or_else(
        || DecisionOutcome::abstain("no one to protect"),
        |pick| outcome_of(pick, |p, v| format!("protect {p}: most valuable ({v:.2})")),
    )
}

/// Seer check. Prefers the player whose alignment is most uncertain and
/// whose verdict would matter most.
pub fn check(config: &DecisionConfig, candidates: &[PlayerId], ctx: &DecisionContext) -> DecisionOutcome {
    rank(ctx, candidates, |s| {
        let uncertainty = 1.0 - s.p_wolf.mul_add(2.0, -1.0).abs();
        let claimed = if s.claim.is_some() { config.seer_claim_bonus } else { 0.0 };
        let sheriff = if s.sheriff { config.sheriff_bonus } else { 0.0 };
        let impact = 0.5f64.mul_add(s.trust, 0.5) + claimed + sheriff;
        uncertainty * impact
    })
    .map_or_else(
        || DecisionOutcome::abstain("everyone already checked"),
        |pick| outcome_of(pick, |p, v| format!("check {p}: most informative ({v:.2})")),
    )
}

/// Witch antidote. Saves tonight's victim unless the victim looks like a
/// wolf. Always saves on the first night when configured.
pub fn save(config: &DecisionConfig, candidates: &[PlayerId], ctx: &DecisionContext) -> DecisionOutcome {
    if !ctx.abilities.antidote_available {
        return DecisionOutcome::abstain("antidote already used");
    }
    if config.one_potion_per_night && ctx.abilities.potion_used_tonight {
        return DecisionOutcome::abstain("already used a potion tonight");
    }
    let Some(victim) = ctx.abilities.night_victim.filter(|v| candidates.contains(v)) else {
        return DecisionOutcome::abstain("no savable victim");
    };
    if config.always_save_first_night && ctx.round <= 1 {
        return DecisionOutcome::target(victim, format!("save {victim}: first night"));
    }
    match rank(ctx, &[victim], |s| s.p_wolf) {
        Some(Pick::Ranked { p_wolf, .. }) if p_wolf < config.save_threshold => {
            DecisionOutcome::target(victim, format!("save {victim}: wolf-probability {p_wolf:.2}"))
        }
        Some(Pick::Ranked { p_wolf, .. }) => {
            DecisionOutcome::abstain(format!("victim {victim} looks like a wolf ({p_wolf:.2})"))
        }
        Some(pick) => outcome_of(pick, |p, _| format!("save {p}")),
        None => DecisionOutcome::abstain("no savable victim"),
    }
}

/// Witch poison. Only used on a suspect above the poison threshold.
pub fn poison(config: &DecisionConfig, candidates: &[PlayerId], ctx: &DecisionContext) -> DecisionOutcome {
    if !ctx.abilities.poison_available {
        return DecisionOutcome::abstain("poison already used");
    }
    if config.one_potion_per_night && ctx.abilities.potion_used_tonight {
        return DecisionOutcome::abstain("already used a potion tonight");
    }
    let threshold = effective(config, ctx, config.poison_threshold);
    match rank(ctx, candidates, |s| s.p_wolf) {
        Some(Pick::Ranked { player, p_wolf, .. }) if p_wolf >= threshold => {
            DecisionOutcome::target(player, format!("poison {player}: wolf-probability {p_wolf:.2}"))
        }
        Some(Pick::Ranked { player, p_wolf, .. }) => DecisionOutcome::abstain(format!(
            "top suspect {player} below poison threshold ({p_wolf:.2} < {threshold:.2})"
        )),
        // an unrankable poison is not worth spending
        Some(Pick::Fallback { reason, .. }) => DecisionOutcome {
            fallback: Some(reason),
            ..DecisionOutcome::abstain(format!("cannot rank suspects: {reason}"))
        },
        None => DecisionOutcome::abstain("no poison target"),
    }
}

// ---------------------------------------------------------------------------
// Revenge
// ---------------------------------------------------------------------------

/// Revenge shot. The hunter shoots a clear suspect; the wolf king shoots
/// the most trusted outsider. Poisoned or spent shooters abstain.
pub fn shoot(config: &DecisionConfig, candidates: &[PlayerId], ctx: &DecisionContext) -> DecisionOutcome {
    if ctx.abilities.death_cause == Some(DeathCause::Poison) {
        return DecisionOutcome::abstain("poisoned, cannot shoot");
    }
    if !ctx.abilities.can_shoot {
        return DecisionOutcome::abstain("shot already spent");
    }
    if ctx.role.is_wolf_aligned() {
        let outsiders: Vec<PlayerId> = candidates.iter().copied().filter(|p| !ctx.is_ally(*p)).collect();
        return rank(ctx, &outsiders, |s| s.trust + role_bonus(config, s)).map_or_else(
            || DecisionOutcome::abstain("only teammates in range"),
            |pick| outcome_of(pick, |p, v| format!("shoot {p}: biggest threat ({v:.2})")),
        );
    }
    let threshold = effective(config, ctx, config.shoot_threshold);
    match rank(ctx, candidates, |s| s.p_wolf) {
        Some(Pick::Ranked { player, p_wolf, .. }) if p_wolf >= threshold => {
            DecisionOutcome::target(player, format!("shoot {player}: wolf-probability {p_wolf:.2}"))
        }
        Some(Pick::Ranked { player, p_wolf, .. }) => DecisionOutcome::abstain(format!(
            "top suspect {player} below shoot threshold ({p_wolf:.2} < {threshold:.2})"
        )),
        Some(pick) => outcome_of(pick, |p, _| format!("shoot {p}")),
        None => DecisionOutcome::abstain("no one to shoot"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use werewolf_types::{Decision, GameStage};

    use super::*;
    use crate::decision::DecisionFallback;

    fn seat(n: u32) -> PlayerId {
        PlayerId::new(n)
    }

    fn seats(ids: &[u32]) -> Vec<PlayerId> {
        ids.iter().copied().map(PlayerId::new).collect()
    }

    /// Seats 2..=6 with (wolf-probability, trust).
    fn ctx(role: Role, round: u32) -> DecisionContext {
        let mut ctx = DecisionContext::new(round, GameStage::Early, seat(1), role);
        let table: [(u32, f64, Decimal); 5] = [
            (2, 0.10, dec!(80)),
            (3, 0.80, dec!(20)),
            (4, 0.30, dec!(55)),
            (5, 0.50, dec!(50)),
            (6, 0.20, dec!(70)),
        ];
        for (s, p, t) in table {
            ctx.wolf_probability.insert(seat(s), p);
            ctx.trust.insert(seat(s), t);
        }
        ctx
    }

    #[test]
    fn villager_votes_top_suspect() {
        let out = vote(&DecisionConfig::default(), &seats(&[2, 3, 4, 5, 6]), &ctx(Role::Villager, 2));
        assert_eq!(out.decision, Decision::Target(seat(3)));
        assert!(out.reason.contains("No.3"));
    }

    #[test]
    fn wolf_votes_most_trusted_outsider() {
        let mut c = ctx(Role::Wolf, 2);
        c.allies = [seat(1), seat(2)].into_iter().collect();
        let out = vote(&DecisionConfig::default(), &seats(&[2, 3, 4, 5, 6]), &c);
        assert_eq!(out.decision, Decision::Target(seat(6)));
    }

    #[test]
    fn special_roles_run_on_lower_trust() {
        let config = DecisionConfig::default();
        let mut c = ctx(Role::Seer, 1);
        c.trust.insert(seat(1), dec!(55));
        assert_eq!(candidacy(&config, &seats(&[1]), &c).decision, Decision::Target(seat(1)));

        c.role = Role::Villager;
        assert!(candidacy(&config, &seats(&[1]), &c).decision.is_abstain());
        c.trust.insert(seat(1), dec!(65));
        assert_eq!(candidacy(&config, &seats(&[1]), &c).decision, Decision::Target(seat(1)));

        c.role = Role::Wolf;
        assert!(candidacy(&config, &seats(&[1]), &c).decision.is_abstain());
    }

    #[test]
    fn good_players_elect_the_reliable_candidate() {
        let out = sheriff_vote(&DecisionConfig::default(), &seats(&[3, 4, 6]), &ctx(Role::Villager, 1));
        assert_eq!(out.decision, Decision::Target(seat(6)));

        let mut c = ctx(Role::Wolf, 1);
        c.allies = [seat(1), seat(3)].into_iter().collect();
        let out = sheriff_vote(&DecisionConfig::default(), &seats(&[3, 4, 6]), &c);
        assert_eq!(out.decision, Decision::Target(seat(3)));
    }

    #[test]
    fn badge_goes_to_most_trusted_or_is_torn() {
        let config = DecisionConfig::default();
        let c = ctx(Role::Seer, 3);
        let out = pass_badge(&config, &seats(&[3, 4, 6]), &c);
        assert_eq!(out.decision, Decision::Target(seat(6)));
        // nobody above the bar
        assert!(pass_badge(&config, &seats(&[3]), &c).decision.is_abstain());

        let mut wolf = ctx(Role::WolfKing, 3);
        wolf.allies = [seat(3)].into_iter().collect();
        assert_eq!(pass_badge(&config, &seats(&[2, 3]), &wolf).decision, Decision::Target(seat(3)));
        assert!(pass_badge(&config, &seats(&[2, 6]), &wolf).decision.is_abstain());
    }

    #[test]
    fn wolves_kill_claimed_seer() {
        let mut c = ctx(Role::Wolf, 2);
        c.claims.insert(seat(4), Role::Seer);
        let out = kill(&DecisionConfig::default(), &seats(&[2, 4, 5]), &c);
        assert_eq!(out.decision, Decision::Target(seat(4)));
    }

    #[test]
    fn guard_can_sit_out_first_night() {
        let config = DecisionConfig {
            guard_first_night_empty: true,
            ..DecisionConfig::default()
        };
        let out = protect(&config, &seats(&[2, 3]), &ctx(Role::Guard, 1));
        assert!(out.decision.is_abstain());
        let out = protect(&config, &seats(&[2, 3]), &ctx(Role::Guard, 2));
        assert_eq!(out.decision, Decision::Target(seat(2)));
    }

    #[test]
    fn seer_prefers_uncertain_player() {
        let out = check(&DecisionConfig::default(), &seats(&[2, 3, 5]), &ctx(Role::Seer, 1));
        assert_eq!(out.decision, Decision::Target(seat(5)));
    }

    #[test]
    fn witch_saves_on_first_night_regardless() {
        let mut c = ctx(Role::Witch, 1);
        c.abilities.antidote_available = true;
        c.abilities.night_victim = Some(seat(3));
        let out = save(&DecisionConfig::default(), &seats(&[3]), &c);
        assert_eq!(out.decision, Decision::Target(seat(3)));
    }

    #[test]
    fn witch_does_not_save_a_suspect_later() {
        let mut c = ctx(Role::Witch, 3);
        c.abilities.antidote_available = true;
        c.abilities.night_victim = Some(seat(3));
        assert!(save(&DecisionConfig::default(), &seats(&[3]), &c).decision.is_abstain());

        c.abilities.night_victim = Some(seat(2));
        let out = save(&DecisionConfig::default(), &seats(&[2]), &c);
        assert_eq!(out.decision, Decision::Target(seat(2)));
    }

    #[test]
    fn spent_antidote_always_abstains() {
        let mut c = ctx(Role::Witch, 1);
        c.abilities.night_victim = Some(seat(2));
        assert!(save(&DecisionConfig::default(), &seats(&[2]), &c).decision.is_abstain());
    }

    #[test]
    fn poison_needs_a_clear_suspect() {
        let mut c = ctx(Role::Witch, 2);
        c.abilities.poison_available = true;
        let out = poison(&DecisionConfig::default(), &seats(&[2, 3, 4]), &c);
        assert_eq!(out.decision, Decision::Target(seat(3)));
        let out = poison(&DecisionConfig::default(), &seats(&[2, 4, 5]), &c);
        assert!(out.decision.is_abstain());
    }

    #[test]
    fn one_potion_per_night() {
        let mut c = ctx(Role::Witch, 2);
        c.abilities.poison_available = true;
        c.abilities.potion_used_tonight = true;
        assert!(poison(&DecisionConfig::default(), &seats(&[3]), &c).decision.is_abstain());
    }

    #[test]
    fn endgame_lowers_shoot_threshold() {
        let mut c = ctx(Role::Hunter, 3);
        c.abilities.can_shoot = true;
        c.wolf_probability.insert(seat(3), 0.45);
        assert!(shoot(&DecisionConfig::default(), &seats(&[3, 4]), &c).decision.is_abstain());
        c.stage = GameStage::Late;
        let out = shoot(&DecisionConfig::default(), &seats(&[3, 4]), &c);
        assert_eq!(out.decision, Decision::Target(seat(3)));
    }

    #[test]
    fn poisoned_hunter_always_abstains() {
        let mut c = ctx(Role::Hunter, 2);
        c.abilities.can_shoot = true;
        c.abilities.death_cause = Some(DeathCause::Poison);
        let out = shoot(&DecisionConfig::default(), &seats(&[3]), &c);
        assert!(out.decision.is_abstain());
    }

    #[test]
    fn wolf_king_shoots_trusted_outsider() {
        let mut c = ctx(Role::WolfKing, 2);
        c.abilities.can_shoot = true;
        c.abilities.death_cause = Some(DeathCause::Exiled);
        c.allies = [seat(1), seat(2)].into_iter().collect();
        let out = shoot(&DecisionConfig::default(), &seats(&[2, 3, 6]), &c);
        assert_eq!(out.decision, Decision::Target(seat(6)));
    }

    #[test]
    fn unscored_vote_falls_back() {
        let mut c = ctx(Role::Villager, 2);
        c.wolf_probability.clear();
        let out = vote(&DecisionConfig::default(), &seats(&[2, 3, 4]), &c);
        assert_eq!(out.decision, Decision::Target(seat(3)));
        assert_eq!(out.fallback, Some(DecisionFallback::MissingProbability));
    }
}
