//! Whole-match properties of the rule-based engine.
//!
//! Every match here is played by [`EngineActionSource`] behind a recording
//! wrapper, so the tests can inspect each request the orchestrator made
//! and each answer it accepted.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use werewolf_agents::{DecisionConfig, DecisionContext, DecisionMakers};
use werewolf_core::{ActionSource, EngineActionSource, GameConfig, Match, NightActions, SourceError, resolve};
use werewolf_inference::{CalibrationParams, ParamsHandle};
use werewolf_types::{ActionKind, ActionRequest, Decision, EvidenceKind, Phase, PlayerId, Role, Winner};

/// One answered request.
#[derive(Debug, Clone, Copy)]
struct Answer {
    round: u32,
    kind: ActionKind,
    dead: bool,
    decision: Decision,
}

#[derive(Debug)]
struct Recording {
    inner: EngineActionSource,
    answers: Mutex<Vec<Answer>>,
}

impl Recording {
    fn new() -> Self {
        Self {
            inner: EngineActionSource::new(DecisionMakers::new(DecisionConfig::default()).unwrap()),
            answers: Mutex::new(Vec::new()),
        }
    }

    fn answers(&self) -> Vec<Answer> {
        self.answers.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionSource for Recording {
    async fn request_action(
        &self,
        request: &ActionRequest,
        ctx: &DecisionContext,
    ) -> Result<Decision, SourceError> {
        let decision = self.inner.request_action(request, ctx).await?;
        self.answers.lock().unwrap().push(Answer {
            round: request.round,
            kind: request.kind,
            dead: ctx.abilities.death_cause.is_some(),
            decision,
        });
        Ok(decision)
    }

    fn name(&self) -> &str {
        "recording"
    }
}

fn twelve_seats() -> Vec<Role> {
    GameConfig::default().game.roles
}

fn start(source: Arc<Recording>, roles: &[Role]) -> Match {
    Match::new(
        &GameConfig::default(),
        roles,
        source,
        ParamsHandle::fixed(CalibrationParams::baseline()),
        None,
    )
    .unwrap()
}

#[tokio::test]
async fn rule_based_match_reaches_a_verdict() {
    let source = Arc::new(Recording::new());
    let mut m = start(Arc::clone(&source), &twelve_seats());
    let summary = m.run().await.unwrap();

    assert_eq!(m.state().phase(), Phase::GameOver);
    assert_eq!(Some(summary.winner), m.winner());
    assert!(summary.rounds <= GameConfig::default().game.max_rounds);
    assert_eq!(summary.record.roles.len(), 12);
    assert_eq!(summary.record.evidence.len(), m.evidence().len());
    assert_eq!(summary.log.last().map(|l| l.round), Some(summary.rounds));
    if summary.winner != Winner::Draw {
        assert_eq!(m.state().evaluate_winner(), Some(summary.winner));
    }
}

#[tokio::test]
async fn guard_never_protects_the_same_player_twice_running() {
    let source = Arc::new(Recording::new());
    let mut m = start(Arc::clone(&source), &twelve_seats());
    m.run().await.unwrap();

    let protects: Vec<(u32, Option<PlayerId>)> = source
        .answers()
        .into_iter()
        .filter(|a| a.kind == ActionKind::Protect)
        .map(|a| (a.round, a.decision.target()))
        .collect();
    for pair in protects.windows(2) {
        let ((r1, t1), (r2, t2)) = (pair[0], pair[1]);
        if r2 == r1 + 1 && t1.is_some() {
            assert_ne!(t1, t2, "guard repeated a protection in rounds {r1} and {r2}");
        }
    }
}

#[tokio::test]
async fn only_shots_and_badges_come_from_the_dead() {
    let source = Arc::new(Recording::new());
    let mut m = start(Arc::clone(&source), &twelve_seats());
    m.run().await.unwrap();

    for answer in source.answers() {
        let last_word = matches!(answer.kind, ActionKind::Shoot | ActionKind::PassBadge);
        assert_eq!(answer.dead, last_word, "{answer:?}");
    }
}

#[tokio::test]
async fn first_day_elects_at_most_one_sheriff() {
    let source = Arc::new(Recording::new());
    let mut m = start(Arc::clone(&source), &twelve_seats());
    m.run().await.unwrap();

    let answers = source.answers();
    assert!(answers.iter().any(|a| a.kind == ActionKind::Candidacy));
    assert!(
        answers
            .iter()
            .filter(|a| matches!(a.kind, ActionKind::Candidacy | ActionKind::SheriffVote))
            .all(|a| a.round == 1)
    );
    let elected: Vec<_> = m.log().iter().filter_map(|l| l.elected).collect();
    assert!(elected.len() <= 1);
    for pass in m.log().iter().flat_map(|l| &l.badge_passes) {
        assert!(!m.state().is_alive(pass.from));
    }
}

#[tokio::test]
async fn potions_and_shots_never_come_back() {
    let source = Arc::new(Recording::new());
    let mut m = start(Arc::clone(&source), &twelve_seats());

    let mut antidote = true;
    let mut poison = true;
    while m.state().phase() != Phase::GameOver {
        m.step().await.unwrap();
        let state = m.state();
        assert!(antidote || !state.antidote_available());
        assert!(poison || !state.poison_available());
        antidote = state.antidote_available();
        poison = state.poison_available();
    }

    let saves = source
        .answers()
        .iter()
        .filter(|a| a.kind == ActionKind::Save && a.decision.target().is_some())
        .count();
    let poisons = source
        .answers()
        .iter()
        .filter(|a| a.kind == ActionKind::Poison && a.decision.target().is_some())
        .count();
    assert!(saves <= 1);
    assert!(poisons <= 1);
    assert!(m.log().iter().flat_map(|l| &l.shots).count() <= 2);
}

#[tokio::test]
async fn one_potion_per_night() {
    let source = Arc::new(Recording::new());
    let mut m = start(Arc::clone(&source), &twelve_seats());
    m.run().await.unwrap();

    let answers = source.answers();
    for round in 1..=m.state().round() {
        let used = answers
            .iter()
            .filter(|a| a.round == round)
            .filter(|a| matches!(a.kind, ActionKind::Save | ActionKind::Poison))
            .filter(|a| a.decision.target().is_some())
            .count();
        assert!(used <= 1, "round {round} used {used} potions");
    }
}

#[tokio::test]
async fn night_resolution_is_idempotent_mid_match() {
    let source = Arc::new(Recording::new());
    let mut m = start(Arc::clone(&source), &twelve_seats());
    // night 1 and through to the first day
    while m.state().phase() != Phase::DayDiscussion && m.state().phase() != Phase::GameOver {
        m.step().await.unwrap();
    }

    let alive = m.state().alive();
    let wolves = m.state().living_wolves();
    let victim = alive.iter().copied().find(|p| !wolves.contains(p)).unwrap();
    let actions = NightActions {
        kill: Some(victim),
        ..NightActions::default()
    };
    let first = resolve(&actions, m.state()).unwrap();
    let second = resolve(&actions, m.state()).unwrap();
    assert_eq!(first, second);
    assert!(first.died(victim));
    // resolving never touches the state
    assert!(m.state().is_alive(victim));
}

#[tokio::test]
async fn identical_matches_play_identically() {
    let roles = twelve_seats();
    let mut runs = Vec::new();
    for _ in 0..2 {
        let mut m = start(Arc::new(Recording::new()), &roles);
        let summary = m.run().await.unwrap();
        let evidence: Vec<_> = m
            .evidence()
            .iter()
            .map(|e| (e.kind, e.source, e.target, e.strength, e.round))
            .collect();
        let snapshot: Vec<_> = m
            .suspicion()
            .snapshot()
            .into_iter()
            .map(|(p, v)| (p, v.to_bits()))
            .collect();
        runs.push((summary.winner, summary.rounds, evidence, snapshot, summary.log));
    }
    let (a, b) = (&runs[0], &runs[1]);
    assert_eq!(a.0, b.0);
    assert_eq!(a.1, b.1);
    assert_eq!(a.2, b.2);
    assert_eq!(a.3, b.3);
    assert_eq!(a.4, b.4);
}

#[tokio::test]
async fn every_seer_check_is_archived() {
    let source = Arc::new(Recording::new());
    let mut m = start(Arc::clone(&source), &twelve_seats());
    m.run().await.unwrap();

    let checks = source
        .answers()
        .iter()
        .filter(|a| a.kind == ActionKind::Check && a.decision.target().is_some())
        .count();
    let evidence = m
        .evidence()
        .iter()
        .filter(|e| e.kind == EvidenceKind::CheckResult)
        .count();
    assert_eq!(checks, evidence);
}
