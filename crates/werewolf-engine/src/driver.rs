//! Concurrent self-play.
//!
//! Matches run on the tokio runtime, at most `concurrency` at a time. Each
//! match deals a seeded shuffle of the configured roles and subscribes to
//! the parameter registry when it starts, so matches that start after a
//! calibration run use the new version. Finished records go to the
//! calibrator over an mpsc channel.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use werewolf_core::{ActionSource, GameConfig, Match, MatchError, MatchSummary};
use werewolf_inference::ParamsRegistry;
use werewolf_types::{MatchRecord, Role, Winner};

use crate::error::EngineError;

/// Outcome counts over a batch of matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// Matches won by the good side.
    pub good: u32,
    /// Matches won by the wolves.
    pub wolves: u32,
    /// Matches that hit the round cap.
    pub draws: u32,
    /// Matches aborted by an error.
    pub failed: u32,
    /// Rounds played across completed matches.
    pub rounds: u64,
    /// Calibration version in force when the batch finished.
    pub params_version: u64,
}

impl Tally {
    fn record(&mut self, summary: &MatchSummary) {
        let slot = match summary.winner {
            Winner::Good => &mut self.good,
            Winner::Wolves => &mut self.wolves,
            Winner::Draw => &mut self.draws,
        };
        *slot = slot.saturating_add(1);
        self.rounds = self.rounds.saturating_add(u64::from(summary.rounds));
    }

    /// Matches that reached a verdict.
    pub const fn completed(&self) -> u32 {
        self.good.saturating_add(self.wolves).saturating_add(self.draws)
    }

    /// Share of completed matches won by `winner`, in `[0, 1]`.
    pub fn rate(&self, winner: Winner) -> f64 {
        let count = match winner {
            Winner::Good => self.good,
            Winner::Wolves => self.wolves,
            Winner::Draw => self.draws,
        };
        share(u64::from(count), u64::from(self.completed()))
    }

    /// Mean rounds per completed match.
    pub fn mean_rounds(&self) -> f64 {
        share(self.rounds, u64::from(self.completed()))
    }
}

fn share(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    as_f64(part) / as_f64(whole)
}

fn as_f64(n: u64) -> f64 {
    u32::try_from(n).map_or(f64::from(u32::MAX), f64::from)
}

/// Deal `roles` for match number `index` of a run seeded with `seed`.
pub fn deal(roles: &[Role], seed: u64, index: u32) -> Vec<Role> {
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(u64::from(index)));
    let mut dealt = roles.to_vec();
    dealt.shuffle(&mut rng);
    dealt
}

/// Runs batches of self-play matches.
pub struct Driver {
    config: Arc<GameConfig>,
    source: Arc<dyn ActionSource>,
    registry: Arc<ParamsRegistry>,
    records: mpsc::Sender<MatchRecord>,
    limiter: Arc<Semaphore>,
}

impl core::fmt::Debug for Driver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Driver")
            .field("source", &self.source.name())
            .field("params_version", &self.registry.current().version)
            .field("free_slots", &self.limiter.available_permits())
            .finish_non_exhaustive()
    }
}

impl Driver {
    /// A driver running at most `concurrency` matches at once.
    pub fn new(
        config: GameConfig,
        source: Arc<dyn ActionSource>,
        registry: Arc<ParamsRegistry>,
        records: mpsc::Sender<MatchRecord>,
        concurrency: usize,
    ) -> Self {
        Self {
            config: Arc::new(config),
            source,
            registry,
            records,
            limiter: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Play `matches` matches and tally the results.
    pub async fn play(&self, matches: u32, seed: u64) -> Result<Tally, EngineError> {
        let mut tasks: JoinSet<Result<MatchSummary, MatchError>> = JoinSet::new();
        let mut tally = Tally::default();

        for index in 0..matches {
            let permit = Arc::clone(&self.limiter)
                .acquire_owned()
                .await
                .map_err(|e| EngineError::Scheduler {
                    message: e.to_string(),
                })?;
            let roles = deal(&self.config.game.roles, seed, index);
            let config = Arc::clone(&self.config);
            let source = Arc::clone(&self.source);
            let params = self.registry.subscribe();
            tasks.spawn(async move {
                let _permit = permit;
                let mut game = Match::new(&config, &roles, source, params, None)?;
                game.run().await
            });

            // Drain whatever already finished so records reach the
            // calibrator while later matches are still being dealt.
            while let Some(joined) = tasks.try_join_next() {
                self.collect(joined, &mut tally).await;
            }
        }
        while let Some(joined) = tasks.join_next().await {
            self.collect(joined, &mut tally).await;
        }

        tally.params_version = self.registry.current().version;
        Ok(tally)
    }

    async fn collect(
        &self,
        joined: Result<Result<MatchSummary, MatchError>, tokio::task::JoinError>,
        tally: &mut Tally,
    ) {
        match joined {
            Ok(Ok(summary)) => {
                debug!(
                    match_id = %summary.match_id,
                    winner = ?summary.winner,
                    rounds = summary.rounds,
                    "match finished"
                );
                tally.record(&summary);
                if self.records.send(summary.record).await.is_err() {
                    warn!(match_id = %summary.match_id, "calibrator gone, record dropped");
                }
            }
            Ok(Err(err)) => {
                warn!(error = %err, "match aborted");
                tally.failed = tally.failed.saturating_add(1);
            }
            Err(err) => {
                warn!(error = %err, "match task panicked or was cancelled");
                tally.failed = tally.failed.saturating_add(1);
            }
        }
        info!(
            completed = tally.completed(),
            failed = tally.failed,
            params_version = self.registry.current().version,
            "progress"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use werewolf_agents::{DecisionConfig, DecisionMakers};

    use super::*;
    use crate::self_play::SelfPlaySource;

    #[test]
    fn deal_is_seeded() {
        let roles = GameConfig::default().game.roles;
        assert_eq!(deal(&roles, 7, 3), deal(&roles, 7, 3));

        let mut sorted = deal(&roles, 7, 3);
        sorted.sort_by_key(|r| format!("{r:?}"));
        let mut expected = roles;
        expected.sort_by_key(|r| format!("{r:?}"));
        assert_eq!(sorted, expected);
    }

    #[test]
    fn rates_ignore_failures() {
        let tally = Tally {
            good: 3,
            wolves: 1,
            failed: 5,
            rounds: 20,
            ..Tally::default()
        };
        assert!((tally.rate(Winner::Good) - 0.75).abs() < 1e-12);
        assert!((tally.mean_rounds() - 5.0).abs() < 1e-12);
        assert!(Tally::default().rate(Winner::Draw).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn batch_feeds_every_record_to_the_channel() {
        let makers = DecisionMakers::new(DecisionConfig::default()).unwrap();
        let (tx, mut rx) = mpsc::channel(64);
        let driver = Driver::new(
            GameConfig::default(),
            Arc::new(SelfPlaySource::new(makers)),
            Arc::new(ParamsRegistry::default()),
            tx,
            3,
        );

        let tally = driver.play(6, 11).await.unwrap();
        assert_eq!(tally.completed().saturating_add(tally.failed), 6);
        assert_eq!(tally.failed, 0);

        drop(driver);
        let mut received = 0_u32;
        while rx.recv().await.is_some() {
            received = received.saturating_add(1);
        }
        assert_eq!(received, 6);
    }
}
