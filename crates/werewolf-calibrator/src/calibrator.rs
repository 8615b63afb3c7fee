//! The online calibrator.
//!
//! Archives every finished match, and after every `retrain_interval` new
//! matches (once `min_samples` exist) refits the weak-evidence weights and
//! publishes them as a new parameter version. It is the registry's only
//! writer. A failed run is logged and leaves the previous version in force.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use werewolf_inference::{CalibrationParams, ParamsRegistry};
use werewolf_types::MatchRecord;

use crate::archive::MatchArchive;
use crate::config::CalibratorConfig;
use crate::error::CalibrationError;
use crate::fit::{KindFit, fit};

/// What a successful calibration run changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationReport {
    /// Newly published version.
    pub version: u64,
    /// Version it replaced.
    pub previous_version: u64,
    /// Matches the fit used.
    pub trained_on: usize,
    /// Matches rejected as malformed.
    pub skipped: usize,
    /// Per-kind fit details.
    pub kinds: Vec<KindFit>,
}

/// Archives matches and republishes calibration parameters.
pub struct Calibrator {
    config: CalibratorConfig,
    archive: Arc<dyn MatchArchive>,
    registry: Arc<ParamsRegistry>,
    cursor: u64,
    corpus: VecDeque<MatchRecord>,
    pending: usize,
}

impl core::fmt::Debug for Calibrator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Calibrator")
            .field("config", &self.config)
            .field("cursor", &self.cursor)
            .field("corpus", &self.corpus.len())
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl Calibrator {
    /// Build a calibrator writing to `registry`.
    pub fn new(
        config: CalibratorConfig,
        archive: Arc<dyn MatchArchive>,
        registry: Arc<ParamsRegistry>,
    ) -> Result<Self, CalibrationError> {
        config.validate()?;
        Ok(Self {
            config,
            archive,
            registry,
            cursor: 0,
            corpus: VecDeque::new(),
            pending: 0,
        })
    }

    /// The registry this calibrator publishes to.
    pub const fn registry(&self) -> &Arc<ParamsRegistry> {
        &self.registry
    }

    /// Archive a finished match and retrain if it is due.
    ///
    /// Returns the report when a new version was published.
    pub async fn record_match(
        &mut self,
        record: &MatchRecord,
    ) -> Result<Option<CalibrationReport>, CalibrationError> {
        let seq = self.archive.append(record).await?;
        self.pending = self.pending.saturating_add(1);
        debug!(match_id = %record.match_id, seq, pending = self.pending, "match archived");

        if self.pending < self.config.retrain_interval {
            return Ok(None);
        }
        let archived = self.archive.len().await?;
        if archived < u64::try_from(self.config.min_samples).unwrap_or(u64::MAX) {
            debug!(archived, need = self.config.min_samples, "not enough matches to calibrate yet");
            return Ok(None);
        }
        self.pending = 0;
        self.retrain().await.map(Some)
    }

    /// Refit on the archive window and publish a new version.
    pub async fn retrain(&mut self) -> Result<CalibrationReport, CalibrationError> {
        self.sync().await?;
        let previous = self.registry.current();
        let fitted = fit(&self.config, self.corpus.make_contiguous(), &previous)?;

        let params = CalibrationParams {
            version: previous.version.saturating_add(1),
            weights: fitted.weights,
            trained_on: fitted.used,
            created_at: Utc::now(),
        };
        let version = self.registry.publish(params)?;
        info!(
            version,
            previous = previous.version,
            trained_on = fitted.used,
            skipped = fitted.skipped,
            "calibration complete"
        );
        Ok(CalibrationReport {
            version,
            previous_version: previous.version,
            trained_on: fitted.used,
            skipped: fitted.skipped,
            kinds: fitted.kinds,
        })
    }

    /// Consume finished matches from `rx` until every sender is gone.
    pub async fn run(mut self, mut rx: mpsc::Receiver<MatchRecord>) {
        while let Some(record) = rx.recv().await {
            match self.record_match(&record).await {
                Ok(Some(report)) => {
                    debug!(version = report.version, kinds = report.kinds.len(), "calibrator published");
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        error = %err,
                        version = self.registry.current().version,
                        "calibration failed, keeping current parameters"
                    );
                }
            }
        }
        debug!("calibrator channel closed");
    }

    /// Pull new archive records into the window.
    async fn sync(&mut self) -> Result<(), CalibrationError> {
        let fresh = self.archive.load_since(self.cursor).await?;
        for archived in fresh {
            self.cursor = self.cursor.max(archived.seq);
            self.corpus.push_back(archived.record);
        }
        while self.corpus.len() > self.config.window {
            self.corpus.pop_front();
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use werewolf_types::EvidenceKind;

    use super::*;
    use crate::archive::InMemoryArchive;
    use crate::fit::testing::informative_record;

    fn calibrator(min_samples: usize, interval: usize) -> Calibrator {
        Calibrator::new(
            CalibratorConfig {
                min_samples,
                retrain_interval: interval,
                ..CalibratorConfig::default()
            },
            Arc::new(InMemoryArchive::new()),
            Arc::new(ParamsRegistry::default()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn retrains_every_interval_once_enough_samples() {
        let mut cal = calibrator(5, 5);
        for _ in 0..4 {
            assert!(cal.record_match(&informative_record()).await.unwrap().is_none());
        }
        let report = cal.record_match(&informative_record()).await.unwrap().unwrap();
        assert_eq!(report.version, 1);
        assert_eq!(report.previous_version, 0);
        assert_eq!(report.trained_on, 5);

        let params = cal.registry().current();
        assert_eq!(params.version, 1);
        assert!(params.weight(EvidenceKind::VoteCast) > 1.0);

        for _ in 0..4 {
            assert!(cal.record_match(&informative_record()).await.unwrap().is_none());
        }
        let report = cal.record_match(&informative_record()).await.unwrap().unwrap();
        assert_eq!(report.version, 2);
        assert_eq!(report.trained_on, 10);
    }

    #[tokio::test]
    async fn waits_for_min_samples() {
        let mut cal = calibrator(10, 2);
        for _ in 0..9 {
            assert!(cal.record_match(&informative_record()).await.unwrap().is_none());
        }
        assert!(cal.record_match(&informative_record()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_run_keeps_previous_version() {
        let mut cal = calibrator(2, 2);
        let mut bad = informative_record();
        bad.roles.clear();
        cal.record_match(&bad).await.unwrap();
        let err = cal.record_match(&bad).await.unwrap_err();
        assert!(matches!(err, CalibrationError::Malformed { skipped: 2 }));
        assert_eq!(cal.registry().current().version, 0);
    }

    #[tokio::test]
    async fn window_keeps_most_recent_matches() {
        let mut cal = Calibrator::new(
            CalibratorConfig {
                min_samples: 2,
                retrain_interval: 1,
                window: 3,
                ..CalibratorConfig::default()
            },
            Arc::new(InMemoryArchive::new()),
            Arc::new(ParamsRegistry::default()),
        )
        .unwrap();
        let mut last = None;
        for _ in 0..6 {
            last = cal.record_match(&informative_record()).await.unwrap();
        }
        assert_eq!(last.unwrap().trained_on, 3);
    }

    #[tokio::test]
    async fn background_task_publishes() {
        let cal = calibrator(3, 3);
        let registry = Arc::clone(cal.registry());
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(cal.run(rx));
        for _ in 0..3 {
            tx.send(informative_record()).await.unwrap();
        }
        drop(tx);
        task.await.unwrap();
        assert_eq!(registry.current().version, 1);
    }
}
