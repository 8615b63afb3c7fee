//! Versioned calibration parameters and the registry that publishes them.
//!
//! A [`CalibrationParams`] is immutable once built. The calibrator is the
//! single writer: it publishes a new version through [`ParamsRegistry`],
//! which swaps an `Arc` inside a `tokio::sync::watch` channel. Matches
//! hold a [`ParamsHandle`] and only look for a new version at their own
//! refresh points, so one phase never mixes two versions.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

use werewolf_types::EvidenceKind;

use crate::error::InferenceError;

/// Per-kind multipliers for weak-evidence log-likelihood ratios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParams {
    /// Monotonically increasing version. `0` is the hand-tuned default.
    pub version: u64,
    /// Weight per weak evidence kind. Missing kinds weigh `1.0`.
    pub weights: BTreeMap<EvidenceKind, f64>,
    /// Number of archived matches the weights were fitted on.
    pub trained_on: usize,
    /// When this version was produced.
    pub created_at: DateTime<Utc>,
}

impl CalibrationParams {
    /// The hand-tuned default: every weak kind at weight `1.0`.
    pub fn baseline() -> Self {
        Self {
            version: 0,
            weights: EvidenceKind::WEAK.iter().map(|k| (*k, 1.0)).collect(),
            trained_on: 0,
            created_at: Utc::now(),
        }
    }

    /// Weight for `kind`.
    pub fn weight(&self, kind: EvidenceKind) -> f64 {
        self.weights.get(&kind).copied().unwrap_or(1.0)
    }
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self::baseline()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Single-writer publisher of calibration parameters.
#[derive(Debug)]
pub struct ParamsRegistry {
    tx: watch::Sender<Arc<CalibrationParams>>,
}

impl ParamsRegistry {
    /// Create a registry holding `initial`.
    pub fn new(initial: CalibrationParams) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx }
    }

    /// The version currently in force.
    pub fn current(&self) -> Arc<CalibrationParams> {
        Arc::clone(&self.tx.borrow())
    }

    /// A read handle for one match.
    pub fn subscribe(&self) -> ParamsHandle {
        let mut rx = self.tx.subscribe();
        let current = Arc::clone(&rx.borrow_and_update());
        ParamsHandle { rx, current }
    }

    /// Replace the parameters in force. The version must advance.
    pub fn publish(&self, params: CalibrationParams) -> Result<u64, InferenceError> {
        let current = self.tx.borrow().version;
        if params.version <= current {
            return Err(InferenceError::StaleVersion {
                current,
                offered: params.version,
            });
        }
        let version = params.version;
        self.tx.send_replace(Arc::new(params));
        info!(version, previous = current, "calibration parameters published");
        Ok(version)
    }
}

impl Default for ParamsRegistry {
    fn default() -> Self {
        Self::new(CalibrationParams::baseline())
    }
}

/// A match's view of the parameter registry.
#[derive(Debug, Clone)]
pub struct ParamsHandle {
    rx: watch::Receiver<Arc<CalibrationParams>>,
    current: Arc<CalibrationParams>,
}

impl ParamsHandle {
    /// A handle pinned to `params` with no registry behind it.
    pub fn fixed(params: CalibrationParams) -> Self {
        let (tx, rx) = watch::channel(Arc::new(params));
        let current = Arc::clone(&tx.borrow());
        Self { rx, current }
    }

    /// The version this handle is pinned to.
    pub fn current(&self) -> Arc<CalibrationParams> {
        Arc::clone(&self.current)
    }

    /// Pick up a newer version if one was published.
    ///
    /// Returns the new parameters when the pinned version changed.
    pub fn refresh(&mut self) -> Option<Arc<CalibrationParams>> {
        if !self.rx.has_changed().unwrap_or(false) {
            return None;
        }
        let latest = Arc::clone(&self.rx.borrow_and_update());
        if latest.version == self.current.version {
            return None;
        }
        self.current = Arc::clone(&latest);
        Some(latest)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn version(v: u64) -> CalibrationParams {
        CalibrationParams {
            version: v,
            ..CalibrationParams::baseline()
        }
    }

    #[test]
    fn baseline_weighs_every_weak_kind_at_one() {
        let params = CalibrationParams::baseline();
        for kind in EvidenceKind::WEAK {
            assert!((params.weight(kind) - 1.0).abs() < f64::EPSILON);
        }
        assert_eq!(params.version, 0);
    }

    #[test]
    fn publish_requires_advancing_version() {
        let registry = ParamsRegistry::default();
        assert_eq!(registry.publish(version(1)).unwrap(), 1);
        assert!(matches!(
            registry.publish(version(1)),
            Err(InferenceError::StaleVersion { current: 1, offered: 1 })
        ));
        assert_eq!(registry.current().version, 1);
    }

    #[test]
    fn handle_sees_new_version_only_on_refresh() {
        let registry = ParamsRegistry::default();
        let mut handle = registry.subscribe();
        assert!(handle.refresh().is_none());

        registry.publish(version(3)).unwrap();
        assert_eq!(handle.current().version, 0);

        let fresh = handle.refresh().unwrap();
        assert_eq!(fresh.version, 3);
        assert_eq!(handle.current().version, 3);
        assert!(handle.refresh().is_none());
    }

    #[test]
    fn fixed_handle_never_changes() {
        let mut handle = ParamsHandle::fixed(version(7));
        assert!(handle.refresh().is_none());
        assert_eq!(handle.current().version, 7);
    }

    #[test]
    fn params_survive_json() {
        let params = version(2);
        let json = serde_json::to_string(&params).unwrap();
        let back: CalibrationParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
