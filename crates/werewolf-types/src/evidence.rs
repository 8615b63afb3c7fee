//! Evidence records.
//!
//! An [`Evidence`] is an immutable observation. Once constructed it is
//! consumed by the trust ledger and the inference engine, archived with
//! the match record, and never edited.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::EvidenceKind;
use crate::ids::{EvidenceId, PlayerId};

/// A typed observation about a player.
///
/// `strength` is signed and expressed in trust points: negative values
/// count against the [`subject`](Evidence::subject), positive values in
/// its favour. For [`EvidenceKind::CheckResult`] the sign carries the
/// verdict (negative means "wolf").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Evidence {
    /// Unique identifier.
    pub id: EvidenceId,
    /// What was observed.
    pub kind: EvidenceKind,
    /// The player who produced the observation (checker, voter, speaker).
    pub source: PlayerId,
    /// The player the action was aimed at, if any.
    pub target: Option<PlayerId>,
    /// Signed weight in trust points.
    #[ts(as = "String")]
    pub strength: Decimal,
    /// Round (day counter) in which the observation was made.
    pub round: u32,
}

impl Evidence {
    /// Create a new evidence record with a fresh identifier.
    pub fn new(
        kind: EvidenceKind,
        source: PlayerId,
        target: Option<PlayerId>,
        strength: Decimal,
        round: u32,
    ) -> Self {
        Self {
            id: EvidenceId::new(),
            kind,
            source,
            target,
            strength,
            round,
        }
    }

    /// The player this observation is about.
    ///
    /// Check results and protect outcomes describe their target. Votes and
    /// detection findings describe the player who cast or said them.
    pub fn subject(&self) -> PlayerId {
        if self.kind.concerns_source() {
            self.source
        } else {
            self.target.unwrap_or(self.source)
        }
    }

    /// Returns `true` if the observation counts against its subject.
    pub fn is_suspicious(&self) -> bool {
        self.strength.is_sign_negative() && !self.strength.is_zero()
    }
}
