//! The match archive capability.
//!
//! The calibrator only needs to append finished matches and read back
//! everything after a cursor. Cursors are the archive's own sequence
//! numbers, starting at 1; `load_since(0)` returns everything.

use async_trait::async_trait;
use tokio::sync::RwLock;

use werewolf_types::MatchRecord;

use crate::error::ArchiveError;

/// A match record with its archive sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedMatch {
    /// Sequence number assigned on append.
    pub seq: u64,
    /// The archived record.
    pub record: MatchRecord,
}

/// Append-only store of finished matches.
#[async_trait]
pub trait MatchArchive: Send + Sync {
    /// Store `record` and return its sequence number.
    async fn append(&self, record: &MatchRecord) -> Result<u64, ArchiveError>;

    /// Every record with a sequence number above `cursor`, oldest first.
    async fn load_since(&self, cursor: u64) -> Result<Vec<ArchivedMatch>, ArchiveError>;

    /// Number of archived matches.
    async fn len(&self) -> Result<u64, ArchiveError>;

    /// Returns `true` if nothing has been archived.
    async fn is_empty(&self) -> Result<bool, ArchiveError> {
        Ok(self.len().await? == 0)
    }
}

/// Process-local archive. Lost on exit.
#[derive(Debug, Default)]
pub struct InMemoryArchive {
    records: RwLock<Vec<MatchRecord>>,
}

impl InMemoryArchive {
    /// An empty archive.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MatchArchive for InMemoryArchive {
    async fn append(&self, record: &MatchRecord) -> Result<u64, ArchiveError> {
        let mut records = self.records.write().await;
        records.push(record.clone());
        u64::try_from(records.len()).map_err(|e| ArchiveError::Backend {
            reason: format!("sequence overflow: {e}"),
        })
    }

    async fn load_since(&self, cursor: u64) -> Result<Vec<ArchivedMatch>, ArchiveError> {
        let records = self.records.read().await;
        let skip = usize::try_from(cursor).unwrap_or(usize::MAX);
        Ok(records
            .iter()
            .zip(1_u64..)
            .skip(skip)
            .map(|(record, seq)| ArchivedMatch {
                seq,
                record: record.clone(),
            })
            .collect())
    }

    async fn len(&self) -> Result<u64, ArchiveError> {
        let records = self.records.read().await;
        u64::try_from(records.len()).map_err(|e| ArchiveError::Backend {
            reason: format!("length overflow: {e}"),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use werewolf_types::{MatchId, Winner};

    use super::*;

    fn record() -> MatchRecord {
        MatchRecord {
            match_id: MatchId::new(),
            roles: Vec::new(),
            evidence: Vec::new(),
            winner: Winner::Good,
            rounds: 3,
            params_version: 0,
            finished_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn cursor_skips_already_seen_records() {
        let archive = InMemoryArchive::new();
        assert!(archive.is_empty().await.unwrap());
        for expected in 1..=3 {
            assert_eq!(archive.append(&record()).await.unwrap(), expected);
        }

        let all = archive.load_since(0).await.unwrap();
        assert_eq!(all.iter().map(|m| m.seq).collect::<Vec<_>>(), vec![1, 2, 3]);

        let tail = archive.load_since(2).await.unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail.first().unwrap().seq, 3);
        assert!(archive.load_since(3).await.unwrap().is_empty());
        assert_eq!(archive.len().await.unwrap(), 3);
    }
}
