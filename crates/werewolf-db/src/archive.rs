//! The `match_records` table as a [`MatchArchive`].
//!
//! Each finished match is stored as one row: a few indexed columns for
//! ad-hoc analysis plus the full [`MatchRecord`] as JSONB. The calibrator
//! reads rows back in `seq` order, so `seq` is the archive cursor.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use werewolf_calibrator::{ArchiveError, ArchivedMatch, MatchArchive};
use werewolf_types::{MatchId, MatchRecord, Winner};

use crate::error::DbError;
use crate::postgres::PostgresPool;

/// Match archive backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgArchive {
    pool: PostgresPool,
}

impl PgArchive {
    /// Wrap an open pool.
    pub const fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }

    const fn pg(&self) -> &PgPool {
        self.pool.pool()
    }

    /// Insert `record`, returning its sequence number.
    ///
    /// Appending the same match twice keeps the first row and returns its
    /// sequence number.
    pub async fn insert(&self, record: &MatchRecord) -> Result<u64, DbError> {
        let rounds = i32::try_from(record.rounds)
            .map_err(|e| DbError::OutOfRange(format!("rounds {}: {e}", record.rounds)))?;
        let params_version = i64::try_from(record.params_version)
            .map_err(|e| DbError::OutOfRange(format!("params version {}: {e}", record.params_version)))?;
        let body = serde_json::to_value(record)?;

        let row: (i64,) = sqlx::query_as(
            r"INSERT INTO match_records (match_id, winner, rounds, params_version, record, finished_at)
              VALUES ($1, $2, $3, $4, $5, $6)
              ON CONFLICT (match_id) DO UPDATE SET match_id = EXCLUDED.match_id
              RETURNING seq",
        )
        .bind(record.match_id.into_inner())
        .bind(winner_label(record.winner))
        .bind(rounds)
        .bind(params_version)
        .bind(&body)
        .bind(record.finished_at)
        .fetch_one(self.pg())
        .await?;

        let seq = to_seq(row.0)?;
        tracing::debug!(match_id = %record.match_id, seq, "Archived match record");
        Ok(seq)
    }

    /// Rows with `seq > cursor`, oldest first.
    pub async fn rows_since(&self, cursor: u64) -> Result<Vec<(u64, Uuid, serde_json::Value)>, DbError> {
        let cursor = i64::try_from(cursor).unwrap_or(i64::MAX);
        let rows: Vec<(i64, Uuid, serde_json::Value)> = sqlx::query_as(
            r"SELECT seq, match_id, record
              FROM match_records
              WHERE seq > $1
              ORDER BY seq ASC",
        )
        .bind(cursor)
        .fetch_all(self.pg())
        .await?;

        rows.into_iter()
            .map(|(seq, id, body)| Ok((to_seq(seq)?, id, body)))
            .collect()
    }

    /// Number of stored rows.
    pub async fn count(&self) -> Result<u64, DbError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM match_records")
            .fetch_one(self.pg())
            .await?;
        to_seq(row.0)
    }
}

#[async_trait]
impl MatchArchive for PgArchive {
    async fn append(&self, record: &MatchRecord) -> Result<u64, ArchiveError> {
        Ok(self.insert(record).await?)
    }

    async fn load_since(&self, cursor: u64) -> Result<Vec<ArchivedMatch>, ArchiveError> {
        self.rows_since(cursor)
            .await?
            .into_iter()
            .map(|(seq, id, body)| {
                let record = serde_json::from_value(body).map_err(|e| ArchiveError::Corrupt {
                    match_id: MatchId::from(id),
                    reason: e.to_string(),
                })?;
                Ok(ArchivedMatch { seq, record })
            })
            .collect()
    }

    async fn len(&self) -> Result<u64, ArchiveError> {
        Ok(self.count().await?)
    }
}

fn to_seq(value: i64) -> Result<u64, DbError> {
    u64::try_from(value).map_err(|e| DbError::OutOfRange(format!("sequence {value}: {e}")))
}

const fn winner_label(winner: Winner) -> &'static str {
    match winner {
        Winner::Good => "good",
        Winner::Wolves => "wolves",
        Winner::Draw => "draw",
    }
}
