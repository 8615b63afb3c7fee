//! `PostgreSQL` persistence for the werewolf decision engine.
//!
//! The only durable data is the match archive: one row per finished match,
//! appended by the self-play driver and read back by the calibrator.
//! Gameplay itself never touches the database.
//!
//! # Modules
//!
//! - [`postgres`] -- Connection pool and embedded migrations
//! - [`archive`] -- [`PgArchive`], the `match_records` table as a
//!   [`MatchArchive`](werewolf_calibrator::MatchArchive)
//! - [`error`] -- Error types

pub mod archive;
pub mod error;
pub mod postgres;

pub use archive::PgArchive;
pub use error::DbError;
pub use postgres::{PoolSettings, PostgresPool};
