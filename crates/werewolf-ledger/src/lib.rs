//! Trust score ledger for the werewolf decision engine.
//!
//! Keeps one bounded scalar per player, moved additively by evidence and
//! pulled back toward neutral at each round start so stale observations
//! fade.
//!
//! # Modules
//!
//! - [`config`] -- Bounds, decay, and the per-kind evidence strength table
//! - [`ledger`] -- The [`TrustLedger`] itself
//! - [`error`] -- Error types

pub mod config;
pub mod error;
pub mod ledger;

pub use config::TrustConfig;
pub use error::LedgerError;
pub use ledger::{TrustChange, TrustLedger};
