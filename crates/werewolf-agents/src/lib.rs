//! Role decision makers for the werewolf decision engine.
//!
//! Given the legal candidates and a read-only [`DecisionContext`], each
//! decision maker ranks targets by a role-specific blend of trust and
//! wolf-probability and returns one target or abstain. Ties always break to
//! the lowest seat, so fixed inputs give fixed decisions.
//!
//! # Modules
//!
//! - [`config`] -- Thresholds, switches and ranking bonuses
//! - [`context`] -- The per-request view of the match
//! - [`decision`] -- Outcomes, fallbacks and the shared ranking step
//! - [`makers`] -- One decision maker per action kind
//! - [`roles`] -- Role capability table and dispatch
//! - [`error`] -- Error types

pub mod config;
pub mod context;
pub mod decision;
pub mod error;
pub mod makers;
pub mod roles;

pub use config::DecisionConfig;
pub use context::{AbilityState, DecisionContext};
pub use decision::{DecisionFallback, DecisionOutcome, Pick, Scores, rank};
pub use error::DecisionError;
pub use makers::DecideFn;
pub use roles::{Capabilities, DecisionMakers, capabilities, decision_maker};
