//! Game state, skill resolution and phase orchestration for the werewolf
//! decision engine.
//!
//! This crate owns the match state machine: Night, SheriffElection,
//! DayDiscussion, DayVote, RevengeWindow and WinCheck. Everything else in
//! the workspace is a component it drives.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from YAML into strongly-typed
//!   structs.
//! - [`state`] -- The authoritative [`GameState`] and its invariants.
//! - [`resolution`] -- Deterministic night skill resolution.
//! - [`source`] -- [`ActionSource`] trait and [`EngineActionSource`].
//! - [`orchestrator`] -- The [`Match`] phase loop.
//! - [`error`] -- Error types.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod resolution;
pub mod source;
pub mod state;

pub use config::{ConfigError, DatabaseConfig, GameConfig, MatchConfig, RefreshPolicy};
pub use error::{MatchError, SourceError};
pub use orchestrator::{BadgePass, Match, MatchSummary, RoundLog, Shot};
pub use resolution::{CheckReveal, Death, NightActions, NightOutcome, Survival, resolve};
pub use source::{ActionSource, EngineActionSource};
pub use state::GameState;
