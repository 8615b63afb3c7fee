//! Shared type definitions for the werewolf decision engine.
//!
//! Every other crate in the workspace speaks in these types. Contract
//! types also derive `ts-rs` so a front end can consume them.
//!
//! # Modules
//!
//! - [`ids`] -- Match, evidence and seat identifiers
//! - [`enums`] -- Roles, phases, action and evidence kinds
//! - [`evidence`] -- Immutable evidence records
//! - [`structs`] -- Players, transcripts and archived match records
//! - [`actions`] -- Per-phase action request/response contract

pub mod actions;
pub mod enums;
pub mod evidence;
pub mod ids;
pub mod structs;

pub use actions::{ActionRequest, Decision};
pub use enums::{ActionKind, DeathCause, EvidenceKind, Faction, GameStage, Phase, Role, Winner};
pub use evidence::Evidence;
pub use ids::{EvidenceId, MatchId, PlayerId};
pub use structs::{MatchRecord, Player, RoleAssignment, Speech, SpeechFlag, VoteRecord};
