//! Error types for the werewolf-ledger crate.

use rust_decimal::Decimal;
use werewolf_types::PlayerId;

/// Errors that can occur while maintaining trust scores.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Evidence referred to a player the ledger was not seeded with.
    #[error("unknown player {player} in trust ledger")]
    UnknownPlayer {
        /// The player that was looked up.
        player: PlayerId,
    },

    /// The trust configuration is internally inconsistent.
    #[error("invalid trust configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with it.
        reason: String,
    },

    /// A score computation overflowed the decimal range.
    #[error("trust arithmetic overflow for {player}: {score} + {delta}")]
    Overflow {
        /// The player whose score was being updated.
        player: PlayerId,
        /// Score before the update.
        score: Decimal,
        /// The delta that could not be applied.
        delta: Decimal,
    },
}
