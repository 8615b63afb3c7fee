//! Type-safe identifiers.
//!
//! Matches and evidence records are identified by UUID v7 (time-ordered)
//! newtypes. Players are identified by their seat number: seats are small,
//! dense, totally ordered, and "lowest player id" is the tie-break every
//! decision maker uses to stay reproducible.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a single match.
    MatchId
}

define_id! {
    /// Unique identifier for an evidence record.
    EvidenceId
}

/// A player's seat number at the table.
///
/// Seats start at 1. Ordering follows the seat number, which makes
/// `BTreeMap`/`BTreeSet` iteration and tie-breaks deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PlayerId(pub u32);

impl PlayerId {
    /// Create a player identifier from a seat number.
    pub const fn new(seat: u32) -> Self {
        Self(seat)
    }

    /// Return the seat number.
    pub const fn seat(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "No.{}", self.0)
    }
}
