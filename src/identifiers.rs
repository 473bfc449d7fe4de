//! Type-safe identifiers for session entities.
//!
//! Newtype wrappers prevent mixing incompatible IDs at compile time.
//!
//! | Type | Identifies |
//! |------|------------|
//! | [`GenerationId`] | One physical connection of a session |
//! | [`HandlerId`] | One handler registration |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// Macros
// ============================================================================

macro_rules! counter_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Creates an ID from a raw value.
            #[inline]
            #[must_use]
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the raw value.
            #[inline]
            #[must_use]
            pub const fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

counter_id!(
    /// Identifies one connection generation within a session.
    ///
    /// Generations are numbered from 1 in `connect()` order.
    GenerationId,
    "gen"
);

counter_id!(
    /// Identifies one handler registration.
    ///
    /// Two registrations of the same callback receive distinct IDs.
    HandlerId,
    "handler"
);

// ============================================================================
// IdSequence
// ============================================================================

/// Monotonic ID source scoped to one owner.
#[derive(Debug, Default)]
pub(crate) struct IdSequence(AtomicU64);

impl IdSequence {
    /// Returns the next value, starting at 1.
    #[inline]
    pub(crate) fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(GenerationId::new(3).to_string(), "gen-3");
        assert_eq!(HandlerId::new(7).to_string(), "handler-7");
    }

    #[test]
    fn test_sequence_starts_at_one() {
        let seq = IdSequence::default();
        assert_eq!(seq.next(), 1);
        assert_eq!(seq.next(), 2);
    }

    #[test]
    fn test_sequences_are_independent() {
        let a = IdSequence::default();
        let b = IdSequence::default();
        a.next();
        a.next();
        assert_eq!(b.next(), 1);
    }
}
