//! Type-safe identifiers.
//!
//! Newtype wrappers keep session generations from being mixed up with
//! other counters at compile time.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// SessionGeneration
// ============================================================================

/// Monotonically increasing tag of a transport session.
///
/// Every reconnect attempt creates a new session with the next generation.
/// Events and responses tagged with an older generation belong to a
/// superseded session and are discarded.
///
/// Generation `0` is never issued to a session; it marks a client that has
/// not opened one yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SessionGeneration(u64);

impl SessionGeneration {
    /// The generation of a client that has never opened a session.
    pub const NONE: Self = Self(0);

    /// Creates a generation from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the generation that follows this one.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns `true` if this generation was issued to a session.
    #[inline]
    #[must_use]
    pub const fn is_issued(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for SessionGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
