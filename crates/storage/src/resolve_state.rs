//! Resolve-state machine
//!
//! An adapter's resolve state records how much of its object's data has been
//! loaded:
//!
//! ```text
//!   New ──► Transient ──► Resolving ──► Resolved ◄──► Updating
//!    │                      ▲   │          │
//!    └──────► Ghost ────────┘   └─► Ghost ◄┘ (abort / invalidate)
//!
//!   Destroyed: terminal, reachable from Ghost, Resolving, Resolved, Updating
//! ```
//!
//! Every mutation consults [`ResolveState::can_change_to`] first. An illegal
//! transition is refused (the caller gets `false` and nothing changes), which
//! is what makes redundant lazy-load triggers safe: only the first resolver
//! wins.

use std::fmt;

/// Loading stage of an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolveState {
    /// Freshly instantiated, not yet classified
    New,
    /// Exists only in memory, never persisted
    Transient,
    /// Persistent, nothing loaded yet
    Ghost,
    /// Fields are being loaded (or the object is being made persistent)
    Resolving,
    /// Fields loaded
    Resolved,
    /// Fields are being written
    Updating,
    /// Deleted; terminal
    Destroyed,
}

impl ResolveState {
    /// Legal-transition table
    ///
    /// A state never "changes" to itself.
    pub fn can_change_to(self, target: ResolveState) -> bool {
        use ResolveState::*;
        matches!(
            (self, target),
            (New, Transient)
                | (New, Ghost)
                | (Transient, Resolving)
                | (Ghost, Resolving)
                | (Ghost, Destroyed)
                | (Resolving, Resolved)
                | (Resolving, Ghost)
                | (Resolving, Destroyed)
                | (Resolved, Updating)
                | (Resolved, Ghost)
                | (Resolved, Destroyed)
                | (Updating, Resolved)
                | (Updating, Destroyed)
        )
    }

    /// Check whether the object's fields are available
    pub fn is_resolved(self) -> bool {
        matches!(self, ResolveState::Resolved | ResolveState::Updating)
    }

    /// Check whether the object has never been persisted
    pub fn is_transient(self) -> bool {
        matches!(self, ResolveState::New | ResolveState::Transient)
    }

    /// Check whether the object is backed by a row
    pub fn is_persistent(self) -> bool {
        matches!(
            self,
            ResolveState::Ghost
                | ResolveState::Resolving
                | ResolveState::Resolved
                | ResolveState::Updating
        )
    }

    /// Check whether the state is terminal
    pub fn is_destroyed(self) -> bool {
        self == ResolveState::Destroyed
    }

    /// Short code for logs
    pub fn code(self) -> &'static str {
        match self {
            ResolveState::New => "NEW",
            ResolveState::Transient => "TRANSIENT",
            ResolveState::Ghost => "GHOST",
            ResolveState::Resolving => "RESOLVING",
            ResolveState::Resolved => "RESOLVED",
            ResolveState::Updating => "UPDATING",
            ResolveState::Destroyed => "DESTROYED",
        }
    }
}

impl fmt::Display for ResolveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
