//! Version (lock) tokens
//!
//! Every persistent object carries a version token used for optimistic
//! concurrency control. The token is read from the version column when the
//! object's row is loaded and compared against the database immediately
//! before any write.
//!
//! ## Comparison
//!
//! Only the `sequence` participates in concurrency comparison. The user and
//! time stamps are informational: they record who produced the version and
//! when, and are never used to decide a conflict.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Optimistic-concurrency marker held by an adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Monotonic counter stored in the version column
    pub sequence: u64,
    /// User that produced this version, if known
    pub user: Option<String>,
    /// When this version was produced, if known
    pub time: Option<DateTime<Utc>>,
}

impl Version {
    /// Version of a row that has just been inserted
    pub const INITIAL: u64 = 1;

    /// Create a version from a bare sequence number
    pub const fn new(sequence: u64) -> Self {
        Version {
            sequence,
            user: None,
            time: None,
        }
    }

    /// First version of a newly stored object
    pub fn initial(user: Option<&str>) -> Self {
        Version {
            sequence: Self::INITIAL,
            user: user.map(str::to_string),
            time: Some(Utc::now()),
        }
    }

    /// The version a successful update will write
    #[must_use]
    pub fn next(&self, user: Option<&str>) -> Self {
        Version {
            sequence: self.sequence.saturating_add(1),
            user: user.map(str::to_string),
            time: Some(Utc::now()),
        }
    }

    /// Check whether `other` represents a different stored state
    ///
    /// Compares sequences only.
    pub fn differs_from(&self, other: &Version) -> bool {
        self.sequence != other.sequence
    }
}

impl From<u64> for Version {
    fn from(sequence: u64) -> Self {
        Version::new(sequence)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.sequence)?;
        if let Some(user) = &self.user {
            write!(f, " by {}", user)?;
        }
        Ok(())
    }
}
