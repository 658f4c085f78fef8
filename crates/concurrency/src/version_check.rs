//! Version capture and comparison
//!
//! Rules:
//! - The version column holds a non-negative integer sequence
//! - A load captures the sequence into the adapter's [`Version`]
//! - Before a write, the database's current sequence is compared with the held
//!   one; any difference (including a vanished row) is a conflict
//! - Only the sequence is compared; user and time stamps are informational

use oidmap_core::{Error, Oid, Result, Row, Value, Version};
use tracing::warn;

/// Outcome of comparing a held version with the database's
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionCheck {
    /// The database still holds the version the adapter loaded
    Current,
    /// The row was changed since it was loaded
    Stale {
        /// Version the adapter holds
        held: u64,
        /// Version the database reports
        current: u64,
    },
    /// The row no longer exists
    Missing {
        /// Version the adapter holds
        held: u64,
    },
}

impl VersionCheck {
    /// Compare a held version with what the database reports now
    pub fn compare(held: &Version, current: Option<&Version>) -> Self {
        match current {
            None => VersionCheck::Missing {
                held: held.sequence,
            },
            Some(current) if held.differs_from(current) => VersionCheck::Stale {
                held: held.sequence,
                current: current.sequence,
            },
            Some(_) => VersionCheck::Current,
        }
    }

    /// Check if the write may proceed
    pub fn is_current(&self) -> bool {
        matches!(self, VersionCheck::Current)
    }

    /// Convert into a `Result`, producing `Error::Concurrency` on a conflict
    ///
    /// A missing row reports current version 0.
    pub fn into_result(self, oid: &Oid) -> Result<()> {
        match self {
            VersionCheck::Current => Ok(()),
            VersionCheck::Stale { held, current } => Err(Error::Concurrency {
                oid: oid.to_string(),
                held,
                current,
            }),
            VersionCheck::Missing { held } => Err(Error::Concurrency {
                oid: oid.to_string(),
                held,
                current: 0,
            }),
        }
    }
}

/// Extract the version token from a loaded row
///
/// # Errors
///
/// - `SchemaMismatch` if the row has no version column
/// - `InvalidOperation` if the column does not hold a non-negative integer
pub fn capture_lock(row: &Row, version_column: &str) -> Result<Version> {
    match row.get(version_column) {
        None => Err(Error::schema_mismatch(
            "(result row)",
            version_column,
            "version column missing from result",
        )),
        Some(Value::Int(n)) if *n >= 0 => Ok(Version::new(*n as u64)),
        Some(other) => Err(Error::invalid_operation(format!(
            "version column '{}' holds {} value '{}'",
            version_column,
            other.type_name(),
            other
        ))),
    }
}

/// Gate a write on the version the database reports right now
///
/// `held` is the token the adapter captured at load time; `current` is what
/// the database reports immediately before the write (`None` if the row is
/// gone).
///
/// # Errors
///
/// - `Concurrency` on any mismatch; the caller must not issue the write
/// - `InvalidOperation` if the adapter never captured a version
pub fn assert_current(oid: &Oid, held: Option<&Version>, current: Option<&Version>) -> Result<()> {
    let held = held.ok_or_else(|| {
        Error::invalid_operation(format!("{} has no version token; load it before writing", oid))
    })?;
    let check = VersionCheck::compare(held, current);
    if !check.is_current() {
        warn!(target: "oidmap::version", oid = %oid, held = %held, outcome = ?check, "Version conflict");
    }
    check.into_result(oid)
}
