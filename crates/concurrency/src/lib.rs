//! Concurrency layer for oidmap
//!
//! This crate implements optimistic concurrency control for mapped objects:
//! - Version capture from loaded rows
//! - Pre-write version comparison (first writer wins)
//! - Restrictive precedence for combinable numeric column facets
//!
//! There are no locks here. A write is gated by re-reading the version column
//! immediately before the UPDATE/DELETE; a mismatch aborts the write before
//! any statement with side effects is issued.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod facets;
pub mod version_check;

pub use facets::{combine, combine_restrictive};
pub use version_check::{assert_current, capture_lock, VersionCheck};
