//! Integration Tests
//!
//! End-to-end tests through the `oidmap` facade, organized by concern:
//! - Identifiers: canonical text, equality, parsing
//! - Collections: lazy loading and detach-then-reattach saving
//! - Concurrency: optimistic version checks
//!
//! Collections and concurrency run against both the in-memory connector and
//! an SQLite database.
//! - Lifecycle: persistence cascades, reentrant resolution, destruction
//! - Configuration: `oidmap.toml` driving naming and key strategy

#[macro_use]
#[path = "../common/mod.rs"]
mod common;

mod collections;
mod concurrency;
mod configuration;
mod identifiers;
mod lifecycle;
