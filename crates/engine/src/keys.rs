//! Persistent key generation
//!
//! A key is assigned at the moment a transient object is first written. Keys
//! must be valid identifier components (no `:`, `/`, `@`, no leading `!`).

use crate::config::KeyStrategy;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Source of primary keys for newly stored objects
pub trait KeyGenerator: Send + Sync {
    /// Next unused key for an object of the given type
    fn next_key(&self, object_type: &str) -> String;
}

/// Random v4 UUID keys in simple (32 hex digit) form
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidKeyGenerator;

impl KeyGenerator for UuidKeyGenerator {
    fn next_key(&self, _object_type: &str) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Deterministic counter keys shared by all types
///
/// The counter lives in memory only. Use it against a fresh database (tests,
/// fixtures); a restarted process starts again from its initial value.
#[derive(Debug)]
pub struct SequenceKeyGenerator {
    next: AtomicU64,
}

impl SequenceKeyGenerator {
    /// Counter starting at 1
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Counter starting at `first`
    pub fn starting_at(first: u64) -> Self {
        SequenceKeyGenerator {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for SequenceKeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyGenerator for SequenceKeyGenerator {
    fn next_key(&self, _object_type: &str) -> String {
        self.next.fetch_add(1, Ordering::Relaxed).to_string()
    }
}

/// Generator for a configured strategy
pub fn generator_for(strategy: KeyStrategy) -> Box<dyn KeyGenerator> {
    match strategy {
        KeyStrategy::Uuid => Box::new(UuidKeyGenerator),
        KeyStrategy::Sequence => Box::new(SequenceKeyGenerator::new()),
    }
}
