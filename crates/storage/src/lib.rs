//! Identity layer for oidmap
//!
//! This crate implements the per-session object identity machinery:
//! - ResolveState: Loading-stage state machine with a legal-transition table
//! - ObjectAdapter: Wrapper pairing a raw object with its identifier, version
//!   token and resolve state
//! - IdentityMaps: Adapter arena plus the identifier→adapter and
//!   object→adapter indexes, kept in agreement
//!
//! # Ownership
//!
//! Adapters are owned by the arena inside [`IdentityMaps`] and referred to by
//! [`AdapterHandle`](oidmap_core::AdapterHandle). References between domain
//! objects are handles too, so object graphs with cycles need no shared
//! mutable pointers.
//!
//! Handles are generational. A released slot is handed out again only under
//! the next generation, so a handle kept past its adapter stays stale.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod identity_map;
pub mod resolve_state;

pub use adapter::ObjectAdapter;
pub use identity_map::IdentityMaps;
pub use resolve_state::ResolveState;
