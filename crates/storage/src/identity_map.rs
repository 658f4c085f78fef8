//! Per-session identity maps
//!
//! [`IdentityMaps`] owns the adapter arena of one session plus two secondary
//! indexes over arena handles:
//!
//! - `by_oid`: identifier → adapter
//! - `by_object`: raw-object identity → adapter
//!
//! ## Invariants
//!
//! - Both indexes always agree: an adapter is registered in both or in neither,
//!   and removal takes it out of both.
//! - For any identifier there is at most one adapter, and that adapter is the
//!   unique result of the object lookup for its raw object.
//! - A freed arena slot is reused only under a new generation, so a handle to
//!   a removed adapter is reported as stale instead of aliasing a newer one.
//! - After a `reset`, no surviving adapter holds a handle to a dropped one.
//!
//! Mutation happens only through this API (`register_*`, `remap`, `remove`,
//! `reset`, `close`). The maps are not synchronised: one session belongs to
//! one thread of control.

use crate::adapter::ObjectAdapter;
use crate::resolve_state::ResolveState;
use oidmap_core::{AdapterHandle, Error, ObjectId, Oid, Payload, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    adapter: Option<ObjectAdapter>,
}

/// The identifier→adapter and object→adapter index pair of one session
#[derive(Debug, Default)]
pub struct IdentityMaps {
    arena: Vec<Slot>,
    free: Vec<AdapterHandle>,
    by_oid: FxHashMap<Oid, AdapterHandle>,
    by_object: FxHashMap<ObjectId, AdapterHandle>,
    next_object_id: u64,
}

impl IdentityMaps {
    /// Create empty maps
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Arena
    // =========================================================================

    /// Place a new adapter in the arena without registering it
    ///
    /// The adapter is invisible to lookups until it is registered, and an
    /// unregistered adapter is dropped by the next `reset`. Freed slots are
    /// reused first.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if every slot index is taken.
    pub fn allocate(&mut self, oid: Oid, payload: Payload, state: ResolveState) -> Result<AdapterHandle> {
        let handle = match self.free.pop() {
            Some(handle) => handle,
            None => {
                let index = u32::try_from(self.arena.len())
                    .map_err(|_| Error::invalid_operation("adapter arena is full"))?;
                self.arena.push(Slot::default());
                AdapterHandle::new(index)
            }
        };
        let object_id = ObjectId::new(self.next_object_id);
        self.next_object_id += 1;
        let slot = &mut self.arena[handle.index()];
        slot.generation = handle.generation();
        slot.adapter = Some(ObjectAdapter::new(handle, object_id, oid, payload, state));
        Ok(handle)
    }

    /// Take the adapter out of its slot and queue the slot for reuse
    fn release(&mut self, handle: AdapterHandle) -> Option<ObjectAdapter> {
        let slot = self.arena.get_mut(handle.index())?;
        if slot.generation != handle.generation() {
            return None;
        }
        let adapter = slot.adapter.take()?;
        // A slot whose generations are exhausted is retired
        if let Some(next) = handle.next_generation() {
            slot.generation = next.generation();
            self.free.push(next);
        }
        Some(adapter)
    }

    /// Allocate and register an adapter for a persistent identifier
    ///
    /// # Errors
    ///
    /// Returns `DuplicateIdentity` if the identifier already belongs to
    /// another adapter; the new adapter is discarded.
    pub fn adopt_persistent(
        &mut self,
        oid: Oid,
        payload: Payload,
        state: ResolveState,
    ) -> Result<AdapterHandle> {
        let handle = self.allocate(oid.clone(), payload, state)?;
        if let Err(e) = self.register_persistent(&oid, handle) {
            self.release(handle);
            return Err(e);
        }
        Ok(handle)
    }

    /// Allocate and register an adapter for a transient object
    ///
    /// # Errors
    ///
    /// Returns `DuplicateIdentity` if the transient identifier is taken.
    pub fn adopt_transient(&mut self, oid: Oid, payload: Payload) -> Result<AdapterHandle> {
        let handle = self.allocate(oid, payload, ResolveState::Transient)?;
        let object_id = self.adapter(handle)?.object_id();
        if let Err(e) = self.register_transient(object_id, handle) {
            self.release(handle);
            return Err(e);
        }
        Ok(handle)
    }

    /// Adapter by handle
    pub fn get(&self, handle: AdapterHandle) -> Option<&ObjectAdapter> {
        self.arena
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.adapter.as_ref())
    }

    /// Mutable adapter by handle
    pub fn get_mut(&mut self, handle: AdapterHandle) -> Option<&mut ObjectAdapter> {
        self.arena
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.adapter.as_mut())
    }

    /// Adapter by handle, failing on a stale handle
    ///
    /// # Errors
    ///
    /// Returns `StaleHandle` if the adapter was removed.
    pub fn adapter(&self, handle: AdapterHandle) -> Result<&ObjectAdapter> {
        self.get(handle).ok_or(Error::StaleHandle(handle))
    }

    /// Mutable adapter by handle, failing on a stale handle
    ///
    /// # Errors
    ///
    /// Returns `StaleHandle` if the adapter was removed.
    pub fn adapter_mut(&mut self, handle: AdapterHandle) -> Result<&mut ObjectAdapter> {
        self.get_mut(handle).ok_or(Error::StaleHandle(handle))
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Adapter registered for an identifier
    pub fn lookup_by_oid(&self, oid: &Oid) -> Option<AdapterHandle> {
        self.by_oid.get(oid).copied()
    }

    /// Adapter registered for a raw object
    pub fn lookup_by_object(&self, object: ObjectId) -> Option<AdapterHandle> {
        self.by_object.get(&object).copied()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register an adapter under its persistent identifier
    ///
    /// Re-registering the same adapter is a no-op.
    ///
    /// # Errors
    ///
    /// - `DuplicateIdentity` if the identifier (or the raw object) is already
    ///   registered to a different adapter
    /// - `StaleHandle` if the handle is not live
    /// - `InvalidOperation` if `oid` is not the adapter's identifier or is
    ///   transient
    pub fn register_persistent(&mut self, oid: &Oid, handle: AdapterHandle) -> Result<()> {
        if oid.is_transient() {
            return Err(Error::invalid_operation(format!(
                "{} is transient; use register_transient",
                oid
            )));
        }
        let adapter = self.adapter(handle)?;
        if adapter.oid() != oid {
            return Err(Error::invalid_operation(format!(
                "adapter {} is identified by {}, not {}",
                handle,
                adapter.oid(),
                oid
            )));
        }
        let object_id = adapter.object_id();
        self.register(oid.clone(), object_id, handle)
    }

    /// Register an adapter under its raw object identity
    ///
    /// The adapter's (transient) identifier is indexed as well, keeping both
    /// maps in agreement. Re-registering the same adapter is a no-op.
    ///
    /// # Errors
    ///
    /// - `DuplicateIdentity` if the object or identifier already belongs to a
    ///   different adapter
    /// - `StaleHandle` if the handle is not live
    /// - `InvalidOperation` if `object` is not the adapter's raw object
    pub fn register_transient(&mut self, object: ObjectId, handle: AdapterHandle) -> Result<()> {
        let adapter = self.adapter(handle)?;
        if adapter.object_id() != object {
            return Err(Error::invalid_operation(format!(
                "adapter {} wraps {}, not {}",
                handle,
                adapter.object_id(),
                object
            )));
        }
        let oid = adapter.oid().clone();
        self.register(oid, object, handle)
    }

    fn register(&mut self, oid: Oid, object: ObjectId, handle: AdapterHandle) -> Result<()> {
        if let Some(existing) = self.by_oid.get(&oid).copied() {
            if existing != handle {
                return Err(Error::DuplicateIdentity {
                    identity: oid.to_string(),
                    existing,
                    claimed: handle,
                });
            }
        }
        if let Some(existing) = self.by_object.get(&object).copied() {
            if existing != handle {
                return Err(Error::DuplicateIdentity {
                    identity: object.to_string(),
                    existing,
                    claimed: handle,
                });
            }
        }
        self.by_oid.insert(oid, handle);
        self.by_object.insert(object, handle);
        Ok(())
    }

    /// Re-key a registered adapter under a new identifier
    ///
    /// Used when a transient object is first written and its transient
    /// identifier is replaced by a persistent one.
    ///
    /// # Errors
    ///
    /// - `DuplicateIdentity` if `new_oid` belongs to another adapter
    /// - `StaleHandle` if the handle is not live
    pub fn remap(&mut self, handle: AdapterHandle, new_oid: Oid) -> Result<()> {
        let old_oid = self.adapter(handle)?.oid().clone();
        if let Some(existing) = self.by_oid.get(&new_oid).copied() {
            if existing != handle {
                return Err(Error::DuplicateIdentity {
                    identity: new_oid.to_string(),
                    existing,
                    claimed: handle,
                });
            }
        }
        if self.by_oid.get(&old_oid) == Some(&handle) {
            self.by_oid.remove(&old_oid);
        }
        let object_id = {
            let adapter = self.adapter_mut(handle)?;
            adapter.set_oid(new_oid.clone());
            adapter.object_id()
        };
        debug!(target: "oidmap::identity", from = %old_oid, to = %new_oid, "Adapter remapped");
        self.by_oid.insert(new_oid, handle);
        self.by_object.insert(object_id, handle);
        Ok(())
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Remove an adapter from both maps and the arena
    ///
    /// Returns whether anything was removed.
    pub fn remove(&mut self, handle: AdapterHandle) -> bool {
        let Some(adapter) = self.release(handle) else {
            return false;
        };
        if self.by_oid.get(adapter.oid()) == Some(&handle) {
            self.by_oid.remove(adapter.oid());
        }
        if self.by_object.get(&adapter.object_id()) == Some(&handle) {
            self.by_object.remove(&adapter.object_id());
        }
        true
    }

    /// Remove the adapter registered for an identifier
    ///
    /// Returns whether anything was removed.
    pub fn remove_oid(&mut self, oid: &Oid) -> bool {
        match self.lookup_by_oid(oid) {
            Some(handle) => self.remove(handle),
            None => false,
        }
    }

    /// Clear every entry except those flagged to survive resets
    ///
    /// Used at transaction/session boundaries, never mid-transaction. A
    /// surviving adapter that referred to a dropped one is returned to
    /// `Ghost` (or, if it was never stored, loses the dangling handles).
    /// Returns the number of adapters dropped.
    pub fn reset(&mut self) -> usize {
        let doomed: Vec<AdapterHandle> = self
            .adapters()
            .filter(|a| !a.retains_across_reset())
            .map(ObjectAdapter::handle)
            .collect();
        for handle in &doomed {
            self.release(*handle);
        }

        let live: FxHashSet<AdapterHandle> = self.adapters().map(ObjectAdapter::handle).collect();
        self.by_oid.retain(|_, h| live.contains(h));
        self.by_object.retain(|_, h| live.contains(h));
        let unloaded = self
            .arena
            .iter_mut()
            .filter_map(|slot| slot.adapter.as_mut())
            .map(|adapter| adapter.release_dangling(|h| live.contains(&h)))
            .filter(|released| *released)
            .count();

        debug!(
            target: "oidmap::identity",
            dropped = doomed.len(),
            retained = self.by_object.len(),
            unloaded,
            "Identity maps reset"
        );
        doomed.len()
    }

    /// Drop everything, retained entries included
    pub fn close(&mut self) {
        let all: Vec<AdapterHandle> = self.adapters().map(ObjectAdapter::handle).collect();
        for handle in all {
            self.release(handle);
        }
        self.by_oid.clear();
        self.by_object.clear();
    }

    fn adapters(&self) -> impl Iterator<Item = &ObjectAdapter> {
        self.arena.iter().filter_map(|slot| slot.adapter.as_ref())
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Number of registered adapters
    pub fn len(&self) -> usize {
        self.by_object.len()
    }

    /// Check whether no adapter is registered
    pub fn is_empty(&self) -> bool {
        self.by_object.is_empty()
    }

    /// Registered adapters, in arena order
    pub fn iter(&self) -> impl Iterator<Item = &ObjectAdapter> {
        self.adapters()
            .filter(|a| self.by_object.get(&a.object_id()) == Some(&a.handle()))
    }

    /// Number of arena slots, live or waiting for reuse
    pub fn slots(&self) -> usize {
        self.arena.len()
    }

    /// Verify that both indexes agree with each other and with the arena
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` describing the first disagreement found.
    pub fn check_consistency(&self) -> Result<()> {
        if self.by_oid.len() != self.by_object.len() {
            return Err(Error::invalid_operation(format!(
                "index sizes differ: {} identifiers, {} objects",
                self.by_oid.len(),
                self.by_object.len()
            )));
        }
        for (oid, handle) in &self.by_oid {
            let adapter = self.adapter(*handle)?;
            if adapter.oid() != oid {
                return Err(Error::invalid_operation(format!(
                    "{} indexed under {} but identified by {}",
                    handle,
                    oid,
                    adapter.oid()
                )));
            }
            if self.by_object.get(&adapter.object_id()) != Some(handle) {
                return Err(Error::invalid_operation(format!(
                    "{} indexed by identifier {} but not by object",
                    handle, oid
                )));
            }
        }
        for (object, handle) in &self.by_object {
            let adapter = self.adapter(*handle)?;
            if adapter.object_id() != *object || self.by_oid.get(adapter.oid()) != Some(handle) {
                return Err(Error::invalid_operation(format!(
                    "{} indexed by object {} but not by identifier",
                    handle, object
                )));
            }
        }
        Ok(())
    }
}
