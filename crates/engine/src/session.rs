//! Unit-of-work session
//!
//! A [`Session`] owns one pair of identity maps and is passed explicitly to
//! every store operation. Nothing is shared between sessions; a session is
//! driven by a single thread of control.

use oidmap_core::{AdapterHandle, DomainObject, Error, Oid, Payload, Result, RootOid};
use oidmap_storage::{IdentityMaps, ObjectAdapter, ResolveState};
use tracing::debug;
use uuid::Uuid;

/// One unit of work with its own identity maps
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    user: Option<String>,
    maps: IdentityMaps,
    next_transient: u64,
}

impl Session {
    pub(crate) fn new(user: Option<String>) -> Self {
        let id = Uuid::new_v4();
        debug!(target: "oidmap::session", session = %id, user = ?user, "Session opened");
        Session {
            id,
            user,
            maps: IdentityMaps::new(),
            next_transient: 1,
        }
    }

    /// Session id (for logs)
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// User recorded on versions written by this session
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Identity maps of this session
    pub fn maps(&self) -> &IdentityMaps {
        &self.maps
    }

    /// Mutable identity maps of this session
    pub fn maps_mut(&mut self) -> &mut IdentityMaps {
        &mut self.maps
    }

    /// Adapter by handle
    ///
    /// # Errors
    ///
    /// Returns `StaleHandle` if the adapter is gone.
    pub fn adapter(&self, handle: AdapterHandle) -> Result<&ObjectAdapter> {
        self.maps.adapter(handle)
    }

    /// Mutable adapter by handle
    ///
    /// # Errors
    ///
    /// Returns `StaleHandle` if the adapter is gone.
    pub fn adapter_mut(&mut self, handle: AdapterHandle) -> Result<&mut ObjectAdapter> {
        self.maps.adapter_mut(handle)
    }

    /// Adapter registered for an identifier
    pub fn lookup(&self, oid: &Oid) -> Option<AdapterHandle> {
        self.maps.lookup_by_oid(oid)
    }

    /// Fields of an entity
    ///
    /// A ghost has no fields yet; resolve it first.
    ///
    /// # Errors
    ///
    /// `StaleHandle`, or `InvalidOperation` if the handle is a collection.
    pub fn object(&self, handle: AdapterHandle) -> Result<&DomainObject> {
        let adapter = self.maps.adapter(handle)?;
        adapter
            .object()
            .ok_or_else(|| Error::invalid_operation(format!("{} is a collection", adapter.oid())))
    }

    /// Editable fields of an entity
    ///
    /// # Errors
    ///
    /// `StaleHandle`, or `InvalidOperation` if the handle is a collection or
    /// its fields are not loaded.
    pub fn object_mut(&mut self, handle: AdapterHandle) -> Result<&mut DomainObject> {
        let adapter = self.maps.adapter_mut(handle)?;
        check_editable(adapter)?;
        let oid = adapter.oid().to_string();
        adapter
            .object_mut()
            .ok_or_else(|| Error::invalid_operation(format!("{} is a collection", oid)))
    }

    /// Collection adapter of an owner's association, if materialised
    ///
    /// Collection adapters of a persistent owner appear when the owner is
    /// resolved.
    ///
    /// # Errors
    ///
    /// Returns `StaleHandle` if the owner is gone.
    pub fn collection(&self, owner: AdapterHandle, association: &str) -> Result<Option<AdapterHandle>> {
        let owner = self.maps.adapter(owner)?;
        let oid = Oid::parented(owner.oid().root(), association)?;
        Ok(self.maps.lookup_by_oid(&oid))
    }

    /// Elements of a collection adapter
    ///
    /// # Errors
    ///
    /// `StaleHandle`, or `InvalidOperation` if the handle is an entity.
    pub fn elements(&self, collection: AdapterHandle) -> Result<&[AdapterHandle]> {
        let adapter = self.maps.adapter(collection)?;
        adapter
            .elements()
            .ok_or_else(|| Error::invalid_operation(format!("{} is not a collection", adapter.oid())))
    }

    /// Editable elements of a collection adapter
    ///
    /// # Errors
    ///
    /// `StaleHandle`, or `InvalidOperation` if the handle is an entity or the
    /// collection has not been loaded.
    pub fn elements_mut(&mut self, collection: AdapterHandle) -> Result<&mut Vec<AdapterHandle>> {
        let adapter = self.maps.adapter_mut(collection)?;
        check_editable(adapter)?;
        let oid = adapter.oid().to_string();
        adapter
            .payload_mut()
            .as_collection_mut()
            .ok_or_else(|| Error::invalid_operation(format!("{} is not a collection", oid)))
    }

    pub(crate) fn next_transient_key(&mut self) -> String {
        let key = self.next_transient.to_string();
        self.next_transient += 1;
        key
    }

    /// Adapter for a persistent identifier, creating a ghost on a miss
    pub(crate) fn ghost(&mut self, oid: Oid, retain: bool) -> Result<AdapterHandle> {
        if let Some(handle) = self.maps.lookup_by_oid(&oid) {
            return Ok(handle);
        }
        let payload = if oid.is_root() {
            Payload::entity()
        } else {
            Payload::collection()
        };
        let handle = self.maps.adopt_persistent(oid, payload, ResolveState::Ghost)?;
        if retain {
            self.maps.adapter_mut(handle)?.set_retain_across_reset(true);
        }
        Ok(handle)
    }

    /// Ghost collection adapter for a persistent owner's association
    pub(crate) fn ghost_collection(
        &mut self,
        owner: &RootOid,
        association: &str,
        retain: bool,
    ) -> Result<AdapterHandle> {
        self.ghost(Oid::parented(owner, association)?, retain)
    }

    /// Drop every adapter not flagged to survive resets
    ///
    /// Call between units of work, never in the middle of one.
    pub fn reset(&mut self) -> usize {
        let dropped = self.maps.reset();
        debug!(target: "oidmap::session", session = %self.id, dropped, "Session reset");
        dropped
    }

    /// Tear the session down, dropping every adapter
    pub fn close(mut self) {
        self.maps.close();
        debug!(target: "oidmap::session", session = %self.id, "Session closed");
    }
}

fn check_editable(adapter: &ObjectAdapter) -> Result<()> {
    match adapter.state() {
        ResolveState::New | ResolveState::Transient | ResolveState::Resolved | ResolveState::Updating => {
            Ok(())
        }
        state => Err(Error::invalid_operation(format!(
            "{} is {}; load it before editing",
            adapter.oid(),
            state
        ))),
    }
}
