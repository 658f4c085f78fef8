//! Object adapter
//!
//! An [`ObjectAdapter`] wraps exactly one raw domain object (or one owned
//! collection) together with its identifier, its version token and its
//! resolve state. Adapters live in the arena owned by
//! [`IdentityMaps`](crate::IdentityMaps) and are addressed by
//! [`AdapterHandle`].

use crate::resolve_state::ResolveState;
use oidmap_core::{AdapterHandle, DomainObject, ObjectId, Oid, Payload, Version};
use tracing::debug;

/// Wrapper pairing a raw object with its identity and loading state
#[derive(Debug, Clone)]
pub struct ObjectAdapter {
    handle: AdapterHandle,
    object_id: ObjectId,
    oid: Oid,
    payload: Payload,
    version: Option<Version>,
    state: ResolveState,
    retain_across_reset: bool,
}

impl ObjectAdapter {
    pub(crate) fn new(
        handle: AdapterHandle,
        object_id: ObjectId,
        oid: Oid,
        payload: Payload,
        state: ResolveState,
    ) -> Self {
        ObjectAdapter {
            handle,
            object_id,
            oid,
            payload,
            version: None,
            state,
            retain_across_reset: false,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Arena handle of this adapter
    pub fn handle(&self) -> AdapterHandle {
        self.handle
    }

    /// Identity of the wrapped raw object
    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    /// Current identifier
    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    /// Wrapped content
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Mutable wrapped content
    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    /// Entity fields, if this adapter wraps an entity
    pub fn object(&self) -> Option<&DomainObject> {
        self.payload.as_entity()
    }

    /// Mutable entity fields, if this adapter wraps an entity
    pub fn object_mut(&mut self) -> Option<&mut DomainObject> {
        self.payload.as_entity_mut()
    }

    /// Collection elements, if this adapter wraps a collection
    pub fn elements(&self) -> Option<&[AdapterHandle]> {
        self.payload.as_collection()
    }

    /// Version token held since the last load or write
    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// Replace the held version token
    pub fn set_version(&mut self, version: Version) {
        self.version = Some(version);
    }

    /// Current resolve state
    pub fn state(&self) -> ResolveState {
        self.state
    }

    /// Check whether this adapter survives identity-map resets
    pub fn retains_across_reset(&self) -> bool {
        self.retain_across_reset
    }

    /// Flag this adapter as a long-lived, service-like singleton
    pub fn set_retain_across_reset(&mut self, retain: bool) {
        self.retain_across_reset = retain;
    }

    pub(crate) fn set_oid(&mut self, oid: Oid) {
        self.oid = oid;
    }

    // =========================================================================
    // State transitions
    // =========================================================================

    /// Check whether a transition to `target` is legal from the current state
    pub fn can_change_to(&self, target: ResolveState) -> bool {
        self.state.can_change_to(target)
    }

    /// Move to `target` if legal
    ///
    /// Returns `false` (and leaves the state untouched) if the transition is
    /// not allowed.
    pub fn change_state(&mut self, target: ResolveState) -> bool {
        if !self.can_change_to(target) {
            debug!(
                target: "oidmap::adapter",
                oid = %self.oid,
                from = %self.state,
                to = %target,
                "State change refused"
            );
            return false;
        }
        self.state = target;
        true
    }

    /// Open the loading bracket
    ///
    /// No-op returning `false` unless the adapter can move to `Resolving`,
    /// which guarantees at most one in-flight load per adapter.
    pub fn begin_resolving(&mut self) -> bool {
        self.change_state(ResolveState::Resolving)
    }

    /// Close the loading bracket successfully
    pub fn end_resolving(&mut self) -> bool {
        self.state == ResolveState::Resolving && self.change_state(ResolveState::Resolved)
    }

    /// Close the loading bracket after a failure, returning to `Ghost`
    pub fn abort_resolving(&mut self) -> bool {
        self.state == ResolveState::Resolving && self.change_state(ResolveState::Ghost)
    }

    /// Open the writing bracket
    pub fn begin_updating(&mut self) -> bool {
        self.change_state(ResolveState::Updating)
    }

    /// Close the writing bracket
    pub fn end_updating(&mut self) -> bool {
        self.state == ResolveState::Updating && self.change_state(ResolveState::Resolved)
    }

    /// Drop loaded data so the next access reloads it
    pub fn invalidate(&mut self) -> bool {
        self.state == ResolveState::Resolved && self.change_state(ResolveState::Ghost)
    }

    /// Mark the adapter deleted
    pub fn destroy(&mut self) -> bool {
        self.change_state(ResolveState::Destroyed)
    }

    /// Forget handles to adapters that no longer exist
    ///
    /// A loaded adapter goes back to `Ghost` with an empty payload, so its
    /// next access reloads it from the database. Any other adapter just loses
    /// the dangling handles. Returns whether a handle was dangling.
    pub(crate) fn release_dangling(&mut self, is_live: impl Fn(AdapterHandle) -> bool) -> bool {
        let dangling = match &self.payload {
            Payload::Entity(object) => object.references().any(|h| !is_live(h)),
            Payload::Collection(elements) => elements.iter().any(|h| !is_live(*h)),
        };
        if !dangling {
            return false;
        }
        if self.invalidate() {
            self.payload = match self.payload {
                Payload::Entity(_) => Payload::entity(),
                Payload::Collection(_) => Payload::collection(),
            };
        } else {
            match &mut self.payload {
                Payload::Entity(object) => object.retain_references(&is_live),
                Payload::Collection(elements) => elements.retain(|h| is_live(*h)),
            }
        }
        debug!(target: "oidmap::adapter", oid = %self.oid, state = %self.state, "Dangling handles released");
        true
    }
}
