//! Object store facade
//!
//! [`ObjectStore`] owns the collaborators (connector, metadata, mappings,
//! configuration, key generator) and runs the object lifecycle against a
//! caller-supplied [`Session`]:
//!
//! ```text
//! create_transient ──► make_persistent ──► save ... save ──► destroy
//! get_object (ghost) ──► resolve ──► load_collection
//! ```
//!
//! Every write is gated by a version check; every load is bracketed by the
//! adapter's resolving state, so redundant loads are no-ops.

use crate::config::MapperConfig;
use crate::context::MapperContext;
use crate::keys::{generator_for, KeyGenerator};
use crate::mapper::FieldMapper;
use crate::mapping::ObjectMapping;
use crate::registry::MappingRegistry;
use crate::session::Session;
use oidmap_concurrency::assert_current;
use oidmap_core::{
    AdapterHandle, DatabaseConnector, Error, MetadataProvider, Oid, Payload, Result, Version,
};
use oidmap_storage::ResolveState;
use std::sync::Arc;
use tracing::{debug, info};

/// Entry point of the mapping core
pub struct ObjectStore {
    connector: Box<dyn DatabaseConnector>,
    metadata: Arc<dyn MetadataProvider>,
    registry: MappingRegistry,
    config: MapperConfig,
    keys: Box<dyn KeyGenerator>,
}

impl ObjectStore {
    /// Create a store over a connector and a metadata provider
    ///
    /// # Errors
    ///
    /// `Config` on invalid configuration; mapping failures from
    /// [`MappingRegistry::build`].
    pub fn new(
        connector: Box<dyn DatabaseConnector>,
        metadata: Arc<dyn MetadataProvider>,
        config: MapperConfig,
    ) -> Result<Self> {
        config.validate()?;
        let registry = MappingRegistry::build(metadata.as_ref(), &config)?;
        let keys = generator_for(config.key_strategy()?);
        Ok(ObjectStore {
            connector,
            metadata,
            registry,
            config,
            keys,
        })
    }

    /// Replace the key generator chosen by the configuration
    #[must_use]
    pub fn with_key_generator(mut self, keys: Box<dyn KeyGenerator>) -> Self {
        self.keys = keys;
        self
    }

    /// Configuration
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Metadata provider
    pub fn metadata(&self) -> &dyn MetadataProvider {
        self.metadata.as_ref()
    }

    /// Mappings of all known types
    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    fn ctx(&self) -> MapperContext<'_> {
        MapperContext::new(self.connector.as_ref(), &self.registry, &self.config)
    }

    fn mapping_of(&self, session: &Session, handle: AdapterHandle) -> Result<(&ObjectMapping, Oid)> {
        let oid = session.adapter(handle)?.oid().clone();
        Ok((self.registry.mapping(oid.object_type())?, oid))
    }

    // =========================================================================
    // Sessions and schema
    // =========================================================================

    /// Open an anonymous session
    pub fn open_session(&self) -> Session {
        Session::new(None)
    }

    /// Open a session whose writes are stamped with `user`
    pub fn open_session_as(&self, user: impl Into<String>) -> Session {
        Session::new(Some(user.into()))
    }

    /// Create missing tables, then missing columns, for every mapped type
    ///
    /// Idempotent. Returns the number of tables and columns created.
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` if something cannot be created.
    pub fn init_schema(&self) -> Result<usize> {
        let ctx = self.ctx();
        let mut changes = 0;
        for mapping in self.registry.iter() {
            if mapping.create_table(&ctx)? {
                changes += 1;
            }
        }
        for mapping in self.registry.iter() {
            changes += mapping.create_columns(&ctx)?;
        }
        info!(target: "oidmap::schema", types = self.registry.len(), changes, "Schema initialised");
        Ok(changes)
    }

    // =========================================================================
    // Lookup and loading
    // =========================================================================

    /// Instantiate a new, never-stored object of `object_type`
    ///
    /// Its collections start empty and editable.
    pub fn create_transient(&self, session: &mut Session, object_type: &str) -> Result<AdapterHandle> {
        let mapping = self.registry.mapping(object_type)?;
        let key = session.next_transient_key();
        let oid = Oid::transient(object_type, key)?;
        let handle = session.maps_mut().adopt_transient(oid.clone(), Payload::entity())?;
        let mut created = vec![handle];
        for collection in mapping.collections() {
            let coll_oid = Oid::parented(oid.root(), collection.association())?;
            created.push(session.maps_mut().adopt_transient(coll_oid, Payload::collection())?);
        }
        if mapping.is_service() {
            for h in created {
                session.adapter_mut(h)?.set_retain_across_reset(true);
            }
        }
        Ok(handle)
    }

    /// Adapter for an identifier: the session's existing one, or a new ghost
    ///
    /// Nothing is read from the database.
    ///
    /// # Errors
    ///
    /// - `ObjectNotFound` for a transient identifier this session does not know
    /// - `UnknownType` / `UnknownAssociation` for unmapped identifiers
    pub fn get_object(&self, session: &mut Session, oid: &Oid) -> Result<AdapterHandle> {
        if let Some(handle) = session.lookup(oid) {
            return Ok(handle);
        }
        if oid.is_transient() {
            return Err(Error::ObjectNotFound(oid.to_string()));
        }
        let mapping = self.registry.mapping(oid.object_type())?;
        match oid.association() {
            None => session.ghost(oid.clone(), mapping.is_service()),
            Some(association) => {
                mapping.collection(association)?;
                let owner = self.get_object(session, &Oid::Root(oid.root().clone()))?;
                let retain = session.adapter(owner)?.retains_across_reset();
                session.ghost_collection(oid.root(), association, retain)
            }
        }
    }

    /// Look an identifier up and load it
    pub fn load(&self, session: &mut Session, oid: &Oid) -> Result<AdapterHandle> {
        let handle = self.get_object(session, oid)?;
        self.resolve(session, handle)?;
        Ok(handle)
    }

    /// Load an object's fields (or a collection's elements)
    ///
    /// Returns `false` if nothing was loaded because the adapter is already
    /// loaded, being loaded, or transient.
    ///
    /// # Errors
    ///
    /// `ObjectNotFound` if the row is gone; connector failures propagate and
    /// leave the adapter a ghost.
    pub fn resolve(&self, session: &mut Session, handle: AdapterHandle) -> Result<bool> {
        let (mapping, oid) = self.mapping_of(session, handle)?;
        match oid.association() {
            None => mapping.resolve(&self.ctx(), session, handle),
            Some(association) => {
                let owner = session
                    .lookup(&Oid::Root(oid.root().clone()))
                    .ok_or_else(|| Error::ObjectNotFound(oid.root().to_string()))?;
                self.load_collection(session, owner, association)
            }
        }
    }

    /// Drop loaded fields and load them again
    ///
    /// Collections of the object that were loaded are reloaded as well, so a
    /// retry after a concurrency failure starts from the stored membership.
    pub fn refresh(&self, session: &mut Session, handle: AdapterHandle) -> Result<bool> {
        let (mapping, oid) = self.mapping_of(session, handle)?;
        let mut reload = Vec::new();
        if oid.is_root() {
            for collection in mapping.collections() {
                let coll_oid = Oid::parented(oid.root(), collection.association())?;
                let Some(coll) = session.lookup(&coll_oid) else {
                    continue;
                };
                let adapter = session.adapter_mut(coll)?;
                if adapter.invalidate() {
                    if let Some(elements) = adapter.payload_mut().as_collection_mut() {
                        elements.clear();
                    }
                    reload.push(collection.association());
                }
            }
        }
        session.adapter_mut(handle)?.invalidate();
        let loaded = self.resolve(session, handle)?;
        for association in reload {
            self.load_collection(session, handle, association)?;
        }
        Ok(loaded)
    }

    /// Load one collection of an owner
    ///
    /// The owner is resolved first if needed. Returns `false` if the
    /// collection was already loaded (or loading), or the owner is transient.
    ///
    /// # Errors
    ///
    /// `UnknownAssociation` if the owner has no such collection.
    pub fn load_collection(&self, session: &mut Session, owner: AdapterHandle, association: &str) -> Result<bool> {
        let (mapping, oid) = self.mapping_of(session, owner)?;
        let mapper = mapping.mapper(association)?;
        mapping.collection(association)?;
        if oid.is_transient() {
            return Ok(false);
        }
        let ctx = self.ctx();
        mapping.resolve(&ctx, session, owner)?;
        mapper.load_collection(&ctx, session, owner)
    }

    // =========================================================================
    // Writing
    // =========================================================================

    /// Store a transient object and every transient object reachable from it
    ///
    /// Each stored object gets a persistent key, is re-keyed in the identity
    /// maps (with its collections), is inserted with version 1 and finally has
    /// its collections linked. Calling this on an already persistent object is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// Connector failures propagate. Objects of a failed call are left as
    /// ghosts; resolving one tells whether its row made it.
    pub fn make_persistent(&self, session: &mut Session, handle: AdapterHandle) -> Result<()> {
        let ctx = self.ctx();
        let mut started = Vec::new();
        let result = self
            .persist_graph(&ctx, session, handle, &mut started)
            .and_then(|()| self.link_collections(&ctx, session, &started));

        match result {
            Ok(()) => {
                for h in &started {
                    session.adapter_mut(*h)?.end_resolving();
                }
                Ok(())
            }
            Err(e) => {
                for h in &started {
                    if let Ok(adapter) = session.adapter_mut(*h) {
                        adapter.abort_resolving();
                    }
                }
                Err(e)
            }
        }
    }

    fn persist_graph(
        &self,
        ctx: &MapperContext<'_>,
        session: &mut Session,
        handle: AdapterHandle,
        started: &mut Vec<AdapterHandle>,
    ) -> Result<()> {
        let (mapping, oid) = self.mapping_of(session, handle)?;
        if !oid.is_root() {
            return Err(Error::invalid_operation(format!(
                "{} is a collection; it is stored with its owner",
                oid
            )));
        }
        // Persistent already, or in progress further up a reference cycle
        if session.adapter(handle)?.state() != ResolveState::Transient {
            return Ok(());
        }
        session.adapter_mut(handle)?.begin_resolving();
        started.push(handle);

        let key = self.keys.next_key(oid.object_type());
        let persistent = Oid::persistent(oid.object_type(), key)?.with_version(Version::INITIAL);
        session.maps_mut().remap(handle, persistent.clone())?;
        for collection in mapping.collections() {
            let transient_coll = Oid::parented(oid.root(), collection.association())?;
            if let Some(coll) = session.lookup(&transient_coll) {
                let stored_coll = Oid::parented(persistent.root(), collection.association())?;
                session.maps_mut().remap(coll, stored_coll)?;
            }
        }
        debug!(target: "oidmap::session", from = %oid, to = %persistent, "Object made persistent");

        for dependent in self.transient_dependents(session, mapping, handle)? {
            self.persist_graph(ctx, session, dependent, started)?;
        }

        let version = Version::initial(session.user());
        mapping.insert(ctx, session, handle, &version)?;
        session.adapter_mut(handle)?.set_version(version);
        Ok(())
    }

    fn link_collections(
        &self,
        ctx: &MapperContext<'_>,
        session: &mut Session,
        stored: &[AdapterHandle],
    ) -> Result<()> {
        for &owner in stored {
            let (mapping, oid) = self.mapping_of(session, owner)?;
            for collection in mapping.collections() {
                let coll_oid = Oid::parented(oid.root(), collection.association())?;
                if let Some(coll) = session.lookup(&coll_oid) {
                    let adapter = session.adapter_mut(coll)?;
                    if adapter.state() == ResolveState::Transient {
                        adapter.begin_resolving();
                        adapter.end_resolving();
                    }
                }
                collection.save_collection(ctx, session, owner)?;
            }
        }
        Ok(())
    }

    /// Transient objects referenced by the object or held in its collections
    fn transient_dependents(
        &self,
        session: &Session,
        mapping: &ObjectMapping,
        handle: AdapterHandle,
    ) -> Result<Vec<AdapterHandle>> {
        let adapter = session.adapter(handle)?;
        let mut dependents = Vec::new();
        if let Some(object) = adapter.object() {
            for mapper in mapping.mappers() {
                if let FieldMapper::Reference(reference) = mapper {
                    dependents.extend(object.reference(reference.association()));
                }
            }
        }
        for collection in mapping.collections() {
            let coll_oid = Oid::parented(adapter.oid().root(), collection.association())?;
            if let Some(coll) = session.lookup(&coll_oid) {
                dependents.extend_from_slice(session.elements(coll)?);
            }
        }
        let mut transient = Vec::with_capacity(dependents.len());
        for dependent in dependents {
            if session.adapter(dependent)?.state() == ResolveState::Transient && !transient.contains(&dependent) {
                transient.push(dependent);
            }
        }
        Ok(transient)
    }

    /// Write a loaded object's row and collections
    ///
    /// A transient object is made persistent instead; a ghost has nothing to
    /// write. The version held by the adapter is compared with the database
    /// first; on a mismatch nothing is written and the adapter keeps its
    /// fields and version.
    ///
    /// # Errors
    ///
    /// `Concurrency` on a version mismatch (reload and retry); connector
    /// failures propagate.
    pub fn save(&self, session: &mut Session, handle: AdapterHandle) -> Result<()> {
        let (mapping, oid) = self.mapping_of(session, handle)?;
        if !oid.is_root() {
            return Err(Error::invalid_operation(format!(
                "{} is a collection; save its owner",
                oid
            )));
        }
        match session.adapter(handle)?.state() {
            ResolveState::Transient => return self.make_persistent(session, handle),
            ResolveState::Ghost => return Ok(()),
            ResolveState::Resolved => {}
            state => {
                return Err(Error::invalid_operation(format!(
                    "cannot save {} while {}",
                    oid, state
                )))
            }
        }

        let ctx = self.ctx();
        session.adapter_mut(handle)?.begin_updating();
        let result = self.write_row(&ctx, session, mapping, handle, &oid);
        session.adapter_mut(handle)?.end_updating();
        result
    }

    fn write_row(
        &self,
        ctx: &MapperContext<'_>,
        session: &mut Session,
        mapping: &ObjectMapping,
        handle: AdapterHandle,
        oid: &Oid,
    ) -> Result<()> {
        let held = session.adapter(handle)?.version().cloned();
        let current = mapping.current_version(ctx, oid.root().key())?;
        assert_current(oid, held.as_ref(), current.as_ref())?;

        for dependent in self.transient_dependents(session, mapping, handle)? {
            self.make_persistent(session, dependent)?;
        }
        for collection in mapping.collections() {
            collection.check_elements(session, handle)?;
        }

        let next = match &held {
            Some(held) => held.next(session.user()),
            None => Version::initial(session.user()),
        };
        mapping.update(ctx, session, handle, &next)?;
        session.adapter_mut(handle)?.set_version(next);
        for collection in mapping.collections() {
            collection.save_collection(ctx, session, handle)?;
        }
        Ok(())
    }

    /// Delete a stored object
    ///
    /// A ghost is loaded first to obtain its version. Rows linked through the
    /// object's collections are detached, the row is deleted after a version
    /// check, and the object and its collection adapters leave the session.
    ///
    /// # Errors
    ///
    /// `Concurrency` on a version mismatch; `InvalidOperation` for transient
    /// objects, collections, or objects being loaded or written.
    pub fn destroy(&self, session: &mut Session, handle: AdapterHandle) -> Result<()> {
        let (mapping, oid) = self.mapping_of(session, handle)?;
        if oid.is_transient() || !oid.is_root() {
            return Err(Error::invalid_operation(format!(
                "{} is not a stored object",
                oid
            )));
        }
        let ctx = self.ctx();
        if session.adapter(handle)?.state() == ResolveState::Ghost {
            mapping.resolve(&ctx, session, handle)?;
        }
        let state = session.adapter(handle)?.state();
        if state != ResolveState::Resolved {
            return Err(Error::invalid_operation(format!(
                "cannot destroy {} while {}",
                oid, state
            )));
        }

        let held = session.adapter(handle)?.version().cloned();
        let current = mapping.current_version(&ctx, oid.root().key())?;
        assert_current(&oid, held.as_ref(), current.as_ref())?;

        for collection in mapping.collections() {
            collection.detach(&ctx, &oid)?;
        }
        mapping.delete(&ctx, oid.root().key())?;

        session.adapter_mut(handle)?.destroy();
        for collection in mapping.collections() {
            let coll_oid = Oid::parented(oid.root(), collection.association())?;
            session.maps_mut().remove_oid(&coll_oid);
        }
        session.maps_mut().remove(handle);
        debug!(target: "oidmap::session", oid = %oid, "Object destroyed");
        Ok(())
    }
}
