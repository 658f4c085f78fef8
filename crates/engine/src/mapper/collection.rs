//! Owned-collection mapper
//!
//! The elements of an owned collection live in the element type's table and
//! point back at their owner through a foreign-key column named
//! `<fk prefix><owner short name>_<association>`, holding the owner's
//! canonical identifier text.
//!
//! ## Loading
//!
//! The owner's collection adapter brackets the load. If it cannot enter
//! `Resolving` (already loaded, or a load is in flight further up the call
//! stack) the call is a no-op. Rows are turned into element adapters in row
//! order.
//!
//! ## Saving
//!
//! Detach-then-reattach: one `UPDATE ... SET fk = NULL WHERE fk = owner`, then
//! one `UPDATE ... SET fk = owner WHERE id = element` per element. Membership
//! changes made concurrently by another session are not detected; only the
//! element rows themselves carry versions.

use super::ensure_column;
use crate::config::MapperConfig;
use crate::context::MapperContext;
use crate::mapping::ObjectMapping;
use crate::session::Session;
use crate::sql::{ColumnDef, SqlType, Statement};
use oidmap_core::{AdapterHandle, AssociationSpec, Error, Oid, Result, ResultCursor, Value};
use oidmap_storage::ResolveState;
use tracing::debug;

/// Mapper for one owned collection
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionMapper {
    association: String,
    element_type: String,
    element_table: String,
    foreign_key: ColumnDef,
}

impl CollectionMapper {
    /// Build the mapper for `association` of an owner with short name
    /// `owner_short_name`; elements live in `element_table`
    pub fn new(
        association: &AssociationSpec,
        owner_short_name: &str,
        element_type: &str,
        element_table: &str,
        config: &MapperConfig,
    ) -> Self {
        let name = format!(
            "{}{}_{}",
            config.foreign_key_prefix, owner_short_name, association.name
        )
        .to_lowercase();
        CollectionMapper {
            association: association.name.clone(),
            element_type: element_type.to_string(),
            element_table: element_table.to_string(),
            foreign_key: ColumnDef::new(name, SqlType::Varchar(config.default_string_length)),
        }
    }

    /// Association name
    pub fn association(&self) -> &str {
        &self.association
    }

    /// Element type tag
    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    /// Table holding the elements
    pub fn element_table(&self) -> &str {
        &self.element_table
    }

    /// Foreign-key column in the element table
    pub fn foreign_key(&self) -> &ColumnDef {
        &self.foreign_key
    }

    /// Check whether the element table lacks the foreign-key column
    pub fn needs_schema_change(&self, ctx: &MapperContext<'_>) -> Result<bool> {
        Ok(!ctx.has_column(&self.element_table, &self.foreign_key.name)?)
    }

    /// Add the foreign-key column if it is missing
    pub fn create_columns(&self, ctx: &MapperContext<'_>) -> Result<bool> {
        ensure_column(ctx, &self.element_table, &self.foreign_key)
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Load the owner's collection from the element table
    ///
    /// Returns `false` without touching the database if the owner is
    /// transient or its collection is already loaded or loading.
    ///
    /// # Errors
    ///
    /// Connector and mapping failures propagate; the collection returns to
    /// `Ghost` so a later call can retry.
    pub fn load_collection(
        &self,
        ctx: &MapperContext<'_>,
        session: &mut Session,
        owner: AdapterHandle,
    ) -> Result<bool> {
        let (owner_oid, retain) = {
            let adapter = session.adapter(owner)?;
            (adapter.oid().clone(), adapter.retains_across_reset())
        };
        if owner_oid.is_transient() {
            return Ok(false);
        }
        let collection = session.ghost_collection(owner_oid.root(), &self.association, retain)?;
        if !session.adapter_mut(collection)?.begin_resolving() {
            return Ok(false);
        }

        match self.fetch_elements(ctx, session, &owner_oid) {
            Ok(elements) => {
                let count = elements.len();
                let adapter = session.adapter_mut(collection)?;
                if let Some(slot) = adapter.payload_mut().as_collection_mut() {
                    *slot = elements;
                }
                adapter.end_resolving();
                debug!(
                    target: "oidmap::session",
                    owner = %owner_oid,
                    association = %self.association,
                    count,
                    "Collection loaded"
                );
                Ok(true)
            }
            Err(e) => {
                if let Ok(adapter) = session.adapter_mut(collection) {
                    adapter.abort_resolving();
                }
                Err(e)
            }
        }
    }

    fn fetch_elements(
        &self,
        ctx: &MapperContext<'_>,
        session: &mut Session,
        owner_oid: &Oid,
    ) -> Result<Vec<AdapterHandle>> {
        let element_mapping = ctx.registry().mapping(&self.element_type)?;
        let statement = Statement::select(&self.element_table, element_mapping.select_columns())
            .filter(self.foreign_key.name.clone(), owner_oid.to_string());
        let mut cursor = ctx.select(&statement)?;
        let result = drain(ctx, session, element_mapping, cursor.as_mut());
        cursor.close();
        result
    }

    // =========================================================================
    // Saving
    // =========================================================================

    /// Write the owner's collection membership
    ///
    /// Returns `false` without touching the database unless the collection
    /// is loaded; an unloaded collection says nothing about membership.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if an element is still transient or is not of the
    /// element type; nothing is written then. Connector failures propagate.
    pub fn save_collection(
        &self,
        ctx: &MapperContext<'_>,
        session: &mut Session,
        owner: AdapterHandle,
    ) -> Result<bool> {
        let owner_oid = session.adapter(owner)?.oid().clone();
        if owner_oid.is_transient() {
            return Err(Error::invalid_operation(format!(
                "cannot link collection '{}' of transient {}",
                self.association, owner_oid
            )));
        }
        let Some(element_keys) = self.element_keys(session, &owner_oid)? else {
            return Ok(false);
        };

        let element_mapping = ctx.registry().mapping(&self.element_type)?;
        self.detach(ctx, &owner_oid)?;
        let owner_text = owner_oid.to_string();
        for key in element_keys {
            let relink = Statement::update(
                &self.element_table,
                vec![(self.foreign_key.name.clone(), Value::Text(owner_text.clone()))],
            )
            .filter(element_mapping.id_column(), key);
            ctx.execute(&relink)?;
        }
        Ok(true)
    }

    /// Check that every element of a loaded collection can be linked
    ///
    /// # Errors
    ///
    /// `InvalidOperation` for a transient element or one of another type.
    pub fn check_elements(&self, session: &Session, owner: AdapterHandle) -> Result<()> {
        let owner_oid = session.adapter(owner)?.oid();
        if owner_oid.is_transient() {
            return Ok(());
        }
        self.element_keys(session, owner_oid).map(|_| ())
    }

    /// Keys of the elements to link; `None` unless the collection is loaded
    fn element_keys(&self, session: &Session, owner_oid: &Oid) -> Result<Option<Vec<String>>> {
        let collection_oid = Oid::parented(owner_oid.root(), &self.association)?;
        let Some(collection) = session.lookup(&collection_oid) else {
            return Ok(None);
        };
        let adapter = session.adapter(collection)?;
        if adapter.state() != ResolveState::Resolved {
            return Ok(None);
        }

        let mut keys = Vec::new();
        for element in adapter.elements().unwrap_or_default() {
            let oid = session.adapter(*element)?.oid();
            if oid.is_transient() {
                return Err(Error::invalid_operation(format!(
                    "collection '{}' of {} holds transient {}",
                    self.association, owner_oid, oid
                )));
            }
            if oid.object_type() != self.element_type {
                return Err(Error::invalid_operation(format!(
                    "collection '{}' of {} holds {}; elements must be {}",
                    self.association, owner_oid, oid, self.element_type
                )));
            }
            keys.push(oid.root().key().to_string());
        }
        Ok(Some(keys))
    }

    /// Null the foreign key of every row linked to `owner`
    pub fn detach(&self, ctx: &MapperContext<'_>, owner: &Oid) -> Result<()> {
        let statement = Statement::update(
            &self.element_table,
            vec![(self.foreign_key.name.clone(), Value::Null)],
        )
        .filter(self.foreign_key.name.clone(), owner.to_string());
        ctx.execute(&statement)
    }
}

fn drain(
    ctx: &MapperContext<'_>,
    session: &mut Session,
    element_mapping: &ObjectMapping,
    cursor: &mut dyn ResultCursor,
) -> Result<Vec<AdapterHandle>> {
    let mut elements = Vec::new();
    while let Some(row) = cursor.next_row()? {
        elements.push(element_mapping.load_row(ctx, session, &row)?);
    }
    Ok(elements)
}
