//! Per-type object mapping
//!
//! An [`ObjectMapping`] ties one object type to its table: the table name
//! (table prefix + short name, lower-cased), the id and version columns, and
//! one [`FieldMapper`] per declared association, in declaration order.
//!
//! Row layout of a mapped table:
//!
//! ```text
//! <id column> VARCHAR PRIMARY KEY | <version column> BIGINT | value/reference columns... | fk columns of owners...
//! ```

use crate::config::MapperConfig;
use crate::context::MapperContext;
use crate::mapper::{CollectionMapper, FieldMapper, ReferenceMapper, ValueMapper};
use crate::session::Session;
use crate::sql::{ColumnDef, SqlType, Statement};
use oidmap_concurrency::capture_lock;
use oidmap_core::{
    AdapterHandle, AssociationKind, Error, MetadataProvider, ObjectSpec, Oid, Result, Row, Value,
    Version,
};
use rustc_hash::FxHashSet;
use tracing::info;

/// Table name for a type short name
pub fn table_name(config: &MapperConfig, short_name: &str) -> String {
    format!("{}{}", config.table_prefix, short_name).to_lowercase()
}

fn check_name(what: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::invalid_operation(format!(
            "{} '{}' is not a valid SQL identifier",
            what, name
        )))
    }
}

fn require<'m>(metadata: &'m dyn MetadataProvider, object_type: &str) -> Result<&'m ObjectSpec> {
    metadata
        .object_spec(object_type)
        .ok_or_else(|| Error::UnknownType(object_type.to_string()))
}

/// Mapping of one object type onto its table
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMapping {
    object_type: String,
    short_name: String,
    table: String,
    id_column: ColumnDef,
    version_column: ColumnDef,
    service: bool,
    mappers: Vec<FieldMapper>,
}

impl ObjectMapping {
    /// Build the mapping for `spec`
    ///
    /// # Errors
    ///
    /// - `UnknownType` if a reference target or collection element type is
    ///   not known to `metadata`
    /// - `InvalidOperation` if a name is not a valid SQL identifier, clashes
    ///   with the id/version columns, or is declared twice
    pub fn from_spec(spec: &ObjectSpec, metadata: &dyn MetadataProvider, config: &MapperConfig) -> Result<Self> {
        check_name("short name", &spec.short_name)?;
        let table = table_name(config, &spec.short_name);
        let mut seen = FxHashSet::default();
        let mut mappers = Vec::with_capacity(spec.associations.len());

        for association in &spec.associations {
            check_name("association", &association.name)?;
            if association.name == config.id_column || association.name == config.version_column {
                return Err(Error::invalid_operation(format!(
                    "association '{}' of {} clashes with a reserved column",
                    association.name, spec.object_type
                )));
            }
            if !seen.insert(association.name.as_str()) {
                return Err(Error::invalid_operation(format!(
                    "association '{}' declared twice on {}",
                    association.name, spec.object_type
                )));
            }
            let mapper = match &association.kind {
                AssociationKind::Value(value_type) => {
                    FieldMapper::Value(ValueMapper::new(association, value_type, &table, config))
                }
                AssociationKind::Reference { target } => {
                    require(metadata, target)?;
                    FieldMapper::Reference(ReferenceMapper::new(association, target, &table, config))
                }
                AssociationKind::Collection { element } => {
                    let element_spec = require(metadata, element)?;
                    FieldMapper::Collection(CollectionMapper::new(
                        association,
                        &spec.short_name,
                        element,
                        &table_name(config, &element_spec.short_name),
                        config,
                    ))
                }
            };
            mappers.push(mapper);
        }

        Ok(ObjectMapping {
            object_type: spec.object_type.clone(),
            short_name: spec.short_name.clone(),
            table,
            id_column: ColumnDef::primary_key(
                config.id_column.clone(),
                SqlType::Varchar(config.default_string_length),
            ),
            version_column: ColumnDef::new(config.version_column.clone(), SqlType::BigInt).not_null(),
            service: spec.service,
            mappers,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Type tag
    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    /// Short name
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// Table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Primary-key column name
    pub fn id_column(&self) -> &str {
        &self.id_column.name
    }

    /// Version column name
    pub fn version_column(&self) -> &str {
        &self.version_column.name
    }

    /// Check whether objects of this type survive session resets
    pub fn is_service(&self) -> bool {
        self.service
    }

    /// Field mappers in declaration order
    pub fn mappers(&self) -> &[FieldMapper] {
        &self.mappers
    }

    /// Mapper for an association
    ///
    /// # Errors
    ///
    /// `UnknownAssociation` if the type declares no such association.
    pub fn mapper(&self, association: &str) -> Result<&FieldMapper> {
        self.mappers
            .iter()
            .find(|m| m.association() == association)
            .ok_or_else(|| Error::UnknownAssociation {
                object_type: self.object_type.clone(),
                association: association.to_string(),
            })
    }

    /// Collection mapper for an association
    ///
    /// # Errors
    ///
    /// `UnknownAssociation` if the type declares no such collection.
    pub fn collection(&self, association: &str) -> Result<&CollectionMapper> {
        self.mapper(association)?
            .as_collection()
            .ok_or_else(|| Error::UnknownAssociation {
                object_type: self.object_type.clone(),
                association: association.to_string(),
            })
    }

    /// Owned collection mappers
    pub fn collections(&self) -> impl Iterator<Item = &CollectionMapper> {
        self.mappers.iter().filter_map(FieldMapper::as_collection)
    }

    /// Columns selected when loading an object: id, version, then one column
    /// per value or reference association
    pub fn select_columns(&self) -> Vec<String> {
        let mut columns = vec![self.id_column.name.clone(), self.version_column.name.clone()];
        columns.extend(self.mappers.iter().filter_map(|m| m.owner_column().map(|c| c.name.clone())));
        columns
    }

    // =========================================================================
    // Schema
    // =========================================================================

    /// `CREATE TABLE` for this type's own columns
    ///
    /// Foreign-key columns of owning collections are added afterwards by the
    /// owners' collection mappers.
    pub fn table_definition(&self) -> Statement {
        let mut columns = vec![self.id_column.clone(), self.version_column.clone()];
        columns.extend(self.mappers.iter().filter_map(|m| m.owner_column().cloned()));
        Statement::CreateTable {
            table: self.table.clone(),
            columns,
        }
    }

    /// Create the table if it does not exist
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` if the table cannot be created.
    pub fn create_table(&self, ctx: &MapperContext<'_>) -> Result<bool> {
        if ctx.has_table(&self.table)? {
            return Ok(false);
        }
        ctx.execute(&self.table_definition())
            .map_err(|e| Error::schema_mismatch(&self.table, "*", e.to_string()))?;
        info!(target: "oidmap::schema", table = %self.table, object_type = %self.object_type, "Table created");
        Ok(true)
    }

    /// Let every mapper add the columns it is missing
    ///
    /// Returns the number of columns created.
    pub fn create_columns(&self, ctx: &MapperContext<'_>) -> Result<usize> {
        let mut created = 0;
        for mapper in &self.mappers {
            if mapper.needs_schema_change(ctx)? && mapper.create_columns(ctx)? {
                created += 1;
            }
        }
        Ok(created)
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Load one object's row into its adapter
    ///
    /// Returns `false` without touching the database if the adapter is
    /// transient or already loaded or loading. A missing row leaves the
    /// adapter a ghost and fails with `ObjectNotFound`.
    pub fn resolve(&self, ctx: &MapperContext<'_>, session: &mut Session, handle: AdapterHandle) -> Result<bool> {
        let oid = session.adapter(handle)?.oid().clone();
        if oid.is_transient() || !oid.is_root() {
            return Ok(false);
        }
        if !session.adapter_mut(handle)?.begin_resolving() {
            return Ok(false);
        }
        match self.fetch_and_populate(ctx, session, handle, &oid) {
            Ok(()) => {
                session.adapter_mut(handle)?.end_resolving();
                self.materialise_collections(session, handle)?;
                Ok(true)
            }
            Err(e) => {
                if let Ok(adapter) = session.adapter_mut(handle) {
                    adapter.abort_resolving();
                }
                Err(e)
            }
        }
    }

    fn fetch_and_populate(
        &self,
        ctx: &MapperContext<'_>,
        session: &mut Session,
        handle: AdapterHandle,
        oid: &Oid,
    ) -> Result<()> {
        let statement = Statement::select(&self.table, self.select_columns())
            .filter(self.id_column.name.clone(), oid.root().key());
        let mut cursor = ctx.select(&statement)?;
        let row = cursor.next_row();
        cursor.close();
        match row? {
            Some(row) => self.populate(ctx, session, handle, &row),
            None => Err(Error::ObjectNotFound(oid.to_string())),
        }
    }

    /// Adapter for one row of this type's table, loaded unless it already is
    ///
    /// The adapter is found (or created) through the identity maps, so an
    /// object that was already loaded keeps its in-memory fields.
    pub fn load_row(&self, ctx: &MapperContext<'_>, session: &mut Session, row: &Row) -> Result<AdapterHandle> {
        let key = match row.get(&self.id_column.name) {
            Some(Value::Text(key)) => key.clone(),
            Some(Value::Int(key)) => key.to_string(),
            _ => {
                return Err(Error::schema_mismatch(
                    &self.table,
                    &self.id_column.name,
                    "row has no usable primary key",
                ))
            }
        };
        let version = capture_lock(row, &self.version_column.name)?;
        let oid = Oid::persistent(self.object_type.as_str(), key)?.with_version(version.sequence);
        let handle = session.ghost(oid, self.service)?;

        if session.adapter_mut(handle)?.begin_resolving() {
            if let Err(e) = self.populate(ctx, session, handle, row) {
                if let Ok(adapter) = session.adapter_mut(handle) {
                    adapter.abort_resolving();
                }
                return Err(e);
            }
            session.adapter_mut(handle)?.end_resolving();
            self.materialise_collections(session, handle)?;
        }
        Ok(handle)
    }

    fn populate(&self, ctx: &MapperContext<'_>, session: &mut Session, handle: AdapterHandle, row: &Row) -> Result<()> {
        let version = capture_lock(row, &self.version_column.name)?;
        let mut fields = Vec::with_capacity(self.mappers.len());
        for mapper in &self.mappers {
            if let Some(value) = mapper.read(ctx, session, row)? {
                fields.push((mapper.association().to_string(), value));
            }
        }
        let adapter = session.adapter_mut(handle)?;
        let oid = adapter.oid().to_string();
        let object = adapter
            .object_mut()
            .ok_or_else(|| Error::invalid_operation(format!("{} is a collection", oid)))?;
        for (name, value) in fields {
            object.set(name, value);
        }
        adapter.set_version(version);
        Ok(())
    }

    /// Create ghost adapters for the collections of a freshly resolved owner
    pub fn materialise_collections(&self, session: &mut Session, owner: AdapterHandle) -> Result<()> {
        let (root, retain) = {
            let adapter = session.adapter(owner)?;
            (adapter.oid().root().clone(), adapter.retains_across_reset())
        };
        for collection in self.collections() {
            session.ghost_collection(&root, collection.association(), retain)?;
        }
        Ok(())
    }

    // =========================================================================
    // Writing
    // =========================================================================

    /// Column assignments for the object's value and reference fields
    pub fn row_values(&self, session: &Session, handle: AdapterHandle) -> Result<Vec<(String, Value)>> {
        let adapter = session.adapter(handle)?;
        let object = adapter
            .object()
            .ok_or_else(|| Error::invalid_operation(format!("{} is a collection", adapter.oid())))?;
        let mut values = Vec::with_capacity(self.mappers.len());
        for mapper in &self.mappers {
            if let Some(assignment) = mapper.write(session, object)? {
                values.push(assignment);
            }
        }
        Ok(values)
    }

    /// `INSERT` the object's row with the given version
    pub fn insert(
        &self,
        ctx: &MapperContext<'_>,
        session: &Session,
        handle: AdapterHandle,
        version: &Version,
    ) -> Result<()> {
        let key = session.adapter(handle)?.oid().root().key().to_string();
        let mut values = vec![
            (self.id_column.name.clone(), Value::Text(key)),
            (self.version_column.name.clone(), version_value(version.sequence)?),
        ];
        values.extend(self.row_values(session, handle)?);
        ctx.execute(&Statement::Insert {
            table: self.table.clone(),
            values,
        })
    }

    /// `UPDATE` the object's row, writing `next` into the version column
    pub fn update(
        &self,
        ctx: &MapperContext<'_>,
        session: &Session,
        handle: AdapterHandle,
        next: &Version,
    ) -> Result<()> {
        let key = session.adapter(handle)?.oid().root().key().to_string();
        let mut set = self.row_values(session, handle)?;
        set.push((self.version_column.name.clone(), version_value(next.sequence)?));
        ctx.execute(&Statement::update(&self.table, set).filter(self.id_column.name.clone(), key))
    }

    /// Version the database holds for `key` right now; `None` if no row
    pub fn current_version(&self, ctx: &MapperContext<'_>, key: &str) -> Result<Option<Version>> {
        let statement = Statement::select(&self.table, vec![self.version_column.name.clone()])
            .filter(self.id_column.name.clone(), key);
        let mut cursor = ctx.select(&statement)?;
        let row = cursor.next_row();
        cursor.close();
        row?.map(|row| capture_lock(&row, &self.version_column.name)).transpose()
    }

    /// `DELETE` the row for `key`
    pub fn delete(&self, ctx: &MapperContext<'_>, key: &str) -> Result<()> {
        ctx.execute(&Statement::delete(&self.table).filter(self.id_column.name.clone(), key))
    }
}

/// Version column value for a sequence number
fn version_value(sequence: u64) -> Result<Value> {
    i64::try_from(sequence).map(Value::Int).map_err(|_| {
        Error::invalid_operation(format!(
            "version {} does not fit the version column",
            sequence
        ))
    })
}
