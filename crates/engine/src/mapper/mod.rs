//! Field and collection mappers
//!
//! Each declared association of an object type is handled by exactly one
//! mapper. The set of mapper kinds is closed:
//!
//! | Variant | Storage |
//! |---------|---------|
//! | [`FieldMapper::Value`] | one typed column in the owner's table |
//! | [`FieldMapper::Reference`] | one identifier-text column in the owner's table |
//! | [`FieldMapper::Collection`] | a foreign-key column in the element table |
//!
//! Callers dispatch through [`FieldMapper`]; operations that do not apply to
//! a variant are no-ops for it.

mod collection;
mod reference;
mod value;

pub use collection::CollectionMapper;
pub use reference::ReferenceMapper;
pub use value::ValueMapper;

use crate::context::MapperContext;
use crate::session::Session;
use crate::sql::{ColumnDef, Statement};
use oidmap_core::{AdapterHandle, DomainObject, Error, FieldValue, Result, Row, Value};
use tracing::info;

/// Mapper for one declared association
#[derive(Debug, Clone, PartialEq)]
pub enum FieldMapper {
    /// Embedded scalar value
    Value(ValueMapper),
    /// Single-valued reference to another entity
    Reference(ReferenceMapper),
    /// Owned collection
    Collection(CollectionMapper),
}

impl FieldMapper {
    /// Association name
    pub fn association(&self) -> &str {
        match self {
            FieldMapper::Value(m) => m.association(),
            FieldMapper::Reference(m) => m.association(),
            FieldMapper::Collection(m) => m.association(),
        }
    }

    /// Column this mapper occupies in the owner's table, if any
    pub fn owner_column(&self) -> Option<&ColumnDef> {
        match self {
            FieldMapper::Value(m) => Some(m.column()),
            FieldMapper::Reference(m) => Some(m.column()),
            FieldMapper::Collection(_) => None,
        }
    }

    /// The collection mapper, if this is one
    pub fn as_collection(&self) -> Option<&CollectionMapper> {
        match self {
            FieldMapper::Collection(m) => Some(m),
            _ => None,
        }
    }

    /// Check whether a required column is missing
    ///
    /// # Errors
    ///
    /// Connector failures propagate unchanged.
    pub fn needs_schema_change(&self, ctx: &MapperContext<'_>) -> Result<bool> {
        match self {
            FieldMapper::Value(m) => m.needs_schema_change(ctx),
            FieldMapper::Reference(m) => m.needs_schema_change(ctx),
            FieldMapper::Collection(m) => m.needs_schema_change(ctx),
        }
    }

    /// Create missing columns; safe to call on every schema pass
    ///
    /// Returns whether DDL was issued.
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` if a column cannot be created.
    pub fn create_columns(&self, ctx: &MapperContext<'_>) -> Result<bool> {
        match self {
            FieldMapper::Value(m) => m.create_columns(ctx),
            FieldMapper::Reference(m) => m.create_columns(ctx),
            FieldMapper::Collection(m) => m.create_columns(ctx),
        }
    }

    /// Field value for the owner from its loaded row
    ///
    /// `None` for collections, which are loaded separately.
    pub fn read(
        &self,
        ctx: &MapperContext<'_>,
        session: &mut Session,
        row: &Row,
    ) -> Result<Option<FieldValue>> {
        match self {
            FieldMapper::Value(m) => m.read(row).map(Some),
            FieldMapper::Reference(m) => m.read(ctx, session, row).map(Some),
            FieldMapper::Collection(_) => Ok(None),
        }
    }

    /// Column assignment for the owner's row
    ///
    /// `None` for collections.
    pub fn write(&self, session: &Session, object: &DomainObject) -> Result<Option<(String, Value)>> {
        match self {
            FieldMapper::Value(m) => m.write(object).map(Some),
            FieldMapper::Reference(m) => m.write(session, object).map(Some),
            FieldMapper::Collection(_) => Ok(None),
        }
    }

    /// Load the owner's collection; `false` for non-collections
    pub fn load_collection(
        &self,
        ctx: &MapperContext<'_>,
        session: &mut Session,
        owner: AdapterHandle,
    ) -> Result<bool> {
        match self {
            FieldMapper::Collection(m) => m.load_collection(ctx, session, owner),
            _ => Ok(false),
        }
    }

    /// Save the owner's collection membership; `false` for non-collections
    pub fn save_collection(
        &self,
        ctx: &MapperContext<'_>,
        session: &mut Session,
        owner: AdapterHandle,
    ) -> Result<bool> {
        match self {
            FieldMapper::Collection(m) => m.save_collection(ctx, session, owner),
            _ => Ok(false),
        }
    }
}

/// Add `column` to `table` unless present
///
/// A column that cannot be created is fatal: the schema cannot heal itself.
pub(crate) fn ensure_column(ctx: &MapperContext<'_>, table: &str, column: &ColumnDef) -> Result<bool> {
    if ctx.has_column(table, &column.name)? {
        return Ok(false);
    }
    let statement = Statement::AddColumn {
        table: table.to_string(),
        column: column.clone(),
    };
    ctx.execute(&statement)
        .map_err(|e| Error::schema_mismatch(table, &column.name, e.to_string()))?;
    if !ctx.has_column(table, &column.name)? {
        return Err(Error::schema_mismatch(
            table,
            &column.name,
            "column still missing after ALTER TABLE",
        ));
    }
    info!(target: "oidmap::schema", table, column = %column, "Column added");
    Ok(true)
}
