//! Scalar-reference mapper
//!
//! A reference to another entity occupies one text column of the owner's
//! table, named after the association, holding the target's canonical
//! identifier text (`TYPE:KEY`). Loading a reference never loads the target:
//! it yields the target's adapter, created as a ghost on a miss.

use super::ensure_column;
use crate::config::MapperConfig;
use crate::context::MapperContext;
use crate::session::Session;
use crate::sql::{ColumnDef, SqlType};
use oidmap_core::{AssociationSpec, DomainObject, Error, FieldValue, Oid, Result, Row, Value};

/// Mapper for one single-valued reference
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceMapper {
    association: String,
    table: String,
    column: ColumnDef,
    target: String,
}

impl ReferenceMapper {
    /// Build the mapper for `association` (declared target `target`) stored
    /// in `table`
    pub fn new(association: &AssociationSpec, target: &str, table: &str, config: &MapperConfig) -> Self {
        ReferenceMapper {
            association: association.name.clone(),
            table: table.to_string(),
            column: ColumnDef::new(
                association.name.clone(),
                SqlType::Varchar(config.default_string_length),
            ),
            target: target.to_string(),
        }
    }

    /// Association name
    pub fn association(&self) -> &str {
        &self.association
    }

    /// Column in the owner's table
    pub fn column(&self) -> &ColumnDef {
        &self.column
    }

    /// Declared target type tag
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Check whether the owner's table lacks the column
    pub fn needs_schema_change(&self, ctx: &MapperContext<'_>) -> Result<bool> {
        Ok(!ctx.has_column(&self.table, &self.column.name)?)
    }

    /// Add the column if it is missing
    pub fn create_columns(&self, ctx: &MapperContext<'_>) -> Result<bool> {
        ensure_column(ctx, &self.table, &self.column)
    }

    /// Target adapter named by a loaded row
    ///
    /// # Errors
    ///
    /// - `MalformedIdentifier` if the column holds unparsable or transient text
    /// - `SchemaMismatch` if the stored identifier is not of the declared
    ///   target type
    pub fn read(&self, ctx: &MapperContext<'_>, session: &mut Session, row: &Row) -> Result<FieldValue> {
        let text = match row.get(&self.column.name) {
            None => {
                return Err(Error::schema_mismatch(
                    &self.table,
                    &self.column.name,
                    "column missing from result",
                ))
            }
            Some(Value::Null) => return Ok(FieldValue::Reference(None)),
            Some(Value::Text(text)) => text,
            Some(other) => {
                return Err(Error::schema_mismatch(
                    &self.table,
                    &self.column.name,
                    format!("expected identifier text, found {} value", other.type_name()),
                ))
            }
        };
        let oid = Oid::parse(text)?;
        if oid.is_transient() || !oid.is_root() {
            return Err(Error::malformed(
                text.as_str(),
                "reference columns hold persistent root identifiers only",
            ));
        }
        if oid.object_type() != self.target {
            return Err(Error::schema_mismatch(
                &self.table,
                &self.column.name,
                format!("expected a {} identifier, found {}", self.target, oid),
            ));
        }
        let retain = ctx.registry().mapping(oid.object_type())?.is_service();
        let handle = session.ghost(oid, retain)?;
        Ok(FieldValue::Reference(Some(handle)))
    }

    /// Column assignment for the object's current reference
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if the target is still transient (it must be made
    /// persistent first) or is not of the declared target type,
    /// `StaleHandle` if the target adapter is gone.
    pub fn write(&self, session: &Session, object: &DomainObject) -> Result<(String, Value)> {
        let value = match object.reference(&self.association) {
            None => Value::Null,
            Some(target) => {
                let oid = session.adapter(target)?.oid();
                if oid.is_transient() {
                    return Err(Error::invalid_operation(format!(
                        "reference '{}' points at transient {}",
                        self.association, oid
                    )));
                }
                if oid.object_type() != self.target {
                    return Err(Error::invalid_operation(format!(
                        "reference '{}' points at {}; targets must be {}",
                        self.association, oid, self.target
                    )));
                }
                Value::Text(oid.to_string())
            }
        };
        Ok((self.column.name.clone(), value))
    }
}
