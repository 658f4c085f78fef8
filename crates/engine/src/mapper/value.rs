//! Embedded-value mapper
//!
//! An embedded value occupies one column of the owner's table, named after
//! the association. The column type comes from the value kind and the facets
//! of the value type and the association, combined restrictively.

use super::ensure_column;
use crate::config::MapperConfig;
use crate::context::MapperContext;
use crate::sql::{ColumnDef, SqlType};
use oidmap_concurrency::combine;
use oidmap_core::{
    AssociationSpec, DomainObject, Error, FieldValue, Result, Row, Value, ValueKind, ValueType,
};

/// Mapper for one embedded scalar value
#[derive(Debug, Clone, PartialEq)]
pub struct ValueMapper {
    association: String,
    table: String,
    column: ColumnDef,
    kind: ValueKind,
}

impl ValueMapper {
    /// Build the mapper for `association` stored in `table`
    pub fn new(
        association: &AssociationSpec,
        value_type: &ValueType,
        table: &str,
        config: &MapperConfig,
    ) -> Self {
        let facets = combine(&value_type.facets, &association.facets);
        let sql_type = SqlType::for_value(value_type.kind, &facets, config.default_string_length);
        ValueMapper {
            association: association.name.clone(),
            table: table.to_string(),
            column: ColumnDef::new(association.name.clone(), sql_type),
            kind: value_type.kind,
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

    /// Declared value kind
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Check whether the owner's table lacks the column
    pub fn needs_schema_change(&self, ctx: &MapperContext<'_>) -> Result<bool> {
        Ok(!ctx.has_column(&self.table, &self.column.name)?)
    }

    /// Add the column if it is missing
    pub fn create_columns(&self, ctx: &MapperContext<'_>) -> Result<bool> {
        ensure_column(ctx, &self.table, &self.column)
    }

    /// Field value held by a loaded row
    ///
    /// Integers are accepted for decimal columns (some databases report whole
    /// decimals that way).
    pub fn read(&self, row: &Row) -> Result<FieldValue> {
        let value = row.get(&self.column.name).ok_or_else(|| {
            Error::schema_mismatch(&self.table, &self.column.name, "column missing from result")
        })?;
        let value = match (self.kind, value) {
            (ValueKind::Decimal, Value::Int(i)) => Value::Decimal(i.to_string()),
            (_, v) if fits(self.kind, v) => v.clone(),
            (_, v) => {
                return Err(Error::schema_mismatch(
                    &self.table,
                    &self.column.name,
                    format!("expected {:?}, found {} value", self.kind, v.type_name()),
                ))
            }
        };
        Ok(FieldValue::Value(value))
    }

    /// Column assignment for the object's current field value
    ///
    /// An unset field is written as `NULL`.
    pub fn write(&self, object: &DomainObject) -> Result<(String, Value)> {
        let value = object.value(&self.association).cloned().unwrap_or(Value::Null);
        if !fits(self.kind, &value) {
            return Err(Error::invalid_operation(format!(
                "field '{}' holds {} value, declared {:?}",
                self.association,
                value.type_name(),
                self.kind
            )));
        }
        Ok((self.column.name.clone(), value))
    }
}

fn fits(kind: ValueKind, value: &Value) -> bool {
    matches!(
        (kind, value),
        (_, Value::Null)
            | (ValueKind::Bool, Value::Bool(_))
            | (ValueKind::Int, Value::Int(_))
            | (ValueKind::Decimal, Value::Decimal(_))
            | (ValueKind::Text, Value::Text(_))
    )
}
