//! SQL statement builder
//!
//! The core only ever issues parameterless, fully-interpolated statements it
//! builds itself. This module is the single place where those strings are
//! produced, so the dialect is small and fixed:
//!
//! ```text
//! CREATE TABLE t (c1 TYPE [PRIMARY KEY] [NOT NULL], ...)
//! ALTER TABLE t ADD COLUMN c TYPE
//! SELECT c1, c2 FROM t [WHERE a = v [AND b = w ...]]
//! INSERT INTO t (c1, c2) VALUES (v1, v2)
//! UPDATE t SET c1 = v1, c2 = v2 [WHERE ...]
//! DELETE FROM t [WHERE ...]
//! ```
//!
//! Values are rendered with [`Value::to_sql_literal`].

use oidmap_core::{ColumnFacets, Value, ValueKind};
use std::fmt;

// =============================================================================
// Column types
// =============================================================================

/// Column type of the emitted dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    /// `BOOLEAN`
    Boolean,
    /// `BIGINT`
    BigInt,
    /// `DECIMAL(p,s)`, or plain `DECIMAL` without facets
    Decimal(Option<(u32, u32)>),
    /// `VARCHAR(n)`
    Varchar(u32),
}

impl SqlType {
    /// Column type for a value kind under the given (already combined) facets
    pub fn for_value(kind: ValueKind, facets: &ColumnFacets, default_string_length: u32) -> Self {
        match kind {
            ValueKind::Bool => SqlType::Boolean,
            ValueKind::Int => SqlType::BigInt,
            ValueKind::Decimal => match facets.digits {
                Some(digits) => SqlType::Decimal(Some((digits, facets.scale.unwrap_or(0).min(digits)))),
                None => SqlType::Decimal(None),
            },
            ValueKind::Text => SqlType::Varchar(facets.max_length.unwrap_or(default_string_length)),
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Boolean => f.write_str("BOOLEAN"),
            SqlType::BigInt => f.write_str("BIGINT"),
            SqlType::Decimal(Some((digits, scale))) => write!(f, "DECIMAL({},{})", digits, scale),
            SqlType::Decimal(None) => f.write_str("DECIMAL"),
            SqlType::Varchar(n) => write!(f, "VARCHAR({})", n),
        }
    }
}

/// Column definition used by `CREATE TABLE` and `ALTER TABLE`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Column type
    pub sql_type: SqlType,
    /// Primary-key column
    pub primary_key: bool,
    /// `NOT NULL` constraint
    pub not_null: bool,
}

impl ColumnDef {
    /// Nullable column
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        ColumnDef {
            name: name.into(),
            sql_type,
            primary_key: false,
            not_null: false,
        }
    }

    /// Primary-key column
    pub fn primary_key(name: impl Into<String>, sql_type: SqlType) -> Self {
        ColumnDef {
            primary_key: true,
            ..ColumnDef::new(name, sql_type)
        }
    }

    /// Add a `NOT NULL` constraint
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }
}

impl fmt::Display for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.sql_type)?;
        if self.primary_key {
            f.write_str(" PRIMARY KEY")?;
        }
        if self.not_null {
            f.write_str(" NOT NULL")?;
        }
        Ok(())
    }
}

// =============================================================================
// Statements
// =============================================================================

/// One statement of the emitted dialect
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `CREATE TABLE`
    CreateTable {
        /// Table name
        table: String,
        /// Column definitions, in order
        columns: Vec<ColumnDef>,
    },
    /// `ALTER TABLE ... ADD COLUMN`
    AddColumn {
        /// Table name
        table: String,
        /// New column
        column: ColumnDef,
    },
    /// `SELECT`
    Select {
        /// Table name
        table: String,
        /// Selected columns, in result order
        columns: Vec<String>,
        /// Equality filters joined by `AND`
        filter: Vec<(String, Value)>,
    },
    /// `INSERT`
    Insert {
        /// Table name
        table: String,
        /// Column/value pairs
        values: Vec<(String, Value)>,
    },
    /// `UPDATE`
    Update {
        /// Table name
        table: String,
        /// Assignments
        set: Vec<(String, Value)>,
        /// Equality filters joined by `AND`
        filter: Vec<(String, Value)>,
    },
    /// `DELETE`
    Delete {
        /// Table name
        table: String,
        /// Equality filters joined by `AND`
        filter: Vec<(String, Value)>,
    },
}

impl Statement {
    /// `SELECT columns FROM table`
    pub fn select(table: impl Into<String>, columns: Vec<String>) -> Self {
        Statement::Select {
            table: table.into(),
            columns,
            filter: Vec::new(),
        }
    }

    /// `UPDATE table SET ...`
    pub fn update(table: impl Into<String>, set: Vec<(String, Value)>) -> Self {
        Statement::Update {
            table: table.into(),
            set,
            filter: Vec::new(),
        }
    }

    /// `DELETE FROM table`
    pub fn delete(table: impl Into<String>) -> Self {
        Statement::Delete {
            table: table.into(),
            filter: Vec::new(),
        }
    }

    /// Add an equality filter
    ///
    /// Ignored by statements without a `WHERE` clause.
    #[must_use]
    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        match &mut self {
            Statement::Select { filter, .. }
            | Statement::Update { filter, .. }
            | Statement::Delete { filter, .. } => filter.push((column.into(), value.into())),
            _ => {}
        }
        self
    }

    /// Table the statement targets
    pub fn table(&self) -> &str {
        match self {
            Statement::CreateTable { table, .. }
            | Statement::AddColumn { table, .. }
            | Statement::Select { table, .. }
            | Statement::Insert { table, .. }
            | Statement::Update { table, .. }
            | Statement::Delete { table, .. } => table,
        }
    }
}

fn write_filter(f: &mut fmt::Formatter<'_>, filter: &[(String, Value)]) -> fmt::Result {
    for (i, (column, value)) in filter.iter().enumerate() {
        f.write_str(if i == 0 { " WHERE " } else { " AND " })?;
        write!(f, "{} = {}", column, value.to_sql_literal())?;
    }
    Ok(())
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::CreateTable { table, columns } => {
                let defs: Vec<String> = columns.iter().map(ToString::to_string).collect();
                write!(f, "CREATE TABLE {} ({})", table, defs.join(", "))
            }
            Statement::AddColumn { table, column } => {
                write!(f, "ALTER TABLE {} ADD COLUMN {}", table, column)
            }
            Statement::Select {
                table,
                columns,
                filter,
            } => {
                write!(f, "SELECT {} FROM {}", columns.join(", "), table)?;
                write_filter(f, filter)
            }
            Statement::Insert { table, values } => {
                let names: Vec<&str> = values.iter().map(|(c, _)| c.as_str()).collect();
                let literals: Vec<String> = values.iter().map(|(_, v)| v.to_sql_literal()).collect();
                write!(
                    f,
                    "INSERT INTO {} ({}) VALUES ({})",
                    table,
                    names.join(", "),
                    literals.join(", ")
                )
            }
            Statement::Update { table, set, filter } => {
                let assignments: Vec<String> = set
                    .iter()
                    .map(|(c, v)| format!("{} = {}", c, v.to_sql_literal()))
                    .collect();
                write!(f, "UPDATE {} SET {}", table, assignments.join(", "))?;
                write_filter(f, filter)
            }
            Statement::Delete { table, filter } => {
                write!(f, "DELETE FROM {}", table)?;
                write_filter(f, filter)
            }
        }
    }
}
