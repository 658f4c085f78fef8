//! Database connector contract
//!
//! The mapping core never talks to a database driver directly. It builds
//! parameterless, fully-interpolated SQL strings and hands them to a
//! [`DatabaseConnector`]. Connector failures are reported as
//! [`ConnectorError`] and propagate through the core unchanged.
//!
//! All calls are synchronous and blocking from the core's point of view.

use crate::value::Value;
use thiserror::Error;

/// Result type alias for connector operations
pub type ConnectorResult<T> = std::result::Result<T, ConnectorError>;

/// Errors raised by connector implementations
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The statement was rejected or failed to execute
    #[error("Statement failed: {message} [{sql}]")]
    Statement {
        /// Statement text
        sql: String,
        /// Driver message
        message: String,
    },

    /// The connection is unusable
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement referenced a table that does not exist
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Statement referenced a column that does not exist
    #[error("Unknown column '{column}' in table '{table}'")]
    UnknownColumn {
        /// Table name
        table: String,
        /// Column name
        column: String,
    },
}

/// One row of a result set, columns in SELECT order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.columns.push((name.into(), value));
    }

    /// Builder-style column append
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value.into());
        self
    }

    /// Column value by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    /// Column names in order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check whether the row has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Row {
            columns: iter.into_iter().collect(),
        }
    }
}

/// Forward-only cursor over a result set
pub trait ResultCursor {
    /// Next row, or `None` when exhausted
    ///
    /// # Errors
    ///
    /// Returns an error if fetching the row fails.
    fn next_row(&mut self) -> ConnectorResult<Option<Row>>;

    /// Release the result set; further `next_row` calls return `None`
    fn close(&mut self);
}

/// Cursor over rows already materialised in memory
#[derive(Debug)]
pub struct VecCursor {
    rows: std::vec::IntoIter<Row>,
    closed: bool,
}

impl VecCursor {
    /// Create a cursor over the given rows
    pub fn new(rows: Vec<Row>) -> Self {
        VecCursor {
            rows: rows.into_iter(),
            closed: false,
        }
    }

    /// Check whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl ResultCursor for VecCursor {
    fn next_row(&mut self) -> ConnectorResult<Option<Row>> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.rows.next())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Thin abstraction over a relational database connection
///
/// Implementations execute exactly the SQL they are given. The core performs
/// no retries: whatever the connector returns is what the caller sees.
pub trait DatabaseConnector {
    /// Run a query and return a cursor over its rows
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    fn select(&self, sql: &str) -> ConnectorResult<Box<dyn ResultCursor>>;

    /// Run a data-modifying or DDL statement
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    fn update(&self, sql: &str) -> ConnectorResult<()>;

    /// Run an INSERT statement
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    fn insert(&self, sql: &str) -> ConnectorResult<()>;

    /// Check whether a table exists
    ///
    /// # Errors
    ///
    /// Returns an error if schema introspection fails.
    fn has_table(&self, table: &str) -> ConnectorResult<bool>;

    /// Check whether a table has a column
    ///
    /// # Errors
    ///
    /// Returns an error if schema introspection fails.
    fn has_column(&self, table: &str, column: &str) -> ConnectorResult<bool>;
}
