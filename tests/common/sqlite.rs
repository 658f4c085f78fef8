//! SQLite-backed connector
//!
//! Executes the engine's statements on an in-memory SQLite database, so the
//! emitted DDL and DML are checked by a real SQL engine. Column values are
//! converted back using the declared column types: `BOOLEAN` integers become
//! booleans and `DECIMAL(p,s)` numbers are rendered with `s` fraction digits.

use oidmap::oidmap_core::VecCursor;
use oidmap::{ConnectorError, ConnectorResult, DatabaseConnector, ResultCursor, Row, Value};
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::sync::Arc;

struct SqliteState {
    conn: Connection,
    statements: Vec<String>,
}

/// Shared handle to one in-memory SQLite database
///
/// Clones share the database and the statement log.
#[derive(Clone)]
pub struct SqliteConnector {
    state: Arc<Mutex<SqliteState>>,
}

impl SqliteConnector {
    /// Fresh, empty database
    pub fn new() -> Self {
        let conn = Connection::open_in_memory().expect("in-memory sqlite");
        SqliteConnector {
            state: Arc::new(Mutex::new(SqliteState {
                conn,
                statements: Vec::new(),
            })),
        }
    }

    /// Statements issued so far (table and column checks excluded), in order
    pub fn statements(&self) -> Vec<String> {
        self.state.lock().statements.clone()
    }

    /// Forget the statement log
    pub fn clear_statements(&self) {
        self.state.lock().statements.clear();
    }

    /// Table names, sorted
    pub fn table_names(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut stmt = state
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .expect("list tables");
        let names = stmt
            .query_map([], |row| row.get(0))
            .expect("list tables")
            .collect::<rusqlite::Result<Vec<String>>>()
            .expect("table name");
        names
    }

    /// Column names of a table in definition order; `None` if it does not exist
    pub fn columns(&self, table: &str) -> Option<Vec<String>> {
        let state = self.state.lock();
        let columns = declared_types(&state.conn, table).expect("table info");
        if columns.is_empty() {
            return None;
        }
        Some(columns.into_iter().map(|(name, _)| name).collect())
    }

    /// Every row of a table in insertion order
    pub fn rows(&self, table: &str) -> Vec<Row> {
        let state = self.state.lock();
        query(&state.conn, &format!("SELECT * FROM {} ORDER BY rowid", table)).expect("table rows")
    }

    fn execute(&self, sql: &str) -> ConnectorResult<()> {
        let mut state = self.state.lock();
        state.statements.push(sql.to_string());
        state
            .conn
            .execute(sql, [])
            .map(|_| ())
            .map_err(|e| failed(sql, e))
    }
}

impl Default for SqliteConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseConnector for SqliteConnector {
    fn select(&self, sql: &str) -> ConnectorResult<Box<dyn ResultCursor>> {
        let mut state = self.state.lock();
        state.statements.push(sql.to_string());
        let rows = query(&state.conn, sql).map_err(|e| failed(sql, e))?;
        Ok(Box::new(VecCursor::new(rows)))
    }

    fn update(&self, sql: &str) -> ConnectorResult<()> {
        self.execute(sql)
    }

    fn insert(&self, sql: &str) -> ConnectorResult<()> {
        if !sql.trim_start().to_ascii_uppercase().starts_with("INSERT") {
            return Err(ConnectorError::Statement {
                sql: sql.to_string(),
                message: "not an INSERT".to_string(),
            });
        }
        self.execute(sql)
    }

    fn has_table(&self, table: &str) -> ConnectorResult<bool> {
        let state = self.state.lock();
        let sql = "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1";
        state
            .conn
            .query_row(sql, [table], |row| row.get::<_, i64>(0))
            .map(|count| count > 0)
            .map_err(|e| failed(sql, e))
    }

    fn has_column(&self, table: &str, column: &str) -> ConnectorResult<bool> {
        let state = self.state.lock();
        let columns = declared_types(&state.conn, table).map_err(|e| failed("pragma_table_info", e))?;
        Ok(columns.iter().any(|(name, _)| name == column))
    }
}

fn failed(sql: &str, e: rusqlite::Error) -> ConnectorError {
    ConnectorError::Statement {
        sql: sql.to_string(),
        message: e.to_string(),
    }
}

/// `(column, declared type)` pairs of a table; empty if it does not exist
fn declared_types(conn: &Connection, table: &str) -> rusqlite::Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;
    let columns = stmt
        .query_map([table], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<(String, String)>>>();
    columns
}

/// Table named after the first `FROM` of a statement
fn table_of(sql: &str) -> Option<&str> {
    let mut words = sql.split_whitespace();
    words.by_ref().find(|word| word.eq_ignore_ascii_case("FROM"))?;
    words.next()
}

fn query(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<Row>> {
    let types = match table_of(sql) {
        Some(table) => declared_types(conn, table)?,
        None => Vec::new(),
    };
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let mut rows = stmt.query([])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        let mut converted = Row::new();
        for (i, name) in names.iter().enumerate() {
            let declared = types
                .iter()
                .find(|(column, _)| column == name)
                .map_or("", |(_, declared)| declared.as_str());
            converted.push(name.clone(), convert(row.get_ref(i)?, declared));
        }
        result.push(converted);
    }
    Ok(result)
}

fn convert(raw: ValueRef<'_>, declared: &str) -> Value {
    let declared = declared.to_ascii_uppercase();
    let decimal = declared.starts_with("DECIMAL");
    let scale = decimal_scale(&declared);
    match raw {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if declared == "BOOLEAN" => Value::Bool(i != 0),
        ValueRef::Integer(i) if decimal => match scale {
            Some(scale) if scale > 0 => Value::Decimal(format!("{}.{}", i, "0".repeat(scale))),
            _ => Value::Decimal(i.to_string()),
        },
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => match scale {
            Some(scale) => Value::Decimal(format!("{:.*}", scale, f)),
            None => Value::Decimal(f.to_string()),
        },
        ValueRef::Text(text) if decimal => Value::Decimal(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Text(text) | ValueRef::Blob(text) => {
            Value::Text(String::from_utf8_lossy(text).into_owned())
        }
    }
}

/// `s` of `DECIMAL(p,s)`
fn decimal_scale(declared: &str) -> Option<usize> {
    declared
        .strip_prefix("DECIMAL(")?
        .strip_suffix(')')?
        .split(',')
        .nth(1)?
        .trim()
        .parse()
        .ok()
}
