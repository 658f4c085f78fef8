//! In-memory reference connector
//!
//! Interprets the statement dialect produced by [`crate::sql`]:
//! `CREATE TABLE`, `ALTER TABLE ... ADD COLUMN`, `SELECT`, `INSERT`,
//! `UPDATE` and `DELETE` with `=`/`AND` filters. Rows are kept in insertion
//! order, so `SELECT` results come back in that order. Comparison follows SQL:
//! `NULL` never equals anything.
//!
//! Clones share the same tables, so a test can hand one clone to the store and
//! inspect the other.

use oidmap_core::{
    ConnectorError, ConnectorResult, DatabaseConnector, ResultCursor, Row, Value, VecCursor,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

// =============================================================================
// Tokens
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Text(String),
    Number(String),
    LParen,
    RParen,
    Comma,
    Equals,
    Star,
}

fn tokenize(sql: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = sql.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' | ')' | ',' | '=' | '*' => {
                chars.next();
                tokens.push(match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    '=' => Token::Equals,
                    _ => Token::Star,
                });
            }
            '\'' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        None => return Err("unterminated string literal".to_string()),
                        Some('\'') if chars.peek() == Some(&'\'') => {
                            chars.next();
                            text.push('\'');
                        }
                        Some('\'') => break,
                        Some(ch) => text.push(ch),
                    }
                }
                tokens.push(Token::Text(text));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut number = String::new();
                number.push(c);
                chars.next();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        number.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if number == "-" {
                    return Err("dangling '-'".to_string());
                }
                tokens.push(Token::Number(number));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        word.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(word));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }
    Ok(tokens)
}

// =============================================================================
// Parser
// =============================================================================

type Filter = Vec<(String, Value)>;

#[derive(Debug, Clone, PartialEq)]
enum Command {
    CreateTable {
        table: String,
        columns: Vec<String>,
        primary_key: Option<String>,
    },
    AddColumn {
        table: String,
        column: String,
    },
    Select {
        table: String,
        columns: Option<Vec<String>>,
        filter: Filter,
    },
    Insert {
        table: String,
        columns: Vec<String>,
        values: Vec<Value>,
    },
    Update {
        table: String,
        set: Vec<(String, Value)>,
        filter: Filter,
    },
    Delete {
        table: String,
        filter: Filter,
    },
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn keyword(&mut self, keyword: &str) -> Result<(), String> {
        if self.at_keyword(keyword) {
            self.pos += 1;
            Ok(())
        } else {
            Err(format!("expected {}, found {:?}", keyword, self.peek()))
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), String> {
        match self.next() {
            Some(t) if t == token => Ok(()),
            other => Err(format!("expected {:?}, found {:?}", token, other)),
        }
    }

    fn ident(&mut self) -> Result<String, String> {
        match self.next() {
            Some(Token::Word(w)) => Ok(w),
            other => Err(format!("expected identifier, found {:?}", other)),
        }
    }

    fn literal(&mut self) -> Result<Value, String> {
        match self.next() {
            Some(Token::Text(s)) => Ok(Value::Text(s)),
            Some(Token::Number(n)) if n.contains('.') => {
                Value::decimal(n.clone()).ok_or_else(|| format!("bad decimal literal {}", n))
            }
            Some(Token::Number(n)) => n
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| format!("bad integer literal {}: {}", n, e)),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("NULL") => Ok(Value::Null),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("TRUE") => Ok(Value::Bool(true)),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("FALSE") => Ok(Value::Bool(false)),
            other => Err(format!("expected literal, found {:?}", other)),
        }
    }

    fn list<T>(&mut self, mut item: impl FnMut(&mut Self) -> Result<T, String>) -> Result<Vec<T>, String> {
        let mut items = vec![item(self)?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            items.push(item(self)?);
        }
        Ok(items)
    }

    fn assignment(&mut self) -> Result<(String, Value), String> {
        let column = self.ident()?;
        self.expect(Token::Equals)?;
        Ok((column, self.literal()?))
    }

    fn filter(&mut self) -> Result<Filter, String> {
        let mut filter = Vec::new();
        if self.at_keyword("WHERE") {
            self.pos += 1;
            filter.push(self.assignment()?);
            while self.at_keyword("AND") {
                self.pos += 1;
                filter.push(self.assignment()?);
            }
        }
        Ok(filter)
    }

    /// Column definitions of `CREATE TABLE`, after the opening parenthesis
    fn column_defs(&mut self) -> Result<(Vec<String>, Option<String>), String> {
        let mut columns = Vec::new();
        let mut primary_key = None;
        loop {
            let name = self.ident()?;
            let mut depth = 0usize;
            loop {
                match self.peek() {
                    None => return Err("unterminated column list".to_string()),
                    Some(Token::LParen) => depth += 1,
                    Some(Token::RParen) if depth == 0 => break,
                    Some(Token::RParen) => depth -= 1,
                    Some(Token::Comma) if depth == 0 => break,
                    Some(Token::Word(w)) if w.eq_ignore_ascii_case("PRIMARY") => {
                        primary_key = Some(name.clone())
                    }
                    _ => {}
                }
                self.pos += 1;
            }
            columns.push(name);
            if self.next() == Some(Token::RParen) {
                return Ok((columns, primary_key));
            }
        }
    }
}

fn parse(sql: &str) -> Result<Command, String> {
    let mut p = Parser {
        tokens: tokenize(sql)?,
        pos: 0,
    };
    let verb = p.ident()?.to_ascii_uppercase();
    let command = match verb.as_str() {
        "CREATE" => {
            p.keyword("TABLE")?;
            let table = p.ident()?;
            p.expect(Token::LParen)?;
            let (columns, primary_key) = p.column_defs()?;
            Command::CreateTable {
                table,
                columns,
                primary_key,
            }
        }
        "ALTER" => {
            p.keyword("TABLE")?;
            let table = p.ident()?;
            p.keyword("ADD")?;
            p.keyword("COLUMN")?;
            let column = p.ident()?;
            // Column type and constraints are not interpreted
            p.pos = p.tokens.len();
            Command::AddColumn { table, column }
        }
        "SELECT" => {
            let columns = if p.peek() == Some(&Token::Star) {
                p.pos += 1;
                None
            } else {
                Some(p.list(Parser::ident)?)
            };
            p.keyword("FROM")?;
            let table = p.ident()?;
            let filter = p.filter()?;
            Command::Select {
                table,
                columns,
                filter,
            }
        }
        "INSERT" => {
            p.keyword("INTO")?;
            let table = p.ident()?;
            p.expect(Token::LParen)?;
            let columns = p.list(Parser::ident)?;
            p.expect(Token::RParen)?;
            p.keyword("VALUES")?;
            p.expect(Token::LParen)?;
            let values = p.list(Parser::literal)?;
            p.expect(Token::RParen)?;
            if columns.len() != values.len() {
                return Err(format!(
                    "{} columns but {} values",
                    columns.len(),
                    values.len()
                ));
            }
            Command::Insert {
                table,
                columns,
                values,
            }
        }
        "UPDATE" => {
            let table = p.ident()?;
            p.keyword("SET")?;
            let set = p.list(Parser::assignment)?;
            let filter = p.filter()?;
            Command::Update { table, set, filter }
        }
        "DELETE" => {
            p.keyword("FROM")?;
            let table = p.ident()?;
            let filter = p.filter()?;
            Command::Delete { table, filter }
        }
        other => return Err(format!("unsupported statement {}", other)),
    };
    if p.pos < p.tokens.len() {
        return Err(format!("unexpected trailing {:?}", p.peek()));
    }
    Ok(command)
}

// =============================================================================
// Tables
// =============================================================================

#[derive(Debug, Clone, Default)]
struct Table {
    columns: Vec<String>,
    primary_key: Option<usize>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    fn index(&self, table: &str, column: &str) -> ConnectorResult<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| ConnectorError::UnknownColumn {
                table: table.to_string(),
                column: column.to_string(),
            })
    }

    fn bind(&self, table: &str, pairs: &[(String, Value)]) -> ConnectorResult<Vec<(usize, Value)>> {
        pairs
            .iter()
            .map(|(c, v)| Ok((self.index(table, c)?, v.clone())))
            .collect()
    }

    fn to_row(&self, values: &[Value], indexes: &[usize]) -> Row {
        indexes
            .iter()
            .map(|&i| (self.columns[i].clone(), values[i].clone()))
            .collect()
    }
}

fn matches(row: &[Value], filter: &[(usize, Value)]) -> bool {
    filter.iter().all(|(i, v)| !v.is_null() && &row[*i] == v)
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: BTreeMap<String, Table>,
    statements: Vec<String>,
    fail_next: Option<String>,
}

impl MemoryState {
    fn begin(&mut self, sql: &str) -> ConnectorResult<Command> {
        self.statements.push(sql.to_string());
        if let Some(message) = self.fail_next.take() {
            return Err(ConnectorError::Statement {
                sql: sql.to_string(),
                message,
            });
        }
        parse(sql).map_err(|message| ConnectorError::Statement {
            sql: sql.to_string(),
            message,
        })
    }

    fn table(&self, name: &str) -> ConnectorResult<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| ConnectorError::UnknownTable(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> ConnectorResult<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| ConnectorError::UnknownTable(name.to_string()))
    }

    fn query(&self, sql: &str, command: Command) -> ConnectorResult<Vec<Row>> {
        let Command::Select {
            table: name,
            columns,
            filter,
        } = command
        else {
            return Err(ConnectorError::Statement {
                sql: sql.to_string(),
                message: "not a query".to_string(),
            });
        };
        let table = self.table(&name)?;
        let indexes = match columns {
            None => (0..table.columns.len()).collect(),
            Some(columns) => columns
                .iter()
                .map(|c| table.index(&name, c))
                .collect::<ConnectorResult<Vec<_>>>()?,
        };
        let filter = table.bind(&name, &filter)?;
        Ok(table
            .rows
            .iter()
            .filter(|row| matches(row, &filter))
            .map(|row| table.to_row(row, &indexes))
            .collect())
    }

    fn apply(&mut self, sql: &str, command: Command) -> ConnectorResult<()> {
        let fail = |message: String| ConnectorError::Statement {
            sql: sql.to_string(),
            message,
        };
        match command {
            Command::CreateTable {
                table,
                columns,
                primary_key,
            } => {
                if self.tables.contains_key(&table) {
                    return Err(fail(format!("table {} already exists", table)));
                }
                let primary_key = primary_key.and_then(|pk| columns.iter().position(|c| *c == pk));
                self.tables.insert(
                    table,
                    Table {
                        columns,
                        primary_key,
                        rows: Vec::new(),
                    },
                );
            }
            Command::AddColumn { table: name, column } => {
                let table = self.table_mut(&name)?;
                if table.columns.contains(&column) {
                    return Err(fail(format!("column {} already exists in {}", column, name)));
                }
                table.columns.push(column);
                table.rows.iter_mut().for_each(|row| row.push(Value::Null));
            }
            Command::Insert {
                table: name,
                columns,
                values,
            } => {
                let table = self.table_mut(&name)?;
                let mut row = vec![Value::Null; table.columns.len()];
                for (column, value) in columns.iter().zip(values) {
                    row[table.index(&name, column)?] = value;
                }
                if let Some(pk) = table.primary_key {
                    if row[pk].is_null() || table.rows.iter().any(|r| r[pk] == row[pk]) {
                        return Err(fail(format!("primary key violation in {}", name)));
                    }
                }
                table.rows.push(row);
            }
            Command::Update {
                table: name,
                set,
                filter,
            } => {
                let table = self.table_mut(&name)?;
                let set = table.bind(&name, &set)?;
                let filter = table.bind(&name, &filter)?;
                for row in table.rows.iter_mut().filter(|row| matches(row, &filter)) {
                    for (i, value) in &set {
                        row[*i] = value.clone();
                    }
                }
            }
            Command::Delete {
                table: name,
                filter,
            } => {
                let table = self.table_mut(&name)?;
                let filter = table.bind(&name, &filter)?;
                table.rows.retain(|row| !matches(row, &filter));
            }
            Command::Select { .. } => {
                return Err(fail("queries go through select".to_string()));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Connector
// =============================================================================

/// In-memory database speaking the engine's SQL dialect
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnector {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Every statement issued so far (table and column checks excluded), in order
    pub fn statements(&self) -> Vec<String> {
        self.state.lock().statements.clone()
    }

    /// Forget recorded statements
    pub fn clear_statements(&self) {
        self.state.lock().statements.clear();
    }

    /// Make the next statement fail with `message`
    pub fn fail_next(&self, message: impl Into<String>) {
        self.state.lock().fail_next = Some(message.into());
    }

    /// Table names, sorted
    pub fn table_names(&self) -> Vec<String> {
        self.state.lock().tables.keys().cloned().collect()
    }

    /// Column names of a table, in definition order
    pub fn columns(&self, table: &str) -> Option<Vec<String>> {
        self.state.lock().tables.get(table).map(|t| t.columns.clone())
    }

    /// All rows of a table with every column, in insertion order
    pub fn rows(&self, table: &str) -> Vec<Row> {
        let state = self.state.lock();
        match state.tables.get(table) {
            Some(t) => {
                let all: Vec<usize> = (0..t.columns.len()).collect();
                t.rows.iter().map(|row| t.to_row(row, &all)).collect()
            }
            None => Vec::new(),
        }
    }
}

impl DatabaseConnector for MemoryConnector {
    fn select(&self, sql: &str) -> ConnectorResult<Box<dyn ResultCursor>> {
        let mut state = self.state.lock();
        let command = state.begin(sql)?;
        let rows = state.query(sql, command)?;
        Ok(Box::new(VecCursor::new(rows)))
    }

    fn update(&self, sql: &str) -> ConnectorResult<()> {
        let mut state = self.state.lock();
        let command = state.begin(sql)?;
        state.apply(sql, command)
    }

    fn insert(&self, sql: &str) -> ConnectorResult<()> {
        let mut state = self.state.lock();
        let command = state.begin(sql)?;
        if !matches!(command, Command::Insert { .. }) {
            return Err(ConnectorError::Statement {
                sql: sql.to_string(),
                message: "not an INSERT".to_string(),
            });
        }
        state.apply(sql, command)
    }

    fn has_table(&self, table: &str) -> ConnectorResult<bool> {
        Ok(self.state.lock().tables.contains_key(table))
    }

    fn has_column(&self, table: &str, column: &str) -> ConnectorResult<bool> {
        Ok(self
            .state
            .lock()
            .tables
            .get(table)
            .is_some_and(|t| t.columns.iter().any(|c| c == column)))
    }
}
