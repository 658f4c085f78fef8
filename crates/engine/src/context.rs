//! Statement execution context
//!
//! [`MapperContext`] bundles the collaborators a mapper needs for one call:
//! the database connector, the mapping registry (to find element and target
//! mappings) and the configuration. Every statement goes through it so that
//! SQL logging happens in one place.

use crate::config::MapperConfig;
use crate::registry::MappingRegistry;
use crate::sql::Statement;
use oidmap_core::{DatabaseConnector, Result, ResultCursor};
use tracing::debug;

/// Borrowed collaborators for one mapping operation
#[derive(Clone, Copy)]
pub struct MapperContext<'a> {
    connector: &'a dyn DatabaseConnector,
    registry: &'a MappingRegistry,
    config: &'a MapperConfig,
}

impl<'a> MapperContext<'a> {
    /// Bundle collaborators
    pub fn new(
        connector: &'a dyn DatabaseConnector,
        registry: &'a MappingRegistry,
        config: &'a MapperConfig,
    ) -> Self {
        MapperContext {
            connector,
            registry,
            config,
        }
    }

    /// Database connector
    pub fn connector(&self) -> &'a dyn DatabaseConnector {
        self.connector
    }

    /// Mapping registry
    pub fn registry(&self) -> &'a MappingRegistry {
        self.registry
    }

    /// Configuration
    pub fn config(&self) -> &'a MapperConfig {
        self.config
    }

    fn log(&self, sql: &str) {
        if self.config.log_sql {
            debug!(target: "oidmap::sql", "{}", sql);
        }
    }

    /// Run a `SELECT`
    ///
    /// # Errors
    ///
    /// Connector failures propagate unchanged.
    pub fn select(&self, statement: &Statement) -> Result<Box<dyn ResultCursor>> {
        let sql = statement.to_string();
        self.log(&sql);
        Ok(self.connector.select(&sql)?)
    }

    /// Run any non-query statement
    ///
    /// `INSERT` goes through the connector's insert entry point; everything
    /// else (DDL, `UPDATE`, `DELETE`) through update.
    ///
    /// # Errors
    ///
    /// Connector failures propagate unchanged.
    pub fn execute(&self, statement: &Statement) -> Result<()> {
        let sql = statement.to_string();
        self.log(&sql);
        match statement {
            Statement::Insert { .. } => self.connector.insert(&sql)?,
            _ => self.connector.update(&sql)?,
        }
        Ok(())
    }

    /// Check whether a table exists
    ///
    /// # Errors
    ///
    /// Connector failures propagate unchanged.
    pub fn has_table(&self, table: &str) -> Result<bool> {
        Ok(self.connector.has_table(table)?)
    }

    /// Check whether a table has a column
    ///
    /// # Errors
    ///
    /// Connector failures propagate unchanged.
    pub fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        Ok(self.connector.has_column(table, column)?)
    }
}
