//! Mapper configuration via `oidmap.toml`
//!
//! Column-naming conventions and key generation are read from a small config
//! file. A default `oidmap.toml` can be written on first use; to change
//! conventions, edit the file before the schema is created.

use oidmap_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "oidmap.toml";

/// How persistent keys are assigned to newly stored objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Random v4 UUIDs in simple (hyphen-less) form
    Uuid,
    /// Monotonic counter per store, starting at 1
    Sequence,
}

/// Mapper configuration loaded from `oidmap.toml`.
///
/// # Example
///
/// ```toml
/// id_column = "_id"
/// version_column = "_version"
/// foreign_key_prefix = "fk_"
/// table_prefix = "app_"
/// key_strategy = "sequence"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Primary-key column of every mapped table
    #[serde(default = "default_id_column")]
    pub id_column: String,
    /// Version (lock) column of every mapped table
    #[serde(default = "default_version_column")]
    pub version_column: String,
    /// Prefix of collection foreign-key columns
    #[serde(default = "default_foreign_key_prefix")]
    pub foreign_key_prefix: String,
    /// Prefix prepended to every table name
    #[serde(default)]
    pub table_prefix: String,
    /// Length of text columns that declare no `max_length`
    #[serde(default = "default_string_length")]
    pub default_string_length: u32,
    /// Log every issued SQL statement at debug level
    #[serde(default = "default_log_sql")]
    pub log_sql: bool,
    /// Key strategy: `"uuid"` or `"sequence"`
    #[serde(default = "default_key_strategy")]
    pub key_strategy: String,
}

fn default_id_column() -> String {
    "_id".to_string()
}

fn default_version_column() -> String {
    "_version".to_string()
}

fn default_foreign_key_prefix() -> String {
    "fk_".to_string()
}

fn default_string_length() -> u32 {
    255
}

fn default_log_sql() -> bool {
    true
}

fn default_key_strategy() -> String {
    "uuid".to_string()
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            id_column: default_id_column(),
            version_column: default_version_column(),
            foreign_key_prefix: default_foreign_key_prefix(),
            table_prefix: String::new(),
            default_string_length: default_string_length(),
            log_sql: default_log_sql(),
            key_strategy: default_key_strategy(),
        }
    }
}

impl MapperConfig {
    /// Parse the key strategy string
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the string is not `"uuid"` or `"sequence"`.
    pub fn key_strategy(&self) -> Result<KeyStrategy> {
        match self.key_strategy.as_str() {
            "uuid" => Ok(KeyStrategy::Uuid),
            "sequence" => Ok(KeyStrategy::Sequence),
            other => Err(Error::Config(format!(
                "Invalid key strategy '{}'. Expected \"uuid\" or \"sequence\".",
                other
            ))),
        }
    }

    /// Check every setting
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` on an unknown key strategy, an empty column
    /// name, clashing id/version columns, or a zero string length.
    pub fn validate(&self) -> Result<()> {
        self.key_strategy()?;
        for (what, name) in [
            ("id_column", &self.id_column),
            ("version_column", &self.version_column),
            ("foreign_key_prefix", &self.foreign_key_prefix),
        ] {
            if name.is_empty() {
                return Err(Error::Config(format!("{} must not be empty", what)));
            }
        }
        if self.id_column == self.version_column {
            return Err(Error::Config(format!(
                "id_column and version_column are both '{}'",
                self.id_column
            )));
        }
        if self.default_string_length == 0 {
            return Err(Error::Config(
                "default_string_length must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# oidmap mapper configuration
#
# Primary-key and version columns present in every mapped table
id_column = "_id"
version_column = "_version"

# Collection foreign keys are named <prefix><owner short name>_<association>
foreign_key_prefix = "fk_"

# Prepended to every table name (default: none)
table_prefix = ""

# Length of text columns without an explicit max_length
default_string_length = 255

# Log every SQL statement at debug level under the "oidmap::sql" target
log_sql = true

# Persistent key assignment: "uuid" (default) or "sequence"
key_strategy = "uuid"
"#
    }

    /// Parse config from TOML text
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the text cannot be parsed or is invalid.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: MapperConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: MapperConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
