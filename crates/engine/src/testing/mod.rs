//! Testing utilities for the mapping engine
//!
//! - **MemoryConnector**: In-memory reference connector interpreting exactly
//!   the SQL dialect the engine emits, recording every statement and able to
//!   inject a failure into the next one
//!
//! # Example
//!
//! ```ignore
//! use oidmap_engine::testing::MemoryConnector;
//!
//! let db = MemoryConnector::new();
//! let store = ObjectStore::new(Box::new(db.clone()), metadata, MapperConfig::default())?;
//! store.init_schema()?;
//! assert!(db.statements().iter().any(|s| s.starts_with("CREATE TABLE")));
//! ```

mod memory;

pub use memory::MemoryConnector;
