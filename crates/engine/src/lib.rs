//! Persistence engine for oidmap
//!
//! This crate maps domain objects onto relational tables:
//! - ObjectStore: make_persistent, resolve, save, destroy, schema creation
//! - Session: per-unit-of-work identity maps
//! - ObjectMapping / FieldMapper: one table per type, one mapper per association
//! - MapperConfig: column naming and key strategy, loaded from `oidmap.toml`
//! - Statement: the SQL dialect issued to the connector
//! - testing::MemoryConnector: in-memory connector for tests and fixtures
//!
//! The engine is the only component that talks to a
//! [`DatabaseConnector`](oidmap_core::DatabaseConnector). Identity maps and
//! resolve states live in `oidmap-storage`; version checks in
//! `oidmap-concurrency`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
pub mod keys;
pub mod mapper;
pub mod mapping;
pub mod registry;
pub mod session;
pub mod sql;
pub mod store;
pub mod testing;

pub use config::{KeyStrategy, MapperConfig, CONFIG_FILE_NAME};
pub use context::MapperContext;
pub use keys::{generator_for, KeyGenerator, SequenceKeyGenerator, UuidKeyGenerator};
pub use mapper::{CollectionMapper, FieldMapper, ReferenceMapper, ValueMapper};
pub use mapping::ObjectMapping;
pub use registry::MappingRegistry;
pub use session::Session;
pub use sql::{ColumnDef, SqlType, Statement};
pub use store::ObjectStore;
