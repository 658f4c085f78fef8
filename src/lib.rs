//! oidmap - object identity and persistence mapping
//!
//! oidmap keeps exactly one in-memory adapter per stored object within a
//! session, loads objects lazily through a small resolve-state machine, maps
//! declared associations onto relational columns and guards every write with
//! an optimistic version check.
//!
//! # Quick Start
//!
//! ```
//! use oidmap::testing::MemoryConnector;
//! use oidmap::{AssociationSpec, MapperConfig, ObjectSpec, ObjectStore, SpecRegistry, ValueType};
//! use std::sync::Arc;
//!
//! let metadata = SpecRegistry::new()
//!     .with(ObjectSpec::new("CUS").with(AssociationSpec::value("name", ValueType::text())));
//! let db = MemoryConnector::new();
//! let store = ObjectStore::new(Box::new(db.clone()), Arc::new(metadata), MapperConfig::default())?;
//! store.init_schema()?;
//!
//! let mut session = store.open_session();
//! let customer = store.create_transient(&mut session, "CUS")?;
//! session.object_mut(customer)?.set_value("name", "Ann");
//! store.make_persistent(&mut session, customer)?;
//! assert_eq!(db.rows("cus").len(), 1);
//! # Ok::<(), oidmap::Error>(())
//! ```
//!
//! # Architecture
//!
//! | Crate | Role |
//! |-------|------|
//! | [`oidmap_core`] | identifiers, versions, values, metadata and connector contracts, errors |
//! | [`oidmap_storage`] | object adapters, resolve states, identity maps |
//! | [`oidmap_concurrency`] | version checks, restrictive facet precedence |
//! | [`oidmap_engine`] | SQL, mappers, sessions, the object store, configuration |

pub use oidmap_concurrency;
pub use oidmap_core;
pub use oidmap_engine;
pub use oidmap_storage;

pub use oidmap_core::{
    AdapterHandle, AssociationKind, AssociationSpec, ColumnFacets, ConnectorError,
    ConnectorResult, DatabaseConnector, DomainObject, Error, FieldValue, MetadataProvider,
    ObjectId, ObjectSpec, Oid, ParentedOid, Result, ResultCursor, RootOid, Row, SpecRegistry,
    Value, ValueKind, ValueType, Version,
};
pub use oidmap_engine::{testing, KeyStrategy, MapperConfig, ObjectStore, Session, CONFIG_FILE_NAME};
pub use oidmap_storage::{IdentityMaps, ObjectAdapter, ResolveState};
