//! Shared test utilities for all integration test suites.
//!
//! Import via `#[macro_use] mod common;` from any test's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod sqlite;

pub use oidmap::testing::MemoryConnector;
pub use oidmap::{
    AdapterHandle, AssociationSpec, ColumnFacets, DatabaseConnector, Error, MapperConfig,
    ObjectSpec, ObjectStore, Oid, ResolveState, Row, Session, SpecRegistry, Value, ValueType,
    Version,
};
pub use sqlite::SqliteConnector;
use std::sync::{Arc, Once};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output (SQL, schema, session events) to the test harness
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Config with deterministic keys
pub fn sequence_config() -> MapperConfig {
    MapperConfig {
        key_strategy: "sequence".to_string(),
        ..MapperConfig::default()
    }
}

/// Customers own orders; orders point back at their customer; settings are a
/// service type that outlives session resets.
pub fn shop_metadata() -> SpecRegistry {
    SpecRegistry::new()
        .with(
            ObjectSpec::new("CUS")
                .with_short_name("Customer")
                .with(
                    AssociationSpec::value("name", ValueType::text())
                        .with_facets(ColumnFacets::max_length(40)),
                )
                .with(AssociationSpec::collection("orders", "ORD")),
        )
        .with(
            ObjectSpec::new("ORD")
                .with_short_name("Orders")
                .with(AssociationSpec::value("total", ValueType::decimal(10, 2)))
                .with(AssociationSpec::reference("customer", "CUS")),
        )
        .with(
            ObjectSpec::new("CFG")
                .as_service()
                .with(AssociationSpec::value("label", ValueType::text())),
        )
}

// ============================================================================
// TestDatabase - connectors the suites run against
// ============================================================================

/// Connector plus the inspection hooks the suites assert with
pub trait TestDatabase: DatabaseConnector + Clone + 'static {
    /// Fresh, empty database
    fn open() -> Self;
    /// Every row of a table in insertion order
    fn rows(&self, table: &str) -> Vec<Row>;
    /// Column names of a table; `None` if it does not exist
    fn columns(&self, table: &str) -> Option<Vec<String>>;
    /// Table names, sorted
    fn table_names(&self) -> Vec<String>;
    /// Statements issued so far
    fn statements(&self) -> Vec<String>;
    /// Forget the statement log
    fn clear_statements(&self);
}

impl TestDatabase for MemoryConnector {
    fn open() -> Self {
        MemoryConnector::new()
    }

    fn rows(&self, table: &str) -> Vec<Row> {
        MemoryConnector::rows(self, table)
    }

    fn columns(&self, table: &str) -> Option<Vec<String>> {
        MemoryConnector::columns(self, table)
    }

    fn table_names(&self) -> Vec<String> {
        MemoryConnector::table_names(self)
    }

    fn statements(&self) -> Vec<String> {
        MemoryConnector::statements(self)
    }

    fn clear_statements(&self) {
        MemoryConnector::clear_statements(self)
    }
}

impl TestDatabase for SqliteConnector {
    fn open() -> Self {
        SqliteConnector::new()
    }

    fn rows(&self, table: &str) -> Vec<Row> {
        SqliteConnector::rows(self, table)
    }

    fn columns(&self, table: &str) -> Option<Vec<String>> {
        SqliteConnector::columns(self, table)
    }

    fn table_names(&self) -> Vec<String> {
        SqliteConnector::table_names(self)
    }

    fn statements(&self) -> Vec<String> {
        SqliteConnector::statements(self)
    }

    fn clear_statements(&self) {
        SqliteConnector::clear_statements(self)
    }
}

/// Run generic test functions once per connector
///
/// Each named `fn name<D: TestDatabase>()` becomes `memory::name` and
/// `sqlite::name`.
macro_rules! on_every_database {
    ($($test:ident),+ $(,)?) => {
        mod memory {
            $(
                #[test]
                fn $test() {
                    super::$test::<$crate::common::MemoryConnector>();
                }
            )+
        }

        mod sqlite {
            $(
                #[test]
                fn $test() {
                    super::$test::<$crate::common::SqliteConnector>();
                }
            )+
        }
    };
}

// ============================================================================
// TestStore - store over a shared test database
// ============================================================================

/// Object store wired to a shared test database
pub struct TestStore<D: TestDatabase = MemoryConnector> {
    pub db: D,
    pub store: ObjectStore,
}

impl TestStore {
    /// Shop schema, sequence keys, tables created, in-memory database
    pub fn new() -> Self {
        Self::with_config(sequence_config())
    }

    /// Shop schema with the given config, tables created, in-memory database
    pub fn with_config(config: MapperConfig) -> Self {
        Self::on(MemoryConnector::new(), config)
    }
}

impl<D: TestDatabase> TestStore<D> {
    /// Shop schema, sequence keys, tables created, fresh database of type `D`
    pub fn open() -> Self {
        Self::on(D::open(), sequence_config())
    }

    /// Shop schema with the given config over `db`, tables created
    pub fn on(db: D, config: MapperConfig) -> Self {
        init_tracing();
        let store = ObjectStore::new(Box::new(db.clone()), Arc::new(shop_metadata()), config)
            .expect("store");
        store.init_schema().expect("schema");
        TestStore { db, store }
    }

    /// Insert a customer row
    pub fn seed_customer(&self, key: &str, version: u64, name: &str) {
        self.db
            .insert(&format!(
                "INSERT INTO customer (_id, _version, name) VALUES ('{}', {}, '{}')",
                key, version, name
            ))
            .expect("seed customer");
    }

    /// Insert an order row owned by `CUS:<owner>`
    pub fn seed_order(&self, key: &str, total: &str, owner: &str) {
        self.db
            .insert(&format!(
                "INSERT INTO orders (_id, _version, total, customer, fk_customer_orders) VALUES ('{}', 1, {}, 'CUS:{}', 'CUS:{}')",
                key, total, owner, owner
            ))
            .expect("seed order");
    }

    /// Load `TYPE:KEY` into the session
    pub fn load(&self, session: &mut Session, oid: &str) -> AdapterHandle {
        let oid = Oid::parse(oid).expect("identifier");
        self.store.load(session, &oid).expect("load")
    }

    /// Value of one column of one row
    pub fn column(&self, table: &str, key: &str, column: &str) -> Value {
        self.db
            .rows(table)
            .into_iter()
            .find(|row| row.get("_id") == Some(&Value::from(key)))
            .and_then(|row| row.get(column).cloned())
            .unwrap_or_else(|| panic!("no row {} in {}", key, table))
    }

    /// Foreign-key column of every order row, by key
    pub fn order_owners(&self) -> Vec<(String, Value)> {
        self.db
            .rows("orders")
            .into_iter()
            .map(|row| {
                let key = row.get("_id").and_then(Value::as_str).unwrap_or_default().to_string();
                let owner = row.get("fk_customer_orders").cloned().unwrap_or(Value::Null);
                (key, owner)
            })
            .collect()
    }

    /// Statements issued since the last call, then forget them
    pub fn take_statements(&self) -> Vec<String> {
        let statements = self.db.statements();
        self.db.clear_statements();
        statements
    }
}

/// Resolve state of an adapter
pub fn state(session: &Session, handle: AdapterHandle) -> ResolveState {
    session.adapter(handle).expect("adapter").state()
}

/// Primary key of an adapter's identifier
pub fn key_of(session: &Session, handle: AdapterHandle) -> String {
    session.adapter(handle).expect("adapter").oid().root().key().to_string()
}
