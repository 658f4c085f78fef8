//! Configuration Tests
//!
//! An `oidmap.toml` next to the application drives column naming, table
//! prefixes and the key strategy.

use crate::common::*;
use oidmap::CONFIG_FILE_NAME;
use tempfile::TempDir;

#[test]
fn config_file_drives_naming() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(
        &path,
        r#"
id_column = "oid"
version_column = "lock"
foreign_key_prefix = "owner_"
table_prefix = "shop_"
key_strategy = "sequence"
"#,
    )
    .unwrap();

    let config = MapperConfig::from_file(&path).unwrap();
    let t = TestStore::with_config(config);
    assert_eq!(
        t.db.table_names(),
        vec!["shop_cfg", "shop_customer", "shop_orders"]
    );
    assert_eq!(
        t.db.columns("shop_orders").unwrap(),
        vec!["oid", "lock", "total", "customer", "owner_customer_orders"]
    );

    let mut session = t.store.open_session();
    let customer = t.store.create_transient(&mut session, "CUS").unwrap();
    let order = t.store.create_transient(&mut session, "ORD").unwrap();
    let orders = session.collection(customer, "orders").unwrap().unwrap();
    session.elements_mut(orders).unwrap().push(order);
    t.store.make_persistent(&mut session, customer).unwrap();

    let rows = t.db.rows("shop_orders");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("oid"), Some(&Value::from("2")));
    assert_eq!(rows[0].get("lock"), Some(&Value::Int(1)));
    assert_eq!(rows[0].get("owner_customer_orders"), Some(&Value::from("CUS:1")));
}

#[test]
fn default_file_is_written_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);

    MapperConfig::write_default_if_missing(&path).unwrap();
    assert_eq!(MapperConfig::from_file(&path).unwrap(), MapperConfig::default());

    let custom = MapperConfig {
        table_prefix: "app_".to_string(),
        log_sql: false,
        ..MapperConfig::default()
    };
    custom.write_to_file(&path).unwrap();
    MapperConfig::write_default_if_missing(&path).unwrap();
    assert_eq!(MapperConfig::from_file(&path).unwrap(), custom);
}

#[test]
fn invalid_file_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);

    std::fs::write(&path, "id_column = \"same\"\nversion_column = \"same\"\n").unwrap();
    assert!(matches!(MapperConfig::from_file(&path), Err(Error::Config(_))));

    std::fs::write(&path, "key_strategy = [").unwrap();
    assert!(matches!(MapperConfig::from_file(&path), Err(Error::Config(_))));

    let missing = dir.path().join("absent.toml");
    assert!(matches!(MapperConfig::from_file(&missing), Err(Error::Config(_))));
}
