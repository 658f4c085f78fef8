//! Object Lifecycle Tests
//!
//! Transient → persistent → updated → destroyed, with the identity maps kept
//! in agreement at every step.

use crate::common::*;

#[test]
fn new_graph_with_back_references_is_stored_once() {
    let t = TestStore::new();
    let mut session = t.store.open_session();

    let customer = t.store.create_transient(&mut session, "CUS").unwrap();
    session.object_mut(customer).unwrap().set_value("name", "Ann");
    let orders = session.collection(customer, "orders").unwrap().unwrap();
    for total in ["1.25", "2.50"] {
        let order = t.store.create_transient(&mut session, "ORD").unwrap();
        let object = session.object_mut(order).unwrap();
        object.set_value("total", Value::decimal(total).unwrap());
        object.set_reference("customer", Some(customer));
        session.elements_mut(orders).unwrap().push(order);
    }

    t.store.make_persistent(&mut session, customer).unwrap();

    assert_eq!(t.db.rows("customer").len(), 1);
    assert_eq!(
        t.order_owners(),
        vec![
            ("2".to_string(), Value::from("CUS:1")),
            ("3".to_string(), Value::from("CUS:1")),
        ]
    );
    assert_eq!(t.column("orders", "2", "customer"), Value::from("CUS:1"));
    assert_eq!(t.column("orders", "3", "total"), Value::Decimal("2.50".to_string()));
    assert!(session.maps().check_consistency().is_ok());

    // A fresh session sees the same graph
    let mut other = t.store.open_session();
    let reloaded = t.load(&mut other, "CUS:1/orders");
    let elements = other.elements(reloaded).unwrap().to_vec();
    assert_eq!(elements.len(), 2);
    let owner = other.lookup(&Oid::parse("CUS:1").unwrap()).unwrap();
    assert_eq!(other.object(elements[0]).unwrap().reference("customer"), Some(owner));
}

#[test]
fn transient_identifiers_stay_inside_their_session() {
    let t = TestStore::new();
    let mut session = t.store.open_session();
    let customer = t.store.create_transient(&mut session, "CUS").unwrap();
    let transient = session.adapter(customer).unwrap().oid().clone();
    assert!(transient.is_transient());
    assert_eq!(t.store.get_object(&mut session, &transient).unwrap(), customer);

    let mut other = t.store.open_session();
    assert!(matches!(
        t.store.get_object(&mut other, &transient),
        Err(Error::ObjectNotFound(_))
    ));

    t.store.make_persistent(&mut session, customer).unwrap();
    assert_eq!(session.lookup(&transient), None);
    assert!(matches!(
        t.store.create_transient(&mut session, "EMP"),
        Err(Error::UnknownType(_))
    ));
}

#[test]
fn redundant_resolve_triggers_are_no_ops() {
    let t = TestStore::new();
    t.seed_customer("123", 1, "Ann");
    let mut session = t.store.open_session();
    let customer = t
        .store
        .get_object(&mut session, &Oid::parse("CUS:123").unwrap())
        .unwrap();

    // A load already in flight: further triggers change nothing
    assert!(session.adapter_mut(customer).unwrap().begin_resolving());
    t.take_statements();
    assert!(!t.store.resolve(&mut session, customer).unwrap());
    assert!(t.take_statements().is_empty());
    assert!(session.adapter_mut(customer).unwrap().abort_resolving());

    assert!(t.store.resolve(&mut session, customer).unwrap());
    session.object_mut(customer).unwrap().set_value("name", "Edited");
    assert!(!t.store.resolve(&mut session, customer).unwrap());
    assert_eq!(
        session.object(customer).unwrap().value("name"),
        Some(&Value::from("Edited"))
    );
}

#[test]
fn destroy_detaches_elements_and_forgets_the_object() {
    let t = TestStore::new();
    t.seed_customer("123", 1, "Ann");
    t.seed_order("a", "1.00", "123");
    let mut session = t.store.open_session();
    let customer = t.load(&mut session, "CUS:123");
    let orders = t.load(&mut session, "CUS:123/orders");

    t.store.destroy(&mut session, customer).unwrap();

    assert!(t.db.rows("customer").is_empty());
    assert_eq!(t.column("orders", "a", "fk_customer_orders"), Value::Null);
    assert!(matches!(session.adapter(customer), Err(Error::StaleHandle(_))));
    assert!(matches!(session.adapter(orders), Err(Error::StaleHandle(_))));
    assert!(session.maps().check_consistency().is_ok());

    // The order survives as an independent object
    let order = session.lookup(&Oid::parse("ORD:a").unwrap()).unwrap();
    assert_eq!(state(&session, order), ResolveState::Resolved);
}

#[test]
fn reset_keeps_only_service_objects() {
    let t = TestStore::new();
    t.seed_customer("123", 1, "Ann");
    t.db
        .insert("INSERT INTO cfg (_id, _version, label) VALUES ('main', 1, 'defaults')")
        .unwrap();
    let mut session = t.store.open_session();
    let settings = t.load(&mut session, "CFG:main");
    t.load(&mut session, "CUS:123");
    let scratch = t.store.create_transient(&mut session, "CUS").unwrap();

    session.reset();

    assert_eq!(session.maps().len(), 1);
    assert_eq!(session.lookup(&Oid::parse("CFG:main").unwrap()), Some(settings));
    assert_eq!(session.lookup(&Oid::parse("CUS:123").unwrap()), None);
    assert!(session.adapter(scratch).is_err());

    // The retained adapter is still loaded; no query needed
    t.take_statements();
    assert!(!t.store.resolve(&mut session, settings).unwrap());
    assert!(t.take_statements().is_empty());
    session.close();
}
