//! Optimistic Concurrency Tests
//!
//! Every UPDATE and DELETE is preceded by a read of the row's version. A
//! mismatch aborts the write before anything reaches the database.

use crate::common::*;

on_every_database!(
    stale_version_never_reaches_update,
    first_writer_wins_across_sessions,
    destroy_checks_the_version_too,
    sequential_saves_bump_the_version,
    refresh_after_conflict_picks_up_the_other_writers_elements,
);

fn stale_version_never_reaches_update<D: TestDatabase>() {
    let t = TestStore::<D>::open();
    t.seed_customer("123", 1, "Ann");
    let mut session = t.store.open_session();
    let customer = t.load(&mut session, "CUS:123");
    assert_eq!(session.adapter(customer).unwrap().version(), Some(&Version::new(1)));

    // Another writer got there first
    t.db
        .update("UPDATE customer SET _version = 2 WHERE _id = '123'")
        .unwrap();
    t.take_statements();

    session.object_mut(customer).unwrap().set_value("name", "Bea");
    let err = t.store.save(&mut session, customer).unwrap_err();
    assert!(err.is_recoverable());
    assert!(matches!(err, Error::Concurrency { held: 1, current: 2, .. }));

    let issued = t.take_statements();
    assert_eq!(issued, vec!["SELECT _version FROM customer WHERE _id = '123'"]);
    assert_eq!(t.column("customer", "123", "name"), Value::from("Ann"));
}

fn first_writer_wins_across_sessions<D: TestDatabase>() {
    let t = TestStore::<D>::open();
    t.seed_customer("123", 1, "Ann");
    let mut alice = t.store.open_session_as("alice");
    let mut bob = t.store.open_session_as("bob");
    let a = t.load(&mut alice, "CUS:123");
    let b = t.load(&mut bob, "CUS:123");

    alice.object_mut(a).unwrap().set_value("name", "Alice's edit");
    bob.object_mut(b).unwrap().set_value("name", "Bob's edit");

    t.store.save(&mut alice, a).unwrap();
    let version = alice.adapter(a).unwrap().version().unwrap();
    assert_eq!(version.sequence, 2);
    assert_eq!(version.user.as_deref(), Some("alice"));
    assert!(version.time.is_some());

    assert!(matches!(
        t.store.save(&mut bob, b),
        Err(Error::Concurrency { .. })
    ));
    assert_eq!(t.column("customer", "123", "name"), Value::from("Alice's edit"));

    // Reload, reapply, retry
    t.store.refresh(&mut bob, b).unwrap();
    bob.object_mut(b).unwrap().set_value("name", "Bob's edit");
    t.store.save(&mut bob, b).unwrap();
    assert_eq!(t.column("customer", "123", "name"), Value::from("Bob's edit"));
    assert_eq!(t.column("customer", "123", "_version"), Value::Int(3));
}

fn destroy_checks_the_version_too<D: TestDatabase>() {
    let t = TestStore::<D>::open();
    t.seed_customer("123", 1, "Ann");
    let mut session = t.store.open_session();
    let customer = t.load(&mut session, "CUS:123");

    t.db
        .update("UPDATE customer SET _version = 5 WHERE _id = '123'")
        .unwrap();
    assert!(matches!(
        t.store.destroy(&mut session, customer),
        Err(Error::Concurrency { held: 1, current: 5, .. })
    ));
    assert_eq!(t.db.rows("customer").len(), 1);
    assert_eq!(state(&session, customer), ResolveState::Resolved);
}

fn sequential_saves_bump_the_version<D: TestDatabase>() {
    let t = TestStore::<D>::open();
    t.seed_customer("123", 7, "Ann");
    let mut session = t.store.open_session();
    let customer = t.load(&mut session, "CUS:123");

    for expected in 8..=10 {
        t.store.save(&mut session, customer).unwrap();
        assert_eq!(t.column("customer", "123", "_version"), Value::Int(expected));
    }
}

fn refresh_after_conflict_picks_up_the_other_writers_elements<D: TestDatabase>() {
    let t = TestStore::<D>::open();
    t.seed_customer("1", 1, "Ann");
    t.seed_customer("2", 1, "Bob");
    t.seed_order("a", "1.00", "1");
    t.seed_order("b", "2.00", "2");
    let mut session = t.store.open_session();
    let customer = t.load(&mut session, "CUS:1");
    t.store.load_collection(&mut session, customer, "orders").unwrap();
    let orders = session.collection(customer, "orders").unwrap().unwrap();
    assert_eq!(session.elements(orders).unwrap().len(), 1);

    // Another writer moves b over to customer 1
    t.db
        .update("UPDATE orders SET fk_customer_orders = 'CUS:1' WHERE _id = 'b'")
        .unwrap();
    t.db
        .update("UPDATE customer SET _version = 2 WHERE _id = '1'")
        .unwrap();

    session.object_mut(customer).unwrap().set_value("name", "Ann B.");
    assert!(matches!(
        t.store.save(&mut session, customer),
        Err(Error::Concurrency { held: 1, current: 2, .. })
    ));

    assert!(t.store.refresh(&mut session, customer).unwrap());
    assert_eq!(state(&session, orders), ResolveState::Resolved);
    let keys: Vec<String> = session
        .elements(orders)
        .unwrap()
        .iter()
        .map(|h| key_of(&session, *h))
        .collect();
    assert_eq!(keys, vec!["a", "b"]);

    session.object_mut(customer).unwrap().set_value("name", "Ann B.");
    t.store.save(&mut session, customer).unwrap();
    assert_eq!(t.column("orders", "a", "fk_customer_orders"), Value::from("CUS:1"));
    assert_eq!(t.column("orders", "b", "fk_customer_orders"), Value::from("CUS:1"));
    assert_eq!(t.column("customer", "1", "name"), Value::from("Ann B."));
    assert_eq!(t.column("customer", "1", "_version"), Value::Int(3));
}
