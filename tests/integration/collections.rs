//! Collection Tests
//!
//! Owned collections load lazily from the element table (foreign key = owner
//! identifier) and save by detaching every row of the owner, then relinking
//! the in-memory elements.

use crate::common::*;
use oidmap::oidmap_engine::MapperContext;

on_every_database!(
    three_matching_rows_load_in_row_order,
    loading_through_the_collection_identifier,
    elements_pointing_back_at_the_owner_do_not_reload_it,
    save_collection_twice_matches_saving_once,
    save_issues_detach_then_one_relink_per_element,
    moving_an_element_between_owners,
    foreign_elements_are_rejected_before_any_write,
);

fn shop_with_three_orders<D: TestDatabase>() -> TestStore<D> {
    let t = TestStore::<D>::open();
    t.seed_customer("123", 1, "Ann");
    t.seed_order("a", "1.00", "123");
    t.seed_order("b", "2.00", "124");
    t.seed_order("c", "3.00", "123");
    t.seed_order("d", "4.00", "123");
    t.take_statements();
    t
}

fn three_matching_rows_load_in_row_order<D: TestDatabase>() {
    let t = shop_with_three_orders::<D>();
    let mut session = t.store.open_session();
    let customer = t.load(&mut session, "CUS:123");

    assert!(t.store.load_collection(&mut session, customer, "orders").unwrap());
    let orders = session.collection(customer, "orders").unwrap().unwrap();
    let keys: Vec<String> = session
        .elements(orders)
        .unwrap()
        .iter()
        .map(|h| key_of(&session, *h))
        .collect();
    assert_eq!(keys, vec!["a", "c", "d"]);

    // Already resolved: no query, nothing changes
    t.take_statements();
    let before = session.elements(orders).unwrap().to_vec();
    assert!(!t.store.load_collection(&mut session, customer, "orders").unwrap());
    assert!(t.take_statements().is_empty());
    assert_eq!(session.elements(orders).unwrap(), before.as_slice());
}

fn loading_through_the_collection_identifier<D: TestDatabase>() {
    let t = shop_with_three_orders::<D>();
    let mut session = t.store.open_session();

    let orders = t.load(&mut session, "CUS:123/orders");
    assert_eq!(state(&session, orders), ResolveState::Resolved);
    assert_eq!(session.elements(orders).unwrap().len(), 3);

    let customer = session.lookup(&Oid::parse("CUS:123").unwrap()).unwrap();
    assert_eq!(state(&session, customer), ResolveState::Resolved);
}

fn elements_pointing_back_at_the_owner_do_not_reload_it<D: TestDatabase>() {
    let t = shop_with_three_orders::<D>();
    let mut session = t.store.open_session();
    let customer = t.load(&mut session, "CUS:123");
    session.object_mut(customer).unwrap().set_value("name", "Changed in memory");

    t.store.load_collection(&mut session, customer, "orders").unwrap();
    let orders = session.collection(customer, "orders").unwrap().unwrap();
    for order in session.elements(orders).unwrap() {
        assert_eq!(session.object(*order).unwrap().reference("customer"), Some(customer));
    }
    assert_eq!(
        session.object(customer).unwrap().value("name"),
        Some(&Value::from("Changed in memory"))
    );
    let owner_loads = t
        .take_statements()
        .iter()
        .filter(|sql| sql.starts_with("SELECT") && sql.contains("FROM customer"))
        .count();
    assert_eq!(owner_loads, 0);
}

fn save_collection_twice_matches_saving_once<D: TestDatabase>() {
    let t = shop_with_three_orders::<D>();
    let mut session = t.store.open_session();
    let customer = t.load(&mut session, "CUS:123");
    t.store.load_collection(&mut session, customer, "orders").unwrap();

    let orders = session.collection(customer, "orders").unwrap().unwrap();
    session.elements_mut(orders).unwrap().remove(0);

    let ctx = MapperContext::new(&t.db, t.store.registry(), t.store.config());
    let mapper = t.store.registry().mapping("CUS").unwrap().collection("orders").unwrap();

    assert!(mapper.save_collection(&ctx, &mut session, customer).unwrap());
    let once = t.order_owners();
    assert!(mapper.save_collection(&ctx, &mut session, customer).unwrap());
    assert_eq!(t.order_owners(), once);

    assert_eq!(
        once,
        vec![
            ("a".to_string(), Value::Null),
            ("b".to_string(), Value::from("CUS:124")),
            ("c".to_string(), Value::from("CUS:123")),
            ("d".to_string(), Value::from("CUS:123")),
        ]
    );
}

fn save_issues_detach_then_one_relink_per_element<D: TestDatabase>() {
    let t = shop_with_three_orders::<D>();
    let mut session = t.store.open_session();
    let customer = t.load(&mut session, "CUS:123");
    t.store.load_collection(&mut session, customer, "orders").unwrap();
    t.take_statements();

    t.store.save(&mut session, customer).unwrap();
    let updates: Vec<String> = t
        .take_statements()
        .into_iter()
        .filter(|sql| sql.starts_with("UPDATE orders"))
        .collect();
    assert_eq!(
        updates,
        vec![
            "UPDATE orders SET fk_customer_orders = NULL WHERE fk_customer_orders = 'CUS:123'",
            "UPDATE orders SET fk_customer_orders = 'CUS:123' WHERE _id = 'a'",
            "UPDATE orders SET fk_customer_orders = 'CUS:123' WHERE _id = 'c'",
            "UPDATE orders SET fk_customer_orders = 'CUS:123' WHERE _id = 'd'",
        ]
    );
}

fn moving_an_element_between_owners<D: TestDatabase>() {
    let t = shop_with_three_orders::<D>();
    t.seed_customer("124", 1, "Bob");
    let mut session = t.store.open_session();
    let ann = t.load(&mut session, "CUS:123");
    let bob = t.load(&mut session, "CUS:124");
    t.store.load_collection(&mut session, ann, "orders").unwrap();
    t.store.load_collection(&mut session, bob, "orders").unwrap();

    let ann_orders = session.collection(ann, "orders").unwrap().unwrap();
    let bob_orders = session.collection(bob, "orders").unwrap().unwrap();
    let moved = session.elements_mut(ann_orders).unwrap().pop().unwrap();
    session.elements_mut(bob_orders).unwrap().push(moved);

    t.store.save(&mut session, ann).unwrap();
    t.store.save(&mut session, bob).unwrap();

    assert_eq!(t.column("orders", "d", "fk_customer_orders"), Value::from("CUS:124"));
    assert_eq!(t.column("orders", "b", "fk_customer_orders"), Value::from("CUS:124"));
    assert_eq!(t.column("orders", "a", "fk_customer_orders"), Value::from("CUS:123"));
}

fn foreign_elements_are_rejected_before_any_write<D: TestDatabase>() {
    let t = shop_with_three_orders::<D>();
    t.seed_customer("x", 1, "Not an order");
    t.seed_order("x", "9.00", "999");
    let mut session = t.store.open_session();
    let customer = t.load(&mut session, "CUS:123");
    let stranger = t.load(&mut session, "CUS:x");
    t.store.load_collection(&mut session, customer, "orders").unwrap();
    let orders = session.collection(customer, "orders").unwrap().unwrap();
    session.elements_mut(orders).unwrap().push(stranger);
    t.take_statements();

    let err = t.store.save(&mut session, customer).unwrap_err();
    assert!(matches!(err, Error::InvalidOperation(_)), "{err:?}");

    let ctx = MapperContext::new(&t.db, t.store.registry(), t.store.config());
    let mapper = t.store.registry().mapping("CUS").unwrap().collection("orders").unwrap();
    let err = mapper.save_collection(&ctx, &mut session, customer).unwrap_err();
    assert!(matches!(err, Error::InvalidOperation(_)), "{err:?}");

    assert!(t.take_statements().iter().all(|sql| !sql.starts_with("UPDATE")));
    assert_eq!(t.column("orders", "x", "fk_customer_orders"), Value::from("CUS:999"));
    assert_eq!(t.column("orders", "a", "fk_customer_orders"), Value::from("CUS:123"));
    assert_eq!(t.column("customer", "123", "_version"), Value::Int(1));
}
