//! Identifier Tests
//!
//! Canonical text is the wire contract between sessions, rows and logs:
//! `TYPE:KEY`, `!TYPE:KEY`, `TYPE:KEY/association`.

use crate::common::*;
use proptest::prelude::*;

#[test]
fn persistent_identifier_excludes_version_from_text() {
    let oid = Oid::persistent("CUS", "123").unwrap().with_version(90807);
    assert_eq!(oid.to_string(), "CUS:123");
    assert_eq!(oid.version(), Some(90807));

    let parsed = Oid::parse("CUS:123").unwrap();
    assert_eq!(parsed, oid);
    assert_eq!(parsed.version(), None);
}

#[test]
fn transient_identifier_is_marked() {
    let oid = Oid::transient("CUS", "123").unwrap();
    assert_eq!(oid.to_string(), "!CUS:123");
    assert!(Oid::parse("!CUS:123").unwrap().is_transient());
    assert_ne!(oid, Oid::persistent("CUS", "123").unwrap());
}

#[test]
fn versions_do_not_affect_equality() {
    let v1 = Oid::parse("CUS:123@1").unwrap();
    let v2 = Oid::parse("CUS:123@2").unwrap();
    assert_eq!(v1, v2);
    assert_eq!(v1.version(), Some(1));
    assert_ne!(v1, Oid::parse("ORD:123").unwrap());
    assert_ne!(v1, Oid::parse("CUS:124").unwrap());
}

#[test]
fn parented_identifier_chains_after_owner() {
    let owner = Oid::persistent("CUS", "123").unwrap();
    let orders = Oid::parented(owner.root(), "orders").unwrap();
    assert_eq!(orders.to_string(), "CUS:123/orders");
    assert_eq!(orders.parent(), Some(owner.root()));
    assert_eq!(orders.association(), Some("orders"));
    assert_eq!(Oid::parse("CUS:123/orders").unwrap(), orders);
}

#[test]
fn malformed_text_is_rejected() {
    for text in ["", "CUS", ":123", "CUS:", "CUS:1:2", "CUS:123@x", "!"] {
        assert!(
            matches!(Oid::parse(text), Err(Error::MalformedIdentifier { .. })),
            "{:?} should not parse",
            text
        );
    }
}

#[test]
fn stored_references_use_canonical_text() {
    let t = TestStore::new();
    t.seed_customer("1", 1, "Ann");
    t.seed_order("10", "4.00", "1");
    let mut session = t.store.open_session();

    let order = t.load(&mut session, "ORD:10");
    let customer = session.object(order).unwrap().reference("customer").unwrap();
    assert_eq!(session.adapter(customer).unwrap().oid().to_string(), "CUS:1");
    assert_eq!(t.column("orders", "10", "customer"), Value::from("CUS:1"));
}

proptest! {
    #[test]
    fn canonical_text_round_trips(
        object_type in "[A-Z]{2,5}",
        key in "[a-z0-9_-]{1,12}",
        version in any::<u64>(),
        transient in any::<bool>(),
    ) {
        let oid = if transient {
            Oid::transient(object_type.as_str(), key.as_str()).unwrap()
        } else {
            Oid::persistent(object_type.as_str(), key.as_str()).unwrap().with_version(version)
        };
        let parsed = Oid::parse(&oid.to_string()).unwrap();
        prop_assert_eq!(&parsed, &oid);
        prop_assert_eq!(parsed.is_transient(), transient);

        let facet = Oid::parented(oid.root(), "items").unwrap();
        prop_assert_eq!(Oid::parse(&facet.to_string()).unwrap(), facet);
    }
}
