//! Restrictive precedence for combinable facets
//!
//! Several sources can constrain the same numeric facet of a column (the value
//! type declares a precision, the association narrows it). When both sides
//! set a value, the numerically smaller one wins; when only one side sets it,
//! that side wins unconditionally.

use oidmap_core::ColumnFacets;

/// Combine two optional settings, preferring the more restrictive one
pub fn combine_restrictive<T: Ord>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Combine type-level and association-level facets field by field
pub fn combine(type_facets: &ColumnFacets, association_facets: &ColumnFacets) -> ColumnFacets {
    ColumnFacets {
        max_length: combine_restrictive(type_facets.max_length, association_facets.max_length),
        digits: combine_restrictive(type_facets.digits, association_facets.digits),
        scale: combine_restrictive(type_facets.scale, association_facets.scale),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_smaller_wins() {
        assert_eq!(combine_restrictive(Some(10), Some(4)), Some(4));
        assert_eq!(combine_restrictive(Some(4), Some(10)), Some(4));
    }

    #[test]
    fn test_lone_setting_wins() {
        assert_eq!(combine_restrictive(Some(7), None), Some(7));
        assert_eq!(combine_restrictive(None, Some(7)), Some(7));
        assert_eq!(combine_restrictive::<u32>(None, None), None);
    }

    #[test]
    fn test_combine_facets() {
        let from_type = ColumnFacets::decimal(12, 4);
        let from_assoc = ColumnFacets {
            max_length: Some(20),
            digits: Some(8),
            scale: None,
        };
        let combined = combine(&from_type, &from_assoc);
        assert_eq!(combined.max_length, Some(20));
        assert_eq!(combined.digits, Some(8));
        assert_eq!(combined.scale, Some(4));
        assert_eq!(combine(&ColumnFacets::NONE, &ColumnFacets::NONE), ColumnFacets::NONE);
    }

    proptest! {
        #[test]
        fn prop_combine_is_commutative(a in proptest::option::of(0u32..100), b in proptest::option::of(0u32..100)) {
            prop_assert_eq!(combine_restrictive(a, b), combine_restrictive(b, a));
        }

        #[test]
        fn prop_result_never_looser(a in proptest::option::of(0u32..100), b in proptest::option::of(0u32..100)) {
            let c = combine_restrictive(a, b);
            if let Some(a) = a { prop_assert!(c.unwrap() <= a); }
            if let Some(b) = b { prop_assert!(c.unwrap() <= b); }
        }
    }
}
