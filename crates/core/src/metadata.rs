//! Metadata contract
//!
//! The mapping core does not discover metadata itself. A
//! [`MetadataProvider`] describes, for every object type, the associations
//! it declares: each association's logical short name (used to derive column
//! and foreign-key names) and its target kind (used to pick an identifier or
//! an embedded-value column layout).
//!
//! [`SpecRegistry`] is a plain in-memory provider.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Optional numeric facets constraining a value column
///
/// Facets can be declared by a value type and again by an association using
/// it; the two are combined with the restrictive precedence rule (smaller
/// wins, a lone setting wins unconditionally).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnFacets {
    /// Maximum text length
    pub max_length: Option<u32>,
    /// Total decimal digits (precision)
    pub digits: Option<u32>,
    /// Digits after the decimal point
    pub scale: Option<u32>,
}

impl ColumnFacets {
    /// No facets declared
    pub const NONE: ColumnFacets = ColumnFacets {
        max_length: None,
        digits: None,
        scale: None,
    };

    /// Facets declaring only a maximum length
    pub const fn max_length(n: u32) -> Self {
        ColumnFacets {
            max_length: Some(n),
            digits: None,
            scale: None,
        }
    }

    /// Facets declaring decimal precision and scale
    pub const fn decimal(digits: u32, scale: u32) -> Self {
        ColumnFacets {
            max_length: None,
            digits: Some(digits),
            scale: Some(scale),
        }
    }
}

/// Scalar kinds an embedded value can have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// Boolean
    Bool,
    /// 64-bit integer
    Int,
    /// Exact decimal
    Decimal,
    /// Text
    Text,
}

/// A value type together with the facets the type itself declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueType {
    /// Scalar kind
    pub kind: ValueKind,
    /// Facets declared by the type
    pub facets: ColumnFacets,
}

impl ValueType {
    /// Boolean value type
    pub const fn bool() -> Self {
        ValueType {
            kind: ValueKind::Bool,
            facets: ColumnFacets::NONE,
        }
    }

    /// Integer value type
    pub const fn int() -> Self {
        ValueType {
            kind: ValueKind::Int,
            facets: ColumnFacets::NONE,
        }
    }

    /// Unbounded text value type
    pub const fn text() -> Self {
        ValueType {
            kind: ValueKind::Text,
            facets: ColumnFacets::NONE,
        }
    }

    /// Decimal value type with type-level precision and scale
    pub const fn decimal(digits: u32, scale: u32) -> Self {
        ValueType {
            kind: ValueKind::Decimal,
            facets: ColumnFacets::decimal(digits, scale),
        }
    }

    /// Replace the type-level facets
    #[must_use]
    pub fn with_facets(mut self, facets: ColumnFacets) -> Self {
        self.facets = facets;
        self
    }
}

/// What an association points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssociationKind {
    /// Embedded scalar value stored in the owner's row
    Value(ValueType),
    /// Reference to another entity, stored as the target's identifier text
    Reference {
        /// Declared target type tag
        target: String,
    },
    /// Owned collection; elements carry a foreign key back to the owner
    Collection {
        /// Element type tag
        element: String,
    },
}

/// One declared association of an object type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationSpec {
    /// Logical short name
    pub name: String,
    /// Target kind
    pub kind: AssociationKind,
    /// Facets declared on the association itself
    pub facets: ColumnFacets,
}

impl AssociationSpec {
    /// Embedded value association
    pub fn value(name: impl Into<String>, value_type: ValueType) -> Self {
        AssociationSpec {
            name: name.into(),
            kind: AssociationKind::Value(value_type),
            facets: ColumnFacets::NONE,
        }
    }

    /// Single-valued reference association
    pub fn reference(name: impl Into<String>, target: impl Into<String>) -> Self {
        AssociationSpec {
            name: name.into(),
            kind: AssociationKind::Reference {
                target: target.into(),
            },
            facets: ColumnFacets::NONE,
        }
    }

    /// Owned collection association
    pub fn collection(name: impl Into<String>, element: impl Into<String>) -> Self {
        AssociationSpec {
            name: name.into(),
            kind: AssociationKind::Collection {
                element: element.into(),
            },
            facets: ColumnFacets::NONE,
        }
    }

    /// Attach association-level facets
    #[must_use]
    pub fn with_facets(mut self, facets: ColumnFacets) -> Self {
        self.facets = facets;
        self
    }

    /// Check whether this is an owned collection
    pub fn is_collection(&self) -> bool {
        matches!(self.kind, AssociationKind::Collection { .. })
    }
}

/// Description of one object type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSpec {
    /// Logical type tag used in identifiers
    pub object_type: String,
    /// Short name used to derive the table name
    pub short_name: String,
    /// Declared associations, in declaration order
    pub associations: Vec<AssociationSpec>,
    /// Service-like singletons survive identity-map resets
    pub service: bool,
}

impl ObjectSpec {
    /// Create a spec with no associations; the short name defaults to the
    /// lower-cased type tag
    pub fn new(object_type: impl Into<String>) -> Self {
        let object_type = object_type.into();
        ObjectSpec {
            short_name: object_type.to_lowercase(),
            object_type,
            associations: Vec::new(),
            service: false,
        }
    }

    /// Override the short name
    #[must_use]
    pub fn with_short_name(mut self, short_name: impl Into<String>) -> Self {
        self.short_name = short_name.into();
        self
    }

    /// Append an association
    #[must_use]
    pub fn with(mut self, association: AssociationSpec) -> Self {
        self.associations.push(association);
        self
    }

    /// Mark the type as a service-like singleton
    #[must_use]
    pub fn as_service(mut self) -> Self {
        self.service = true;
        self
    }

    /// Association by name
    pub fn association(&self, name: &str) -> Option<&AssociationSpec> {
        self.associations.iter().find(|a| a.name == name)
    }

    /// Owned collection associations
    pub fn collections(&self) -> impl Iterator<Item = &AssociationSpec> {
        self.associations.iter().filter(|a| a.is_collection())
    }
}

/// Source of object-type metadata
pub trait MetadataProvider: Send + Sync {
    /// Spec for a type tag
    fn object_spec(&self, object_type: &str) -> Option<&ObjectSpec>;

    /// All known type tags, in registration order
    fn object_types(&self) -> Vec<String>;
}

/// In-memory metadata provider
#[derive(Debug, Default, Clone)]
pub struct SpecRegistry {
    specs: FxHashMap<String, ObjectSpec>,
    order: Vec<String>,
}

impl SpecRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a spec
    pub fn register(&mut self, spec: ObjectSpec) {
        if !self.specs.contains_key(&spec.object_type) {
            self.order.push(spec.object_type.clone());
        }
        self.specs.insert(spec.object_type.clone(), spec);
    }

    /// Builder-style registration
    #[must_use]
    pub fn with(mut self, spec: ObjectSpec) -> Self {
        self.register(spec);
        self
    }

    /// Remove a spec by type tag
    pub fn unregister(&mut self, object_type: &str) -> Option<ObjectSpec> {
        self.order.retain(|t| t != object_type);
        self.specs.remove(object_type)
    }

    /// Number of registered specs
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl MetadataProvider for SpecRegistry {
    fn object_spec(&self, object_type: &str) -> Option<&ObjectSpec> {
        self.specs.get(object_type)
    }

    fn object_types(&self) -> Vec<String> {
        self.order.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> ObjectSpec {
        ObjectSpec::new("CUS")
            .with(AssociationSpec::value("name", ValueType::text()).with_facets(ColumnFacets::max_length(40)))
            .with(AssociationSpec::reference("address", "ADR"))
            .with(AssociationSpec::collection("orders", "ORD"))
    }

    #[test]
    fn test_object_spec_defaults() {
        let spec = customer();
        assert_eq!(spec.short_name, "cus");
        assert!(!spec.service);
        assert_eq!(spec.associations.len(), 3);
        assert_eq!(spec.collections().count(), 1);
        assert!(spec.association("orders").unwrap().is_collection());
        assert!(spec.association("nope").is_none());
    }

    #[test]
    fn test_registry_preserves_order() {
        let registry = SpecRegistry::new()
            .with(ObjectSpec::new("ORD"))
            .with(customer())
            .with(ObjectSpec::new("ORD").with_short_name("orders"));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.object_types(), vec!["ORD".to_string(), "CUS".to_string()]);
        assert_eq!(registry.object_spec("ORD").unwrap().short_name, "orders");
    }

    #[test]
    fn test_registry_unregister() {
        let mut registry = SpecRegistry::new().with(customer());
        assert!(registry.unregister("CUS").is_some());
        assert!(registry.is_empty());
        assert!(registry.object_types().is_empty());
        assert!(registry.unregister("CUS").is_none());
    }

    #[test]
    fn test_value_type_facets() {
        let money = ValueType::decimal(12, 2);
        assert_eq!(money.kind, ValueKind::Decimal);
        assert_eq!(money.facets.digits, Some(12));
        assert_eq!(money.facets.scale, Some(2));
        let code = ValueType::text().with_facets(ColumnFacets::max_length(3));
        assert_eq!(code.facets.max_length, Some(3));
    }
}
