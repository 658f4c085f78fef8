//! Raw domain objects and the handles that refer to them
//!
//! Domain objects live inside an adapter arena owned by a session. Nothing
//! outside the arena holds a pointer to an object; references between objects
//! are [`AdapterHandle`]s, and the identity of a raw object (as opposed to its
//! value) is its [`ObjectId`].

use crate::value::Value;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Slot index plus generation of an adapter within one session's arena
///
/// A freed slot is only handed out again under the next generation, so a
/// handle that outlives its adapter is detected as stale rather than aliasing
/// a newer adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AdapterHandle {
    index: u32,
    generation: u32,
}

impl AdapterHandle {
    /// First-generation handle for a slot
    pub const fn new(index: u32) -> Self {
        AdapterHandle::with_generation(index, 0)
    }

    /// Handle for a slot at a given generation
    pub const fn with_generation(index: u32, generation: u32) -> Self {
        AdapterHandle { index, generation }
    }

    /// Raw arena index
    pub const fn index(self) -> usize {
        self.index as usize
    }

    /// Generation of the slot this handle was issued for
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Handle for the same slot once it is reused; `None` when the slot's
    /// generations are exhausted and it must be retired
    pub fn next_generation(self) -> Option<Self> {
        self.generation
            .checked_add(1)
            .map(|generation| AdapterHandle::with_generation(self.index, generation))
    }
}

impl fmt::Display for AdapterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.generation == 0 {
            write!(f, "#{}", self.index)
        } else {
            write!(f, "#{}v{}", self.index, self.generation)
        }
    }
}

/// Identity of a raw domain object, independent of its field values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Create an object id from its raw value
    pub const fn new(id: u64) -> Self {
        ObjectId(id)
    }

    /// Raw value
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj:{}", self.0)
    }
}

/// Content of a single field of an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Embedded scalar value
    Value(Value),
    /// Reference to another entity (None = null reference)
    Reference(Option<AdapterHandle>),
}

impl FieldValue {
    /// Scalar value, if this is a value field
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            FieldValue::Value(v) => Some(v),
            FieldValue::Reference(_) => None,
        }
    }

    /// Referenced adapter, if this is a non-null reference
    pub fn as_reference(&self) -> Option<AdapterHandle> {
        match self {
            FieldValue::Reference(r) => *r,
            FieldValue::Value(_) => None,
        }
    }
}

/// Field storage of an entity object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainObject {
    fields: FxHashMap<String, FieldValue>,
}

impl DomainObject {
    /// Create an object with no fields populated
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a field
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Get a scalar field value
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(FieldValue::as_value)
    }

    /// Get a reference field target
    pub fn reference(&self, name: &str) -> Option<AdapterHandle> {
        self.get(name).and_then(FieldValue::as_reference)
    }

    /// Set a field, returning the previous content
    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(name.into(), value)
    }

    /// Set a scalar field
    pub fn set_value(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), FieldValue::Value(value.into()));
    }

    /// Set a reference field
    pub fn set_reference(&mut self, name: impl Into<String>, target: Option<AdapterHandle>) {
        self.fields.insert(name.into(), FieldValue::Reference(target));
    }

    /// Targets of every non-null reference field
    pub fn references(&self) -> impl Iterator<Item = AdapterHandle> + '_ {
        self.fields.values().filter_map(FieldValue::as_reference)
    }

    /// Null every reference whose target fails `keep`
    pub fn retain_references(&mut self, mut keep: impl FnMut(AdapterHandle) -> bool) {
        for value in self.fields.values_mut() {
            if matches!(value, FieldValue::Reference(Some(target)) if !keep(*target)) {
                *value = FieldValue::Reference(None);
            }
        }
    }

    /// Number of populated fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check whether no field is populated
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// What an adapter wraps: an entity or an owned collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Entity with named fields
    Entity(DomainObject),
    /// Ordered collection of element adapters
    Collection(Vec<AdapterHandle>),
}

impl Payload {
    /// Empty entity payload
    pub fn entity() -> Self {
        Payload::Entity(DomainObject::new())
    }

    /// Empty collection payload
    pub fn collection() -> Self {
        Payload::Collection(Vec::new())
    }

    /// Entity fields, if this is an entity
    pub fn as_entity(&self) -> Option<&DomainObject> {
        match self {
            Payload::Entity(obj) => Some(obj),
            Payload::Collection(_) => None,
        }
    }

    /// Mutable entity fields, if this is an entity
    pub fn as_entity_mut(&mut self) -> Option<&mut DomainObject> {
        match self {
            Payload::Entity(obj) => Some(obj),
            Payload::Collection(_) => None,
        }
    }

    /// Collection elements, if this is a collection
    pub fn as_collection(&self) -> Option<&[AdapterHandle]> {
        match self {
            Payload::Collection(elements) => Some(elements),
            Payload::Entity(_) => None,
        }
    }

    /// Mutable collection elements, if this is a collection
    pub fn as_collection_mut(&mut self) -> Option<&mut Vec<AdapterHandle>> {
        match self {
            Payload::Collection(elements) => Some(elements),
            Payload::Entity(_) => None,
        }
    }
}
