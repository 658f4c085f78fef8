//! Mapping registry
//!
//! Builds one [`ObjectMapping`] per object type known to the metadata
//! provider and answers type-tag lookups. Registration order is kept so that
//! schema creation is deterministic.

use crate::config::MapperConfig;
use crate::mapping::ObjectMapping;
use oidmap_core::{Error, MetadataProvider, Result};
use rustc_hash::FxHashMap;

/// All object mappings of a store, by type tag
#[derive(Debug, Clone, Default)]
pub struct MappingRegistry {
    mappings: FxHashMap<String, ObjectMapping>,
    order: Vec<String>,
}

impl MappingRegistry {
    /// Build mappings for every type the provider knows
    ///
    /// # Errors
    ///
    /// Propagates the first mapping failure (`UnknownType` for a dangling
    /// target, `InvalidOperation` for unusable names).
    pub fn build(metadata: &dyn MetadataProvider, config: &MapperConfig) -> Result<Self> {
        let mut registry = MappingRegistry::default();
        for object_type in metadata.object_types() {
            let spec = metadata
                .object_spec(&object_type)
                .ok_or_else(|| Error::UnknownType(object_type.clone()))?;
            let mapping = ObjectMapping::from_spec(spec, metadata, config)?;
            if let Some(other) = registry.iter().find(|m| m.table() == mapping.table()) {
                return Err(Error::invalid_operation(format!(
                    "types {} and {} both map to table '{}'",
                    other.object_type(),
                    object_type,
                    mapping.table()
                )));
            }
            registry.order.push(object_type.clone());
            registry.mappings.insert(object_type, mapping);
        }
        Ok(registry)
    }

    /// Mapping for a type tag
    ///
    /// # Errors
    ///
    /// `UnknownType` if the type is not mapped.
    pub fn mapping(&self, object_type: &str) -> Result<&ObjectMapping> {
        self.get(object_type)
            .ok_or_else(|| Error::UnknownType(object_type.to_string()))
    }

    /// Mapping for a type tag, if any
    pub fn get(&self, object_type: &str) -> Option<&ObjectMapping> {
        self.mappings.get(object_type)
    }

    /// Mappings in registration order
    pub fn iter(&self) -> impl Iterator<Item = &ObjectMapping> {
        self.order.iter().filter_map(|t| self.mappings.get(t))
    }

    /// Number of mapped types
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Check if nothing is mapped
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}
