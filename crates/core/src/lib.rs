//! Core types and traits for oidmap
//!
//! This crate defines the foundational types used throughout the system:
//! - Oid: Durable, version-aware object identifiers (root and parented)
//! - Version: Optimistic-concurrency lock token
//! - Value: Scalar field and column values
//! - DomainObject / Payload: Raw object content held by adapters
//! - AdapterHandle / ObjectId: Arena handles and raw-object identity
//! - MetadataProvider: Contract for object-type and association metadata
//! - DatabaseConnector: Contract for issuing SQL
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connector;
pub mod error;
pub mod metadata;
pub mod object;
pub mod oid;
pub mod value;
pub mod version;

pub use connector::{ConnectorError, ConnectorResult, DatabaseConnector, ResultCursor, Row, VecCursor};
pub use error::{Error, Result};
pub use metadata::{
    AssociationKind, AssociationSpec, ColumnFacets, MetadataProvider, ObjectSpec, SpecRegistry,
    ValueKind, ValueType,
};
pub use object::{AdapterHandle, DomainObject, FieldValue, ObjectId, Payload};
pub use oid::{Oid, OidState, ParentedOid, RootOid};
pub use value::Value;
pub use version::Version;
