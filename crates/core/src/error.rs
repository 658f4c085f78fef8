//! Error types for oidmap
//!
//! This module defines the error taxonomy shared by every crate in the
//! workspace. We use `thiserror` for automatic `Display` and `Error` trait
//! implementations.
//!
//! ## Classes
//!
//! - **Fatal**: `DuplicateIdentity`, `SchemaMismatch`. The session (or the
//!   schema pass) cannot continue.
//! - **Recoverable**: `Concurrency`. The caller reloads and retries the whole
//!   business operation.
//! - **Surfaced**: everything else is reported to the caller as-is and never
//!   retried inside the core. Connector failures pass through unchanged.
//!
//! "Resolve already in progress or complete" is NOT an error. It is handled by
//! the no-op transition contract of the resolve-state machine.

use crate::connector::ConnectorError;
use crate::object::AdapterHandle;
use thiserror::Error;

/// Result type alias for oidmap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the object-identity and mapping core
#[derive(Debug, Error)]
pub enum Error {
    /// Identifier text (or identifier parts) does not match `[!]TYPE:KEY[/name]`
    #[error("Malformed identifier '{input}': {reason}")]
    MalformedIdentifier {
        /// The offending text
        input: String,
        /// What was wrong with it
        reason: String,
    },

    /// Two different adapters claim the same identity
    #[error("Duplicate identity {identity}: already held by {existing}, claimed by {claimed}")]
    DuplicateIdentity {
        /// Canonical text of the identifier (or object id) being claimed
        identity: String,
        /// Adapter already registered under this identity
        existing: AdapterHandle,
        /// Adapter that attempted to register
        claimed: AdapterHandle,
    },

    /// Version token mismatch detected before a write
    #[error("Concurrency conflict on {oid}: held version {held}, database reports {current}")]
    Concurrency {
        /// Canonical text of the object's identifier
        oid: String,
        /// Version the adapter loaded
        held: u64,
        /// Version the database holds now (0 if the row vanished)
        current: u64,
    },

    /// Required column is absent and could not be created
    #[error("Schema mismatch on table '{table}', column '{column}': {reason}")]
    SchemaMismatch {
        /// Table being checked
        table: String,
        /// Column that is missing or wrong
        column: String,
        /// Why the schema could not be healed
        reason: String,
    },

    /// Connector-level failure, propagated unchanged
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    /// A persistent identifier has no backing row
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// The metadata provider knows nothing about this type tag
    #[error("Unknown object type: {0}")]
    UnknownType(String),

    /// The object type has no association with this name
    #[error("Unknown association '{association}' on type '{object_type}'")]
    UnknownAssociation {
        /// Type tag of the owning object
        object_type: String,
        /// Association that was requested
        association: String,
    },

    /// Adapter handle no longer refers to a live adapter
    #[error("Stale adapter handle: {0}")]
    StaleHandle(AdapterHandle),

    /// Invalid operation or state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Configuration could not be read or is invalid
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a `MalformedIdentifier` error
    pub fn malformed(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedIdentifier {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create an `InvalidOperation` error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Error::InvalidOperation(msg.into())
    }

    /// Create a `SchemaMismatch` error
    pub fn schema_mismatch(
        table: impl Into<String>,
        column: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::SchemaMismatch {
            table: table.into(),
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Integrity failures after which the session must not be used further
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::DuplicateIdentity { .. } | Error::SchemaMismatch { .. }
        )
    }

    /// Failures the caller may recover from by reloading and retrying
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Concurrency { .. })
    }
}
