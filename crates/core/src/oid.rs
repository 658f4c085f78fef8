//! Object identifiers
//!
//! Every domain object known to a session is identified by an [`Oid`]:
//!
//! - **Root** identifiers name an independent entity by logical type tag and
//!   primary key. They are either *transient* (object never written) or
//!   *persistent* (object has a row), and a persistent one may carry the
//!   version it was loaded at.
//! - **Parented** identifiers name a dependent facet (an owned collection or
//!   property) by its owning root identifier plus the association name.
//!
//! ## Canonical text form
//!
//! ```text
//! CUS:123          persistent root
//! !CUS:123         transient root
//! CUS:123/orders   parented (collection "orders" owned by CUS:123)
//! CUS:123@7        persistent root loaded at version 7 (parse only)
//! ```
//!
//! `to_string()` never emits the `@N` suffix: the version is carried in a
//! separate slot and is excluded from equality and hashing, so an identifier
//! keeps its identity while its version moves on.
//!
//! ## Usage
//!
//! ```
//! use oidmap_core::Oid;
//!
//! let oid = Oid::persistent("CUS", "123").unwrap().with_version(90807);
//! assert_eq!(oid.to_string(), "CUS:123");
//! assert_eq!(Oid::parse("CUS:123").unwrap(), oid);
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Prefix marking a transient root identifier
pub const TRANSIENT_MARKER: char = '!';
/// Separator between type tag and key
pub const TYPE_KEY_SEPARATOR: char = ':';
/// Separator between a parent identifier and an association name
pub const PARENT_SEPARATOR: char = '/';
/// Separator introducing an (optional, parse-only) version suffix
pub const VERSION_SEPARATOR: char = '@';

/// Whether a root identifier refers to a stored row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OidState {
    /// Object has been written to storage
    Persistent,
    /// Object exists only in memory
    Transient,
}

/// Identifier of an independent entity
///
/// Equality and hashing cover type tag, key and transience. The version slot
/// is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootOid {
    object_type: String,
    key: String,
    state: OidState,
    version: Option<u64>,
}

impl PartialEq for RootOid {
    fn eq(&self, other: &Self) -> bool {
        self.object_type == other.object_type && self.key == other.key && self.state == other.state
    }
}

impl Eq for RootOid {}

impl Hash for RootOid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.object_type.hash(state);
        self.key.hash(state);
        self.state.hash(state);
    }
}

impl RootOid {
    /// Create a persistent root identifier
    ///
    /// # Errors
    ///
    /// Returns `MalformedIdentifier` if the type tag or key is empty or
    /// contains a reserved character.
    pub fn persistent(object_type: impl Into<String>, key: impl Into<String>) -> Result<Self> {
        Self::build(object_type.into(), key.into(), OidState::Persistent)
    }

    /// Create a transient root identifier
    ///
    /// # Errors
    ///
    /// Returns `MalformedIdentifier` on an invalid type tag or key.
    pub fn transient(object_type: impl Into<String>, key: impl Into<String>) -> Result<Self> {
        Self::build(object_type.into(), key.into(), OidState::Transient)
    }

    fn build(object_type: String, key: String, state: OidState) -> Result<Self> {
        validate_component("type tag", &object_type)?;
        validate_component("key", &key)?;
        Ok(RootOid {
            object_type,
            key,
            state,
            version: None,
        })
    }

    /// Return a copy carrying the given version
    ///
    /// Transient identifiers never carry a version; the request is ignored.
    #[must_use]
    pub fn with_version(mut self, version: u64) -> Self {
        if self.state == OidState::Persistent {
            self.version = Some(version);
        }
        self
    }

    /// Persistent identifier of the same type that replaces this one once
    /// the object is first written
    ///
    /// # Errors
    ///
    /// Returns `MalformedIdentifier` if `key` is invalid.
    pub fn to_persistent(&self, key: impl Into<String>) -> Result<RootOid> {
        RootOid::persistent(self.object_type.clone(), key)
    }

    /// Logical type tag
    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    /// Primary key string
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Transience flag
    pub fn state(&self) -> OidState {
        self.state
    }

    /// Check whether the object is not yet stored
    pub fn is_transient(&self) -> bool {
        self.state == OidState::Transient
    }

    /// Version the identifier was loaded at, if known
    pub fn version(&self) -> Option<u64> {
        self.version
    }

    /// Canonical text including the `@N` version suffix when present
    pub fn to_versioned_string(&self) -> String {
        match self.version {
            Some(v) => format!("{}{}{}", self, VERSION_SEPARATOR, v),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for RootOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_transient() {
            write!(f, "{}", TRANSIENT_MARKER)?;
        }
        write!(f, "{}{}{}", self.object_type, TYPE_KEY_SEPARATOR, self.key)
    }
}

/// Identifier of a dependent facet owned by a root object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentedOid {
    parent: RootOid,
    name: String,
}

impl ParentedOid {
    /// Owning root identifier
    pub fn parent(&self) -> &RootOid {
        &self.parent
    }

    /// Association name within the owner
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Same association re-homed under a new parent (used when the owner is
    /// made persistent)
    #[must_use]
    pub fn with_parent(&self, parent: RootOid) -> ParentedOid {
        ParentedOid {
            parent,
            name: self.name.clone(),
        }
    }
}

impl fmt::Display for ParentedOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.parent, PARENT_SEPARATOR, self.name)
    }
}

/// Identifier of any object instance, root or parented
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Oid {
    /// Independent entity
    Root(RootOid),
    /// Facet owned by a root entity
    Parented(ParentedOid),
}

impl Oid {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Persistent root identifier
    ///
    /// # Errors
    ///
    /// Returns `MalformedIdentifier` on an invalid type tag or key.
    pub fn persistent(object_type: impl Into<String>, key: impl Into<String>) -> Result<Self> {
        RootOid::persistent(object_type, key).map(Oid::Root)
    }

    /// Transient root identifier
    ///
    /// # Errors
    ///
    /// Returns `MalformedIdentifier` on an invalid type tag or key.
    pub fn transient(object_type: impl Into<String>, key: impl Into<String>) -> Result<Self> {
        RootOid::transient(object_type, key).map(Oid::Root)
    }

    /// Parented identifier for an association of `parent`
    ///
    /// # Errors
    ///
    /// Returns `MalformedIdentifier` on an invalid association name.
    pub fn parented(parent: &RootOid, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_component("association name", &name)?;
        Ok(Oid::Parented(ParentedOid {
            parent: parent.clone(),
            name,
        }))
    }

    /// Parse the canonical text form
    ///
    /// Exact inverse of `to_string()`. Additionally accepts a `@N` version
    /// suffix on a persistent root, which fills the version slot.
    ///
    /// # Errors
    ///
    /// Returns `MalformedIdentifier` if the text does not match
    /// `[!]TYPE:KEY[@N][/name]`.
    pub fn parse(text: &str) -> Result<Self> {
        match text.split_once(PARENT_SEPARATOR) {
            Some((root, name)) => {
                if name.contains(PARENT_SEPARATOR) {
                    return Err(Error::malformed(text, "only one level of parenting is supported"));
                }
                let parent = parse_root(root, text)?;
                validate_component("association name", name)
                    .map_err(|_| Error::malformed(text, "invalid association name"))?;
                Ok(Oid::Parented(ParentedOid {
                    parent,
                    name: name.to_string(),
                }))
            }
            None => parse_root(text, text).map(Oid::Root),
        }
    }

    /// Return a copy whose root carries the given version
    #[must_use]
    pub fn with_version(self, version: u64) -> Self {
        match self {
            Oid::Root(root) => Oid::Root(root.with_version(version)),
            parented => parented,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The root identifier: itself for a root, the owner for a parented one
    pub fn root(&self) -> &RootOid {
        match self {
            Oid::Root(root) => root,
            Oid::Parented(p) => &p.parent,
        }
    }

    /// Owning identifier if this is a parented identifier
    pub fn parent(&self) -> Option<&RootOid> {
        match self {
            Oid::Root(_) => None,
            Oid::Parented(p) => Some(&p.parent),
        }
    }

    /// Association name if this is a parented identifier
    pub fn association(&self) -> Option<&str> {
        match self {
            Oid::Root(_) => None,
            Oid::Parented(p) => Some(&p.name),
        }
    }

    /// Type tag of the root identifier
    pub fn object_type(&self) -> &str {
        self.root().object_type()
    }

    /// Check whether the (root) object is not yet stored
    pub fn is_transient(&self) -> bool {
        self.root().is_transient()
    }

    /// Check whether this is a root identifier
    pub fn is_root(&self) -> bool {
        matches!(self, Oid::Root(_))
    }

    /// Version slot of a root identifier
    pub fn version(&self) -> Option<u64> {
        match self {
            Oid::Root(root) => root.version(),
            Oid::Parented(_) => None,
        }
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Oid::Root(root) => root.fmt(f),
            Oid::Parented(p) => p.fmt(f),
        }
    }
}

impl FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Oid::parse(s)
    }
}

impl From<RootOid> for Oid {
    fn from(root: RootOid) -> Self {
        Oid::Root(root)
    }
}

impl From<ParentedOid> for Oid {
    fn from(parented: ParentedOid) -> Self {
        Oid::Parented(parented)
    }
}

fn parse_root(text: &str, input: &str) -> Result<RootOid> {
    let (state, body) = match text.strip_prefix(TRANSIENT_MARKER) {
        Some(rest) => (OidState::Transient, rest),
        None => (OidState::Persistent, text),
    };

    let (object_type, rest) = body
        .split_once(TYPE_KEY_SEPARATOR)
        .ok_or_else(|| Error::malformed(input, "missing ':' between type and key"))?;

    let (key, version) = match rest.split_once(VERSION_SEPARATOR) {
        Some((key, digits)) => {
            if state == OidState::Transient {
                return Err(Error::malformed(input, "transient identifiers carry no version"));
            }
            let version = digits
                .parse::<u64>()
                .map_err(|_| Error::malformed(input, "version suffix is not a number"))?;
            (key, Some(version))
        }
        None => (rest, None),
    };

    let mut root = RootOid::build(object_type.to_string(), key.to_string(), state)
        .map_err(|e| match e {
            Error::MalformedIdentifier { reason, .. } => Error::malformed(input, reason),
            other => other,
        })?;
    root.version = version;
    Ok(root)
}

fn validate_component(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::malformed(value, format!("{} is empty", what)));
    }
    if value.starts_with(TRANSIENT_MARKER) {
        return Err(Error::malformed(
            value,
            format!("{} may not start with '{}'", what, TRANSIENT_MARKER),
        ));
    }
    if let Some(c) = value
        .chars()
        .find(|c| matches!(*c, TYPE_KEY_SEPARATOR | PARENT_SEPARATOR | VERSION_SEPARATOR))
    {
        return Err(Error::malformed(
            value,
            format!("{} contains reserved character '{}'", what, c),
        ));
    }
    Ok(())
}
