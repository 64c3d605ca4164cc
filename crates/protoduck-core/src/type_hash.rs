//! Deterministic hash-based type identity.
//!
//! [`TypeHash`] is a 64-bit identity for every runtime type known to a
//! [`TypeRegistry`](crate::TypeRegistry): builtins, registered classes, and the
//! singleton types that back individual objects. Named types hash from their
//! name, so the same name always yields the same identity and builtins can be
//! referenced as constants before any registry exists.
//!
//! # Examples
//!
//! ```
//! use protoduck_core::{TypeHash, builtins};
//!
//! assert_eq!(TypeHash::from_name("Number"), builtins::NUMBER);
//! assert_ne!(TypeHash::from_instance(1), TypeHash::from_instance(2));
//! ```

use std::fmt;

use xxhash_rust::const_xxh64::xxh64;

/// Domain-specific mixing constants for hash computation.
///
/// Named types and object singletons live in different domains so a counter
/// value can never collide with the hash of a class name.
pub mod hash_constants {
    /// Separator constant for multi-part hashes.
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for named type hashes.
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for object singleton hashes.
    pub const INSTANCE: u64 = 0x7d3c8b4a92e15f6d;

    /// Domain marker for protocol member keys.
    pub const MEMBER: u64 = 0x3e9f5d2a8c7b1403;
}

/// A deterministic 64-bit hash identifying a runtime type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Create a type hash from a type name.
    ///
    /// The same name always produces the same hash.
    #[inline]
    pub const fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Create the identity of the `n`th object singleton of a registry.
    #[inline]
    pub const fn from_instance(n: u64) -> Self {
        TypeHash(
            (hash_constants::INSTANCE ^ n.wrapping_mul(hash_constants::SEP))
                .wrapping_add(xxh64(&n.to_le_bytes(), hash_constants::INSTANCE)),
        )
    }

    /// Create a member key hash from an owning protocol id and a method name.
    ///
    /// Used for the opaque, per-protocol names methods are installed under.
    #[inline]
    pub fn from_member(owner: u32, name: &str) -> Self {
        let hash = hash_constants::MEMBER ^ xxh64(name.as_bytes(), owner as u64);
        TypeHash(hash.wrapping_mul(hash_constants::SEP).wrapping_add(owner as u64))
    }

    /// Check if this is an empty/invalid hash.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Identities of the builtin runtime types.
///
/// Every [`TypeRegistry`](crate::TypeRegistry) registers these on creation.
pub mod builtins {
    use super::TypeHash;

    /// The universal type. Matches every value, including a missing argument.
    pub const ANY: TypeHash = TypeHash::from_name("Any");

    /// Root of all object-like values.
    pub const OBJECT: TypeHash = TypeHash::from_name("Object");

    /// The null value.
    pub const NULL: TypeHash = TypeHash::from_name("Null");

    /// Booleans.
    pub const BOOLEAN: TypeHash = TypeHash::from_name("Boolean");

    /// Integers and floats.
    pub const NUMBER: TypeHash = TypeHash::from_name("Number");

    /// Strings.
    pub const STRING: TypeHash = TypeHash::from_name("String");

    /// Lists of values.
    pub const LIST: TypeHash = TypeHash::from_name("List");

    /// Plain functions and dispatch functions.
    pub const FUNCTION: TypeHash = TypeHash::from_name("Function");

    /// Type identities used as values.
    pub const TYPE: TypeHash = TypeHash::from_name("Type");

    /// Protocol handles used as values.
    pub const PROTOCOL: TypeHash = TypeHash::from_name("Protocol");

    /// All builtins with their display names, in registration order.
    pub const ALL: [(TypeHash, &str); 10] = [
        (ANY, "Any"),
        (OBJECT, "Object"),
        (NULL, "Null"),
        (BOOLEAN, "Boolean"),
        (NUMBER, "Number"),
        (STRING, "String"),
        (LIST, "List"),
        (FUNCTION, "Function"),
        (TYPE, "Type"),
        (PROTOCOL, "Protocol"),
    ];
}
