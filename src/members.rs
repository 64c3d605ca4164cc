//! Per-target member tables.
//!
//! Protocol methods are never attached to host data. Each implementation
//! target owns a table of members in the [`Context`](crate::Context), keyed
//! either by a public name or by an opaque per-protocol key. Type tables are
//! looked up along the type's precedence list, so members installed on a
//! class or parent object are visible from everything deriving from it.

use rustc_hash::FxHashMap;

use protoduck_core::{ObjectRef, ProtocolId, TypeHash, TypeRegistry, Value};

use crate::Protocol;

/// Identity of a member table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKey {
    /// Members of a type, a class or a single object's singleton type.
    Type(TypeHash),
    /// The static surface of a protocol.
    Protocol(ProtocolId),
}

/// Name of a member within a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberKey {
    /// An ordinary, externally visible name.
    Public(String),
    /// An opaque key unique to one protocol method.
    Private(TypeHash),
}

impl MemberKey {
    /// The opaque key of `method` in `protocol`.
    pub fn private(protocol: ProtocolId, method: &str) -> Self {
        MemberKey::Private(TypeHash::from_member(protocol.0, method))
    }
}

impl From<&str> for MemberKey {
    fn from(name: &str) -> Self {
        MemberKey::Public(name.to_string())
    }
}

impl From<String> for MemberKey {
    fn from(name: String) -> Self {
        MemberKey::Public(name)
    }
}

/// What a protocol is implemented against.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// The implementing protocol's own static surface.
    Static,
    /// A type. Every value of the type, and of any subtype, sees the methods.
    Type(TypeHash),
    /// One object. Objects derived from it see the methods too.
    Object(ObjectRef),
    /// The static surface of some protocol.
    Protocol(ProtocolId),
}

impl Target {
    /// The table this target resolves to when implementing `protocol`.
    pub fn table(&self, protocol: &Protocol) -> TableKey {
        match self {
            Target::Static => TableKey::Protocol(protocol.id()),
            Target::Type(hash) => TableKey::Type(*hash),
            Target::Object(obj) => TableKey::Type(obj.type_hash()),
            Target::Protocol(id) => TableKey::Protocol(*id),
        }
    }

    /// The target as a value, as passed to metaobject methods.
    pub fn to_value(&self, protocol: &Protocol) -> Value {
        match self {
            Target::Static => Value::Protocol(protocol.id()),
            Target::Type(hash) => Value::Type(*hash),
            Target::Object(obj) => Value::Object(obj.clone()),
            Target::Protocol(id) => Value::Protocol(*id),
        }
    }

    /// Type standing for the target when it appears in a type tuple.
    pub fn as_type(&self) -> TypeHash {
        match self {
            Target::Static | Target::Protocol(_) => protoduck_core::builtins::PROTOCOL,
            Target::Type(hash) => *hash,
            Target::Object(obj) => obj.type_hash(),
        }
    }
}

impl From<TypeHash> for Target {
    fn from(hash: TypeHash) -> Self {
        Target::Type(hash)
    }
}

impl From<ObjectRef> for Target {
    fn from(obj: ObjectRef) -> Self {
        Target::Object(obj)
    }
}

impl From<&ObjectRef> for Target {
    fn from(obj: &ObjectRef) -> Self {
        Target::Object(obj.clone())
    }
}

impl From<&Protocol> for Target {
    fn from(protocol: &Protocol) -> Self {
        Target::Protocol(protocol.id())
    }
}

impl From<&Value> for Target {
    /// Objects, types and protocols name themselves; any other value stands
    /// for its runtime type.
    fn from(value: &Value) -> Self {
        match value {
            Value::Object(obj) => Target::Object(obj.clone()),
            Value::Type(hash) => Target::Type(*hash),
            Value::Protocol(id) => Target::Protocol(*id),
            other => Target::Type(other.runtime_type()),
        }
    }
}

/// The table a receiver's members are looked up in.
pub fn receiver_table(receiver: &Value) -> TableKey {
    match receiver {
        Value::Protocol(id) => TableKey::Protocol(*id),
        other => TableKey::Type(other.runtime_type()),
    }
}

/// All member tables of a context.
#[derive(Debug, Default)]
pub struct Members {
    tables: FxHashMap<TableKey, FxHashMap<MemberKey, Value>>,
}

impl Members {
    pub fn new() -> Self {
        Self::default()
    }

    /// A member stored directly in `table`.
    pub fn get_own(&self, table: TableKey, key: &MemberKey) -> Option<&Value> {
        self.tables.get(&table)?.get(key)
    }

    /// A member of `table` or, for type tables, of any ancestor type.
    ///
    /// Ancestors are searched in precedence order.
    pub fn lookup(&self, types: &TypeRegistry, table: TableKey, key: &MemberKey) -> Option<&Value> {
        match table {
            TableKey::Protocol(_) => self.get_own(table, key),
            TableKey::Type(hash) => types
                .precedence(hash)
                .into_iter()
                .find_map(|ty| self.get_own(TableKey::Type(ty), key)),
        }
    }

    /// Store a member, returning the previous one.
    pub fn set(&mut self, table: TableKey, key: MemberKey, value: Value) -> Option<Value> {
        self.tables.entry(table).or_default().insert(key, value)
    }

    /// Drop a whole table.
    pub fn remove_table(&mut self, table: TableKey) {
        self.tables.remove(&table);
    }

    /// Number of members stored directly in `table`.
    pub fn own_count(&self, table: TableKey) -> usize {
        self.tables.get(&table).map_or(0, |t| t.len())
    }
}
