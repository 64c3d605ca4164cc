//! Runtime values passed to and returned from method bodies.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;

use crate::{Genfun, NativeFn, TypeHash, builtins};

/// Identity of a protocol within one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProtocolId(pub u32);

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "protocol#{}", self.0)
    }
}

/// A dynamic value.
///
/// Objects, functions and dispatch functions are shared handles and compare
/// by identity. Everything else compares by value.
#[derive(Clone)]
pub enum Value {
    /// Null
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(OrderedFloat<f64>),
    /// String value
    Str(Rc<str>),
    /// Ordered list of values
    List(Rc<[Value]>),
    /// Shared object handle
    Object(ObjectRef),
    /// A runtime type used as a value
    Type(TypeHash),
    /// A protocol handle
    Protocol(ProtocolId),
    /// A plain function
    Function(NativeFn),
    /// A dispatch function
    Genfun(Rc<Genfun>),
}

impl Value {
    /// Runtime type used for dispatch.
    pub fn runtime_type(&self) -> TypeHash {
        match self {
            Value::Null => builtins::NULL,
            Value::Bool(_) => builtins::BOOLEAN,
            Value::Int(_) | Value::Float(_) => builtins::NUMBER,
            Value::Str(_) => builtins::STRING,
            Value::List(_) => builtins::LIST,
            Value::Object(o) => o.type_hash(),
            Value::Type(_) => builtins::TYPE,
            Value::Protocol(_) => builtins::PROTOCOL,
            Value::Function(_) | Value::Genfun(_) => builtins::FUNCTION,
        }
    }

    /// Human-readable name of this value's variant.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
            Value::Type(_) => "type",
            Value::Protocol(_) => "protocol",
            Value::Function(_) => "function",
            Value::Genfun(_) => "generic function",
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value can be called.
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Genfun(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_ref()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<TypeHash> {
        match self {
            Value::Type(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_protocol(&self) -> Option<ProtocolId> {
        match self {
            Value::Protocol(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&NativeFn> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_genfun(&self) -> Option<&Rc<Genfun>> {
        match self {
            Value::Genfun(g) => Some(g),
            _ => None,
        }
    }

    /// Build a list value.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(items.into_iter().collect())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(v) => write!(f, "Bool({})", v),
            Value::Int(v) => write!(f, "Int({})", v),
            Value::Float(v) => write!(f, "Float({})", v),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Object(o) => write!(f, "Object({:?})", o.type_hash()),
            Value::Type(t) => write!(f, "Type({:?})", t),
            Value::Protocol(p) => write!(f, "Protocol({})", p.0),
            Value::Function(_) => write!(f, "Function(...)"),
            Value::Genfun(g) => write!(f, "Genfun({:?})", g.name()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Protocol(a), Value::Protocol(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Genfun(a), Value::Genfun(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(OrderedFloat(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v.into())
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::Object(v)
    }
}

impl From<&ObjectRef> for Value {
    fn from(v: &ObjectRef) -> Self {
        Value::Object(v.clone())
    }
}

impl From<NativeFn> for Value {
    fn from(v: NativeFn) -> Self {
        Value::Function(v)
    }
}

impl From<Rc<Genfun>> for Value {
    fn from(v: Rc<Genfun>) -> Self {
        Value::Genfun(v)
    }
}

/// A heap object with its own singleton type.
///
/// Fields are plain data; methods live in the owning context's member tables.
#[derive(Debug)]
pub struct Object {
    type_hash: TypeHash,
    fields: RefCell<FxHashMap<String, Value>>,
}

/// Shared handle to an [`Object`]. Equality is identity.
#[derive(Debug, Clone)]
pub struct ObjectRef(Rc<Object>);

impl ObjectRef {
    /// Wrap a registered singleton type as a new object.
    pub fn new(type_hash: TypeHash) -> Self {
        ObjectRef(Rc::new(Object {
            type_hash,
            fields: RefCell::new(FxHashMap::default()),
        }))
    }

    /// The object's singleton type.
    pub fn type_hash(&self) -> TypeHash {
        self.0.type_hash
    }

    /// Read a field.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.fields.borrow().get(name).cloned()
    }

    /// Write a field, returning the previous value.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.fields.borrow_mut().insert(name.into(), value.into())
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ObjectRef {}
