//! The protocol context.
//!
//! A [`Context`] owns the type registry, every member table, and every
//! protocol defined in it, starting with the metaobject protocol. It is the
//! [`Host`] dispatch functions run against, so method bodies can reach it
//! again through [`Context::from_host`].
//!
//! # Example
//!
//! ```
//! use protoduck::{Context, MethodBodies, MethodSpec, ProtocolSpec, Value, builtins};
//!
//! let cx = Context::new();
//! let show = cx
//!     .define(ProtocolSpec::method_style().name("Show").method("show", MethodSpec::empty()))
//!     .unwrap();
//!
//! cx.implement(
//!     &show,
//!     (builtins::NUMBER, MethodBodies::new().with("show", |ctx| {
//!         let n = ctx.this().and_then(Value::as_int).unwrap_or_default();
//!         Ok(Value::from(format!("#{n}")))
//!     })),
//! )
//! .unwrap();
//!
//! assert_eq!(cx.send(&Value::Int(7), "show", &[]), Ok(Value::from("#7")));
//! ```
//!
//! # Threading
//!
//! A context is single-threaded. Registrations are expected during setup;
//! dispatch is reentrant, so bodies may call back into the context.

use std::any::Any;
use std::cell::{Cell, Ref, RefCell};

use rustc_hash::FxHashMap;

use protoduck_core::{
    ConfigurationError, Host, ObjectRef, ProtocolId, Result, RuntimeError, TypeHash,
    TypeRegistry, Value, builtins,
};

use crate::members::{MemberKey, Members, TableKey, Target, receiver_table};
use crate::protocol::{Protocol, ProtocolSpec};
use crate::registrar::ImplArgs;
use crate::{mop, protocol, reflection, registrar};

/// Owner of all types, member tables and protocols.
pub struct Context {
    types: RefCell<TypeRegistry>,
    members: RefCell<Members>,
    protocols: RefCell<FxHashMap<ProtocolId, Protocol>>,
    next_protocol: Cell<u32>,
    mop: Protocol,
}

impl Context {
    /// Create a context with the builtin types and the metaobject protocol.
    pub fn new() -> Self {
        let mop = mop::protocol(ProtocolId(0));
        let mut protocols = FxHashMap::default();
        protocols.insert(mop.id(), mop.clone());
        let cx = Self {
            types: RefCell::new(TypeRegistry::new()),
            members: RefCell::new(Members::new()),
            protocols: RefCell::new(protocols),
            next_protocol: Cell::new(1),
            mop,
        };
        mop::install(&cx);
        cx
    }

    /// Recover the context from inside a method body.
    pub fn from_host(host: &dyn Host) -> std::result::Result<&Context, RuntimeError> {
        host.as_any()
            .downcast_ref::<Context>()
            .ok_or_else(|| RuntimeError::other("dispatch host is not a protoduck context"))
    }

    /// The metaobject protocol.
    pub fn mop(&self) -> &Protocol {
        &self.mop
    }

    // ========================================================================
    // Protocols
    // ========================================================================

    /// Define a protocol.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for duplicate or unknown slots,
    /// duplicate methods, constraints naming unknown slots, and metaobjects
    /// that do not implement the metaobject protocol.
    pub fn define(&self, spec: ProtocolSpec) -> Result<Protocol> {
        protocol::define(self, spec)
    }

    /// Implement a protocol. See [`registrar`](crate::registrar) for the
    /// accepted argument shapes.
    ///
    /// # Errors
    ///
    /// Nothing is installed when validation fails.
    pub fn implement(&self, protocol: &Protocol, args: impl Into<ImplArgs>) -> Result<()> {
        registrar::implement(self, protocol, args.into())
    }

    /// Whether `target` implements `protocol` at all.
    pub fn has_impl(&self, protocol: &Protocol, target: impl Into<Target>) -> bool {
        reflection::has_impl(self, protocol, Some(&target.into()), None)
    }

    /// Whether `target` implements `protocol` for exactly `types`.
    pub fn has_impl_for(
        &self,
        protocol: &Protocol,
        target: impl Into<Target>,
        types: &[TypeHash],
    ) -> bool {
        reflection::has_impl(self, protocol, Some(&target.into()), Some(types))
    }

    /// Look up a protocol by id.
    pub fn protocol(&self, id: ProtocolId) -> Option<Protocol> {
        self.protocols.borrow().get(&id).cloned()
    }

    pub fn protocol_count(&self) -> usize {
        self.protocols.borrow().len()
    }

    /// Ids are never reused, even after a failed definition.
    pub(crate) fn register_protocol(&self, build: impl FnOnce(ProtocolId) -> Protocol) -> Protocol {
        let id = ProtocolId(self.next_protocol.get());
        self.next_protocol.set(id.0 + 1);
        let protocol = build(id);
        self.protocols.borrow_mut().insert(id, protocol.clone());
        protocol
    }

    /// Forget a protocol and everything installed on its static surface.
    pub(crate) fn unregister_protocol(&self, id: ProtocolId) {
        self.protocols.borrow_mut().remove(&id);
        self.members.borrow_mut().remove_table(TableKey::Protocol(id));
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Call `method` on `receiver`.
    ///
    /// The member is looked up on the receiver's type and its ancestors.
    /// Dispatch functions and plain functions receive `receiver` as `this`.
    pub fn send(
        &self,
        receiver: &Value,
        method: &str,
        args: &[Value],
    ) -> std::result::Result<Value, RuntimeError> {
        self.send_key(receiver, &MemberKey::from(method), args)
    }

    /// Call the member stored under `key` on `receiver`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn send_key(
        &self,
        receiver: &Value,
        key: &MemberKey,
        args: &[Value],
    ) -> std::result::Result<Value, RuntimeError> {
        let member = self.lookup_member(receiver_table(receiver), key);
        match member {
            Some(Value::Genfun(gf)) => gf.call(self, Some(receiver), args),
            Some(Value::Function(f)) => f.invoke(self, Some(receiver), args),
            Some(_) => Err(RuntimeError::NotCallable {
                receiver: self.value_type_name(receiver),
                method: key_name(key),
            }),
            None => Err(RuntimeError::NoSuchMethod {
                receiver: self.value_type_name(receiver),
                method: key_name(key),
            }),
        }
    }

    /// Call `method` on the protocol's own static surface.
    pub fn call_static(
        &self,
        protocol: &Protocol,
        method: &str,
        args: &[Value],
    ) -> std::result::Result<Value, RuntimeError> {
        self.send_key(
            &Value::Protocol(protocol.id()),
            &protocol.method_key(method),
            args,
        )
    }

    // ========================================================================
    // Types and objects
    // ========================================================================

    /// Register a named class.
    pub fn register_class(
        &self,
        name: &str,
        parents: &[TypeHash],
    ) -> std::result::Result<TypeHash, ConfigurationError> {
        self.types.borrow_mut().register_class(name, parents)
    }

    /// Create a plain object.
    pub fn new_object(&self) -> ObjectRef {
        ObjectRef::new(self.types.borrow_mut().derive_instance(builtins::OBJECT))
    }

    /// Create an object of a registered class.
    pub fn instance_of(&self, class: TypeHash) -> std::result::Result<ObjectRef, ConfigurationError> {
        let hash = self.types.borrow_mut().register_instance(class)?;
        Ok(ObjectRef::new(hash))
    }

    /// Create an object deriving from `parent`.
    ///
    /// Members and methods of the parent are visible from the child until
    /// the child gets its own.
    pub fn object_from(&self, parent: &ObjectRef) -> ObjectRef {
        ObjectRef::new(self.types.borrow_mut().derive_instance(parent.type_hash()))
    }

    /// The type registry.
    pub fn types(&self) -> Ref<'_, TypeRegistry> {
        self.types.borrow()
    }

    /// Display name of a type.
    pub fn type_name(&self, hash: TypeHash) -> String {
        self.types.borrow().display_name(hash)
    }

    fn value_type_name(&self, value: &Value) -> String {
        match value {
            Value::Protocol(id) => self
                .protocol(*id)
                .map(|p| p.label().to_string())
                .unwrap_or_else(|| "protocol".to_string()),
            other => self.type_name(other.runtime_type()),
        }
    }

    // ========================================================================
    // Members
    // ========================================================================

    /// Set a plain member on `receiver`'s table.
    ///
    /// Plain functions set this way are kept as the fallback when a protocol
    /// later installs a method of the same name.
    pub fn set_member(&self, receiver: &Value, name: &str, value: impl Into<Value>) -> Option<Value> {
        self.set_own_member(receiver_table(receiver), MemberKey::from(name), value.into())
    }

    /// Look up a member on `receiver` and its ancestors.
    ///
    /// Takes a public name or a protocol method key.
    pub fn member(&self, receiver: &Value, key: impl Into<MemberKey>) -> Option<Value> {
        self.lookup_member(receiver_table(receiver), &key.into())
    }

    pub(crate) fn own_member(&self, table: TableKey, key: &MemberKey) -> Option<Value> {
        self.members.borrow().get_own(table, key).cloned()
    }

    #[cfg(test)]
    pub(crate) fn own_member_count(&self, table: TableKey) -> usize {
        self.members.borrow().own_count(table)
    }

    pub(crate) fn lookup_member(&self, table: TableKey, key: &MemberKey) -> Option<Value> {
        let types = self.types.borrow();
        self.members.borrow().lookup(&types, table, key).cloned()
    }

    pub(crate) fn set_own_member(&self, table: TableKey, key: MemberKey, value: Value) -> Option<Value> {
        self.members.borrow_mut().set(table, key, value)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for Context {
    fn precedence(&self, ty: TypeHash) -> Vec<TypeHash> {
        self.types.borrow().precedence(ty)
    }

    fn type_name(&self, ty: TypeHash) -> String {
        self.types.borrow().display_name(ty)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn key_name(key: &MemberKey) -> String {
    match key {
        MemberKey::Public(name) => name.clone(),
        MemberKey::Private(hash) => format!("<{hash}>"),
    }
}
