//! Protocol definitions.
//!
//! A [`Protocol`] is a named set of methods dispatching over an ordered list
//! of abstract type slots. Each method names the slots it dispatches on, in
//! its own argument order, and may carry a default body.
//!
//! # Example
//!
//! ```
//! use protoduck::{Context, MethodSpec, ProtocolSpec};
//!
//! let cx = Context::new();
//! let eq = cx
//!     .define(
//!         ProtocolSpec::new(["a", "b"])
//!             .name("Eq")
//!             .method("eq", MethodSpec::new(["a", "b"]))
//!             .method("neq", MethodSpec::new(["b", "a"])),
//!     )
//!     .unwrap();
//!
//! assert_eq!(eq.method("neq").unwrap().slots(), &[1, 0]);
//! assert!(!eq.is_derivable());
//! ```

use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use rustc_hash::FxHashSet;

use protoduck_core::{
    CallContext, ConfigurationError, NativeFn, ProtocolId, Result, RuntimeError, TypeHash, Value,
    builtins,
};

use crate::constraint::{self, Constraint, Requirement};
use crate::members::{MemberKey, Target};
use crate::mop::{self, MetaobjectBinding};
use crate::{Context, registrar};

bitflags! {
    /// Properties of a protocol fixed at definition time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProtocolFlags: u8 {
        /// Methods are installed under their opaque keys only.
        const PRIVATE = 1 << 0;
        /// Every method has a default body.
        const DERIVABLE = 1 << 1;
        /// This is the metaobject protocol itself.
        const METAOBJECT = 1 << 2;
    }
}

/// A declared protocol method.
#[derive(Debug, Clone)]
pub struct MethodDef {
    name: String,
    slots: Vec<usize>,
    default: Option<NativeFn>,
}

impl MethodDef {
    pub(crate) fn new(name: impl Into<String>, slots: Vec<usize>, default: Option<NativeFn>) -> Self {
        Self {
            name: name.into(),
            slots,
            default,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Indices into the protocol's type slots, in argument order.
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    pub fn default_body(&self) -> Option<&NativeFn> {
        self.default.as_ref()
    }

    /// This method's own specializer tuple for a full protocol type tuple.
    pub fn project(&self, tuple: &[TypeHash]) -> Vec<TypeHash> {
        self.slots
            .iter()
            .map(|&i| tuple.get(i).copied().unwrap_or(builtins::ANY))
            .collect()
    }
}

struct ProtocolData {
    id: ProtocolId,
    name: Option<String>,
    type_slots: Vec<String>,
    methods: Vec<MethodDef>,
    flags: ProtocolFlags,
    constraints: Vec<Constraint>,
    metaobject: MetaobjectBinding,
}

/// Handle to a defined protocol. Cloning shares the definition.
#[derive(Clone)]
pub struct Protocol(Rc<ProtocolData>);

impl Protocol {
    pub(crate) fn from_parts(
        id: ProtocolId,
        name: Option<String>,
        type_slots: Vec<String>,
        methods: Vec<MethodDef>,
        mut flags: ProtocolFlags,
        constraints: Vec<Constraint>,
        metaobject: MetaobjectBinding,
    ) -> Self {
        flags.set(
            ProtocolFlags::DERIVABLE,
            methods.iter().all(|m| m.default.is_some()),
        );
        Protocol(Rc::new(ProtocolData {
            id,
            name,
            type_slots,
            methods,
            flags,
            constraints,
            metaobject,
        }))
    }

    pub fn id(&self) -> ProtocolId {
        self.0.id
    }

    /// The diagnostic name, if one was given.
    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    /// The name, or `"protocol"` for anonymous protocols.
    pub fn label(&self) -> &str {
        self.name().unwrap_or("protocol")
    }

    pub fn type_slots(&self) -> &[String] {
        &self.0.type_slots
    }

    /// Declared methods, in declaration order.
    pub fn methods(&self) -> &[MethodDef] {
        &self.0.methods
    }

    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.0.methods.iter().find(|m| m.name == name)
    }

    pub fn flags(&self) -> ProtocolFlags {
        self.0.flags
    }

    /// Whether every method has a default body.
    pub fn is_derivable(&self) -> bool {
        self.0.flags.contains(ProtocolFlags::DERIVABLE)
    }

    pub fn is_private(&self) -> bool {
        self.0.flags.contains(ProtocolFlags::PRIVATE)
    }

    /// Prerequisite protocols, in declaration order.
    pub fn constraints(&self) -> &[Constraint] {
        &self.0.constraints
    }

    pub fn metaobject(&self) -> &MetaobjectBinding {
        &self.0.metaobject
    }

    /// The opaque member key `method` is always installed under.
    pub fn method_key(&self, method: &str) -> MemberKey {
        MemberKey::private(self.0.id, method)
    }
}

impl PartialEq for Protocol {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Protocol {}

impl fmt::Debug for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Protocol")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("type_slots", &self.0.type_slots)
            .field(
                "methods",
                &self.0.methods.iter().map(|m| &m.name).collect::<Vec<_>>(),
            )
            .field("flags", &self.0.flags)
            .finish_non_exhaustive()
    }
}

/// Declaration of one method: the slots it dispatches on and an optional
/// default body.
#[derive(Debug, Clone, Default)]
pub struct MethodSpec {
    slots: Vec<String>,
    default: Option<NativeFn>,
}

impl MethodSpec {
    pub fn new<I, S>(slots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slots: slots.into_iter().map(Into::into).collect(),
            default: None,
        }
    }

    /// A method dispatching on no slots.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Attach a default body.
    pub fn with_default<F>(mut self, f: F) -> Self
    where
        F: Fn(&CallContext<'_>) -> std::result::Result<Value, RuntimeError> + 'static,
    {
        self.default = Some(NativeFn::new(f));
        self
    }

    /// Attach an existing function as the default body.
    pub fn with_default_fn(mut self, f: NativeFn) -> Self {
        self.default = Some(f);
        self
    }
}

/// Per-protocol options.
#[derive(Debug, Clone, Default)]
pub struct ProtocolOptions {
    /// Name used in diagnostics.
    pub name: Option<String>,
    /// Metaobjects mediating dispatch function creation, outermost first.
    pub metaobjects: Vec<Value>,
    /// Install methods under their opaque keys only.
    pub private: bool,
    /// Prerequisite protocols.
    pub requirements: Vec<Requirement>,
}

impl ProtocolOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a metaobject layer. Layers run in the order added.
    ///
    /// Naming `Protoduck` itself selects the bootstrap primitives, and is
    /// then the only layer allowed.
    pub fn metaobject(mut self, metaobject: impl Into<Value>) -> Self {
        self.metaobjects.push(metaobject.into());
        self
    }

    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    /// Add a prerequisite protocol.
    pub fn require(mut self, requirement: impl Into<Requirement>) -> Self {
        self.requirements.push(requirement.into());
        self
    }
}

/// Everything needed to define a protocol.
#[derive(Debug, Clone, Default)]
pub struct ProtocolSpec {
    type_slots: Vec<String>,
    methods: Vec<(String, MethodSpec)>,
    options: ProtocolOptions,
}

impl ProtocolSpec {
    /// A protocol dispatching over the given type slots.
    pub fn new<I, S>(type_slots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            type_slots: type_slots.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// A protocol without type slots. Methods dispatch on the receiver only.
    pub fn method_style() -> Self {
        Self::default()
    }

    pub fn method(mut self, name: impl Into<String>, spec: MethodSpec) -> Self {
        self.methods.push((name.into(), spec));
        self
    }

    pub fn options(mut self, options: ProtocolOptions) -> Self {
        self.options = options;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.options.name = Some(name.into());
        self
    }

    pub fn private(mut self) -> Self {
        self.options.private = true;
        self
    }

    /// See [`ProtocolOptions::metaobject`].
    pub fn metaobject(mut self, metaobject: impl Into<Value>) -> Self {
        self.options.metaobjects.push(metaobject.into());
        self
    }

    pub fn require(mut self, requirement: impl Into<Requirement>) -> Self {
        self.options.requirements.push(requirement.into());
        self
    }
}

/// Validate a protocol spec and create its static dispatch functions.
#[cfg_attr(feature = "profiling", profiling::function)]
pub(crate) fn define(cx: &Context, spec: ProtocolSpec) -> Result<Protocol> {
    let ProtocolSpec {
        type_slots,
        methods,
        options,
    } = spec;
    let label = options.name.clone().unwrap_or_else(|| "protocol".to_string());

    let mut seen = FxHashSet::default();
    if let Some(dup) = type_slots.iter().find(|s| !seen.insert(s.as_str())) {
        return Err(ConfigurationError::DuplicateSlot {
            protocol: label,
            slot: dup.clone(),
        }
        .into());
    }

    let mut defs: Vec<MethodDef> = Vec::with_capacity(methods.len());
    for (name, method) in methods {
        if defs.iter().any(|d| d.name == name) {
            return Err(ConfigurationError::DuplicateMethod {
                protocol: label,
                method: name,
            }
            .into());
        }
        let slots = method
            .slots
            .iter()
            .map(|slot| {
                type_slots.iter().position(|s| s == slot).ok_or_else(|| {
                    ConfigurationError::UnknownSlot {
                        protocol: label.clone(),
                        method: name.clone(),
                        slot: slot.clone(),
                        declared: type_slots.clone(),
                    }
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        defs.push(MethodDef::new(name, slots, method.default));
    }

    let constraints = options
        .requirements
        .into_iter()
        .map(|r| constraint::resolve(&label, &type_slots, r))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let metaobject = mop::resolve_binding(cx, &label, options.metaobjects)?;

    let mut flags = ProtocolFlags::empty();
    flags.set(ProtocolFlags::PRIVATE, options.private);

    let protocol = cx.register_protocol(|id| {
        Protocol::from_parts(
            id,
            options.name,
            type_slots,
            defs,
            flags,
            constraints,
            metaobject,
        )
    });

    tracing::debug!(
        protocol = protocol.label(),
        id = protocol.id().0,
        slots = protocol.type_slots().len(),
        methods = protocol.methods().len(),
        derivable = protocol.is_derivable(),
        "defined protocol"
    );

    let created = protocol
        .methods()
        .iter()
        .try_for_each(|method| {
            registrar::ensure_genfun(cx, &protocol, &Target::Static, method.name()).map(drop)
        });
    if let Err(err) = created {
        tracing::debug!(protocol = protocol.label(), error = %err, "rolling back protocol definition");
        cx.unregister_protocol(protocol.id());
        return Err(err);
    }

    Ok(protocol)
}
