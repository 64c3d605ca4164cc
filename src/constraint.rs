//! Prerequisite protocols.
//!
//! A protocol may require other protocols to be implemented first. Each
//! [`Requirement`] names the required protocol, the target it must be
//! implemented for, and optionally the type tuple. Targets and types refer
//! to the implementing registration through slot names: `"this"` is the
//! registration's own target, any other name is the type registered for
//! that slot. Concrete types can be given directly.
//!
//! ```
//! use protoduck::{Context, MethodSpec, ProtocolSpec, Requirement};
//!
//! let cx = Context::new();
//! let foo = cx
//!     .define(ProtocolSpec::new(["a"]).name("Foo").method("frob", MethodSpec::new(["a"])))
//!     .unwrap();
//!
//! // Bar for (T, [U]) requires Foo for (U, [T]).
//! let bar = cx
//!     .define(
//!         ProtocolSpec::new(["b"])
//!             .name("Bar")
//!             .method("frab", MethodSpec::new(["b"]))
//!             .require(Requirement::new(&foo).on("b").with_types(["this"])),
//!     )
//!     .unwrap();
//! # let _ = bar;
//! ```

use protoduck_core::{ConfigurationError, ConstraintError, TypeHash, builtins};

use crate::members::Target;
use crate::protocol::Protocol;
use crate::{Context, diagnostics, reflection};

/// Slot reference naming the implementing registration's own target.
pub const THIS: &str = "this";

/// A target or type in a requirement, as declared.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotRef {
    /// `"this"` or a type slot of the requiring protocol.
    Slot(String),
    /// A concrete type.
    Fixed(TypeHash),
}

impl From<&str> for SlotRef {
    fn from(slot: &str) -> Self {
        SlotRef::Slot(slot.to_string())
    }
}

impl From<String> for SlotRef {
    fn from(slot: String) -> Self {
        SlotRef::Slot(slot)
    }
}

impl From<TypeHash> for SlotRef {
    fn from(hash: TypeHash) -> Self {
        SlotRef::Fixed(hash)
    }
}

/// A declared prerequisite protocol.
#[derive(Debug, Clone)]
pub struct Requirement {
    protocol: Protocol,
    target: Option<SlotRef>,
    types: Option<Vec<SlotRef>>,
}

impl Requirement {
    /// Require `protocol` for the same target, with any types.
    pub fn new(protocol: &Protocol) -> Self {
        Self {
            protocol: protocol.clone(),
            target: None,
            types: None,
        }
    }

    /// Require the protocol for a different target.
    pub fn on(mut self, target: impl Into<SlotRef>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Require the protocol for exactly these types.
    ///
    /// Missing trailing types are `Any`.
    pub fn with_types<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<SlotRef>,
    {
        self.types = Some(types.into_iter().map(Into::into).collect());
        self
    }
}

impl From<&Protocol> for Requirement {
    fn from(protocol: &Protocol) -> Self {
        Requirement::new(protocol)
    }
}

/// Where a constraint takes a target or type from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remap {
    /// The registration's type for a slot.
    SelfSlot(usize),
    /// A concrete type.
    Fixed(TypeHash),
    /// The registration's own target.
    Target,
}

/// A resolved prerequisite.
#[derive(Debug, Clone)]
pub struct Constraint {
    protocol: Protocol,
    target: Remap,
    types: Option<Vec<Remap>>,
}

/// Resolve a declared requirement against the requiring protocol's slots.
pub(crate) fn resolve(
    label: &str,
    slots: &[String],
    requirement: Requirement,
) -> Result<Constraint, ConfigurationError> {
    let remap = |slot: SlotRef| match slot {
        SlotRef::Fixed(hash) => Ok(Remap::Fixed(hash)),
        SlotRef::Slot(name) if name == THIS => Ok(Remap::Target),
        SlotRef::Slot(name) => slots
            .iter()
            .position(|s| *s == name)
            .map(Remap::SelfSlot)
            .ok_or_else(|| ConfigurationError::UnknownConstraintSlot {
                protocol: label.to_string(),
                required: requirement.protocol.label().to_string(),
                slot: name,
            }),
    };

    let target = match requirement.target.clone() {
        Some(slot) => remap(slot)?,
        None => Remap::Target,
    };
    let types = match requirement.types.clone() {
        Some(types) => Some(types.into_iter().map(remap).collect::<Result<Vec<_>, _>>()?),
        None => None,
    };

    Ok(Constraint {
        protocol: requirement.protocol,
        target,
        types,
    })
}

impl Constraint {
    /// The required protocol.
    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    pub fn target(&self) -> Remap {
        self.target
    }

    /// The remapped types, or `None` when any implementation satisfies it.
    pub fn types(&self) -> Option<&[Remap]> {
        self.types.as_deref()
    }

    /// Whether the constraint holds for a registration of `target` and
    /// `tuple`.
    pub fn check(&self, cx: &Context, target: &Target, tuple: &[TypeHash]) -> bool {
        let slot_type = |i: usize| tuple.get(i).copied().unwrap_or(builtins::ANY);
        let required_target = match self.target {
            Remap::Target => target.clone(),
            Remap::SelfSlot(i) => Target::Type(slot_type(i)),
            Remap::Fixed(hash) => Target::Type(hash),
        };

        match &self.types {
            None => reflection::has_impl(cx, &self.protocol, Some(&required_target), None),
            Some(types) => {
                let required_tuple: Vec<TypeHash> = types
                    .iter()
                    .map(|remap| match *remap {
                        Remap::Target => target.as_type(),
                        Remap::SelfSlot(i) => slot_type(i),
                        Remap::Fixed(hash) => hash,
                    })
                    .collect();
                reflection::has_impl(
                    cx,
                    &self.protocol,
                    Some(&required_target),
                    Some(required_tuple.as_slice()),
                )
            }
        }
    }
}

/// Check every constraint of `protocol` in order.
pub(crate) fn check_all(
    cx: &Context,
    protocol: &Protocol,
    target: &Target,
    tuple: &[TypeHash],
) -> Result<(), ConstraintError> {
    match protocol
        .constraints()
        .iter()
        .find(|c| !c.check(cx, target, tuple))
    {
        Some(failed) => {
            tracing::debug!(
                protocol = protocol.label(),
                required = failed.protocol().label(),
                "constraint not satisfied"
            );
            Err(diagnostics::unsatisfied_constraint(protocol, failed.protocol()))
        }
        None => Ok(()),
    }
}
