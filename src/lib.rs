//! Protocols with multiple dispatch.
//!
//! Protoduck lets you declare protocols, named sets of methods dispatching
//! over abstract type slots, and implement them for types, single objects,
//! or the protocol's own static surface. Registrations are checked for
//! completeness and prerequisite protocols before anything is installed, and
//! every dispatch function is created and extended through a pluggable
//! metaobject protocol.
//!
//! # Example
//!
//! ```
//! use protoduck::{Context, MethodBodies, MethodSpec, ProtocolSpec, Value, builtins};
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
//! cx.implement(
//!     &eq,
//!     (
//!         builtins::NUMBER,
//!         [builtins::NUMBER, builtins::NUMBER],
//!         MethodBodies::new()
//!             .with("eq", |ctx| Ok(Value::Bool(ctx.arg(0) == ctx.arg(1))))
//!             .with("neq", |ctx| Ok(Value::Bool(ctx.arg(0) != ctx.arg(1)))),
//!     ),
//! )
//! .unwrap();
//!
//! assert!(cx.has_impl_for(&eq, builtins::NUMBER, &[builtins::NUMBER, builtins::NUMBER]));
//! assert!(!cx.has_impl_for(&eq, builtins::NUMBER, &[builtins::NUMBER, builtins::STRING]));
//!
//! let one = Value::Int(1);
//! assert_eq!(cx.send(&one, "eq", &[Value::Int(1), Value::Int(1)]), Ok(Value::Bool(true)));
//! assert!(cx.send(&one, "eq", &[Value::from("1"), Value::Int(1)]).unwrap_err().as_dispatch().is_some());
//! ```

pub mod constraint;
pub mod context;
pub mod diagnostics;
pub mod engine;
pub mod members;
pub mod mop;
pub mod protocol;
pub mod reflection;
pub mod registrar;

pub use constraint::{Constraint, Remap, Requirement, SlotRef};
pub use context::Context;
pub use members::{MemberKey, TableKey, Target};
pub use mop::{MetaobjectBinding, MopMethod};
pub use protocol::{MethodDef, MethodSpec, Protocol, ProtocolFlags, ProtocolOptions, ProtocolSpec};
pub use reflection::{has_impl, is_derivable};
pub use registrar::{ImplArgs, MethodBodies};

pub use protoduck_core::{
    CallContext, ConfigurationError, ConstraintError, DispatchError, Error, Genfun, Host,
    MissingImplementationError, NativeFn, ObjectRef, ProtocolId, Result, RuntimeError, TypeHash,
    TypeRegistry, UnknownMethodError, Value, builtins,
};
