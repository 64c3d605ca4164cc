//! Core types shared by protoduck.
//!
//! This crate holds the pieces the protocol layer is built on:
//!
//! - [`TypeHash`] and [`TypeRegistry`]: runtime type identity and ancestry
//! - [`Value`] and [`ObjectRef`]: the dynamic values bodies receive
//! - [`NativeFn`] and [`CallContext`]: callable bodies and their context
//! - [`Genfun`]: generic functions with multiple dispatch
//! - The error hierarchy rooted at [`Error`]

mod error;
mod genfun;
mod native_fn;
mod type_hash;
mod types;
mod value;

pub use error::{
    ConfigurationError, ConstraintError, DispatchError, Error, MissingImplementationError, Result,
    RuntimeError, UnknownMethodError,
};
pub use genfun::{Genfun, Method, UnmatchedHandler};
pub use native_fn::{CallContext, Host, NativeCallable, NativeFn};
pub use type_hash::{TypeHash, builtins, hash_constants};
pub use types::{TypeEntry, TypeKind, TypeRegistry};
pub use value::{Object, ObjectRef, ProtocolId, Value};
