//! Unified error types for protoduck.
//!
//! ## Error Hierarchy
//!
//! ```text
//! Error (top-level wrapper)
//! ├── ConfigurationError          - bad protocol, slot, type or tuple declarations
//! ├── MissingImplementationError  - a required method has no body
//! ├── UnknownMethodError          - a body was given for an undeclared method
//! ├── ConstraintError             - a prerequisite protocol is not implemented
//! └── RuntimeError                - call-time failures
//!     └── DispatchError           - no applicable method for a protocol call
//! ```
//!
//! Definition and registration errors are raised before anything is mutated.
//! `DispatchError` is raised at call time and is never retried or swallowed.

use thiserror::Error;

use crate::{ProtocolId, Value};

// ============================================================================
// Configuration Errors
// ============================================================================

/// Errors in protocol, type or registration declarations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// A method references a type slot the protocol does not declare.
    #[error(
        "type '{slot}' for function '{method}' in {protocol} does not match any protocol types ({})",
        .declared.join(", ")
    )]
    UnknownSlot {
        /// Protocol label.
        protocol: String,
        /// The method whose spec is invalid.
        method: String,
        /// The unknown slot identifier.
        slot: String,
        /// The slots the protocol declares.
        declared: Vec<String>,
    },

    /// A type slot was declared twice.
    #[error("type slot '{slot}' is declared more than once in {protocol}")]
    DuplicateSlot {
        /// Protocol label.
        protocol: String,
        /// The duplicated slot.
        slot: String,
    },

    /// A method was declared twice.
    #[error("method '{method}' is declared more than once in {protocol}")]
    DuplicateMethod {
        /// Protocol label.
        protocol: String,
        /// The duplicated method.
        method: String,
    },

    /// A registration named more types than the protocol has slots.
    #[error(
        "{protocol} expects to be defined across {expected} type{}, but {actual} {} specified",
        plural_suffix(.expected),
        was_or_were(.actual)
    )]
    TooManyTypes {
        /// Protocol label.
        protocol: String,
        /// Number of declared type slots.
        expected: usize,
        /// Number of types given.
        actual: usize,
    },

    /// A `where` constraint references a slot the protocol does not declare.
    #[error("constraint on {required} in {protocol} references unknown type slot '{slot}'")]
    UnknownConstraintSlot {
        /// Protocol label.
        protocol: String,
        /// The required protocol's label.
        required: String,
        /// The unknown slot identifier.
        slot: String,
    },

    /// A metaobject binding does not implement the metaobject protocol.
    #[error("metaobject for {protocol} is invalid: {reason}")]
    InvalidMetaobject {
        /// Protocol label.
        protocol: String,
        /// Why the binding was rejected.
        reason: String,
    },

    /// A type with this name already exists.
    #[error("duplicate type: {0}")]
    DuplicateType(String),

    /// A referenced type was not found.
    #[error("type not found: {0}")]
    TypeNotFound(String),
}

fn plural_suffix(n: &usize) -> &'static str {
    if *n == 1 { "" } else { "s" }
}

fn was_or_were(n: &usize) -> &'static str {
    if *n == 1 { "was" } else { "were" }
}

// ============================================================================
// Registration Errors
// ============================================================================

/// A declared method resolved to no body during registration.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "Missing implementation for {signature}. Make sure the method is present in your {protocol} definition. Required methods: {}.",
    .required.join(", ")
)]
pub struct MissingImplementationError {
    /// Protocol label.
    pub protocol: String,
    /// The unresolved method.
    pub method: String,
    /// The method's declared signature, e.g. `Eq#eq(a, b)`.
    pub signature: String,
    /// Signatures of every method without a default body.
    pub required: Vec<String>,
}

/// A registration supplied a body for a method the protocol does not declare.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "{method}() was included in the impl, but is not part of {protocol}. Allowed methods: {}.",
    .allowed.join(", ")
)]
pub struct UnknownMethodError {
    /// Protocol label.
    pub protocol: String,
    /// The undeclared method name.
    pub method: String,
    /// Signatures of every declared method.
    pub allowed: Vec<String>,
}

/// A prerequisite protocol is not implemented for the registration's target.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Implementations of {protocol} must first implement {required}")]
pub struct ConstraintError {
    /// Label of the protocol being implemented.
    pub protocol: String,
    /// Label of the unsatisfied prerequisite protocol.
    pub required: String,
}

// ============================================================================
// Runtime Errors
// ============================================================================

/// No method of a protocol dispatch function matched a call.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct DispatchError {
    /// Identity of the protocol that owns the dispatch function.
    pub protocol: Option<ProtocolId>,
    /// The called method.
    pub method: String,
    /// The receiving value, absent for static calls.
    pub target: Option<Value>,
    /// The actual arguments.
    pub args: Vec<Value>,
    /// Rendered diagnostic.
    pub message: String,
}

impl DispatchError {
    /// Error code carried by every dispatch failure.
    pub const CODE: &'static str = "ENOIMPL";
}

/// Errors raised while calling bodies and dispatch functions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// A protocol method had no applicable implementation.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A dispatch function without a diagnostic handler found no method.
    #[error("no applicable method for {name}({})", .arg_types.join(", "))]
    NoApplicableMethod {
        /// Dispatch function name.
        name: String,
        /// Display names of the argument types.
        arg_types: Vec<String>,
    },

    /// The receiver has no member of that name.
    #[error("{receiver} has no method '{method}'")]
    NoSuchMethod {
        /// Display name of the receiver's type.
        receiver: String,
        /// The requested member.
        method: String,
    },

    /// The member exists but cannot be called.
    #[error("{receiver}#{method} is not callable")]
    NotCallable {
        /// Display name of the receiver's type.
        receiver: String,
        /// The requested member.
        method: String,
    },

    /// An argument had the wrong shape.
    #[error("argument {index} of {function}: expected {expected}, got {actual}")]
    ArgumentType {
        /// The function being called.
        function: String,
        /// Argument position.
        index: usize,
        /// Expected kind of value.
        expected: &'static str,
        /// Actual kind of value.
        actual: &'static str,
    },

    /// A body reported a failure of its own.
    #[error("{message}")]
    Other {
        /// The error message.
        message: String,
    },
}

impl RuntimeError {
    /// Create an ad-hoc runtime error.
    pub fn other(message: impl Into<String>) -> Self {
        RuntimeError::Other {
            message: message.into(),
        }
    }

    /// The dispatch failure behind this error, if any.
    pub fn as_dispatch(&self) -> Option<&DispatchError> {
        match self {
            RuntimeError::Dispatch(e) => Some(e),
            _ => None,
        }
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// The unified error type for all protoduck operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A declaration error.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A missing method body.
    #[error(transparent)]
    MissingImplementation(#[from] MissingImplementationError),

    /// An undeclared method body.
    #[error(transparent)]
    UnknownMethod(#[from] UnknownMethodError),

    /// An unsatisfied prerequisite protocol.
    #[error(transparent)]
    Constraint(#[from] ConstraintError),

    /// A call-time failure.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl From<DispatchError> for Error {
    fn from(e: DispatchError) -> Self {
        Error::Runtime(RuntimeError::Dispatch(e))
    }
}

impl Error {
    /// Check if this is a configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    /// Check if this is a missing-implementation error.
    pub fn is_missing_implementation(&self) -> bool {
        matches!(self, Error::MissingImplementation(_))
    }

    /// Check if this is an unknown-method error.
    pub fn is_unknown_method(&self) -> bool {
        matches!(self, Error::UnknownMethod(_))
    }

    /// Check if this is a constraint error.
    pub fn is_constraint(&self) -> bool {
        matches!(self, Error::Constraint(_))
    }

    /// Check if this is a dispatch error.
    pub fn is_dispatch(&self) -> bool {
        matches!(self, Error::Runtime(RuntimeError::Dispatch(_)))
    }

    /// The dispatch failure behind this error, if any.
    pub fn as_dispatch(&self) -> Option<&DispatchError> {
        match self {
            Error::Runtime(e) => e.as_dispatch(),
            _ => None,
        }
    }
}

/// Result alias for protoduck operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

// ============================================================================
// Tests
// ============================================================================
