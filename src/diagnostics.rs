//! Diagnostic messages.
//!
//! Signatures render as `Name#method(slot, slot)`, dropping the `Name#`
//! prefix for anonymous protocols. The unmatched-dispatch message is built
//! lazily when a call fails, from the runtime types of the receiver and
//! every actual argument.

use std::rc::Rc;

use protoduck_core::{
    ConfigurationError, ConstraintError, DispatchError, Genfun, Host, MissingImplementationError,
    RuntimeError, UnknownMethodError, UnmatchedHandler, Value,
};

use crate::Context;
use crate::members::Target;
use crate::protocol::{MethodDef, Protocol};

/// Name given to a dispatch function: `Name#method`, or `method`.
pub fn genfun_name(protocol: &Protocol, method: &str) -> String {
    match protocol.name() {
        Some(name) => format!("{name}#{method}"),
        None => method.to_string(),
    }
}

/// A method's declared signature in terms of slot names.
pub fn method_signature(protocol: &Protocol, method: &MethodDef, qualified: bool) -> String {
    let slots = method
        .slots()
        .iter()
        .filter_map(|&i| protocol.type_slots().get(i).map(String::as_str))
        .collect::<Vec<_>>()
        .join(", ");
    let name = if qualified {
        genfun_name(protocol, method.name())
    } else {
        method.name().to_string()
    };
    format!("{name}({slots})")
}

fn signature_of(protocol: &Protocol, method: &str, qualified: bool) -> String {
    match protocol.method(method) {
        Some(def) => method_signature(protocol, def, qualified),
        None => format!("{method}()"),
    }
}

/// Signatures of every method without a default body.
pub fn required_methods(protocol: &Protocol) -> Vec<String> {
    protocol
        .methods()
        .iter()
        .filter(|m| m.default_body().is_none())
        .map(|m| method_signature(protocol, m, false))
        .collect()
}

pub fn missing_implementation(protocol: &Protocol, method: &MethodDef) -> MissingImplementationError {
    MissingImplementationError {
        protocol: protocol.label().to_string(),
        method: method.name().to_string(),
        signature: method_signature(protocol, method, true),
        required: required_methods(protocol),
    }
}

pub fn unknown_method(protocol: &Protocol, method: &str) -> UnknownMethodError {
    UnknownMethodError {
        protocol: protocol.name().unwrap_or("the protocol").to_string(),
        method: method.to_string(),
        allowed: protocol
            .methods()
            .iter()
            .map(|m| method_signature(protocol, m, false))
            .collect(),
    }
}

pub fn too_many_types(protocol: &Protocol, actual: usize) -> ConfigurationError {
    ConfigurationError::TooManyTypes {
        protocol: protocol.name().unwrap_or("Protocol").to_string(),
        expected: protocol.type_slots().len(),
        actual,
    }
}

pub fn unsatisfied_constraint(protocol: &Protocol, required: &Protocol) -> ConstraintError {
    ConstraintError {
        protocol: protocol.label().to_string(),
        required: required.label().to_string(),
    }
}

/// How a call's receiver is named in a dispatch diagnostic.
fn receiver_name(host: &dyn Host, protocol: &Protocol, this: Option<&Value>) -> String {
    match this {
        None => protocol.name().unwrap_or("Protocol").to_string(),
        Some(Value::Protocol(id)) => Context::from_host(host)
            .ok()
            .and_then(|cx| cx.protocol(*id))
            .and_then(|p| p.name().map(str::to_string))
            .unwrap_or_else(|| "Protocol".to_string()),
        Some(value) => host.type_name(value.runtime_type()),
    }
}

/// How a registration target is named in a diagnostic.
pub fn target_name(cx: &Context, protocol: &Protocol, target: &Target) -> String {
    let value = target.to_value(protocol);
    match target {
        Target::Type(hash) => cx.type_name(*hash),
        _ => receiver_name(cx, protocol, Some(&value)),
    }
}

/// Build the error raised when no method of `protocol`'s `method` applies.
pub fn dispatch_error(
    host: &dyn Host,
    protocol: &Protocol,
    method: &str,
    this: Option<&Value>,
    args: &[Value],
) -> DispatchError {
    let receiver = receiver_name(host, protocol, this);
    let arg_types = args
        .iter()
        .map(|a| host.type_name(a.runtime_type()))
        .collect::<Vec<_>>()
        .join(", ");
    let prefix = protocol.name().map(|n| format!("{n}#")).unwrap_or_default();
    let requirement = if protocol.name().is_some() {
        signature_of(protocol, method, true)
    } else {
        format!(
            "the protocol {} belongs to",
            signature_of(protocol, method, false)
        )
    };

    DispatchError {
        protocol: Some(protocol.id()),
        method: method.to_string(),
        target: this.cloned(),
        args: args.to_vec(),
        message: format!(
            "No {receiver} impl for {prefix}{method}({arg_types}). You must implement \
             {requirement} in order to call {receiver}#{method}({arg_types})."
        ),
    }
}

/// Unmatched-dispatch handler raising a [`DispatchError`] for `method`.
pub fn unmatched_handler(protocol: Protocol, method: String) -> UnmatchedHandler {
    Rc::new(move |_: &Genfun, host: &dyn Host, this: Option<&Value>, args: &[Value]| {
        tracing::trace!(protocol = protocol.label(), method = %method, "dispatch failed");
        RuntimeError::Dispatch(dispatch_error(host, &protocol, &method, this, args))
    })
}
