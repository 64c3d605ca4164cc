//! Conformance queries.

use protoduck_core::{TypeHash, Value, builtins};

use crate::Context;
use crate::engine;
use crate::members::Target;
use crate::protocol::Protocol;

/// Whether `target` implements `protocol`.
///
/// Every declared method must resolve, on the target or anything it
/// derives from, to a dispatch function. A plain function in its place does
/// not count. With a type tuple, each dispatch function must also hold a
/// method for exactly that tuple, right-padded with `Any` and projected
/// through the method's slots. Without one, it must hold some method or a
/// fallback, so a freshly created dispatch function is not an
/// implementation.
///
/// An omitted target means the protocol's own static surface.
pub fn has_impl(
    cx: &Context,
    protocol: &Protocol,
    target: Option<&Target>,
    tuple: Option<&[TypeHash]>,
) -> bool {
    let slot_count = protocol.type_slots().len();
    let tuple = match tuple {
        Some(types) if types.len() > slot_count => return false,
        Some(types) => {
            let mut padded = types.to_vec();
            padded.resize(slot_count, builtins::ANY);
            Some(padded)
        }
        None => None,
    };

    let table = target.unwrap_or(&Target::Static).table(protocol);
    protocol.methods().iter().all(|method| {
        match cx.lookup_member(table, &protocol.method_key(method.name())) {
            Some(Value::Genfun(gf)) => match &tuple {
                Some(tuple) => engine::has_method_for(&gf, &method.project(tuple)),
                None => gf.has_behavior(),
            },
            _ => false,
        }
    })
}

/// Whether every method of `protocol` has a default body.
pub fn is_derivable(protocol: &Protocol) -> bool {
    protocol.is_derivable()
}
