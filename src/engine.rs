//! Dispatch engine adapter.
//!
//! The conformance layer only touches generic functions through these
//! primitives.

use std::rc::Rc;

use protoduck_core::{Genfun, NativeFn, TypeHash, UnmatchedHandler, Value};

/// Create a dispatch function, optionally with a fallback body.
pub fn create_dispatch_function(name: impl Into<String>, default: Option<NativeFn>) -> Rc<Genfun> {
    let gf = Genfun::new(name, default);
    tracing::debug!(genfun = gf.name(), fallback = gf.default_body().is_some(), "created dispatch function");
    gf
}

/// Add a method for an ordered tuple of concrete types.
///
/// An identical tuple replaces the previous body.
pub fn add_method(gf: &Genfun, tuple: Vec<TypeHash>, body: NativeFn) {
    let arity = tuple.len();
    let replaced = gf.add_method(tuple, body);
    tracing::trace!(genfun = gf.name(), arity, replaced, "added method");
}

/// Replace the unmatched-dispatch behavior of `gf`.
pub fn on_unmatched_dispatch(gf: &Genfun, handler: UnmatchedHandler) {
    gf.on_unmatched(handler);
}

/// Whether `gf` has a method for exactly this tuple.
pub fn has_method_for(gf: &Genfun, tuple: &[TypeHash]) -> bool {
    gf.has_method_for(tuple)
}

/// Whether a member counts as an existing implementation.
///
/// Plain functions always do. Dispatch functions do only once they can run
/// something.
pub fn is_implementation(member: &Value) -> bool {
    match member {
        Value::Function(_) => true,
        Value::Genfun(gf) => gf.has_behavior(),
        _ => false,
    }
}

/// Wrap a callable member as the fallback body of a new dispatch function.
pub fn as_fallback(member: &Value) -> Option<NativeFn> {
    match member {
        Value::Function(f) => Some(f.clone()),
        Value::Genfun(gf) => {
            let gf = gf.clone();
            Some(NativeFn::new(move |ctx| gf.call(ctx.host(), ctx.this(), ctx.args())))
        }
        _ => None,
    }
}
