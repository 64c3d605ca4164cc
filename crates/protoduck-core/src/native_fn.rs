//! Callable bodies and their execution context.
//!
//! Every method body, default body and plain function is a [`NativeFn`]. A
//! body receives a [`CallContext`] giving it the receiver, the positional
//! arguments, and the next-method continuation of the dispatch function that
//! selected it.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::{Genfun, RuntimeError, TypeHash, Value};

/// Services a dispatch engine needs from whoever owns the types.
///
/// Implemented by the context that owns the type registry and member tables.
/// Bodies can recover the concrete host through [`Host::as_any`].
pub trait Host {
    /// Linearized ancestry of a type, most specific first.
    fn precedence(&self, ty: TypeHash) -> Vec<TypeHash>;

    /// Name of a type for diagnostics.
    fn type_name(&self, ty: TypeHash) -> String;

    /// The concrete host, for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// Trait for callable bodies.
pub trait NativeCallable {
    /// Call this function with the given context.
    fn call(&self, ctx: &CallContext<'_>) -> Result<Value, RuntimeError>;
}

impl<F> NativeCallable for F
where
    F: Fn(&CallContext<'_>) -> Result<Value, RuntimeError>,
{
    fn call(&self, ctx: &CallContext<'_>) -> Result<Value, RuntimeError> {
        (self)(ctx)
    }
}

/// Type-erased callable body.
///
/// Cloning shares the underlying callable; equality is identity.
#[derive(Clone)]
pub struct NativeFn {
    inner: Rc<dyn NativeCallable>,
}

impl NativeFn {
    /// Wrap a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&CallContext<'_>) -> Result<Value, RuntimeError> + 'static,
    {
        Self { inner: Rc::new(f) }
    }

    /// Wrap any other callable.
    pub fn from_callable<C>(callable: C) -> Self
    where
        C: NativeCallable + 'static,
    {
        Self {
            inner: Rc::new(callable),
        }
    }

    /// Call this function with an existing context.
    pub fn call(&self, ctx: &CallContext<'_>) -> Result<Value, RuntimeError> {
        self.inner.call(ctx)
    }

    /// Call this function as a plain function, with no next method.
    pub fn invoke(
        &self,
        host: &dyn Host,
        this: Option<&Value>,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        let ctx = CallContext::new(host, this, args);
        self.inner.call(&ctx)
    }

    /// Check whether two handles share the same callable.
    pub fn ptr_eq(&self, other: &NativeFn) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn").finish_non_exhaustive()
    }
}

/// Context for a body invocation.
///
/// Holds the receiver, the arguments and the remainder of the method chain.
/// `call_next()` re-invokes the next less specific method with the same
/// receiver and arguments.
pub struct CallContext<'a> {
    host: &'a dyn Host,
    this: Option<&'a Value>,
    args: &'a [Value],
    next: &'a [NativeFn],
    genfun: Option<&'a Genfun>,
}

impl<'a> CallContext<'a> {
    /// Create a context for a plain call.
    pub fn new(host: &'a dyn Host, this: Option<&'a Value>, args: &'a [Value]) -> Self {
        Self {
            host,
            this,
            args,
            next: &[],
            genfun: None,
        }
    }

    pub(crate) fn for_chain(
        host: &'a dyn Host,
        this: Option<&'a Value>,
        args: &'a [Value],
        next: &'a [NativeFn],
        genfun: &'a Genfun,
    ) -> Self {
        Self {
            host,
            this,
            args,
            next,
            genfun: Some(genfun),
        }
    }

    /// The host that owns the dispatch tables.
    pub fn host(&self) -> &'a dyn Host {
        self.host
    }

    /// The receiver of a method-style call.
    pub fn this(&self) -> Option<&'a Value> {
        self.this
    }

    /// All positional arguments.
    pub fn args(&self) -> &'a [Value] {
        self.args
    }

    /// Number of positional arguments.
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// A positional argument; `Null` when absent.
    pub fn arg(&self, index: usize) -> &'a Value {
        const NULL: &Value = &Value::Null;
        self.args.get(index).unwrap_or(NULL)
    }

    /// The dispatch function that selected this body, if any.
    pub fn genfun(&self) -> Option<&'a Genfun> {
        self.genfun
    }

    /// Whether a less specific method remains in the chain.
    pub fn has_next(&self) -> bool {
        !self.next.is_empty()
    }

    /// Invoke the next less specific method.
    ///
    /// Past the end of the chain this raises the dispatch function's
    /// unmatched-dispatch condition.
    pub fn call_next(&self) -> Result<Value, RuntimeError> {
        match (self.next.split_first(), self.genfun) {
            (Some((body, rest)), Some(genfun)) => {
                let ctx = CallContext::for_chain(self.host, self.this, self.args, rest, genfun);
                body.call(&ctx)
            }
            (_, Some(genfun)) => Err(genfun.unmatched(self.host, self.this, self.args)),
            (_, None) => Err(RuntimeError::other("call_next() outside of a dispatch function")),
        }
    }
}
