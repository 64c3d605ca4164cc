//! Generic functions: multiple dispatch over argument runtime types.
//!
//! A [`Genfun`] holds methods keyed by a tuple of specializer types. Calling
//! it selects every method whose specializers accept the arguments, orders
//! them from most to least specific, and runs the first. Bodies continue down
//! the chain with [`CallContext::call_next`].
//!
//! ## Algorithm
//!
//! 1. Compute the precedence list of each argument's runtime type
//! 2. Keep methods whose every specializer is `Any` or appears in the
//!    corresponding precedence list
//! 3. Rank by per-argument distance, compared left to right
//! 4. Append the fallback body, if any, as the last link
//! 5. Run the chain; an empty chain raises the unmatched-dispatch condition

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::{CallContext, Host, NativeFn, RuntimeError, TypeHash, Value, builtins};

/// Replacement for the default unmatched-dispatch behavior of one function.
///
/// Receives the dispatch function, the host, the receiver and the arguments,
/// and returns the error the call fails with.
pub type UnmatchedHandler = Rc<dyn Fn(&Genfun, &dyn Host, Option<&Value>, &[Value]) -> RuntimeError>;

/// A method of a generic function.
#[derive(Debug, Clone)]
pub struct Method {
    /// One specializer per dispatched argument.
    pub specializers: Vec<TypeHash>,
    /// The body run when this method is selected.
    pub body: NativeFn,
}

/// A generic function.
pub struct Genfun {
    name: String,
    default: Option<NativeFn>,
    methods: RefCell<Vec<Method>>,
    unmatched: RefCell<Option<UnmatchedHandler>>,
    tags: RefCell<FxHashMap<String, Value>>,
}

impl Genfun {
    /// Create a generic function with an optional fallback body.
    ///
    /// The fallback runs after every applicable method, or alone when no
    /// method applies.
    pub fn new(name: impl Into<String>, default: Option<NativeFn>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            default,
            methods: RefCell::new(Vec::new()),
            unmatched: RefCell::new(None),
            tags: RefCell::new(FxHashMap::default()),
        })
    }

    /// The function's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fallback body, if any.
    pub fn default_body(&self) -> Option<&NativeFn> {
        self.default.as_ref()
    }

    /// Number of installed methods.
    pub fn method_count(&self) -> usize {
        self.methods.borrow().len()
    }

    /// Whether calling this function can run anything at all.
    pub fn has_behavior(&self) -> bool {
        self.default.is_some() || self.method_count() > 0
    }

    /// Install a method.
    ///
    /// A method with an identical specializer tuple is replaced. Returns
    /// `true` when an existing method was replaced.
    pub fn add_method(&self, specializers: Vec<TypeHash>, body: NativeFn) -> bool {
        let mut methods = self.methods.borrow_mut();
        if let Some(existing) = methods
            .iter_mut()
            .find(|m| same_specializers(&m.specializers, &specializers))
        {
            existing.body = body;
            return true;
        }
        methods.push(Method { specializers, body });
        false
    }

    /// Whether a method is installed for exactly this specializer tuple.
    ///
    /// Missing trailing positions compare as `Any`.
    pub fn has_method_for(&self, specializers: &[TypeHash]) -> bool {
        self.methods
            .borrow()
            .iter()
            .any(|m| same_specializers(&m.specializers, specializers))
    }

    /// Replace the unmatched-dispatch behavior.
    pub fn on_unmatched(&self, handler: UnmatchedHandler) {
        *self.unmatched.borrow_mut() = Some(handler);
    }

    /// Whether an unmatched-dispatch handler is installed.
    pub fn has_unmatched_handler(&self) -> bool {
        self.unmatched.borrow().is_some()
    }

    /// Attach a tag.
    pub fn set_tag(&self, key: impl Into<String>, value: Value) {
        self.tags.borrow_mut().insert(key.into(), value);
    }

    /// Read a tag.
    pub fn tag(&self, key: &str) -> Option<Value> {
        self.tags.borrow().get(key).cloned()
    }

    /// Bodies of all applicable methods, most specific first.
    pub fn applicable_methods(&self, host: &dyn Host, args: &[Value]) -> Vec<NativeFn> {
        let precedences: Vec<Vec<TypeHash>> = args
            .iter()
            .map(|a| host.precedence(a.runtime_type()))
            .collect();

        let mut ranked: Vec<(Vec<usize>, NativeFn)> = self
            .methods
            .borrow()
            .iter()
            .filter_map(|m| {
                let distances = m
                    .specializers
                    .iter()
                    .enumerate()
                    .map(|(i, spec)| specializer_distance(*spec, precedences.get(i)))
                    .collect::<Option<Vec<_>>>()?;
                Some((distances, m.body.clone()))
            })
            .collect();

        ranked.sort_by(|a, b| a.0.cmp(&b.0));
        ranked.into_iter().map(|(_, body)| body).collect()
    }

    /// Call the function.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn call(
        &self,
        host: &dyn Host,
        this: Option<&Value>,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        let mut chain = self.applicable_methods(host, args);
        chain.extend(self.default.clone());

        match chain.split_first() {
            Some((first, rest)) => {
                let ctx = CallContext::for_chain(host, this, args, rest, self);
                first.call(&ctx)
            }
            None => Err(self.unmatched(host, this, args)),
        }
    }

    /// Build the error for a call with no applicable method.
    pub fn unmatched(&self, host: &dyn Host, this: Option<&Value>, args: &[Value]) -> RuntimeError {
        tracing::trace!(genfun = %self.name, args = args.len(), "no applicable method");

        let handler = self.unmatched.borrow().clone();
        match handler {
            Some(handler) => handler(self, host, this, args),
            None => RuntimeError::NoApplicableMethod {
                name: self.name.clone(),
                arg_types: args
                    .iter()
                    .map(|a| host.type_name(a.runtime_type()))
                    .collect(),
            },
        }
    }
}

impl fmt::Debug for Genfun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Genfun")
            .field("name", &self.name)
            .field("methods", &self.method_count())
            .field("has_default", &self.default.is_some())
            .finish_non_exhaustive()
    }
}

/// Distance of a specializer from an argument, `None` if it does not apply.
fn specializer_distance(spec: TypeHash, precedence: Option<&Vec<TypeHash>>) -> Option<usize> {
    if spec == builtins::ANY {
        return Some(usize::MAX);
    }
    precedence?.iter().position(|t| *t == spec)
}

fn same_specializers(a: &[TypeHash], b: &[TypeHash]) -> bool {
    let len = a.len().max(b.len());
    (0..len).all(|i| {
        a.get(i).copied().unwrap_or(builtins::ANY) == b.get(i).copied().unwrap_or(builtins::ANY)
    })
}
