//! Implementation registration.
//!
//! [`Context::implement`](crate::Context::implement) attaches method bodies
//! to a target for a tuple of concrete types. It accepts the same shapes a
//! registration can take:
//!
//! | Shape                         | Meaning                                  |
//! |-------------------------------|------------------------------------------|
//! | `bodies`                      | static, no types                         |
//! | `(types, bodies)`             | static, explicit types                   |
//! | `types`                       | static, explicit types, default bodies   |
//! | `(target, bodies)`            | target, no types                         |
//! | `(target, types, bodies)`     | target, explicit types                   |
//! | `(target, types)` / `target`  | target, default bodies                   |
//!
//! A target is a [`Target`], a type, an object, a protocol, or any value,
//! which stands for its object or its runtime type.
//!
//! Static registrations use the protocol's own surface as the target. A
//! type target makes the methods visible to every value of that type and of
//! its subtypes.
//!
//! Registration validates everything before installing anything:
//!
//! 1. The type tuple is no longer than the protocol's slot list, and is
//!    right-padded with `Any`
//! 2. Every method resolves to an explicit body, a default body, or an
//!    implementation already present on the target
//! 3. Every explicit body names a declared method
//! 4. Every prerequisite protocol is implemented
//!
//! Installation then creates or reuses each method's dispatch function on the
//! target and adds the body for the method's projection of the type tuple,
//! both through the protocol's metaobject. A body registered again for an
//! identical tuple replaces the previous one.

use std::rc::Rc;

use protoduck_core::{
    CallContext, Genfun, NativeFn, ObjectRef, Result, RuntimeError, TypeHash, Value, builtins,
};

use crate::constraint;
use crate::diagnostics;
use crate::engine;
use crate::members::{MemberKey, TableKey, Target};
use crate::mop;
use crate::protocol::Protocol;
use crate::Context;

/// Method bodies of one registration, in the order given.
#[derive(Debug, Clone, Default)]
pub struct MethodBodies {
    entries: Vec<(String, NativeFn)>,
}

impl MethodBodies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a body. A later body for the same name wins.
    pub fn with<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&CallContext<'_>) -> std::result::Result<Value, RuntimeError> + 'static,
    {
        self.with_fn(name, NativeFn::new(f))
    }

    pub fn with_fn(mut self, name: impl Into<String>, f: NativeFn) -> Self {
        let name = name.into();
        self.entries.retain(|(n, _)| *n != name);
        self.entries.push((name, f));
        self
    }

    pub fn get(&self, name: &str) -> Option<&NativeFn> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Normalized arguments of a registration.
#[derive(Debug, Clone, Default)]
pub struct ImplArgs {
    target: Option<Target>,
    types: Vec<TypeHash>,
    bodies: Option<MethodBodies>,
}

impl ImplArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(mut self, target: impl Into<Target>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn types(mut self, types: impl IntoIterator<Item = TypeHash>) -> Self {
        self.types = types.into_iter().collect();
        self
    }

    pub fn bodies(mut self, bodies: MethodBodies) -> Self {
        self.bodies = Some(bodies);
        self
    }

    fn shape(target: Option<Target>, types: Vec<TypeHash>, bodies: Option<MethodBodies>) -> Self {
        Self {
            target,
            types,
            bodies,
        }
    }
}

impl From<()> for ImplArgs {
    fn from(_: ()) -> Self {
        Self::new()
    }
}

impl From<MethodBodies> for ImplArgs {
    fn from(bodies: MethodBodies) -> Self {
        Self::shape(None, Vec::new(), Some(bodies))
    }
}

impl From<Vec<TypeHash>> for ImplArgs {
    fn from(types: Vec<TypeHash>) -> Self {
        Self::shape(None, types, None)
    }
}

impl<const N: usize> From<[TypeHash; N]> for ImplArgs {
    fn from(types: [TypeHash; N]) -> Self {
        Self::shape(None, types.to_vec(), None)
    }
}

impl From<(Vec<TypeHash>, MethodBodies)> for ImplArgs {
    fn from((types, bodies): (Vec<TypeHash>, MethodBodies)) -> Self {
        Self::shape(None, types, Some(bodies))
    }
}

impl<const N: usize> From<([TypeHash; N], MethodBodies)> for ImplArgs {
    fn from((types, bodies): ([TypeHash; N], MethodBodies)) -> Self {
        Self::shape(None, types.to_vec(), Some(bodies))
    }
}

macro_rules! impl_target_shapes {
    ([$($lt:lifetime)?] $ty:ty) => {
        impl<$($lt)?> From<$ty> for ImplArgs {
            fn from(target: $ty) -> Self {
                Self::shape(Some(target.into()), Vec::new(), None)
            }
        }

        impl<$($lt)?> From<($ty, MethodBodies)> for ImplArgs {
            fn from((target, bodies): ($ty, MethodBodies)) -> Self {
                Self::shape(Some(target.into()), Vec::new(), Some(bodies))
            }
        }

        impl<$($lt)?> From<($ty, Vec<TypeHash>)> for ImplArgs {
            fn from((target, types): ($ty, Vec<TypeHash>)) -> Self {
                Self::shape(Some(target.into()), types, None)
            }
        }

        impl<$($lt,)? const N: usize> From<($ty, [TypeHash; N])> for ImplArgs {
            fn from((target, types): ($ty, [TypeHash; N])) -> Self {
                Self::shape(Some(target.into()), types.to_vec(), None)
            }
        }

        impl<$($lt)?> From<($ty, Vec<TypeHash>, MethodBodies)> for ImplArgs {
            fn from((target, types, bodies): ($ty, Vec<TypeHash>, MethodBodies)) -> Self {
                Self::shape(Some(target.into()), types, Some(bodies))
            }
        }

        impl<$($lt,)? const N: usize> From<($ty, [TypeHash; N], MethodBodies)> for ImplArgs {
            fn from((target, types, bodies): ($ty, [TypeHash; N], MethodBodies)) -> Self {
                Self::shape(Some(target.into()), types.to_vec(), Some(bodies))
            }
        }
    };
}

impl_target_shapes!([] Target);
impl_target_shapes!([] TypeHash);
impl_target_shapes!([] ObjectRef);
impl_target_shapes!(['a] &'a ObjectRef);
impl_target_shapes!(['a] &'a Protocol);
impl_target_shapes!(['a] &'a Value);

/// Validate and install one registration.
#[cfg_attr(feature = "profiling", profiling::function)]
pub(crate) fn implement(cx: &Context, protocol: &Protocol, args: ImplArgs) -> Result<()> {
    let ImplArgs {
        target,
        types,
        bodies,
    } = args;
    let target = target.unwrap_or(Target::Static);

    let slot_count = protocol.type_slots().len();
    if types.len() > slot_count {
        return Err(diagnostics::too_many_types(protocol, types.len()).into());
    }
    let mut tuple = types;
    tuple.resize(slot_count, builtins::ANY);

    let bodies = bodies.unwrap_or_default();
    let table = target.table(protocol);

    for method in protocol.methods() {
        let resolved = bodies.get(method.name()).is_some()
            || method.default_body().is_some()
            || existing_member(cx, protocol, table, method.name())
                .is_some_and(|m| engine::is_implementation(&m));
        if !resolved {
            return Err(diagnostics::missing_implementation(protocol, method).into());
        }
    }
    if let Some(extra) = bodies.names().find(|n| protocol.method(n).is_none()) {
        return Err(diagnostics::unknown_method(protocol, extra).into());
    }
    constraint::check_all(cx, protocol, &target, &tuple)?;

    tracing::debug!(
        protocol = protocol.label(),
        receiver = %diagnostics::target_name(cx, protocol, &target),
        bodies = bodies.len(),
        "registering implementation"
    );

    for method in protocol.methods() {
        ensure_genfun(cx, protocol, &target, method.name())?;
        if let Some(body) = bodies.get(method.name()).or(method.default_body()) {
            mop::add_method(
                cx,
                protocol,
                &target,
                method.name(),
                method.project(&tuple),
                body.clone(),
            )?;
        }
    }
    Ok(())
}

/// The member an implementation of `method` would find already on `table`.
///
/// Private protocols only look at their opaque key.
fn existing_member(cx: &Context, protocol: &Protocol, table: TableKey, method: &str) -> Option<Value> {
    cx.lookup_member(table, &protocol.method_key(method)).or_else(|| {
        if protocol.is_private() {
            None
        } else {
            cx.lookup_member(table, &MemberKey::from(method))
        }
    })
}

/// The target's own dispatch function for `method`, created through the
/// metaobject if needed.
///
/// A callable inherited by the target, or a plain function it already has,
/// becomes the new dispatch function's fallback.
pub(crate) fn ensure_genfun(
    cx: &Context,
    protocol: &Protocol,
    target: &Target,
    method: &str,
) -> Result<Rc<Genfun>> {
    let table = target.table(protocol);
    if let Some(Value::Genfun(gf)) = cx.own_member(table, &protocol.method_key(method)) {
        return Ok(gf);
    }

    let existing = existing_member(cx, protocol, table, method).and_then(|m| engine::as_fallback(&m));
    let gf = mop::create_genfun(cx, protocol, target, method, existing)?;
    install_genfun(cx, protocol, table, method, gf.clone());
    Ok(gf)
}

/// Store a dispatch function under its opaque key and, for public
/// protocols, under its plain name.
pub(crate) fn install_genfun(
    cx: &Context,
    protocol: &Protocol,
    table: TableKey,
    method: &str,
    gf: Rc<Genfun>,
) {
    tracing::trace!(protocol = protocol.label(), method, private = protocol.is_private(), "installing dispatch function");
    if !protocol.is_private() {
        cx.set_own_member(table, MemberKey::from(method), Value::Genfun(gf.clone()));
    }
    cx.set_own_member(table, protocol.method_key(method), Value::Genfun(gf));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MethodSpec, ProtocolSpec};
    use protoduck_core::Error;

    fn ret(s: &'static str) -> NativeFn {
        NativeFn::new(move |_| Ok(Value::from(s)))
    }

    #[test]
    fn shapes() {
        let obj = ObjectRef::new(TypeHash::from_instance(0));

        let args = ImplArgs::from(MethodBodies::new());
        assert!(args.target.is_none() && args.types.is_empty() && args.bodies.is_some());

        let args = ImplArgs::from([builtins::NUMBER, builtins::NUMBER]);
        assert!(args.target.is_none() && args.bodies.is_none());
        assert_eq!(args.types.len(), 2);

        let args = ImplArgs::from((builtins::NUMBER, MethodBodies::new()));
        assert_eq!(args.target, Some(Target::Type(builtins::NUMBER)));
        assert!(args.types.is_empty());

        let args = ImplArgs::from((&obj, [builtins::STRING], MethodBodies::new()));
        assert_eq!(args.target, Some(Target::Object(obj.clone())));
        assert_eq!(args.types, vec![builtins::STRING]);

        let args = ImplArgs::from((obj.clone(), vec![builtins::STRING]));
        assert!(args.bodies.is_none());

        let args = ImplArgs::new().target(&obj).types([builtins::LIST]);
        assert_eq!(args.types, vec![builtins::LIST]);
    }

    #[test]
    fn later_body_wins() {
        let bodies = MethodBodies::new()
            .with_fn("show", ret("first"))
            .with_fn("show", ret("second"));
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies.names().collect::<Vec<_>>(), vec!["show"]);
    }

    #[test]
    fn too_many_types_installs_nothing() {
        let cx = Context::new();
        let eq = cx
            .define(
                ProtocolSpec::new(["a", "b"])
                    .name("Eq")
                    .method("eq", MethodSpec::new(["a", "b"])),
            )
            .unwrap();
        let obj = cx.new_object();
        let err = cx
            .implement(
                &eq,
                (
                    &obj,
                    [builtins::NUMBER, builtins::STRING, builtins::NUMBER],
                    MethodBodies::new().with_fn("eq", ret("eq")),
                ),
            )
            .unwrap_err();

        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "Eq expects to be defined across 2 types, but 3 were specified"
        );
        assert_eq!(cx.own_member_count(Target::from(&obj).table(&eq)), 0);
    }

    #[test]
    fn private_installs_only_keys() {
        let cx = Context::new();
        let p = cx
            .define(
                ProtocolSpec::method_style()
                    .private()
                    .method("map", MethodSpec::empty())
                    .method("empty", MethodSpec::empty()),
            )
            .unwrap();
        let obj = Value::Object(cx.new_object());
        cx.set_member(&obj, "empty", "yup");

        cx.implement(
            &p,
            (
                Target::from(&obj),
                MethodBodies::new()
                    .with_fn("map", ret("map"))
                    .with_fn("empty", ret("empty")),
            ),
        )
        .unwrap();

        assert_eq!(cx.send_key(&obj, &p.method_key("map"), &[]), Ok(Value::from("map")));
        assert_eq!(cx.send_key(&obj, &p.method_key("empty"), &[]), Ok(Value::from("empty")));
        assert!(cx.member(&obj, "map").is_none());
        assert_eq!(cx.member(&obj, "empty"), Some(Value::from("yup")));
    }

    #[test]
    fn genfun_is_reused_across_registrations() {
        let cx = Context::new();
        let eq = cx
            .define(ProtocolSpec::new(["t"]).method("equals", MethodSpec::new(["t"])))
            .unwrap();

        cx.implement(
            &eq,
            (builtins::NUMBER, [builtins::STRING], MethodBodies::new().with_fn("equals", ret("numstr"))),
        )
        .unwrap();
        let first = cx.member(&Value::Int(0), "equals").unwrap();
        cx.implement(
            &eq,
            (builtins::NUMBER, [builtins::NUMBER], MethodBodies::new().with_fn("equals", ret("numnum"))),
        )
        .unwrap();
        let second = cx.member(&Value::Int(0), "equals").unwrap();

        assert_eq!(first, second);
        assert_eq!(second.as_genfun().map(|g| g.method_count()), Some(2));
    }

    #[test]
    fn unknown_method_is_rejected_before_install() {
        let cx = Context::new();
        let eq = cx
            .define(ProtocolSpec::new(["a"]).method("eq", MethodSpec::new(["a", "a"])))
            .unwrap();
        let err = cx
            .implement(
                &eq,
                (
                    [builtins::NUMBER],
                    MethodBodies::new()
                        .with_fn("eq", ret("eq"))
                        .with_fn("extra", ret("extra")),
                ),
            )
            .unwrap_err();
        assert!(matches!(err, Error::UnknownMethod(ref e) if e.method == "extra"));
        assert!(!cx.has_impl_for(&eq, Target::Static, &[builtins::NUMBER]));
    }
}
