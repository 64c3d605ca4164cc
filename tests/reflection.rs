//! Integration tests for conformance queries.

use protoduck::{
    Context, MethodBodies, MethodSpec, NativeFn, Protocol, ProtocolSpec, Target, Value, builtins,
    has_impl, is_derivable,
};

fn noop() -> NativeFn {
    NativeFn::new(|_| Ok(Value::Null))
}

fn foo_bar(cx: &Context, spec: ProtocolSpec) -> Protocol {
    cx.define(
        spec.method("foo", MethodSpec::empty())
            .method("bar", MethodSpec::empty()),
    )
    .expect("Failed to define protocol")
}

fn foo_bar_bodies() -> MethodBodies {
    MethodBodies::new().with_fn("foo", noop()).with_fn("bar", noop())
}

// =============================================================================
// is_derivable
// =============================================================================

#[test]
fn test_derivable_when_every_method_has_default() {
    let cx = Context::new();
    let derivable = cx
        .define(
            ProtocolSpec::method_style()
                .method("foo", MethodSpec::empty().with_default_fn(noop()))
                .method("bar", MethodSpec::empty().with_default_fn(noop())),
        )
        .expect("Failed to define protocol");
    let partial = cx
        .define(
            ProtocolSpec::method_style()
                .method("foo", MethodSpec::empty().with_default_fn(noop()))
                .method("bar", MethodSpec::empty()),
        )
        .expect("Failed to define protocol");
    let empty = cx
        .define(ProtocolSpec::method_style())
        .expect("Failed to define protocol");

    assert!(is_derivable(&derivable));
    assert!(!is_derivable(&partial));
    assert!(is_derivable(&empty));
}

// =============================================================================
// has_impl
// =============================================================================

#[test]
fn test_method_style_impls() {
    let cx = Context::new();
    let proto = foo_bar(&cx, ProtocolSpec::method_style());
    let obj = cx.new_object();
    let other = cx.new_object();

    assert!(!cx.has_impl(&proto, &obj));
    cx.implement(&proto, (&obj, foo_bar_bodies()))
        .expect("Failed to implement protocol");

    assert!(cx.has_impl(&proto, &obj));
    assert!(!cx.has_impl(&proto, &other));
    assert!(!cx.has_impl(&proto, builtins::NUMBER));
}

#[test]
fn test_static_multimethod_impls() {
    let cx = Context::new();
    let proto = foo_bar(&cx, ProtocolSpec::new(["a", "b"]));
    let (one, two) = (cx.new_object(), cx.new_object());
    let (t1, t2) = (one.type_hash(), two.type_hash());

    assert!(!cx.has_impl_for(&proto, &proto, &[t1, t2]));
    cx.implement(&proto, ([t1, t2], foo_bar_bodies()))
        .expect("Failed to implement protocol");

    assert!(has_impl(&cx, &proto, None, Some(&[t1, t2])));
    assert!(cx.has_impl_for(&proto, Target::Static, &[t1, t2]));
    assert!(!cx.has_impl_for(&proto, Target::Static, &[t2, t1]));
    assert!(!cx.has_impl_for(&proto, Target::Static, &[t1]));
    assert!(!cx.has_impl_for(&proto, Target::Static, &[t1, t2, t1]));
}

#[test]
fn test_object_multimethod_impls() {
    let cx = Context::new();
    let proto = foo_bar(&cx, ProtocolSpec::new(["a"]));
    let (one, two) = (cx.new_object(), cx.new_object());
    let (t1, t2) = (one.type_hash(), two.type_hash());

    cx.implement(&proto, (&one, [t2], foo_bar_bodies()))
        .expect("Failed to implement protocol");

    assert!(cx.has_impl_for(&proto, &one, &[t2]));
    assert!(!cx.has_impl_for(&proto, &two, &[t1]));
    assert!(!cx.has_impl_for(&proto, &Value::Int(5), &[t1]));
    assert!(!cx.has_impl_for(&proto, &cx.new_object(), &[t2]));
}

#[test]
fn test_inherited_impls() {
    let cx = Context::new();
    let proto = foo_bar(&cx, ProtocolSpec::new(["a"]));
    let parent = cx.new_object();
    let child = cx.object_from(&parent);

    cx.implement(&proto, (&parent, [builtins::NUMBER], foo_bar_bodies()))
        .expect("Failed to implement protocol");

    assert!(cx.has_impl_for(&proto, &child, &[builtins::NUMBER]));
    assert!(!cx.has_impl_for(&proto, &child, &[builtins::STRING]));
}

#[test]
fn test_typed_protocol_on_types() {
    let cx = Context::new();
    let eq = cx
        .define(
            ProtocolSpec::new(["a", "b"])
                .name("Eq")
                .method("eq", MethodSpec::new(["a", "b"]))
                .method("neq", MethodSpec::new(["b", "a"]).with_default_fn(noop())),
        )
        .expect("Failed to define Eq");
    let pair = [builtins::NUMBER, builtins::NUMBER];

    assert!(!cx.has_impl_for(&eq, builtins::NUMBER, &pair));
    cx.implement(
        &eq,
        (builtins::NUMBER, pair, MethodBodies::new().with_fn("eq", noop())),
    )
    .expect("Failed to implement Eq");

    assert!(cx.has_impl_for(&eq, builtins::NUMBER, &pair));
    assert!(!cx.has_impl_for(&eq, builtins::NUMBER, &[builtins::NUMBER, builtins::STRING]));
    assert!(cx.has_impl(&eq, builtins::NUMBER));
    assert!(!cx.has_impl(&eq, builtins::STRING));
}

#[test]
fn test_static_surface_not_implemented_until_registered() {
    let cx = Context::new();
    let eq = cx
        .define(
            ProtocolSpec::new(["a", "b"])
                .name("Eq")
                .method("eq", MethodSpec::new(["a", "b"]))
                .method("neq", MethodSpec::new(["b", "a"])),
        )
        .expect("Failed to define Eq");

    assert!(!cx.has_impl(&eq, &eq));
    assert!(!has_impl(&cx, &eq, None, None));

    // `neq` has neither a body nor a default.
    let err = cx
        .implement(&eq, ([builtins::NUMBER], MethodBodies::new().with_fn("eq", noop())))
        .unwrap_err();
    assert!(err.is_missing_implementation());
    assert!(!cx.has_impl(&eq, &eq));

    cx.implement(
        &eq,
        (
            [builtins::NUMBER],
            MethodBodies::new().with_fn("eq", noop()).with_fn("neq", noop()),
        ),
    )
    .expect("Failed to implement Eq");
    assert!(cx.has_impl(&eq, &eq));
    assert!(cx.has_impl(&eq, Target::Static));
}
