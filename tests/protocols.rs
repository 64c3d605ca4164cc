//! Integration tests for protocol definitions and static implementations.
//!
//! These tests drive the public `Context` API end to end: defining
//! protocols, deriving them from defaults, and dispatching through the
//! protocol's own static surface.

use protoduck::{
    Context, Error, MethodBodies, MethodSpec, Protocol, ProtocolOptions, ProtocolSpec, RuntimeError,
    Value, builtins,
};

/// `neq` default that negates the protocol's own `eq`, found through the
/// dispatch function's protocol tag.
fn negated_eq() -> MethodSpec {
    MethodSpec::new(["b", "a"]).with_default(|ctx| {
        let cx = Context::from_host(ctx.host())?;
        let eq = ctx
            .genfun()
            .and_then(|gf| gf.tag("duck"))
            .and_then(|tag| tag.as_protocol())
            .and_then(|id| cx.protocol(id))
            .ok_or_else(|| RuntimeError::other("dispatch function has no protocol"))?;
        let equal = cx.call_static(&eq, "eq", ctx.args())?;
        Ok(Value::Bool(!equal.as_bool().unwrap_or_default()))
    })
}

fn derivable_eq(cx: &Context) -> Protocol {
    cx.define(
        ProtocolSpec::new(["a", "b"])
            .name("Eq")
            .method(
                "eq",
                MethodSpec::new(["a", "b"]).with_default(|ctx| Ok(Value::Bool(ctx.arg(0) == ctx.arg(1)))),
            )
            .method("neq", negated_eq()),
    )
    .expect("Failed to define Eq")
}

fn text(s: &'static str) -> impl Fn(&protoduck::CallContext<'_>) -> Result<Value, RuntimeError> + 'static {
    move |_| Ok(Value::from(s))
}

// =============================================================================
// Definitions
// =============================================================================

#[test]
fn test_define_collects_slots_and_methods() {
    let cx = Context::new();
    let eq = cx
        .define(
            ProtocolSpec::new(["a", "b"])
                .name("Eq")
                .method("eq", MethodSpec::new(["a", "b"]))
                .method("neq", MethodSpec::new(["b", "a"])),
        )
        .expect("Failed to define Eq");

    assert_eq!(eq.name(), Some("Eq"));
    assert_eq!(eq.type_slots(), &["a".to_string(), "b".to_string()]);
    assert_eq!(eq.method("eq").map(|m| m.slots().to_vec()), Some(vec![0, 1]));
    assert_eq!(eq.method("neq").map(|m| m.slots().to_vec()), Some(vec![1, 0]));
    assert!(!eq.is_derivable());
}

#[test]
fn test_define_rejects_unknown_slot() {
    let cx = Context::new();
    let err = cx
        .define(ProtocolSpec::new(["a"]).method("eq", MethodSpec::new(["a", "b"])))
        .unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_define_with_shared_options() {
    let cx = Context::new();
    let options = ProtocolOptions::new().name("Show").private();
    let show = cx
        .define(
            ProtocolSpec::method_style()
                .options(options.clone())
                .method("show", MethodSpec::empty()),
        )
        .expect("Failed to define Show");
    let debug = cx
        .define(
            ProtocolSpec::method_style()
                .options(options)
                .method("show", MethodSpec::empty()),
        )
        .expect("Failed to define second Show");

    assert_ne!(show, debug);
    assert!(show.is_private() && debug.is_private());
    assert_eq!(debug.name(), Some("Show"));

    let obj = Value::Object(cx.new_object());
    cx.implement(&show, (&obj, MethodBodies::new().with("show", |_| Ok(Value::from("shown")))))
        .expect("Failed to implement Show");
    assert!(cx.member(&obj, "show").is_none());
    assert_eq!(cx.send_key(&obj, &show.method_key("show"), &[]), Ok(Value::from("shown")));
    assert!(!cx.has_impl(&debug, &obj));
}

#[test]
fn test_static_surface_is_tagged() {
    let cx = Context::new();
    let show = cx
        .define(ProtocolSpec::method_style().name("Show").method("show", MethodSpec::empty()))
        .expect("Failed to define Show");

    let gf = cx
        .member(&Value::Protocol(show.id()), show.method_key("show"))
        .and_then(|m| m.as_genfun().cloned())
        .expect("static dispatch function");
    assert_eq!(gf.name(), "Show#show");
    assert_eq!(gf.tag("duck"), Some(Value::Protocol(show.id())));
}

// =============================================================================
// Derivation
// =============================================================================

#[test]
fn test_derivable_protocol_needs_no_bodies() {
    let cx = Context::new();
    let eq = derivable_eq(&cx);
    assert!(eq.is_derivable());

    cx.implement(&eq, [builtins::NUMBER, builtins::NUMBER])
        .expect("Failed to derive Eq");

    assert_eq!(
        cx.call_static(&eq, "eq", &[Value::Int(1), Value::Int(1)]),
        Ok(Value::Bool(true))
    );
    assert_eq!(
        cx.call_static(&eq, "neq", &[Value::Int(2), Value::Int(3)]),
        Ok(Value::Bool(true))
    );
    assert_eq!(
        cx.call_static(&eq, "neq", &[Value::Int(3), Value::Int(3)]),
        Ok(Value::Bool(false))
    );
}

#[test]
fn test_explicit_body_overrides_default() {
    let cx = Context::new();
    let eq = derivable_eq(&cx);

    cx.implement(
        &eq,
        (
            [builtins::STRING, builtins::STRING],
            MethodBodies::new().with("eq", |ctx| {
                let lower = |v: &Value| v.as_str().map(str::to_lowercase);
                Ok(Value::Bool(lower(ctx.arg(0)) == lower(ctx.arg(1))))
            }),
        ),
    )
    .expect("Failed to implement Eq");

    let (a, b) = (Value::from("Duck"), Value::from("dUCK"));
    assert_eq!(cx.call_static(&eq, "eq", &[a.clone(), b.clone()]), Ok(Value::Bool(true)));
    // The derived neq goes back through the overridden eq.
    assert_eq!(cx.call_static(&eq, "neq", &[a, b]), Ok(Value::Bool(false)));
}

#[test]
fn test_non_derivable_needs_every_body() {
    let cx = Context::new();
    let show = cx
        .define(
            ProtocolSpec::new(["a"])
                .name("Show")
                .method("show", MethodSpec::new(["a"]))
                .method("debug", MethodSpec::new(["a"]).with_default(text("debug"))),
        )
        .expect("Failed to define Show");
    assert!(!show.is_derivable());

    let err = cx.implement(&show, [builtins::NUMBER]).unwrap_err();
    assert!(err.is_missing_implementation());
    assert!(err.to_string().contains("Show#show(a)"));
    assert!(!cx.has_impl_for(&show, &show, &[builtins::NUMBER]));
}

// =============================================================================
// Static implementations
// =============================================================================

#[test]
fn test_static_dispatch() {
    let cx = Context::new();
    let eq = cx
        .define(ProtocolSpec::new(["a", "b"]).name("Eq").method("eq", MethodSpec::new(["a", "b"])))
        .expect("Failed to define Eq");
    cx.implement(
        &eq,
        (
            [builtins::NUMBER, builtins::NUMBER],
            MethodBodies::new().with("eq", |ctx| Ok(Value::Bool(ctx.arg(0) == ctx.arg(1)))),
        ),
    )
    .expect("Failed to implement Eq");

    assert_eq!(
        cx.call_static(&eq, "eq", &[Value::Int(1), Value::Int(1)]),
        Ok(Value::Bool(true))
    );

    let err = cx
        .call_static(&eq, "eq", &[Value::from("a"), Value::Int(1)])
        .unwrap_err();
    let dispatch = err.as_dispatch().expect("dispatch error");
    assert_eq!(
        dispatch.message,
        "No Eq impl for Eq#eq(String, Number). You must implement Eq#eq(a, b) in order to call Eq#eq(String, Number)."
    );
}

#[test]
fn test_no_registrations_fail_dispatch() {
    let cx = Context::new();
    let eq = cx
        .define(ProtocolSpec::new(["a", "b"]).method("eq", MethodSpec::new(["a", "b"])))
        .expect("Failed to define protocol");

    let err = cx
        .call_static(&eq, "eq", &[Value::Int(1), Value::Int(1)])
        .unwrap_err();
    assert!(err.as_dispatch().is_some());
    assert!(err.to_string().starts_with("No Protocol impl for eq(Number, Number)."));
}

#[test]
fn test_missing_types_are_any() {
    let cx = Context::new();
    let foo = cx
        .define(ProtocolSpec::new(["a", "b"]).name("Foo").method("frob", MethodSpec::new(["a", "b"])))
        .expect("Failed to define Foo");
    cx.implement(
        &foo,
        (
            [builtins::NUMBER],
            MethodBodies::new().with("frob", |ctx| {
                Ok(match (ctx.arg(0), ctx.arg(1)) {
                    (Value::Int(a), Value::Int(b)) => Value::Int(a + b),
                    (a, b) => Value::from(format!("{}{}", display(a), display(b))),
                })
            }),
        ),
    )
    .expect("Failed to implement Foo");

    assert_eq!(
        cx.call_static(&foo, "frob", &[Value::Int(1), Value::Int(2)]),
        Ok(Value::Int(3))
    );
    assert_eq!(
        cx.call_static(&foo, "frob", &[Value::Int(1), Value::from("two")]),
        Ok(Value::from("1two"))
    );
    assert!(
        cx.call_static(&foo, "frob", &[Value::from("str"), Value::Int(1)])
            .unwrap_err()
            .as_dispatch()
            .is_some()
    );
}

fn display(v: &Value) -> String {
    match v {
        Value::Int(n) => n.to_string(),
        Value::Str(s) => s.to_string(),
        other => other.kind_name().to_string(),
    }
}

#[test]
fn test_too_many_types() {
    let cx = Context::new();
    let eq = cx
        .define(ProtocolSpec::new(["a", "b"]).name("Eq").method("eq", MethodSpec::new(["a", "b"])))
        .expect("Failed to define Eq");

    let err = cx
        .implement(
            &eq,
            (
                [builtins::NUMBER, builtins::NUMBER, builtins::NUMBER],
                MethodBodies::new().with("eq", text("nope")),
            ),
        )
        .unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(
        err.to_string(),
        "Eq expects to be defined across 2 types, but 3 were specified"
    );
    assert!(!cx.has_impl_for(&eq, &eq, &[builtins::NUMBER, builtins::NUMBER]));
}

#[test]
fn test_extra_method_is_rejected() {
    let cx = Context::new();
    let eq = cx
        .define(ProtocolSpec::new(["a", "b"]).name("Eq").method("eq", MethodSpec::new(["a", "b"])))
        .expect("Failed to define Eq");

    let err = cx
        .implement(
            &eq,
            (
                [builtins::NUMBER, builtins::NUMBER],
                MethodBodies::new().with("eq", text("eq")).with("extra", text("extra")),
            ),
        )
        .unwrap_err();
    assert!(matches!(err, Error::UnknownMethod(_)));
    assert!(err.to_string().contains("extra"));
    assert!(!cx.has_impl_for(&eq, &eq, &[builtins::NUMBER, builtins::NUMBER]));
}

#[test]
fn test_missing_method_installs_nothing() {
    let cx = Context::new();
    let eq = cx
        .define(
            ProtocolSpec::new(["a", "b"])
                .name("Eq")
                .method("eq", MethodSpec::new(["a", "b"]))
                .method("neq", MethodSpec::new(["b", "a"])),
        )
        .expect("Failed to define Eq");

    let err = cx
        .implement(
            &eq,
            ([builtins::NUMBER, builtins::NUMBER], MethodBodies::new().with("eq", text("eq"))),
        )
        .unwrap_err();
    assert!(err.is_missing_implementation());
    assert!(!cx.has_impl_for(&eq, &eq, &[builtins::NUMBER, builtins::NUMBER]));
    assert!(
        cx.call_static(&eq, "eq", &[Value::Int(1), Value::Int(1)])
            .unwrap_err()
            .as_dispatch()
            .is_some()
    );
}

#[test]
fn test_reregistration_replaces_body() {
    let cx = Context::new();
    let show = cx
        .define(ProtocolSpec::new(["a"]).name("Show").method("show", MethodSpec::new(["a"])))
        .expect("Failed to define Show");

    for body in ["first", "second"] {
        cx.implement(
            &show,
            ([builtins::NUMBER], MethodBodies::new().with("show", text(body))),
        )
        .expect("Failed to implement Show");
    }
    assert_eq!(
        cx.call_static(&show, "show", &[Value::Int(1)]),
        Ok(Value::from("second"))
    );
}
