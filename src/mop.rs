//! The metaobject protocol.
//!
//! Every dispatch function a protocol creates, and every method it adds,
//! goes through the metaobject protocol (`Protoduck`): one type slot, two
//! methods.
//!
//! | Method         | Arguments                                    |
//! |----------------|----------------------------------------------|
//! | `createGenfun` | protocol, target, method name, existing fn   |
//! | `addMethod`    | protocol, target, method name, types, body   |
//!
//! A protocol's [`MetaobjectBinding`] is either the bootstrap primitives,
//! called directly, or a list of metaobject layers. Each layer is any value
//! implementing `Protoduck`. A layer's method receives one extra trailing
//! argument: a function invoking the next behavior, which is the next layer
//! or, after the last one, the bootstrap primitive. `Protoduck` is derivable
//! and each default simply invokes the next behavior, so a layer may
//! override one method and leave the other alone.
//!
//! Naming the `Protoduck` protocol itself as a metaobject selects the
//! bootstrap binding. Overrides installed on `Protoduck` are then never
//! consulted. It cannot be combined with other layers.

use std::rc::Rc;

use protoduck_core::{
    CallContext, ConfigurationError, Genfun, NativeFn, ProtocolId, Result, RuntimeError, TypeHash,
    Value, builtins,
};

use crate::diagnostics;
use crate::engine;
use crate::members::{MemberKey, Target};
use crate::protocol::{MethodDef, Protocol, ProtocolFlags};
use crate::{Context, reflection, registrar};

/// Name of the metaobject protocol.
pub const MOP_NAME: &str = "Protoduck";

/// Tag on bootstrap-created dispatch functions holding their protocol.
pub const DUCK_TAG: &str = "duck";

/// How a protocol creates and extends its dispatch functions.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaobjectBinding {
    /// The primitive implementation, invoked as plain calls.
    Bootstrap,
    /// Metaobject layers, outermost first, ending at the bootstrap.
    Layered(Vec<Value>),
}

impl MetaobjectBinding {
    /// Whether the bootstrap primitives are used directly.
    pub fn is_bootstrap(&self) -> bool {
        matches!(self, MetaobjectBinding::Bootstrap)
    }
}

/// A method of the metaobject protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MopMethod {
    CreateGenfun,
    AddMethod,
}

impl MopMethod {
    pub fn name(self) -> &'static str {
        match self {
            MopMethod::CreateGenfun => "createGenfun",
            MopMethod::AddMethod => "addMethod",
        }
    }

    /// Number of arguments, not counting the next behavior.
    pub fn arity(self) -> usize {
        match self {
            MopMethod::CreateGenfun => 4,
            MopMethod::AddMethod => 5,
        }
    }
}

/// Build the metaobject protocol itself.
pub(crate) fn protocol(id: ProtocolId) -> Protocol {
    let methods = [MopMethod::CreateGenfun, MopMethod::AddMethod]
        .into_iter()
        .map(|m| MethodDef::new(m.name(), vec![0], Some(default_body(m))))
        .collect();

    Protocol::from_parts(
        id,
        Some(MOP_NAME.to_string()),
        vec!["duck".to_string()],
        methods,
        ProtocolFlags::METAOBJECT,
        Vec::new(),
        MetaobjectBinding::Bootstrap,
    )
}

/// Create the metaobject protocol's static dispatch functions and implement
/// it on its own surface with the default bodies.
pub(crate) fn install(cx: &Context) {
    let mop = cx.mop();
    let table = Target::Static.table(mop);
    for method in mop.methods() {
        let gf = bootstrap_create_genfun(mop, method.name(), None);
        if let Some(body) = method.default_body() {
            engine::add_method(&gf, vec![builtins::ANY], body.clone());
        }
        registrar::install_genfun(cx, mop, table, method.name(), gf);
    }
}

fn default_body(method: MopMethod) -> NativeFn {
    NativeFn::new(move |ctx| {
        let args = ctx.args();
        if args.len() > method.arity() {
            if let Some(Value::Function(next)) = args.last() {
                return next.invoke(ctx.host(), ctx.this(), &args[..method.arity()]);
            }
        }
        let cx = Context::from_host(ctx.host())?;
        bootstrap(cx, method, args)
    })
}

/// Invoke the next behavior from inside a metaobject method.
///
/// The continuation is the trailing function argument. Called with no
/// arguments, it reuses the ones the current method received.
pub fn call_next_behavior(ctx: &CallContext<'_>) -> std::result::Result<Value, RuntimeError> {
    match ctx.args().last() {
        Some(Value::Function(next)) => next.invoke(ctx.host(), ctx.this(), &[]),
        _ => Err(RuntimeError::other(
            "no next metaobject behavior in this call",
        )),
    }
}

/// Run a metaobject method's primitive implementation on value arguments.
fn bootstrap(
    cx: &Context,
    method: MopMethod,
    args: &[Value],
) -> std::result::Result<Value, RuntimeError> {
    let fname = method.name();
    let protocol = match args.first() {
        Some(Value::Protocol(id)) => cx.protocol(*id),
        _ => None,
    }
    .ok_or_else(|| arg_error(fname, 0, "protocol", args.first()))?;
    let target = Target::from(args.get(1).unwrap_or(&Value::Null));
    let name = args
        .get(2)
        .and_then(Value::as_str)
        .ok_or_else(|| arg_error(fname, 2, "string", args.get(2)))?;

    match method {
        MopMethod::CreateGenfun => {
            let existing = args.get(3).and_then(Value::as_function).cloned();
            Ok(Value::Genfun(bootstrap_create_genfun(&protocol, name, existing)))
        }
        MopMethod::AddMethod => {
            let tuple = args
                .get(3)
                .and_then(Value::as_list)
                .ok_or_else(|| arg_error(fname, 3, "list", args.get(3)))?
                .iter()
                .map(|v| v.as_type().unwrap_or(builtins::ANY))
                .collect();
            let body = args
                .get(4)
                .and_then(Value::as_function)
                .cloned()
                .ok_or_else(|| arg_error(fname, 4, "function", args.get(4)))?;
            bootstrap_add_method(cx, &protocol, &target, name, tuple, body)?;
            Ok(Value::Null)
        }
    }
}

fn arg_error(function: &str, index: usize, expected: &'static str, actual: Option<&Value>) -> RuntimeError {
    RuntimeError::ArgumentType {
        function: function.to_string(),
        index,
        expected,
        actual: actual.map_or("nothing", Value::kind_name),
    }
}

/// Create a dispatch function for `method` of `protocol`.
///
/// `existing` becomes the dispatch function's fallback. The diagnostic
/// unmatched-dispatch handler is installed and the function is tagged with
/// its protocol.
pub fn bootstrap_create_genfun(
    protocol: &Protocol,
    method: &str,
    existing: Option<NativeFn>,
) -> Rc<Genfun> {
    let gf = engine::create_dispatch_function(diagnostics::genfun_name(protocol, method), existing);
    engine::on_unmatched_dispatch(
        &gf,
        diagnostics::unmatched_handler(protocol.clone(), method.to_string()),
    );
    gf.set_tag(DUCK_TAG, Value::Protocol(protocol.id()));
    gf
}

/// Add a method to the dispatch function `target` holds for `method`.
pub fn bootstrap_add_method(
    cx: &Context,
    protocol: &Protocol,
    target: &Target,
    method: &str,
    tuple: Vec<TypeHash>,
    body: NativeFn,
) -> std::result::Result<(), RuntimeError> {
    let table = target.table(protocol);
    match cx.own_member(table, &protocol.method_key(method)) {
        Some(Value::Genfun(gf)) => {
            engine::add_method(&gf, tuple, body);
            Ok(())
        }
        _ => Err(RuntimeError::NoSuchMethod {
            receiver: diagnostics::target_name(cx, protocol, target),
            method: method.to_string(),
        }),
    }
}

/// Create a dispatch function through `protocol`'s metaobject.
pub(crate) fn create_genfun(
    cx: &Context,
    protocol: &Protocol,
    target: &Target,
    method: &str,
    existing: Option<NativeFn>,
) -> Result<Rc<Genfun>> {
    let layers = match protocol.metaobject() {
        MetaobjectBinding::Bootstrap => {
            return Ok(bootstrap_create_genfun(protocol, method, existing));
        }
        MetaobjectBinding::Layered(layers) => layers,
    };

    let args = vec![
        Value::Protocol(protocol.id()),
        target.to_value(protocol),
        Value::from(method),
        existing.map_or(Value::Null, Value::Function),
    ];
    match invoke_layers(cx, layers.clone().into(), MopMethod::CreateGenfun, args)? {
        Value::Genfun(gf) => Ok(gf),
        other => Err(ConfigurationError::InvalidMetaobject {
            protocol: protocol.label().to_string(),
            reason: format!(
                "createGenfun returned a {} instead of a dispatch function",
                other.kind_name()
            ),
        }
        .into()),
    }
}

/// Add a method through `protocol`'s metaobject.
pub(crate) fn add_method(
    cx: &Context,
    protocol: &Protocol,
    target: &Target,
    method: &str,
    tuple: Vec<TypeHash>,
    body: NativeFn,
) -> Result<()> {
    let layers = match protocol.metaobject() {
        MetaobjectBinding::Bootstrap => {
            return Ok(bootstrap_add_method(cx, protocol, target, method, tuple, body)?);
        }
        MetaobjectBinding::Layered(layers) => layers,
    };

    let args = vec![
        Value::Protocol(protocol.id()),
        target.to_value(protocol),
        Value::from(method),
        Value::list(tuple.into_iter().map(Value::Type)),
        Value::Function(body),
    ];
    invoke_layers(cx, layers.clone().into(), MopMethod::AddMethod, args)?;
    Ok(())
}

fn invoke_layers(
    cx: &Context,
    layers: Rc<[Value]>,
    method: MopMethod,
    mut args: Vec<Value>,
) -> std::result::Result<Value, RuntimeError> {
    let Some(layer) = layers.first().cloned() else {
        return bootstrap(cx, method, &args);
    };
    tracing::debug!(
        method = method.name(),
        remaining = layers.len() - 1,
        "invoking metaobject layer"
    );

    let rest: Rc<[Value]> = layers[1..].into();
    let captured = args.clone();
    let next = NativeFn::new(move |ctx| {
        let cx = Context::from_host(ctx.host())?;
        let args = if ctx.arg_count() == 0 {
            captured.clone()
        } else {
            ctx.args()[..ctx.arg_count().min(method.arity())].to_vec()
        };
        invoke_layers(cx, rest.clone(), method, args)
    });
    args.push(Value::Function(next));

    let key = MemberKey::private(cx.mop().id(), method.name());
    cx.send_key(&layer, &key, &args)
}

/// Validate the metaobjects named for a protocol.
pub(crate) fn resolve_binding(
    cx: &Context,
    label: &str,
    layers: Vec<Value>,
) -> std::result::Result<MetaobjectBinding, ConfigurationError> {
    let mop = cx.mop();
    let is_mop = |layer: &Value| *layer == Value::Protocol(mop.id());
    if layers.iter().all(is_mop) {
        return Ok(MetaobjectBinding::Bootstrap);
    }
    if layers.iter().any(is_mop) {
        return Err(ConfigurationError::InvalidMetaobject {
            protocol: label.to_string(),
            reason: format!("{MOP_NAME} cannot be layered with other metaobjects"),
        });
    }
    if let Some(bad) = layers
        .iter()
        .find(|layer| !reflection::has_impl(cx, mop, Some(&Target::from(*layer)), None))
    {
        return Err(ConfigurationError::InvalidMetaobject {
            protocol: label.to_string(),
            reason: format!("a {} that does not implement {MOP_NAME}", bad.kind_name()),
        });
    }
    Ok(MetaobjectBinding::Layered(layers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MethodBodies, MethodSpec, ProtocolSpec};

    #[test]
    fn mop_shape() {
        let cx = Context::new();
        let mop = cx.mop();
        assert_eq!(mop.name(), Some(MOP_NAME));
        assert_eq!(mop.type_slots(), &["duck".to_string()]);
        assert!(mop.is_derivable());
        assert!(mop.flags().contains(ProtocolFlags::METAOBJECT));
        assert!(mop.metaobject().is_bootstrap());
        assert!(cx.has_impl(mop, mop));
    }

    #[test]
    fn bootstrap_tags_genfun_with_protocol() {
        let cx = Context::new();
        let show = cx
            .define(ProtocolSpec::method_style().method("show", MethodSpec::empty()))
            .unwrap();
        let gf = bootstrap_create_genfun(&show, "show", None);
        assert_eq!(gf.tag(DUCK_TAG), Some(Value::Protocol(show.id())));
        assert!(gf.has_unmatched_handler());
        assert!(!gf.has_behavior());
    }

    #[test]
    fn mop_as_metaobject_is_bootstrap() {
        let cx = Context::new();
        let binding = resolve_binding(&cx, "Show", vec![Value::Protocol(cx.mop().id())]).unwrap();
        assert!(binding.is_bootstrap());
        assert!(resolve_binding(&cx, "Show", vec![]).unwrap().is_bootstrap());
    }

    #[test]
    fn mop_mixed_with_layers_is_rejected() {
        let cx = Context::new();
        let meta = cx.new_object();
        cx.implement(cx.mop(), (&meta, MethodBodies::new())).unwrap();

        let err = resolve_binding(
            &cx,
            "Show",
            vec![Value::Object(meta), Value::Protocol(cx.mop().id())],
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "metaobject for Show is invalid: Protoduck cannot be layered with other metaobjects"
        );

        let doubled = vec![Value::Protocol(cx.mop().id()); 2];
        assert!(resolve_binding(&cx, "Show", doubled).unwrap().is_bootstrap());
    }

    #[test]
    fn non_metaobject_is_rejected() {
        let cx = Context::new();
        let obj = cx.new_object();
        let err = resolve_binding(&cx, "Show", vec![Value::Object(obj)]).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidMetaobject { .. }));
    }

    #[test]
    fn partial_metaobject_is_accepted() {
        let cx = Context::new();
        let meta = cx.new_object();
        cx.implement(
            cx.mop(),
            (&meta, MethodBodies::new().with("addMethod", call_next_behavior)),
        )
        .unwrap();

        let binding = resolve_binding(&cx, "Show", vec![Value::Object(meta.clone())]).unwrap();
        assert_eq!(binding, MetaobjectBinding::Layered(vec![Value::Object(meta)]));
    }

    #[test]
    fn static_mop_calls_reach_bootstrap() {
        let cx = Context::new();
        let show = cx
            .define(ProtocolSpec::method_style().name("Show").method("show", MethodSpec::empty()))
            .unwrap();
        let result = cx
            .call_static(
                cx.mop(),
                "createGenfun",
                &[
                    Value::Protocol(show.id()),
                    Value::Null,
                    Value::from("show"),
                    Value::Null,
                ],
            )
            .unwrap();
        let gf = result.as_genfun().unwrap();
        assert_eq!(gf.name(), "Show#show");
        assert_eq!(gf.tag(DUCK_TAG), Some(Value::Protocol(show.id())));
    }

    #[test]
    fn call_next_behavior_without_continuation() {
        let cx = Context::new();
        let f = NativeFn::new(call_next_behavior);
        assert!(f.invoke(&cx, None, &[Value::Null]).is_err());
    }
}
