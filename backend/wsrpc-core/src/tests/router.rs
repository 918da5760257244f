// Unit tests for handler registration and invocation routing

use crate::envelope::{Arguments, IntoArguments, InvocationDescriptor, TypedValue};
use crate::router::{
    HANDLER_FAILED_MESSAGE, InvocationRouter, METHOD_NOT_FOUND_MESSAGE, NO_VALUE_REASON,
    RouteOutcome,
};

use serde_json::json;

fn descriptor(method_name: &str, args: impl IntoArguments) -> InvocationDescriptor {
    InvocationDescriptor::new(method_name, args.into_arguments().unwrap(), "id-1")
}

fn demo_router() -> InvocationRouter {
    let mut router = InvocationRouter::new();
    router
        .register("add", |a: i32, b: i32| -> Result<i32, String> { Ok(a + b) })
        .register("echo", |text: String| -> Result<String, String> { Ok(text) })
        .register("ping", || -> Result<String, String> { Ok("pong".to_string()) });
    router
}

/// **VALUE**: Verifies the happy path from descriptor to typed return value.
///
/// **WHY THIS MATTERS**: This is the core of inbound RPC. Arguments must decode to the
/// handler's parameter types and the return value must carry its declared type name.
///
/// **BUG THIS CATCHES**: Would catch arguments passed out of order or a return value
/// tagged with the wrong type name.
#[test]
fn given_add_handler_when_routing_two_ints_then_returns_int_sum() {
    // GIVEN: A router with add(int, int)
    let router = demo_router();

    // WHEN: Routing add(2, 3)
    let outcome = router.route(&descriptor("add", (2, 3)));

    // THEN: Returned(5, "int")
    assert_eq!(
        outcome,
        RouteOutcome::Returned(TypedValue::new(json!(5), "int"))
    );
}

/// **VALUE**: Verifies the not-found reply for an unknown method.
///
/// **WHY THIS MATTERS**: The peer has to learn that it called something that does not exist
/// rather than waiting forever.
///
/// **BUG THIS CATCHES**: Would catch a missing method producing no reply or a panic.
#[test]
fn given_unknown_method_when_invoked_then_reply_carries_not_found_message() {
    // GIVEN: A router without "nope"
    let router = demo_router();

    // WHEN: Invoking nope()
    let reply = router.invoke(&descriptor("nope", ()));

    // THEN: The reply is a failure addressed to the same identifier
    assert_eq!(reply.identifier, "id-1");
    assert_eq!(reply.result, None);
    assert_eq!(reply.error.as_deref(), Some(METHOD_NOT_FOUND_MESSAGE));
}

/// **VALUE**: Verifies that argument types are part of the lookup key.
///
/// **WHY THIS MATTERS**: add("a", "b") must not reach the int handler and fail to decode
/// halfway through; it simply has no matching handler.
///
/// **BUG THIS CATCHES**: Would catch lookup by name only.
#[test]
fn given_add_registered_for_ints_when_called_with_strings_then_not_found() {
    let router = demo_router();

    let outcome = router.route(&descriptor("add", ("a", "b")));

    assert_eq!(outcome, RouteOutcome::NotFound);
}

/// **VALUE**: Verifies that overloads with the same name are kept apart.
///
/// **BUG THIS CATCHES**: Would catch a second registration replacing the first when only
/// the argument types differ.
#[test]
fn given_two_overloads_when_routing_each_then_each_handler_runs() {
    // GIVEN: add(int, int) and add(double, double)
    let mut router = demo_router();
    router.register("add", |a: f64, b: f64| -> Result<f64, String> { Ok(a + b) });

    // WHEN: Routing both
    let ints = router.route(&descriptor("add", (1, 2)));
    let doubles = router.route(&descriptor("add", (1.5f64, 2.0f64)));

    // THEN: Each reaches its own handler
    assert_eq!(ints, RouteOutcome::Returned(TypedValue::new(json!(3), "int")));
    assert_eq!(
        doubles,
        RouteOutcome::Returned(TypedValue::new(json!(3.5), "double"))
    );
    assert_eq!(router.len(), 4);
}

/// **VALUE**: Verifies that a handler error becomes the generic failure reply.
///
/// **WHY THIS MATTERS**: Internal error text is kept out of the reply; the peer sees
/// a fixed message and the details go to the log.
///
/// **BUG THIS CATCHES**: Would catch handler errors being reported as not-found or leaking
/// their message.
#[test]
fn given_failing_handler_when_invoked_then_reply_carries_handler_failed_message() {
    // GIVEN: A handler that always errors
    let mut router = InvocationRouter::new();
    router.register("explode", |_text: String| -> Result<String, String> {
        Err("secret detail".to_string())
    });

    // WHEN: Routing and invoking
    let outcome = router.route(&descriptor("explode", ("x",)));
    let reply = router.invoke(&descriptor("explode", ("x",)));

    // THEN: Failed with the handler's reason, reply with the fixed message
    assert_eq!(outcome, RouteOutcome::Failed("secret detail".to_string()));
    assert_eq!(reply.error.as_deref(), Some(HANDLER_FAILED_MESSAGE));
}

/// **VALUE**: Verifies that a panicking handler does not take the dispatcher down.
///
/// **WHY THIS MATTERS**: Handlers are application code. A panic must turn into a failure
/// reply so the peer is told and the session keeps running.
///
/// **BUG THIS CATCHES**: Would catch `catch_unwind` being removed from `route`.
#[test]
fn given_panicking_handler_when_routed_then_failed_with_panic_reason() {
    // GIVEN: A handler that panics
    let mut router = InvocationRouter::new();
    router.register("crash", || -> Result<i32, String> { panic!("boom") });

    // WHEN: Routing it
    let outcome = router.route(&descriptor("crash", ()));

    // THEN: Failed and the reason mentions the panic
    match outcome {
        RouteOutcome::Failed(reason) => {
            assert!(reason.contains("panicked"));
            assert!(reason.contains("boom"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}

/// **VALUE**: Verifies that a handler producing no value is a failure.
///
/// **WHY THIS MATTERS**: An awaited call expects a value back. Replying with neither result
/// nor error would leave the peer with nothing usable.
///
/// **BUG THIS CATCHES**: Would catch `()` or `None` being sent as a null result.
#[test]
fn given_handlers_without_value_when_routed_then_failed_with_no_value_reason() {
    // GIVEN: A unit handler and an Option handler
    let mut router = InvocationRouter::new();
    router
        .register("log", |_line: String| -> Result<(), String> { Ok(()) })
        .register("find", |key: i32| -> Result<Option<String>, String> {
            Ok((key == 1).then(|| "one".to_string()))
        });

    // WHEN: Routing calls that produce nothing
    let unit = router.route(&descriptor("log", ("hello",)));
    let missing = router.route(&descriptor("find", (2,)));
    let found = router.route(&descriptor("find", (1,)));

    // THEN: No value is a failure, Some(value) is returned
    assert_eq!(unit, RouteOutcome::Failed(NO_VALUE_REASON.to_string()));
    assert_eq!(missing, RouteOutcome::Failed(NO_VALUE_REASON.to_string()));
    assert_eq!(
        found,
        RouteOutcome::Returned(TypedValue::new(json!("one"), "string"))
    );
}

/// **VALUE**: Verifies zero-argument handlers and the empty argument pair.
#[test]
fn given_zero_arg_handler_when_routed_with_no_arguments_then_returns() {
    let router = demo_router();

    let outcome = router.route(&descriptor("ping", ()));

    assert_eq!(
        outcome,
        RouteOutcome::Returned(TypedValue::new(json!("pong"), "string"))
    );
}

/// **VALUE**: Verifies that a value which does not match its declared type is not-found.
///
/// **WHY THIS MATTERS**: The type names come from the peer. A peer that claims "int" but
/// sends text must get an error reply, not crash the handler.
///
/// **BUG THIS CATCHES**: Would catch a decode failure being unwrapped.
#[test]
fn given_value_not_matching_declared_type_when_routed_then_not_found() {
    // GIVEN: add(int, int) and arguments claiming to be ints
    let router = demo_router();
    let arguments = Arguments::new(vec![
        TypedValue::new(json!("two"), "int"),
        TypedValue::new(json!(3), "int"),
    ]);

    // WHEN: Routing
    let outcome = router.route(&InvocationDescriptor::new("add", arguments, "id-1"));

    // THEN: NotFound
    assert_eq!(outcome, RouteOutcome::NotFound);
}

/// **VALUE**: Verifies that `contains` looks at names regardless of argument types.
#[test]
fn given_registered_names_when_checking_contains_then_matches_by_name() {
    let router = demo_router();

    assert!(router.contains("add"));
    assert!(router.contains("ping"));
    assert!(!router.contains("nope"));
    assert!(!InvocationRouter::new().contains("add"));
    assert!(InvocationRouter::new().is_empty());
}
