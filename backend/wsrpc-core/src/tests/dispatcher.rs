// Unit tests for inbound envelope dispatch

use super::support::frame;
use crate::correlation::CorrelationTable;
use crate::dispatcher::{Dispatcher, SessionLink};
use crate::envelope::{
    Envelope, IntoArguments, InvocationDescriptor, InvocationResult, Payload,
    SENTINEL_IDENTIFIER, TypedValue,
};
use crate::error::rpc::RpcError;
use crate::error::transport::TransportError;
use crate::router::{InvocationRouter, METHOD_NOT_FOUND_MESSAGE};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

/// Stands in for the session: records the connection id, texts and outbound frames.
#[derive(Default)]
struct FakeLink {
    connection_id: Mutex<Option<String>>,
    texts: Mutex<Vec<String>>,
    sent: Mutex<Vec<String>>,
    refuse_sends: bool,
}

impl FakeLink {
    fn sent_results(&self) -> Vec<InvocationResult> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|frame| {
                match Envelope::decode(frame).unwrap().decode_payload().unwrap() {
                    Payload::InvocationResult(result) => result,
                    other => panic!("expected an invocation result, got {other:?}"),
                }
            })
            .collect()
    }
}

impl SessionLink for FakeLink {
    fn connected(&self, connection_id: String) {
        *self.connection_id.lock().unwrap() = Some(connection_id);
    }

    fn text_message(&self, text: &str) {
        self.texts.lock().unwrap().push(text.to_string());
    }

    fn send_frame(&self, frame: String) -> Result<(), TransportError> {
        if self.refuse_sends {
            return Err(TransportError::NotOpen {
                message: "closed".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }
}

struct Fixture {
    dispatcher: Dispatcher,
    correlation: Arc<CorrelationTable>,
    echo_calls: Arc<AtomicUsize>,
}

fn fixture() -> Fixture {
    let echo_calls = Arc::new(AtomicUsize::new(0));
    let calls = Arc::clone(&echo_calls);

    let mut router = InvocationRouter::new();
    router.register("echo", move |text: String| -> Result<String, String> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(text)
    });

    let correlation = Arc::new(CorrelationTable::new());
    let dispatcher = Dispatcher::new(router, Arc::clone(&correlation), true);

    Fixture {
        dispatcher,
        correlation,
        echo_calls,
    }
}

fn invocation(method_name: &str, args: impl IntoArguments, identifier: &str) -> String {
    frame(Payload::Invocation(InvocationDescriptor::new(
        method_name,
        args.into_arguments().unwrap(),
        identifier,
    )))
}

/// **VALUE**: Verifies that a connection event hands the id to the session.
///
/// **WHY THIS MATTERS**: The peer-assigned id is how the application tells connections
/// apart.
///
/// **BUG THIS CATCHES**: Would catch the id being dropped or treated as text.
#[test]
fn given_connection_event_when_handled_then_link_gets_id() {
    // GIVEN: A dispatcher and a link
    let fx = fixture();
    let link = FakeLink::default();

    // WHEN: A connection event arrives
    fx.dispatcher
        .handle(&frame(Payload::ConnectionEvent("c-42".to_string())), &link);

    // THEN: Link has the id and nothing else happened
    assert_eq!(link.connection_id.lock().unwrap().as_deref(), Some("c-42"));
    assert!(link.texts.lock().unwrap().is_empty());
    assert!(link.sent.lock().unwrap().is_empty());
}

/// **VALUE**: Verifies that text payloads go straight to the session.
#[test]
fn given_text_frame_when_handled_then_link_gets_text() {
    let fx = fixture();
    let link = FakeLink::default();

    fx.dispatcher
        .handle(&frame(Payload::Text("hello there".to_string())), &link);

    assert_eq!(*link.texts.lock().unwrap(), vec!["hello there".to_string()]);
    assert!(link.sent.lock().unwrap().is_empty());
}

/// **VALUE**: Verifies that an awaited inbound invocation gets exactly one reply.
///
/// **WHY THIS MATTERS**: The peer is blocked on that reply. It must carry the same
/// identifier and the handler's typed return value.
///
/// **BUG THIS CATCHES**: Would catch replies addressed to the wrong id or not sent at all.
#[test]
fn given_awaited_invocation_when_handled_then_reply_sent_with_same_identifier() {
    // GIVEN: echo registered
    let fx = fixture();
    let link = FakeLink::default();

    // WHEN: The peer invokes echo("hi") with id "p-1"
    fx.dispatcher.handle(&invocation("echo", ("hi",), "p-1"), &link);

    // THEN: One reply with the echoed string
    let results = link.sent_results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].identifier, "p-1");
    assert_eq!(results[0].error, None);
    assert_eq!(
        results[0].result,
        Some(TypedValue::of("hi".to_string()).unwrap())
    );
    assert_eq!(fx.echo_calls.load(Ordering::SeqCst), 1);
}

/// **VALUE**: Verifies that fire-and-forget invocations run but are never answered.
///
/// **WHY THIS MATTERS**: The peer does not track the sentinel id. A reply would be noise
/// at best, a misrouted result at worst.
///
/// **BUG THIS CATCHES**: Would catch the sentinel check being skipped, including on the
/// not-found path.
#[test]
fn given_fire_and_forget_invocation_when_handled_then_handler_runs_without_reply() {
    // GIVEN: echo registered
    let fx = fixture();
    let link = FakeLink::default();

    // WHEN: Invoking echo and an unknown method with the sentinel id
    fx.dispatcher
        .handle(&invocation("echo", ("hi",), SENTINEL_IDENTIFIER), &link);
    fx.dispatcher
        .handle(&invocation("nope", (), SENTINEL_IDENTIFIER), &link);

    // THEN: The handler ran once and nothing was sent
    assert_eq!(fx.echo_calls.load(Ordering::SeqCst), 1);
    assert!(link.sent.lock().unwrap().is_empty());
}

/// **VALUE**: Verifies the not-found reply for an awaited call to a missing method.
#[test]
fn given_unknown_method_when_handled_then_error_reply_sent() {
    let fx = fixture();
    let link = FakeLink::default();

    fx.dispatcher.handle(&invocation("nope", (1,), "p-2"), &link);

    let results = link.sent_results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].identifier, "p-2");
    assert_eq!(results[0].result, None);
    assert_eq!(results[0].error.as_deref(), Some(METHOD_NOT_FOUND_MESSAGE));
}

/// **VALUE**: Verifies that a reply resolves the matching pending call.
///
/// **WHY THIS MATTERS**: This closes the loop for outbound invocations.
///
/// **BUG THIS CATCHES**: Would catch results delivered to the wrong completion or left
/// in the table.
#[test]
fn given_pending_call_when_result_arrives_then_completion_resolved() {
    // GIVEN: A pending call "c-1"
    let fx = fixture();
    let link = FakeLink::default();
    let (tx, mut rx) = oneshot::channel();
    fx.correlation.register("c-1", tx).unwrap();

    // WHEN: Its result arrives
    let result = InvocationResult::success("c-1", TypedValue::of(5).unwrap());
    fx.dispatcher
        .handle(&frame(Payload::InvocationResult(result)), &link);

    // THEN: Resolved with 5 and removed
    let value = rx.try_recv().unwrap().unwrap();
    assert_eq!(value.decode::<i32>().unwrap(), 5);
    assert!(fx.correlation.is_empty());
}

/// **VALUE**: Verifies that an error reply reaches the caller as a remote error.
#[test]
fn given_pending_call_when_error_result_arrives_then_completion_fails_with_remote() {
    let fx = fixture();
    let link = FakeLink::default();
    let (tx, mut rx) = oneshot::channel();
    fx.correlation.register("c-1", tx).unwrap();

    let result = InvocationResult::failure("c-1", "no such method");
    fx.dispatcher
        .handle(&frame(Payload::InvocationResult(result)), &link);

    assert!(matches!(
        rx.try_recv().unwrap(),
        Err(RpcError::Remote { message, .. }) if message == "no such method"
    ));
}

/// **VALUE**: Verifies that results for unknown ids or the sentinel are dropped.
///
/// **WHY THIS MATTERS**: Late or duplicate replies are normal on a flaky network and
/// must not disturb the calls that are still pending.
///
/// **BUG THIS CATCHES**: Would catch a stray result resolving some other entry or panicking.
#[test]
fn given_unmatched_results_when_handled_then_dropped_and_table_untouched() {
    // GIVEN: One pending call
    let fx = fixture();
    let link = FakeLink::default();
    let (tx, mut rx) = oneshot::channel();
    fx.correlation.register("c-1", tx).unwrap();

    // WHEN: Results for an unknown id and for the sentinel arrive
    for identifier in ["unknown", SENTINEL_IDENTIFIER] {
        let result = InvocationResult::success(identifier, TypedValue::of(1).unwrap());
        fx.dispatcher
            .handle(&frame(Payload::InvocationResult(result)), &link);
    }

    // THEN: The real entry is still waiting
    assert!(fx.correlation.contains("c-1"));
    assert!(rx.try_recv().is_err());
}

/// **VALUE**: Verifies that garbage frames are dropped without side effects.
///
/// **BUG THIS CATCHES**: Would catch a decode error propagating as a panic.
#[test]
fn given_malformed_frames_when_handled_then_nothing_happens() {
    let fx = fixture();
    let link = FakeLink::default();

    fx.dispatcher.handle("not json", &link);
    fx.dispatcher
        .handle(r#"{"kind":"Invocation","payload":"{broken"}"#, &link);
    fx.dispatcher
        .handle(r#"{"kind":"Mystery","payload":""}"#, &link);

    assert!(link.connection_id.lock().unwrap().is_none());
    assert!(link.texts.lock().unwrap().is_empty());
    assert!(link.sent.lock().unwrap().is_empty());
    assert_eq!(fx.echo_calls.load(Ordering::SeqCst), 0);
}

/// **VALUE**: Verifies that a reply which cannot be sent is logged, not propagated.
///
/// **BUG THIS CATCHES**: Would catch a send failure aborting the dispatcher.
#[test]
fn given_link_refusing_sends_when_invocation_handled_then_handler_still_runs() {
    let fx = fixture();
    let link = FakeLink {
        refuse_sends: true,
        ..FakeLink::default()
    };

    fx.dispatcher.handle(&invocation("echo", ("hi",), "p-3"), &link);

    assert_eq!(fx.echo_calls.load(Ordering::SeqCst), 1);
    assert!(link.sent.lock().unwrap().is_empty());
}
