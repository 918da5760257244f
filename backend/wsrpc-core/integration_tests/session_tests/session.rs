use crate::session_tests::helpers::{
    ChannelObserver, Observed, TestPeer, WAIT, build_session, connect_session, next_event,
    receive_payload, send_payload,
};

use wsrpc_core::router::METHOD_NOT_FOUND_MESSAGE;
use wsrpc_core::{
    IntoArguments, InvocationDescriptor, InvocationResult, Lifecycle, Payload, RpcError,
    SENTINEL_IDENTIFIER, TypedValue,
};

use tokio::net::TcpListener;
use tokio::time::timeout;

/// **VALUE**: Verifies the connection id handshake over a real socket.
///
/// **WHY THIS MATTERS**: The first thing a peer does after accepting is assign an id.
/// The session must store it and tell the application.
///
/// **BUG THIS CATCHES**: Would catch inbound frames not reaching the dispatcher, or the
/// connection event being decoded as JSON instead of taken verbatim.
#[tokio::test]
async fn given_open_session_when_peer_sends_connection_event_then_id_recorded() {
    // GIVEN: A session connected to a test peer
    let peer = TestPeer::bind().await;
    let (session, mut ws, mut events) = connect_session(&peer).await;
    assert!(session.is_open());

    // WHEN: The peer assigns an id
    send_payload(&mut ws, Payload::ConnectionEvent("abc-123".to_string())).await;

    // THEN: Observer hears it and the session stores it
    assert_eq!(
        next_event(&mut events).await,
        Observed::Connected("abc-123".to_string())
    );
    assert_eq!(session.connection_id().as_deref(), Some("abc-123"));
}

/// **VALUE**: Verifies an outbound awaited invocation end to end.
///
/// **WHY THIS MATTERS**: This is the main reason the crate exists: call a method on the
/// peer and get its typed result back.
///
/// **BUG THIS CATCHES**: Would catch frames queued but never written, or replies read but
/// never correlated.
#[tokio::test]
async fn given_open_session_when_invoking_add_then_peer_reply_resolves_call() {
    // GIVEN: A connected session
    let peer = TestPeer::bind().await;
    let (session, mut ws, _events) = connect_session(&peer).await;

    // WHEN: Invoking add(2, 3) and the peer answering 5
    let pending = session.invoke("add", (2, 3));
    let descriptor = match receive_payload(&mut ws).await {
        Payload::Invocation(descriptor) => descriptor,
        other => panic!("Expected an invocation, got {other:?}"),
    };
    assert_eq!(descriptor.method_name, "add");
    assert_eq!(descriptor.arguments, (2, 3).into_arguments().unwrap());
    assert_eq!(Some(descriptor.identifier.as_str()), pending.identifier());

    send_payload(
        &mut ws,
        Payload::InvocationResult(InvocationResult::success(
            descriptor.identifier,
            TypedValue::of(5).unwrap(),
        )),
    )
    .await;

    // THEN: The call resolves to 5 and nothing stays pending
    let value = timeout(WAIT, pending.into_typed::<i32>())
        .await
        .expect("Timed out waiting for reply")
        .expect("Call should succeed");
    assert_eq!(value, 5);
    assert_eq!(session.pending_count(), 0);
}

/// **VALUE**: Verifies that a remote error reaches the caller.
#[tokio::test]
async fn given_open_session_when_peer_replies_with_error_then_call_fails_with_remote() {
    let peer = TestPeer::bind().await;
    let (session, mut ws, _events) = connect_session(&peer).await;

    let pending = session.invoke("missing", ());
    let Payload::Invocation(descriptor) = receive_payload(&mut ws).await else {
        panic!("Expected an invocation");
    };
    send_payload(
        &mut ws,
        Payload::InvocationResult(InvocationResult::failure(
            descriptor.identifier,
            "method does not exist",
        )),
    )
    .await;

    let outcome = timeout(WAIT, pending).await.expect("Timed out waiting for reply");
    assert!(matches!(
        outcome,
        Err(RpcError::Remote { message, .. }) if message == "method does not exist"
    ));
}

/// **VALUE**: Verifies that fire-and-forget invocations carry the sentinel on the wire.
#[tokio::test]
async fn given_open_session_when_invoke_only_then_peer_receives_sentinel_identifier() {
    let peer = TestPeer::bind().await;
    let (session, mut ws, _events) = connect_session(&peer).await;

    session
        .invoke_only("notify", ("build finished",))
        .expect("Fire-and-forget send should succeed");

    let Payload::Invocation(descriptor) = receive_payload(&mut ws).await else {
        panic!("Expected an invocation");
    };
    assert_eq!(descriptor.method_name, "notify");
    assert_eq!(descriptor.identifier, SENTINEL_IDENTIFIER);
    assert_eq!(session.pending_count(), 0);
}

/// **VALUE**: Verifies that the peer can call a registered handler and gets the reply.
///
/// **WHY THIS MATTERS**: The protocol is bidirectional. Inbound invocations are routed
/// to handlers and answered on the same socket.
///
/// **BUG THIS CATCHES**: Would catch replies sent to the wrong identifier or swallowed
/// by the dispatch worker.
#[tokio::test]
async fn given_echo_handler_when_peer_invokes_echo_then_peer_receives_result() {
    // GIVEN: A connected session with echo registered
    let peer = TestPeer::bind().await;
    let (_session, mut ws, _events) = connect_session(&peer).await;

    // WHEN: The peer invokes echo("hello")
    send_payload(
        &mut ws,
        Payload::Invocation(InvocationDescriptor::new(
            "echo",
            ("hello",).into_arguments().unwrap(),
            "peer-1",
        )),
    )
    .await;

    // THEN: The reply carries the same identifier and the echoed string
    assert_eq!(
        receive_payload(&mut ws).await,
        Payload::InvocationResult(InvocationResult::success(
            "peer-1",
            TypedValue::of("hello".to_string()).unwrap(),
        ))
    );
}

/// **VALUE**: Verifies the not-found reply over a real socket.
#[tokio::test]
async fn given_no_handler_when_peer_invokes_missing_method_then_error_reply() {
    let peer = TestPeer::bind().await;
    let (_session, mut ws, _events) = connect_session(&peer).await;

    send_payload(
        &mut ws,
        Payload::Invocation(InvocationDescriptor::new(
            "missingMethod",
            (1,).into_arguments().unwrap(),
            "peer-2",
        )),
    )
    .await;

    let Payload::InvocationResult(result) = receive_payload(&mut ws).await else {
        panic!("Expected an invocation result");
    };
    assert_eq!(result.identifier, "peer-2");
    assert_eq!(result.error.as_deref(), Some(METHOD_NOT_FOUND_MESSAGE));
}

/// **VALUE**: Verifies that text frames reach the observer.
#[tokio::test]
async fn given_open_session_when_peer_sends_text_then_observer_receives_it() {
    let peer = TestPeer::bind().await;
    let (_session, mut ws, mut events) = connect_session(&peer).await;

    send_payload(&mut ws, Payload::Text("hello world".to_string())).await;

    assert_eq!(
        next_event(&mut events).await,
        Observed::Text("hello world".to_string())
    );
}

/// **VALUE**: Verifies peer-initiated close.
///
/// **WHY THIS MATTERS**: Pending callers must be released when the peer hangs up,
/// and the application must learn that the session is gone.
///
/// **BUG THIS CATCHES**: Would catch the close frame being ignored, leaving calls pending
/// forever.
#[tokio::test]
async fn given_pending_call_when_peer_closes_then_call_cancelled_and_close_observed() {
    // GIVEN: A connected session with a call in flight
    let peer = TestPeer::bind().await;
    let (session, mut ws, mut events) = connect_session(&peer).await;
    let pending = session.invoke("slow", ());
    receive_payload(&mut ws).await;

    // WHEN: The peer closes the socket
    ws.close(None).await.expect("Failed to close peer socket");

    // THEN: The call fails, observer sees a clean close, session is closed
    let outcome = timeout(WAIT, pending).await.expect("Timed out waiting for cancel");
    assert!(matches!(outcome, Err(RpcError::ConnectionClosed { .. })));
    assert!(matches!(
        next_event(&mut events).await,
        Observed::Close { was_clean: true, .. }
    ));
    assert_eq!(session.lifecycle(), Lifecycle::Closed);
    assert_eq!(session.pending_count(), 0);
}

/// **VALUE**: Verifies that local close reaches the peer, cancels calls and is observed.
#[tokio::test]
async fn given_pending_call_when_session_closed_then_cancelled_and_peer_disconnected() {
    let peer = TestPeer::bind().await;
    let (session, mut ws, mut events) = connect_session(&peer).await;
    let pending = session.invoke("slow", ());
    receive_payload(&mut ws).await;

    session.close();

    assert!(matches!(
        timeout(WAIT, pending).await.expect("Timed out waiting for cancel"),
        Err(RpcError::ConnectionClosed { .. })
    ));
    let next = timeout(WAIT, futures_util::StreamExt::next(&mut ws))
        .await
        .expect("Timed out waiting for peer disconnect");
    assert!(matches!(
        next,
        None | Some(Err(_)) | Some(Ok(tokio_tungstenite::tungstenite::Message::Close(_)))
    ));
    assert_eq!(
        next_event(&mut events).await,
        Observed::Close {
            code: 1000,
            was_clean: true,
        }
    );
}

/// **VALUE**: Verifies that an unreachable peer is reported, not raised.
///
/// **WHY THIS MATTERS**: `start` returns immediately. A refused connection must surface
/// through `on_error` and `on_close` so the application can react.
///
/// **BUG THIS CATCHES**: Would catch connect failures being logged but never reported.
#[tokio::test]
async fn given_no_listener_when_started_then_error_and_abnormal_close_observed() {
    // GIVEN: A port with nothing listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let (observer, mut events) = ChannelObserver::new();
    let session = build_session(&format!("ws://127.0.0.1:{port}/ws"), observer);

    // WHEN: Starting
    session.start();

    // THEN: Error, then an abnormal close
    assert!(matches!(next_event(&mut events).await, Observed::Error(_)));
    assert_eq!(
        next_event(&mut events).await,
        Observed::Close {
            code: 1006,
            was_clean: false,
        }
    );
    assert_eq!(session.lifecycle(), Lifecycle::Closed);
    assert!(!session.is_open());
}
