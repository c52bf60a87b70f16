//! Gateway connection tests against a scripted server
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use integration_tests::*;
use serde_json::json;
use sync_gateway::{
    ConnectError, ConnectionState, GatewayCommands, GatewayEvent, HandshakeError, MemberRange,
    RoomSubscription,
};

async fn connected(client: &TestClient) -> ServerEnd {
    let server = client.transport.accept();
    server.push(hello(45_000));
    server.push(ready(1));
    client.connection.connect().await.unwrap();
    server
}

// ============================================================================
// Connect
// ============================================================================

#[tokio::test]
async fn test_connect_exhausts_retries() {
    let client = TestClient::new();

    let err = client.connection.connect().await.unwrap_err();
    match err {
        ConnectError::Exhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(last, HandshakeError::Transport(_)));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(client.transport.connects(), 3);
    assert_eq!(client.connection.state(), ConnectionState::Disconnected);
    assert_eq!(client.credentials.discards(), 0);
}

#[tokio::test]
async fn test_connect_succeeds_after_refusals() {
    let client = TestClient::new();
    client.transport.refuse();
    client.transport.refuse();
    let mut server = connected(&client).await;

    assert_eq!(client.transport.connects(), 3);
    assert_eq!(client.connection.state(), ConnectionState::Connected);
    assert_eq!(client.connection.session_id().as_deref(), Some("session-1"));

    let identify = server.next_sent_op(2).await.unwrap();
    assert_eq!(identify["d"]["token"], TOKEN);
}

#[tokio::test]
async fn test_connect_twice_is_rejected() {
    let client = TestClient::new();
    let _server = connected(&client).await;

    assert!(matches!(
        client.connection.connect().await,
        Err(ConnectError::AlreadyConnected)
    ));
}

#[tokio::test]
async fn test_invalid_session_during_handshake_discards_credential() {
    let client = TestClient::new();
    let (_, mut events) = client.bus.channel();

    let server = client.transport.accept();
    server.push(hello(45_000));
    server.push(invalid_session(false));

    assert!(matches!(
        client.connection.connect().await,
        Err(ConnectError::SessionInvalidated)
    ));
    assert_eq!(client.transport.connects(), 1);
    assert_eq!(client.credentials.discards(), 1);
    assert!(client.credentials.current().is_none());
    assert_eq!(client.connection.state(), ConnectionState::Invalidated);

    assert!(matches!(next_event(&mut events).await.unwrap(), GatewayEvent::Hello(_)));
    assert!(matches!(
        next_event(&mut events).await.unwrap(),
        GatewayEvent::InvalidSession { resumable: false }
    ));

    // no credential left, so the next connect fails fast
    assert!(matches!(
        client.connection.connect().await,
        Err(ConnectError::MissingCredential)
    ));
}

// ============================================================================
// Event stream
// ============================================================================

#[tokio::test]
async fn test_events_are_published_in_wire_order() {
    let client = TestClient::new();
    let (_, mut events) = client.bus.channel();
    let server = connected(&client).await;

    let ids: Vec<_> = (1..=5).map(|i| message_id(CONVERSATION_ID, i)).collect();
    for (seq, id) in ids.iter().enumerate() {
        server.push(message_created(seq as u64 + 2, *id, CONVERSATION_ID, OWNER_ID));
    }

    assert!(matches!(next_event(&mut events).await.unwrap(), GatewayEvent::Hello(_)));
    assert!(matches!(next_event(&mut events).await.unwrap(), GatewayEvent::Ready(_)));
    for expected in &ids {
        match next_event(&mut events).await.unwrap() {
            GatewayEvent::MessageCreated(created) => assert_eq!(created.message.id, *expected),
            other => panic!("unexpected event {}", other.name()),
        }
    }
    assert_eq!(client.connection.last_sequence(), Some(6));
}

#[tokio::test]
async fn test_malformed_frame_is_skipped() {
    let client = TestClient::new();
    let (_, mut events) = client.bus.channel();
    let server = connected(&client).await;

    server.push_raw("{not json");
    server.push(dispatch(2, "MESSAGE_CREATE", json!({"id": "oops"})));
    server.push(message_created(3, message_id(CONVERSATION_ID, 1), CONVERSATION_ID, OWNER_ID));

    next_event(&mut events).await.unwrap();
    next_event(&mut events).await.unwrap();
    assert!(matches!(
        next_event(&mut events).await.unwrap(),
        GatewayEvent::MessageCreated(_)
    ));
    assert_eq!(client.connection.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_unknown_dispatch_is_surfaced() {
    let client = TestClient::new();
    let (_, mut events) = client.bus.channel();
    let server = connected(&client).await;

    server.push(dispatch(2, "GUILD_SOMETHING_NEW", json!({"x": 1})));

    next_event(&mut events).await.unwrap();
    next_event(&mut events).await.unwrap();
    match next_event(&mut events).await.unwrap() {
        GatewayEvent::Unknown { name, .. } => assert_eq!(name, "GUILD_SOMETHING_NEW"),
        other => panic!("unexpected event {}", other.name()),
    }
}

#[tokio::test]
async fn test_invalid_session_after_connect() {
    let client = TestClient::new();
    let (_, mut events) = client.bus.channel();
    let server = connected(&client).await;

    server.push(invalid_session(true));

    next_event(&mut events).await.unwrap();
    next_event(&mut events).await.unwrap();
    assert!(matches!(
        next_event(&mut events).await.unwrap(),
        GatewayEvent::InvalidSession { resumable: true }
    ));
    assert_eq!(client.credentials.discards(), 1);
    assert_eq!(client.connection.state(), ConnectionState::Invalidated);
}

// ============================================================================
// Close
// ============================================================================

#[tokio::test]
async fn test_server_close_is_published_with_code() {
    let client = TestClient::new();
    let (_, mut events) = client.bus.channel();
    let server = connected(&client).await;

    server.close(4004, "Authentication failed");

    let reason = loop {
        if let GatewayEvent::ConnectionClosed(reason) = next_event(&mut events).await.unwrap() {
            break reason;
        }
    };
    assert_eq!(reason.code, Some(4004));
    assert!(!reason.initiated_by_client);
    assert!(!reason.should_reconnect());
    assert_eq!(client.connection.state(), ConnectionState::Disconnected);
    assert!(!client.connection.is_connected());
}

#[tokio::test]
async fn test_lost_transport_advises_reconnect() {
    let client = TestClient::new();
    let (_, mut events) = client.bus.channel();
    let server = connected(&client).await;

    server.fail("connection reset");

    let reason = loop {
        if let GatewayEvent::ConnectionClosed(reason) = next_event(&mut events).await.unwrap() {
            break reason;
        }
    };
    assert_eq!(reason.code, None);
    assert!(reason.should_reconnect());
}

#[tokio::test]
async fn test_client_close() {
    let client = TestClient::new();
    let (_, mut events) = client.bus.channel();
    let server = connected(&client).await;

    client.connection.close().await;

    let reason = loop {
        if let GatewayEvent::ConnectionClosed(reason) = next_event(&mut events).await.unwrap() {
            break reason;
        }
    };
    assert!(reason.initiated_by_client);
    assert_eq!(server.client_close(), Some(Some(1000)));
    assert_eq!(client.connection.state(), ConnectionState::Closed);
}

// ============================================================================
// Outbound
// ============================================================================

#[tokio::test]
async fn test_heartbeat_carries_last_sequence() {
    let client = TestClient::new();
    let mut server = client.transport.accept();
    server.push(hello(50));
    server.push(ready(7));
    client.connection.connect().await.unwrap();

    let beat = server.next_sent_op(1).await.unwrap();
    assert_eq!(beat["d"], 7);
}

#[tokio::test]
async fn test_subscription_frame() {
    let client = TestClient::new();
    let mut server = connected(&client).await;

    let subscription = RoomSubscription::single(
        CONVERSATION_ID,
        vec![MemberRange::new(100, 199), MemberRange::new(0, 99)],
    );
    client
        .connection
        .update_subscription(ROOM_ID, &subscription)
        .unwrap();

    let frame = server.next_sent_op(14).await.unwrap();
    assert_eq!(frame["d"]["guild_id"], ROOM_ID.to_string());
    assert_eq!(
        frame["d"]["channels"][CONVERSATION_ID.to_string()],
        json!([[0, 99], [100, 199]])
    );
}

#[tokio::test]
async fn test_commands_fail_after_close() {
    let client = TestClient::new();
    let _server = connected(&client).await;
    client.connection.close().await;

    assert!(client
        .connection
        .update_subscription(ROOM_ID, &RoomSubscription::empty())
        .is_err());
}
