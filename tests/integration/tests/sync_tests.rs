//! Session tests: frames in, state and outbound frames out
//!
//! Run with: cargo test -p integration-tests --test sync_tests

use std::sync::Arc;

use integration_tests::*;
use serde_json::json;
use sync_core::Snowflake;
use sync_state::{PageOutcome, RosterSyncEngine, TimelineEntry};

async fn connected(client: &TestClient) -> ServerEnd {
    let server = client.transport.accept();
    server.push(hello(45_000));
    server.push(ready(1));
    server.push(conversation_created(2, CONVERSATION_ID));
    server.push(conversation_created(3, OTHER_CONVERSATION_ID));
    client.connection.connect().await.unwrap();

    let registry = client.session.registry().clone();
    assert!(wait_until(|| registry.get(OTHER_CONVERSATION_ID).is_some()).await);
    server
}

fn roster_len(client: &TestClient) -> usize {
    client.session.with_roster(RosterSyncEngine::len).unwrap_or(0)
}

fn roster_member(client: &TestClient, index: usize) -> Option<Snowflake> {
    client
        .session
        .with_roster(|r| r.member_at(index).map(|m| m.member.id()))
        .flatten()
}

// ============================================================================
// Roster
// ============================================================================

#[tokio::test]
async fn test_opening_conversation_subscribes_head_page() {
    let client = TestClient::new();
    client.messages.seed(CONVERSATION_ID, 10, 2);
    let mut server = connected(&client).await;

    client
        .session
        .activate_conversation(CONVERSATION_ID)
        .await
        .unwrap();

    let frame = server.next_sent_op(14).await.unwrap();
    assert_eq!(frame["d"]["guild_id"], ROOM_ID.to_string());
    assert_eq!(
        frame["d"]["channels"][CONVERSATION_ID.to_string()],
        json!([[0, 99]])
    );
}

#[tokio::test]
async fn test_roster_patches_from_gateway() {
    let client = TestClient::new();
    client.messages.seed(CONVERSATION_ID, 10, 2);
    let server = connected(&client).await;
    client
        .session
        .activate_conversation(CONVERSATION_ID)
        .await
        .unwrap();

    let (a, b, c, d) = (OWNER_ID, Snowflake::new(8), Snowflake::new(9), Snowflake::new(10));
    server.push(member_list_update(
        4,
        Some(json!([{"id": "online", "count": 2}, {"id": "offline", "count": 1}])),
        json!([{
            "op": "SYNC",
            "range": [0, 99],
            "items": [
                {"group": {"id": "online", "count": 2}},
                member_item(a),
                member_item(b),
                {"group": {"id": "offline", "count": 1}},
                member_item(c),
            ],
        }]),
    ));
    assert!(wait_until(|| roster_member(&client, 4) == Some(c)).await);
    assert_eq!(roster_len(&client), 5);
    assert_eq!(
        client.session.with_roster(|r| r.member_at(1).map(|m| m.is_owner)),
        Some(Some(true))
    );

    server.push(member_list_update(
        5,
        None,
        json!([
            {"op": "DELETE", "index": 2},
            {"op": "INSERT", "index": 2, "item": member_item(d)},
            {"op": "UPDATE", "index": 40, "item": member_item(b)},
        ]),
    ));
    assert!(wait_until(|| roster_member(&client, 2) == Some(d)).await);
    assert_eq!(roster_len(&client), 5);
    assert_eq!(roster_member(&client, 4), Some(c));

    // a batch for another partition without SYNC is discarded
    let stale = {
        let mut frame = member_list_update(6, None, json!([{"op": "DELETE", "index": 0}]));
        frame["d"]["id"] = json!("stale");
        frame
    };
    server.push(stale);
    server.push(member_list_update(
        7,
        None,
        json!([{"op": "INVALIDATE", "range": [3, 4]}]),
    ));
    assert!(wait_until(|| roster_member(&client, 4).is_none()).await);
    assert_eq!(roster_len(&client), 5);
    assert_eq!(
        client.session.with_roster(|r| r.occupied_count()),
        Some(3)
    );
}

#[tokio::test]
async fn test_visible_range_sends_planned_subscription() {
    let client = TestClient::new();
    client.messages.seed(CONVERSATION_ID, 10, 2);
    let mut server = connected(&client).await;
    client
        .session
        .activate_conversation(CONVERSATION_ID)
        .await
        .unwrap();
    server.next_sent_op(14).await.unwrap();

    server.push(member_list_update(
        4,
        Some(json!([{"id": "online", "count": 999}])),
        json!([{"op": "SYNC", "range": [0, 99], "items": []}]),
    ));
    assert!(wait_until(|| roster_len(&client) == 1000).await);

    assert!(client.session.set_visible_range(0.2, 0.3).unwrap());
    let frame = server.next_sent_op(14).await.unwrap();
    assert_eq!(
        frame["d"]["channels"][CONVERSATION_ID.to_string()],
        json!([[0, 99], [100, 199], [200, 299]])
    );

    // same window, nothing new to send
    assert!(!client.session.set_visible_range(0.2, 0.3).unwrap());
}

#[tokio::test]
async fn test_switching_room_unsubscribes_previous() {
    let client = TestClient::new();
    client.messages.seed(CONVERSATION_ID, 10, 2);
    let mut server = connected(&client).await;
    client
        .session
        .activate_conversation(CONVERSATION_ID)
        .await
        .unwrap();
    server.next_sent_op(14).await.unwrap();

    client.session.activate_room(Some(Snowflake::new(77))).unwrap();

    let frame = server.next_sent_op(14).await.unwrap();
    assert_eq!(frame["d"]["guild_id"], ROOM_ID.to_string());
    assert_eq!(frame["d"]["channels"], json!({}));
    assert_eq!(roster_len(&client), 0);
    assert!(client.session.timeline().conversation_id().is_none());
}

// ============================================================================
// Timeline
// ============================================================================

#[tokio::test]
async fn test_timeline_pages_back_to_start() {
    let client = TestClient::new();
    client.messages.seed(CONVERSATION_ID, 120, 4);
    let mut server = connected(&client).await;

    let first = client
        .session
        .activate_conversation(CONVERSATION_ID)
        .await
        .unwrap();
    assert_eq!(first.loaded_count(), 50);

    // unknown authors of the page are looked up
    let request = server.next_sent_op(8).await.unwrap();
    assert_eq!(request["d"]["guild_id"], json!([ROOM_ID.to_string()]));
    assert_eq!(request["d"]["user_ids"].as_array().map(Vec::len), Some(4));

    assert_eq!(client.session.load_older().await.unwrap().loaded_count(), 50);
    assert_eq!(client.session.load_older().await.unwrap().loaded_count(), 20);
    assert_eq!(client.session.load_older().await.unwrap(), PageOutcome::Skipped);

    let timeline = client.session.timeline();
    assert!(timeline.reached_oldest());
    let ids = timeline.message_ids();
    assert_eq!(ids.len(), 120);
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(ids[0], message_id(CONVERSATION_ID, 1));
    assert_eq!(client.messages.fetches(), 3);

    // caught up: loading newer moves the read-marker instead
    assert_eq!(
        client.session.load_newer().await.unwrap(),
        PageOutcome::Acknowledged(message_id(CONVERSATION_ID, 120))
    );
    assert_eq!(
        client.messages.acks(),
        vec![(CONVERSATION_ID, message_id(CONVERSATION_ID, 120))]
    );
}

#[tokio::test]
async fn test_concurrent_load_older_is_single_flight() {
    let client = TestClient::new();
    client.messages.seed(CONVERSATION_ID, 200, 2);
    let _server = connected(&client).await;
    client
        .session
        .activate_conversation(CONVERSATION_ID)
        .await
        .unwrap();

    let gate = client.messages.hold_older_pages();
    let session = Arc::clone(&client.session);
    let first = tokio::spawn(async move { session.load_older().await });
    let timeline = client.session.timeline().clone();
    assert!(wait_until(|| timeline.is_loading_older()).await);

    for _ in 0..3 {
        assert_eq!(client.session.load_older().await.unwrap(), PageOutcome::Skipped);
    }

    gate.notify_one();
    assert_eq!(first.await.unwrap().unwrap().loaded_count(), 50);
    assert_eq!(client.messages.fetches(), 2);
    assert_eq!(client.messages.max_in_flight(), 1);
    assert_eq!(timeline.message_count(), 100);
}

#[tokio::test]
async fn test_late_page_does_not_touch_new_conversation() {
    let client = TestClient::new();
    client.messages.seed(CONVERSATION_ID, 200, 2);
    client.messages.seed(OTHER_CONVERSATION_ID, 30, 2);
    let _server = connected(&client).await;
    client
        .session
        .activate_conversation(CONVERSATION_ID)
        .await
        .unwrap();

    let gate = client.messages.hold_older_pages();
    let session = Arc::clone(&client.session);
    let late = tokio::spawn(async move { session.load_older().await });
    let timeline = client.session.timeline().clone();
    assert!(wait_until(|| timeline.is_loading_older()).await);

    client
        .session
        .activate_conversation(OTHER_CONVERSATION_ID)
        .await
        .unwrap();
    let expected: Vec<_> = (1..=30).map(|i| message_id(OTHER_CONVERSATION_ID, i)).collect();
    assert_eq!(timeline.message_ids(), expected);

    gate.notify_one();
    assert_eq!(late.await.unwrap().unwrap(), PageOutcome::Superseded);
    assert_eq!(timeline.conversation_id(), Some(OTHER_CONVERSATION_ID));
    assert_eq!(timeline.message_ids(), expected);
}

#[tokio::test]
async fn test_live_message_reaches_timeline() {
    let client = TestClient::new();
    client.messages.seed(CONVERSATION_ID, 5, 1);
    let server = connected(&client).await;
    client
        .session
        .activate_conversation(CONVERSATION_ID)
        .await
        .unwrap();

    let typer = Snowflake::new(9);
    server.push(dispatch(
        4,
        "TYPING_START",
        json!({"channel_id": CONVERSATION_ID, "user_id": typer, "guild_id": ROOM_ID, "timestamp": 1}),
    ));
    let typing = client.session.typing().clone();
    assert!(wait_until(|| typing.is_typing(CONVERSATION_ID, typer)).await);

    let live = message_id(CONVERSATION_ID, 6);
    server.push(message_created(5, live, CONVERSATION_ID, typer));

    let timeline = client.session.timeline().clone();
    assert!(wait_until(|| timeline.message(live).is_some()).await);
    assert!(!typing.is_typing(CONVERSATION_ID, typer));
    match timeline.entries().last() {
        Some(TimelineEntry::Message(m)) => assert_eq!(m.message.id, live),
        other => panic!("unexpected tail {other:?}"),
    }

    server.push(dispatch(
        6,
        "MESSAGE_DELETE",
        json!({"id": live, "channel_id": CONVERSATION_ID}),
    ));
    assert!(wait_until(|| timeline.message(live).is_none()).await);
}

// ============================================================================
// Members
// ============================================================================

#[tokio::test]
async fn test_member_chunks_only_for_active_room() {
    let client = TestClient::new();
    client.messages.seed(CONVERSATION_ID, 5, 1);
    let server = connected(&client).await;
    client
        .session
        .activate_conversation(CONVERSATION_ID)
        .await
        .unwrap();

    let other_room = Snowflake::new(55);
    server.push(members_chunk(4, other_room, &[Snowflake::new(300)]));
    server.push(members_chunk(5, ROOM_ID, &[Snowflake::new(301), Snowflake::new(302)]));

    let directory = client.session.directory().clone();
    assert!(wait_until(|| directory.count(ROOM_ID) == 2).await);
    assert_eq!(directory.count(other_room), 0);
    assert!(directory.contains(ROOM_ID, Snowflake::new(301)));
}
