mod common;

use common::ws_helpers::*;
use serde_json::json;

fn group_send(conv_id: &str, group_id: &str, client_msg_id: &str, payload: serde_json::Value) -> serde_json::Value {
    json!({
        "action": "send",
        "data": {
            "convId": conv_id,
            "convType": "group",
            "groupId": group_id,
            "type": "text",
            "clientMsgId": client_msg_id,
            "payload": payload
        }
    })
}

fn subscribe(group_id: &str) -> serde_json::Value {
    json!({"action": "subscribe_group", "data": {"groupId": group_id}})
}

#[tokio::test]
async fn group_send_fans_out_via_group_topic() {
    let (base, pool) = start_server().await;
    let (alice_id, alice_token) = common::create_test_user(&pool, "alice").await;
    let (bob_id, bob_token) = common::create_test_user(&pool, "bob").await;
    let (carol_id, carol_token) = common::create_test_user(&pool, "carol").await;
    let group_id = common::create_test_group(&pool, &alice_id, &[&bob_id, &carol_id]).await;

    let mut alice = ws_connect(&base, &alice_token).await;
    let mut bob = ws_connect(&base, &bob_token).await;
    let mut carol = ws_connect(&base, &carol_token).await;

    send_json(&mut bob, &subscribe(&group_id)).await;
    send_json(&mut carol, &subscribe(&group_id)).await;
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let conv_id = format!("group:{group_id}");
    send_json(
        &mut alice,
        &group_send(&conv_id, &group_id, "cm-1", json!({"text": "hello group"})),
    )
    .await;
    let ack = recv_action(&mut alice, "ack").await.expect("no ack");
    let server_msg_id = ack["data"]["serverMsgId"].as_str().unwrap().to_string();

    for ws in [&mut bob, &mut carol] {
        let frame = recv_action(ws, "message").await.expect("member missed the message");
        assert_eq!(frame["data"]["serverMsgId"], server_msg_id.as_str());
        assert_eq!(frame["data"]["groupId"], group_id.as_str());
    }

    // The queue consumer expands membership into user_conversations.
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(3);
    loop {
        let rows = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM user_conversations WHERE conv_id = ?",
        )
        .bind(&conv_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        if rows == 3 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "membership expansion never completed, rows={rows}"
        );
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn duplicate_group_subscription_delivers_once() {
    let (base, pool) = start_server().await;
    let (alice_id, alice_token) = common::create_test_user(&pool, "alice").await;
    let (bob_id, bob_token) = common::create_test_user(&pool, "bob").await;
    let group_id = common::create_test_group(&pool, &alice_id, &[&bob_id]).await;

    let mut alice = ws_connect(&base, &alice_token).await;
    let mut bob = ws_connect(&base, &bob_token).await;

    send_json(&mut bob, &subscribe(&group_id)).await;
    send_json(&mut bob, &subscribe(&group_id)).await;
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let conv_id = format!("group:{group_id}");
    send_json(
        &mut alice,
        &group_send(&conv_id, &group_id, "cm-1", json!({"text": "once"})),
    )
    .await;
    recv_action(&mut alice, "ack").await.expect("no ack");

    let frames = drain_messages(&mut bob).await;
    let deliveries = frames.iter().filter(|f| f["action"] == "message").count();
    assert_eq!(deliveries, 1);
}

#[tokio::test]
async fn non_member_send_rejected() {
    let (base, pool) = start_server().await;
    let (alice_id, _) = common::create_test_user(&pool, "alice").await;
    let (mallory_id, mallory_token) = common::create_test_user(&pool, "mallory").await;
    let group_id = common::create_test_group(&pool, &alice_id, &[]).await;

    let mut mallory = ws_connect(&base, &mallory_token).await;
    let conv_id = format!("group:{group_id}");

    send_json(
        &mut mallory,
        &group_send(&conv_id, &group_id, "cm-1", json!({"text": "let me in"})),
    )
    .await;
    let err = recv_action(&mut mallory, "error").await.expect("no error");
    assert_eq!(err["data"]["code"], "NOT_GROUP_MEMBER");
    assert_eq!(common::count_messages(&pool, &conv_id).await, 0);

    send_json(&mut mallory, &subscribe(&group_id)).await;
    let err = recv_action(&mut mallory, "error").await.expect("no subscribe error");
    assert_eq!(err["data"]["code"], "NOT_GROUP_MEMBER");
    let _ = mallory_id;
}

#[tokio::test]
async fn muted_member_cannot_send() {
    let (base, pool) = start_server().await;
    let (alice_id, _) = common::create_test_user(&pool, "alice").await;
    let (bob_id, bob_token) = common::create_test_user(&pool, "bob").await;
    let group_id = common::create_test_group(&pool, &alice_id, &[&bob_id]).await;
    common::set_member_muted(&pool, &group_id, &bob_id, true).await;

    let mut bob = ws_connect(&base, &bob_token).await;
    let conv_id = format!("group:{group_id}");

    send_json(
        &mut bob,
        &group_send(&conv_id, &group_id, "cm-1", json!({"text": "muzzled"})),
    )
    .await;
    let err = recv_action(&mut bob, "error").await.expect("no error");
    assert_eq!(err["data"]["code"], "SEND_FAILED");
    assert_eq!(common::count_messages(&pool, &conv_id).await, 0);
}

#[tokio::test]
async fn mentions_reach_personal_topics() {
    let (base, pool) = start_server().await;
    let (alice_id, alice_token) = common::create_test_user(&pool, "alice").await;
    let (bob_id, bob_token) = common::create_test_user(&pool, "bob").await;
    let group_id = common::create_test_group(&pool, &alice_id, &[&bob_id]).await;

    let mut alice = ws_connect(&base, &alice_token).await;
    // Bob is connected but has not subscribed to the group topic.
    let mut bob = ws_connect(&base, &bob_token).await;

    let conv_id = format!("group:{group_id}");
    send_json(
        &mut alice,
        &group_send(
            &conv_id,
            &group_id,
            "cm-1",
            json!({"text": "ping", "mentions": [bob_id]}),
        ),
    )
    .await;
    let ack = recv_action(&mut alice, "ack").await.expect("no ack");
    let seq = ack["data"]["seq"].as_i64().unwrap();

    let mention = recv_action(&mut bob, "mention").await.expect("no mention");
    assert_eq!(mention["data"]["groupId"], group_id.as_str());
    assert_eq!(mention["data"]["from"], alice_id.as_str());
    assert_eq!(mention["data"]["seq"], seq);

    // And nothing else: the group frame itself stays on the group topic.
    assert!(drain_messages(&mut bob)
        .await
        .iter()
        .all(|m| m["action"] != "message"));
}
