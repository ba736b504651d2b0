mod common;

use common::ws_helpers::*;
use serde_json::json;

#[tokio::test]
async fn burn_after_read_recalls_exactly_once() {
    let (base, pool) = start_server().await;
    let (alice_id, alice_token) = common::create_test_user(&pool, "alice").await;
    let (bob_id, bob_token) = common::create_test_user(&pool, "bob").await;
    common::make_friends(&pool, &alice_id, &bob_id).await;

    let mut alice = ws_connect(&base, &alice_token).await;
    let mut bob = ws_connect(&base, &bob_token).await;
    settle().await;

    let conv_id = format!("c2c:{alice_id}:{bob_id}");
    send_json(
        &mut alice,
        &json!({
            "action": "send",
            "data": {
                "convId": conv_id,
                "convType": "c2c",
                "to": bob_id,
                "type": "text",
                "clientMsgId": "cm-burn",
                "payload": { "text": "this message will self-destruct" },
                "burnAfterRead": true
            }
        }),
    )
    .await;
    let ack = recv_action(&mut alice, "ack").await.expect("no ack");
    let seq = ack["data"]["seq"].as_i64().unwrap();
    assert_eq!(ack["data"]["burnAfterRead"], true);

    recv_action(&mut bob, "message").await.expect("no delivery");

    send_json(
        &mut bob,
        &json!({"action": "read", "data": {"convId": conv_id, "seq": seq}}),
    )
    .await;

    let read_ack = recv_action(&mut bob, "read_ack").await.expect("no read_ack");
    assert_eq!(read_ack["data"]["seq"], seq);

    let recalled_bob = recv_action(&mut bob, "recalled").await.expect("no recall at bob");
    assert_eq!(recalled_bob["data"]["convId"], conv_id.as_str());
    assert_eq!(recalled_bob["data"]["seq"], seq);
    let recalled_alice = recv_action(&mut alice, "recalled").await.expect("no recall at alice");
    assert_eq!(recalled_alice["data"]["seq"], seq);

    // A second read must not produce another recall event.
    send_json(
        &mut bob,
        &json!({"action": "read", "data": {"convId": conv_id, "seq": seq}}),
    )
    .await;
    recv_action(&mut bob, "read_ack").await.expect("no second read_ack");
    let rest_bob = drain_messages(&mut bob).await;
    assert!(rest_bob.iter().all(|m| m["action"] != "recalled"));
    let rest_alice = drain_messages(&mut alice).await;
    assert!(rest_alice.iter().all(|m| m["action"] != "recalled"));

    let recalled = sqlx::query_scalar::<_, bool>(
        "SELECT recalled FROM messages WHERE conv_id = ? AND seq = ?",
    )
    .bind(&conv_id)
    .bind(seq)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(recalled);
}

#[tokio::test]
async fn sender_read_does_not_burn() {
    let (base, pool) = start_server().await;
    let (alice_id, alice_token) = common::create_test_user(&pool, "alice").await;
    let (bob_id, _) = common::create_test_user(&pool, "bob").await;
    common::make_friends(&pool, &alice_id, &bob_id).await;

    let mut alice = ws_connect(&base, &alice_token).await;
    let conv_id = format!("c2c:{alice_id}:{bob_id}");

    send_json(
        &mut alice,
        &json!({
            "action": "send",
            "data": {
                "convId": conv_id, "convType": "c2c", "to": bob_id,
                "type": "text", "clientMsgId": "cm-1",
                "payload": {"text": "x"}, "burnAfterRead": true
            }
        }),
    )
    .await;
    let ack = recv_action(&mut alice, "ack").await.expect("no ack");
    let seq = ack["data"]["seq"].as_i64().unwrap();

    send_json(
        &mut alice,
        &json!({"action": "read", "data": {"convId": conv_id, "seq": seq}}),
    )
    .await;
    recv_action(&mut alice, "read_ack").await.expect("no read_ack");
    assert!(drain_messages(&mut alice)
        .await
        .iter()
        .all(|m| m["action"] != "recalled"));

    let recalled = sqlx::query_scalar::<_, bool>(
        "SELECT recalled FROM messages WHERE conv_id = ? AND seq = ?",
    )
    .bind(&conv_id)
    .bind(seq)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(!recalled);
}

#[tokio::test]
async fn read_seq_is_monotonic() {
    let (base, pool) = start_server().await;
    let (alice_id, alice_token) = common::create_test_user(&pool, "alice").await;
    let (bob_id, _) = common::create_test_user(&pool, "bob").await;
    common::make_friends(&pool, &alice_id, &bob_id).await;

    let mut alice = ws_connect(&base, &alice_token).await;
    let conv_id = format!("c2c:{alice_id}:{bob_id}");

    for seq in [5i64, 3, 9, 2] {
        send_json(
            &mut alice,
            &json!({"action": "read", "data": {"convId": conv_id, "seq": seq}}),
        )
        .await;
        recv_action(&mut alice, "read_ack").await.expect("no read_ack");
    }

    // Give the receipt writes a moment to land.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let stored = sqlx::query_scalar::<_, i64>(
        "SELECT seq FROM read_receipts WHERE user_id = ? AND conv_id = ?",
    )
    .bind(&alice_id)
    .bind(&conv_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(stored, 9);
}
