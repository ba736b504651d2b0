#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use pulse_server::config::Config;
use pulse_server::pipeline::{fanout, retention};
use pulse_server::{routes, AppState};
use serde_json::Value;
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message;

pub type WsClient =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Start the test app on a random TCP port and return the base URL.
pub async fn start_server() -> (String, sqlx::SqlitePool) {
    let (base, pool, _) = start_server_with(super::test_config()).await;
    (base, pool)
}

/// Same, but with a custom config and the state handle exposed. Spawns the
/// same background workers main does.
pub async fn start_server_with(config: Config) -> (String, sqlx::SqlitePool, Arc<AppState>) {
    let pool = super::setup_test_db().await;
    let state = Arc::new(AppState::new(pool.clone(), config.clone()));

    retention::spawn_retention_sweeper(state.clone());
    if config.group_fanout_queue {
        fanout::spawn_group_update_consumer(state.clone());
    }

    let app = routes::build_router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base = format!("http://127.0.0.1:{}", addr.port());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    (base, pool, state)
}

/// Connect a WebSocket with a session token.
pub async fn ws_connect(base: &str, token: &str) -> WsClient {
    ws_connect_device(base, token, "d1").await
}

pub async fn ws_connect_device(base: &str, token: &str, device_id: &str) -> WsClient {
    let ws_url = format!(
        "{}/gateway?token={}&deviceId={}",
        base.replace("http://", "ws://"),
        token,
        device_id
    );
    let (ws, _) = tokio_tungstenite::connect_async(&ws_url).await.unwrap();
    ws
}

/// Give freshly opened connections a moment to finish their delivery-topic
/// subscriptions before frames start flying.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
}

/// Read next text message parsed as JSON, with timeout.
pub async fn recv_json(ws: &mut WsClient) -> Option<Value> {
    let timeout = tokio::time::timeout(std::time::Duration::from_secs(3), ws.next()).await;
    match timeout {
        Ok(Some(Ok(Message::Text(text)))) => serde_json::from_str(&text).ok(),
        _ => None,
    }
}

/// Skip frames until one with the given action arrives.
pub async fn recv_action(ws: &mut WsClient, action: &str) -> Option<Value> {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(3);
    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout_at(deadline, ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                if let Ok(v) = serde_json::from_str::<Value>(&text) {
                    if v["action"] == action {
                        return Some(v);
                    }
                }
            }
            _ => return None,
        }
    }
    None
}

/// Drain all pending messages until timeout.
pub async fn drain_messages(ws: &mut WsClient) -> Vec<Value> {
    let mut messages = Vec::new();
    loop {
        let timeout = tokio::time::timeout(std::time::Duration::from_millis(200), ws.next()).await;
        match timeout {
            Ok(Some(Ok(Message::Text(text)))) => {
                if let Ok(v) = serde_json::from_str::<Value>(&text) {
                    messages.push(v);
                }
            }
            _ => break,
        }
    }
    messages
}

/// Send a JSON message over WebSocket.
pub async fn send_json(ws: &mut WsClient, value: &Value) {
    ws.send(Message::Text(
        serde_json::to_string(value).unwrap().into(),
    ))
    .await
    .unwrap();
}
