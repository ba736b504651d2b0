mod calls;
mod chat;
mod lifecycle;
mod stream;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::models::AuthUser;
use crate::now_ms;
use crate::ws::events::{ClientAction, ServerEvent};
use crate::AppState;

/// Outbound frames queued per connection; a writer that cannot drain them
/// within the deadline is considered dead.
const OUTBOUND_BUFFER: usize = 256;

/// One authenticated connection. All outbound frames funnel through `tx`
/// into the single writer task, which is what serializes writes to the
/// transport.
pub(crate) struct Conn {
    pub state: Arc<AppState>,
    pub user: AuthUser,
    pub device_id: String,
    pub(crate) tx: mpsc::Sender<String>,
    pub(crate) groups: Mutex<HashSet<String>>,
    aux_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Conn {
    pub async fn send_event(&self, event: &ServerEvent) {
        match serde_json::to_string(event) {
            Ok(frame) => {
                if self.tx.send(frame).await.is_err() {
                    tracing::debug!("WS outbound dropped, connection closing: user={}", self.user.id);
                }
            }
            Err(e) => tracing::error!("WS event serialize error: {:?}", e),
        }
    }

    pub async fn track_aux(&self, handle: JoinHandle<()>) {
        self.aux_tasks.lock().await.push(handle);
    }

    async fn shutdown(&self) {
        for handle in self.aux_tasks.lock().await.drain(..) {
            handle.abort();
        }
    }
}

/// WebSocket upgrade handler. An invalid or missing token refuses the
/// handshake with 401.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: axum::http::HeaderMap,
) -> impl IntoResponse {
    let Some(user) = extract_session(&state, &headers, &query).await else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let device_id = query
        .get("deviceId")
        .cloned()
        .unwrap_or_else(|| format!("web-{}", chrono::Utc::now().format("%H%M%S%.3f")));

    ws.on_upgrade(move |socket| handle_socket(socket, state, user, device_id))
        .into_response()
}

async fn extract_session(
    state: &AppState,
    headers: &axum::http::HeaderMap,
    query: &HashMap<String, String>,
) -> Option<AuthUser> {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.to_string());

    let token = query.get("token").cloned().or(bearer)?;
    if token.is_empty() {
        return None;
    }

    let row = sqlx::query_as::<_, (String, String, i64)>(
        r#"SELECT u.id, u.username, s.expires_at
           FROM sessions s
           JOIN users u ON u.id = s.user_id
           WHERE s.token = ?"#,
    )
    .bind(&token)
    .fetch_optional(&state.db)
    .await
    .ok()??;

    if row.2 < now_ms() {
        return None;
    }

    Some(AuthUser {
        id: row.0,
        username: row.1,
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user: AuthUser, device_id: String) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);

    state.presence.set_online(&user.id, &device_id).await;
    tracing::info!("WS connected: user={} device={}", user.id, device_id);

    // Writer task: sole consumer of the outbound queue. Each frame gets the
    // write deadline; missing it terminates the connection.
    let write_deadline = std::time::Duration::from_secs(state.config.write_deadline_secs);
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match tokio::time::timeout(write_deadline, ws_tx.send(Message::Text(frame.into())))
                .await
            {
                Ok(Ok(())) => {}
                _ => break,
            }
        }
    });

    let conn = Arc::new(Conn {
        state: state.clone(),
        user: user.clone(),
        device_id: device_id.clone(),
        tx: tx.clone(),
        groups: Mutex::new(HashSet::new()),
        aux_tasks: Mutex::new(Vec::new()),
    });

    // Personal delivery-topic subscription feeding the writer.
    lifecycle::spawn_user_relay(&conn).await;

    // Reader task: parse and dispatch inbound actions. Malformed frames are
    // dropped with a log line, never answered.
    let recv_conn = Arc::clone(&conn);
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientAction>(&text) {
                    Ok(action) => dispatch(&recv_conn, action).await,
                    Err(e) => {
                        tracing::warn!(
                            "WS frame dropped: user={} err={}",
                            recv_conn.user.id,
                            e
                        );
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    conn.shutdown().await;
    let went_offline = state.presence.set_offline(&user.id, &device_id).await;
    tracing::info!(
        "WS disconnected: user={} device={} offline={}",
        user.id,
        device_id,
        went_offline
    );
}

async fn dispatch(conn: &Conn, action: ClientAction) {
    match action {
        ClientAction::Send(frame) => chat::handle_send(conn, frame).await,
        ClientAction::Recall {
            conv_id,
            server_msg_id,
        } => chat::handle_recall(conn, conv_id, server_msg_id).await,
        ClientAction::Read { conv_id, seq } => chat::handle_read(conn, conv_id, seq).await,
        ClientAction::Typing(frame) => chat::handle_typing(conn, frame).await,
        ClientAction::SubscribeGroup { group_id } => {
            lifecycle::handle_subscribe_group(conn, group_id).await
        }
        ClientAction::StartStream(frame) => stream::handle_start_stream(conn, frame).await,
        ClientAction::StreamChunk {
            stream_id,
            delta,
            metadata,
        } => stream::handle_stream_chunk(conn, stream_id, delta, metadata).await,
        ClientAction::EndStream {
            stream_id,
            final_text,
            error,
        } => stream::handle_end_stream(conn, stream_id, final_text, error).await,
        ClientAction::CallStart { to, kind } => calls::handle_call_start(conn, to, kind).await,
        ClientAction::CallAnswer { call_id } => calls::handle_call_answer(conn, call_id).await,
        ClientAction::CallReject { call_id } => calls::handle_call_reject(conn, call_id).await,
        ClientAction::CallEnd { call_id } => calls::handle_call_end(conn, call_id).await,
        ClientAction::WebrtcSignaling(payload) => calls::handle_signaling(conn, payload).await,
    }
}
