use serde_json::Value;

use crate::pipeline::{self, fanout, SendRequest};
use crate::ws::events::{ErrorCode, ServerEvent, StartStreamFrame};

use super::chat;
use super::Conn;

pub async fn handle_start_stream(conn: &Conn, frame: StartStreamFrame) {
    let state = &conn.state;

    let key = format!("{}:{}:send", conn.user.id, conn.device_id);
    let (allowed, _) = state
        .limiter
        .allow(&key, state.config.send_qps, state.config.send_burst)
        .await;
    if !allowed {
        conn.send_event(&ServerEvent::error(ErrorCode::RateLimit)).await;
        return;
    }

    if !chat::authorize_stream(conn, &frame).await {
        return;
    }

    let req = SendRequest {
        conv_id: frame.conv_id,
        conv_type: frame.conv_type,
        client_msg_id: frame.client_msg_id,
        from: conn.user.id.clone(),
        to: frame.to,
        group_id: frame.group_id,
        msg_type: frame.msg_type,
        payload: frame.payload,
        stream_id: None,
        stream_seq: None,
        stream_status: None,
        is_streaming: false,
        seq: None,
        expire_at: None,
        burn_after_read: false,
    };

    match pipeline::start_stream(state, req).await {
        Ok(d) => {
            conn.send_event(&ServerEvent::StreamStarted(Box::new(d.clone()))).await;
            fanout::deliver(state, &d).await;
        }
        Err(e) => {
            tracing::error!("WS start_stream failed: user={} err={:?}", conn.user.id, e);
            conn.send_event(&ServerEvent::error_with(
                ErrorCode::StreamStartFailed,
                e.to_string(),
            ))
            .await;
        }
    }
}

pub async fn handle_stream_chunk(
    conn: &Conn,
    stream_id: String,
    delta: String,
    metadata: Option<Value>,
) {
    match pipeline::stream_chunk(&conn.state, &stream_id, &delta, metadata).await {
        Ok(d) => fanout::deliver(&conn.state, &d).await,
        Err(e) => {
            conn.send_event(&ServerEvent::error_with(ErrorCode::StreamError, e.to_string()))
                .await;
        }
    }
}

pub async fn handle_end_stream(
    conn: &Conn,
    stream_id: String,
    final_text: Option<String>,
    error: Option<String>,
) {
    match pipeline::end_stream(&conn.state, &stream_id, final_text, error).await {
        Ok(d) => {
            conn.send_event(&ServerEvent::StreamEnded {
                stream_id: stream_id.clone(),
            })
            .await;
            fanout::deliver(&conn.state, &d).await;
        }
        Err(e) => {
            conn.send_event(&ServerEvent::error_with(ErrorCode::StreamError, e.to_string()))
                .await;
        }
    }
}
