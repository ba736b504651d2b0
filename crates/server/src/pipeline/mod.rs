pub mod fanout;
pub mod retention;
mod stream;

pub use stream::{StreamCoordinator, StreamState};

use pulse_shared::constants::RECALL_WINDOW_MS;
use sqlx::types::Json;

use crate::error::{AppError, Result};
use crate::models::{ConvType, Deliver, Message, StreamStatus};
use crate::now_ms;
use crate::seq_cache::last_seq_key;
use crate::store::MessageLog;
use crate::AppState;

/// Internal send request assembled by the gateway (or the stream
/// coordinator for chunk/end records).
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub conv_id: String,
    pub conv_type: ConvType,
    pub client_msg_id: String,
    pub from: String,
    pub to: Option<String>,
    pub group_id: Option<String>,
    pub msg_type: String,
    pub payload: serde_json::Value,
    pub stream_id: Option<String>,
    pub stream_seq: Option<i64>,
    pub stream_status: Option<StreamStatus>,
    pub is_streaming: bool,
    /// Chunks ride on the stream's base seq instead of drawing a new one.
    pub seq: Option<i64>,
    pub expire_at: Option<i64>,
    pub burn_after_read: bool,
}

fn should_persist(req: &SendRequest) -> bool {
    !req.is_streaming
        || matches!(
            req.stream_status,
            Some(StreamStatus::Start) | Some(StreamStatus::End) | Some(StreamStatus::Error)
        )
}

/// Ingest one message: idempotent append, seq allocation, conversation
/// index update. Returns the ready-to-deliver envelope; the caller acks it
/// and hands it to the fan-out engine.
pub async fn send(state: &AppState, req: SendRequest) -> Result<Deliver> {
    let (d, _) = ingest(state, req).await?;
    Ok(d)
}

/// Like `send`, but also reports whether this call persisted a new record.
/// False means an idempotent replay answered from the existing row.
async fn ingest(state: &AppState, req: SendRequest) -> Result<(Deliver, bool)> {
    let persist = should_persist(&req);

    if persist {
        if let Some(existing) = state
            .log
            .get_by_client_id(&req.conv_id, &req.client_msg_id)
            .await?
        {
            tracing::debug!(
                "Send replay: conv={} clientMsgId={} seq={}",
                req.conv_id,
                req.client_msg_id,
                existing.seq
            );
            return Ok((existing.into(), false));
        }
    }

    let now = now_ms();
    let seq = if persist {
        state
            .allocator
            .next(
                &req.conv_id,
                req.conv_type,
                req.to.as_deref(),
                req.group_id.as_deref(),
                now,
            )
            .await?
    } else {
        req.seq.unwrap_or(0)
    };

    let msg = Message {
        server_msg_id: uuid::Uuid::new_v4().to_string(),
        client_msg_id: req.client_msg_id.clone(),
        conv_id: req.conv_id.clone(),
        conv_type: req.conv_type,
        from_user_id: req.from.clone(),
        to_user_id: req.to.clone(),
        group_id: req.group_id.clone(),
        seq,
        timestamp: now,
        msg_type: req.msg_type.clone(),
        payload: Json(req.payload.clone()),
        recalled: false,
        expire_at: req.expire_at,
        burn_after_read: req.burn_after_read,
        stream_id: req.stream_id.clone(),
        stream_seq: req.stream_seq,
        stream_status: req.stream_status,
        is_streaming: req.is_streaming,
    };

    if persist {
        let inserted = state.log.append(&msg).await?;
        if !inserted {
            // Lost an idempotency race; the winner's row is the answer.
            if let Some(existing) = state
                .log
                .get_by_client_id(&req.conv_id, &req.client_msg_id)
                .await?
            {
                return Ok((existing.into(), false));
            }
        }
    }

    if persist && (!req.is_streaming || req.stream_status == Some(StreamStatus::Start)) {
        update_conversation_index(state, &req, seq, now).await;
    }

    Ok((msg.into(), true))
}

/// Index maintenance is best-effort: failures are logged, the send acks.
async fn update_conversation_index(state: &AppState, req: &SendRequest, seq: i64, now: i64) {
    state.seq_cache.put(&last_seq_key(&req.conv_id), seq).await;

    let conv_type = req.conv_type.as_str();
    if let Err(e) = state
        .conversations
        .upsert_user_conversation(
            &req.from,
            &req.conv_id,
            conv_type,
            req.to.as_deref(),
            req.group_id.as_deref(),
            now,
        )
        .await
    {
        tracing::warn!("Conv index upsert failed: user={} err={:?}", req.from, e);
    }

    match req.conv_type {
        ConvType::C2c => {
            if let Some(to) = req.to.as_deref() {
                if let Err(e) = state
                    .conversations
                    .upsert_user_conversation(to, &req.conv_id, conv_type, Some(&req.from), None, now)
                    .await
                {
                    tracing::warn!("Conv index upsert failed: user={} err={:?}", to, e);
                }
            }
        }
        ConvType::Group => {
            if let Some(group_id) = req.group_id.as_deref() {
                fanout::index_fanout(state, group_id, &req.conv_id, &req.from).await;
            }
        }
    }
}

/// Open a stream: persist the start record and register transient state.
pub async fn start_stream(state: &AppState, mut req: SendRequest) -> Result<Deliver> {
    let stream_id = uuid::Uuid::new_v4().to_string();
    req.stream_id = Some(stream_id);
    req.stream_seq = Some(1);
    req.stream_status = Some(StreamStatus::Start);
    req.is_streaming = true;

    let (d, fresh) = ingest(state, req).await?;
    // A replayed start answers with the original stream id and must not
    // touch coordinator state: resetting it would corrupt chunk numbering
    // on a live stream, or resurrect one that already ended.
    if fresh {
        if let Some(sid) = d.stream_id.clone() {
            state
                .streams
                .begin(
                    sid,
                    d.conv_id.clone(),
                    d.conv_type,
                    d.from.clone(),
                    d.to.clone(),
                    d.group_id.clone(),
                    d.seq,
                )
                .await;
        }
    }
    Ok(d)
}

/// One delivery-only chunk. Never persisted, never indexed.
pub async fn stream_chunk(
    state: &AppState,
    stream_id: &str,
    delta: &str,
    metadata: Option<serde_json::Value>,
) -> Result<Deliver> {
    let st = state
        .streams
        .next_chunk(stream_id)
        .await
        .ok_or_else(|| AppError::StreamNotFound(stream_id.to_string()))?;

    let mut payload = serde_json::Map::new();
    payload.insert("delta".into(), serde_json::Value::String(delta.to_string()));
    if let Some(metadata) = metadata {
        payload.insert("metadata".into(), metadata);
    }

    let req = SendRequest {
        conv_id: st.conv_id,
        conv_type: st.conv_type,
        client_msg_id: format!("{stream_id}-{}", st.stream_seq),
        from: st.from,
        to: st.to,
        group_id: st.group_id,
        msg_type: "stream".into(),
        payload: serde_json::Value::Object(payload),
        stream_id: Some(stream_id.to_string()),
        stream_seq: Some(st.stream_seq),
        stream_status: Some(StreamStatus::Chunk),
        is_streaming: true,
        seq: Some(st.seq),
        expire_at: None,
        burn_after_read: false,
    };
    send(state, req).await
}

/// Close a stream with a final (or error) record and destroy the state.
pub async fn end_stream(
    state: &AppState,
    stream_id: &str,
    final_text: Option<String>,
    error: Option<String>,
) -> Result<Deliver> {
    // A resent end frame is answered from the durable record; the first
    // call already tore down the coordinator state.
    if let Some(existing) = state.log.get_stream_end(stream_id).await? {
        return Ok(existing.into());
    }

    let st = state
        .streams
        .finish(stream_id)
        .await
        .ok_or_else(|| AppError::StreamNotFound(stream_id.to_string()))?;

    let status = if error.is_some() {
        StreamStatus::Error
    } else {
        StreamStatus::End
    };
    let payload = match &error {
        Some(err) => serde_json::json!({ "error": err }),
        None => serde_json::json!({ "text": final_text.unwrap_or_default() }),
    };

    let req = SendRequest {
        conv_id: st.conv_id,
        conv_type: st.conv_type,
        client_msg_id: format!("{stream_id}-end"),
        from: st.from,
        to: st.to,
        group_id: st.group_id,
        msg_type: "stream".into(),
        payload,
        stream_id: Some(stream_id.to_string()),
        stream_seq: Some(st.stream_seq + 1),
        stream_status: Some(status),
        is_streaming: true,
        seq: None,
        expire_at: None,
        burn_after_read: false,
    };
    send(state, req).await
}

/// Sender-only recall within the recall window. Returns the recalled
/// message so the caller can route the `recalled` event.
pub async fn recall(
    state: &AppState,
    user_id: &str,
    conv_id: &str,
    server_msg_id: &str,
) -> Result<Option<Message>> {
    let Some(msg) = state.log.get_by_server_id(conv_id, server_msg_id).await? else {
        return Ok(None);
    };
    if msg.from_user_id != user_id {
        return Err(AppError::Forbidden);
    }
    if now_ms() - msg.timestamp > RECALL_WINDOW_MS {
        return Err(AppError::Forbidden);
    }
    if state.log.recall(conv_id, server_msg_id).await? {
        Ok(Some(msg))
    } else {
        Ok(None)
    }
}

/// Burn-after-read: the first read from a non-sender recalls the message.
/// The conditional store update makes the flip happen exactly once even
/// under concurrent reads.
pub async fn burn_on_read(
    state: &AppState,
    reader: &str,
    conv_id: &str,
    seq: i64,
) -> Result<Option<Message>> {
    let Some(msg) = state.log.get_by_seq(conv_id, seq).await? else {
        return Ok(None);
    };
    if !msg.burn_after_read || msg.recalled || msg.from_user_id == reader {
        return Ok(None);
    }
    if state.log.recall_burned(conv_id, seq).await? {
        Ok(Some(msg))
    } else {
        Ok(None)
    }
}
