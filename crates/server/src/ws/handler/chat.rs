use pulse_shared::validation;

use crate::bus::{group_topic, user_topic};
use crate::models::{ConvType, Message};
use crate::now_ms;
use crate::pipeline::{self, fanout, SendRequest};
use crate::seq_cache::read_seq_key;
use crate::ws::events::{ErrorCode, SendFrame, ServerEvent, StartStreamFrame, TypingFrame};

use super::Conn;

fn validate_send(frame: &SendFrame) -> Result<(), String> {
    validation::validate_conv_id(&frame.conv_id)?;
    validation::validate_client_msg_id(&frame.client_msg_id)?;
    validation::validate_message_type(&frame.msg_type)?;
    let payload_len = serde_json::to_vec(&frame.payload).map(|v| v.len()).unwrap_or(0);
    validation::validate_payload_size(payload_len)
}

/// True when the sender may address this conversation; sends an error frame
/// otherwise. A store failure on the check surfaces as SEND_FAILED.
async fn authorize(
    conn: &Conn,
    conv_type: ConvType,
    to: Option<&str>,
    group_id: Option<&str>,
) -> bool {
    let state = &conn.state;
    match conv_type {
        ConvType::C2c => {
            let Some(to) = to else {
                tracing::warn!("WS send dropped, c2c without to: user={}", conn.user.id);
                return false;
            };
            match state.relations.is_friend(&conn.user.id, to).await {
                Ok(true) => true,
                Ok(false) => {
                    conn.send_event(&ServerEvent::error(ErrorCode::NotFriend)).await;
                    false
                }
                Err(e) => {
                    tracing::error!("Friend check error: user={} err={:?}", conn.user.id, e);
                    conn.send_event(&ServerEvent::error(ErrorCode::SendFailed)).await;
                    false
                }
            }
        }
        ConvType::Group => {
            let Some(group_id) = group_id else {
                tracing::warn!("WS send dropped, group without groupId: user={}", conn.user.id);
                return false;
            };
            match state.relations.is_member(group_id, &conn.user.id).await {
                Ok(true) => {}
                Ok(false) => {
                    conn.send_event(&ServerEvent::error(ErrorCode::NotGroupMember)).await;
                    return false;
                }
                Err(e) => {
                    tracing::error!("Member check error: user={} err={:?}", conn.user.id, e);
                    conn.send_event(&ServerEvent::error(ErrorCode::SendFailed)).await;
                    return false;
                }
            }
            match state.relations.is_muted(group_id, &conn.user.id).await {
                Ok(false) => true,
                Ok(true) => {
                    conn.send_event(&ServerEvent::error_with(
                        ErrorCode::SendFailed,
                        "group is muted or sender muted",
                    ))
                    .await;
                    false
                }
                Err(e) => {
                    tracing::error!("Mute check error: user={} err={:?}", conn.user.id, e);
                    conn.send_event(&ServerEvent::error(ErrorCode::SendFailed)).await;
                    false
                }
            }
        }
    }
}

pub(super) async fn authorize_stream(conn: &Conn, frame: &StartStreamFrame) -> bool {
    authorize(conn, frame.conv_type, frame.to.as_deref(), frame.group_id.as_deref()).await
}

pub async fn handle_send(conn: &Conn, frame: SendFrame) {
    let state = &conn.state;

    // Flow control before any other work.
    let key = format!("{}:{}:send", conn.user.id, conn.device_id);
    let (allowed, _) = state
        .limiter
        .allow(&key, state.config.send_qps, state.config.send_burst)
        .await;
    if !allowed {
        conn.send_event(&ServerEvent::error(ErrorCode::RateLimit)).await;
        tracing::warn!(
            "WS send blocked by rate limit: user={} device={}",
            conn.user.id,
            conn.device_id
        );
        return;
    }

    if let Err(e) = validate_send(&frame) {
        tracing::warn!("WS send dropped: user={} reason={}", conn.user.id, e);
        return;
    }

    if !authorize(conn, frame.conv_type, frame.to.as_deref(), frame.group_id.as_deref()).await {
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
        expire_at: frame.expire_at_ms,
        burn_after_read: frame.burn_after_read,
    };

    match pipeline::send(state, req).await {
        Ok(d) => {
            conn.send_event(&ServerEvent::Ack(Box::new(d.clone()))).await;
            fanout::deliver(state, &d).await;
        }
        Err(e) => {
            tracing::error!("WS send failed: user={} err={:?}", conn.user.id, e);
            conn.send_event(&ServerEvent::error_with(ErrorCode::SendFailed, e.to_string()))
                .await;
        }
    }
}

pub async fn handle_recall(conn: &Conn, conv_id: String, server_msg_id: String) {
    match pipeline::recall(&conn.state, &conn.user.id, &conv_id, &server_msg_id).await {
        Ok(Some(msg)) => publish_recalled(conn, &msg).await,
        Ok(None) => {}
        Err(e) => tracing::warn!(
            "WS recall rejected: user={} conv={} err={:?}",
            conn.user.id,
            conv_id,
            e
        ),
    }
}

pub async fn handle_read(conn: &Conn, conv_id: String, seq: i64) {
    let state = &conn.state;

    conn.send_event(&ServerEvent::ReadAck {
        conv_id: conv_id.clone(),
        seq,
    })
    .await;

    if let Err(e) = state.receipts.upsert_read_seq(&conn.user.id, &conv_id, seq).await {
        tracing::error!("Read receipt upsert failed: user={} err={:?}", conn.user.id, e);
        return;
    }
    let key = read_seq_key(&conn.user.id, &conv_id);
    let cached = state.seq_cache.get(&key).await.unwrap_or(0);
    state.seq_cache.put(&key, cached.max(seq)).await;

    match pipeline::burn_on_read(state, &conn.user.id, &conv_id, seq).await {
        Ok(Some(msg)) => publish_recalled(conn, &msg).await,
        Ok(None) => {}
        Err(e) => tracing::error!(
            "Burn-on-read failed: user={} conv={} err={:?}",
            conn.user.id,
            conv_id,
            e
        ),
    }
}

/// Route a recalled event to everyone who saw (or could see) the message.
async fn publish_recalled(conn: &Conn, msg: &Message) {
    let state = &conn.state;
    let event = ServerEvent::Recalled {
        conv_id: msg.conv_id.clone(),
        seq: msg.seq,
    };
    match msg.conv_type {
        ConvType::C2c => {
            if let Some(to) = &msg.to_user_id {
                state.bus.publish_json(&user_topic(to), &event).await;
            }
            state.bus.publish_json(&user_topic(&msg.from_user_id), &event).await;
        }
        ConvType::Group => {
            if let Some(group_id) = &msg.group_id {
                state.bus.publish_json(&group_topic(group_id), &event).await;
            }
        }
    }
}

/// Typing is ephemeral: permission-checked, relayed, never persisted.
pub async fn handle_typing(conn: &Conn, frame: TypingFrame) {
    let state = &conn.state;
    let event = ServerEvent::Typing {
        conv_id: frame.conv_id.clone(),
        conv_type: frame.conv_type,
        from: conn.user.id.clone(),
        to: frame.to.clone(),
        group_id: frame.group_id.clone(),
        typing: frame.typing,
        ts: now_ms(),
    };

    match frame.conv_type {
        ConvType::C2c => {
            let Some(to) = frame.to.as_deref() else { return };
            match state.relations.is_friend(&conn.user.id, to).await {
                Ok(true) => {
                    state.bus.publish_json(&user_topic(to), &event).await;
                }
                _ => tracing::debug!(
                    "WS typing dropped NOT_FRIEND: user={} to={}",
                    conn.user.id,
                    to
                ),
            }
        }
        ConvType::Group => {
            let Some(group_id) = frame.group_id.as_deref() else { return };
            match state.relations.is_member(group_id, &conn.user.id).await {
                Ok(true) => {
                    state.bus.publish_json(&group_topic(group_id), &event).await;
                }
                _ => tracing::debug!(
                    "WS typing dropped NOT_GROUP_MEMBER: user={} group={}",
                    conn.user.id,
                    group_id
                ),
            }
        }
    }
}
