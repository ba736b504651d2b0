use serde_json::Value;

use crate::calls::CallService;
use crate::ws::events::{ErrorCode, ServerEvent};

use super::Conn;

/// Call control is delegated to the injected call service; without one the
/// gateway only knows how to say WEBRTC_DISABLED.
pub async fn handle_call_start(conn: &Conn, to: String, kind: String) {
    let Some(calls) = conn.state.calls.as_ref() else {
        conn.send_event(&ServerEvent::error(ErrorCode::WebrtcDisabled)).await;
        return;
    };

    match conn.state.relations.is_friend(&conn.user.id, &to).await {
        Ok(true) => {}
        _ => {
            conn.send_event(&ServerEvent::error(ErrorCode::NotFriend)).await;
            return;
        }
    }

    match calls
        .start_call(&conn.state.bus, &conn.user.id, &to, &kind)
        .await
    {
        Ok(call) => conn.send_event(&ServerEvent::CallStarted(call)).await,
        Err(e) => {
            conn.send_event(&ServerEvent::error_with(ErrorCode::CallFailed, e.to_string()))
                .await;
        }
    }
}

pub async fn handle_call_answer(conn: &Conn, call_id: String) {
    let Some(calls) = conn.state.calls.as_ref() else {
        conn.send_event(&ServerEvent::error(ErrorCode::WebrtcDisabled)).await;
        return;
    };
    match calls
        .answer_call(&conn.state.bus, &call_id, &conn.user.id)
        .await
    {
        Ok(call) => conn.send_event(&ServerEvent::CallAnswered(call)).await,
        Err(e) => {
            conn.send_event(&ServerEvent::error_with(ErrorCode::CallFailed, e.to_string()))
                .await;
        }
    }
}

pub async fn handle_call_reject(conn: &Conn, call_id: String) {
    let Some(calls) = conn.state.calls.as_ref() else { return };
    if let Ok(call) = calls
        .reject_call(&conn.state.bus, &call_id, &conn.user.id)
        .await
    {
        conn.send_event(&ServerEvent::CallRejected(call)).await;
    }
}

pub async fn handle_call_end(conn: &Conn, call_id: String) {
    let Some(calls) = conn.state.calls.as_ref() else { return };
    if let Ok(call) = calls
        .end_call(&conn.state.bus, &call_id, &conn.user.id)
        .await
    {
        conn.send_event(&ServerEvent::CallEnded(call)).await;
    }
}

pub async fn handle_signaling(conn: &Conn, payload: Value) {
    let Some(calls) = conn.state.calls.as_ref() else { return };
    calls
        .forward_signaling(&conn.state.bus, &conn.user.id, payload)
        .await;
}
