use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;

use crate::bus::{group_topic, user_topic};
use crate::ws::events::{ErrorCode, ServerEvent};

use super::Conn;

/// Subscribe the connection to its personal delivery topic and relay every
/// publish into the writer queue. The relay dies with the connection.
pub async fn spawn_user_relay(conn: &Arc<Conn>) {
    let mut sub = conn.state.bus.subscribe(&user_topic(&conn.user.id)).await;
    let tx = conn.tx.clone();
    let user_id = conn.user.id.clone();
    let handle = tokio::spawn(async move {
        loop {
            match sub.recv().await {
                Ok(frame) => {
                    if tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("WS relay lagged: user={} dropped={}", user_id, n);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
    conn.track_aux(handle).await;
}

/// Auxiliary subscription to a group's delivery topic. Membership-checked at
/// ingress; duplicate subscriptions are ignored so a client can never
/// receive the same group frame twice. Lives until the connection closes.
pub async fn handle_subscribe_group(conn: &Conn, group_id: String) {
    match conn.state.relations.is_member(&group_id, &conn.user.id).await {
        Ok(true) => {}
        Ok(false) => {
            conn.send_event(&ServerEvent::error(ErrorCode::NotGroupMember)).await;
            return;
        }
        Err(e) => {
            tracing::error!(
                "Member check error on subscribe: user={} group={} err={:?}",
                conn.user.id,
                group_id,
                e
            );
            return;
        }
    }

    {
        let mut groups = conn.groups.lock().await;
        if !groups.insert(group_id.clone()) {
            tracing::debug!(
                "WS duplicate group subscription ignored: user={} group={}",
                conn.user.id,
                group_id
            );
            return;
        }
    }

    let mut sub = conn.state.bus.subscribe(&group_topic(&group_id)).await;
    let tx = conn.tx.clone();
    let user_id = conn.user.id.clone();
    tracing::info!("WS subscribe_group: user={} group={}", user_id, group_id);
    let handle = tokio::spawn(async move {
        loop {
            match sub.recv().await {
                Ok(frame) => {
                    if tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(
                        "WS group relay lagged: user={} group={} dropped={}",
                        user_id,
                        group_id,
                        n
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
    conn.track_aux(handle).await;
}
