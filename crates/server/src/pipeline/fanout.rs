use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::bus::{self, GROUP_UPDATE_TOPIC};
use crate::models::{ConvType, Deliver};
use crate::now_ms;
use crate::store::{ConversationStore, RelationStore};
use crate::ws::events::ServerEvent;
use crate::AppState;

/// Membership-expansion event handed to the group_update queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupUpdate {
    pub group_id: String,
    pub conv_id: String,
    pub from: String,
    #[serde(rename = "type")]
    pub conv_type: String,
    pub ts: i64,
}

/// Publish a ready envelope to its delivery topics.
///
/// Best-effort: a publish that reaches nobody is fine, durability lives in
/// the message log. c2c goes to both personal topics (the sender echo keeps
/// other devices in sync); group traffic goes to the group topic exactly
/// once and never to personal topics.
pub async fn deliver(state: &AppState, d: &Deliver) {
    let frame = ServerEvent::Message(Box::new(d.clone()));
    match d.conv_type {
        ConvType::C2c => {
            if let Some(to) = &d.to {
                let reached = state.bus.publish_json(&bus::user_topic(to), &frame).await;
                tracing::debug!("Publish c2c: conv={} to={} reached={}", d.conv_id, to, reached);
            }
            state
                .bus
                .publish_json(&bus::user_topic(&d.from), &frame)
                .await;
        }
        ConvType::Group => {
            if let Some(group_id) = &d.group_id {
                let reached = state
                    .bus
                    .publish_json(&bus::group_topic(group_id), &frame)
                    .await;
                tracing::debug!(
                    "Publish group: conv={} group={} reached={}",
                    d.conv_id,
                    group_id,
                    reached
                );
                publish_mentions(state, d, group_id).await;
            }
        }
    }
}

async fn publish_mentions(state: &AppState, d: &Deliver, group_id: &str) {
    let Some(mentions) = d.payload.get("mentions").and_then(|v| v.as_array()) else {
        return;
    };
    for value in mentions {
        let Some(user_id) = value.as_str().filter(|s| !s.is_empty()) else {
            continue;
        };
        let tip = ServerEvent::Mention {
            group_id: group_id.to_string(),
            conv_id: d.conv_id.clone(),
            from: d.from.clone(),
            seq: d.seq,
        };
        state.bus.publish_json(&bus::user_topic(user_id), &tip).await;
    }
}

/// Kick off membership expansion for a group send. The queue path keeps the
/// critical path O(1); without it the same batch discipline runs in a
/// spawned task.
pub async fn index_fanout(state: &AppState, group_id: &str, conv_id: &str, from: &str) {
    let update = GroupUpdate {
        group_id: group_id.to_string(),
        conv_id: conv_id.to_string(),
        from: from.to_string(),
        conv_type: ConvType::Group.as_str().to_string(),
        ts: now_ms(),
    };

    if state.config.group_fanout_queue {
        let reached = state.bus.publish_json(GROUP_UPDATE_TOPIC, &update).await;
        if reached == 0 {
            tracing::warn!("group_update queue has no consumer: group={}", group_id);
        }
    } else {
        let relations = state.relations.clone();
        let conversations = state.conversations.clone();
        let batch_size = state.config.group_batch_size;
        let sleep_ms = state.config.group_batch_sleep_ms;
        tokio::spawn(async move {
            expand_members(&relations, &conversations, update, batch_size, sleep_ms).await;
        });
    }
}

/// Upsert `user_conversations` for every group member, in bounded batches
/// with an inter-batch pause.
pub async fn expand_members(
    relations: &RelationStore,
    conversations: &ConversationStore,
    update: GroupUpdate,
    batch_size: usize,
    sleep_ms: u64,
) {
    let batch_size = if batch_size == 0 {
        pulse_shared::constants::DEFAULT_GROUP_BATCH_SIZE
    } else {
        batch_size
    };

    let ids = match relations.list_member_ids(&update.group_id).await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!("List members failed: group={} err={:?}", update.group_id, e);
            return;
        }
    };

    for chunk in ids.chunks(batch_size) {
        let now = now_ms();
        for user_id in chunk {
            if let Err(e) = conversations
                .upsert_user_conversation(
                    user_id,
                    &update.conv_id,
                    &update.conv_type,
                    Some(&update.from),
                    Some(&update.group_id),
                    now,
                )
                .await
            {
                tracing::warn!("Member conv upsert failed: user={} err={:?}", user_id, e);
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(sleep_ms)).await;
    }

    tracing::info!(
        "Group index fan-out done: group={} conv={} members={}",
        update.group_id,
        update.conv_id,
        ids.len()
    );
}

/// The async consumer side of the group_update queue.
pub fn spawn_group_update_consumer(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sub = state.bus.subscribe(GROUP_UPDATE_TOPIC).await;
        loop {
            match sub.recv().await {
                Ok(raw) => match serde_json::from_str::<GroupUpdate>(&raw) {
                    Ok(update) => {
                        expand_members(
                            &state.relations,
                            &state.conversations,
                            update,
                            state.config.group_batch_size,
                            state.config.group_batch_sleep_ms,
                        )
                        .await;
                    }
                    Err(e) => tracing::warn!("group_update decode error: {:?}", e),
                },
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("group_update consumer lagged, dropped {} events", n);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
