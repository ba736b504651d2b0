use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::AuthUser;
use crate::now_ms;
use crate::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

/// GET /api/conversations — the user's conversation list with unread counts.
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>> {
    let items = state
        .conversations
        .list_with_unread(
            &user.id,
            query.limit.unwrap_or(pulse_shared::constants::CONVERSATION_PAGE_SIZE),
            &state.seq_cache,
            &state.receipts,
        )
        .await?;
    Ok(Json(serde_json::json!({ "items": items })))
}

/// POST /api/conversations/read_all — mark every conversation read up to its
/// current last_seq, in chunked transactions.
pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<serde_json::Value>> {
    let pairs = state.conversations.conv_last_seqs(&user.id).await?;
    let conv_ids: Vec<String> = pairs.iter().map(|(id, _)| id.clone()).collect();
    let last_seqs: HashMap<String, i64> = pairs.into_iter().collect();
    let count = conv_ids.len();

    state
        .receipts
        .mark_all_read_in_chunks(
            &user.id,
            conv_ids,
            last_seqs,
            state.config.mark_all_read_chunk_size,
            state.config.mark_all_read_concurrency,
            state.config.mark_all_read_retry,
            Arc::clone(&state.seq_cache),
        )
        .await?;

    Ok(Json(serde_json::json!({ "ok": true, "conversations": count })))
}

#[derive(Deserialize)]
pub struct PinnedBody {
    pub pinned: bool,
}

pub async fn set_pinned(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(conv_id): Path<String>,
    Json(body): Json<PinnedBody>,
) -> Result<Json<serde_json::Value>> {
    state
        .conversations
        .set_pinned(&user.id, &conv_id, body.pinned, now_ms())
        .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct MutedBody {
    pub muted: bool,
}

pub async fn set_muted(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(conv_id): Path<String>,
    Json(body): Json<MutedBody>,
) -> Result<Json<serde_json::Value>> {
    state
        .conversations
        .set_muted(&user.id, &conv_id, body.muted, now_ms())
        .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct DraftBody {
    pub draft: String,
}

pub async fn set_draft(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(conv_id): Path<String>,
    Json(body): Json<DraftBody>,
) -> Result<Json<serde_json::Value>> {
    pulse_shared::validation::validate_draft(&body.draft).map_err(AppError::BadRequest)?;
    state
        .conversations
        .set_draft(&user.id, &conv_id, &body.draft, now_ms())
        .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// DELETE /api/conversations/{conv_id} — set the caller's delete watermark;
/// history before it disappears from their view only.
pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(conv_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state
        .conversations
        .set_deleted(&user.id, &conv_id, now_ms())
        .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
