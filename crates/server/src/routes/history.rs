use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::AuthUser;
use crate::now_ms;
use crate::store::MessageLog;
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub from_seq: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /api/conversations/{conv_id}/messages
///
/// Incremental pull by seq cursor. Recalled and expired messages never show
/// up; the caller's delete watermark hides everything before it.
pub async fn list_history(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(conv_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<serde_json::Value>> {
    if !state.conversations.can_access(&user.id, &conv_id).await? {
        return Err(AppError::Forbidden);
    }

    let watermark = state.conversations.deleted_at(&user.id, &conv_id).await?;
    let items = state
        .log
        .list(
            &conv_id,
            query.from_seq.unwrap_or(0),
            query.limit.unwrap_or(pulse_shared::constants::HISTORY_PAGE_SIZE),
            watermark,
            now_ms(),
        )
        .await?;

    Ok(Json(serde_json::json!({ "items": items })))
}
