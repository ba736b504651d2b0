mod conversations;
mod history;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

use crate::ws;
use crate::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/gateway", get(ws::handler::ws_handler))
        .route("/api/conversations", get(conversations::list_conversations))
        .route(
            "/api/conversations/read_all",
            post(conversations::mark_all_read),
        )
        .route(
            "/api/conversations/{conv_id}/pinned",
            put(conversations::set_pinned),
        )
        .route(
            "/api/conversations/{conv_id}/muted",
            put(conversations::set_muted),
        )
        .route(
            "/api/conversations/{conv_id}/draft",
            put(conversations::set_draft),
        )
        .route(
            "/api/conversations/{conv_id}",
            delete(conversations::delete_conversation),
        )
        .route(
            "/api/conversations/{conv_id}/messages",
            get(history::list_history),
        )
        .with_state(state)
}
