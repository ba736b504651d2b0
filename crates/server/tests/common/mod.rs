#![allow(dead_code)]

pub mod ws_helpers;

use axum::Router;
use pulse_server::{config::Config, db, routes, AppState};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::sync::Arc;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Create an in-memory SQLite pool with schema applied.
pub async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .unwrap();

    db::apply_schema(&pool).await.unwrap();

    pool
}

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        database_path: ":memory:".into(),
        send_qps: 100,
        send_burst: 200,
        group_fanout_queue: true,
        group_batch_size: 500,
        group_batch_sleep_ms: 5,
        mark_all_read_chunk_size: 2,
        mark_all_read_concurrency: 2,
        mark_all_read_retry: 1,
        write_deadline_secs: 5,
        stream_ttl_secs: 60,
        retention_sweep_secs: 1,
    }
}

/// Build a test Axum app with the given pool.
pub fn create_test_app(pool: SqlitePool) -> Router {
    let state = Arc::new(AppState::new(pool, test_config()));
    routes::build_router(state)
}

/// Create a test user directly in the database. Returns (user_id, session_token).
pub async fn create_test_user(pool: &SqlitePool, username: &str) -> (String, String) {
    let user_id = uuid::Uuid::new_v4().to_string();
    let now = now_ms();

    sqlx::query("INSERT INTO users (id, username, created_at) VALUES (?, ?, ?)")
        .bind(&user_id)
        .bind(username)
        .bind(now)
        .execute(pool)
        .await
        .unwrap();

    let token = uuid::Uuid::new_v4().to_string();
    let expires_at = now + 30 * 24 * 3600 * 1000;
    sqlx::query(
        "INSERT INTO sessions (id, user_id, token, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&user_id)
    .bind(&token)
    .bind(expires_at)
    .bind(now)
    .execute(pool)
    .await
    .unwrap();

    (user_id, token)
}

pub async fn make_friends(pool: &SqlitePool, a: &str, b: &str) {
    sqlx::query("INSERT INTO friends (user_id, friend_id, created_at) VALUES (?, ?, ?)")
        .bind(a)
        .bind(b)
        .bind(now_ms())
        .execute(pool)
        .await
        .unwrap();
}

/// Create a group owned by the first member; all listed users become members.
pub async fn create_test_group(pool: &SqlitePool, owner: &str, members: &[&str]) -> String {
    let group_id = uuid::Uuid::new_v4().to_string();
    let now = now_ms();

    sqlx::query("INSERT INTO groups (id, name, owner_id, created_at) VALUES (?, 'Test', ?, ?)")
        .bind(&group_id)
        .bind(owner)
        .bind(now)
        .execute(pool)
        .await
        .unwrap();

    sqlx::query(
        "INSERT INTO group_members (group_id, user_id, role, created_at) VALUES (?, ?, 'owner', ?)",
    )
    .bind(&group_id)
    .bind(owner)
    .bind(now)
    .execute(pool)
    .await
    .unwrap();

    for member in members {
        if *member == owner {
            continue;
        }
        sqlx::query(
            "INSERT INTO group_members (group_id, user_id, role, created_at) VALUES (?, ?, 'member', ?)",
        )
        .bind(&group_id)
        .bind(member)
        .bind(now)
        .execute(pool)
        .await
        .unwrap();
    }

    group_id
}

pub async fn set_member_muted(pool: &SqlitePool, group_id: &str, user_id: &str, muted: bool) {
    sqlx::query("UPDATE group_members SET muted = ? WHERE group_id = ? AND user_id = ?")
        .bind(muted)
        .bind(group_id)
        .bind(user_id)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn set_group_mute_all(pool: &SqlitePool, group_id: &str, mute_all: bool) {
    sqlx::query("UPDATE groups SET mute_all = ? WHERE id = ?")
        .bind(mute_all)
        .bind(group_id)
        .execute(pool)
        .await
        .unwrap();
}

/// Seed one message row plus the conversation counter, bypassing the
/// gateway. For HTTP-surface tests.
pub async fn insert_message(
    pool: &SqlitePool,
    conv_id: &str,
    from: &str,
    to: &str,
    seq: i64,
    text: &str,
) -> String {
    insert_message_full(pool, conv_id, from, to, seq, text, false, None).await
}

pub async fn insert_message_full(
    pool: &SqlitePool,
    conv_id: &str,
    from: &str,
    to: &str,
    seq: i64,
    text: &str,
    recalled: bool,
    expire_at: Option<i64>,
) -> String {
    let server_msg_id = uuid::Uuid::new_v4().to_string();
    let now = now_ms();

    sqlx::query(
        r#"INSERT INTO messages (server_msg_id, client_msg_id, conv_id, conv_type, from_user_id,
               to_user_id, seq, timestamp, type, payload, recalled, expire_at)
           VALUES (?, ?, ?, 'c2c', ?, ?, ?, ?, 'text', ?, ?, ?)"#,
    )
    .bind(&server_msg_id)
    .bind(format!("cm-{seq}"))
    .bind(conv_id)
    .bind(from)
    .bind(to)
    .bind(seq)
    .bind(now)
    .bind(serde_json::json!({ "text": text }).to_string())
    .bind(recalled)
    .bind(expire_at)
    .execute(pool)
    .await
    .unwrap();

    sqlx::query(
        r#"INSERT INTO conversations (id, conv_type, peer_id, last_seq, updated_at)
           VALUES (?, 'c2c', ?, ?, ?)
           ON CONFLICT(id) DO UPDATE SET last_seq = MAX(last_seq, excluded.last_seq)"#,
    )
    .bind(conv_id)
    .bind(to)
    .bind(seq)
    .bind(now)
    .execute(pool)
    .await
    .unwrap();

    server_msg_id
}

pub async fn insert_user_conversation(pool: &SqlitePool, user_id: &str, conv_id: &str, peer: &str) {
    sqlx::query(
        r#"INSERT INTO user_conversations (user_id, conv_id, conv_type, peer_id, updated_at)
           VALUES (?, ?, 'c2c', ?, ?)
           ON CONFLICT(user_id, conv_id) DO UPDATE SET updated_at = excluded.updated_at"#,
    )
    .bind(user_id)
    .bind(conv_id)
    .bind(peer)
    .bind(now_ms())
    .execute(pool)
    .await
    .unwrap();
}

pub async fn count_messages(pool: &SqlitePool, conv_id: &str) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE conv_id = ?")
        .bind(conv_id)
        .fetch_one(pool)
        .await
        .unwrap()
}
