use std::sync::Arc;

use axum::http::{HeaderName, Method};
use pulse_server::config::Config;
use pulse_server::pipeline::{fanout, retention};
use pulse_server::{db, routes, AppState};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulse_server=info".into()),
        )
        .init();

    let config = Config::from_env();

    let pool = db::init_pool(&config.database_path)
        .await
        .expect("Failed to initialize database");

    let state = Arc::new(AppState::new(pool, config.clone()));

    // Background workers: expiry sweep, and the group_update consumer when
    // the queue path is on.
    retention::spawn_retention_sweeper(state.clone());
    if config.group_fanout_queue {
        fanout::spawn_group_update_consumer(state.clone());
    }

    let app = routes::build_router(state).layer(
        CorsLayer::new()
            .allow_origin(tower_http::cors::AllowOrigin::mirror_request())
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                HeaderName::from_static("content-type"),
                HeaderName::from_static("authorization"),
            ])
            .allow_credentials(true),
    );

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind");

    tracing::info!("Pulse server running on {}", addr);

    axum::serve(listener, app).await.expect("Server error");
}
