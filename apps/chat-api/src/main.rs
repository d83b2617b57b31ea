use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lagoon_common::SnowflakeGenerator;

use chat_api::config::Config;
use chat_api::gateway::delivery::DeliveryChannel;
use chat_api::gateway::hub::GroupHub;
use chat_api::handlers::builtin::{ConciergeHandler, CONCIERGE};
use chat_api::handlers::dispatch::ExecutionGuard;
use chat_api::handlers::HandlerRegistry;
use chat_api::store::{MemoryIdentity, MemoryStore};
use chat_api::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing — env vars may be set externally)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;
    let worker_id = config.worker_id;

    // Handler registration happens once, before any lookups. A duplicate
    // registration is a misconfiguration and aborts boot.
    let mut handlers = HandlerRegistry::new();
    handlers
        .register(CONCIERGE, 1, Arc::new(ConciergeHandler))
        .expect("handler registration");

    // In-memory stores for Phase 1. Swap for DB-backed implementations when
    // real persistence lands.
    let store = Arc::new(MemoryStore::new());
    let identity = Arc::new(MemoryIdentity::new());

    let hub = Arc::new(GroupHub::new());
    let delivery = Arc::new(DeliveryChannel::new(hub.clone()));

    tracing::info!(handlers = handlers.len(), "chat-api configured");

    let state = AppState {
        config: Arc::new(config),
        rooms: store.clone(),
        messages: store,
        identity,
        handlers: Arc::new(handlers),
        guard: Arc::new(ExecutionGuard::new()),
        hub,
        delivery,
        snowflake: Arc::new(SnowflakeGenerator::new(worker_id)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(chat_api::gateway::server::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "chat-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
