//! Shared test harness: an ephemeral-port chat server over in-memory stores.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;

use lagoon_common::SnowflakeGenerator;

use chat_api::config::Config;
use chat_api::gateway::delivery::DeliveryChannel;
use chat_api::gateway::hub::GroupHub;
use chat_api::handlers::builtin::{ConciergeHandler, CONCIERGE};
use chat_api::handlers::dispatch::ExecutionGuard;
use chat_api::handlers::HandlerRegistry;
use chat_api::models::room::Room;
use chat_api::store::{MemoryIdentity, MemoryStore};
use chat_api::AppState;

pub struct TestEnv {
    pub addr: SocketAddr,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub identity: Arc<MemoryIdentity>,
}

impl TestEnv {
    pub fn seed_room(&self, room_id: i64, room_type: &str, active: bool) {
        self.store.add_room(Room {
            id: room_id,
            room_type: room_type.to_string(),
            active,
            created_at: Utc::now(),
        });
    }
}

/// Start a real TCP server for websocket testing. Runs in the background.
pub async fn start_server() -> TestEnv {
    let store = Arc::new(MemoryStore::new());
    let identity = Arc::new(MemoryIdentity::new());

    let mut handlers = HandlerRegistry::new();
    handlers
        .register(CONCIERGE, 1, Arc::new(ConciergeHandler))
        .expect("handler registration");

    let hub = Arc::new(GroupHub::new());
    let delivery = Arc::new(DeliveryChannel::new(hub.clone()));

    let state = AppState {
        config: Arc::new(Config {
            port: 0,
            member_buffer: 64,
            worker_id: 0,
        }),
        rooms: store.clone(),
        messages: store.clone(),
        identity: identity.clone(),
        handlers: Arc::new(handlers),
        guard: Arc::new(ExecutionGuard::new()),
        hub,
        delivery,
        snowflake: Arc::new(SnowflakeGenerator::new(0)),
    };

    let app = chat_api::gateway::server::router().with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestEnv {
        addr,
        state,
        store,
        identity,
    }
}
