pub mod assembler;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod store;

use std::sync::Arc;

use lagoon_common::SnowflakeGenerator;

use config::Config;
use gateway::delivery::DeliveryChannel;
use gateway::hub::GroupHub;
use handlers::dispatch::ExecutionGuard;
use handlers::HandlerRegistry;
use store::{Identity, MessageStore, RoomStore};

/// Shared application state available to every gateway session.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rooms: Arc<dyn RoomStore>,
    pub messages: Arc<dyn MessageStore>,
    pub identity: Arc<dyn Identity>,
    pub handlers: Arc<HandlerRegistry>,
    pub guard: Arc<ExecutionGuard>,
    pub hub: Arc<GroupHub>,
    pub delivery: Arc<DeliveryChannel>,
    pub snowflake: Arc<SnowflakeGenerator>,
}
