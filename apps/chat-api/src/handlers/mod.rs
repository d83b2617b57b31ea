//! Versioned registry of pluggable message handlers.

pub mod builtin;
pub mod dispatch;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use lagoon_common::SnowflakeGenerator;

use crate::error::ChatError;
use crate::models::message::Message;
use crate::models::room::Room;
use crate::store::MessageStore;

/// Registry lookup key: a handler name plus its protocol version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    pub name: String,
    pub version: i32,
}

/// What a handler gets alongside the message it processes.
pub struct HandlerContext {
    pub room: Room,
    pub user_id: i64,
    pub handler_version: i32,
    pub messages: Arc<dyn MessageStore>,
    pub ids: Arc<SnowflakeGenerator>,
}

/// A pluggable unit of chat business logic. Consumes one message and may
/// produce follow-up messages for delivery.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(
        &self,
        message: &Message,
        ctx: &HandlerContext,
    ) -> Result<Vec<Message>, ChatError>;
}

/// Process-wide handler table. Populated once at boot — registration takes
/// `&mut self` and the registry then moves into an `Arc`, so the
/// write-once-then-read-many discipline holds by construction.
pub struct HandlerRegistry {
    entries: HashMap<HandlerKey, Arc<dyn MessageHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a handler under `(name, version)`. Duplicate registration is
    /// a configuration error and must abort boot.
    pub fn register(
        &mut self,
        name: &str,
        version: i32,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), ChatError> {
        let key = HandlerKey {
            name: name.to_string(),
            version,
        };
        if self.entries.contains_key(&key) {
            return Err(ChatError::DuplicateHandler {
                name: key.name,
                version,
            });
        }
        self.entries.insert(key, handler);
        Ok(())
    }

    /// Look up a handler. Absence is a normal outcome, not an error.
    pub fn lookup(&self, name: &str, version: i32) -> Option<Arc<dyn MessageHandler>> {
        self.entries
            .get(&HandlerKey {
                name: name.to_string(),
                version,
            })
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
