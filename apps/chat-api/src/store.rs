//! External collaborator interfaces: message persistence, room lookup, and
//! identity resolution.
//!
//! Backed by real persistence in production and in-memory maps in tests and
//! Phase-1 deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;

use crate::models::message::{Message, MessageToken};
use crate::models::room::Room;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn find_by_token(&self, token: &MessageToken) -> Result<Option<Message>, StoreError>;
    async fn insert(&self, message: Message) -> Result<Message, StoreError>;
}

#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn find(&self, room_id: i64) -> Result<Option<Room>, StoreError>;
    async fn role_of(&self, room_id: i64, user_id: i64) -> Result<Option<String>, StoreError>;
}

#[async_trait]
pub trait Identity: Send + Sync {
    async fn current_user(&self, token: &str) -> Result<Option<i64>, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

pub struct MemoryStore {
    rooms: RwLock<HashMap<i64, Room>>,
    messages: RwLock<HashMap<i64, Message>>,
    by_token: RwLock<HashMap<MessageToken, i64>>,
    roles: RwLock<HashMap<(i64, i64), String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            messages: RwLock::new(HashMap::new()),
            by_token: RwLock::new(HashMap::new()),
            roles: RwLock::new(HashMap::new()),
        }
    }

    pub fn add_room(&self, room: Room) {
        self.rooms.write().insert(room.id, room);
    }

    pub fn set_role(&self, room_id: i64, user_id: i64, role: &str) {
        self.roles
            .write()
            .insert((room_id, user_id), role.to_string());
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn find_by_token(&self, token: &MessageToken) -> Result<Option<Message>, StoreError> {
        let id = match self.by_token.read().get(token) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.messages.read().get(&id).cloned())
    }

    async fn insert(&self, message: Message) -> Result<Message, StoreError> {
        self.by_token.write().insert(message.token, message.id);
        self.messages.write().insert(message.id, message.clone());
        Ok(message)
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn find(&self, room_id: i64) -> Result<Option<Room>, StoreError> {
        Ok(self.rooms.read().get(&room_id).cloned())
    }

    async fn role_of(&self, room_id: i64, user_id: i64) -> Result<Option<String>, StoreError> {
        Ok(self.roles.read().get(&(room_id, user_id)).cloned())
    }
}

pub struct MemoryIdentity {
    tokens: RwLock<HashMap<String, i64>>,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
        }
    }

    pub fn grant(&self, token: &str, user_id: i64) {
        self.tokens.write().insert(token.to_string(), user_id);
    }
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Identity for MemoryIdentity {
    async fn current_user(&self, token: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.tokens.read().get(token).copied())
    }
}
