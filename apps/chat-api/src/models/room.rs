use chrono::{DateTime, Utc};

/// A chat room. `room_type` names the handler family direct messages are
/// routed to; `active` gates whether live sessions may attach.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: i64,
    pub room_type: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}
