//! Wire-format frames exchanged with chat clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assembler::RawUserInput;

/// Presence/typing status carried both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub active: bool,
    pub typing: bool,
}

/// Server → client frames. The `type` field selects the shape on the wire.
/// Connection close has no body and travels as a websocket close frame.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    Messages { messages: Vec<Value> },
    RoomStates { room_states: Value },
    Toast { text: String },
    StatusUpdate { status: Status },
    Error { error: String },
    Ping { identifier: String },
    Pong { identifier: String },
}

/// Client → server frames: a message envelope carrying raw user input, or a
/// status update.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum InboundFrame {
    Message { message: RawUserInput },
    Status(Status),
}
