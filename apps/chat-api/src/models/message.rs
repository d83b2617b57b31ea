//! The canonical stored-message record and its wire representation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Message kinds a room can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Image,
    Template,
    Audio,
    Video,
    Postback,
    InstantCommand,
    LottieEmoji,
}

/// Globally unique reply-reference key. Assigned once at assembly and never
/// derived from message content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageToken(Uuid);

impl MessageToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for MessageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Parsed action code. The wire form is `"<handler>$<action>"`; anything that
/// doesn't split cleanly is kept verbatim as `Unrecognized` so dispatch can
/// report it instead of every call site re-splitting the string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageCode {
    Empty,
    Action { handler: String, action: String },
    Unrecognized(String),
}

impl MessageCode {
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::Empty;
        }
        match raw.split_once('$') {
            Some((handler, action)) if !handler.is_empty() && !action.is_empty() => Self::Action {
                handler: handler.to_string(),
                action: action.to_string(),
            },
            _ => Self::Unrecognized(raw.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Action { handler, action } => write!(f, "{handler}${action}"),
            Self::Unrecognized(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for MessageCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Who produced a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Source {
    User { id: i64 },
    Bot { key: String },
}

impl Source {
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Self::User { id } => Some(*id),
            Self::Bot { .. } => None,
        }
    }
}

/// Delivery target for a non-broadcast message. A version restriction can
/// only exist together with a target user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Target {
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler_version: Option<i32>,
}

/// Canonical stored message. Wire serialization is skip-on-absent: optional
/// fields and blank strings are omitted rather than sent as null/"".
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: i64,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub room_id: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "MessageCode::is_empty")]
    pub code: MessageCode,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub content_reference: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub caption: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uri: String,
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    pub token: MessageToken,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postback_parent_id: Option<i64>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extras: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_handler_version: Option<i32>,
    pub is_hidden: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Blank record with required provenance; everything optional starts
    /// absent and gets filled in by the assembler or a handler.
    pub fn new(id: i64, message_type: MessageType, room_id: i64, source: Source) -> Self {
        Self {
            id,
            message_type,
            room_id,
            text: String::new(),
            code: MessageCode::Empty,
            content_reference: String::new(),
            caption: String::new(),
            uri: String::new(),
            source,
            target: None,
            handler: None,
            token: MessageToken::new(),
            postback_parent_id: None,
            extras: Map::new(),
            client_handler_version: None,
            is_hidden: false,
            created_at: Utc::now(),
        }
    }

    /// Handler this message routes to: the code's handler for action
    /// messages, otherwise the room-type binding stamped at assembly.
    pub fn handler_name(&self) -> Option<&str> {
        match &self.code {
            MessageCode::Action { handler, .. } => Some(handler),
            _ => self.handler.as_deref(),
        }
    }

    pub fn action_code(&self) -> Option<&str> {
        match &self.code {
            MessageCode::Action { action, .. } => Some(action),
            _ => None,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.target.is_none()
    }
}
