//! Group address resolution.
//!
//! Three addressing granularities exist per session:
//! - `room-{room_id}` — every client in the room
//! - `room-{room_id}-user-{user_id}` — one user, any protocol version
//! - `room-{room_id}-user-{user_id}-handler-{version}` — one user on one
//!   protocol version
//!
//! A connecting session joins all three so a message can be addressed at any
//! granularity. This module is the only place group names are built.

use std::fmt;

use crate::models::message::{Message, Target};

/// A named broadcast scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupId(String);

impl GroupId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The room-wide broadcast group.
pub fn room_group(room_id: i64) -> GroupId {
    GroupId(format!("room-{room_id}"))
}

/// The group reaching one user across all of their room sessions.
pub fn user_group(room_id: i64, user_id: i64) -> GroupId {
    GroupId(format!("room-{room_id}-user-{user_id}"))
}

/// The group reaching one user on one protocol version only.
pub fn user_handler_group(room_id: i64, user_id: i64, handler_version: i32) -> GroupId {
    GroupId(format!(
        "room-{room_id}-user-{user_id}-handler-{handler_version}"
    ))
}

/// The groups a session joins on connect, most general first.
pub fn groups_for_session(room_id: i64, user_id: i64, handler_version: i32) -> [GroupId; 3] {
    [
        room_group(room_id),
        user_group(room_id, user_id),
        user_handler_group(room_id, user_id, handler_version),
    ]
}

/// The single most specific group an outbound message targets. Total: every
/// combination of absent/present target fields has a defined output.
pub fn target_group(message: &Message) -> GroupId {
    match message.target {
        None => room_group(message.room_id),
        Some(Target {
            user_id,
            handler_version: None,
        }) => user_group(message.room_id, user_id),
        Some(Target {
            user_id,
            handler_version: Some(version),
        }) => user_handler_group(message.room_id, user_id, version),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::{MessageType, Source};

    #[test]
    fn session_groups_are_ordered_and_distinct() {
        let groups = groups_for_session(42, 7, 3);
        assert_eq!(groups[0].as_str(), "room-42");
        assert_eq!(groups[1].as_str(), "room-42-user-7");
        assert_eq!(groups[2].as_str(), "room-42-user-7-handler-3");
        assert_ne!(groups[0], groups[1]);
        assert_ne!(groups[1], groups[2]);
    }

    #[test]
    fn session_groups_are_deterministic() {
        assert_eq!(groups_for_session(1, 2, 3), groups_for_session(1, 2, 3));
    }

    #[test]
    fn untargeted_message_goes_to_room() {
        let msg = Message::new(1, MessageType::Text, 42, Source::User { id: 7 });
        assert_eq!(target_group(&msg).as_str(), "room-42");
    }

    #[test]
    fn targeted_message_goes_to_user_group() {
        let mut msg = Message::new(1, MessageType::Text, 42, Source::User { id: 7 });
        msg.target = Some(Target {
            user_id: 9,
            handler_version: None,
        });
        assert_eq!(target_group(&msg).as_str(), "room-42-user-9");
    }

    #[test]
    fn version_restricted_message_goes_to_handler_group() {
        let mut msg = Message::new(1, MessageType::Text, 42, Source::User { id: 7 });
        msg.target = Some(Target {
            user_id: 9,
            handler_version: Some(2),
        });
        assert_eq!(target_group(&msg).as_str(), "room-42-user-9-handler-2");
    }
}
