//! Per-connection frame sender: the delivery-layer façade a session (and the
//! business logic acting on its behalf) uses to reach clients.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ChatError;
use crate::models::message::Message;
use crate::store::RoomStore;

use super::delivery::{DeliveryChannel, SendMode};
use super::frames::{OutboundFrame, Status};
use super::groups;
use super::hub::{MemberSender, OutboundPayload};

/// Bound to one room and one session's reply channel.
pub struct ChatSender {
    delivery: Arc<DeliveryChannel>,
    rooms: Arc<dyn RoomStore>,
    room_id: i64,
    session_id: String,
    reply_tx: MemberSender,
}

impl ChatSender {
    pub fn new(
        delivery: Arc<DeliveryChannel>,
        rooms: Arc<dyn RoomStore>,
        room_id: i64,
        session_id: String,
        reply_tx: MemberSender,
    ) -> Self {
        Self {
            delivery,
            rooms,
            room_id,
            session_id,
            reply_tx,
        }
    }

    fn payload(frame: &OutboundFrame) -> OutboundPayload {
        OutboundPayload::Frame(Arc::from(serde_json::to_string(frame).unwrap()))
    }

    /// Serialize messages for the wire, decorating each user source with its
    /// role in this room.
    async fn message_views(&self, messages: &[&Message]) -> Result<Vec<Value>, ChatError> {
        let mut roles: HashMap<i64, String> = HashMap::new();
        let mut views = Vec::with_capacity(messages.len());
        for msg in messages {
            let mut view = serde_json::to_value(msg).unwrap();
            if let Some(user_id) = msg.source.user_id() {
                let role = match roles.get(&user_id) {
                    Some(role) => role.clone(),
                    None => {
                        let role = self
                            .rooms
                            .role_of(self.room_id, user_id)
                            .await?
                            .unwrap_or_else(|| "none".to_string());
                        roles.insert(user_id, role.clone());
                        role
                    }
                };
                if let Some(source) = view.get_mut("source").and_then(Value::as_object_mut) {
                    source.insert("role".to_string(), Value::String(role));
                }
            }
            views.push(view);
        }
        Ok(views)
    }

    /// Deliver stored messages: untargeted ones as one batch to the room
    /// group, targeted ones each to their own most-specific group.
    pub async fn deliver_messages(
        &self,
        messages: &[Message],
        mode: SendMode,
    ) -> Result<(), ChatError> {
        let broadcast: Vec<&Message> = messages.iter().filter(|m| m.is_broadcast()).collect();
        let targeted: Vec<&Message> = messages.iter().filter(|m| !m.is_broadcast()).collect();

        if !broadcast.is_empty() {
            let frame = OutboundFrame::Messages {
                messages: self.message_views(&broadcast).await?,
            };
            self.delivery
                .send(&groups::room_group(self.room_id), Self::payload(&frame), mode)
                .await?;
        }
        for msg in targeted {
            let frame = OutboundFrame::Messages {
                messages: self.message_views(&[msg]).await?,
            };
            self.delivery
                .send(&groups::target_group(msg), Self::payload(&frame), mode)
                .await?;
        }
        Ok(())
    }

    pub async fn deliver_message(&self, message: &Message, mode: SendMode) -> Result<(), ChatError> {
        self.deliver_messages(std::slice::from_ref(message), mode)
            .await
    }

    /// Session-scoped backlog delivery, straight to this connection only.
    pub async fn fetch_to_reply(&self, messages: &[Message]) -> Result<(), ChatError> {
        let refs: Vec<&Message> = messages.iter().collect();
        let frame = OutboundFrame::Messages {
            messages: self.message_views(&refs).await?,
        };
        self.send_reply(&frame, SendMode::BestEffort).await
    }

    pub async fn send_room_states(
        &self,
        room_states: Value,
        target_user: Option<i64>,
        mode: SendMode,
    ) -> Result<(), ChatError> {
        let frame = OutboundFrame::RoomStates { room_states };
        let group = match target_user {
            Some(user_id) => groups::user_group(self.room_id, user_id),
            None => groups::room_group(self.room_id),
        };
        self.delivery
            .send(&group, Self::payload(&frame), mode)
            .await?;
        Ok(())
    }

    pub async fn send_toast(&self, text: &str) -> Result<(), ChatError> {
        let frame = OutboundFrame::Toast {
            text: text.to_string(),
        };
        self.send_reply(&frame, SendMode::BestEffort).await
    }

    pub async fn send_status_update(&self, status: Status, mode: SendMode) -> Result<(), ChatError> {
        let frame = OutboundFrame::StatusUpdate { status };
        self.delivery
            .send(&groups::room_group(self.room_id), Self::payload(&frame), mode)
            .await?;
        Ok(())
    }

    /// Developer-console error, visible to this session only.
    pub async fn send_error(&self, text: &str) -> Result<(), ChatError> {
        let frame = OutboundFrame::Error {
            error: text.to_string(),
        };
        self.send_reply(&frame, SendMode::BestEffort).await
    }

    pub async fn send_ping(&self, identifier: &str, mode: SendMode) -> Result<(), ChatError> {
        let frame = OutboundFrame::Ping {
            identifier: identifier.to_string(),
        };
        self.send_reply(&frame, mode).await
    }

    pub async fn send_pong(&self, identifier: &str, mode: SendMode) -> Result<(), ChatError> {
        let frame = OutboundFrame::Pong {
            identifier: identifier.to_string(),
        };
        self.send_reply(&frame, mode).await
    }

    /// Tell this session's socket loop to close the connection.
    pub async fn send_close(&self) -> Result<(), ChatError> {
        self.delivery
            .send_direct(
                &self.session_id,
                &self.reply_tx,
                OutboundPayload::Close,
                SendMode::BestEffort,
            )
            .await?;
        Ok(())
    }

    async fn send_reply(&self, frame: &OutboundFrame, mode: SendMode) -> Result<(), ChatError> {
        self.delivery
            .send_direct(&self.session_id, &self.reply_tx, Self::payload(frame), mode)
            .await?;
        Ok(())
    }
}
