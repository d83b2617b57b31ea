//! Built-in handlers registered at boot.

use async_trait::async_trait;

use crate::error::ChatError;
use crate::models::message::{Message, MessageType, Source, Target};

use super::{HandlerContext, MessageHandler};

/// Name the concierge handler registers under.
pub const CONCIERGE: &str = "concierge";

/// Answers `concierge$hello` with a greeting visible only to the sender on
/// their own protocol version.
pub struct ConciergeHandler;

#[async_trait]
impl MessageHandler for ConciergeHandler {
    async fn handle(
        &self,
        message: &Message,
        ctx: &HandlerContext,
    ) -> Result<Vec<Message>, ChatError> {
        match message.action_code() {
            Some("hello") => Ok(vec![greeting(message, ctx)]),
            Some(other) => Err(ChatError::InvalidActionCode(format!("{CONCIERGE}${other}"))),
            None => Ok(Vec::new()),
        }
    }
}

fn greeting(message: &Message, ctx: &HandlerContext) -> Message {
    let mut reply = Message::new(
        ctx.ids.generate(),
        MessageType::Text,
        ctx.room.id,
        Source::Bot {
            key: CONCIERGE.to_string(),
        },
    );
    reply.text = "Hi! A teammate will be with you shortly.".to_string();
    reply.target = Some(Target {
        user_id: ctx.user_id,
        handler_version: Some(ctx.handler_version),
    });
    reply.handler = Some(ctx.room.room_type.clone());
    reply.postback_parent_id = Some(message.id);
    reply.client_handler_version = Some(ctx.handler_version);
    reply
}
