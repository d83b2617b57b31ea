//! Raw input validation and canonical message assembly.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use lagoon_common::SnowflakeGenerator;

use crate::error::ChatError;
use crate::models::message::{Message, MessageCode, MessageToken, MessageType, Source};
use crate::models::room::Room;
use crate::store::MessageStore;

/// One inbound client action. Constructed per frame, consumed by exactly one
/// `assemble` call, then discarded.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawUserInput {
    pub code: String,
    pub text: String,
    pub content_reference: String,
    pub reply_token: Option<MessageToken>,
    pub postback_value: String,
    pub extras: Map<String, Value>,
}

/// Turns raw user input into a stored canonical message: validates, selects
/// the message variant, resolves the reply reference, stamps provenance, and
/// persists through the message store.
pub struct MessageAssembler {
    messages: Arc<dyn MessageStore>,
    ids: Arc<SnowflakeGenerator>,
}

impl MessageAssembler {
    pub fn new(messages: Arc<dyn MessageStore>, ids: Arc<SnowflakeGenerator>) -> Self {
        Self { messages, ids }
    }

    /// Assemble one raw input. Callers with several inputs loop; there is no
    /// batch mode.
    pub async fn assemble(
        &self,
        input: RawUserInput,
        room: &Room,
        source: Source,
        client_handler_version: Option<i32>,
    ) -> Result<Message, ChatError> {
        let postback_parent_id = match input.reply_token {
            Some(token) => {
                let parent = self
                    .messages
                    .find_by_token(&token)
                    .await?
                    .ok_or_else(|| ChatError::Validation("unknown reply token".to_string()))?;
                Some(parent.id)
            }
            None => None,
        };

        let mut message = if input.code.is_empty() {
            // Direct user message: text or content reference, text winning when the
            // client sent both. The room type is bound as the handler name
            // for later routing.
            let mut message = if !input.text.is_empty() {
                let mut m = Message::new(self.ids.generate(), MessageType::Text, room.id, source);
                m.text = input.text;
                m
            } else if !input.content_reference.is_empty() {
                let mut m = Message::new(self.ids.generate(), MessageType::Image, room.id, source);
                m.content_reference = input.content_reference;
                m
            } else {
                return Err(ChatError::Validation(
                    "neither text nor content reference given".to_string(),
                ));
            };
            message.handler = Some(room.room_type.clone());
            message
        } else {
            // Postback/predefined message: the code plus whatever else the
            // client sent, extras carried verbatim.
            let mut message =
                Message::new(self.ids.generate(), MessageType::Postback, room.id, source);
            message.code = MessageCode::parse(&input.code);
            message.text = input.text;
            message.content_reference = input.content_reference;
            message.extras = input.extras;
            message
        };

        message.postback_parent_id = postback_parent_id;
        message.client_handler_version = client_handler_version;

        Ok(self.messages.insert(message).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Utc;

    fn room() -> Room {
        Room {
            id: 42,
            room_type: "chat".to_string(),
            active: true,
            created_at: Utc::now(),
        }
    }

    fn assembler() -> (MessageAssembler, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let assembler = MessageAssembler::new(store.clone(), Arc::new(SnowflakeGenerator::new(0)));
        (assembler, store)
    }

    #[tokio::test]
    async fn text_input_becomes_text_message() {
        let (assembler, _) = assembler();
        let input = RawUserInput {
            text: "hi".to_string(),
            ..Default::default()
        };

        let msg = assembler
            .assemble(input, &room(), Source::User { id: 7 }, Some(1))
            .await
            .unwrap();

        assert_eq!(msg.message_type, MessageType::Text);
        assert_eq!(msg.text, "hi");
        assert!(msg.target.is_none());
        assert_eq!(msg.handler.as_deref(), Some("chat"));
        assert_eq!(msg.client_handler_version, Some(1));
        assert!(msg.postback_parent_id.is_none());
        assert!(msg.extras.is_empty());
    }

    #[tokio::test]
    async fn content_reference_becomes_image_message() {
        let (assembler, _) = assembler();
        let input = RawUserInput {
            content_reference: "https://cdn.example/pic.jpg".to_string(),
            ..Default::default()
        };

        let msg = assembler
            .assemble(input, &room(), Source::User { id: 7 }, None)
            .await
            .unwrap();

        assert_eq!(msg.message_type, MessageType::Image);
        assert_eq!(msg.content_reference, "https://cdn.example/pic.jpg");
        assert!(msg.text.is_empty());
    }

    #[tokio::test]
    async fn text_wins_when_both_given() {
        let (assembler, _) = assembler();
        let input = RawUserInput {
            text: "caption".to_string(),
            content_reference: "https://cdn.example/pic.jpg".to_string(),
            ..Default::default()
        };

        let msg = assembler
            .assemble(input, &room(), Source::User { id: 7 }, None)
            .await
            .unwrap();
        assert_eq!(msg.message_type, MessageType::Text);
    }

    #[tokio::test]
    async fn empty_direct_input_is_rejected() {
        let (assembler, _) = assembler();
        let err = assembler
            .assemble(
                RawUserInput::default(),
                &room(),
                Source::User { id: 7 },
                None,
            )
            .await
            .unwrap_err();

        match err {
            ChatError::Validation(reason) => {
                assert_eq!(reason, "neither text nor content reference given")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn postback_carries_code_text_and_extras_verbatim() {
        let (assembler, _) = assembler();
        let mut extras = Map::new();
        extras.insert("choice".to_string(), Value::from("b"));
        let input = RawUserInput {
            code: "quiz$answer".to_string(),
            text: "B".to_string(),
            extras,
            ..Default::default()
        };

        let msg = assembler
            .assemble(input, &room(), Source::User { id: 7 }, Some(2))
            .await
            .unwrap();

        assert_eq!(msg.message_type, MessageType::Postback);
        assert_eq!(msg.code, MessageCode::parse("quiz$answer"));
        assert_eq!(msg.text, "B");
        assert_eq!(msg.extras["choice"], "b");
        // No text/content exclusivity applies on this branch.
        assert!(msg.handler.is_none());
    }

    #[tokio::test]
    async fn postback_with_no_text_or_content_is_accepted() {
        let (assembler, _) = assembler();
        let input = RawUserInput {
            code: "quiz$skip".to_string(),
            ..Default::default()
        };
        assert!(assembler
            .assemble(input, &room(), Source::User { id: 7 }, None)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn unknown_reply_token_is_rejected() {
        let (assembler, _) = assembler();
        let input = RawUserInput {
            text: "re: nothing".to_string(),
            reply_token: Some(MessageToken::new()),
            ..Default::default()
        };

        let err = assembler
            .assemble(input, &room(), Source::User { id: 7 }, None)
            .await
            .unwrap_err();
        match err {
            ChatError::Validation(reason) => assert_eq!(reason, "unknown reply token"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn reply_token_resolves_to_parent_id() {
        let (assembler, _) = assembler();
        let parent = assembler
            .assemble(
                RawUserInput {
                    text: "original".to_string(),
                    ..Default::default()
                },
                &room(),
                Source::User { id: 7 },
                None,
            )
            .await
            .unwrap();

        let reply = assembler
            .assemble(
                RawUserInput {
                    text: "reply".to_string(),
                    reply_token: Some(parent.token),
                    ..Default::default()
                },
                &room(),
                Source::User { id: 9 },
                None,
            )
            .await
            .unwrap();

        assert_eq!(reply.postback_parent_id, Some(parent.id));
    }

    #[tokio::test]
    async fn repeated_input_yields_distinct_messages_and_tokens() {
        let (assembler, _) = assembler();
        let make = || RawUserInput {
            text: "same words".to_string(),
            ..Default::default()
        };

        let first = assembler
            .assemble(make(), &room(), Source::User { id: 7 }, None)
            .await
            .unwrap();
        let second = assembler
            .assemble(make(), &room(), Source::User { id: 7 }, None)
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
        assert_ne!(first.token, second.token);
    }

    #[tokio::test]
    async fn assembled_message_is_persisted() {
        let (assembler, store) = assembler();
        let msg = assembler
            .assemble(
                RawUserInput {
                    text: "hi".to_string(),
                    ..Default::default()
                },
                &room(),
                Source::User { id: 7 },
                None,
            )
            .await
            .unwrap();

        let found = store.find_by_token(&msg.token).await.unwrap().unwrap();
        assert_eq!(found.id, msg.id);
    }
}
