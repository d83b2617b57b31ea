//! Action-code dispatch with double-execution protection.

use dashmap::DashSet;

use crate::error::ChatError;
use crate::models::message::{Message, MessageCode, MessageToken};

use super::{HandlerContext, HandlerRegistry};

/// Tracks message tokens whose action already ran, so a redelivered or
/// replayed message never executes its handler twice.
pub struct ExecutionGuard {
    seen: DashSet<MessageToken>,
}

impl ExecutionGuard {
    pub fn new() -> Self {
        Self {
            seen: DashSet::new(),
        }
    }

    /// Claims the token. Returns false if it was already claimed.
    fn begin(&self, token: MessageToken) -> bool {
        self.seen.insert(token)
    }
}

impl Default for ExecutionGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the handler bound to `message`'s action code and persist what it
/// produces.
///
/// Messages without a code do no handler work. A repeat dispatch of the same
/// token is a no-op success from the client's perspective. Unrecognized codes
/// and missing registrations fail with `InvalidActionCode`; the caller shows
/// the user a generic message and logs the detail.
pub async fn dispatch(
    registry: &HandlerRegistry,
    guard: &ExecutionGuard,
    message: &Message,
    ctx: &HandlerContext,
) -> Result<Vec<Message>, ChatError> {
    let handler_name = match &message.code {
        MessageCode::Empty => return Ok(Vec::new()),
        MessageCode::Action { handler, .. } => handler.as_str(),
        MessageCode::Unrecognized(raw) => {
            return Err(ChatError::InvalidActionCode(raw.clone()));
        }
    };

    let handler = registry
        .lookup(handler_name, ctx.handler_version)
        .ok_or_else(|| {
            ChatError::InvalidActionCode(format!(
                "{} (no handler registered for v{})",
                message.code, ctx.handler_version
            ))
        })?;

    if !guard.begin(message.token) {
        tracing::debug!(token = %message.token, code = %message.code, "action already executed, skipping");
        return Ok(Vec::new());
    }

    let follow_ups = handler.handle(message, ctx).await.map_err(|err| match err {
        ChatError::Validation(_) | ChatError::InvalidActionCode(_) | ChatError::Handling(_) => err,
        other => ChatError::Handling(other.to_string()),
    })?;

    let mut stored = Vec::with_capacity(follow_ups.len());
    for msg in follow_ups {
        stored.push(ctx.messages.insert(msg).await?);
    }
    Ok(stored)
}
