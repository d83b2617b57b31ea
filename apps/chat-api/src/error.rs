//! Error taxonomy for the delivery core.

use thiserror::Error;

use crate::gateway::delivery::DeliveryError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ChatError {
    /// Bad or incomplete raw input. Recoverable: reported to the originating
    /// session as an `error` frame, the connection stays open.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Registry misconfiguration. Fatal at start-up.
    #[error("handler {name} v{version} is already registered")]
    DuplicateHandler { name: String, version: i32 },

    /// No handler matched the message's action code.
    #[error("invalid action code: {0}")]
    InvalidActionCode(String),

    /// A handler failed while processing a recognized code.
    #[error("message handling failed: {0}")]
    Handling(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl ChatError {
    /// Client-safe text for an `error` frame. Validation problems carry their
    /// own wording; everything else gets a generic message while the full
    /// detail goes to the log.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(reason) => reason.clone(),
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_keep_their_wording() {
        let err = ChatError::Validation("unknown reply token".to_string());
        assert_eq!(err.user_message(), "unknown reply token");
    }

    #[test]
    fn internal_errors_map_to_generic_wording() {
        let err = ChatError::InvalidActionCode("quiz$bogus".to_string());
        assert_eq!(err.user_message(), "Something went wrong. Please try again.");
        assert!(err.to_string().contains("quiz$bogus"));
    }
}
