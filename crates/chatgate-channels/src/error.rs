use chatgate_core::ChatgateError;
use thiserror::Error;

/// Errors raised while accepting events from the platform adapter.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The event is missing a required field or carries an empty one.
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// The adapter presented a missing or wrong bearer token.
    #[error("Unauthorized")]
    Unauthorized,
}

impl From<ChannelError> for ChatgateError {
    fn from(e: ChannelError) -> Self {
        ChatgateError::Channel {
            channel: "events".to_string(),
            reason: e.to_string(),
        }
    }
}
