use thiserror::Error;

/// Process-level error taxonomy.
///
/// Collaborator crates keep their own error enums; this is what crosses crate
/// boundaries into the gateway and what startup code reports.
#[derive(Debug, Error)]
pub enum ChatgateError {
    /// Required credential or assistant id missing. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The backend session for a conversation could not be created.
    #[error("Session creation failed: {0}")]
    SessionCreation(String),

    #[error("Channel error ({channel}): {reason}")]
    Channel { channel: String, reason: String },
}

impl ChatgateError {
    /// Short error code string for logs and JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ChatgateError::Config(_) => "CONFIG_ERROR",
            ChatgateError::SessionCreation(_) => "SESSION_CREATION_ERROR",
            ChatgateError::Channel { .. } => "CHANNEL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatgateError>;
