use thiserror::Error;

/// Errors that can occur while resolving a conversation's backend session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The backend refused or failed to create a session. The conversation
    /// stays unresolved and the next inbound event retries.
    #[error("session creation failed: {source}")]
    SessionCreation {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl SessionError {
    pub fn creation(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        SessionError::SessionCreation {
            source: source.into(),
        }
    }
}

impl From<SessionError> for chatgate_core::ChatgateError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::SessionCreation { source } => {
                chatgate_core::ChatgateError::SessionCreation(source.to_string())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
