use chatgate_core::{ConversationId, Principal};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// A user message delivered by the platform adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub conversation_id: ConversationId,

    /// Platform-native id of this message; needed to delete it.
    pub message_id: String,

    pub author: Principal,

    /// Plain text content of the message.
    pub content: String,

    /// True for the opening message of a conversation the adapter just created.
    #[serde(default)]
    pub is_new_conversation: bool,

    /// Server / guild the conversation lives in, if the platform has one.
    #[serde(default)]
    pub server_id: Option<String>,

    /// Set by the adapter when the bot itself authored the message.
    #[serde(default)]
    pub from_bot: bool,

    /// Adapter-side send time. Logged only; staleness uses arrival order.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl InboundEvent {
    pub fn validate(&self) -> Result<(), ChannelError> {
        if self.conversation_id.as_str().trim().is_empty() {
            return Err(ChannelError::InvalidEvent("conversation_id is empty".into()));
        }
        if self.message_id.trim().is_empty() {
            return Err(ChannelError::InvalidEvent("message_id is empty".into()));
        }
        if self.author.id.trim().is_empty() {
            return Err(ChannelError::InvalidEvent("author.id is empty".into()));
        }
        Ok(())
    }
}

/// Banner colour understood by every adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    /// Rendered yellow.
    Warn,
    /// Rendered red.
    Error,
}

/// Which text a moderator notice is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeSource {
    /// The user's own message.
    Message,
    /// The bot's generated reply.
    Response,
}

/// Report sent to the moderators' channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationNotice {
    pub principal: Principal,
    pub severity: Severity,
    pub source: NoticeSource,
    /// Comma-separated category names.
    pub reasons: String,
    pub excerpt: String,
}

/// One step for the platform adapter to execute, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    SendText { text: String },
    SendBanner { severity: Severity, text: String },
    CloseConversation,
    NotifyModerators { notice: ModerationNotice },
    DeleteMessage { message_id: String },
}

impl Action {
    pub fn banner(severity: Severity, text: impl Into<String>) -> Self {
        Action::SendBanner {
            severity,
            text: text.into(),
        }
    }

    /// Whether executing this action posts a new bot message.
    pub fn posts_message(&self) -> bool {
        matches!(self, Action::SendText { .. } | Action::SendBanner { .. })
    }
}

/// Identity of the latest message in a conversation at some instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSnapshot {
    pub message_id: String,
    pub author_id: String,
    /// Arrival order within the conversation, starting at 1.
    pub sequence: u64,
    pub is_bot: bool,
}
