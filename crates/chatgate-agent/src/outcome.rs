use serde::{Deserialize, Serialize};

/// Closed result taxonomy; exactly one per orchestration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionStatus {
    Ok,
    TooLong,
    InvalidRequest,
    OtherError,
    ModerationFlagged,
    ModerationBlocked,
}

impl CompletionStatus {
    /// Statuses whose outcome may carry reply text for the user.
    pub fn may_carry_reply(self) -> bool {
        matches!(self, CompletionStatus::Ok | CompletionStatus::ModerationFlagged)
    }
}

/// Prefix on `status_text` when moderation fired on the generated reply.
pub const FROM_RESPONSE_PREFIX: &str = "from_response:";

/// Classified result of one orchestration attempt.
///
/// Only constructible through the named constructors, which keep the
/// invariant that `reply_text` is `Some` only for `Ok`/`ModerationFlagged`
/// with non-empty text. A blocked reply is never user-visible; it is kept in
/// `withheld_text` for the moderator notice only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionOutcome {
    status: CompletionStatus,
    reply_text: Option<String>,
    status_text: Option<String>,
    #[serde(skip)]
    withheld_text: Option<String>,
}

impl CompletionOutcome {
    /// Successful reply. Empty text degrades to [`CompletionOutcome::empty`].
    pub fn ok(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        if reply.is_empty() {
            return Self::empty("Assistant did not return a text message.");
        }
        Self {
            status: CompletionStatus::Ok,
            reply_text: Some(reply),
            status_text: None,
            withheld_text: None,
        }
    }

    /// The backend finished but produced no text. Non-fatal.
    pub fn empty(explanation: impl Into<String>) -> Self {
        Self {
            status: CompletionStatus::Ok,
            reply_text: None,
            status_text: Some(explanation.into()),
            withheld_text: None,
        }
    }

    pub fn flagged(reply: impl Into<String>, reasons: &str) -> Self {
        let reply = reply.into();
        Self {
            status: CompletionStatus::ModerationFlagged,
            reply_text: (!reply.is_empty()).then_some(reply),
            status_text: Some(format!("{FROM_RESPONSE_PREFIX}{reasons}")),
            withheld_text: None,
        }
    }

    pub fn blocked(reply: impl Into<String>, reasons: &str) -> Self {
        let reply = reply.into();
        Self {
            status: CompletionStatus::ModerationBlocked,
            reply_text: None,
            status_text: Some(format!("{FROM_RESPONSE_PREFIX}{reasons}")),
            withheld_text: (!reply.is_empty()).then_some(reply),
        }
    }

    pub fn too_long() -> Self {
        Self {
            status: CompletionStatus::TooLong,
            reply_text: None,
            status_text: Some("conversation is too long".to_string()),
            withheld_text: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::failure(CompletionStatus::InvalidRequest, message)
    }

    pub fn other_error(message: impl Into<String>) -> Self {
        Self::failure(CompletionStatus::OtherError, message)
    }

    fn failure(status: CompletionStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            reply_text: None,
            status_text: Some(message.into()),
            withheld_text: None,
        }
    }

    pub fn status(&self) -> CompletionStatus {
        self.status
    }

    pub fn reply_text(&self) -> Option<&str> {
        self.reply_text.as_deref()
    }

    pub fn status_text(&self) -> Option<&str> {
        self.status_text.as_deref()
    }

    /// Text that was generated but must not be shown to the user.
    pub fn withheld_text(&self) -> Option<&str> {
        self.withheld_text.as_deref()
    }
}
