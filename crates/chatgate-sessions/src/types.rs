use chatgate_core::ConversationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat-platform conversation bound to exactly one backend session.
///
/// Created on the first inbound message for `id` and never modified or
/// removed afterwards; it lives as long as the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    /// Opaque id of the provider-side multi-turn context (e.g. a thread id).
    pub backend_session_id: String,
    pub created_at: DateTime<Utc>,
}
