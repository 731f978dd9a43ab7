use chatgate_core::ConversationId;
use dashmap::DashMap;
use tracing::debug;

use crate::types::{InboundEvent, MessageSnapshot};

/// Per-conversation message history, as far as staleness and the message cap
/// need it.
pub trait MessageLog: Send + Sync {
    /// Record a platform message and return its snapshot.
    fn record_inbound(&self, event: &InboundEvent) -> MessageSnapshot;

    /// Record one message posted by the bot.
    fn record_bot_reply(&self, conversation: &ConversationId) -> MessageSnapshot;

    /// The most recent message, if any has been recorded.
    fn latest(&self, conversation: &ConversationId) -> Option<MessageSnapshot>;

    /// All messages recorded for the conversation, bot messages included.
    fn message_count(&self, conversation: &ConversationId) -> u64;
}

#[derive(Debug, Default)]
struct Thread {
    latest: Option<MessageSnapshot>,
    count: u64,
}

/// Process-local [`MessageLog`] keyed by conversation id.
#[derive(Debug, Default)]
pub struct InMemoryLog {
    bot_id: String,
    threads: DashMap<ConversationId, Thread>,
}

impl InMemoryLog {
    pub fn new(bot_id: impl Into<String>) -> Self {
        Self {
            bot_id: bot_id.into(),
            threads: DashMap::new(),
        }
    }

    fn push(
        &self,
        conversation: &ConversationId,
        message_id: String,
        author_id: String,
        is_bot: bool,
    ) -> MessageSnapshot {
        let mut thread = self.threads.entry(conversation.clone()).or_default();
        thread.count += 1;
        let snapshot = MessageSnapshot {
            message_id,
            author_id,
            sequence: thread.count,
            is_bot,
        };
        thread.latest = Some(snapshot.clone());
        debug!(conversation = %conversation, seq = snapshot.sequence, is_bot, "message recorded");
        snapshot
    }
}

impl MessageLog for InMemoryLog {
    fn record_inbound(&self, event: &InboundEvent) -> MessageSnapshot {
        self.push(
            &event.conversation_id,
            event.message_id.clone(),
            event.author.id.clone(),
            event.from_bot,
        )
    }

    fn record_bot_reply(&self, conversation: &ConversationId) -> MessageSnapshot {
        self.push(
            conversation,
            format!("bot-{}", uuid::Uuid::new_v4()),
            self.bot_id.clone(),
            true,
        )
    }

    fn latest(&self, conversation: &ConversationId) -> Option<MessageSnapshot> {
        self.threads
            .get(conversation)
            .and_then(|t| t.latest.clone())
    }

    fn message_count(&self, conversation: &ConversationId) -> u64 {
        self.threads.get(conversation).map(|t| t.count).unwrap_or(0)
    }
}
