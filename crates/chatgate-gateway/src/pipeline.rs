//! One inbound user message, end to end:
//! allow-list, cap, greeting for empty messages, inbound moderation,
//! optional receive delay, session resolve, completion, staleness check,
//! rendering.

use std::sync::Arc;
use std::time::Duration;

use chatgate_agent::{CompletionOrchestrator, CompletionOutcome};
use chatgate_channels::{
    is_stale, Action, ChannelError, InboundEvent, MessageLog, MessageSnapshot, ResponseDispatcher,
};
use chatgate_core::config::ChannelConfig;
use chatgate_core::{ChatgateError, ConversationId};
use chatgate_moderation::Moderator;
use chatgate_sessions::ConversationRegistry;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_conversation_messages: u64,
    pub receive_delay: Duration,
    /// Empty means every server is allowed.
    pub allowed_servers: Vec<String>,
}

impl From<&ChannelConfig> for PipelineSettings {
    fn from(config: &ChannelConfig) -> Self {
        Self {
            max_conversation_messages: u64::from(config.max_conversation_messages),
            receive_delay: Duration::from_millis(config.receive_delay_ms),
            allowed_servers: config.allowed_servers.clone(),
        }
    }
}

/// What the platform adapter gets back for one event.
#[derive(Debug, Clone, Serialize)]
pub struct EventReply {
    pub conversation_id: ConversationId,
    /// The reply was superseded by a newer user message and dropped.
    pub stale: bool,
    pub actions: Vec<Action>,
}

impl EventReply {
    fn new(conversation_id: ConversationId, actions: Vec<Action>) -> Self {
        Self {
            conversation_id,
            stale: false,
            actions,
        }
    }
}

pub struct Pipeline {
    registry: ConversationRegistry,
    orchestrator: CompletionOrchestrator,
    moderator: Arc<dyn Moderator>,
    log: Arc<dyn MessageLog>,
    dispatcher: ResponseDispatcher,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        registry: ConversationRegistry,
        orchestrator: CompletionOrchestrator,
        moderator: Arc<dyn Moderator>,
        log: Arc<dyn MessageLog>,
        dispatcher: ResponseDispatcher,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            registry,
            orchestrator,
            moderator,
            log,
            dispatcher,
            settings,
        }
    }

    pub fn conversation_count(&self) -> usize {
        self.registry.len()
    }

    pub fn strategy_name(&self) -> &str {
        self.orchestrator.strategy_name()
    }

    fn server_allowed(&self, server_id: Option<&str>) -> bool {
        if self.settings.allowed_servers.is_empty() {
            return true;
        }
        server_id.is_some_and(|id| self.settings.allowed_servers.iter().any(|s| s == id))
    }

    fn is_superseded(&self, snapshot: &MessageSnapshot, conversation: &ConversationId) -> bool {
        is_stale(snapshot, self.log.latest(conversation).as_ref())
    }

    #[instrument(skip(self, event), fields(conversation = %event.conversation_id, author = %event.author))]
    pub async fn handle(&self, event: InboundEvent) -> Result<EventReply, ChannelError> {
        event.validate()?;
        let conversation_id = event.conversation_id.clone();
        debug!(sent_at = %event.timestamp, new = event.is_new_conversation, "event received");

        if !self.server_allowed(event.server_id.as_deref()) {
            debug!(server = ?event.server_id, "server not in allow-list, ignoring");
            return Ok(EventReply::new(conversation_id, Vec::new()));
        }

        let snapshot = self.log.record_inbound(&event);
        if event.from_bot {
            return Ok(EventReply::new(conversation_id, Vec::new()));
        }

        if self.log.message_count(&conversation_id) > self.settings.max_conversation_messages {
            info!("conversation reached the message cap");
            let actions = self
                .dispatcher
                .render(&event.author, &CompletionOutcome::too_long());
            return Ok(EventReply::new(conversation_id, actions));
        }

        let mut actions = Vec::new();
        if event.is_new_conversation {
            actions.extend(self.dispatcher.render_opening(&event.author));
        }

        if event.content.trim().is_empty() {
            debug!("empty message, greeting instead of completing");
            actions.extend(self.dispatcher.render_greeting(&event.author));
            self.record_posts(&conversation_id, &actions);
            return Ok(EventReply::new(conversation_id, actions));
        }

        let verdict = match self.moderator.classify(&event.content, &event.author).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = %e, "inbound moderation failed");
                actions.extend(
                    self.dispatcher
                        .render_error(&format!("moderation failed: {e}")),
                );
                self.record_posts(&conversation_id, &actions);
                return Ok(EventReply::new(conversation_id, actions));
            }
        };
        actions.extend(self.dispatcher.render_inbound(
            &event.author,
            &event.message_id,
            &event.content,
            &verdict,
        ));
        self.record_posts(&conversation_id, &actions);
        if verdict.is_blocked() {
            warn!(reasons = %verdict.blocked_summary(), "inbound message blocked");
            return Ok(EventReply::new(conversation_id, actions));
        }

        if !self.settings.receive_delay.is_zero() {
            tokio::time::sleep(self.settings.receive_delay).await;
            if self.is_superseded(&snapshot, &conversation_id) {
                debug!("newer message arrived during receive delay");
                return Ok(EventReply {
                    conversation_id,
                    stale: true,
                    actions,
                });
            }
        }

        let conversation = match self.registry.resolve(&conversation_id).await {
            Ok(conversation) => conversation,
            Err(e) => {
                let e = ChatgateError::from(e);
                warn!(code = e.code(), error = %e, "conversation could not be resolved");
                let error = self.dispatcher.render_error(&e.to_string());
                self.record_posts(&conversation_id, &error);
                actions.extend(error);
                return Ok(EventReply::new(conversation_id, actions));
            }
        };

        let outcome = self
            .orchestrator
            .complete(&conversation.backend_session_id, &event.content, &event.author)
            .await;

        if self.is_superseded(&snapshot, &conversation_id) {
            info!(status = ?outcome.status(), "reply superseded by a newer message, dropping");
            return Ok(EventReply {
                conversation_id,
                stale: true,
                actions,
            });
        }

        let reply = self.dispatcher.render(&event.author, &outcome);
        self.record_posts(&conversation_id, &reply);
        actions.extend(reply);
        Ok(EventReply::new(conversation_id, actions))
    }

    /// Bot posts count toward the cap and never make a reply stale.
    fn record_posts(&self, conversation: &ConversationId, actions: &[Action]) {
        for _ in actions.iter().filter(|a| a.posts_message()) {
            self.log.record_bot_reply(conversation);
        }
    }
}
