//! Hand-written collaborators shared by the pipeline and router tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chatgate_agent::{CompletionOrchestrator, CompletionOutcome, CompletionStrategy};
use chatgate_channels::{InMemoryLog, InboundEvent, MessageLog, ResponseDispatcher};
use chatgate_core::Principal;
use chatgate_moderation::{ModerationError, ModerationVerdict, Moderator};
use chatgate_sessions::{ConversationRegistry, SessionError, SessionFactory};

use crate::pipeline::{Pipeline, PipelineSettings};

pub struct Threads {
    pub created: AtomicUsize,
    pub fail: bool,
}

#[async_trait]
impl SessionFactory for Threads {
    async fn create_session(&self) -> Result<String, SessionError> {
        if self.fail {
            return Err(SessionError::creation("backend down"));
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(format!("thread_{n}"))
    }
}

/// Returns a fixed outcome; optionally records a follow-up user message
/// while "in flight".
pub struct Scripted {
    pub outcome: CompletionOutcome,
    pub follow_up: Option<Arc<InMemoryLog>>,
    pub calls: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl CompletionStrategy for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        session_id: &str,
        user_text: &str,
        _principal: &Principal,
    ) -> CompletionOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((session_id.to_string(), user_text.to_string()));
        if let Some(log) = &self.follow_up {
            log.record_inbound(&event("m2", "actually, never mind"));
        }
        self.outcome.clone()
    }
}

pub struct Verdicts(pub ModerationVerdict);

#[async_trait]
impl Moderator for Verdicts {
    fn name(&self) -> &str {
        "fixed"
    }
    async fn classify(
        &self,
        _: &str,
        _: &Principal,
    ) -> Result<ModerationVerdict, ModerationError> {
        Ok(self.0.clone())
    }
}

pub fn event(message_id: &str, content: &str) -> InboundEvent {
    InboundEvent {
        conversation_id: "conv-1".into(),
        message_id: message_id.into(),
        author: Principal::new("u1").with_name("alice"),
        content: content.into(),
        is_new_conversation: false,
        server_id: Some("guild-1".into()),
        from_bot: false,
        timestamp: chrono::Utc::now(),
    }
}

pub fn settings() -> PipelineSettings {
    PipelineSettings {
        max_conversation_messages: 200,
        receive_delay: Duration::ZERO,
        allowed_servers: Vec::new(),
    }
}

pub struct Harness {
    pub pipeline: Pipeline,
    pub strategy: Arc<Scripted>,
    pub log: Arc<InMemoryLog>,
}

pub fn harness(outcome: CompletionOutcome, inbound: ModerationVerdict) -> Harness {
    harness_with(outcome, inbound, false, false, settings())
}

pub fn harness_with(
    outcome: CompletionOutcome,
    inbound: ModerationVerdict,
    follow_up: bool,
    fail_sessions: bool,
    settings: PipelineSettings,
) -> Harness {
    let log = Arc::new(InMemoryLog::new("bot"));
    let strategy = Arc::new(Scripted {
        outcome,
        follow_up: follow_up.then(|| Arc::clone(&log)),
        calls: Mutex::new(Vec::new()),
    });
    let pipeline = Pipeline::new(
        ConversationRegistry::new(Arc::new(Threads {
            created: AtomicUsize::new(0),
            fail: fail_sessions,
        })),
        CompletionOrchestrator::new(strategy.clone()),
        Arc::new(Verdicts(inbound)),
        log.clone(),
        ResponseDispatcher::new(1950),
        settings,
    );
    Harness {
        pipeline,
        strategy,
        log,
    }
}
