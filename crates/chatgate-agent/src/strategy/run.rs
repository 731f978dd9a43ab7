use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chatgate_core::config::CompletionConfig;
use chatgate_core::Principal;
use chatgate_moderation::{trailing_window, ModerationError, Moderator};
use tracing::{error, info, warn};

use crate::backend::{AssistantBackend, BackendError, Role};
use crate::clock::Clock;
use crate::outcome::CompletionOutcome;
use crate::poll::{PollState, RunPoller};
use crate::strategy::CompletionStrategy;

const EMPTY_REPLY: &str = "Assistant did not return a text message.";

#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Assistant the run executes against.
    pub assistant_id: String,
    pub poll_interval: Duration,
    pub max_wait: Duration,
    /// Trailing chars of `user_text + reply` sent to the moderator.
    pub moderation_window: usize,
}

impl RunSettings {
    pub fn from_config(config: &CompletionConfig, assistant_id: String, window: usize) -> Self {
        Self {
            assistant_id,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_wait: Duration::from_secs(config.max_wait_secs),
            moderation_window: window,
        }
    }
}

/// Stateful multi-turn strategy: append the user turn to the backend session,
/// start a run, poll it, then moderate the assistant's reply.
pub struct RunStrategy {
    backend: Arc<dyn AssistantBackend>,
    moderator: Arc<dyn Moderator>,
    clock: Arc<dyn Clock>,
    settings: RunSettings,
}

/// Failures the run strategy expects, by the step they happened in.
enum RunFailure {
    /// While appending the user message or starting the run.
    Submit(BackendError),
    /// While polling or fetching the reply.
    Backend(BackendError),
    Moderation(ModerationError),
}

impl RunFailure {
    fn into_outcome(self) -> CompletionOutcome {
        match self {
            RunFailure::Submit(BackendError::InvalidRequest(msg)) => {
                error!(error = %msg, "backend rejected the request");
                CompletionOutcome::invalid_request(msg)
            }
            RunFailure::Submit(e) | RunFailure::Backend(e) => {
                error!(error = %e, "backend call failed");
                CompletionOutcome::other_error(e.to_string())
            }
            RunFailure::Moderation(e) => {
                error!(error = %e, "moderation of reply failed");
                CompletionOutcome::other_error(format!("moderation failed: {e}"))
            }
        }
    }
}

impl RunStrategy {
    pub fn new(
        backend: Arc<dyn AssistantBackend>,
        moderator: Arc<dyn Moderator>,
        clock: Arc<dyn Clock>,
        settings: RunSettings,
    ) -> Self {
        Self {
            backend,
            moderator,
            clock,
            settings,
        }
    }

    async fn run_turn(
        &self,
        session_id: &str,
        user_text: &str,
        principal: &Principal,
    ) -> Result<CompletionOutcome, RunFailure> {
        self.backend
            .append_message(session_id, Role::User, user_text)
            .await
            .map_err(RunFailure::Submit)?;

        let run = self
            .backend
            .start_run(session_id, &self.settings.assistant_id)
            .await
            .map_err(RunFailure::Submit)?;
        info!(session = %session_id, run = %run.id, "run started");

        let poller = RunPoller::new(
            self.backend.as_ref(),
            self.clock.as_ref(),
            self.settings.poll_interval,
            self.settings.max_wait,
        );

        match poller
            .wait(session_id, run)
            .await
            .map_err(RunFailure::Backend)?
        {
            PollState::Completed(_) => self.collect_reply(session_id, user_text, principal).await,
            PollState::Failed(run) => {
                let message = run
                    .last_error
                    .unwrap_or_else(|| "Unknown error".to_string());
                error!(session = %session_id, run = %run.id, error = %message, "run failed");
                Ok(CompletionOutcome::other_error(message))
            }
            PollState::Ended(run) => {
                error!(session = %session_id, run = %run.id, status = %run.status, "run ended with unhandled status");
                Ok(CompletionOutcome::other_error(run.status.as_str()))
            }
            PollState::Polling(_) | PollState::TimedOut { .. } => {
                warn!(session = %session_id, max_wait = ?self.settings.max_wait, "run did not finish in time");
                Ok(CompletionOutcome::other_error("timeout"))
            }
        }
    }

    async fn collect_reply(
        &self,
        session_id: &str,
        user_text: &str,
        principal: &Principal,
    ) -> Result<CompletionOutcome, RunFailure> {
        let latest = self
            .backend
            .latest_message(session_id)
            .await
            .map_err(RunFailure::Backend)?;

        let reply = match latest {
            Some(msg) if msg.role == Role::Assistant => msg.text_parts.concat(),
            _ => String::new(),
        };
        let reply = reply.trim();
        if reply.is_empty() {
            return Ok(CompletionOutcome::empty(EMPTY_REPLY));
        }

        let context = format!("{user_text}{reply}");
        let window = trailing_window(&context, self.settings.moderation_window);
        let verdict = self
            .moderator
            .classify(window, principal)
            .await
            .map_err(RunFailure::Moderation)?;

        if verdict.is_blocked() {
            warn!(session = %session_id, reasons = %verdict.blocked_summary(), "reply blocked by moderation");
            return Ok(CompletionOutcome::blocked(reply, &verdict.blocked_summary()));
        }
        if verdict.is_flagged() {
            warn!(session = %session_id, reasons = %verdict.flagged_summary(), "reply flagged by moderation");
            return Ok(CompletionOutcome::flagged(reply, &verdict.flagged_summary()));
        }
        Ok(CompletionOutcome::ok(reply))
    }
}

#[async_trait]
impl CompletionStrategy for RunStrategy {
    fn name(&self) -> &str {
        "run"
    }

    async fn complete(
        &self,
        session_id: &str,
        user_text: &str,
        principal: &Principal,
    ) -> CompletionOutcome {
        match self.run_turn(session_id, user_text, principal).await {
            Ok(outcome) => outcome,
            Err(failure) => failure.into_outcome(),
        }
    }
}
