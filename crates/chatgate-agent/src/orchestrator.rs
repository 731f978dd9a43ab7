use std::sync::Arc;

use chatgate_core::config::StrategyKind;
use chatgate_core::{ChatgateConfig, ChatgateError, Principal};
use chatgate_moderation::Moderator;
use tracing::{info, instrument};

use crate::backend::{AssistantBackend, RetrievalBackend};
use crate::clock::TokioClock;
use crate::outcome::CompletionOutcome;
use crate::strategy::{
    CompletionStrategy, RetrievalSettings, RetrievalStrategy, RunSettings, RunStrategy,
};

/// Front door for completions. Holds the strategy chosen at startup.
pub struct CompletionOrchestrator {
    strategy: Arc<dyn CompletionStrategy>,
}

impl CompletionOrchestrator {
    pub fn new(strategy: Arc<dyn CompletionStrategy>) -> Self {
        Self { strategy }
    }

    /// Build the strategy named by `completion.strategy`.
    pub fn from_config<B>(
        config: &ChatgateConfig,
        backend: Arc<B>,
        moderator: Arc<dyn Moderator>,
    ) -> Result<Self, ChatgateError>
    where
        B: AssistantBackend + RetrievalBackend + 'static,
    {
        let strategy: Arc<dyn CompletionStrategy> = match config.completion.strategy {
            StrategyKind::Run => {
                let assistant_id = config
                    .completion
                    .assistant_id
                    .clone()
                    .filter(|id| !id.trim().is_empty())
                    .ok_or_else(|| {
                        ChatgateError::Config(
                            "completion.assistant_id is required for the run strategy".into(),
                        )
                    })?;
                let settings = RunSettings::from_config(
                    &config.completion,
                    assistant_id,
                    config.moderation.window_chars,
                );
                Arc::new(RunStrategy::new(
                    backend,
                    moderator,
                    Arc::new(TokioClock),
                    settings,
                ))
            }
            StrategyKind::Retrieval => Arc::new(RetrievalStrategy::new(
                backend,
                RetrievalSettings::from(&config.completion),
            )),
        };
        info!(strategy = strategy.name(), "completion strategy selected");
        Ok(Self::new(strategy))
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Produce exactly one outcome for this turn. Never fails.
    #[instrument(skip(self, user_text, principal), fields(strategy = self.strategy.name(), principal = %principal))]
    pub async fn complete(
        &self,
        session_id: &str,
        user_text: &str,
        principal: &Principal,
    ) -> CompletionOutcome {
        let outcome = self.strategy.complete(session_id, user_text, principal).await;
        info!(status = ?outcome.status(), "completion finished");
        outcome
    }
}
