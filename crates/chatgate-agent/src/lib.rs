//! Completion orchestration: turns a conversation's backend session plus new
//! user text into a classified [`CompletionOutcome`].
//!
//! Two interchangeable strategies sit behind [`CompletionStrategy`]; the
//! process picks one at startup through [`CompletionOrchestrator::from_config`].

pub mod backend;
pub mod clock;
pub mod openai;
pub mod orchestrator;
pub mod outcome;
pub mod poll;
pub mod strategy;

pub use backend::{AssistantBackend, BackendError, RetrievalBackend};
pub use clock::{Clock, ManualClock, TokioClock};
pub use openai::OpenAiBackend;
pub use orchestrator::CompletionOrchestrator;
pub use outcome::{CompletionOutcome, CompletionStatus};
pub use strategy::{CompletionStrategy, RetrievalStrategy, RunSettings, RunStrategy};
