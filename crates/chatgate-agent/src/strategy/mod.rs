//! The two interchangeable ways of obtaining a completion.

pub mod retrieval;
pub mod run;

use async_trait::async_trait;
use chatgate_core::Principal;

use crate::outcome::CompletionOutcome;

pub use retrieval::{RetrievalSettings, RetrievalStrategy};
pub use run::{RunSettings, RunStrategy};

/// A completion strategy. Implementations never return errors: every
/// collaborator failure is classified into the outcome.
#[async_trait]
pub trait CompletionStrategy: Send + Sync {
    /// Strategy name for logging and the health endpoint.
    fn name(&self) -> &str;

    async fn complete(
        &self,
        session_id: &str,
        user_text: &str,
        principal: &Principal,
    ) -> CompletionOutcome;
}
