use std::sync::Arc;

use async_trait::async_trait;
use chatgate_core::ConversationId;
use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SessionError};
use crate::types::Conversation;

/// Creates backend sessions. Implemented by the LLM backend client.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Create one new backend session and return its opaque id. Failures are
    /// wrapped with [`SessionError::creation`].
    async fn create_session(&self) -> Result<String>;
}

/// Maps conversation ids to backend sessions, creating them on first use.
///
/// Each conversation id owns a `OnceCell`. Concurrent first calls for the same
/// id all await the same initialisation, so exactly one backend session is
/// created. A failed initialisation leaves the cell empty; the next call
/// retries.
pub struct ConversationRegistry {
    factory: Arc<dyn SessionFactory>,
    conversations: DashMap<ConversationId, Arc<OnceCell<Conversation>>>,
}

impl ConversationRegistry {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            factory,
            conversations: DashMap::new(),
        }
    }

    /// Return the conversation for `id`, creating its backend session if this
    /// is the first time the id is seen.
    #[instrument(skip(self, id), fields(conversation = %id))]
    pub async fn resolve(&self, id: &ConversationId) -> Result<Conversation> {
        // Clone the cell out so no shard lock is held across the await below.
        let cell = Arc::clone(&*self.conversations.entry(id.clone()).or_default());

        if let Some(existing) = cell.get() {
            debug!("conversation cache hit");
            return Ok(existing.clone());
        }

        let conversation = cell
            .get_or_try_init(|| async {
                let session_id = self.factory.create_session().await.map_err(|e| {
                    warn!(error = %e, "backend session creation failed");
                    e
                })?;
                info!(session = %session_id, "created backend session");
                Ok::<_, SessionError>(Conversation {
                    id: id.clone(),
                    backend_session_id: session_id,
                    created_at: chrono::Utc::now(),
                })
            })
            .await?;

        Ok(conversation.clone())
    }

    /// Pure lookup, never touches the backend.
    pub fn get(&self, id: &ConversationId) -> Option<Conversation> {
        self.conversations
            .get(id)
            .and_then(|cell| cell.get().cloned())
    }

    /// Number of conversations with a resolved backend session.
    pub fn len(&self) -> usize {
        self.conversations
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
