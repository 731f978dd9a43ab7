use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Lifecycle state of a backend run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    /// Any other terminal state, kept verbatim (`cancelled`, `expired`, …).
    Other(String),
}

impl RunStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "queued" => RunStatus::Queued,
            "in_progress" => RunStatus::InProgress,
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            other => RunStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Other(s) => s,
        }
    }

    /// Still worth polling.
    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::Queued | RunStatus::InProgress)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One asynchronous execution of the assistant against a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    /// Backend-reported failure message, present for `failed` runs.
    pub last_error: Option<String>,
}

/// The newest message of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMessage {
    pub role: Role,
    /// Text content parts in order; non-text parts are dropped.
    pub text_parts: Vec<String>,
}

/// One ranked search hit from a document index.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub file_id: String,
    pub file_name: String,
    pub score: f64,
    pub content: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// A single synchronous chat completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub temperature: f32,
    pub messages: Vec<ChatMessage>,
}

/// Backend surface used by the run strategy.
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    async fn append_message(
        &self,
        session_id: &str,
        role: Role,
        text: &str,
    ) -> Result<(), BackendError>;

    async fn start_run(&self, session_id: &str, agent_id: &str) -> Result<Run, BackendError>;

    async fn get_run(&self, session_id: &str, run_id: &str) -> Result<Run, BackendError>;

    /// Most recent message in the session, if any.
    async fn latest_message(&self, session_id: &str)
        -> Result<Option<SessionMessage>, BackendError>;
}

/// Backend surface used by the retrieval strategy.
#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    /// Id of the most recently created document index, if any exists.
    async fn latest_index(&self) -> Result<Option<String>, BackendError>;

    async fn search(
        &self,
        index_id: &str,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<Fragment>, BackendError>;

    /// Returns the first choice's text (possibly empty).
    async fn chat_completion(&self, req: &CompletionRequest) -> Result<String, BackendError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend rejected the request shape or content (HTTP 400).
    #[error("{0}")]
    InvalidRequest(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}
