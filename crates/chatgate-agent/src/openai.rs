use std::time::Duration;

use async_trait::async_trait;
use chatgate_sessions::{SessionError, SessionFactory};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::backend::{
    AssistantBackend, BackendError, CompletionRequest, Fragment, RetrievalBackend, Role, Run,
    RunStatus, SessionMessage,
};

/// OpenAI client covering threads/runs (run strategy), vector stores and chat
/// completions (retrieval strategy), and thread creation for the registry.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiBackend {
    /// Every request is cut off after `timeout`.
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com".to_string()),
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.authed(self.client.get(format!("{}{}", self.base_url, path)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.authed(self.client.post(format!("{}{}", self.base_url, path)))
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    /// Send, map non-2xx statuses onto [`BackendError`], decode JSON.
    async fn send_json<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, BackendError> {
        let resp = req.send().await?;
        let status = resp.status().as_u16();

        if status == 429 {
            let retry = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|s| s * 1000) // seconds to ms
                .unwrap_or(5000);
            return Err(BackendError::RateLimited {
                retry_after_ms: retry,
            });
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "OpenAI API error");
            let message = error_message(&text);
            match status {
                400 => return Err(BackendError::InvalidRequest(message)),
                502..=504 => return Err(BackendError::Unavailable(message)),
                _ => {}
            }
            return Err(BackendError::Api { status, message });
        }

        resp.json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))
    }
}

/// Pull `error.message` out of an OpenAI error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.to_string())
}

#[async_trait]
impl SessionFactory for OpenAiBackend {
    async fn create_session(&self) -> Result<String, SessionError> {
        let thread: IdOnly = self
            .send_json(self.post("/v1/threads").json(&serde_json::json!({})))
            .await
            .map_err(SessionError::creation)?;
        debug!(thread = %thread.id, "created OpenAI thread");
        Ok(thread.id)
    }
}

#[async_trait]
impl AssistantBackend for OpenAiBackend {
    async fn append_message(
        &self,
        session_id: &str,
        role: Role,
        text: &str,
    ) -> Result<(), BackendError> {
        let body = serde_json::json!({ "role": role, "content": text });
        let _: IdOnly = self
            .send_json(
                self.post(&format!("/v1/threads/{session_id}/messages"))
                    .json(&body),
            )
            .await?;
        Ok(())
    }

    async fn start_run(&self, session_id: &str, agent_id: &str) -> Result<Run, BackendError> {
        let body = serde_json::json!({ "assistant_id": agent_id });
        let run: ApiRun = self
            .send_json(self.post(&format!("/v1/threads/{session_id}/runs")).json(&body))
            .await?;
        Ok(run.into())
    }

    async fn get_run(&self, session_id: &str, run_id: &str) -> Result<Run, BackendError> {
        let run: ApiRun = self
            .send_json(self.get(&format!("/v1/threads/{session_id}/runs/{run_id}")))
            .await?;
        Ok(run.into())
    }

    async fn latest_message(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionMessage>, BackendError> {
        let list: ApiList<ApiMessage> = self
            .send_json(
                self.get(&format!("/v1/threads/{session_id}/messages"))
                    .query(&[("order", "desc"), ("limit", "1")]),
            )
            .await?;

        Ok(list.data.into_iter().next().map(|m| SessionMessage {
            role: m.role,
            text_parts: m
                .content
                .into_iter()
                .filter_map(|part| match part {
                    ApiContent::Text { text } => Some(text.value),
                    ApiContent::Other => None,
                })
                .collect(),
        }))
    }
}

#[async_trait]
impl RetrievalBackend for OpenAiBackend {
    async fn latest_index(&self) -> Result<Option<String>, BackendError> {
        let list: ApiList<IdOnly> = self
            .send_json(
                self.get("/v1/vector_stores")
                    .query(&[("order", "desc"), ("limit", "1")]),
            )
            .await?;
        Ok(list.data.into_iter().next().map(|s| s.id))
    }

    async fn search(
        &self,
        index_id: &str,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<Fragment>, BackendError> {
        let body = serde_json::json!({ "query": query, "max_num_results": max_results });
        let list: ApiList<ApiSearchHit> = self
            .send_json(
                self.post(&format!("/v1/vector_stores/{index_id}/search"))
                    .json(&body),
            )
            .await?;

        Ok(list
            .data
            .into_iter()
            .map(|hit| Fragment {
                file_id: hit.file_id,
                file_name: hit.filename,
                score: hit.score,
                content: hit
                    .content
                    .into_iter()
                    .filter(|c| c.kind == "text")
                    .map(|c| c.text)
                    .collect(),
            })
            .collect())
    }

    async fn chat_completion(&self, req: &CompletionRequest) -> Result<String, BackendError> {
        debug!(model = %req.model, "sending chat completion");
        let body = serde_json::json!({
            "model": req.model,
            "temperature": req.temperature,
            "messages": req.messages,
        });
        let resp: ApiCompletion = self
            .send_json(self.post("/v1/chat/completions").json(&body))
            .await?;
        Ok(resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

// OpenAI API response types (private, deserialization only)

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Deserialize)]
struct ApiList<T> {
    data: Vec<T>,
}

#[derive(Deserialize)]
struct ApiRun {
    id: String,
    status: String,
    last_error: Option<ApiRunError>,
}

#[derive(Deserialize)]
struct ApiRunError {
    message: String,
}

impl From<ApiRun> for Run {
    fn from(run: ApiRun) -> Self {
        Run {
            id: run.id,
            status: RunStatus::parse(&run.status),
            last_error: run.last_error.map(|e| e.message),
        }
    }
}

#[derive(Deserialize)]
struct ApiMessage {
    role: Role,
    #[serde(default)]
    content: Vec<ApiContent>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContent {
    Text { text: ApiText },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ApiText {
    value: String,
}

#[derive(Deserialize)]
struct ApiSearchHit {
    file_id: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    content: Vec<ApiSearchContent>,
}

#[derive(Deserialize)]
struct ApiSearchContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ApiCompletion {
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Deserialize)]
struct ApiChoiceMessage {
    content: Option<String>,
}
