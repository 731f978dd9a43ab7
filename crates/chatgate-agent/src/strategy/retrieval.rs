use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use chatgate_core::config::CompletionConfig;
use chatgate_core::Principal;
use tracing::{debug, error, info};

use crate::backend::{
    BackendError, ChatMessage, CompletionRequest, Fragment, RetrievalBackend, Role,
};
use crate::outcome::CompletionOutcome;
use crate::strategy::CompletionStrategy;

const SYSTEM_INSTRUCTION: &str = "Produce a concise answer to the query based on the provided sources. \
If the sources do not contain the answer, say that you do not know.";

pub const NO_INDEX: &str = "no index found";
const EMPTY_REPLY: &str = "Model did not return a text message.";

#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub model: String,
    pub temperature: f32,
    pub max_sources: u32,
}

impl From<&CompletionConfig> for RetrievalSettings {
    fn from(config: &CompletionConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_sources: config.max_sources,
        }
    }
}

/// Stateless strategy: search the newest document index with the user's
/// text and answer in one chat completion grounded on the hits.
///
/// The generated reply is not moderated here (unlike [`RunStrategy`](super::RunStrategy)).
pub struct RetrievalStrategy {
    backend: Arc<dyn RetrievalBackend>,
    settings: RetrievalSettings,
}

impl RetrievalStrategy {
    pub fn new(backend: Arc<dyn RetrievalBackend>, settings: RetrievalSettings) -> Self {
        Self { backend, settings }
    }

    async fn answer(&self, user_text: &str) -> Result<CompletionOutcome, BackendError> {
        let Some(index_id) = self.backend.latest_index().await? else {
            return Ok(CompletionOutcome::other_error(NO_INDEX));
        };

        let fragments = self
            .backend
            .search(&index_id, user_text, self.settings.max_sources)
            .await?;
        info!(index = %index_id, hits = fragments.len(), "retrieved sources");

        let req = CompletionRequest {
            model: self.settings.model.clone(),
            temperature: self.settings.temperature,
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: SYSTEM_INSTRUCTION.to_string(),
                },
                ChatMessage {
                    role: Role::User,
                    content: format!(
                        "Sources: {}\n\nQuery: '{}'",
                        format_sources(&fragments),
                        user_text
                    ),
                },
            ],
        };

        let reply = self.backend.chat_completion(&req).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Ok(CompletionOutcome::empty(EMPTY_REPLY));
        }
        debug!(len = reply.len(), "retrieval reply");
        Ok(CompletionOutcome::ok(reply))
    }
}

/// Render hits as a tagged block the model can cite from.
pub fn format_sources(fragments: &[Fragment]) -> String {
    let mut out = String::from("<sources>");
    for f in fragments {
        let _ = write!(
            out,
            "<result file_id='{}' file_name='{}'>",
            f.file_id, f.file_name
        );
        for part in &f.content {
            let _ = write!(out, "<content>{}</content>", part);
        }
        out.push_str("</result>");
    }
    out.push_str("</sources>");
    out
}

#[async_trait]
impl CompletionStrategy for RetrievalStrategy {
    fn name(&self) -> &str {
        "retrieval"
    }

    async fn complete(
        &self,
        _session_id: &str,
        user_text: &str,
        _principal: &Principal,
    ) -> CompletionOutcome {
        match self.answer(user_text).await {
            Ok(outcome) => outcome,
            Err(BackendError::InvalidRequest(msg)) => {
                error!(error = %msg, "backend rejected the request");
                CompletionOutcome::invalid_request(msg)
            }
            Err(e) => {
                error!(error = %e, "retrieval completion failed");
                CompletionOutcome::other_error(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::CompletionStatus;
    use std::sync::Mutex;

    struct FakeIndex {
        index: Option<String>,
        fragments: Vec<Fragment>,
        reply: Result<String, String>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl FakeIndex {
        fn new(index: Option<&str>, reply: &str) -> Self {
            Self {
                index: index.map(String::from),
                fragments: vec![Fragment {
                    file_id: "file_1".into(),
                    file_name: "faq.md".into(),
                    score: 0.9,
                    content: vec!["Opening hours are 9 to 5.".into()],
                }],
                reply: Ok(reply.to_string()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RetrievalBackend for FakeIndex {
        async fn latest_index(&self) -> Result<Option<String>, BackendError> {
            Ok(self.index.clone())
        }
        async fn search(&self, _: &str, _: &str, _: u32) -> Result<Vec<Fragment>, BackendError> {
            Ok(self.fragments.clone())
        }
        async fn chat_completion(&self, req: &CompletionRequest) -> Result<String, BackendError> {
            self.requests.lock().unwrap().push(req.clone());
            self.reply.clone().map_err(BackendError::InvalidRequest)
        }
    }

    fn settings() -> RetrievalSettings {
        RetrievalSettings {
            model: "gpt-test".into(),
            temperature: 0.2,
            max_sources: 5,
        }
    }

    #[tokio::test]
    async fn no_index_is_other_error() {
        let backend = Arc::new(FakeIndex::new(None, "unused"));
        let outcome = RetrievalStrategy::new(backend.clone(), settings())
            .complete("", "when are you open?", &Principal::new("u1"))
            .await;

        assert_eq!(outcome.status(), CompletionStatus::OtherError);
        assert_eq!(outcome.reply_text(), None);
        assert_eq!(outcome.status_text(), Some("no index found"));
        assert!(backend.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn answers_from_sources() {
        let backend = Arc::new(FakeIndex::new(Some("vs_1"), " 9 to 5. \n"));
        let outcome = RetrievalStrategy::new(backend.clone(), settings())
            .complete("", "when are you open?", &Principal::new("u1"))
            .await;

        assert_eq!(outcome.status(), CompletionStatus::Ok);
        assert_eq!(outcome.reply_text(), Some("9 to 5."));

        let requests = backend.requests.lock().unwrap();
        let req = &requests[0];
        assert_eq!(req.temperature, 0.2);
        assert_eq!(req.messages.len(), 2);
        assert!(req.messages[1].content.contains("<result file_id='file_1' file_name='faq.md'>"));
        assert!(req.messages[1].content.ends_with("Query: 'when are you open?'"));
    }

    #[tokio::test]
    async fn empty_completion_is_ok_without_text() {
        let backend = Arc::new(FakeIndex::new(Some("vs_1"), "  "));
        let outcome = RetrievalStrategy::new(backend, settings())
            .complete("", "q", &Principal::new("u1"))
            .await;
        assert_eq!(outcome.status(), CompletionStatus::Ok);
        assert!(outcome.reply_text().is_none());
        assert!(outcome.status_text().is_some());
    }

    #[tokio::test]
    async fn rejected_completion_is_invalid_request() {
        let mut index = FakeIndex::new(Some("vs_1"), "");
        index.reply = Err("context length exceeded".into());
        let outcome = RetrievalStrategy::new(Arc::new(index), settings())
            .complete("", "q", &Principal::new("u1"))
            .await;
        assert_eq!(outcome.status(), CompletionStatus::InvalidRequest);
        assert_eq!(outcome.status_text(), Some("context length exceeded"));
    }

    #[test]
    fn sources_block_wraps_each_fragment() {
        let block = format_sources(&[Fragment {
            file_id: "f".into(),
            file_name: "n".into(),
            score: 1.0,
            content: vec!["a".into(), "b".into()],
        }]);
        assert_eq!(
            block,
            "<sources><result file_id='f' file_name='n'><content>a</content><content>b</content></result></sources>"
        );
    }
}
