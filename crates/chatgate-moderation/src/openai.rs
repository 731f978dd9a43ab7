use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chatgate_core::config::ModerationConfig;
use chatgate_core::Principal;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ModerationError;
use crate::moderator::Moderator;
use crate::verdict::ModerationVerdict;

/// Category scores at or below this never trigger (used for unknown categories).
const UNLISTED_THRESHOLD: f64 = 1.0;

/// Moderator backed by the OpenAI `/v1/moderations` endpoint.
///
/// The endpoint's own `flagged` bit is ignored; per-category scores are
/// compared against the configured block and flag thresholds instead.
pub struct OpenAiModerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    block_thresholds: BTreeMap<String, f64>,
    flag_thresholds: BTreeMap<String, f64>,
}

impl OpenAiModerator {
    /// Every request is cut off after `timeout`.
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        timeout: Duration,
        config: &ModerationConfig,
    ) -> Result<Self, ModerationError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com".to_string()),
            model: config.model.clone(),
            block_thresholds: config.block_thresholds.clone(),
            flag_thresholds: config.flag_thresholds.clone(),
        })
    }
}

#[async_trait]
impl Moderator for OpenAiModerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn classify(
        &self,
        text: &str,
        principal: &Principal,
    ) -> Result<ModerationVerdict, ModerationError> {
        let url = format!("{}/v1/moderations", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "moderation API error");
            return Err(ModerationError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ModerationError::Parse(e.to_string()))?;

        let scores = api_resp
            .results
            .into_iter()
            .next()
            .map(|r| r.category_scores)
            .unwrap_or_default();

        let verdict = score_categories(&scores, &self.block_thresholds, &self.flag_thresholds);
        debug!(
            principal = %principal.id,
            blocked = %verdict.blocked_summary(),
            flagged = %verdict.flagged_summary(),
            "moderation verdict"
        );
        Ok(verdict)
    }
}

/// Turn raw category scores into a verdict.
///
/// A category over its block threshold is blocked and not also reported as
/// flagged.
pub fn score_categories(
    scores: &HashMap<String, f64>,
    block: &BTreeMap<String, f64>,
    flag: &BTreeMap<String, f64>,
) -> ModerationVerdict {
    let mut verdict = ModerationVerdict::clean();
    for (category, score) in scores {
        let block_at = block.get(category).copied().unwrap_or(UNLISTED_THRESHOLD);
        if *score > block_at {
            verdict.blocked_reasons.insert(category.clone());
            continue;
        }
        let flag_at = flag.get(category).copied().unwrap_or(UNLISTED_THRESHOLD);
        if *score > flag_at {
            verdict.flagged_reasons.insert(category.clone());
        }
    }
    verdict
}

// OpenAI moderation response types (private, deserialization only)

#[derive(Deserialize)]
struct ApiResponse {
    results: Vec<ApiResult>,
}

#[derive(Deserialize)]
struct ApiResult {
    #[serde(default)]
    category_scores: HashMap<String, f64>,
}
