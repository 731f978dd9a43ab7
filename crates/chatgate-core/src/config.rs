use std::collections::BTreeMap;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::ChatgateError;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_MAX_WAIT_SECS: u64 = 120;
pub const DEFAULT_MODERATION_WINDOW_CHARS: usize = 500;
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 1950; // Discord caps messages at 2000
pub const DEFAULT_MAX_CONVERSATION_MESSAGES: u32 = 200;

/// Top-level config (chatgate.toml + CHATGATE_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatgateConfig {
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub moderation: ModerationConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Secret API key. Required; checked by [`ChatgateConfig::validate`].
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    /// Upper bound on any single HTTP request to the API.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Which completion strategy the whole process uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Stateful multi-turn: append to a backend thread, start a run, poll it.
    #[default]
    Run,
    /// Stateless: search the newest document index, one chat completion.
    Retrieval,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Run => write!(f, "run"),
            StrategyKind::Retrieval => write!(f, "retrieval"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default)]
    pub strategy: StrategyKind,
    /// Assistant the run strategy executes against. Required for `run`.
    #[serde(default)]
    pub assistant_id: Option<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound on how long a run may stay queued/in progress.
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
    /// Chat model used by the retrieval strategy.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// How many ranked fragments the retrieval strategy requests.
    #[serde(default = "default_max_sources")]
    pub max_sources: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            assistant_id: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_wait_secs: DEFAULT_MAX_WAIT_SECS,
            model: default_model(),
            temperature: default_temperature(),
            max_sources: default_max_sources(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    #[serde(default = "default_moderation_model")]
    pub model: String,
    /// Trailing window (in chars) of user text + reply that gets classified.
    #[serde(default = "default_window_chars")]
    pub window_chars: usize,
    /// Category score above which content is blocked.
    #[serde(default = "default_block_thresholds")]
    pub block_thresholds: BTreeMap<String, f64>,
    /// Category score above which content is flagged for moderators.
    #[serde(default = "default_flag_thresholds")]
    pub flag_thresholds: BTreeMap<String, f64>,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            model: default_moderation_model(),
            window_chars: DEFAULT_MODERATION_WINDOW_CHARS,
            block_thresholds: default_block_thresholds(),
            flag_thresholds: default_flag_thresholds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Platform message size limit used when splitting replies.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
    /// Conversations with more messages than this are closed.
    #[serde(default = "default_max_conversation_messages")]
    pub max_conversation_messages: u32,
    /// Wait before answering so a rapid follow-up can supersede the message.
    #[serde(default)]
    pub receive_delay_ms: u64,
    /// Server ids the bot answers in. Empty means every server.
    #[serde(default)]
    pub allowed_servers: Vec<String>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
            max_conversation_messages: DEFAULT_MAX_CONVERSATION_MESSAGES,
            receive_delay_ms: 0,
            allowed_servers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// When set, `POST /events` requires `Authorization: Bearer <token>`.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            token: None,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
fn default_max_wait_secs() -> u64 {
    DEFAULT_MAX_WAIT_SECS
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_sources() -> u32 {
    5
}
fn default_moderation_model() -> String {
    "omni-moderation-latest".to_string()
}
fn default_window_chars() -> usize {
    DEFAULT_MODERATION_WINDOW_CHARS
}
fn default_max_message_chars() -> usize {
    DEFAULT_MAX_MESSAGE_CHARS
}
fn default_max_conversation_messages() -> u32 {
    DEFAULT_MAX_CONVERSATION_MESSAGES
}

fn thresholds(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn default_block_thresholds() -> BTreeMap<String, f64> {
    thresholds(&[
        ("harassment", 0.5),
        ("harassment/threatening", 0.1),
        ("hate", 0.5),
        ("hate/threatening", 0.1),
        ("self-harm", 0.2),
        ("self-harm/instructions", 0.5),
        ("self-harm/intent", 0.7),
        ("sexual", 0.5),
        ("sexual/minors", 0.2),
        ("violence", 0.7),
        ("violence/graphic", 0.8),
    ])
}

fn default_flag_thresholds() -> BTreeMap<String, f64> {
    thresholds(&[
        ("harassment", 0.5),
        ("harassment/threatening", 0.1),
        ("hate", 0.4),
        ("hate/threatening", 0.05),
        ("self-harm", 0.1),
        ("self-harm/instructions", 0.5),
        ("self-harm/intent", 0.7),
        ("sexual", 0.3),
        ("sexual/minors", 0.1),
        ("violence", 0.1),
        ("violence/graphic", 0.1),
    ])
}

impl ChatgateConfig {
    /// Load config from a TOML file with CHATGATE_* env var overrides.
    ///
    /// Path resolution: explicit argument, then `~/.chatgate/chatgate.toml`.
    /// Nested keys use a double underscore, e.g. `CHATGATE_OPENAI__API_KEY`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::from_figment(
            Figment::new()
                .merge(Toml::file(&path))
                .merge(Env::prefixed("CHATGATE_").split("__")),
        )
    }

    /// Extract from an already-assembled figment (used by `load` and tests).
    pub fn from_figment(figment: Figment) -> crate::error::Result<Self> {
        figment
            .extract()
            .map_err(|e| ChatgateError::Config(e.to_string()))
    }

    /// Reject configurations no orchestration can run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self
            .openai
            .api_key
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .is_empty()
        {
            return Err(ChatgateError::Config("openai.api_key is not set".into()));
        }
        if self.completion.strategy == StrategyKind::Run
            && self
                .completion
                .assistant_id
                .as_deref()
                .map(str::trim)
                .unwrap_or("")
                .is_empty()
        {
            return Err(ChatgateError::Config(
                "completion.assistant_id is required for the run strategy".into(),
            ));
        }
        if self.completion.poll_interval_ms == 0 || self.completion.max_wait_secs == 0 {
            return Err(ChatgateError::Config(
                "completion.poll_interval_ms and completion.max_wait_secs must be positive".into(),
            ));
        }
        if self.openai.request_timeout_secs == 0 {
            return Err(ChatgateError::Config(
                "openai.request_timeout_secs must be positive".into(),
            ));
        }
        if self.channel.max_message_chars == 0 || self.moderation.window_chars == 0 {
            return Err(ChatgateError::Config(
                "channel.max_message_chars and moderation.window_chars must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.chatgate/chatgate.toml", home)
}
