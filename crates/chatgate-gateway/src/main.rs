use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chatgate_agent::{CompletionOrchestrator, OpenAiBackend};
use chatgate_channels::{InMemoryLog, ResponseDispatcher};
use chatgate_core::ChatgateConfig;
use chatgate_moderation::OpenAiModerator;
use chatgate_sessions::ConversationRegistry;
use clap::Parser;
use tracing::info;

mod app;
mod http;
mod pipeline;
#[cfg(test)]
mod testing;

use pipeline::{Pipeline, PipelineSettings};

/// Id the bot's own posts are recorded under in the message log.
const BOT_AUTHOR_ID: &str = "chatgate";

#[derive(Parser, Debug)]
#[command(name = "chatgate-gateway", version, about = "Moderated LLM chat gateway")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long)]
    config: Option<String>,

    /// Override `gateway.bind`.
    #[arg(long)]
    bind: Option<String>,

    /// Override `gateway.port`.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "chatgate_gateway=info,chatgate_agent=info,tower_http=debug".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // explicit --config > CHATGATE_CONFIG env > ~/.chatgate/chatgate.toml
    let config_path = cli
        .config
        .or_else(|| std::env::var("CHATGATE_CONFIG").ok());
    let mut config = ChatgateConfig::load(config_path.as_deref())?;
    if let Some(bind) = cli.bind {
        config.gateway.bind = bind;
    }
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    // missing credentials are fatal before anything else starts
    config.validate()?;

    let api_key = config.openai.api_key.clone().unwrap_or_default();
    let base_url = Some(config.openai.base_url.clone());
    let timeout = Duration::from_secs(config.openai.request_timeout_secs);

    let backend = Arc::new(OpenAiBackend::new(
        api_key.clone(),
        base_url.clone(),
        timeout,
    )?);
    let moderator = Arc::new(OpenAiModerator::new(
        api_key,
        base_url,
        timeout,
        &config.moderation,
    )?);

    let registry = ConversationRegistry::new(backend.clone());
    let orchestrator = CompletionOrchestrator::from_config(&config, backend, moderator.clone())?;
    let pipeline = Pipeline::new(
        registry,
        orchestrator,
        moderator,
        Arc::new(InMemoryLog::new(BOT_AUTHOR_ID)),
        ResponseDispatcher::new(config.channel.max_message_chars),
        PipelineSettings::from(&config.channel),
    );

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    info!(
        strategy = pipeline.strategy_name(),
        auth = config.gateway.token.is_some(),
        "chatgate gateway configured"
    );

    let state = Arc::new(app::AppState::new(config, pipeline));
    let router = app::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
    }
}
