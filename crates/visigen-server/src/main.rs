use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use visigen_ai::{GeminiClient, SimulationPipeline};
use visigen_server::config::ServerArgs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = ServerArgs::parse()
        .into_settings()
        .context("invalid server configuration")?;

    let client = GeminiClient::new(settings.gemini).context("failed to build generation client")?;
    let pipeline = Arc::new(SimulationPipeline::new(client, settings.pipeline));

    let listener = tokio::net::TcpListener::bind(settings.bind)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind))?;
    info!(address = %settings.bind, model = %pipeline.client().config().model, "listening");

    axum::serve(listener, visigen_server::app(pipeline, settings.origins)).await?;
    Ok(())
}
