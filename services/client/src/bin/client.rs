//! services/client/src/bin/client.rs

use client_lib::{
    adapters::{CommandSpeechEngine, DbAdapter, HttpSummarizer},
    config::Config,
    error::ClientError,
    terminal::Session,
};
use open_blinkist_core::controller::Controller;
use open_blinkist_core::ports::SpeechEngine;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded. Starting client...");

    // --- 2. Prepare the Analysis Store ---
    // The pool connects on first use. A database that is down only costs
    // the history, never the session.
    let db_adapter = Arc::new(DbAdapter::connect_lazy(&config.database_url)?);
    info!("Running database migrations...");
    match db_adapter.run_migrations().await {
        Ok(()) => info!("Database migrations complete."),
        Err(e) => warn!("Database unavailable, analyses will not be recorded: {}", e),
    }

    // --- 3. Initialize Service Adapters ---
    let http_client = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| ClientError::Internal(format!("Failed to build HTTP client: {}", e)))?;
    let summarizer = Arc::new(HttpSummarizer::new(http_client, config.summary_api_url.clone()));
    match summarizer.check_health().await {
        Ok(true) => info!("Summarization API at {} is healthy.", config.summary_api_url),
        Ok(false) => warn!("Summarization API at {} reports it is unhealthy.", config.summary_api_url),
        Err(e) => warn!("Summarization API at {} is unreachable: {}", config.summary_api_url, e),
    }

    let speech = Arc::new(CommandSpeechEngine::new(config.speech_command.clone()));
    if !speech.is_supported() {
        warn!(
            "Speech command '{}' was not found; audio playback is unavailable.",
            config.speech_command
        );
    }

    // --- 4. Build the Controller ---
    let controller = Controller::new(summarizer, db_adapter, speech)
        .with_request_timeout(config.request_timeout)
        .with_user_agent(config.user_agent.clone());

    // --- 5. Run the Terminal Session ---
    let mut session = Session::new(Arc::new(controller), config.history_limit);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    session.run(stdin, tokio::io::stdout()).await?;

    Ok(())
}
