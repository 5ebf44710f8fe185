//! Main Entrypoint for the FinanceBot Voice Agent
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment and command line.
//! 2. Initializing the LLM client and the advisor's tool server.
//! 3. Minting the agent's room token and connecting to the voice bridge.
//! 4. Running the session until the room closes or Ctrl+C.

use anyhow::Context;
use clap::Parser;
use finbot_agent::{
    bridge::BridgeRuntime, config::Config, session::AgentSession, tools::AdvisorTools,
};
use finbot_core::{
    advisor::FinanceAdvisor,
    llm_client::{LLMClient, OpenAICompatibleClient},
    metrics::MetricsCorrelator,
    metrics_log::CsvMetricsLog,
    session::{LlmOptions, RoomJoin, SessionOptions},
    token::{JoinRequest, TokenIssuer},
};
use std::{path::PathBuf, sync::Arc};
use tracing::{info, warn};

/// FinanceBot voice agent.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Room to join (overrides LIVEKIT_ROOM).
    #[arg(long)]
    room: Option<String>,
    /// Voice bridge WebSocket URL (overrides AGENT_BRIDGE_URL).
    #[arg(long)]
    bridge_url: Option<String>,
    /// Where to append per-turn latency rows (overrides METRICS_LOG_PATH).
    #[arg(long)]
    metrics_log: Option<PathBuf>,
}

/// Resolves when `Ctrl+C` is received.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C; running until the room closes");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let cli = Cli::parse();
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(room) = cli.room {
        config.room = room;
    }
    if let Some(bridge_url) = cli.bridge_url {
        config.bridge_url = bridge_url;
    }
    if let Some(path) = cli.metrics_log {
        config.metrics_log_path = path;
    }

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing agent...");

    // --- 3. Initialize LLM and Tools ---
    let llm: Arc<dyn LLMClient> = Arc::new(OpenAICompatibleClient::with_endpoint(
        &config.groq_api_key,
        &config.llm_api_base,
        config.llm_model.clone(),
    ));
    let tools = AdvisorTools::start(FinanceAdvisor::new())
        .await
        .context("Failed to start advisor tools")?;

    // --- 4. Join the Room Through the Voice Bridge ---
    let issuer = TokenIssuer::new(config.livekit.clone());
    let token = issuer
        .issue(&JoinRequest {
            identity: config.agent_identity.clone(),
            name: "FinanceBot".to_string(),
            room: config.room.clone(),
        })
        .context("Failed to mint agent room token")?;
    let join = RoomJoin {
        url: issuer.url().to_string(),
        room: config.room.clone(),
        token,
    };
    let options = SessionOptions {
        llm: LlmOptions {
            model: config.llm_model.clone(),
            api_base: config.llm_api_base.clone(),
        },
        ..Default::default()
    };
    let runtime = BridgeRuntime::connect(&config.bridge_url).await?;

    let correlator = MetricsCorrelator::with_config(
        CsvMetricsLog::new(&config.metrics_log_path),
        config.correlator_config(),
    );

    // --- 5. Run the Session ---
    info!(
        room = %config.room,
        model = %config.llm_model,
        bridge_url = %config.bridge_url,
        metrics_log = %config.metrics_log_path.display(),
        "Agent configured. Starting session..."
    );
    let report = AgentSession::new(runtime, llm, tools, correlator)?
        .run(&join, &options, shutdown_signal())
        .await?;

    info!(
        turns = report.turns,
        rows_logged = report.rows_logged,
        "Agent has shut down."
    );
    Ok(())
}
