use finbot_core::{
    metrics::CorrelatorConfig,
    metrics_log::DEFAULT_METRICS_LOG_PATH,
    session::{DEFAULT_LLM_MODEL, GROQ_API_BASE},
    token::LiveKitConfig,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub groq_api_key: String,
    pub llm_model: String,
    pub llm_api_base: String,
    pub bridge_url: String,
    pub livekit: LiveKitConfig,
    pub room: String,
    pub agent_identity: String,
    pub metrics_log_path: PathBuf,
    pub metrics_max_pending: usize,
    pub metrics_max_age: Duration,
    pub log_level: Level,
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let groq_api_key = required("GROQ_API_KEY")?;
        let llm_model = std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string());
        let llm_api_base =
            std::env::var("LLM_API_BASE").unwrap_or_else(|_| GROQ_API_BASE.to_string());
        let bridge_url = std::env::var("AGENT_BRIDGE_URL")
            .unwrap_or_else(|_| "ws://127.0.0.1:8765".to_string());

        let livekit = LiveKitConfig::new(
            required("LIVEKIT_URL")?,
            required("LIVEKIT_API_KEY")?,
            required("LIVEKIT_API_SECRET")?,
        );
        let room = std::env::var("LIVEKIT_ROOM").unwrap_or_else(|_| "my-room".to_string());
        let agent_identity =
            std::env::var("AGENT_IDENTITY").unwrap_or_else(|_| "finbot-agent".to_string());

        let metrics_log_path = std::env::var("METRICS_LOG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_METRICS_LOG_PATH));
        let defaults = CorrelatorConfig::default();
        let metrics_max_pending = parse_or("METRICS_MAX_PENDING", defaults.max_pending)?;
        if metrics_max_pending == 0 {
            return Err(ConfigError::InvalidValue(
                "METRICS_MAX_PENDING".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let metrics_max_age = Duration::from_secs(parse_or(
            "METRICS_MAX_AGE_SECS",
            defaults.max_age.as_secs(),
        )?);

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            groq_api_key,
            llm_model,
            llm_api_base,
            bridge_url,
            livekit,
            room,
            agent_identity,
            metrics_log_path,
            metrics_max_pending,
            metrics_max_age,
            log_level,
        })
    }

    pub fn correlator_config(&self) -> CorrelatorConfig {
        CorrelatorConfig {
            max_pending: self.metrics_max_pending,
            max_age: self.metrics_max_age,
            ..Default::default()
        }
    }
}
