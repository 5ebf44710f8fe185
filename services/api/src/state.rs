//! Shared Application State

use crate::config::Config;
use finbot_core::{metrics_log::CsvMetricsLog, token::TokenIssuer};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub token_issuer: Arc<TokenIssuer>,
    pub metrics_log: Arc<CsvMetricsLog>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let token_issuer = Arc::new(TokenIssuer::new(config.livekit.clone()));
        let metrics_log = Arc::new(CsvMetricsLog::new(&config.metrics_log_path));
        Self {
            config: Arc::new(config),
            token_issuer,
            metrics_log,
        }
    }
}
