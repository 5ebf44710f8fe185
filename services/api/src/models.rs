//! API Models
//!
//! Request and response bodies for the HTTP API, annotated for OpenAPI
//! generation with `utoipa`.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Optional overrides for `GET /token`; omitted values use the configured defaults.
#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct TokenQuery {
    /// Participant identity; must be on the allow-list.
    pub identity: Option<String>,
    /// Participant display name.
    pub name: Option<String>,
    /// Room to join; must be on the allow-list.
    pub room: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct TokenResponse {
    pub token: String,
    #[schema(example = "wss://example.livekit.cloud")]
    pub livekit_url: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct MessageResponse {
    #[schema(example = "metrics_log.csv cleared")]
    pub message: String,
}

/// Averages over the data rows of the metrics log, in seconds.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct LatencySummary {
    pub turns: usize,
    pub avg_ttft: f64,
    pub avg_ttfb: f64,
    pub avg_total_latency: f64,
}

impl LatencySummary {
    const TTFT_COLUMN: usize = 3;
    const TTFB_COLUMN: usize = 4;
    const TOTAL_COLUMN: usize = 5;

    /// Summarizes CSV rows as returned by the metrics log. The header and any
    /// row whose latency cells do not parse are skipped; `None` if nothing is left.
    pub fn from_rows(rows: &[Vec<String>]) -> Option<Self> {
        let parse = |row: &Vec<String>, col: usize| row.get(col)?.trim().parse::<f64>().ok();

        let samples: Vec<(f64, f64, f64)> = rows
            .iter()
            .filter_map(|row| {
                Some((
                    parse(row, Self::TTFT_COLUMN)?,
                    parse(row, Self::TTFB_COLUMN)?,
                    parse(row, Self::TOTAL_COLUMN)?,
                ))
            })
            .collect();

        if samples.is_empty() {
            return None;
        }
        let count = samples.len() as f64;
        let (ttft, ttfb, total) = samples
            .iter()
            .fold((0.0, 0.0, 0.0), |acc, s| (acc.0 + s.0, acc.1 + s.1, acc.2 + s.2));

        Some(Self {
            turns: samples.len(),
            avg_ttft: ttft / count,
            avg_ttfb: ttfb / count,
            avg_total_latency: total / count,
        })
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct MetricsResponse {
    /// Every CSV row, header first.
    pub metrics: Vec<Vec<String>>,
    pub summary: Option<LatencySummary>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
