//! Axum Handlers for the REST API
//!
//! Token issuance and the metrics-log endpoints used by the call UI. File work
//! runs on the blocking pool.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use finbot_core::{metrics_log::MetricsLogError, token::JoinRequest};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    models::{
        ErrorResponse, LatencySummary, MessageResponse, MetricsResponse, TokenQuery, TokenResponse,
    },
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(error) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { error })).into_response()
            }
            ApiError::Forbidden(error) => {
                (StatusCode::FORBIDDEN, Json(ErrorResponse { error })).into_response()
            }
            ApiError::NotFound(error) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { error })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let error = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { error }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

fn metrics_log_error(err: MetricsLogError) -> ApiError {
    match err {
        MetricsLogError::NotFound(name) => ApiError::NotFound(format!("{} not found", name)),
        other => ApiError::InternalServerError(other.into()),
    }
}

/// Issue a room access token.
#[utoipa::path(
    get,
    path = "/token",
    params(TokenQuery),
    responses(
        (status = 200, description = "Signed join token", body = TokenResponse),
        (status = 400, description = "Empty identity or room", body = ErrorResponse),
        (status = 403, description = "Identity or room not allowed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn get_token(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<TokenResponse>, ApiError> {
    let policy = &state.config.token_policy;
    let request = JoinRequest {
        identity: query
            .identity
            .unwrap_or_else(|| policy.default_identity.clone()),
        name: query.name.unwrap_or_else(|| policy.default_name.clone()),
        room: query.room.unwrap_or_else(|| policy.default_room.clone()),
    };

    if request.identity.trim().is_empty() || request.room.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "identity and room must not be empty".to_string(),
        ));
    }
    if !policy.allows_identity(&request.identity) {
        warn!(identity = %request.identity, "Token refused: identity not allowed");
        return Err(ApiError::Forbidden(format!(
            "identity '{}' is not allowed",
            request.identity
        )));
    }
    if !policy.allows_room(&request.room) {
        warn!(room = %request.room, "Token refused: room not allowed");
        return Err(ApiError::Forbidden(format!(
            "room '{}' is not allowed",
            request.room
        )));
    }

    let token = state.token_issuer.issue(&request)?;
    info!(identity = %request.identity, room = %request.room, "Issued room token");

    Ok(Json(TokenResponse {
        token,
        livekit_url: state.token_issuer.url().to_string(),
    }))
}

/// Clear the metrics log at the start of a call.
#[utoipa::path(
    get,
    path = "/start-call",
    responses(
        (status = 200, description = "Metrics log cleared", body = MessageResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn start_call(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let log = state.metrics_log.clone();
    tokio::task::spawn_blocking(move || log.reset())
        .await?
        .map_err(metrics_log_error)?;

    let message = format!("{} cleared", state.metrics_log.display_name());
    info!("{}", message);
    Ok(Json(MessageResponse { message }))
}

/// Return every row of the metrics log at the end of a call.
#[utoipa::path(
    get,
    path = "/end-call",
    responses(
        (status = 200, description = "Metrics rows, header first", body = MetricsResponse),
        (status = 404, description = "Metrics log does not exist", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn end_call(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MetricsResponse>, ApiError> {
    let log = state.metrics_log.clone();
    let metrics = tokio::task::spawn_blocking(move || log.read_rows())
        .await?
        .map_err(metrics_log_error)?;

    let summary = LatencySummary::from_rows(&metrics);
    info!(rows = metrics.len(), "Returning metrics log");
    Ok(Json(MetricsResponse { metrics, summary }))
}
