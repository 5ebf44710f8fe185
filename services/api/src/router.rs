//! Axum Router Configuration
//!
//! HTTP routing for the token and call-metrics endpoints plus the OpenAPI
//! documentation.

use crate::{
    handlers,
    models::{
        ErrorResponse, LatencySummary, MessageResponse, MetricsResponse, TokenResponse,
    },
    state::AppState,
};

use axum::{Router, routing::get};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_token,
        handlers::start_call,
        handlers::end_call,
    ),
    components(
        schemas(TokenResponse, MessageResponse, MetricsResponse, LatencySummary, ErrorResponse)
    ),
    tags(
        (name = "FinanceBot API", description = "Room tokens and call latency metrics for the FinanceBot voice agent")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/token", get(handlers::get_token))
        .route("/start-call", get(handlers::start_call))
        .route("/end-call", get(handlers::end_call))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
