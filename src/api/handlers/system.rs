use crate::{
    AppState,
    types::{HealthResponse, Result, WelcomeResponse},
};
use axum::{Json, extract::State};

/// Health check
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Server is up", body = HealthResponse)),
    tag = "system"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Greeting shown when a chat starts
#[utoipa::path(
    get,
    path = "/api/welcome",
    responses((status = 200, description = "Welcome message", body = WelcomeResponse)),
    tag = "system"
)]
pub async fn welcome(State(state): State<AppState>) -> Result<Json<WelcomeResponse>> {
    Ok(Json(WelcomeResponse {
        message: "Welcome to Delve! Ask me a research question and I will break it into \
                  research tasks, gather sources for each and write up a cited report."
            .to_string(),
        pipeline: state.orchestrator().await?.describe(),
    }))
}
