//! Request/response types shared by the API and the CLI, and the
//! application-level error type.

use crate::research::{
    error::ResearchError,
    model::{FailureReason, Report, RunState, WorkflowRun},
    steps::StepEvent,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// ============= API Request/Response Types =============

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResearchRequest {
    /// Free-text research question
    pub query: String,
}

impl ResearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }
}

/// Outcome of one research run as delivered to the chat collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResearchResponse {
    pub run_id: Uuid,
    pub query_id: u64,
    pub query: String,
    pub state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<Report>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    pub steps: Vec<StepEvent>,
    pub duration_ms: u64,
}

impl From<&WorkflowRun> for ResearchResponse {
    fn from(run: &WorkflowRun) -> Self {
        Self {
            run_id: run.run_id,
            query_id: run.query.id().0,
            query: run.query.text().to_string(),
            state: run.state,
            markdown: run.report.as_ref().map(Report::to_markdown),
            report: run.report.clone(),
            failure: run.failure.clone(),
            steps: run.steps.clone(),
            duration_ms: run.duration_ms(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WelcomeResponse {
    pub message: String,
    /// Strategies in use, `decomposer/gatherer/synthesizer`
    pub pipeline: String,
}

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ResearchError> for AppError {
    fn from(err: ResearchError) -> Self {
        match err {
            ResearchError::EmptyQuery => AppError::InvalidInput(err.to_string()),
            ResearchError::Backend(msg) => AppError::LLM(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::LLM(msg) => (axum::http::StatusCode::BAD_GATEWAY, msg),
            AppError::Search(msg) => (axum::http::StatusCode::BAD_GATEWAY, msg),
            AppError::Config(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (axum::http::StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (axum::http::StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, axum::Json(ErrorResponse { error: message })).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn test_research_errors_map_to_app_errors() {
        assert!(matches!(
            AppError::from(ResearchError::EmptyQuery),
            AppError::InvalidInput(_)
        ));
        assert!(matches!(
            AppError::from(ResearchError::Backend("down".to_string())),
            AppError::LLM(ref m) if m == "down"
        ));
        assert!(matches!(
            AppError::from(ResearchError::Cancelled),
            AppError::Internal(_)
        ));
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Search("x".into()), StatusCode::BAD_GATEWAY),
            (AppError::Config("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
