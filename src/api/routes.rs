use crate::AppState;
use crate::api::handlers::{research, system};
use axum::{
    Json, Router,
    routing::{delete, get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "Delve", description = "Plan-then-execute research server"),
    paths(
        system::health,
        system::welcome,
        research::research,
        research::research_stream,
        research::cancel_research,
        research::list_runs,
        research::get_run,
    ),
    components(schemas(
        crate::types::ResearchRequest,
        crate::types::ResearchResponse,
        crate::types::HealthResponse,
        crate::types::WelcomeResponse,
        crate::types::ErrorResponse,
        crate::research::StepEvent,
        crate::research::RunSummary,
        crate::research::WorkflowRun,
    )),
    tags(
        (name = "research", description = "Research runs"),
        (name = "runs", description = "Finished run archive"),
        (name = "system", description = "Health and greeting")
    )
)]
pub struct ApiDoc;

/// Routes under `/api`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(system::health))
        .route("/welcome", get(system::welcome))
        .route("/research", post(research::research))
        .route("/research/stream", post(research::research_stream))
        .route("/research/{run_id}", delete(research::cancel_research))
        .route("/runs", get(research::list_runs))
        .route("/runs/{run_id}", get(research::get_run))
}

/// The complete application: API routes, OpenAPI document, tracing and CORS.
pub fn build_app(state: AppState) -> Router {
    let app = Router::new().nest("/api", create_router());

    #[cfg(feature = "swagger-ui")]
    let app = app.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    #[cfg(not(feature = "swagger-ui"))]
    let app = app.route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    );

    app.layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
