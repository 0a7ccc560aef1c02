use crate::{
    AppState,
    research::{
        ChannelObserver, NoopObserver, Query, ResearchError, RunSummary, StepObserver,
        WorkflowRun,
    },
    types::{AppError, ResearchRequest, ResearchResponse, Result},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Number the query, rejecting blank input before a run is created.
fn accept_query(state: &AppState, payload: &ResearchRequest) -> Result<Query> {
    if payload.query.trim().is_empty() {
        return Err(ResearchError::EmptyQuery.into());
    }
    Ok(state.session.next_query(payload.query.trim()))
}

/// Start a run in the background. The run is registered for cancellation
/// while in flight and archived once it finishes, even if the client that
/// started it has gone away.
async fn launch(
    state: &AppState,
    query: Query,
    observer: Arc<dyn StepObserver>,
) -> Result<(Uuid, JoinHandle<Result<WorkflowRun>>)> {
    let handle = state.orchestrator().await?.start(query, observer);
    let run_id = handle.run_id;
    state.active_runs.register(run_id, handle.cancellation_token());

    let active_runs = Arc::clone(&state.active_runs);
    let archive = Arc::clone(&state.archive);
    let waiter = tokio::spawn(async move {
        let result = handle.wait().await;
        active_runs.remove(&run_id);
        if let Ok(run) = &result {
            archive.insert(run.clone());
        }
        result
    });

    Ok((run_id, waiter))
}

async fn finished(waiter: JoinHandle<Result<WorkflowRun>>) -> Result<WorkflowRun> {
    waiter
        .await
        .map_err(|e| AppError::Internal(format!("research run task failed: {}", e)))?
}

/// Run a research query to completion
///
/// Runs that fail (e.g. cancelled, or no task produced evidence) still
/// answer 200 with `state = "failed"`, the failure reason and the partial
/// step log.
#[utoipa::path(
    post,
    path = "/api/research",
    request_body = ResearchRequest,
    responses(
        (status = 200, description = "Run finished", body = ResearchResponse),
        (status = 400, description = "Blank query", body = crate::types::ErrorResponse)
    ),
    tag = "research"
)]
pub async fn research(
    State(state): State<AppState>,
    Json(payload): Json<ResearchRequest>,
) -> Result<Json<ResearchResponse>> {
    let query = accept_query(&state, &payload)?;
    let (run_id, waiter) = launch(&state, query, Arc::new(NoopObserver)).await?;
    tracing::info!(run_id = %run_id, "Research requested");

    let run = finished(waiter).await?;
    Ok(Json(ResearchResponse::from(&run)))
}

/// Run a research query, streaming progress as Server-Sent Events
///
/// Emits one `step` event per step, then a single `result` event carrying
/// the same body as `POST /api/research`.
#[utoipa::path(
    post,
    path = "/api/research/stream",
    request_body = ResearchRequest,
    responses(
        (status = 200, description = "Event stream of `step` events and a final `result` event", content_type = "text/event-stream"),
        (status = 400, description = "Blank query", body = crate::types::ErrorResponse)
    ),
    tag = "research"
)]
pub async fn research_stream(
    State(state): State<AppState>,
    Json(payload): Json<ResearchRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let query = accept_query(&state, &payload)?;
    let (observer, mut steps) = ChannelObserver::channel();
    let (run_id, waiter) = launch(&state, query, observer).await?;
    tracing::info!(run_id = %run_id, "Streaming research requested");

    let stream = async_stream::stream! {
        // The channel closes once the run task drops its observer.
        while let Some(step) = steps.recv().await {
            match Event::default().event("step").json_data(&step) {
                Ok(event) => yield Ok::<_, Infallible>(event),
                Err(e) => tracing::warn!(run_id = %run_id, error = %e, "Failed to encode step event"),
            }
        }

        let event = match finished(waiter).await {
            Ok(run) => Event::default()
                .event("result")
                .json_data(ResearchResponse::from(&run)),
            Err(e) => Event::default()
                .event("error")
                .json_data(crate::types::ErrorResponse { error: e.to_string() }),
        };
        match event {
            Ok(event) => yield Ok(event),
            Err(e) => tracing::warn!(run_id = %run_id, error = %e, "Failed to encode result event"),
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Cancel a run in flight
#[utoipa::path(
    delete,
    path = "/api/research/{run_id}",
    params(("run_id" = Uuid, Path, description = "Run to cancel")),
    responses(
        (status = 204, description = "Cancellation signalled"),
        (status = 404, description = "Unknown or already finished run", body = crate::types::ErrorResponse)
    ),
    tag = "research"
)]
pub async fn cancel_research(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<StatusCode> {
    if state.active_runs.cancel(&run_id) {
        tracing::info!(run_id = %run_id, "Research run cancellation requested");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("no run in flight with id {}", run_id)))
    }
}

/// List recently finished runs, most recent first
#[utoipa::path(
    get,
    path = "/api/runs",
    responses((status = 200, description = "Archived runs", body = Vec<RunSummary>)),
    tag = "runs"
)]
pub async fn list_runs(State(state): State<AppState>) -> Json<Vec<RunSummary>> {
    Json(state.archive.list())
}

/// Get a finished run with its tasks, evidence, report and step log
#[utoipa::path(
    get,
    path = "/api/runs/{run_id}",
    params(("run_id" = Uuid, Path, description = "Run id")),
    responses(
        (status = 200, description = "Archived run", body = WorkflowRun),
        (status = 404, description = "Unknown or evicted run", body = crate::types::ErrorResponse)
    ),
    tag = "runs"
)]
pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<WorkflowRun>> {
    state
        .archive
        .get(&run_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("run {} not found", run_id)))
}
