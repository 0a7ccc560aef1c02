//! HTTP API tests against the full router.

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use common::mocks::{FixedDecomposer, ScriptedGatherer, shared, tariff_gatherer};
use delve::research::{ResearchOptions, ResearchOrchestrator, TemplateSynthesizer};
use delve::{AppState, DelveConfig, DelveConfigManager, api::build_app};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

const TARIFF_QUERY: &str = "Impact of tariffs on semiconductor supply chains";

fn server_and_state(orchestrator: ResearchOrchestrator) -> (TestServer, AppState) {
    let manager = Arc::new(DelveConfigManager::from_config(DelveConfig::default()));
    let state = AppState::new(manager, Arc::new(orchestrator));
    let server = TestServer::new(build_app(state.clone())).expect("Failed to create test server");
    (server, state)
}

fn server_with(orchestrator: ResearchOrchestrator) -> TestServer {
    server_and_state(orchestrator).0
}

fn simulated_server() -> TestServer {
    server_with(ResearchOrchestrator::simulated(ResearchOptions::default()))
}

// ============= System =============

#[tokio::test]
async fn test_health() {
    let server = simulated_server();

    let response = server.get("/api/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_welcome_names_the_pipeline() {
    let server = simulated_server();

    let response = server.get("/api/welcome").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["pipeline"], "heuristic/simulated/template");
    assert!(body["message"].as_str().unwrap().contains("Delve"));
}

#[tokio::test]
async fn test_openapi_document_lists_research_paths() {
    let server = simulated_server();

    let response = server.get("/api-docs/openapi.json").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert!(body["paths"]["/api/research"].is_object());
    assert!(body["paths"]["/api/runs/{run_id}"].is_object());
}

// ============= Research =============

#[tokio::test]
async fn test_research_completes_with_report() {
    let server = simulated_server();

    let response = server
        .post("/api/research")
        .json(&json!({ "query": TARIFF_QUERY }))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["state"], "completed");
    assert_eq!(body["query_id"], 1);
    assert_eq!(body["query"], TARIFF_QUERY);
    assert!(!body["report"]["citations"].as_array().unwrap().is_empty());
    assert!(body["markdown"].as_str().unwrap().starts_with("# Research report"));
    assert!(body["failure"].is_null());
    assert!(body["steps"].as_array().unwrap().len() >= 4);
}

#[tokio::test]
async fn test_query_ids_increase_per_request() {
    let server = simulated_server();

    for expected in 1..=3 {
        let body: Value = server
            .post("/api/research")
            .json(&json!({ "query": "rust async runtimes" }))
            .await
            .json();
        assert_eq!(body["query_id"], expected);
    }
}

#[tokio::test]
async fn test_blank_query_is_rejected() {
    let server = simulated_server();

    let response = server
        .post("/api/research")
        .json(&json!({ "query": "   " }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn test_failed_run_answers_ok_with_failure_reason() {
    let server = server_with(ResearchOrchestrator::new(
        shared(FixedDecomposer::tariffs()),
        shared(ScriptedGatherer::new()),
        shared(TemplateSynthesizer),
        ResearchOptions::default(),
    ));

    let response = server
        .post("/api/research")
        .json(&json!({ "query": TARIFF_QUERY }))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["state"], "failed");
    assert_eq!(body["failure"]["kind"], "synthesis");
    assert!(body["report"].is_null());
}

#[tokio::test]
async fn test_partial_failure_cites_surviving_sources() {
    let server = server_with(ResearchOrchestrator::new(
        shared(FixedDecomposer::tariffs()),
        shared(tariff_gatherer()),
        shared(TemplateSynthesizer),
        ResearchOptions::default(),
    ));

    let body: Value = server
        .post("/api/research")
        .json(&json!({ "query": TARIFF_QUERY }))
        .await
        .json();

    assert_eq!(body["state"], "completed");
    assert_eq!(body["report"]["citations"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_stream_emits_steps_then_result() {
    let server = simulated_server();

    let response = server
        .post("/api/research/stream")
        .json(&json!({ "query": TARIFF_QUERY }))
        .await;
    response.assert_status_ok();

    let text = response.text();
    let first_step = text.find("event: step").expect("no step events");
    let result = text.find("event: result").expect("no result event");
    assert!(first_step < result);
    assert_eq!(text.matches("event: result").count(), 1);
    assert!(text.contains("\"completed\""));
}

#[tokio::test]
async fn test_stream_rejects_blank_query() {
    let server = simulated_server();

    server
        .post("/api/research/stream")
        .json(&json!({ "query": "" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_unknown_run_is_not_found() {
    let server = simulated_server();

    server
        .delete("/api/research/6f1c1c52-8a3e-4d9e-9d55-3f3f0e2b8a11")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_run_in_flight() {
    let (server, state) = server_and_state(ResearchOrchestrator::new(
        shared(FixedDecomposer::tariffs()),
        shared(tariff_gatherer().with_delay(Duration::from_secs(30))),
        shared(TemplateSynthesizer),
        ResearchOptions {
            gather_timeout_ms: 60_000,
            ..ResearchOptions::default()
        },
    ));

    let stream = async {
        server
            .post("/api/research/stream")
            .json(&json!({ "query": TARIFF_QUERY }))
            .await
    };
    let cancel = async {
        let run_id = loop {
            if let Some(id) = state.active_runs.ids().first().copied() {
                break id;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        };
        server
            .delete(&format!("/api/research/{}", run_id))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        run_id
    };

    let (response, run_id) = tokio::time::timeout(Duration::from_secs(10), async {
        tokio::join!(stream, cancel)
    })
    .await
    .expect("cancelled run should end the stream");

    response.assert_status_ok();
    let text = response.text();
    assert!(text.contains(&run_id.to_string()));
    assert!(text.contains("event: result"));
    assert!(!state.active_runs.contains(&run_id));

    let response = server.get(&format!("/api/runs/{}", run_id)).await;
    response.assert_status_ok();
    let run: Value = response.json();
    assert_eq!(run["state"], "failed");
    assert_eq!(run["failure"]["kind"], "cancelled");
    assert!(run["report"].is_null());
    assert!(run["evidence"].as_array().unwrap().is_empty());

    // Finished runs can no longer be cancelled.
    server
        .delete(&format!("/api/research/{}", run_id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

// ============= Run archive =============

#[tokio::test]
async fn test_finished_runs_are_archived() {
    let server = simulated_server();

    let first: Value = server
        .post("/api/research")
        .json(&json!({ "query": "rust async runtimes" }))
        .await
        .json();
    let second: Value = server
        .post("/api/research")
        .json(&json!({ "query": TARIFF_QUERY }))
        .await
        .json();

    let runs: Vec<Value> = server.get("/api/runs").await.json();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0]["run_id"], second["run_id"]);
    assert_eq!(runs[1]["run_id"], first["run_id"]);

    let run_id = first["run_id"].as_str().unwrap();
    let response = server.get(&format!("/api/runs/{}", run_id)).await;
    response.assert_status_ok();
    let run: Value = response.json();
    assert_eq!(run["state"], "completed");
    assert!(!run["evidence"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_run_is_not_found() {
    let server = simulated_server();

    server
        .get("/api/runs/6f1c1c52-8a3e-4d9e-9d55-3f3f0e2b8a11")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

// ============= Config reload =============

#[tokio::test]
async fn test_reloaded_config_rewires_new_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("delve.toml");
    std::fs::write(&path, "[research]\nbackend = \"simulated\"\n").unwrap();

    let manager = Arc::new(DelveConfigManager::new(&path).unwrap());
    let orchestrator = ResearchOrchestrator::from_config(&manager.config()).await.unwrap();
    let state = AppState::new(manager.clone(), Arc::new(orchestrator));
    let server = TestServer::new(build_app(state)).unwrap();

    let before: Value = server.get("/api/welcome").await.json();
    assert_eq!(before["pipeline"], "heuristic/simulated/template");

    std::fs::write(&path, "[research]\nbackend = \"web\"\n").unwrap();
    manager.reload().unwrap();

    let after: Value = server.get("/api/welcome").await.json();
    assert_eq!(after["pipeline"], "heuristic/web/template");
}
