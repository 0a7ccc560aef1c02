//! `research` and `config` command implementations

use super::output::Output;
use crate::research::{ChannelObserver, ResearchOrchestrator, RunState, Session, WorkflowRun};
use crate::types::{AppError, ResearchResponse, Result};
use crate::utils::toml_config::{DelveConfig, DelveConfigManager, LlmConfig, SearchBackend};
use std::sync::Arc;

/// Run one query to completion, printing steps as they happen.
///
/// Ctrl-C cancels the run; it then ends `failed` with reason `cancelled`.
pub async fn research(
    config: &DelveConfig,
    query: &str,
    backend: Option<SearchBackend>,
    json: bool,
    output: &Output,
) -> Result<WorkflowRun> {
    let mut config = config.clone();
    if let Some(backend) = backend {
        config.research.backend = backend;
    }

    let orchestrator = Arc::new(ResearchOrchestrator::from_config(&config).await?);
    let query = Session::new().next_query(query);

    if !json {
        output.header(&format!("Researching: {}", query.text().trim()));
        output.kv("pipeline", &orchestrator.describe());
        output.newline();
    }

    let (observer, mut steps) = ChannelObserver::channel();
    let handle = orchestrator.start(query, observer);

    let cancel = handle.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    while let Some(step) = steps.recv().await {
        if !json {
            output.step_event(&step);
        }
    }
    let run = handle.wait().await;
    interrupt.abort();
    let run = run?;

    if json {
        let body = serde_json::to_string_pretty(&ResearchResponse::from(&run))
            .map_err(|e| AppError::Internal(format!("Failed to encode run: {}", e)))?;
        println!("{}", body);
        return Ok(run);
    }

    match (&run.report, &run.failure) {
        (Some(report), _) => output.block(&report.to_markdown()),
        (None, Some(failure)) => output.error(&failure.message),
        (None, None) => output.error("run ended without a report"),
    }
    if run.state == RunState::Completed {
        output.success(&format!("Completed in {} ms", run.duration_ms()));
    }

    Ok(run)
}

/// Print (or only validate) the effective configuration.
pub fn show_config(manager: &DelveConfigManager, validate: bool, output: &Output) -> Result<()> {
    let config = manager.config();
    let source = manager
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "built-in defaults".to_string());

    config.validate()?;

    if validate {
        output.success(&format!("Configuration is valid ({})", source));
        return Ok(());
    }

    output.header("Delve configuration");
    output.kv("source", &source);

    output.subheader("Server");
    output.kv("address", &config.server.bind_address());
    output.kv("log level", &config.server.log_level);

    output.subheader("Research");
    let research = &config.research;
    output.kv("backend", &format!("{:?}", research.backend).to_lowercase());
    output.kv("max concurrency", &research.max_concurrency.to_string());
    output.kv("gather timeout", &format!("{} ms", research.gather_timeout_ms));
    output.kv(
        "tasks",
        &format!("{} to {}", research.min_tasks, research.max_tasks),
    );
    output.kv("archive capacity", &research.archive_capacity.to_string());

    output.subheader("LLM");
    match &config.llm {
        Some(LlmConfig::Ollama { base_url, model }) => {
            output.kv("provider", "ollama");
            output.kv("base url", base_url);
            output.kv("model", model);
        }
        Some(LlmConfig::OpenAI {
            api_base,
            model,
            api_key_env,
        }) => {
            output.kv("provider", "openai");
            output.kv("api base", api_base);
            output.kv("model", model);
            output.kv("api key env", api_key_env);
        }
        None => output.kv("provider", "none (heuristic planning, template reports)"),
    }

    output.subheader("TOML");
    output.block(&config.to_toml()?);
    Ok(())
}
