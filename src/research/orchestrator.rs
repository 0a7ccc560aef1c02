//! Runs the decompose → gather → synthesize pipeline for one query.
//!
//! Gathering is the only fan-out point: every task is spawned on a
//! [`JoinSet`], at most `max_concurrency` of them hold a semaphore permit at
//! a time, and each gather is bounded by `gather_timeout_ms`. The orchestrator
//! waits for every task to reach a terminal status before synthesizing.

use crate::llm::LLMClient;
use crate::research::decomposer::{Decomposer, HeuristicDecomposer, LlmDecomposer};
use crate::research::error::ResearchError;
use crate::research::gatherer::{Gatherer, SimulatedGatherer, WebSearchGatherer};
use crate::research::model::{
    Evidence, Query, ResearchBrief, RunState, TaskStatus, WorkflowRun,
};
use crate::research::steps::{StepEvent, StepKind, StepObserver};
use crate::research::synthesizer::{
    LlmSynthesizer, SynthesisInput, Synthesizer, TemplateSynthesizer,
};
use crate::tools::DuckDuckGoSearch;
use crate::types::{AppError, Result};
use crate::utils::toml_config::{DelveConfig, SearchBackend};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;
use uuid::Uuid;

/// Tunables for one orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResearchOptions {
    /// Maximum number of gathers in flight at once.
    pub max_concurrency: usize,
    /// Upper bound for a single task's gather, in milliseconds.
    pub gather_timeout_ms: u64,
    /// Most tasks a plan may contain.
    pub max_tasks: usize,
    /// Tasks the heuristic decomposer pads a plan up to.
    pub min_tasks: usize,
}

impl Default for ResearchOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            gather_timeout_ms: 15_000,
            max_tasks: 6,
            min_tasks: 3,
        }
    }
}

impl ResearchOptions {
    pub fn gather_timeout(&self) -> Duration {
        Duration::from_millis(self.gather_timeout_ms)
    }
}

pub struct ResearchOrchestrator {
    decomposer: Arc<dyn Decomposer>,
    gatherer: Arc<dyn Gatherer>,
    synthesizer: Arc<dyn Synthesizer>,
    options: ResearchOptions,
}

impl ResearchOrchestrator {
    pub fn new(
        decomposer: Arc<dyn Decomposer>,
        gatherer: Arc<dyn Gatherer>,
        synthesizer: Arc<dyn Synthesizer>,
        options: ResearchOptions,
    ) -> Self {
        Self {
            decomposer,
            gatherer,
            synthesizer,
            options,
        }
    }

    /// Heuristic decomposition, simulated gathering and template synthesis.
    /// Needs no network and no model.
    pub fn simulated(options: ResearchOptions) -> Self {
        Self::new(
            Arc::new(HeuristicDecomposer::new(options.min_tasks, options.max_tasks)),
            Arc::new(SimulatedGatherer::default()),
            Arc::new(TemplateSynthesizer),
            options,
        )
    }

    /// Wire strategies from configuration.
    ///
    /// Without an `[llm]` section the heuristic decomposer and template
    /// synthesizer are used; the `research.backend` key picks the gatherer.
    pub async fn from_config(config: &DelveConfig) -> Result<Self> {
        let options = config.research.options();

        let llm: Option<Arc<dyn LLMClient>> = match &config.llm {
            Some(llm) => Some(llm.provider()?.create_client().await?),
            None => None,
        };

        let decomposer: Arc<dyn Decomposer> = match &llm {
            Some(llm) => Arc::new(LlmDecomposer::new(llm.clone(), options.max_tasks)),
            None => Arc::new(HeuristicDecomposer::new(options.min_tasks, options.max_tasks)),
        };

        let gatherer: Arc<dyn Gatherer> = match config.research.backend {
            SearchBackend::Simulated => {
                Arc::new(SimulatedGatherer::new(config.research.results_per_task))
            }
            SearchBackend::Web => {
                let web = WebSearchGatherer::new(
                    Arc::new(DuckDuckGoSearch::new()),
                    config.research.results_per_query,
                );
                match &llm {
                    Some(llm) => Arc::new(web.with_llm(llm.clone())),
                    None => Arc::new(web),
                }
            }
        };

        let synthesizer: Arc<dyn Synthesizer> = match &llm {
            Some(llm) => Arc::new(LlmSynthesizer::new(llm.clone())),
            None => Arc::new(TemplateSynthesizer),
        };

        tracing::info!(
            decomposer = decomposer.name(),
            gatherer = gatherer.name(),
            synthesizer = synthesizer.name(),
            max_concurrency = options.max_concurrency,
            gather_timeout_ms = options.gather_timeout_ms,
            "Research orchestrator configured"
        );

        Ok(Self::new(decomposer, gatherer, synthesizer, options))
    }

    pub fn options(&self) -> &ResearchOptions {
        &self.options
    }

    /// `decomposer/gatherer/synthesizer` strategy names.
    pub fn describe(&self) -> String {
        format!(
            "{}/{}/{}",
            self.decomposer.name(),
            self.gatherer.name(),
            self.synthesizer.name()
        )
    }

    /// Run `query` to a terminal state.
    pub async fn run(
        &self,
        query: Query,
        observer: Arc<dyn StepObserver>,
        cancel: CancellationToken,
    ) -> WorkflowRun {
        self.execute(WorkflowRun::new(query), observer, cancel).await
    }

    /// Drive a freshly created run to `Completed` or `Failed`.
    ///
    /// Never returns an error: fatal failures are recorded on the returned
    /// run together with the partial step log.
    pub async fn execute(
        &self,
        mut run: WorkflowRun,
        observer: Arc<dyn StepObserver>,
        cancel: CancellationToken,
    ) -> WorkflowRun {
        let observer = observer.as_ref();
        tracing::info!(run_id = %run.run_id, query_id = %run.query.id(), "Research run started");

        match self.drive(&mut run, observer, &cancel).await {
            Ok(()) => {
                tracing::info!(
                    run_id = %run.run_id,
                    citations = run.report.as_ref().map(|r| r.citations().len()).unwrap_or(0),
                    duration_ms = run.duration_ms(),
                    "Research run completed"
                );
            }
            Err(err) => {
                if err == ResearchError::Cancelled {
                    run.evidence.clear();
                }
                run.report = None;
                run.failure = err.failure_reason();
                run.finished_at = Some(Utc::now());
                transition(&mut run, observer, RunState::Failed, Some(err.to_string()));
                tracing::warn!(run_id = %run.run_id, error = %err, "Research run failed");
            }
        }

        run
    }

    /// Spawn the run on the runtime and hand back a cancellable handle.
    pub fn start(self: &Arc<Self>, query: Query, observer: Arc<dyn StepObserver>) -> RunHandle {
        let run = WorkflowRun::new(query);
        let run_id = run.run_id;
        let cancel = CancellationToken::new();

        let this = Arc::clone(self);
        let token = cancel.clone();
        let handle = tokio::spawn(async move { this.execute(run, observer, token).await });

        RunHandle {
            run_id,
            cancel,
            handle,
        }
    }

    async fn drive(
        &self,
        run: &mut WorkflowRun,
        observer: &dyn StepObserver,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), ResearchError> {
        // Blank queries are rejected by the decomposer, after the run has
        // entered Decomposing.
        transition(run, observer, RunState::Decomposing, None);
        let plan = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResearchError::Cancelled),
            plan = self.decomposer.decompose(&run.query) => plan?,
        };
        if plan.tasks.is_empty() {
            return Err(ResearchError::Backend(format!(
                "{} decomposer produced no tasks",
                self.decomposer.name()
            )));
        }

        let detail = format!("{} tasks planned", plan.tasks.len());
        run.brief = Some(plan.brief);
        run.strategy = plan.strategy;
        run.tasks = plan.tasks;
        transition(run, observer, RunState::Gathering, Some(detail));

        self.gather_all(run, observer, cancel).await?;

        let detail = format!(
            "{} of {} tasks done",
            run.tasks_with_status(TaskStatus::Done),
            run.tasks.len()
        );
        transition(run, observer, RunState::Synthesizing, Some(detail));

        let input = SynthesisInput::from_run(run);
        if input.evidence_count() == 0 {
            return Err(ResearchError::Synthesis);
        }
        let report = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResearchError::Cancelled),
            report = self.synthesizer.synthesize(&input) => report?,
        };

        let detail = format!("{} sources cited", report.citations().len());
        run.report = Some(report);
        run.finished_at = Some(Utc::now());
        transition(run, observer, RunState::Completed, Some(detail));
        Ok(())
    }

    async fn gather_all(
        &self,
        run: &mut WorkflowRun,
        observer: &dyn StepObserver,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), ResearchError> {
        let brief = Arc::new(
            run.brief
                .clone()
                .unwrap_or_else(|| ResearchBrief::from_query(&run.query)),
        );
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency.max(1)));
        let timeout = self.options.gather_timeout();
        let timeout_ms = self.options.gather_timeout_ms;
        let (started_tx, mut started_rx) = mpsc::unbounded_channel::<usize>();

        let mut set = JoinSet::new();
        let mut positions = HashMap::new();

        for (idx, task) in run.tasks.iter().enumerate() {
            let task = task.clone();
            let brief = Arc::clone(&brief);
            let gatherer = Arc::clone(&self.gatherer);
            let semaphore = Arc::clone(&semaphore);
            let started = started_tx.clone();

            let abort = set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (idx, Err(ResearchError::gather(&task.id, "gather pool closed"))),
                };
                let _ = started.send(idx);

                let outcome = match tokio::time::timeout(timeout, gatherer.gather(&task, &brief)).await {
                    Ok(result) => result,
                    Err(_) => Err(ResearchError::gather(
                        &task.id,
                        format!("timed out after {} ms", timeout_ms),
                    )),
                };
                (idx, outcome)
            });
            positions.insert(abort.id(), idx);
        }
        drop(started_tx);

        while !set.is_empty() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    set.abort_all();
                    tracing::info!(run_id = %run.run_id, in_flight = set.len(), "Gathering cancelled");
                    return Err(ResearchError::Cancelled);
                }
                Some(idx) = started_rx.recv() => mark_running(run, observer, idx),
                Some(joined) = set.join_next() => match joined {
                    Ok((idx, Ok(evidence))) => finish_task(run, observer, idx, Ok(evidence)),
                    Ok((idx, Err(err))) => {
                        let cause = match err {
                            ResearchError::Gather { cause, .. } => cause,
                            other => other.to_string(),
                        };
                        finish_task(run, observer, idx, Err(cause));
                    }
                    Err(join_err) => {
                        if let Some(&idx) = positions.get(&join_err.id()) {
                            finish_task(run, observer, idx, Err(format!("gather worker crashed: {}", join_err)));
                        }
                    }
                },
            }
        }

        Ok(())
    }
}

/// A run spawned by [`ResearchOrchestrator::start`].
pub struct RunHandle {
    pub run_id: Uuid,
    cancel: CancellationToken,
    handle: JoinHandle<WorkflowRun>,
}

impl RunHandle {
    /// Signal the run to stop; it ends `Failed` with reason `cancelled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the run to reach a terminal state.
    pub async fn wait(self) -> Result<WorkflowRun> {
        self.handle
            .await
            .map_err(|e| AppError::Internal(format!("research run task failed: {}", e)))
    }
}

fn emit(run: &mut WorkflowRun, observer: &dyn StepObserver, kind: StepKind) {
    let event = StepEvent {
        run_id: run.run_id,
        seq: run.steps.len() as u32 + 1,
        at: Utc::now(),
        kind,
    };
    tracing::debug!(run_id = %run.run_id, seq = event.seq, "{}", event.summary());
    observer.on_step(&event);
    run.steps.push(event);
}

fn transition(
    run: &mut WorkflowRun,
    observer: &dyn StepObserver,
    next: RunState,
    detail: Option<String>,
) {
    if !run.state.can_transition_to(next) {
        tracing::error!(run_id = %run.run_id, from = %run.state, to = %next, "Illegal run transition ignored");
        return;
    }
    tracing::info!(run_id = %run.run_id, state = %next, "Run state changed");
    run.state = next;
    emit(run, observer, StepKind::Run { state: next, detail });
}

fn emit_task(run: &mut WorkflowRun, observer: &dyn StepObserver, idx: usize) {
    let task = &run.tasks[idx];
    let kind = StepKind::Task {
        task_id: task.id.clone(),
        description: task.description.clone(),
        status: task.status,
        evidence_count: run.evidence_for(&task.id).count(),
        error: task.error.clone(),
    };
    emit(run, observer, kind);
}

fn mark_running(run: &mut WorkflowRun, observer: &dyn StepObserver, idx: usize) {
    if run.tasks[idx].status != TaskStatus::Pending {
        return;
    }
    run.tasks[idx].status = TaskStatus::Running;
    emit_task(run, observer, idx);
}

fn finish_task(
    run: &mut WorkflowRun,
    observer: &dyn StepObserver,
    idx: usize,
    outcome: std::result::Result<Vec<Evidence>, String>,
) {
    // A worker can finish before its start notice is drained.
    mark_running(run, observer, idx);

    let task_id = run.tasks[idx].id.clone();
    match outcome {
        Ok(evidence) => {
            tracing::debug!(run_id = %run.run_id, task_id = %task_id, evidence = evidence.len(), "Task gathered");
            run.evidence.extend(evidence.into_iter().map(|mut e| {
                e.task_id = task_id.clone();
                e
            }));
            run.tasks[idx].status = TaskStatus::Done;
        }
        Err(cause) => {
            tracing::warn!(run_id = %run.run_id, task_id = %task_id, error = %cause, "Task gather failed");
            run.tasks[idx].status = TaskStatus::Failed;
            run.tasks[idx].error = Some(cause);
        }
    }
    emit_task(run, observer, idx);
}
