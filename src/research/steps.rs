//! Step notifications for the UI collaborator.
//!
//! The orchestrator reports every run-state transition and every task status
//! change as a [`StepEvent`] to an injected [`StepObserver`]. Observers only
//! watch; nothing they do can alter the run.

use crate::research::model::{RunState, TaskId, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use utoipa::ToSchema;
use uuid::Uuid;

/// A UI-visible progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StepEvent {
    pub run_id: Uuid,
    /// Position of this event in the run's step log, starting at 1.
    pub seq: u32,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: StepKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    /// The run entered a new state.
    Run {
        state: RunState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// A research task changed status.
    Task {
        task_id: TaskId,
        description: String,
        status: TaskStatus,
        evidence_count: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl StepEvent {
    /// Short single-line rendering used by the CLI and logs.
    pub fn summary(&self) -> String {
        match &self.kind {
            StepKind::Run { state, detail } => match detail {
                Some(detail) => format!("run {}: {}", state, detail),
                None => format!("run {}", state),
            },
            StepKind::Task {
                task_id,
                description,
                status,
                evidence_count,
                error,
            } => match (status, error) {
                (TaskStatus::Failed, Some(err)) => {
                    format!("{} {} ({}): {}", task_id, status.as_str(), description, err)
                }
                (TaskStatus::Done, _) => format!(
                    "{} {} ({}): {} evidence",
                    task_id,
                    status.as_str(),
                    description,
                    evidence_count
                ),
                _ => format!("{} {} ({})", task_id, status.as_str(), description),
            },
        }
    }
}

/// Receives step events as they happen.
pub trait StepObserver: Send + Sync {
    fn on_step(&self, event: &StepEvent);
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl StepObserver for NoopObserver {
    fn on_step(&self, _event: &StepEvent) {}
}

/// Observer backed by a plain callback.
pub struct FnObserver<F>(pub F);

impl<F> StepObserver for FnObserver<F>
where
    F: Fn(&StepEvent) + Send + Sync,
{
    fn on_step(&self, event: &StepEvent) {
        (self.0)(event)
    }
}

/// Observer that forwards events into a channel, e.g. for an SSE stream.
///
/// A closed receiver is ignored: the UI going away must not affect the run.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<StepEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<StepEvent>) -> Self {
        Self { tx }
    }

    /// Observer plus the receiving end of its channel.
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<StepEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self::new(tx)), rx)
    }
}

impl StepObserver for ChannelObserver {
    fn on_step(&self, event: &StepEvent) {
        let _ = self.tx.send(event.clone());
    }
}

/// Fans one event out to several observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn StepObserver>>,
}

impl CompositeObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn StepObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl StepObserver for CompositeObserver {
    fn on_step(&self, event: &StepEvent) {
        for observer in &self.observers {
            observer.on_step(event);
        }
    }
}
