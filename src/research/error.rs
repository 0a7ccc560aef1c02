use crate::research::model::{FailureKind, FailureReason, TaskId};
use crate::types::AppError;

/// Errors raised inside the research workflow.
///
/// `Gather` is per task and never escapes the gathering phase; every other
/// variant is fatal to the run and becomes its [`FailureReason`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResearchError {
    #[error("query is empty; type a question to research")]
    EmptyQuery,

    #[error("gathering for task {task_id} failed: {cause}")]
    Gather { task_id: TaskId, cause: String },

    #[error("no research task produced evidence, nothing to synthesize")]
    Synthesis,

    #[error("research run was cancelled")]
    Cancelled,

    #[error("research backend error: {0}")]
    Backend(String),
}

impl ResearchError {
    pub fn gather(task_id: &TaskId, cause: impl Into<String>) -> Self {
        ResearchError::Gather {
            task_id: task_id.clone(),
            cause: cause.into(),
        }
    }

    /// Run-level failure reason; `None` for per-task errors.
    pub fn failure_reason(&self) -> Option<FailureReason> {
        let kind = match self {
            ResearchError::EmptyQuery => FailureKind::EmptyQuery,
            ResearchError::Synthesis => FailureKind::Synthesis,
            ResearchError::Cancelled => FailureKind::Cancelled,
            ResearchError::Backend(_) => FailureKind::Backend,
            ResearchError::Gather { .. } => return None,
        };
        Some(FailureReason {
            kind,
            message: self.to_string(),
        })
    }
}

impl From<AppError> for ResearchError {
    fn from(err: AppError) -> Self {
        ResearchError::Backend(err.to_string())
    }
}
