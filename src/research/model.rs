//! Data model for one research run.
//!
//! A [`WorkflowRun`] aggregates the user's [`Query`], the [`ResearchTask`]s the
//! decomposer derived from it, every [`Evidence`] item gathered for those tasks
//! and, on success, the immutable [`Report`].

use crate::research::steps::StepEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

// ============= Query =============

/// Session-scoped sequence number of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct QueryId(pub u64);

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.0)
    }
}

/// Free-text research question as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Query {
    id: QueryId,
    text: String,
}

impl Query {
    pub fn new(id: QueryId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }

    pub fn id(&self) -> QueryId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// True when the query has no non-whitespace content.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

// ============= Brief =============

/// Optional limiting factors for the research output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResearchConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl ResearchConstraints {
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// `(label, value)` pairs for the constraints that are set.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        [
            ("audience", &self.audience),
            ("depth", &self.depth),
            ("region", &self.region),
            ("time scope", &self.time_scope),
            ("format", &self.format),
        ]
        .into_iter()
        .filter_map(|(label, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (label, v))
        })
        .collect()
    }

    /// One-line human description, `"none"` when nothing is set.
    pub fn describe(&self) -> String {
        let entries = self.entries();
        if entries.is_empty() {
            return "none".to_string();
        }
        entries
            .iter()
            .map(|(label, value)| format!("{}: {}", label, value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// The clarified research goal and its constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResearchBrief {
    pub goal: String,
    #[serde(default)]
    pub constraints: ResearchConstraints,
}

impl ResearchBrief {
    /// A brief that uses the query text verbatim as the goal.
    pub fn from_query(query: &Query) -> Self {
        Self {
            goal: query.text().trim().to_string(),
            constraints: ResearchConstraints::default(),
        }
    }
}

// ============= Tasks =============

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Positional id, `T1` for the first task.
    pub fn nth(position: usize) -> Self {
        Self(format!("T{}", position + 1))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        }
    }
}

/// One research sub-task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResearchTask {
    pub id: TaskId,
    pub description: String,
    /// Execution priority, 1 = first.
    pub priority: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    pub status: TaskStatus,
    /// Gather failure cause when `status` is `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResearchTask {
    pub fn new(id: TaskId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            priority: 1,
            notes: String::new(),
            status: TaskStatus::Pending,
            error: None,
        }
    }
}

/// A task description as proposed by a decomposer, before ids are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub description: String,
    pub priority: u32,
    pub notes: String,
}

impl TaskDraft {
    pub fn new(description: impl Into<String>, priority: u32) -> Self {
        Self {
            description: description.into(),
            priority,
            notes: String::new(),
        }
    }
}

/// Output of a decomposer: the brief plus the ordered task list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResearchPlan {
    pub brief: ResearchBrief,
    pub tasks: Vec<ResearchTask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

impl ResearchPlan {
    /// Build a plan from drafts: blank and duplicate descriptions are dropped,
    /// the rest are stably sorted by priority, clamped to `max_tasks` and
    /// numbered `T1..Tn` in final order.
    pub fn from_drafts(brief: ResearchBrief, drafts: Vec<TaskDraft>, max_tasks: usize) -> Self {
        let mut seen = HashSet::new();
        let mut drafts: Vec<TaskDraft> = drafts
            .into_iter()
            .map(|mut d| {
                d.description = d.description.trim().to_string();
                d
            })
            .filter(|d| !d.description.is_empty())
            .filter(|d| seen.insert(d.description.to_lowercase()))
            .collect();

        drafts.sort_by_key(|d| d.priority);
        drafts.truncate(max_tasks.max(1));

        let tasks = drafts
            .into_iter()
            .enumerate()
            .map(|(i, d)| ResearchTask {
                priority: d.priority,
                notes: d.notes,
                ..ResearchTask::new(TaskId::nth(i), d.description)
            })
            .collect();

        Self {
            brief,
            tasks,
            strategy: None,
        }
    }

    pub fn with_strategy(mut self, strategy: Option<String>) -> Self {
        self.strategy = strategy.filter(|s| !s.trim().is_empty());
        self
    }
}

// ============= Evidence =============

/// A cited excerpt gathered for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Evidence {
    /// Source identifier, usually a URL.
    pub source_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub excerpt: String,
    pub task_id: TaskId,
}

impl Evidence {
    pub fn new(task_id: TaskId, source_id: impl Into<String>, excerpt: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            title: None,
            excerpt: excerpt.into(),
            task_id,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

// ============= Report =============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReportSection {
    pub heading: String,
    pub body: String,
}

impl ReportSection {
    pub fn new(heading: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            body: body.into(),
        }
    }
}

/// Final artifact of a completed run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Report {
    title: String,
    sections: Vec<ReportSection>,
    /// Distinct source ids, in first-cited order.
    citations: Vec<String>,
}

impl Report {
    /// Citations are deduplicated keeping their first position.
    pub fn new(
        title: impl Into<String>,
        sections: Vec<ReportSection>,
        citations: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut seen = HashSet::new();
        let citations = citations
            .into_iter()
            .filter(|c| seen.insert(c.clone()))
            .collect();

        Self {
            title: title.into(),
            sections,
            citations,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn sections(&self) -> &[ReportSection] {
        &self.sections
    }

    pub fn citations(&self) -> &[String] {
        &self.citations
    }

    /// 1-based position of `source_id` in the citation list.
    pub fn citation_number(&self, source_id: &str) -> Option<usize> {
        self.citations
            .iter()
            .position(|c| c == source_id)
            .map(|i| i + 1)
    }

    /// Render as Markdown with a numbered sources list.
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n", self.title);

        for section in &self.sections {
            out.push_str(&format!("\n## {}\n\n{}\n", section.heading, section.body.trim_end()));
        }

        if !self.citations.is_empty() {
            out.push_str("\n## Sources\n\n");
            for (i, source) in self.citations.iter().enumerate() {
                out.push_str(&format!("{}. {}\n", i + 1, source));
            }
        }

        out
    }
}

// ============= Run =============

/// Workflow state machine:
/// `Created → Decomposing → Gathering → Synthesizing → Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Created,
    Decomposing,
    Gathering,
    Synthesizing,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Created => "created",
            RunState::Decomposing => "decomposing",
            RunState::Gathering => "gathering",
            RunState::Synthesizing => "synthesizing",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        }
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Created, Decomposing) => true,
            (Decomposing, Gathering) => true,
            (Gathering, Synthesizing) => true,
            (Synthesizing, Completed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    EmptyQuery,
    Synthesis,
    Cancelled,
    Backend,
}

/// Why a run ended in `Failed`, with a message fit for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
}

/// One end-to-end execution of the research workflow.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkflowRun {
    pub run_id: Uuid,
    pub query: Query,
    pub state: RunState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brief: Option<ResearchBrief>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    pub tasks: Vec<ResearchTask>,
    pub evidence: Vec<Evidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<Report>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    pub steps: Vec<StepEvent>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowRun {
    pub fn new(query: Query) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            query,
            state: RunState::Created,
            brief: None,
            strategy: None,
            tasks: Vec::new(),
            evidence: Vec::new(),
            report: None,
            failure: None,
            steps: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn task(&self, id: &TaskId) -> Option<&ResearchTask> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn evidence_for(&self, id: &TaskId) -> impl Iterator<Item = &Evidence> {
        self.evidence.iter().filter(move |e| &e.task_id == id)
    }

    pub fn tasks_with_status(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    pub fn duration_ms(&self) -> u64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brief() -> ResearchBrief {
        ResearchBrief {
            goal: "goal".to_string(),
            constraints: ResearchConstraints::default(),
        }
    }

    #[test]
    fn test_plan_orders_by_priority_and_numbers_tasks() {
        let drafts = vec![
            TaskDraft::new("third", 3),
            TaskDraft::new("first", 1),
            TaskDraft::new("second", 2),
            TaskDraft::new("also first", 1),
        ];
        let plan = ResearchPlan::from_drafts(brief(), drafts, 10);

        let descriptions: Vec<_> = plan.tasks.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(descriptions, vec!["first", "also first", "second", "third"]);
        let ids: Vec<_> = plan.tasks.iter().map(|t| t.id.0.as_str()).collect();
        assert_eq!(ids, vec!["T1", "T2", "T3", "T4"]);
        assert!(plan.tasks.iter().all(|t| t.status == TaskStatus::Pending));
    }

    #[test]
    fn test_plan_drops_blank_and_duplicate_drafts() {
        let drafts = vec![
            TaskDraft::new("  Supply chains ", 1),
            TaskDraft::new("   ", 1),
            TaskDraft::new("supply chains", 2),
            TaskDraft::new("Tariffs", 2),
        ];
        let plan = ResearchPlan::from_drafts(brief(), drafts, 10);
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[0].description, "Supply chains");
    }

    #[test]
    fn test_plan_clamps_to_max_tasks() {
        let drafts = (0..10).map(|i| TaskDraft::new(format!("task {i}"), 1)).collect();
        let plan = ResearchPlan::from_drafts(brief(), drafts, 4);
        assert_eq!(plan.tasks.len(), 4);
    }

    #[test]
    fn test_report_dedupes_citations_in_first_seen_order() {
        let report = Report::new(
            "t",
            vec![],
            vec!["b".to_string(), "a".to_string(), "b".to_string()],
        );
        assert_eq!(report.citations(), &["b".to_string(), "a".to_string()]);
        assert_eq!(report.citation_number("a"), Some(2));
        assert_eq!(report.citation_number("zzz"), None);
    }

    #[test]
    fn test_report_markdown_lists_sources() {
        let report = Report::new(
            "Tariffs",
            vec![ReportSection::new("Overview", "Body text.")],
            vec!["https://example.com".to_string()],
        );
        let md = report.to_markdown();
        assert!(md.starts_with("# Tariffs\n"));
        assert!(md.contains("## Overview\n\nBody text.\n"));
        assert!(md.contains("## Sources\n\n1. https://example.com\n"));
    }

    #[test]
    fn test_run_state_transitions() {
        assert!(RunState::Created.can_transition_to(RunState::Decomposing));
        assert!(RunState::Gathering.can_transition_to(RunState::Failed));
        assert!(!RunState::Created.can_transition_to(RunState::Synthesizing));
        assert!(!RunState::Completed.can_transition_to(RunState::Failed));
        assert!(!RunState::Failed.can_transition_to(RunState::Failed));
    }

    #[test]
    fn test_constraints_describe() {
        let constraints = ResearchConstraints {
            audience: Some("experts".to_string()),
            region: Some("  ".to_string()),
            time_scope: Some("2023-2024".to_string()),
            ..Default::default()
        };
        assert_eq!(constraints.describe(), "audience: experts; time scope: 2023-2024");
        assert_eq!(ResearchConstraints::default().describe(), "none");
        assert!(ResearchConstraints::default().is_empty());
    }
}
