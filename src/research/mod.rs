//! Plan-then-execute research workflow
//!
//! A research run turns one free-text question into a cited report:
//!
//! 1. **Decompose** - a [`Decomposer`] derives a brief and an ordered list of
//!    research tasks from the query
//! 2. **Gather** - a [`Gatherer`] collects [`Evidence`] for every task, in
//!    parallel up to a concurrency limit and with a per-task timeout
//! 3. **Synthesize** - a [`Synthesizer`] turns the evidence of the successful
//!    tasks into a [`Report`] whose citations are exactly the gathered sources
//!
//! The [`ResearchOrchestrator`] sequences the phases, reports progress as
//! [`StepEvent`]s to an injected [`StepObserver`], tolerates per-task failures
//! and supports cancellation.
//!
//! # Usage
//!
//! ```ignore
//! use delve::research::{NoopObserver, ResearchOptions, ResearchOrchestrator, Session};
//! use tokio_util::sync::CancellationToken;
//!
//! let orchestrator = ResearchOrchestrator::simulated(ResearchOptions::default());
//! let query = Session::new().next_query("Impact of tariffs on semiconductor supply chains");
//!
//! let run = orchestrator
//!     .run(query, Arc::new(NoopObserver), CancellationToken::new())
//!     .await;
//!
//! if let Some(report) = run.report {
//!     println!("{}", report.to_markdown());
//! }
//! ```

/// Query → brief + task list strategies.
pub mod decomposer;
/// Run-level and per-task error taxonomy.
pub mod error;
/// Per-task evidence retrieval strategies.
pub mod gatherer;
/// Runs, tasks, evidence and reports.
pub mod model;
/// Phase sequencing, bounded fan-out and cancellation.
pub mod orchestrator;
/// Query numbering, run archive and in-flight run registry.
pub mod session;
/// Progress events and observers.
pub mod steps;
/// Evidence → report strategies.
pub mod synthesizer;

pub use decomposer::{Decomposer, HeuristicDecomposer, LlmDecomposer};
pub use error::ResearchError;
pub use gatherer::{Gatherer, SimulatedGatherer, WebSearchGatherer};
pub use model::{
    Evidence, FailureKind, FailureReason, Query, QueryId, Report, ReportSection, ResearchBrief,
    ResearchConstraints, ResearchPlan, ResearchTask, RunState, TaskDraft, TaskId, TaskStatus,
    WorkflowRun,
};
pub use orchestrator::{ResearchOptions, ResearchOrchestrator, RunHandle};
pub use session::{ActiveRuns, RunArchive, RunSummary, Session};
pub use steps::{
    ChannelObserver, CompositeObserver, FnObserver, NoopObserver, StepEvent, StepKind,
    StepObserver,
};
pub use synthesizer::{LlmSynthesizer, SynthesisInput, Synthesizer, TaskFindings, TemplateSynthesizer};
