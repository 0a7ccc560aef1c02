//! Report synthesis strategies.
//!
//! Whatever produces the prose, the citation list of a [`Report`] is always
//! computed here from the evidence handed in, so a report can only cite
//! sources that were actually gathered during its run.

use crate::llm::LLMClient;
use crate::research::error::ResearchError;
use crate::research::model::{
    Evidence, Query, Report, ReportSection, ResearchBrief, ResearchTask, TaskStatus, WorkflowRun,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// Evidence gathered for one successful task.
#[derive(Debug, Clone)]
pub struct TaskFindings {
    pub task: ResearchTask,
    pub evidence: Vec<Evidence>,
}

/// Everything a synthesizer may look at.
#[derive(Debug, Clone)]
pub struct SynthesisInput {
    pub query: Query,
    pub brief: ResearchBrief,
    /// Only tasks whose status is `done`, in plan order.
    pub findings: Vec<TaskFindings>,
    /// Tasks that failed, for the limitations section.
    pub failed: Vec<ResearchTask>,
}

impl SynthesisInput {
    pub fn new(query: Query, brief: ResearchBrief) -> Self {
        Self {
            query,
            brief,
            findings: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Build from a run whose tasks are all terminal.
    pub fn from_run(run: &WorkflowRun) -> Self {
        let brief = run
            .brief
            .clone()
            .unwrap_or_else(|| ResearchBrief::from_query(&run.query));
        let mut input = Self::new(run.query.clone(), brief);

        for task in &run.tasks {
            match task.status {
                TaskStatus::Done => input.findings.push(TaskFindings {
                    task: task.clone(),
                    evidence: run.evidence_for(&task.id).cloned().collect(),
                }),
                TaskStatus::Failed => input.failed.push(task.clone()),
                TaskStatus::Pending | TaskStatus::Running => {}
            }
        }
        input
    }

    pub fn with_findings(mut self, task: ResearchTask, evidence: Vec<Evidence>) -> Self {
        self.findings.push(TaskFindings { task, evidence });
        self
    }

    /// Distinct source ids across all findings, in first-seen order.
    pub fn citations(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.findings
            .iter()
            .flat_map(|f| f.evidence.iter())
            .filter(|e| seen.insert(e.source_id.as_str()))
            .map(|e| e.source_id.clone())
            .collect()
    }

    /// Total number of evidence items across all findings.
    pub fn evidence_count(&self) -> usize {
        self.findings.iter().map(|f| f.evidence.len()).sum()
    }

    fn ensure_findings(&self) -> Result<(), ResearchError> {
        if self.evidence_count() == 0 {
            return Err(ResearchError::Synthesis);
        }
        Ok(())
    }

    fn title(&self) -> String {
        format!("Research report: {}", self.brief.goal)
    }
}

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Fails with [`ResearchError::Synthesis`] when `input` holds no evidence at all.
    async fn synthesize(&self, input: &SynthesisInput) -> Result<Report, ResearchError>;

    fn name(&self) -> &str;
}

// ============= Template =============

/// Deterministic synthesis: quotes the evidence under one section per task.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateSynthesizer;

impl TemplateSynthesizer {
    fn overview(input: &SynthesisInput, citations: &[String]) -> String {
        let evidence_count = input.evidence_count();
        let mut body = format!(
            "This report addresses \"{}\". {} of {} research tasks completed, yielding {} evidence items from {} distinct sources.",
            input.query.text().trim(),
            input.findings.len(),
            input.findings.len() + input.failed.len(),
            evidence_count,
            citations.len()
        );
        if !input.brief.constraints.is_empty() {
            body.push_str(&format!(
                "\n\nConstraints considered: {}.",
                input.brief.constraints.describe()
            ));
        }
        body
    }

    fn section_body(findings: &TaskFindings, citations: &[String]) -> String {
        if findings.evidence.is_empty() {
            return "No evidence was found for this task.".to_string();
        }
        findings
            .evidence
            .iter()
            .map(|e| {
                let number = citations
                    .iter()
                    .position(|c| c == &e.source_id)
                    .map(|i| i + 1)
                    .unwrap_or_default();
                format!("- {} [{}]", e.excerpt.trim(), number)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn limitations(input: &SynthesisInput) -> Option<ReportSection> {
        if input.failed.is_empty() {
            return None;
        }
        let body = input
            .failed
            .iter()
            .map(|t| match &t.error {
                Some(err) => format!("- {} could not be researched: {}", t.description, err),
                None => format!("- {} could not be researched.", t.description),
            })
            .collect::<Vec<_>>()
            .join("\n");
        Some(ReportSection::new("Limitations", body))
    }
}

#[async_trait]
impl Synthesizer for TemplateSynthesizer {
    async fn synthesize(&self, input: &SynthesisInput) -> Result<Report, ResearchError> {
        input.ensure_findings()?;
        let citations = input.citations();

        let mut sections = vec![ReportSection::new(
            "Overview",
            Self::overview(input, &citations),
        )];
        sections.extend(input.findings.iter().map(|f| {
            ReportSection::new(f.task.description.clone(), Self::section_body(f, &citations))
        }));
        sections.extend(Self::limitations(input));

        Ok(Report::new(input.title(), sections, citations))
    }

    fn name(&self) -> &str {
        "template"
    }
}

// ============= LLM =============

const SUMMARIZER_SYSTEM: &str = "You are a research summarizer. Given numbered evidence excerpts, \
    write a concise Markdown answer to the subquestion: a short paragraph followed by key findings \
    as bullet points. Cite evidence only with its bracketed number, e.g. [2]. Do not invent sources.";

const WRITER_SYSTEM: &str = "You are a research writer. Write a short executive summary in \
    Markdown that links the subquestion findings together. Do not invent sources or citations.";

/// Model-written sections over the same evidence-derived citation list.
///
/// A section whose LLM call fails falls back to the template body.
pub struct LlmSynthesizer {
    llm: Arc<dyn LLMClient>,
}

impl LlmSynthesizer {
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self { llm }
    }

    fn numbered_evidence(findings: &TaskFindings, citations: &[String]) -> String {
        findings
            .evidence
            .iter()
            .map(|e| {
                let number = citations
                    .iter()
                    .position(|c| c == &e.source_id)
                    .map(|i| i + 1)
                    .unwrap_or_default();
                match &e.title {
                    Some(title) => format!("[{}] {} ({}): {}", number, title, e.source_id, e.excerpt),
                    None => format!("[{}] {}: {}", number, e.source_id, e.excerpt),
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn summarize_task(
        &self,
        input: &SynthesisInput,
        findings: &TaskFindings,
        citations: &[String],
    ) -> String {
        if findings.evidence.is_empty() {
            return TemplateSynthesizer::section_body(findings, citations);
        }

        let prompt = format!(
            "Overall goal: {}\nConstraints: {}\nSubquestion: {}\n\nEvidence:\n{}",
            input.brief.goal,
            input.brief.constraints.describe(),
            findings.task.description,
            Self::numbered_evidence(findings, citations)
        );

        match self.llm.generate_with_system(SUMMARIZER_SYSTEM, &prompt).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => TemplateSynthesizer::section_body(findings, citations),
            Err(e) => {
                tracing::warn!(task_id = %findings.task.id, error = %e, "section summary failed, using template");
                TemplateSynthesizer::section_body(findings, citations)
            }
        }
    }

    async fn executive_summary(
        &self,
        input: &SynthesisInput,
        sections: &[ReportSection],
        citations: &[String],
    ) -> String {
        let notes = sections
            .iter()
            .map(|s| format!("### {}\n{}", s.heading, s.body))
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = format!(
            "Goal: {}\nConstraints: {}\n\nSubquestion findings:\n{}",
            input.brief.goal,
            input.brief.constraints.describe(),
            notes
        );

        match self.llm.generate_with_system(WRITER_SYSTEM, &prompt).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => TemplateSynthesizer::overview(input, citations),
            Err(e) => {
                tracing::warn!(error = %e, "executive summary failed, using template");
                TemplateSynthesizer::overview(input, citations)
            }
        }
    }
}

#[async_trait]
impl Synthesizer for LlmSynthesizer {
    async fn synthesize(&self, input: &SynthesisInput) -> Result<Report, ResearchError> {
        input.ensure_findings()?;
        let citations = input.citations();

        let mut task_sections = Vec::with_capacity(input.findings.len());
        for findings in &input.findings {
            let body = self.summarize_task(input, findings, &citations).await;
            task_sections.push(ReportSection::new(findings.task.description.clone(), body));
        }

        let summary = self
            .executive_summary(input, &task_sections, &citations)
            .await;

        let mut sections = vec![ReportSection::new("Executive summary", summary)];
        sections.extend(task_sections);
        sections.extend(TemplateSynthesizer::limitations(input));

        tracing::debug!(model = self.llm.model_name(), sections = sections.len(), "llm synthesis");
        Ok(Report::new(input.title(), sections, citations))
    }

    fn name(&self) -> &str {
        "llm"
    }
}
