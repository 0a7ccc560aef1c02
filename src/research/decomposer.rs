//! Query decomposition strategies.
//!
//! A [`Decomposer`] turns the user's query into a [`ResearchPlan`]: the
//! clarified brief plus an ordered list of 1..N research tasks. Two strategies
//! ship with the crate:
//!
//! - [`HeuristicDecomposer`] - rule based, no model required
//! - [`LlmDecomposer`] - clarifies the goal and plans sub-questions with an LLM

use crate::llm::{LLMClient, parse_json_response};
use crate::research::error::ResearchError;
use crate::research::model::{
    Query, ResearchBrief, ResearchConstraints, ResearchPlan, TaskDraft,
};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

#[async_trait]
pub trait Decomposer: Send + Sync {
    /// Break `query` into research tasks.
    ///
    /// Fails with [`ResearchError::EmptyQuery`] on blank input; never returns
    /// an empty task list otherwise.
    async fn decompose(&self, query: &Query) -> Result<ResearchPlan, ResearchError>;

    fn name(&self) -> &str;
}

fn ensure_not_blank(query: &Query) -> Result<(), ResearchError> {
    if query.is_blank() {
        return Err(ResearchError::EmptyQuery);
    }
    Ok(())
}

/// Strip a list marker (`1. `, `2) `, `- `, `* `) from the start of a line.
fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();

    let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() < line.len()
        && let Some(item) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") "))
    {
        return item.trim();
    }

    match line.strip_prefix(['-', '*', '•']) {
        Some(item) if item.starts_with(' ') => item.trim(),
        _ => line,
    }
}

// ============= Heuristic =============

/// Angles appended when the query itself yields too few clauses.
const ANGLES: &[&str] = &[
    "Background and key facts",
    "Recent developments",
    "Implications and open questions",
    "Competing perspectives",
    "Data and evidence",
];

/// Rule-based decomposition.
///
/// The query is split into clauses on `?`, `;` and line breaks (list markers
/// removed). When that yields fewer than `min_tasks` clauses, the first clause
/// is kept and standard research angles on it are appended until `min_tasks`
/// is reached.
pub struct HeuristicDecomposer {
    min_tasks: usize,
    max_tasks: usize,
}

impl HeuristicDecomposer {
    pub fn new(min_tasks: usize, max_tasks: usize) -> Self {
        let max_tasks = max_tasks.max(1);
        Self {
            min_tasks: min_tasks.clamp(1, max_tasks),
            max_tasks,
        }
    }

    fn clauses(text: &str) -> Vec<String> {
        text.split(['?', ';', '\n'])
            .map(strip_list_marker)
            .filter(|clause| clause.chars().filter(|c| c.is_alphanumeric()).count() >= 3)
            .map(String::from)
            .collect()
    }
}

impl Default for HeuristicDecomposer {
    fn default() -> Self {
        Self::new(3, 6)
    }
}

#[async_trait]
impl Decomposer for HeuristicDecomposer {
    async fn decompose(&self, query: &Query) -> Result<ResearchPlan, ResearchError> {
        ensure_not_blank(query)?;

        let text = query.text().trim();
        let mut clauses = Self::clauses(text);
        if clauses.is_empty() {
            clauses.push(text.to_string());
        }

        let mut drafts: Vec<TaskDraft> = if clauses.len() >= self.min_tasks {
            clauses
                .into_iter()
                .enumerate()
                .map(|(i, clause)| TaskDraft::new(clause, i as u32 + 1))
                .collect()
        } else {
            let subject = clauses.swap_remove(0);
            let mut drafts = vec![TaskDraft::new(subject.clone(), 1)];
            drafts.extend(
                ANGLES
                    .iter()
                    .take(self.min_tasks - 1)
                    .enumerate()
                    .map(|(i, angle)| TaskDraft::new(format!("{}: {}", angle, subject), i as u32 + 2)),
            );
            drafts
        };
        drafts.truncate(self.max_tasks);

        let plan = ResearchPlan::from_drafts(ResearchBrief::from_query(query), drafts, self.max_tasks);
        tracing::debug!(query_id = %query.id(), tasks = plan.tasks.len(), "heuristic decomposition");
        Ok(plan)
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

// ============= LLM =============

#[derive(Debug, Deserialize, JsonSchema)]
struct ClarifiedRequest {
    /// A concise, 1-sentence summary of the main research objective.
    goal: String,
    #[serde(default)]
    constraints: ClarifiedConstraints,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
struct ClarifiedConstraints {
    /// Intended audience (e.g. 'experts', 'beginners'), null if not specified.
    audience: Option<String>,
    /// Level of detail (e.g. 'high-level overview'), null if not specified.
    depth: Option<String>,
    /// Geographic focus, null if not specified.
    region: Option<String>,
    /// Relevant time period, null if not specified.
    time_scope: Option<String>,
    /// Desired output format, null if not specified.
    format: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct PlannedResearch {
    /// The main goal of the research session.
    #[serde(default)]
    #[allow(dead_code)]
    overall_objective: String,
    subquestions: Vec<PlannedSubquestion>,
    /// A high-level paragraph explaining the approach.
    #[serde(default)]
    global_strategy: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct PlannedSubquestion {
    /// The specific question or task to be researched.
    description: String,
    /// Execution order priority (1 = highest/first).
    #[serde(default = "default_priority")]
    priority: u32,
    /// Extra context, hints, or constraints for the researcher.
    #[serde(default)]
    notes: String,
}

fn default_priority() -> u32 {
    1
}

const CLARIFY_SYSTEM: &str = "You are a research planner. Given a raw user question, \
    normalize it into a research goal and explicit constraints. Respond with JSON only.";

const PLAN_SYSTEM: &str = "You are a senior research planner. Break a research goal into \
    focused, independently researchable subquestions. Respond with JSON only.";

/// Model-driven decomposition: clarify the goal, then plan sub-questions.
pub struct LlmDecomposer {
    llm: Arc<dyn LLMClient>,
    max_tasks: usize,
}

impl LlmDecomposer {
    pub fn new(llm: Arc<dyn LLMClient>, max_tasks: usize) -> Self {
        Self {
            llm,
            max_tasks: max_tasks.max(1),
        }
    }

    async fn clarify(&self, query: &Query) -> Result<ResearchBrief, ResearchError> {
        let schema = schema_json::<ClarifiedRequest>();
        let prompt = format!(
            "User query:\n{}\n\nReturn a JSON object matching this schema:\n{}",
            query.text().trim(),
            schema
        );

        let response = self.llm.generate_with_system(CLARIFY_SYSTEM, &prompt).await?;

        match parse_json_response::<ClarifiedRequest>(&response) {
            Some(clarified) if !clarified.goal.trim().is_empty() => Ok(ResearchBrief {
                goal: clarified.goal.trim().to_string(),
                constraints: ResearchConstraints {
                    audience: clarified.constraints.audience,
                    depth: clarified.constraints.depth,
                    region: clarified.constraints.region,
                    time_scope: clarified.constraints.time_scope,
                    format: clarified.constraints.format,
                },
            }),
            _ => {
                tracing::warn!(query_id = %query.id(), "clarification was not valid JSON, using raw query as goal");
                Ok(ResearchBrief::from_query(query))
            }
        }
    }

    async fn plan(&self, brief: &ResearchBrief) -> Result<(Vec<TaskDraft>, Option<String>), ResearchError> {
        let schema = schema_json::<PlannedResearch>();
        let prompt = format!(
            "Goal:\n{}\n\nConstraints:\n{}\n\nPlan at most {} subquestions.\n\
             Return a JSON object matching this schema:\n{}",
            brief.goal,
            brief.constraints.describe(),
            self.max_tasks,
            schema
        );

        let response = self.llm.generate_with_system(PLAN_SYSTEM, &prompt).await?;

        if let Some(planned) = parse_json_response::<PlannedResearch>(&response) {
            let drafts = planned
                .subquestions
                .into_iter()
                .map(|sq| TaskDraft {
                    description: sq.description,
                    priority: sq.priority,
                    notes: sq.notes,
                })
                .collect();
            return Ok((drafts, planned.global_strategy));
        }

        // Plain-text plans: one subquestion per line, numbered or bulleted.
        let drafts = response
            .lines()
            .map(strip_list_marker)
            .filter(|line| !line.is_empty() && !line.starts_with('`'))
            .enumerate()
            .map(|(i, line)| TaskDraft::new(line, i as u32 + 1))
            .collect();
        Ok((drafts, None))
    }
}

fn schema_json<T: JsonSchema>() -> String {
    let schema = schemars::schema_for!(T);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

#[async_trait]
impl Decomposer for LlmDecomposer {
    async fn decompose(&self, query: &Query) -> Result<ResearchPlan, ResearchError> {
        ensure_not_blank(query)?;

        let brief = self.clarify(query).await?;
        let (drafts, strategy) = self.plan(&brief).await?;

        let mut plan = ResearchPlan::from_drafts(brief, drafts, self.max_tasks);
        if plan.tasks.is_empty() {
            tracing::warn!(query_id = %query.id(), "planner returned no usable subquestions, researching the goal directly");
            let goal = TaskDraft::new(plan.brief.goal.clone(), 1);
            plan = ResearchPlan::from_drafts(plan.brief, vec![goal], self.max_tasks);
        }
        let plan = plan.with_strategy(strategy);
        tracing::debug!(
            query_id = %query.id(),
            model = self.llm.model_name(),
            tasks = plan.tasks.len(),
            "llm decomposition"
        );
        Ok(plan)
    }

    fn name(&self) -> &str {
        "llm"
    }
}
