//! Evidence gathering backends.
//!
//! A [`Gatherer`] turns one research task into a set of [`Evidence`] items.
//! Failures are per task: the orchestrator marks the task failed and carries
//! on with the others.
//!
//! - [`SimulatedGatherer`] - deterministic offline sources, for demos and tests
//! - [`WebSearchGatherer`] - live web search, optionally with LLM query expansion

use crate::llm::{LLMClient, parse_json_response};
use crate::research::error::ResearchError;
use crate::research::model::{Evidence, ResearchBrief, ResearchTask};
use crate::tools::search::SearchProvider;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait Gatherer: Send + Sync {
    /// Collect evidence for `task`. May return an empty set.
    async fn gather(
        &self,
        task: &ResearchTask,
        brief: &ResearchBrief,
    ) -> Result<Vec<Evidence>, ResearchError>;

    fn name(&self) -> &str;
}

// ============= Simulated =============

/// Offline backend producing deterministic `sim://` sources.
#[derive(Debug, Clone)]
pub struct SimulatedGatherer {
    results_per_task: usize,
    latency: Duration,
}

impl SimulatedGatherer {
    pub fn new(results_per_task: usize) -> Self {
        Self {
            results_per_task,
            latency: Duration::ZERO,
        }
    }

    /// Sleep this long before answering, to mimic network I/O.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl Default for SimulatedGatherer {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Lowercase ASCII slug of `text`, at most 48 characters.
fn slug(text: &str) -> String {
    let mut slug = String::new();
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
        if slug.len() >= 48 {
            break;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "topic".to_string()
    } else {
        slug.to_string()
    }
}

#[async_trait]
impl Gatherer for SimulatedGatherer {
    async fn gather(
        &self,
        task: &ResearchTask,
        brief: &ResearchBrief,
    ) -> Result<Vec<Evidence>, ResearchError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let topic = slug(&task.description);
        Ok((1..=self.results_per_task)
            .map(|n| {
                Evidence::new(
                    task.id.clone(),
                    format!("sim://{}/{}", topic, n),
                    format!(
                        "Simulated finding {} on \"{}\" in support of the goal \"{}\".",
                        n, task.description, brief.goal
                    ),
                )
                .with_title(format!("Simulated source {} for {}", n, task.id))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

// ============= Web =============

#[derive(Debug, Deserialize)]
struct SearchQueries {
    queries: Vec<String>,
}

const MAX_SEARCH_QUERIES: usize = 5;

const QUERY_SYSTEM: &str = "You are a search query generator helping a research agent. \
    Generate 3-5 focused web search queries for the subquestion. Respond with JSON only.";

/// Live web retrieval through a [`SearchProvider`].
///
/// With an LLM attached each task is first expanded into up to five focused
/// search queries; otherwise the task description is searched as-is. A task
/// fails only when every one of its queries failed.
pub struct WebSearchGatherer {
    search: Arc<dyn SearchProvider>,
    llm: Option<Arc<dyn LLMClient>>,
    results_per_query: usize,
}

impl WebSearchGatherer {
    pub fn new(search: Arc<dyn SearchProvider>, results_per_query: usize) -> Self {
        Self {
            search,
            llm: None,
            results_per_query: results_per_query.max(1),
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LLMClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    async fn search_queries(&self, task: &ResearchTask, brief: &ResearchBrief) -> Vec<String> {
        let Some(llm) = &self.llm else {
            return vec![task.description.clone()];
        };

        let prompt = format!(
            "Overall goal: {}\nConstraints: {}\n\nSubquestion:\n{}\n\nReturn JSON:\n{{ \"queries\": [\"...\", \"...\"] }}",
            brief.goal,
            brief.constraints.describe(),
            task.description
        );

        let queries = match llm.generate_with_system(QUERY_SYSTEM, &prompt).await {
            Ok(response) => parse_json_response::<SearchQueries>(&response)
                .map(|q| q.queries)
                .unwrap_or_default(),
            Err(e) => {
                tracing::warn!(task_id = %task.id, error = %e, "query expansion failed, searching task description");
                Vec::new()
            }
        };

        let mut queries: Vec<String> = queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .take(MAX_SEARCH_QUERIES)
            .collect();
        if queries.is_empty() {
            queries.push(task.description.clone());
        }
        queries
    }
}

#[async_trait]
impl Gatherer for WebSearchGatherer {
    async fn gather(
        &self,
        task: &ResearchTask,
        brief: &ResearchBrief,
    ) -> Result<Vec<Evidence>, ResearchError> {
        let queries = self.search_queries(task, brief).await;

        let mut evidence = Vec::new();
        let mut seen = HashSet::new();
        let mut last_error = None;
        let mut succeeded = 0usize;

        for query in &queries {
            match self.search.search(query, self.results_per_query).await {
                Ok(hits) => {
                    succeeded += 1;
                    for hit in hits {
                        if hit.url.is_empty() || !seen.insert(hit.url.clone()) {
                            continue;
                        }
                        let mut item = Evidence::new(task.id.clone(), hit.url, hit.snippet);
                        if !hit.title.is_empty() {
                            item = item.with_title(hit.title);
                        }
                        evidence.push(item);
                    }
                }
                Err(e) => {
                    tracing::warn!(task_id = %task.id, query = %query, error = %e, "search query failed");
                    last_error = Some(e.to_string());
                }
            }
        }

        if succeeded == 0 {
            return Err(ResearchError::gather(
                &task.id,
                last_error.unwrap_or_else(|| "no search queries to run".to_string()),
            ));
        }

        tracing::debug!(
            task_id = %task.id,
            provider = self.search.name(),
            queries = queries.len(),
            evidence = evidence.len(),
            "web gathering finished"
        );
        Ok(evidence)
    }

    fn name(&self) -> &str {
        "web"
    }
}
