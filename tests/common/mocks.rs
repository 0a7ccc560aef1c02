//! Mock strategies shared by the integration tests.
//!
//! Every mock is deterministic so scenarios can assert exact task, evidence
//! and citation outcomes without network access or a model.

use async_trait::async_trait;
use delve::llm::LLMClient;
use delve::research::{
    Decomposer, Evidence, Gatherer, Query, ResearchBrief, ResearchError, ResearchPlan,
    ResearchTask, Report, SynthesisInput, Synthesizer, TaskDraft, TemplateSynthesizer,
};
use delve::types::{AppError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// LLM client returning a fixed response, or always failing.
#[derive(Clone)]
pub struct MockLLMClient {
    response: String,
    should_fail: bool,
}

impl MockLLMClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            should_fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            response: String::new(),
            should_fail: true,
        }
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        if self.should_fail {
            return Err(AppError::LLM("Mock LLM failure".to_string()));
        }
        Ok(self.response.clone())
    }

    async fn generate_with_system(&self, _system: &str, _prompt: &str) -> Result<String> {
        self.generate("").await
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

/// Decomposer producing the same descriptions for every non-blank query.
pub struct FixedDecomposer {
    descriptions: Vec<String>,
}

impl FixedDecomposer {
    pub fn new(descriptions: &[&str]) -> Self {
        Self {
            descriptions: descriptions.iter().map(|d| d.to_string()).collect(),
        }
    }

    /// The three-task tariff plan used by most scenarios.
    pub fn tariffs() -> Self {
        Self::new(&[
            "Current tariff measures on semiconductors",
            "Supplier relocation in response to tariffs",
            "Price effects on downstream manufacturers",
        ])
    }
}

#[async_trait]
impl Decomposer for FixedDecomposer {
    async fn decompose(&self, query: &Query) -> std::result::Result<ResearchPlan, ResearchError> {
        if query.is_blank() {
            return Err(ResearchError::EmptyQuery);
        }
        let drafts = self
            .descriptions
            .iter()
            .enumerate()
            .map(|(i, d)| TaskDraft::new(d.clone(), i as u32 + 1))
            .collect();
        Ok(ResearchPlan::from_drafts(
            ResearchBrief::from_query(query),
            drafts,
            self.descriptions.len(),
        ))
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// What a [`ScriptedGatherer`] does for one task.
#[derive(Debug, Clone)]
pub enum Script {
    /// Return evidence from these source ids.
    Sources(Vec<&'static str>),
    /// Fail with this cause.
    Fail(&'static str),
}

/// Gatherer answering per task description, after an optional delay.
pub struct ScriptedGatherer {
    scripts: HashMap<String, Script>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedGatherer {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn script(mut self, description: &str, script: Script) -> Self {
        self.scripts.insert(description.to_string(), script);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Gatherer for ScriptedGatherer {
    async fn gather(
        &self,
        task: &ResearchTask,
        _brief: &ResearchBrief,
    ) -> std::result::Result<Vec<Evidence>, ResearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.scripts.get(&task.description) {
            Some(Script::Sources(sources)) => Ok(sources
                .iter()
                .map(|s| Evidence::new(task.id.clone(), *s, format!("Finding from {}", s)))
                .collect()),
            Some(Script::Fail(cause)) => Err(ResearchError::gather(&task.id, *cause)),
            None => Ok(Vec::new()),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Template synthesizer that counts how often it is invoked.
#[derive(Default)]
pub struct CountingSynthesizer {
    calls: AtomicUsize,
}

impl CountingSynthesizer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Synthesizer for CountingSynthesizer {
    async fn synthesize(&self, input: &SynthesisInput) -> std::result::Result<Report, ResearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        TemplateSynthesizer.synthesize(input).await
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// T1 yields two sources, T2 fails, T3 yields one source.
pub fn tariff_gatherer() -> ScriptedGatherer {
    ScriptedGatherer::new()
        .script(
            "Current tariff measures on semiconductors",
            Script::Sources(vec!["https://trade.example/tariffs", "https://news.example/chips"]),
        )
        .script(
            "Supplier relocation in response to tariffs",
            Script::Fail("search backend unavailable"),
        )
        .script(
            "Price effects on downstream manufacturers",
            Script::Sources(vec!["https://econ.example/prices"]),
        )
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
