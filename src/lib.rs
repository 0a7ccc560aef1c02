//! # Delve - plan-then-execute research server
//!
//! Delve turns a free-text question into a cited research report. A run
//! decomposes the question into research tasks, gathers evidence for every
//! task concurrently, then synthesizes a report whose citations are exactly
//! the sources that were gathered.
//!
//! ## Overview
//!
//! Delve can be used in two ways:
//!
//! 1. **As a standalone server or CLI** - Run the `delve` binary
//! 2. **As a library** - Embed the research workflow in your own Rust project
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use delve::research::{ChannelObserver, ResearchOptions, ResearchOrchestrator, Session};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let orchestrator = Arc::new(ResearchOrchestrator::simulated(ResearchOptions::default()));
//!     let (observer, mut steps) = ChannelObserver::channel();
//!
//!     let query = Session::new().next_query("Impact of tariffs on semiconductor supply chains");
//!     let handle = orchestrator.start(query, observer);
//!
//!     while let Some(step) = steps.recv().await {
//!         println!("{}", step.summary());
//!     }
//!     let run = handle.wait().await.unwrap();
//!     println!("{}", run.report.unwrap().to_markdown());
//! }
//! ```
//!
//! ### Configuration-Driven Setup
//!
//! ```rust,ignore
//! use delve::{DelveConfigManager, research::ResearchOrchestrator};
//!
//! let config_manager = DelveConfigManager::new("delve.toml")?;
//! let orchestrator = ResearchOrchestrator::from_config(&config_manager.config()).await?;
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama local inference (default) |
//! | `openai` | OpenAI API support |
//! | `swagger-ui` | Interactive API documentation at `/swagger-ui` |
//!
//! ## Modules
//!
//! - [`research`] - Decomposer, gatherer, synthesizer and orchestrator
//! - [`api`] - REST API handlers and routes
//! - [`llm`] - LLM client implementations
//! - [`tools`] - Web search
//! - [`types`] - Common types and error handling
//! - [`utils`] - TOML configuration with hot reload

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// HTTP API handlers and routes.
pub mod api;
/// Command-line interface.
pub mod cli;
/// LLM provider clients and abstractions.
pub mod llm;
/// Plan-then-execute research workflow.
pub mod research;
/// Retrieval tools (web search).
pub mod tools;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;

// Re-export commonly used types
pub use llm::{LLMClient, Provider};
pub use research::{ResearchOptions, ResearchOrchestrator, WorkflowRun};
pub use types::{AppError, Result};
pub use utils::toml_config::{DelveConfig, DelveConfigManager};

use parking_lot::Mutex;
use research::{ActiveRuns, RunArchive, Session};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// TOML-based configuration with hot-reload support
    pub config_manager: Arc<DelveConfigManager>,
    /// Query numbering
    pub session: Arc<Session>,
    /// Cancellation tokens of runs in flight
    pub active_runs: Arc<ActiveRuns>,
    /// Recently finished runs
    pub archive: Arc<RunArchive>,
    /// Orchestrator plus the config snapshot it was wired from
    pipeline: Arc<Mutex<(Arc<DelveConfig>, Arc<ResearchOrchestrator>)>>,
}

impl AppState {
    /// `orchestrator` is used until the configuration is reloaded.
    pub fn new(
        config_manager: Arc<DelveConfigManager>,
        orchestrator: Arc<ResearchOrchestrator>,
    ) -> Self {
        let config = config_manager.config();
        Self {
            session: Arc::new(Session::new()),
            active_runs: Arc::new(ActiveRuns::new()),
            archive: Arc::new(RunArchive::new(config.research.archive_capacity)),
            pipeline: Arc::new(Mutex::new((config, orchestrator))),
            config_manager,
        }
    }

    /// The orchestrator for new runs, rewired if the configuration changed
    /// since it was built. Runs in flight keep the orchestrator they started with.
    pub async fn orchestrator(&self) -> Result<Arc<ResearchOrchestrator>> {
        let config = self.config_manager.config();
        {
            let pipeline = self.pipeline.lock();
            if Arc::ptr_eq(&pipeline.0, &config) {
                return Ok(Arc::clone(&pipeline.1));
            }
        }

        let rebuilt = Arc::new(ResearchOrchestrator::from_config(&config).await?);
        tracing::info!(pipeline = %rebuilt.describe(), "Research pipeline rewired after config reload");
        *self.pipeline.lock() = (config, Arc::clone(&rebuilt));
        Ok(rebuilt)
    }
}
