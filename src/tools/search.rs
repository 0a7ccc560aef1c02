//! Web search backed by daedra
//!
//! [`SearchProvider`] is the seam the web gatherer searches through;
//! [`DuckDuckGoSearch`] implements it with the daedra crate, which uses
//! DuckDuckGo as the search backend.

use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run `query`, returning at most `limit` hits.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;

    fn name(&self) -> &str;
}

/// DuckDuckGo search via daedra.
#[derive(Debug, Default, Clone, Copy)]
pub struct DuckDuckGoSearch;

impl DuckDuckGoSearch {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput("Search query is empty".to_string()));
        }

        let search_args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results: limit,
                ..Default::default()
            }),
        };

        let response = daedra::tools::search::perform_search(&search_args)
            .await
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        Ok(response
            .data
            .iter()
            .take(limit)
            .map(|r| SearchHit {
                title: r.title.clone(),
                url: r.url.clone(),
                snippet: r.description.clone(),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}
