//! LLM Client abstractions and provider management
//!
//! The research workflow talks to a language model in two places: the
//! model-driven decomposer (clarify + plan) and the model-driven synthesizer
//! (per-task summaries + executive summary). Both go through [`LLMClient`]:
//! - **Ollama**: local inference (feature `ollama`, default)
//! - **OpenAI**: OpenAI and compatible endpoints (feature `openai`)

use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Generic LLM client trait for provider abstraction
///
/// All LLM providers implement this trait, allowing for easy swapping
/// between providers without changing the research strategies.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a completion from a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate with system prompt
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI API provider (including Azure OpenAI and compatible APIs)
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::OpenAI {
    ///     api_key: "sk-...".to_string(),
    ///     api_base: "https://api.openai.com/v1".to_string(),
    ///     model: "gpt-4o-mini".to_string(),
    /// };
    /// ```
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
    },

    /// Ollama local LLM provider
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::Ollama {
    ///     base_url: "http://localhost:11434".to_string(),
    ///     model: "llama3.2".to_string(),
    /// };
    /// ```
    Ollama { base_url: String, model: String },
}

impl Provider {
    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns an error if the provider's cargo feature is not compiled in
    /// or the client cannot be constructed.
    pub async fn create_client(&self) -> Result<Arc<dyn LLMClient>> {
        match self {
            #[cfg(feature = "openai")]
            Provider::OpenAI {
                api_key,
                api_base,
                model,
            } => Ok(Arc::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
            ))),

            #[cfg(feature = "ollama")]
            Provider::Ollama { base_url, model } => Ok(Arc::new(
                super::ollama::OllamaClient::new(base_url.clone(), model.clone()).await?,
            )),

            #[allow(unreachable_patterns)]
            other => Err(AppError::LLM(format!(
                "{} provider is not compiled in; rebuild with `--features {}`",
                other.name(),
                other.feature()
            ))),
        }
    }

    /// Check if this provider's feature is compiled in
    pub fn is_enabled(&self) -> bool {
        match self {
            Provider::OpenAI { .. } => cfg!(feature = "openai"),
            Provider::Ollama { .. } => cfg!(feature = "ollama"),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
        }
    }

    /// Model identifier configured for this provider
    pub fn model(&self) -> &str {
        match self {
            Provider::OpenAI { model, .. } | Provider::Ollama { model, .. } => model,
        }
    }

    fn feature(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "openai",
            Provider::Ollama { .. } => "ollama",
        }
    }
}

/// Parse a JSON object out of a model response.
///
/// Models asked for "only JSON" still wrap it in prose or code fences now and
/// then, so when the whole response does not parse we retry on the slice
/// between the outermost braces.
pub fn parse_json_response<T: DeserializeOwned>(content: &str) -> Option<T> {
    if let Ok(value) = serde_json::from_str(content.trim()) {
        return Some(value);
    }

    let first = content.find('{')?;
    let last = content.rfind('}')?;
    if last <= first {
        return None;
    }
    serde_json::from_str(&content[first..=last]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Queries {
        queries: Vec<String>,
    }

    #[test]
    fn test_provider_name() {
        let openai = Provider::OpenAI {
            api_key: "".to_string(),
            api_base: "".to_string(),
            model: "".to_string(),
        };
        assert_eq!(openai.name(), "OpenAI");

        let ollama = Provider::Ollama {
            base_url: "".to_string(),
            model: "llama3.2".to_string(),
        };
        assert_eq!(ollama.name(), "Ollama");
        assert_eq!(ollama.model(), "llama3.2");
    }

    #[cfg(not(feature = "openai"))]
    #[tokio::test]
    async fn test_disabled_provider_returns_helpful_error() {
        let provider = Provider::OpenAI {
            api_key: "test-key".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
        };
        assert!(!provider.is_enabled());

        // Use match instead of unwrap_err since Arc<dyn LLMClient> doesn't implement Debug
        let err = match provider.create_client().await {
            Ok(_) => panic!("Expected error"),
            Err(e) => e.to_string(),
        };
        assert!(err.contains("--features openai"));
    }

    #[test]
    fn test_parse_plain_json() {
        let parsed: Queries = parse_json_response(r#"{"queries": ["a", "b"]}"#).unwrap();
        assert_eq!(parsed.queries, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_json_wrapped_in_prose() {
        let content = "Sure! Here you go:\n```json\n{\"queries\": [\"tariffs\"]}\n```\nHope it helps.";
        let parsed: Queries = parse_json_response(content).unwrap();
        assert_eq!(parsed.queries, vec!["tariffs"]);
    }

    #[test]
    fn test_parse_json_garbage() {
        assert!(parse_json_response::<Queries>("no json here").is_none());
        assert!(parse_json_response::<Queries>("} backwards {").is_none());
    }
}
