//! LLM Provider Clients and Abstractions
//!
//! This module provides a unified interface for the language model that backs
//! the model-driven research strategies. Provider-specific implementations sit
//! behind the [`LLMClient`] trait so the decomposer and synthesizer work with
//! any supported backend.
//!
//! # Supported Providers
//!
//! Enable providers via Cargo features:
//! - `ollama` - Local Ollama server (default)
//! - `openai` - OpenAI API and compatible endpoints
//!
//! # Example
//!
//! ```ignore
//! use delve::llm::Provider;
//!
//! let provider = Provider::Ollama {
//!     base_url: "http://localhost:11434".to_string(),
//!     model: "llama3.2".to_string(),
//! };
//! let client = provider.create_client().await?;
//! let answer = client.generate("What is 2+2?").await?;
//! ```

/// Core LLM client trait, provider selection and JSON response parsing.
pub mod client;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

pub use client::{LLMClient, Provider, parse_json_response};
