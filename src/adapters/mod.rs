//! Adapter interfaces for external systems.
//!
//! Adapters provide a unified interface to the generative-text service.
//! The pipeline only ever sees the [`Adapter`] trait; tests substitute a
//! scripted implementation.

pub mod llm;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

pub use llm::{LlmAdapter, Provider};

/// Output from an adapter execution
#[derive(Debug, Clone)]
pub struct AdapterOutput {
    /// The content returned by the adapter
    pub content: String,

    /// Tokens used (if available)
    pub tokens_used: Option<u64>,

    /// Provider that produced the content (if known)
    pub provider: Option<String>,
}

impl AdapterOutput {
    /// Create a new adapter output with just content
    pub fn new(content: String) -> Self {
        Self {
            content,
            tokens_used: None,
            provider: None,
        }
    }
}

/// Trait for external adapters
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Execute an action (the step key) with a rendered prompt
    async fn execute(&self, action: &str, input: &str, timeout: Duration) -> Result<AdapterOutput>;

    /// Check that the adapter can serve requests
    async fn health_check(&self) -> Result<()>;
}
