//! LLM seam for the extractor.
//!
//! The pipeline treats inference as a black-box text-completion service:
//! prompt in, free-form text out. Everything returned is defensively parsed
//! at the extractor boundary; implementations never shape pipeline state.

use async_trait::async_trait;

use crate::error::Result;

/// A black-box text-completion service.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Complete a prompt, returning the raw model output.
    async fn complete(&self, prompt: &str) -> Result<String>;
}
