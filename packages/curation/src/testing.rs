//! Hand-written mocks for the external seams.
//!
//! Each mock tracks its calls so tests can assert on interaction counts
//! and arguments, not just return values.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CurationError, Result};
use crate::review::{ReviewBoard, ReviewCard};
use crate::traits::llm::Llm;
use crate::traits::source::DocumentSource;
use crate::types::dimensions::{
    Assessment, Carrier, ContactLevel, Directionality, EpistemicProfile, Formalizability,
    KnowledgeForm, Temporality,
};
use crate::types::evidence::Snapshot;

/// A fully-confident epistemic profile for test findings.
pub fn confident_profile() -> EpistemicProfile {
    EpistemicProfile {
        knowledge_form: Assessment::new(KnowledgeForm::Inferred, 0.95, "documented"),
        contact: Assessment::new(ContactLevel::Mediated, 0.9, "instrumented"),
        directionality: Assessment::new(Directionality::Forward, 0.95, "causal"),
        temporality: Assessment::new(Temporality::Sequence, 0.95, "ordered"),
        formalizability: Assessment::new(Formalizability::Portable, 0.98, "specified"),
        carrier: Assessment::new(Carrier::Artifact, 0.95, "written"),
    }
}

/// A scripted LLM that returns a fixed response.
pub struct MockLlm {
    response: String,
    delay: Option<Duration>,
    fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl MockLlm {
    /// A mock that always returns `response`.
    pub fn returning(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            delay: None,
            fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A mock that always fails.
    pub fn failing() -> Self {
        Self {
            response: String::new(),
            delay: None,
            fail: true,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before responding, for timeout tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// The prompts received, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Llm for MockLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(CurationError::Llm("mock llm failure".into()));
        }
        Ok(self.response.clone())
    }
}

/// A document source serving canned pages, with optional injected
/// failures for retry tests.
pub struct MockSource {
    pages: HashMap<String, String>,
    fail_remaining: Mutex<u32>,
    fetches: Mutex<Vec<String>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            fail_remaining: Mutex::new(0),
            fetches: Mutex::new(Vec::new()),
        }
    }

    /// Serve `content` at `url`.
    pub fn with_page(mut self, url: impl Into<String>, content: impl Into<String>) -> Self {
        self.pages.insert(url.into(), content.into());
        self
    }

    /// Fail the next `n` fetches before succeeding.
    pub fn failing_times(self, n: u32) -> Self {
        *self.fail_remaining.lock().unwrap() = n;
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentSource for MockSource {
    async fn fetch(&self, url: &str) -> Result<Snapshot> {
        self.fetches.lock().unwrap().push(url.to_string());

        {
            let mut remaining = self.fail_remaining.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(CurationError::Fetch {
                    url: url.to_string(),
                    message: "injected failure".to_string(),
                });
            }
        }

        match self.pages.get(url) {
            Some(content) => Ok(Snapshot::capture(url, content.clone())),
            None => Err(CurationError::Fetch {
                url: url.to_string(),
                message: "404 not found".to_string(),
            }),
        }
    }
}

/// A review board that collects published cards.
#[derive(Default)]
pub struct MockBoard {
    cards: Mutex<Vec<ReviewCard>>,
}

impl MockBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cards(&self) -> Vec<ReviewCard> {
        self.cards.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReviewBoard for MockBoard {
    async fn publish(&self, card: &ReviewCard) -> Result<()> {
        self.cards.lock().unwrap().push(card.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_llm_tracks_prompts() {
        let llm = MockLlm::returning("ok");
        llm.complete("first").await.unwrap();
        llm.complete("second").await.unwrap();
        assert_eq!(llm.call_count(), 2);
        assert_eq!(llm.prompts(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_mock_source_fails_then_serves() {
        let source = MockSource::new()
            .with_page("https://d/imu", "imu docs")
            .failing_times(2);

        assert!(source.fetch("https://d/imu").await.is_err());
        assert!(source.fetch("https://d/imu").await.is_err());
        let snapshot = source.fetch("https://d/imu").await.unwrap();
        assert_eq!(snapshot.payload, "imu docs");
        assert_eq!(source.fetch_count(), 3);
    }
}
