// src/sentiment/mock.rs
//! Deterministic mock for tests and environments without a model.
//!
//! Each text's distribution depends only on a SHA-256 of the text, so results are
//! stable across batch sizes, call order and process restarts.

use async_trait::async_trait;
use metrics::counter;
use sha2::{Digest, Sha256};
use tracing::info;

use super::reconcile::SentimentOutput;
use super::SentimentService;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct MockSentimentService;

impl MockSentimentService {
    pub fn new() -> Self {
        Self
    }
}

/// Stable value in [0, 1) derived from the text.
fn text_unit(text: &str) -> f64 {
    let digest = Sha256::digest(text.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(head) % 1000) as f64 / 1000.0
}

/// Small variations around an even split.
pub fn mock_scores(text: &str) -> SentimentOutput {
    let h = text_unit(text);
    let pos = 0.33 + (h - 0.5) * 0.02;
    let neg = 0.33 - (h - 0.5) * 0.01;
    let neu = (1.0 - pos - neg).max(0.0);
    SentimentOutput::from_canonical([pos, neu, neg])
}

#[async_trait]
impl SentimentService for MockSentimentService {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn warmup(&self) {
        info!("MockSentimentService warmup completed");
    }

    async fn predict(&self, texts: &[String], _batch_size: usize) -> Result<Vec<SentimentOutput>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        counter!("inference_texts_total", "service" => self.name()).increment(texts.len() as u64);
        Ok(texts.iter().map(|t| mock_scores(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_is_in_range_and_stable() {
        for t in ["", "a", "Stocks rally", "same text"] {
            let h = text_unit(t);
            assert!((0.0..1.0).contains(&h));
            assert_eq!(h, text_unit(t));
        }
    }

    #[test]
    fn mock_scores_sum_to_one() {
        let out = mock_scores("Company misses revenue estimates");
        assert!((out.total() - 1.0).abs() < 1e-9);
        assert_eq!(out.scores.len(), 3);
    }
}
