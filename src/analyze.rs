// src/analyze.rs
//! End-to-end flow: raw payloads → pipeline → predict on survivors → results zipped
//! back with the Document they came from.

use serde::Serialize;
use tracing::{debug, warn};

use crate::document::Document;
use crate::error::{Error, Result};
use crate::preprocess::{Payload, Pipeline};
use crate::sentiment::{SentimentOutput, SentimentService};

#[derive(Debug, Clone, Serialize)]
pub struct ScoredDocument {
    #[serde(flatten)]
    pub document: Document,
    pub sentiment: SentimentOutput,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub results: Vec<ScoredDocument>,
    /// Payloads a step dropped.
    pub dropped: usize,
}

/// Run one batch. The pipeline is consumed so its dedup state cannot leak into
/// another run.
pub async fn analyze_payloads<I>(
    pipeline: Pipeline,
    service: &dyn SentimentService,
    payloads: I,
    batch_size: usize,
) -> Result<AnalysisReport>
where
    I: IntoIterator,
    I::Item: Into<Payload>,
{
    let mut pipeline = pipeline;
    let mut seen = 0usize;
    let mut docs: Vec<Document> = Vec::new();
    for p in payloads {
        seen += 1;
        if let Some(doc) = pipeline.process_one(p)? {
            docs.push(doc);
        }
    }
    drop(pipeline);
    let dropped = seen - docs.len();
    debug!(seen, kept = docs.len(), dropped, "preprocessing finished");

    let texts: Vec<String> = docs.iter().map(|d| d.text().to_string()).collect();
    let outputs = service.predict(&texts, batch_size).await?;
    if outputs.len() != docs.len() {
        warn!(
            service = service.name(),
            expected = docs.len(),
            got = outputs.len(),
            "predict returned a mismatched number of results"
        );
        return Err(Error::Inference);
    }

    let results = docs
        .into_iter()
        .zip(outputs)
        .map(|(document, sentiment)| ScoredDocument {
            document,
            sentiment,
        })
        .collect();

    Ok(AnalysisReport { results, dropped })
}
