// src/preprocess.rs
//! Composable preprocessing pipeline for Documents.
//!
//! A step receives a Document by value and returns `Outcome::Keep(doc)` (possibly the very
//! same instance) or `Outcome::Drop(doc)` with the document it rejected. The pipeline applies
//! steps in order and stops at the first drop. Steps never mutate a Document in place; they
//! build a new one.
//!
//! Default order: whitespace → empty filter → truncation → dedup. Whitespace must be
//! collapsed before the emptiness/length checks, and truncation must run before dedup
//! so texts that only match after truncation are caught.

use std::collections::HashSet;
use std::num::NonZeroUsize;

use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::DEFAULT_MAX_TEXT_LENGTH;
use crate::document::{text_hash, Document};
use crate::error::{Error, Result};

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Result of one step. A dropped document is handed back as the step received it.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Keep(Document),
    Drop(Document),
}

impl Outcome {
    pub fn into_kept(self) -> Option<Document> {
        match self {
            Outcome::Keep(doc) => Some(doc),
            Outcome::Drop(_) => None,
        }
    }
}

/// Single ordered transformation/filter.
pub trait Step: Send {
    /// Label used in logs and the `preprocess_dropped_total{step}` counter.
    fn name(&self) -> &'static str;
    fn run(&mut self, doc: Document) -> Outcome;

    /// `Some(doc)` to keep, `None` when dropped.
    fn apply(&mut self, doc: Document) -> Option<Document> {
        self.run(doc).into_kept()
    }
}

/// Raw pipeline input: an already-built Document or a JSON value that should be an object.
#[derive(Debug, Clone)]
pub enum Payload {
    Document(Document),
    Raw(Value),
}

impl From<Document> for Payload {
    fn from(d: Document) -> Self {
        Payload::Document(d)
    }
}

impl From<Value> for Payload {
    fn from(v: Value) -> Self {
        Payload::Raw(v)
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(m: Map<String, Value>) -> Self {
        Payload::Raw(Value::Object(m))
    }
}

impl Payload {
    /// Coerce into a Document. Non-object JSON values are rejected.
    pub fn into_document(self) -> Result<Document> {
        match self {
            Payload::Document(d) => Ok(d),
            Payload::Raw(Value::Object(map)) => Document::from_map(&map),
            Payload::Raw(other) => Err(Error::UnsupportedPayload {
                kind: json_kind(&other),
            }),
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/* ----------------------------
Standard steps
---------------------------- */

/// Collapse whitespace runs to one space and trim.
///
/// Returns the input untouched when nothing changes. Whitespace-only text is passed
/// through as-is: emptying it would break the non-empty text invariant, and dropping is
/// `DropEmptyText`'s job.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeWhitespace;

impl Step for NormalizeWhitespace {
    fn name(&self) -> &'static str {
        "normalize_whitespace"
    }

    fn run(&mut self, doc: Document) -> Outcome {
        let normalized = {
            let collapsed = RE_WS.replace_all(doc.text(), " ");
            let trimmed = collapsed.trim();
            if trimmed.is_empty() || trimmed == doc.text() {
                None
            } else {
                Some(trimmed.to_string())
            }
        };
        match normalized {
            Some(text) => Outcome::Keep(doc.replace_text(text)),
            None => Outcome::Keep(doc),
        }
    }
}

/// Keep at most `max_len` characters (not bytes, not word boundaries).
///
/// The limit is non-zero so a truncated Document keeps non-empty text.
#[derive(Debug, Clone, Copy)]
pub struct TruncateText {
    max_len: NonZeroUsize,
}

impl TruncateText {
    pub fn new(max_len: NonZeroUsize) -> Self {
        Self { max_len }
    }

    /// `None` for a limit of 0.
    pub fn try_new(max_len: usize) -> Option<Self> {
        NonZeroUsize::new(max_len).map(Self::new)
    }

    pub fn max_len(&self) -> usize {
        self.max_len.get()
    }
}

impl Step for TruncateText {
    fn name(&self) -> &'static str {
        "truncate_text"
    }

    fn run(&mut self, doc: Document) -> Outcome {
        let cut = doc.text().char_indices().nth(self.max_len()).map(|(i, _)| i);
        match cut {
            None => Outcome::Keep(doc),
            Some(byte_idx) => {
                let head = doc.text()[..byte_idx].to_string();
                Outcome::Keep(doc.replace_text(head))
            }
        }
    }
}

/// Drop documents whose trimmed text has fewer than `min_len` characters.
#[derive(Debug, Clone, Copy)]
pub struct DropEmptyText {
    min_len: usize,
}

impl DropEmptyText {
    pub fn new(min_len: usize) -> Self {
        Self { min_len }
    }
}

impl Default for DropEmptyText {
    fn default() -> Self {
        Self { min_len: 1 }
    }
}

impl Step for DropEmptyText {
    fn name(&self) -> &'static str {
        "drop_empty_text"
    }

    fn run(&mut self, doc: Document) -> Outcome {
        if doc.text().trim().chars().count() < self.min_len {
            return Outcome::Drop(doc);
        }
        Outcome::Keep(doc)
    }
}

/// Re-normalize the ticker for pipelines fed with pre-built Documents.
/// Construction already does this, so on those it is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct UppercaseTicker;

impl Step for UppercaseTicker {
    fn name(&self) -> &'static str {
        "uppercase_ticker_if_present"
    }

    fn run(&mut self, doc: Document) -> Outcome {
        let normalized = match doc.ticker() {
            Some(t) if t.trim().to_uppercase() != t => Some(t.to_string()),
            _ => None,
        };
        match normalized {
            Some(t) => Outcome::Keep(doc.with_ticker(Some(t))),
            None => Outcome::Keep(doc),
        }
    }
}

/// Drop second and later documents with the same trimmed text.
///
/// The seen-set lives as long as this step (one pipeline instance). Documents with
/// blank trimmed text are never deduplicated.
#[derive(Debug, Clone, Default)]
pub struct DeduplicateByText {
    seen: HashSet<String>,
}

impl DeduplicateByText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }
}

impl Step for DeduplicateByText {
    fn name(&self) -> &'static str {
        "deduplicate_by_text"
    }

    fn run(&mut self, doc: Document) -> Outcome {
        let key = doc.text().trim();
        if key.is_empty() {
            return Outcome::Keep(doc);
        }
        if self.seen.contains(key) {
            return Outcome::Drop(doc);
        }
        self.seen.insert(key.to_string());
        Outcome::Keep(doc)
    }
}

/// Adapter turning a closure into a step.
pub struct FnStep<F> {
    name: &'static str,
    f: F,
}

pub fn from_fn<F>(name: &'static str, f: F) -> FnStep<F>
where
    F: FnMut(Document) -> Outcome + Send,
{
    FnStep { name, f }
}

impl<F> Step for FnStep<F>
where
    F: FnMut(Document) -> Outcome + Send,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn run(&mut self, doc: Document) -> Outcome {
        (self.f)(doc)
    }
}

/* ----------------------------
Pipeline
---------------------------- */

/// Ordered sequence of steps. Stateful steps (dedup) make an instance single-run:
/// build a fresh pipeline per batch/request and do not share it across threads.
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn Step>>,
}

impl Pipeline {
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self { steps }
    }

    pub fn with_step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Coerce `payload` into a Document and run every step.
    /// `Ok(None)` means a step dropped it; `Err` means the payload was unusable.
    pub fn process_one(&mut self, payload: impl Into<Payload>) -> Result<Option<Document>> {
        let mut doc = payload.into().into_document()?;
        counter!("preprocess_documents_total").increment(1);

        for step in self.steps.iter_mut() {
            match step.run(doc) {
                Outcome::Keep(next) => doc = next,
                Outcome::Drop(dropped) => {
                    debug!(
                        step = step.name(),
                        doc_id = %dropped.id(),
                        text_hash = %text_hash(dropped.text()),
                        "document dropped"
                    );
                    counter!("preprocess_dropped_total", "step" => step.name()).increment(1);
                    return Ok(None);
                }
            }
        }
        Ok(Some(doc))
    }

    /// Eager variant: surviving Documents in input order. Stops at the first bad payload.
    pub fn process_many<I>(&mut self, payloads: I) -> Result<Vec<Document>>
    where
        I: IntoIterator,
        I::Item: Into<Payload>,
    {
        let mut out = Vec::new();
        for p in payloads {
            if let Some(doc) = self.process_one(p)? {
                out.push(doc);
            }
        }
        Ok(out)
    }

    /// Lazy variant of `process_many`.
    pub fn process_iter<'a, I>(
        &'a mut self,
        payloads: I,
    ) -> impl Iterator<Item = Result<Document>> + 'a
    where
        I: IntoIterator + 'a,
        I::Item: Into<Payload>,
        I::IntoIter: 'a,
    {
        payloads
            .into_iter()
            .filter_map(move |p| self.process_one(p).transpose())
    }
}

const DEFAULT_TRUNCATE_LEN: NonZeroUsize = match NonZeroUsize::new(DEFAULT_MAX_TEXT_LENGTH) {
    Some(n) => n,
    None => panic!("DEFAULT_MAX_TEXT_LENGTH must be non-zero"),
};

/// normalize_whitespace → drop_empty_text(1) → truncate_text(max_text_length) → deduplicate_by_text.
///
/// A `max_text_length` of 0 falls back to `DEFAULT_MAX_TEXT_LENGTH`, as the config layer does.
/// Ticker normalization is left to Document construction.
pub fn default_pipeline(max_text_length: usize) -> Pipeline {
    let max_len = NonZeroUsize::new(max_text_length).unwrap_or(DEFAULT_TRUNCATE_LEN);
    Pipeline::default()
        .with_step(NormalizeWhitespace)
        .with_step(DropEmptyText::new(1))
        .with_step(TruncateText::new(max_len))
        .with_step(DeduplicateByText::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::new("news", text).unwrap()
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        let mut step = TruncateText::try_new(3).unwrap();
        let out = step.apply(doc("žluťoučký")).unwrap();
        assert_eq!(out.text(), "žlu");
    }

    #[test]
    fn truncate_rejects_zero_limit() {
        assert!(TruncateText::try_new(0).is_none());

        let mut one = TruncateText::try_new(1).unwrap();
        assert_eq!(one.apply(doc("abc")).unwrap().text(), "a");

        let mut pl = default_pipeline(0);
        let long = "x".repeat(DEFAULT_MAX_TEXT_LENGTH + 10);
        let out = pl.process_one(doc(&long)).unwrap().unwrap();
        assert_eq!(out.text().chars().count(), DEFAULT_MAX_TEXT_LENGTH);
    }

    #[test]
    fn default_pipeline_order_is_fixed() {
        let pl = default_pipeline(10);
        assert_eq!(
            pl.step_names(),
            vec![
                "normalize_whitespace",
                "drop_empty_text",
                "truncate_text",
                "deduplicate_by_text"
            ]
        );
    }

    #[test]
    fn dedup_tracks_only_non_blank_keys() {
        let mut step = DeduplicateByText::new();
        assert!(step.apply(doc("  ")).is_some());
        assert!(step.apply(doc("x")).is_some());
        assert_eq!(step.seen_len(), 1);
    }

    #[test]
    fn closure_steps_participate() {
        let mut pl = Pipeline::default().with_step(from_fn("drop_all", Outcome::Drop));
        assert!(pl.process_one(doc("hi")).unwrap().is_none());
    }

    #[test]
    fn filters_hand_back_the_rejected_document() {
        let mut empty = DropEmptyText::default();
        let blank = doc("   ");
        assert_eq!(empty.run(blank.clone()), Outcome::Drop(blank));

        let mut dedup = DeduplicateByText::new();
        let first = doc("Dow closes higher");
        let second = doc("Dow closes higher");
        assert_eq!(dedup.run(first.clone()), Outcome::Keep(first));
        assert_eq!(dedup.run(second.clone()), Outcome::Drop(second));
        assert_eq!(dedup.seen_len(), 1);
    }
}
