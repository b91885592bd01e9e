// src/sentiment/reconcile.rs
//! Score reconciliation: fold one text's raw (label, score) pairs into a distribution
//! over the canonical labels that sums to 1.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::labels::{map_label, Id2Label, Label, MappedLabel, LABELS};

/// One raw entry as emitted by a classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawScore {
    pub label: String,
    pub score: f64,
}

impl RawScore {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Final per-text result.
///
/// `scores` always holds the three canonical labels. It can hold more keys only when a
/// model `id2label` entry maps to a non-canonical name (see `MappedLabel::Passthrough`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentOutput {
    pub label: String,
    pub scores: BTreeMap<String, f64>,
}

impl SentimentOutput {
    /// Build from canonical scores already summing to 1.
    pub fn from_canonical(scores: [f64; 3]) -> Self {
        let label = argmax(&scores, &[]).to_string();
        let scores = LABELS
            .into_iter()
            .map(|l| (l.as_str().to_string(), scores[l.index()]))
            .collect();
        Self { label, scores }
    }

    pub fn score(&self, label: Label) -> f64 {
        self.scores.get(label.as_str()).copied().unwrap_or(0.0)
    }

    /// Predicted label if it is one of the canonical three.
    pub fn canonical_label(&self) -> Option<Label> {
        Label::from_canonical(&self.label)
    }

    pub fn total(&self) -> f64 {
        self.scores.values().sum()
    }
}

fn sanitize(score: f64) -> f64 {
    if score.is_finite() && score > 0.0 {
        score
    } else {
        0.0
    }
}

/// Highest score wins; ties go to the canonical enumeration order, then to the order
/// extra labels were first seen.
fn argmax<'a>(canonical: &[f64; 3], extra: &'a [(String, f64)]) -> &'a str {
    let mut best_name: &str = LABELS[0].as_str();
    let mut best = canonical[0];
    for l in LABELS.into_iter().skip(1) {
        if canonical[l.index()] > best {
            best = canonical[l.index()];
            best_name = l.as_str();
        }
    }
    for (name, v) in extra {
        if *v > best {
            best = *v;
            best_name = name.as_str();
        }
    }
    best_name
}

/// Canonicalize, accumulate duplicates, fill missing labels with 0 and renormalize.
///
/// A zero total is treated as 1, which leaves an all-zero distribution.
/// Negative or non-finite raw scores count as 0.
pub fn reconcile(raw: &[RawScore], id2label: Option<&Id2Label>) -> SentimentOutput {
    let mut canonical = [0.0f64; 3];
    let mut extra: Vec<(String, f64)> = Vec::new();

    for item in raw {
        let score = sanitize(item.score);
        match map_label(&item.label, id2label) {
            MappedLabel::Canonical(l) => canonical[l.index()] += score,
            MappedLabel::Passthrough(name) => match extra.iter_mut().find(|(n, _)| *n == name) {
                Some((_, v)) => *v += score,
                None => extra.push((name, score)),
            },
        }
    }

    let mut total: f64 = canonical.iter().sum::<f64>() + extra.iter().map(|(_, v)| v).sum::<f64>();
    if total == 0.0 {
        total = 1.0;
    }
    for v in canonical.iter_mut() {
        *v /= total;
    }
    for (_, v) in extra.iter_mut() {
        *v /= total;
    }

    let label = argmax(&canonical, &extra).to_string();
    let mut scores: BTreeMap<String, f64> = LABELS
        .into_iter()
        .map(|l| (l.as_str().to_string(), canonical[l.index()]))
        .collect();
    scores.extend(extra);

    SentimentOutput { label, scores }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_break_in_enumeration_order() {
        let out = reconcile(
            &[RawScore::new("negative", 0.5), RawScore::new("neutral", 0.5)],
            None,
        );
        assert_eq!(out.label, "neutral");
    }

    #[test]
    fn bad_scores_count_as_zero() {
        let out = reconcile(
            &[
                RawScore::new("positive", f64::NAN),
                RawScore::new("negative", -3.0),
                RawScore::new("neutral", 2.0),
            ],
            None,
        );
        assert_eq!(out.score(Label::Neutral), 1.0);
        assert_eq!(out.score(Label::Positive), 0.0);
    }

    #[test]
    fn from_canonical_fills_all_keys() {
        let out = SentimentOutput::from_canonical([0.2, 0.5, 0.3]);
        assert_eq!(out.label, "neutral");
        assert_eq!(out.scores.len(), 3);
        assert_eq!(out.canonical_label(), Some(Label::Neutral));
    }
}
