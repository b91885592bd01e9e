// src/sentiment/labels.rs
//! Canonical three-class taxonomy and the mapping from raw classifier labels onto it.
//!
//! Checked in order, case-insensitive, first match wins:
//! 1. blank → neutral
//! 2. `label_<n>` → model `id2label[n]` if present, else {0: positive, 1: negative, 2: neutral},
//!    unknown index or malformed `<n>` → neutral
//! 3. `pos` / `+` → positive, `neg` / `-` → negative
//! 4. exact canonical name
//! 5. canonical name contained in the raw label (positive, neutral, negative order)
//! 6. neutral

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Positive,
    Neutral,
    Negative,
}

/// Fixed enumeration order; also the tie-break order for the predicted label.
pub const LABELS: [Label; 3] = [Label::Positive, Label::Neutral, Label::Negative];

impl Label {
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Positive => "positive",
            Label::Neutral => "neutral",
            Label::Negative => "negative",
        }
    }

    /// Exact (already lowercased) canonical name.
    pub fn from_canonical(s: &str) -> Option<Label> {
        LABELS.into_iter().find(|l| l.as_str() == s)
    }

    pub fn index(self) -> usize {
        match self {
            Label::Positive => 0,
            Label::Neutral => 1,
            Label::Negative => 2,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of mapping a raw label.
///
/// `Passthrough` only comes out of a model `id2label` entry that is not one of the
/// canonical names; it is kept verbatim (lowercased) rather than forced into the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappedLabel {
    Canonical(Label),
    Passthrough(String),
}

impl MappedLabel {
    pub fn as_str(&self) -> &str {
        match self {
            MappedLabel::Canonical(l) => l.as_str(),
            MappedLabel::Passthrough(s) => s,
        }
    }

    pub fn canonical(&self) -> Option<Label> {
        match self {
            MappedLabel::Canonical(l) => Some(*l),
            MappedLabel::Passthrough(_) => None,
        }
    }
}

impl From<Label> for MappedLabel {
    fn from(l: Label) -> Self {
        MappedLabel::Canonical(l)
    }
}

/// Index → label table taken from a model's configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Id2Label(HashMap<i64, String>);

impl Id2Label {
    /// Parse raw `(key, value)` pairs. Values are trimmed and lowercased.
    /// A single non-integer key discards the whole table.
    pub fn from_config<I, K, V>(raw: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut out = HashMap::new();
        for (k, v) in raw {
            match k.as_ref().trim().parse::<i64>() {
                Ok(idx) => {
                    out.insert(idx, v.as_ref().trim().to_lowercase());
                }
                Err(_) => return Self::default(),
            }
        }
        Self(out)
    }

    pub fn get(&self, idx: i64) -> Option<&str> {
        self.0.get(&idx).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<S: Into<String>> FromIterator<(i64, S)> for Id2Label {
    fn from_iter<T: IntoIterator<Item = (i64, S)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k, v.into().trim().to_lowercase()))
                .collect(),
        )
    }
}

const INDEXED_PREFIX: &str = "label_";

fn fallback_by_index(idx: i64) -> Label {
    match idx {
        0 => Label::Positive,
        1 => Label::Negative,
        2 => Label::Neutral,
        _ => Label::Neutral,
    }
}

/// Map a raw classifier label onto the canonical taxonomy.
pub fn map_label(raw: &str, id2label: Option<&Id2Label>) -> MappedLabel {
    let label = raw.trim().to_lowercase();
    if label.is_empty() {
        return Label::Neutral.into();
    }

    if let Some(rest) = label.strip_prefix(INDEXED_PREFIX) {
        let Ok(idx) = rest.trim().parse::<i64>() else {
            return Label::Neutral.into();
        };
        if let Some(mapped) = id2label.and_then(|m| m.get(idx)) {
            return match Label::from_canonical(mapped) {
                Some(l) => l.into(),
                None => MappedLabel::Passthrough(mapped.to_string()),
            };
        }
        return fallback_by_index(idx).into();
    }

    match label.as_str() {
        "pos" | "+" => return Label::Positive.into(),
        "neg" | "-" => return Label::Negative.into(),
        _ => {}
    }

    if let Some(l) = Label::from_canonical(&label) {
        return l.into();
    }

    LABELS
        .into_iter()
        .find(|l| label.contains(l.as_str()))
        .unwrap_or(Label::Neutral)
        .into()
}
