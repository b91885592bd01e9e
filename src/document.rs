// src/document.rs
//! Canonical document record shared by ingestion adapters, the preprocessing pipeline
//! and the API.
//!
//! A `Document` is validated once on construction and never mutated afterwards:
//! - `id` is generated (UUID v4) when absent or empty,
//! - `source` and `text` must be non-empty,
//! - `ticker` is trimmed + uppercased, empty becomes `None`,
//! - `created_at` is always UTC.
//!
//! Serialized form writes `created_at` as `YYYY-MM-DDTHH:MM:SS.ffffffZ`.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Adapter tag whose payloads are remapped field by field.
pub const UPLOAD_ADAPTER: &str = "upload";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Document {
    id: String,
    source: String,
    ticker: Option<String>,
    #[serde(serialize_with = "serialize_created_at")]
    created_at: DateTime<Utc>,
    text: String,
    permalink: Option<String>,
}

/// Timestamp input accepted on construction. Everything ends up as UTC.
#[derive(Debug, Clone, PartialEq)]
pub enum CreatedAt {
    /// Absent: current UTC time.
    Now,
    Utc(DateTime<Utc>),
    /// Timezone-aware: converted to UTC.
    Offset(DateTime<FixedOffset>),
    /// Naive: assumed to already be UTC.
    Naive(NaiveDateTime),
    /// ISO-8601 text; unparsable text falls back to now.
    Iso(String),
    /// Unix seconds (JSON numbers); out-of-range falls back to now.
    Unix(f64),
}

impl From<DateTime<Utc>> for CreatedAt {
    fn from(v: DateTime<Utc>) -> Self {
        CreatedAt::Utc(v)
    }
}

impl From<DateTime<FixedOffset>> for CreatedAt {
    fn from(v: DateTime<FixedOffset>) -> Self {
        CreatedAt::Offset(v)
    }
}

impl From<NaiveDateTime> for CreatedAt {
    fn from(v: NaiveDateTime) -> Self {
        CreatedAt::Naive(v)
    }
}

impl From<&str> for CreatedAt {
    fn from(v: &str) -> Self {
        CreatedAt::Iso(v.to_string())
    }
}

impl From<String> for CreatedAt {
    fn from(v: String) -> Self {
        CreatedAt::Iso(v)
    }
}

impl CreatedAt {
    /// Coerce into a UTC timestamp. Never fails.
    pub fn into_utc(self) -> DateTime<Utc> {
        match self {
            CreatedAt::Now => Utc::now(),
            CreatedAt::Utc(dt) => dt,
            CreatedAt::Offset(dt) => dt.with_timezone(&Utc),
            CreatedAt::Naive(dt) => dt.and_utc(),
            CreatedAt::Iso(s) => parse_iso8601(&s).unwrap_or_else(Utc::now),
            CreatedAt::Unix(secs) => {
                if !secs.is_finite() {
                    return Utc::now();
                }
                DateTime::from_timestamp_micros((secs * 1_000_000.0).round() as i64)
                    .unwrap_or_else(Utc::now)
            }
        }
    }

    fn from_json(v: Option<&Value>) -> Self {
        match v {
            Some(Value::String(s)) if !s.is_empty() => CreatedAt::Iso(s.clone()),
            Some(Value::Number(n)) => n.as_f64().map(CreatedAt::Unix).unwrap_or(CreatedAt::Now),
            _ => CreatedAt::Now,
        }
    }
}

/// Parse an ISO-8601 timestamp. A trailing `Z` means UTC; offsets are converted;
/// naive values and bare dates are taken as UTC.
pub fn parse_iso8601(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    let with_offset = match s.strip_suffix('Z').or_else(|| s.strip_suffix('z')) {
        Some(head) => format!("{head}+00:00"),
        None => s.to_string(),
    };
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(&with_offset, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// UTC, microsecond precision, literal `Z`.
pub fn format_created_at(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

fn serialize_created_at<S: Serializer>(dt: &DateTime<Utc>, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&format_created_at(dt))
}

fn normalize_ticker(raw: Option<String>) -> Option<String> {
    raw.map(|t| t.trim().to_uppercase()).filter(|t| !t.is_empty())
}

fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

/// Builder for direct construction.
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    id: Option<String>,
    source: String,
    ticker: Option<String>,
    created_at: CreatedAt,
    text: String,
    permalink: Option<String>,
}

impl DocumentBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn ticker(mut self, ticker: impl Into<String>) -> Self {
        self.ticker = Some(ticker.into());
        self
    }

    pub fn created_at(mut self, created_at: impl Into<CreatedAt>) -> Self {
        self.created_at = created_at.into();
        self
    }

    pub fn permalink(mut self, permalink: impl Into<String>) -> Self {
        self.permalink = Some(permalink.into());
        self
    }

    pub fn build(self) -> Result<Document> {
        if self.source.is_empty() {
            return Err(Error::Validation { field: "source" });
        }
        if self.text.is_empty() {
            return Err(Error::Validation { field: "text" });
        }
        let id = match self.id {
            Some(id) if !id.is_empty() => id,
            _ => Uuid::new_v4().to_string(),
        };
        Ok(Document {
            id,
            source: self.source,
            ticker: normalize_ticker(self.ticker),
            created_at: self.created_at.into_utc(),
            text: self.text,
            permalink: self.permalink,
        })
    }
}

impl Document {
    pub fn builder(source: impl Into<String>, text: impl Into<String>) -> DocumentBuilder {
        DocumentBuilder {
            id: None,
            source: source.into(),
            ticker: None,
            created_at: CreatedAt::Now,
            text: text.into(),
            permalink: None,
        }
    }

    /// Shorthand for `builder(source, text).build()`.
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Result<Self> {
        Self::builder(source, text).build()
    }

    /// Build from a canonical key-value payload.
    ///
    /// Missing or non-string optional fields become absent; missing `source`/`text`
    /// fail validation. `created_at` accepts ISO-8601 strings or unix seconds.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self> {
        let mut b = Self::builder(
            str_field(map, "source").unwrap_or_default(),
            str_field(map, "text").unwrap_or_default(),
        )
        .created_at(CreatedAt::from_json(map.get("created_at")));
        if let Some(id) = str_field(map, "id") {
            b = b.id(id);
        }
        if let Some(t) = str_field(map, "ticker") {
            b = b.ticker(t);
        }
        if let Some(p) = str_field(map, "permalink") {
            b = b.permalink(p);
        }
        b.build()
    }

    /// Convert an adapter-specific payload.
    ///
    /// `upload` payloads carry no `source`; it is forced to `"upload"` and every other
    /// field is optional. Unknown adapters are treated as canonical payloads.
    pub fn from_adapter(adapter: &str, payload: &Map<String, Value>) -> Result<Self> {
        if adapter != UPLOAD_ADAPTER {
            return Self::from_map(payload);
        }
        let mut remapped = Map::new();
        remapped.insert("source".into(), Value::String(UPLOAD_ADAPTER.into()));
        for key in ["id", "ticker", "created_at", "text", "permalink"] {
            if let Some(v) = payload.get(key) {
                remapped.insert(key.into(), v.clone());
            }
        }
        Self::from_map(&remapped)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ticker(&self) -> Option<&str> {
        self.ticker.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn permalink(&self) -> Option<&str> {
        self.permalink.as_deref()
    }

    /// Copy with a different text. Fails on empty text like construction does.
    pub fn with_text(self, text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.is_empty() {
            return Err(Error::Validation { field: "text" });
        }
        Ok(Self { text, ..self })
    }

    /// Copy with `ticker` re-normalized.
    pub fn with_ticker(self, ticker: Option<String>) -> Self {
        Self {
            ticker: normalize_ticker(ticker),
            ..self
        }
    }

    /// Internal variant of `with_text` for steps that already guarantee non-empty text.
    pub(crate) fn replace_text(self, text: String) -> Self {
        debug_assert!(!text.is_empty());
        Self { text, ..self }
    }
}

impl TryFrom<Map<String, Value>> for Document {
    type Error = Error;

    fn try_from(map: Map<String, Value>) -> Result<Self> {
        Self::from_map(&map)
    }
}

/// Short, anonymized fingerprint of a text for log lines (never log the raw text).
pub(crate) fn text_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn iso_shapes_are_parsed_as_utc() {
        let z = parse_iso8601("2025-01-01T12:00:00.000000Z").unwrap();
        assert_eq!(z, Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap());

        let plus2 = parse_iso8601("2025-01-01T14:00:00+02:00").unwrap();
        assert_eq!(plus2, z);

        let naive = parse_iso8601("2025-01-01T12:00:00").unwrap();
        assert_eq!(naive, z);

        let date_only = parse_iso8601("2025-01-01").unwrap();
        assert_eq!(date_only.hour(), 0);

        assert!(parse_iso8601("not-a-date").is_none());
        assert!(parse_iso8601("   ").is_none());
    }

    #[test]
    fn format_uses_micros_and_literal_z() {
        let dt = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(format_created_at(&dt), "2025-03-04T05:06:07.000000Z");
    }

    #[test]
    fn unix_seconds_are_accepted() {
        let dt = CreatedAt::Unix(1_700_000_000.0).into_utc();
        assert_eq!(dt.timestamp(), 1_700_000_000);
        // NaN falls back to "now" instead of failing
        let now = CreatedAt::Unix(f64::NAN).into_utc();
        assert!(now.timestamp() > 1_700_000_000);
    }

    #[test]
    fn text_hash_is_short_and_stable() {
        assert_eq!(text_hash("abc"), text_hash("abc"));
        assert_eq!(text_hash("abc").len(), 12);
        assert_ne!(text_hash("abc"), text_hash("abd"));
    }
}
