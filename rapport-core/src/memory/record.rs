//! Memory records: "What I know about you"
//!
//! Keyed facts, events and preferences learned from conversation. A record
//! is created on first observation and reaffirmed on every repeat: its
//! confidence climbs toward 1.0 instead of being overwritten.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::unit;

/// Typed record value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordValue {
    /// Explicitly empty.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Numeric value.
    Number(f64),
    /// Text value.
    String(String),
}

impl RecordValue {
    /// The text payload, if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for RecordValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for RecordValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for RecordValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for RecordValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Kind of knowledge a record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    /// Something true about the user ("has a dog named Miso").
    Fact,
    /// Something that happened ("started a new job").
    Event,
    /// A like or dislike ("prefers tea over coffee").
    Preference,
}

/// Optional metadata attached to a [`MemoryStore::set`](crate::store::MemoryStore::set) call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordMeta {
    /// Emotional/contextual importance at creation time.
    pub significance: Option<f32>,
    /// Emotion the user expressed while sharing this.
    pub emotion: Option<String>,
}

impl RecordMeta {
    /// Metadata with a significance weight.
    #[must_use]
    pub fn significant(significance: f32) -> Self {
        Self {
            significance: Some(significance),
            emotion: None,
        }
    }

    /// Attach an emotion tag.
    #[must_use]
    pub fn with_emotion(mut self, emotion: impl Into<String>) -> Self {
        self.emotion = Some(emotion.into());
        self
    }
}

/// A single keyed memory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique key within the store.
    pub key: String,
    /// The remembered value.
    pub value: RecordValue,
    /// Fact, event or preference.
    pub record_type: RecordType,
    /// Belief strength (0.0–1.0).
    pub confidence: f32,
    /// Importance at creation time (0.0–1.0).
    #[serde(default)]
    pub significance: Option<f32>,
    /// Emotion tag.
    #[serde(default)]
    pub emotion: Option<String>,
    /// First observed.
    pub created_at: DateTime<Utc>,
    /// Last observed.
    pub updated_at: DateTime<Utc>,
    /// Last time the agent brought this up.
    #[serde(default)]
    pub last_referenced: Option<DateTime<Utc>>,
    /// How many times the record was observed again after creation.
    #[serde(default)]
    pub reaffirmations: u32,
}

impl MemoryRecord {
    /// Create a record, clamping confidence and significance into `[0, 1]`.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        value: RecordValue,
        record_type: RecordType,
        confidence: f32,
        meta: RecordMeta,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.into(),
            value,
            record_type,
            confidence: unit(confidence),
            significance: meta.significance.map(unit),
            emotion: meta.emotion,
            created_at: now,
            updated_at: now,
            last_referenced: None,
            reaffirmations: 0,
        }
    }

    /// Fold a repeat observation into this record.
    ///
    /// The same value raises confidence by `increment` (capped at 1.0). A
    /// different value is a correction: the value is replaced and confidence
    /// becomes the larger of the old and the provided one. Provided metadata
    /// replaces the stored metadata; absent metadata is kept.
    pub fn reaffirm(
        &mut self,
        value: RecordValue,
        record_type: RecordType,
        confidence: f32,
        meta: RecordMeta,
        increment: f32,
        now: DateTime<Utc>,
    ) {
        if self.value == value {
            self.confidence = unit(self.confidence + increment);
        } else {
            self.value = value;
            self.confidence = unit(self.confidence.max(confidence));
        }
        self.record_type = record_type;
        if let Some(significance) = meta.significance {
            self.significance = Some(unit(significance));
        }
        if meta.emotion.is_some() {
            self.emotion = meta.emotion;
        }
        self.reaffirmations = self.reaffirmations.saturating_add(1);
        self.updated_at = now;
    }

    /// Whether the key lives in an internal namespace.
    #[must_use]
    pub fn is_internal(&self, prefix: &str) -> bool {
        !prefix.is_empty() && self.key.starts_with(prefix)
    }

    /// Whether a topic string matches this record's key or text value
    /// (case-insensitive).
    #[must_use]
    pub fn matches_topic(&self, topic: &str) -> bool {
        let topic = topic.to_lowercase();
        if self.key.to_lowercase().contains(&topic) {
            return true;
        }
        self.value
            .as_str()
            .is_some_and(|v| v.to_lowercase().contains(&topic))
    }
}

/// Glob match over record keys. `*` matches any run of characters; a pattern
/// without `*` matches as a substring.
#[must_use]
pub fn key_matches(pattern: &str, key: &str) -> bool {
    if !pattern.contains('*') {
        return key.contains(pattern);
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let mut rest = key;

    // Anchored prefix.
    let first = parts[0];
    if !rest.starts_with(first) {
        return false;
    }
    rest = &rest[first.len()..];

    let last = parts[parts.len() - 1];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }

    // Anchored suffix.
    rest.len() >= last.len() && rest.ends_with(last)
}
