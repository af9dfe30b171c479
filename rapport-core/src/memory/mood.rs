//! Mood journal: "How you've been"
//!
//! Append-only, capped at [`MOOD_JOURNAL_CAPACITY`] entries. Each entry is
//! tagged with the user's local time of day and weekday so patterns ("Mondays
//! are rough") can be read back out.

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::ring::RingBuffer;
use crate::types::{unit, weekday_at, TimeOfDay};

/// Entries retained in the mood journal.
pub const MOOD_JOURNAL_CAPACITY: usize = 500;

/// The bounded mood journal.
pub type MoodJournal = RingBuffer<MoodEntry, MOOD_JOURNAL_CAPACITY>;

/// One mood observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodEntry {
    /// Mood label ("happy", "stressed"…).
    pub mood: String,
    /// Strength (0.0–1.0).
    pub intensity: f32,
    /// Optional free-form note.
    #[serde(default)]
    pub note: Option<String>,
    /// When it was observed.
    pub timestamp: DateTime<Utc>,
    /// Local time-of-day bucket.
    pub time_of_day: TimeOfDay,
    /// Local weekday.
    pub weekday: Weekday,
}

impl MoodEntry {
    /// Create an entry tagged on the user's wall clock.
    #[must_use]
    pub fn new(
        mood: impl Into<String>,
        intensity: f32,
        note: Option<String>,
        timestamp: DateTime<Utc>,
        utc_offset_minutes: i32,
    ) -> Self {
        Self {
            mood: mood.into(),
            intensity: unit(intensity),
            note,
            timestamp,
            time_of_day: TimeOfDay::at(timestamp, utc_offset_minutes),
            weekday: weekday_at(timestamp, utc_offset_minutes),
        }
    }
}
