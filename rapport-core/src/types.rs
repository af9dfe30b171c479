//! Core type definitions shared across the rapport crate.
//!
//! All types are serializable so they can live inside the persisted
//! [`MemoryDocument`](crate::memory::MemoryDocument).

use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc, Weekday};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a goal.
    GoalId
);
uuid_id!(
    /// Unique identifier for a person in the social graph.
    PersonId
);
uuid_id!(
    /// Unique identifier for a contextual reminder.
    ReminderId
);
uuid_id!(
    /// Unique identifier for an inside joke.
    JokeId
);
uuid_id!(
    /// Unique identifier for a significant moment.
    MomentId
);

// ---------------------------------------------------------------------------
// Unit-interval values
// ---------------------------------------------------------------------------

/// Clamp a score into `[0, 1]`. NaN collapses to 0.
///
/// Out-of-range confidences, saliences and intensities are never rejected,
/// they are clamped here.
#[must_use]
pub fn unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Fractional days from `earlier` to `later`. Negative spans (clock skew)
/// count as zero.
#[must_use]
pub fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let secs = (later - earlier).num_seconds().max(0);
    secs as f64 / 86_400.0
}

/// Fractional hours from `earlier` to `later`, floored at zero.
#[must_use]
pub fn hours_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let secs = (later - earlier).num_seconds().max(0);
    secs as f64 / 3_600.0
}

/// Convert a UTC instant to the user's wall clock given an offset in minutes.
///
/// Offsets outside ±24h fall back to UTC.
#[must_use]
pub fn local_time(ts: DateTime<Utc>, utc_offset_minutes: i32) -> DateTime<FixedOffset> {
    let offset =
        FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix());
    ts.with_timezone(&offset)
}

// ---------------------------------------------------------------------------
// Time of day
// ---------------------------------------------------------------------------

/// Coarse wall-clock bucket used by the mood journal and the agent's
/// baseline mood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeOfDay {
    /// 05:00–11:59.
    Morning,
    /// 12:00–16:59.
    Afternoon,
    /// 17:00–21:59.
    Evening,
    /// 22:00–04:59.
    Night,
}

impl TimeOfDay {
    /// Bucket an hour of the day (0–23).
    #[must_use]
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=21 => Self::Evening,
            _ => Self::Night,
        }
    }

    /// Bucket a UTC instant on the user's wall clock.
    #[must_use]
    pub fn at(ts: DateTime<Utc>, utc_offset_minutes: i32) -> Self {
        Self::from_hour(local_time(ts, utc_offset_minutes).hour())
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        };
        f.write_str(s)
    }
}

/// Day of week on the user's wall clock.
#[must_use]
pub fn weekday_at(ts: DateTime<Utc>, utc_offset_minutes: i32) -> Weekday {
    local_time(ts, utc_offset_minutes).weekday()
}

// ---------------------------------------------------------------------------
// Ranking score
// ---------------------------------------------------------------------------

/// Totally ordered score used to rank records and traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct RankScore(pub OrderedFloat<f64>);

impl RankScore {
    /// Wrap a raw score.
    #[must_use]
    pub fn new(score: f64) -> Self {
        Self(OrderedFloat(score))
    }

    /// The raw score.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0.into_inner()
    }
}
