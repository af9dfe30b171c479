//! Shared history: inside jokes, milestones and significant moments.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{JokeId, MomentId};

/// A running joke between the user and the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsideJoke {
    /// Unique identifier.
    pub id: JokeId,
    /// The joke itself. Deduplicated case-insensitively.
    pub text: String,
    /// How many times it came up again.
    #[serde(default)]
    pub times_referenced: u32,
    /// When it was born.
    pub created_at: DateTime<Utc>,
}

/// What a milestone counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneKind {
    /// Number of conversation turns.
    Conversations,
    /// Relationship depth reached.
    Depth,
}

/// A reached milestone. At most one exists per `(kind, value)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    /// What was counted.
    pub kind: MilestoneKind,
    /// The threshold that was crossed.
    pub value: u64,
    /// When it was reached.
    pub reached_at: DateTime<Utc>,
}

impl Milestone {
    /// Whether this milestone is the `(kind, value)` one.
    #[must_use]
    pub fn is(&self, kind: MilestoneKind, value: u64) -> bool {
        self.kind == kind && self.value == value
    }
}

/// A moment worth remembering, optionally celebrated every year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificantMoment {
    /// Unique identifier.
    pub id: MomentId,
    /// What happened.
    pub description: String,
    /// The date it happened; anniversaries compare its month and day.
    pub anchor: NaiveDate,
    /// Whether it is celebrated annually.
    pub recurring: bool,
    /// Last anniversary celebration.
    #[serde(default)]
    pub last_celebrated: Option<DateTime<Utc>>,
    /// When it was recorded.
    pub created_at: DateTime<Utc>,
}

impl SignificantMoment {
    /// Create a new moment.
    #[must_use]
    pub fn new(
        description: impl Into<String>,
        anchor: NaiveDate,
        recurring: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MomentId::new(),
            description: description.into(),
            anchor,
            recurring,
            last_celebrated: None,
            created_at: now,
        }
    }
}
