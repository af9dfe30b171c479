//! Goals: "What you're working toward"

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::GoalId;

/// Lifecycle of a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    /// Still being pursued.
    Active,
    /// Achieved.
    Completed,
    /// On hold.
    Paused,
}

/// A user goal the agent checks in on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    /// Unique identifier.
    pub id: GoalId,
    /// What the user wants to achieve. Deduplicated case-insensitively.
    pub description: String,
    /// Current lifecycle state.
    pub status: GoalStatus,
    /// Optional deadline.
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    /// Latest progress note.
    #[serde(default)]
    pub progress: String,
    /// How many times the agent has checked in.
    #[serde(default)]
    pub check_ins: u32,
    /// When the goal was first mentioned.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl Goal {
    /// Create a new active goal.
    #[must_use]
    pub fn new(
        description: impl Into<String>,
        target_date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: GoalId::new(),
            description: description.into(),
            status: GoalStatus::Active,
            target_date,
            progress: String::new(),
            check_ins: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `description` names this goal.
    #[must_use]
    pub fn is_same(&self, description: &str) -> bool {
        self.description.trim().eq_ignore_ascii_case(description.trim())
    }

    /// Record a check-in with a progress note.
    pub fn check_in(&mut self, progress: impl Into<String>, now: DateTime<Utc>) {
        self.progress = progress.into();
        self.check_ins = self.check_ins.saturating_add(1);
        self.updated_at = now;
    }
}
