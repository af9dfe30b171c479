//! Contextual reminders: things the user keeps bringing up.
//!
//! Priority is never set directly: it is derived from how often the user has
//! mentioned the subject.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ReminderId;

/// Derived urgency of a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderPriority {
    /// Mentioned once.
    Low,
    /// Mentioned two or three times.
    Medium,
    /// Mentioned four or more times.
    High,
}

impl ReminderPriority {
    /// Priority for a mention count.
    #[must_use]
    pub fn from_mentions(mentions: u32) -> Self {
        match mentions {
            0 | 1 => Self::Low,
            2 | 3 => Self::Medium,
            _ => Self::High,
        }
    }
}

/// Lifecycle of a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    /// Still relevant.
    Active,
    /// Done.
    Completed,
    /// The user asked the agent to drop it.
    Dismissed,
}

/// A contextual reminder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextualReminder {
    /// Unique identifier.
    pub id: ReminderId,
    /// What to remember. Deduplicated case-insensitively.
    pub text: String,
    /// Times the user mentioned it.
    pub mentions: u32,
    /// Derived from `mentions`.
    pub priority: ReminderPriority,
    /// Lifecycle state.
    pub status: ReminderStatus,
    /// First mention.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl ContextualReminder {
    /// Create a reminder from its first mention.
    #[must_use]
    pub fn new(text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: ReminderId::new(),
            text: text.into(),
            mentions: 1,
            priority: ReminderPriority::Low,
            status: ReminderStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Count another mention. A mention revives a completed or dismissed
    /// reminder.
    pub fn mention(&mut self, now: DateTime<Utc>) {
        self.mentions = self.mentions.saturating_add(1);
        self.priority = ReminderPriority::from_mentions(self.mentions);
        self.status = ReminderStatus::Active;
        self.updated_at = now;
    }
}
