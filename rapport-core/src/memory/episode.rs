//! Episodes: "What we talked about"
//!
//! Append-only conversation log. Only the most recent [`EPISODE_CAPACITY`]
//! entries are retained.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ring::RingBuffer;

/// Number of episodes retained in the log.
pub const EPISODE_CAPACITY: usize = 50;

/// The bounded episode log.
pub type EpisodeLog = RingBuffer<Episode, EPISODE_CAPACITY>;

/// A single logged exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    /// Short natural-language description.
    pub description: String,
    /// Turn number the episode was recorded on.
    pub turn: u64,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
}

impl Episode {
    /// Create a new episode.
    #[must_use]
    pub fn new(description: impl Into<String>, turn: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            description: description.into(),
            turn,
            timestamp,
        }
    }
}
