//! Personality traits: "Who you seem to be"
//!
//! Traits are inferred from repeated conversational evidence. Each carries
//! two independent weights:
//!
//! - **score**: how strongly the trait is believed to hold;
//! - **salience**: how present it currently is, decaying faster than score.
//!
//! Observation, decay, conflict resolution and retirement live in
//! [`crate::decay`]; this module only defines the persisted shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ring::RingBuffer;
use crate::types::unit;

/// Evidence snippets retained per trait.
pub const EVIDENCE_CAPACITY: usize = 3;
/// Evidence sources retained per trait.
pub const SOURCE_CAPACITY: usize = 5;
/// Trait snapshots retained in the history.
pub const TRAIT_HISTORY_CAPACITY: usize = 30;

/// The bounded trait history.
pub type TraitHistory = RingBuffer<TraitSnapshot, TRAIT_HISTORY_CAPACITY>;

/// Broad family a trait belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitCategory {
    /// Emotional disposition (optimistic, anxious…).
    Temperament,
    /// Topics the user gravitates toward.
    Interest,
    /// How the user talks (talkative, terse, playful…).
    Communication,
    /// What the user cares about.
    Value,
    /// Recurring behavior (night owl, early riser…).
    Habit,
}

/// A learned personality trait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityTrait {
    /// Stable identifier, e.g. `"playful"`. Unique while active.
    pub id: String,
    /// Trait family.
    pub category: TraitCategory,
    /// Belief strength (0.0–1.0).
    pub score: f32,
    /// Current prominence (0.0–1.0).
    pub salience: f32,
    /// Number of observations folded in.
    pub evidence_count: u32,
    /// Most recent evidence snippets.
    #[serde(default)]
    pub evidence: RingBuffer<String, EVIDENCE_CAPACITY>,
    /// Most recent evidence sources (e.g. `"turn:42"`).
    #[serde(default)]
    pub sources: RingBuffer<String, SOURCE_CAPACITY>,
    /// Retired traits stay on file but are inactive.
    pub active: bool,
    /// First observed.
    pub created_at: DateTime<Utc>,
    /// Last observed.
    pub updated_at: DateTime<Utc>,
    /// Last decay pass that touched this trait. Decay is applied for the
    /// time since the later of this and `updated_at`, so repeated passes
    /// never compound the same interval.
    #[serde(default)]
    pub decayed_at: Option<DateTime<Utc>>,
}

impl PersonalityTrait {
    /// Create a freshly observed trait.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        category: TraitCategory,
        score: f32,
        salience: f32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            score: unit(score),
            salience: unit(salience),
            evidence_count: 0,
            evidence: RingBuffer::new(),
            sources: RingBuffer::new(),
            active: true,
            created_at: now,
            updated_at: now,
            decayed_at: None,
        }
    }

    /// Start of the interval not yet covered by decay.
    #[must_use]
    pub fn decay_anchor(&self) -> DateTime<Utc> {
        self.decayed_at.map_or(self.updated_at, |d| d.max(self.updated_at))
    }

    /// Combined weight used for cap enforcement.
    #[must_use]
    pub fn weight(&self) -> f32 {
        self.score * self.salience
    }
}

/// Score of one trait at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitReading {
    /// Trait id.
    pub id: String,
    /// Score at snapshot time.
    pub score: f32,
    /// Salience at snapshot time.
    pub salience: f32,
}

/// Periodic snapshot of the active trait set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitSnapshot {
    /// Turn number the snapshot was taken on.
    pub turn: u64,
    /// When it was taken.
    pub taken_at: DateTime<Utc>,
    /// Active traits at that moment.
    pub traits: Vec<TraitReading>,
}

impl TraitSnapshot {
    /// Capture the active members of `traits`.
    #[must_use]
    pub fn capture(traits: &[PersonalityTrait], turn: u64, now: DateTime<Utc>) -> Self {
        Self {
            turn,
            taken_at: now,
            traits: traits
                .iter()
                .filter(|t| t.active)
                .map(|t| TraitReading {
                    id: t.id.clone(),
                    score: t.score,
                    salience: t.salience,
                })
                .collect(),
        }
    }
}
