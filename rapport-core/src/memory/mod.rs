//! Memory type definitions and the [`MemoryDocument`] aggregate.
//!
//! Everything the agent remembers about one user lives in a single
//! document, persisted whole after every mutation. Every top-level
//! collection is `#[serde(default)]`: a document written by an older build,
//! or one missing a collection, loads with that collection empty instead of
//! failing.

pub mod episode;
pub mod goal;
pub mod moments;
pub mod mood;
pub mod personality;
pub mod record;
pub mod reminder;
pub mod social;

pub use episode::{Episode, EpisodeLog};
pub use goal::{Goal, GoalStatus};
pub use moments::{InsideJoke, Milestone, MilestoneKind, SignificantMoment};
pub use mood::{MoodEntry, MoodJournal};
pub use personality::{PersonalityTrait, TraitCategory, TraitHistory, TraitSnapshot};
pub use record::{key_matches, MemoryRecord, RecordMeta, RecordType, RecordValue};
pub use reminder::{ContextualReminder, ReminderPriority, ReminderStatus};
pub use social::{Person, RelationshipEdge};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::unit;

/// Current document schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Administrative switches persisted with the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// When false, the store ignores writes and answers reads with nothing.
    #[serde(default = "default_true")]
    pub memory_enabled: bool,
    /// When false, trait observations are ignored.
    #[serde(default = "default_true")]
    pub traits_enabled: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            memory_enabled: true,
            traits_enabled: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Interactions counted on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    /// The day (user's local calendar).
    pub day: NaiveDate,
    /// Interactions on that day.
    pub count: u32,
}

/// The relationship-depth block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipState {
    /// First turn ever processed.
    #[serde(default)]
    pub first_contact: Option<DateTime<Utc>>,
    /// Most recent turn.
    #[serde(default)]
    pub last_interaction: Option<DateTime<Utc>>,
    /// Ratcheted depth (0–100); never decreases.
    #[serde(default)]
    pub depth: u32,
    /// Times the user shared something personal.
    #[serde(default)]
    pub personal_reveals: u32,
    /// Interaction counter for the current day.
    #[serde(default)]
    pub today: Option<DailyCount>,
}

impl RelationshipState {
    /// Interactions already counted on `day`.
    #[must_use]
    pub fn interactions_on(&self, day: NaiveDate) -> u32 {
        self.today.filter(|d| d.day == day).map_or(0, |d| d.count)
    }
}

/// The persisted document: one per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryDocument {
    /// Schema version this document was written with.
    #[serde(default)]
    pub version: u32,
    /// Administrative switches.
    #[serde(default)]
    pub flags: FeatureFlags,
    /// Total processed turns.
    #[serde(default)]
    pub turn_count: u64,
    /// Keyed facts, events and preferences, in insertion order.
    #[serde(default)]
    pub records: Vec<MemoryRecord>,
    /// Recent conversation log.
    #[serde(default)]
    pub episodes: EpisodeLog,
    /// Learned personality traits (active and retired).
    #[serde(default)]
    pub traits: Vec<PersonalityTrait>,
    /// Periodic trait snapshots.
    #[serde(default)]
    pub trait_history: TraitHistory,
    /// User goals.
    #[serde(default)]
    pub goals: Vec<Goal>,
    /// Relationship depth block.
    #[serde(default)]
    pub relationship: RelationshipState,
    /// Inside jokes.
    #[serde(default)]
    pub inside_jokes: Vec<InsideJoke>,
    /// Reached milestones.
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    /// Significant moments.
    #[serde(default)]
    pub significant_moments: Vec<SignificantMoment>,
    /// Contextual reminders.
    #[serde(default)]
    pub reminders: Vec<ContextualReminder>,
    /// People in the user's life.
    #[serde(default)]
    pub people: Vec<Person>,
    /// Relationships between those people.
    #[serde(default)]
    pub edges: Vec<RelationshipEdge>,
    /// Mood journal.
    #[serde(default)]
    pub mood_journal: MoodJournal,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            flags: FeatureFlags::default(),
            turn_count: 0,
            records: Vec::new(),
            episodes: EpisodeLog::new(),
            traits: Vec::new(),
            trait_history: TraitHistory::new(),
            goals: Vec::new(),
            relationship: RelationshipState::default(),
            inside_jokes: Vec::new(),
            milestones: Vec::new(),
            significant_moments: Vec::new(),
            reminders: Vec::new(),
            people: Vec::new(),
            edges: Vec::new(),
            mood_journal: MoodJournal::new(),
        }
    }
}

impl MemoryDocument {
    /// Create an empty document with the given flags.
    #[must_use]
    pub fn with_flags(flags: FeatureFlags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }

    /// Look up a record by key.
    #[must_use]
    pub fn record(&self, key: &str) -> Option<&MemoryRecord> {
        self.records.iter().find(|r| r.key == key)
    }

    /// Look up a record by key, mutably.
    pub fn record_mut(&mut self, key: &str) -> Option<&mut MemoryRecord> {
        self.records.iter_mut().find(|r| r.key == key)
    }

    /// Currently active traits.
    pub fn active_traits(&self) -> impl Iterator<Item = &PersonalityTrait> {
        self.traits.iter().filter(|t| t.active)
    }

    /// Number of active traits.
    #[must_use]
    pub fn active_trait_count(&self) -> usize {
        self.active_traits().count()
    }

    /// Clamp every unit-range score back into `[0, 1]`.
    ///
    /// Loaded documents may have been hand-edited or written by an older
    /// build; the in-memory invariants only hold after this pass.
    pub fn sanitize(&mut self) {
        for record in &mut self.records {
            record.confidence = unit(record.confidence);
            record.significance = record.significance.map(unit);
        }
        for t in &mut self.traits {
            t.score = unit(t.score);
            t.salience = unit(t.salience);
        }
        for entry in self.mood_journal.iter_mut() {
            entry.intensity = unit(entry.intensity);
        }
    }

    /// Total number of remembered items across all collections.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.records.len()
            + self.episodes.len()
            + self.traits.len()
            + self.goals.len()
            + self.inside_jokes.len()
            + self.milestones.len()
            + self.significant_moments.len()
            + self.reminders.len()
            + self.people.len()
            + self.edges.len()
            + self.mood_journal.len()
    }
}
