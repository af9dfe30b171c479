//! The durable record store.
//!
//! [`MemoryStore`] owns one [`MemoryDocument`] and the backend it is saved
//! to. Every successful mutation is followed by a full-document save; only
//! that save can fail.
//!
//! When the persisted `memory_enabled` flag is off the store goes quiet:
//! mutations return `Ok` without touching anything and reads come back
//! empty. [`MemoryStore::set_feature_flags`] is the one call still honoured.
//!
//! Concurrent callers go through [`SharedStore`], a cloneable single-writer
//! handle; a turn holds its lock across all of its mutations.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::RapportConfig;
use crate::decay::{observe_trait, TraitObservation, TraitUpdate};
use crate::error::{RapportError, Result};
use crate::memory::{
    key_matches, ContextualReminder, Episode, FeatureFlags, Goal, GoalStatus, InsideJoke,
    MemoryDocument, MemoryRecord, Milestone, MoodEntry, Person, PersonalityTrait, RecordMeta,
    RecordType, RecordValue, RelationshipEdge, RelationshipState, ReminderStatus,
    SignificantMoment, TraitSnapshot, SCHEMA_VERSION,
};
use crate::persistence::{open_backend, DocumentBackend, MemoryBackend};
use crate::types::{GoalId, JokeId, MomentId, PersonId, ReminderId};

/// Typed CRUD over the persisted memory document.
pub struct MemoryStore {
    doc: MemoryDocument,
    backend: Box<dyn DocumentBackend>,
    config: RapportConfig,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("backend", &self.backend.describe())
            .field("flags", &self.doc.flags)
            .field("items", &self.doc.total_count())
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// Load the document from `backend`.
    ///
    /// A missing document starts fresh with flags from `config.general`. A
    /// corrupt one is logged and replaced by a fresh document.
    ///
    /// # Errors
    /// I/O or database errors other than corruption.
    pub fn open(backend: Box<dyn DocumentBackend>, config: RapportConfig) -> Result<Self> {
        let fresh = || {
            MemoryDocument::with_flags(FeatureFlags {
                memory_enabled: config.general.memory_enabled,
                traits_enabled: config.general.traits_enabled,
            })
        };

        let doc = match backend.load() {
            Ok(Some(mut doc)) => {
                if doc.version < SCHEMA_VERSION {
                    info!(from = doc.version, to = SCHEMA_VERSION, "Upgrading memory document");
                    doc.version = SCHEMA_VERSION;
                }
                doc.sanitize();
                doc
            }
            Ok(None) => {
                debug!(backend = %backend.describe(), "No memory document yet, starting fresh");
                fresh()
            }
            Err(RapportError::CorruptState(reason)) => {
                warn!(
                    backend = %backend.describe(),
                    reason = %reason,
                    "Memory document is corrupt, starting fresh"
                );
                fresh()
            }
            Err(e) => return Err(e),
        };

        info!(
            backend = %backend.describe(),
            items = doc.total_count(),
            enabled = doc.flags.memory_enabled,
            "Memory store opened"
        );
        Ok(Self {
            doc,
            backend,
            config,
        })
    }

    /// Open the backend named in `config.persistence` for `document_id`.
    ///
    /// # Errors
    /// Backend selection or opening errors.
    pub fn from_config(config: RapportConfig, document_id: &str) -> Result<Self> {
        let backend = open_backend(&config.persistence, document_id)?;
        Self::open(backend, config)
    }

    /// A store backed by process memory only.
    #[must_use]
    pub fn in_memory(config: RapportConfig) -> Self {
        let doc = MemoryDocument::with_flags(FeatureFlags {
            memory_enabled: config.general.memory_enabled,
            traits_enabled: config.general.traits_enabled,
        });
        Self {
            doc,
            backend: Box::new(MemoryBackend::new()),
            config,
        }
    }

    /// The configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &RapportConfig {
        &self.config
    }

    /// The whole document, regardless of flags.
    #[must_use]
    pub fn document(&self) -> &MemoryDocument {
        &self.doc
    }

    /// Mutable access for the turn orchestrator. The caller persists.
    pub(crate) fn document_mut(&mut self) -> &mut MemoryDocument {
        &mut self.doc
    }

    /// Save the whole document.
    ///
    /// # Errors
    /// Whatever the backend reports.
    pub fn persist(&self) -> Result<()> {
        self.backend.save(&self.doc)
    }

    fn enabled(&self) -> Option<&MemoryDocument> {
        self.doc.flags.memory_enabled.then_some(&self.doc)
    }

    /// Run `f` against the document and persist, or do nothing when memory
    /// is disabled.
    fn mutate<T>(&mut self, f: impl FnOnce(&mut MemoryDocument) -> T) -> Result<Option<T>> {
        if !self.doc.flags.memory_enabled {
            return Ok(None);
        }
        let out = f(&mut self.doc);
        self.persist()?;
        Ok(Some(out))
    }

    // -----------------------------------------------------------------------
    // Flags
    // -----------------------------------------------------------------------

    /// Current feature flags.
    #[must_use]
    pub fn flags(&self) -> FeatureFlags {
        self.doc.flags
    }

    /// Whether memory is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.doc.flags.memory_enabled
    }

    /// Whether trait learning is enabled (and memory is).
    #[must_use]
    pub fn traits_enabled(&self) -> bool {
        self.doc.flags.memory_enabled && self.doc.flags.traits_enabled
    }

    /// Replace the feature flags. Accepted even while memory is disabled.
    ///
    /// # Errors
    /// Persistence errors.
    pub fn set_feature_flags(&mut self, flags: FeatureFlags) -> Result<()> {
        info!(
            memory = flags.memory_enabled,
            traits = flags.traits_enabled,
            "Feature flags changed"
        );
        self.doc.flags = flags;
        self.persist()
    }

    // -----------------------------------------------------------------------
    // Records
    // -----------------------------------------------------------------------

    /// Look up a record.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MemoryRecord> {
        self.enabled()?.record(key)
    }

    /// Insert or reaffirm a record.
    ///
    /// # Errors
    /// Persistence errors.
    pub fn set(
        &mut self,
        key: &str,
        value: RecordValue,
        record_type: RecordType,
        confidence: f32,
        meta: RecordMeta,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let increment = self.config.store.reaffirm_increment;
        self.mutate(|doc| match doc.record_mut(key) {
            Some(existing) => {
                existing.reaffirm(value, record_type, confidence, meta, increment, now);
            }
            None => doc
                .records
                .push(MemoryRecord::new(key, value, record_type, confidence, meta, now)),
        })
        .map(drop)
    }

    /// Observe a plain fact.
    ///
    /// # Errors
    /// Persistence errors.
    pub fn record_fact(
        &mut self,
        key: &str,
        value: RecordValue,
        confidence: f32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.set(key, value, RecordType::Fact, confidence, RecordMeta::default(), now)
    }

    /// Remove a record. Returns whether it existed.
    ///
    /// # Errors
    /// Persistence errors.
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        if self.get(key).is_none() {
            return Ok(false);
        }
        self.mutate(|doc| {
            doc.records.retain(|r| r.key != key);
        })?;
        Ok(true)
    }

    /// Records matching an optional key glob and type, in insertion order.
    #[must_use]
    pub fn list(&self, pattern: Option<&str>, record_type: Option<RecordType>) -> Vec<&MemoryRecord> {
        self.records()
            .iter()
            .filter(|r| pattern.is_none_or(|p| key_matches(p, &r.key)))
            .filter(|r| record_type.is_none_or(|t| r.record_type == t))
            .collect()
    }

    /// All records.
    #[must_use]
    pub fn records(&self) -> &[MemoryRecord] {
        self.enabled().map_or(&[], |d| d.records.as_slice())
    }

    /// Note that the agent brought a record up. Returns whether it exists.
    ///
    /// # Errors
    /// Persistence errors.
    pub fn mark_referenced(&mut self, key: &str, now: DateTime<Utc>) -> Result<bool> {
        if self.get(key).is_none() {
            return Ok(false);
        }
        self.mutate(|doc| {
            if let Some(r) = doc.record_mut(key) {
                r.last_referenced = Some(now);
            }
        })?;
        Ok(true)
    }

    /// Forget everything except the feature flags.
    ///
    /// # Errors
    /// Persistence errors.
    pub fn wipe(&mut self) -> Result<()> {
        let wiped = self.mutate(|doc| {
            *doc = MemoryDocument::with_flags(doc.flags);
        })?;
        if wiped.is_some() {
            warn!(backend = %self.backend.describe(), "Memory wiped");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Episodes and traits
    // -----------------------------------------------------------------------

    /// Append an episode stamped with the current turn.
    ///
    /// # Errors
    /// Persistence errors.
    pub fn record_episode(&mut self, description: &str, now: DateTime<Utc>) -> Result<()> {
        self.mutate(|doc| {
            let turn = doc.turn_count;
            doc.episodes.push(Episode::new(description, turn, now));
        })
        .map(drop)
    }

    /// Recent episodes, oldest first.
    pub fn episodes(&self) -> impl Iterator<Item = &Episode> {
        self.enabled().into_iter().flat_map(|d| d.episodes.iter())
    }

    /// Fold trait evidence in. `None` when memory or traits are disabled.
    ///
    /// # Errors
    /// Persistence errors.
    pub fn observe_trait(
        &mut self,
        observation: TraitObservation,
        now: DateTime<Utc>,
    ) -> Result<Option<TraitUpdate>> {
        if !self.traits_enabled() {
            return Ok(None);
        }
        let config = self.config.traits.clone();
        self.mutate(|doc| observe_trait(&mut doc.traits, observation, now, &config))
    }

    /// Every trait, active or retired.
    #[must_use]
    pub fn traits(&self) -> &[PersonalityTrait] {
        self.enabled().map_or(&[], |d| d.traits.as_slice())
    }

    /// Active traits.
    pub fn active_traits(&self) -> impl Iterator<Item = &PersonalityTrait> {
        self.traits().iter().filter(|t| t.active)
    }

    /// Trait snapshots, oldest first.
    pub fn trait_history(&self) -> impl Iterator<Item = &TraitSnapshot> {
        self.enabled().into_iter().flat_map(|d| d.trait_history.iter())
    }

    // -----------------------------------------------------------------------
    // Goals
    // -----------------------------------------------------------------------

    /// Record a goal; an existing goal with the same description (any case)
    /// is returned instead, its target date updated if one is given.
    ///
    /// # Errors
    /// Persistence errors.
    pub fn record_goal(
        &mut self,
        description: &str,
        target_date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<Option<GoalId>> {
        self.mutate(|doc| {
            if let Some(goal) = doc.goals.iter_mut().find(|g| g.is_same(description)) {
                if target_date.is_some() {
                    goal.target_date = target_date;
                    goal.updated_at = now;
                }
                return goal.id;
            }
            let goal = Goal::new(description.trim(), target_date, now);
            let id = goal.id;
            doc.goals.push(goal);
            id
        })
    }

    /// Check in on a goal. Returns whether it exists.
    ///
    /// # Errors
    /// Persistence errors.
    pub fn goal_check_in(
        &mut self,
        id: GoalId,
        progress: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.update_goal(id, |g| g.check_in(progress, now))
    }

    /// Change a goal's status. Returns whether it exists.
    ///
    /// # Errors
    /// Persistence errors.
    pub fn set_goal_status(
        &mut self,
        id: GoalId,
        status: GoalStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.update_goal(id, |g| {
            g.status = status;
            g.updated_at = now;
        })
    }

    fn update_goal(&mut self, id: GoalId, f: impl FnOnce(&mut Goal)) -> Result<bool> {
        if !self.goals().iter().any(|g| g.id == id) {
            return Ok(false);
        }
        self.mutate(|doc| {
            if let Some(goal) = doc.goals.iter_mut().find(|g| g.id == id) {
                f(goal);
            }
        })?;
        Ok(true)
    }

    /// Every goal.
    #[must_use]
    pub fn goals(&self) -> &[Goal] {
        self.enabled().map_or(&[], |d| d.goals.as_slice())
    }

    /// Goals still being pursued.
    pub fn active_goals(&self) -> impl Iterator<Item = &Goal> {
        self.goals().iter().filter(|g| g.status == GoalStatus::Active)
    }

    // -----------------------------------------------------------------------
    // People
    // -----------------------------------------------------------------------

    /// Record a mention of someone. Matching is by case-insensitive name or
    /// alias (of the name or any given alias); new aliases are merged and a
    /// given relation replaces the stored one.
    ///
    /// # Errors
    /// Persistence errors.
    pub fn record_person(
        &mut self,
        name: &str,
        aliases: &[&str],
        relation: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<PersonId>> {
        self.mutate(|doc| {
            let existing = doc
                .people
                .iter()
                .position(|p| p.answers_to(name) || aliases.iter().any(|a| p.answers_to(a)));
            let idx = if let Some(idx) = existing {
                let person = &mut doc.people[idx];
                person.mentions = person.mentions.saturating_add(1);
                person.updated_at = now;
                if relation.is_some() {
                    person.relation = relation.map(str::to_string);
                }
                person.add_aliases(std::iter::once(name));
                idx
            } else {
                doc.people
                    .push(Person::new(name.trim(), relation.map(str::to_string), now));
                doc.people.len() - 1
            };
            let person = &mut doc.people[idx];
            person.add_aliases(aliases.iter().copied());
            person.id
        })
    }

    /// Find someone by name or alias.
    #[must_use]
    pub fn person(&self, name: &str) -> Option<&Person> {
        self.people().iter().find(|p| p.answers_to(name))
    }

    /// Everyone on file.
    #[must_use]
    pub fn people(&self) -> &[Person] {
        self.enabled().map_or(&[], |d| d.people.as_slice())
    }

    /// Record (or relabel) a relationship between two known people. Returns
    /// false if either is unknown or both are the same person.
    ///
    /// # Errors
    /// Persistence errors.
    pub fn relate_people(
        &mut self,
        a: PersonId,
        b: PersonId,
        label: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let known = |id: PersonId| self.people().iter().any(|p| p.id == id);
        if a == b || !known(a) || !known(b) {
            return Ok(false);
        }
        self.mutate(|doc| {
            if let Some(edge) = doc.edges.iter_mut().find(|e| e.connects(a, b)) {
                edge.label = label.to_string();
                edge.updated_at = now;
            } else {
                doc.edges.push(RelationshipEdge::new(a, b, label, now));
            }
        })?;
        Ok(true)
    }

    /// Every relationship edge.
    #[must_use]
    pub fn edges(&self) -> &[RelationshipEdge] {
        self.enabled().map_or(&[], |d| d.edges.as_slice())
    }

    /// Edges touching `person`.
    pub fn relationships_of(&self, person: PersonId) -> impl Iterator<Item = &RelationshipEdge> {
        self.edges()
            .iter()
            .filter(move |e| e.a == person || e.b == person)
    }

    // -----------------------------------------------------------------------
    // Mood
    // -----------------------------------------------------------------------

    /// Append a mood journal entry.
    ///
    /// # Errors
    /// Persistence errors.
    pub fn record_mood(
        &mut self,
        mood: &str,
        intensity: f32,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let offset = self.config.general.utc_offset_minutes;
        self.mutate(|doc| {
            doc.mood_journal.push(MoodEntry::new(
                mood,
                intensity,
                note.map(str::to_string),
                now,
                offset,
            ));
        })
        .map(drop)
    }

    /// Mood journal, oldest first.
    pub fn mood_journal(&self) -> impl Iterator<Item = &MoodEntry> {
        self.enabled().into_iter().flat_map(|d| d.mood_journal.iter())
    }

    // -----------------------------------------------------------------------
    // Shared history
    // -----------------------------------------------------------------------

    /// Record an inside joke; repeating one counts a reference instead.
    ///
    /// # Errors
    /// Persistence errors.
    pub fn record_inside_joke(&mut self, text: &str, now: DateTime<Utc>) -> Result<Option<JokeId>> {
        self.mutate(|doc| {
            let text = text.trim();
            if let Some(joke) = doc
                .inside_jokes
                .iter_mut()
                .find(|j| j.text.eq_ignore_ascii_case(text))
            {
                joke.times_referenced = joke.times_referenced.saturating_add(1);
                return joke.id;
            }
            let joke = InsideJoke {
                id: JokeId::new(),
                text: text.to_string(),
                times_referenced: 0,
                created_at: now,
            };
            let id = joke.id;
            doc.inside_jokes.push(joke);
            id
        })
    }

    /// Inside jokes.
    #[must_use]
    pub fn inside_jokes(&self) -> &[InsideJoke] {
        self.enabled().map_or(&[], |d| d.inside_jokes.as_slice())
    }

    /// Count a personal reveal (the user shared something personal).
    ///
    /// # Errors
    /// Persistence errors.
    pub fn record_personal_reveal(&mut self) -> Result<()> {
        self.mutate(|doc| {
            doc.relationship.personal_reveals = doc.relationship.personal_reveals.saturating_add(1);
        })
        .map(drop)
    }

    /// Record a significant moment; the same description on the same anchor
    /// date is not recorded twice.
    ///
    /// # Errors
    /// Persistence errors.
    pub fn record_significant_moment(
        &mut self,
        description: &str,
        anchor: NaiveDate,
        recurring: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<MomentId>> {
        self.mutate(|doc| {
            let description = description.trim();
            if let Some(moment) = doc
                .significant_moments
                .iter_mut()
                .find(|m| m.anchor == anchor && m.description.eq_ignore_ascii_case(description))
            {
                moment.recurring |= recurring;
                return moment.id;
            }
            let moment = SignificantMoment::new(description, anchor, recurring, now);
            let id = moment.id;
            doc.significant_moments.push(moment);
            id
        })
    }

    /// Significant moments.
    #[must_use]
    pub fn significant_moments(&self) -> &[SignificantMoment] {
        self.enabled().map_or(&[], |d| d.significant_moments.as_slice())
    }

    /// Reached milestones.
    #[must_use]
    pub fn milestones(&self) -> &[Milestone] {
        self.enabled().map_or(&[], |d| d.milestones.as_slice())
    }

    // -----------------------------------------------------------------------
    // Reminders
    // -----------------------------------------------------------------------

    /// Record a reminder mention; repeats raise its priority.
    ///
    /// # Errors
    /// Persistence errors.
    pub fn record_reminder(&mut self, text: &str, now: DateTime<Utc>) -> Result<Option<ReminderId>> {
        self.mutate(|doc| {
            let text = text.trim();
            if let Some(reminder) = doc
                .reminders
                .iter_mut()
                .find(|r| r.text.eq_ignore_ascii_case(text))
            {
                reminder.mention(now);
                return reminder.id;
            }
            let reminder = ContextualReminder::new(text, now);
            let id = reminder.id;
            doc.reminders.push(reminder);
            id
        })
    }

    /// Change a reminder's status. Returns whether it exists.
    ///
    /// # Errors
    /// Persistence errors.
    pub fn set_reminder_status(
        &mut self,
        id: ReminderId,
        status: ReminderStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if !self.reminders().iter().any(|r| r.id == id) {
            return Ok(false);
        }
        self.mutate(|doc| {
            if let Some(reminder) = doc.reminders.iter_mut().find(|r| r.id == id) {
                reminder.status = status;
                reminder.updated_at = now;
            }
        })?;
        Ok(true)
    }

    /// Every reminder.
    #[must_use]
    pub fn reminders(&self) -> &[ContextualReminder] {
        self.enabled().map_or(&[], |d| d.reminders.as_slice())
    }

    /// Active reminders, highest priority first (stable).
    #[must_use]
    pub fn active_reminders(&self) -> Vec<&ContextualReminder> {
        let mut active: Vec<&ContextualReminder> = self
            .reminders()
            .iter()
            .filter(|r| r.status == ReminderStatus::Active)
            .collect();
        active.sort_by(|a, b| b.priority.cmp(&a.priority));
        active
    }

    // -----------------------------------------------------------------------
    // Relationship
    // -----------------------------------------------------------------------

    /// Relationship block (default when disabled).
    #[must_use]
    pub fn relationship(&self) -> RelationshipState {
        self.enabled()
            .map(|d| d.relationship.clone())
            .unwrap_or_default()
    }

    /// Processed turns (0 when disabled).
    #[must_use]
    pub fn turn_count(&self) -> u64 {
        self.enabled().map_or(0, |d| d.turn_count)
    }
}

// ---------------------------------------------------------------------------
// Shared handle
// ---------------------------------------------------------------------------

/// Cloneable single-writer handle to a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct SharedStore(Arc<Mutex<MemoryStore>>);

impl SharedStore {
    /// Wrap a store.
    #[must_use]
    pub fn new(store: MemoryStore) -> Self {
        Self(Arc::new(Mutex::new(store)))
    }

    /// Take the lock. Hold the guard for every mutation of one logical step.
    pub fn lock(&self) -> MutexGuard<'_, MemoryStore> {
        self.0.lock()
    }

    /// Run `f` under the lock.
    pub fn with<T>(&self, f: impl FnOnce(&mut MemoryStore) -> T) -> T {
        f(&mut self.0.lock())
    }
}

impl From<MemoryStore> for SharedStore {
    fn from(store: MemoryStore) -> Self {
        Self::new(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ReminderPriority, TraitCategory};
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-04-02T10:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    fn store() -> MemoryStore {
        MemoryStore::in_memory(RapportConfig::default())
    }

    fn store_on(backend: &MemoryBackend) -> MemoryStore {
        MemoryStore::open(Box::new(backend.clone()), RapportConfig::default()).expect("open")
    }

    #[test]
    fn set_then_get_and_reaffirm() {
        let mut s = store();
        s.set("pet.name", "Miso".into(), RecordType::Fact, 0.6, RecordMeta::default(), now())
            .expect("set");
        s.set("pet.name", "Miso".into(), RecordType::Fact, 0.2, RecordMeta::default(), now())
            .expect("set again");
        let record = s.get("pet.name").expect("exists");
        assert!((record.confidence - 0.7).abs() < 1e-6);
        assert_eq!(s.records().len(), 1);
    }

    #[test]
    fn list_filters_by_glob_and_type() {
        let mut s = store();
        let t = now();
        s.record_fact("user.name", "Ana".into(), 0.9, t).expect("set");
        s.set("user.drink", "tea".into(), RecordType::Preference, 0.8, RecordMeta::default(), t)
            .expect("set");
        s.record_fact("pet.name", "Miso".into(), 0.9, t).expect("set");

        let keys: Vec<&str> = s.list(Some("user.*"), None).iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["user.name", "user.drink"]);
        assert_eq!(s.list(None, Some(RecordType::Preference)).len(), 1);
        assert_eq!(s.list(Some("name"), Some(RecordType::Fact)).len(), 2);
    }

    #[test]
    fn delete_and_mark_referenced_report_existence() {
        let mut s = store();
        s.record_fact("k", true.into(), 0.5, now()).expect("set");
        assert!(s.mark_referenced("k", now()).expect("mark"));
        assert_eq!(s.get("k").and_then(|r| r.last_referenced), Some(now()));
        assert!(!s.mark_referenced("missing", now()).expect("mark"));
        assert!(s.delete("k").expect("delete"));
        assert!(!s.delete("k").expect("delete again"));
    }

    #[test]
    fn every_mutation_is_persisted() {
        let backend = MemoryBackend::new();
        let mut s = store_on(&backend);
        s.record_fact("city", "Porto".into(), 0.9, now()).expect("set");
        s.record_goal("run a 10k", None, now()).expect("goal");

        let reopened = store_on(&backend);
        assert_eq!(reopened.get("city").map(|r| r.value.to_string()), Some("Porto".into()));
        assert_eq!(reopened.goals().len(), 1);
    }

    #[test]
    fn corrupt_document_is_replaced_by_fresh_one() {
        let backend = MemoryBackend::with_bytes(b"{ definitely not json".to_vec());
        let s = store_on(&backend);
        assert!(s.is_enabled());
        assert_eq!(s.document().total_count(), 0);
    }

    #[test]
    fn loaded_scores_are_clamped() {
        let mut doc = MemoryDocument::default();
        let mut record = MemoryRecord::new(
            "pet.name",
            "Miso".into(),
            RecordType::Fact,
            0.5,
            RecordMeta::default(),
            now(),
        );
        record.confidence = 5.0;
        doc.records.push(record);
        let mut t = PersonalityTrait::new("night_owl", TraitCategory::Habit, 0.5, 0.5, now());
        t.score = 3.0;
        t.salience = -2.0;
        doc.traits.push(t);
        let backend = MemoryBackend::new();
        backend.save(&doc).expect("seed");

        let s = store_on(&backend);
        let record = s.get("pet.name").expect("record survives");
        assert!((record.confidence - 1.0).abs() < f32::EPSILON);
        let t = &s.document().traits[0];
        assert!((t.score - 1.0).abs() < f32::EPSILON);
        assert!(t.salience.abs() < f32::EPSILON);
    }

    #[test]
    fn disabled_store_is_silent() {
        let mut s = store();
        s.record_fact("before", "x".into(), 0.9, now()).expect("set");
        s.set_feature_flags(FeatureFlags {
            memory_enabled: false,
            traits_enabled: true,
        })
        .expect("flags");

        assert!(s.get("before").is_none());
        assert!(s.records().is_empty());
        s.record_fact("after", "y".into(), 0.9, now()).expect("no-op");
        assert_eq!(s.record_goal("learn rust", None, now()).expect("no-op"), None);
        assert!(!s.delete("before").expect("no-op"));
        s.wipe().expect("no-op");

        s.set_feature_flags(FeatureFlags::default()).expect("flags");
        assert!(s.get("before").is_some());
        assert!(s.get("after").is_none());
    }

    #[test]
    fn wipe_keeps_flags() {
        let mut s = store();
        s.set_feature_flags(FeatureFlags {
            memory_enabled: true,
            traits_enabled: false,
        })
        .expect("flags");
        s.record_fact("a", 1.0.into(), 0.5, now()).expect("set");
        s.wipe().expect("wipe");
        assert!(s.records().is_empty());
        assert!(!s.flags().traits_enabled);
    }

    #[test]
    fn traits_respect_their_flag() {
        let mut s = store();
        let obs = || TraitObservation::new("curious", TraitCategory::Temperament);
        assert_eq!(s.observe_trait(obs(), now()).expect("observe"), Some(TraitUpdate::Created));
        s.set_feature_flags(FeatureFlags {
            memory_enabled: true,
            traits_enabled: false,
        })
        .expect("flags");
        assert_eq!(s.observe_trait(obs(), now()).expect("observe"), None);
        assert_eq!(s.traits()[0].evidence_count, 1);
    }

    #[test]
    fn goals_deduplicate_and_check_in() {
        let mut s = store();
        let id = s.record_goal("Run a 10K", None, now()).expect("goal").expect("enabled");
        let again = s
            .record_goal("run a 10k ", NaiveDate::from_ymd_opt(2024, 9, 1), now())
            .expect("goal")
            .expect("enabled");
        assert_eq!(id, again);
        assert_eq!(s.goals().len(), 1);
        assert!(s.goals()[0].target_date.is_some());

        assert!(s.goal_check_in(id, "ran 5k today", now()).expect("check in"));
        assert!(s.set_goal_status(id, GoalStatus::Completed, now()).expect("status"));
        assert_eq!(s.goals()[0].check_ins, 1);
        assert_eq!(s.active_goals().count(), 0);
        assert!(!s.goal_check_in(GoalId::new(), "?", now()).expect("unknown"));
    }

    #[test]
    fn people_merge_by_alias_and_edges_by_pair() {
        let mut s = store();
        let kat = s
            .record_person("Katherine", &["Kat"], Some("sister"), now())
            .expect("person")
            .expect("enabled");
        let same = s
            .record_person("kat", &[], None, now())
            .expect("person")
            .expect("enabled");
        assert_eq!(kat, same);
        assert_eq!(s.people().len(), 1);
        assert_eq!(s.people()[0].mentions, 2);
        assert_eq!(s.people()[0].relation.as_deref(), Some("sister"));

        let tom = s
            .record_person("Tom", &[], None, now())
            .expect("person")
            .expect("enabled");
        assert!(s.relate_people(kat, tom, "dating", now()).expect("relate"));
        assert!(s.relate_people(tom, kat, "engaged", now()).expect("relate"));
        assert_eq!(s.edges().len(), 1);
        assert_eq!(s.edges()[0].label, "engaged");
        assert!(!s.relate_people(kat, kat, "self", now()).expect("relate"));
        assert!(!s.relate_people(kat, PersonId::new(), "?", now()).expect("relate"));
        assert_eq!(s.relationships_of(tom).count(), 1);
    }

    #[test]
    fn jokes_reminders_and_moments_deduplicate() {
        let mut s = store();
        let t = now();
        let joke = s.record_inside_joke("the haunted toaster", t).expect("joke");
        assert_eq!(s.record_inside_joke("The Haunted Toaster", t).expect("joke"), joke);
        assert_eq!(s.inside_jokes()[0].times_referenced, 1);

        let anchor = NaiveDate::from_ymd_opt(2023, 4, 2).expect("valid date");
        let m = s.record_significant_moment("got the job", anchor, true, t).expect("moment");
        assert_eq!(s.record_significant_moment("Got the job", anchor, false, t).expect("moment"), m);
        assert_eq!(s.significant_moments().len(), 1);

        for _ in 0..4 {
            s.record_reminder("call mom", t).expect("reminder");
        }
        s.record_reminder("buy milk", t).expect("reminder");
        assert_eq!(s.reminders().len(), 2);
        let active = s.active_reminders();
        assert_eq!(active[0].priority, ReminderPriority::High);
        assert_eq!(active[1].text, "buy milk");

        let id = active[0].id;
        assert!(s.set_reminder_status(id, ReminderStatus::Completed, t).expect("status"));
        assert_eq!(s.active_reminders().len(), 1);
    }

    #[test]
    fn episodes_and_moods_are_bounded() {
        let mut s = store();
        for i in 0..60 {
            s.record_episode(&format!("turn {i}"), now() + Duration::minutes(i))
                .expect("episode");
        }
        assert_eq!(s.episodes().count(), 50);
        assert_eq!(s.episodes().next().map(|e| e.description.as_str()), Some("turn 10"));

        s.record_mood("calm", 0.4, Some("after a walk"), now()).expect("mood");
        s.record_personal_reveal().expect("reveal");
        assert_eq!(s.mood_journal().count(), 1);
        assert_eq!(s.relationship().personal_reveals, 1);
    }

    #[test]
    fn shared_store_serializes_access() {
        let shared = SharedStore::new(store());
        let clone = shared.clone();
        clone
            .with(|s| s.record_fact("a", "b".into(), 0.5, now()))
            .expect("set");
        assert!(shared.lock().get("a").is_some());
    }
}
