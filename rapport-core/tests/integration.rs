//! Integration Tests: End-to-End Conversation Flows
//!
//! These tests drive the public API the way a chat service would: open a
//! store on a real backend, run turns through the orchestrator, feed agent
//! replies back, and reopen the store to check what survived.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use rapport_core::affect::{AgentEmotion, ReplyType, UserEmotion};
use rapport_core::config::{PersistenceConfig, RapportConfig};
use rapport_core::decay::TraitObservation;
use rapport_core::error::{RapportError, Result};
use rapport_core::memory::{
    FeatureFlags, InsideJoke, MemoryDocument, MilestoneKind, RecordMeta, RecordType,
    TraitCategory,
};
use rapport_core::persistence::{DocumentBackend, JsonFileBackend, MemoryBackend};
use rapport_core::types::JokeId;
use rapport_core::{Durability, MemoryStore, SharedStore, TurnInput, TurnOrchestrator};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 8, 12, 14, 0, 0)
        .single()
        .expect("valid date")
}

fn orchestrator_on(store: MemoryStore, seed: u64) -> TurnOrchestrator<StdRng> {
    TurnOrchestrator::with_rng(SharedStore::new(store), StdRng::seed_from_u64(seed))
}

fn no_recall() -> RapportConfig {
    let mut config = RapportConfig::default();
    config.turn.recall_probability = 0.0;
    config
}

/// Backend whose saves always fail.
struct BrokenDisk;

impl DocumentBackend for BrokenDisk {
    fn load(&self) -> Result<Option<MemoryDocument>> {
        Ok(None)
    }

    fn save(&self, _doc: &MemoryDocument) -> Result<()> {
        Err(RapportError::Io(std::io::Error::other("disk full")))
    }

    fn describe(&self) -> String {
        "broken".to_string()
    }
}

// ---------------------------------------------------------------------------
// Persistence round-trips
// ---------------------------------------------------------------------------

#[test]
fn json_backend_survives_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("user.json");
    let mut config = no_recall();
    config.persistence.path = path.to_string_lossy().into_owned();

    {
        let store = MemoryStore::from_config(config.clone(), "user-1").expect("open");
        let mut orch = orchestrator_on(store, 1);
        let shared = orch.store().clone();
        shared
            .with(|s| {
                s.set(
                    "pet.name",
                    "Miso".into(),
                    RecordType::Fact,
                    0.9,
                    RecordMeta::significant(0.6).with_emotion("fond"),
                    t0(),
                )
            })
            .expect("set");
        for i in 0..3 {
            let outcome = orch.process_turn(TurnInput::new(
                "We took Miso to the beach today and she loved the waves",
                t0() + Duration::minutes(i),
            ));
            assert_eq!(outcome.durability, Durability::Persisted);
        }
    }

    let store = MemoryStore::from_config(config, "user-1").expect("reopen");
    assert_eq!(store.turn_count(), 3);
    assert_eq!(store.episodes().count(), 3);
    let record = store.get("pet.name").expect("record survived");
    assert_eq!(record.emotion.as_deref(), Some("fond"));
    assert_eq!(store.milestones().len(), 1);
    assert!(store.relationship().first_contact.is_some());
}

#[test]
fn sqlite_backend_keeps_users_apart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = no_recall();
    config.persistence = PersistenceConfig {
        backend: "sqlite".to_string(),
        path: dir.path().join("rapport.db").to_string_lossy().into_owned(),
        ..PersistenceConfig::default()
    };

    let mut alice = MemoryStore::from_config(config.clone(), "alice").expect("open alice");
    alice
        .record_fact("city", "Lisbon".into(), 0.9, t0())
        .expect("set");
    drop(alice);

    let bob = MemoryStore::from_config(config.clone(), "bob").expect("open bob");
    assert!(bob.get("city").is_none());
    drop(bob);

    let alice = MemoryStore::from_config(config, "alice").expect("reopen alice");
    assert_eq!(alice.get("city").and_then(|r| r.value.as_str()), Some("Lisbon"));
}

#[test]
fn corrupt_sqlite_database_starts_fresh() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("rapport.db");
    std::fs::write(&db_path, "these bytes are no database ".repeat(50)).expect("write garbage");
    let mut config = no_recall();
    config.persistence = PersistenceConfig {
        backend: "sqlite".to_string(),
        path: db_path.to_string_lossy().into_owned(),
        ..PersistenceConfig::default()
    };

    let store = MemoryStore::from_config(config.clone(), "u1").expect("corruption is not fatal");
    assert_eq!(store.document().total_count(), 0);
    assert!(dir.path().join("rapport.db.corrupt").exists());

    let mut orch = orchestrator_on(store, 14);
    let outcome = orch.process_turn(TurnInput::new("back again after the crash", t0()));
    assert_eq!(outcome.durability, Durability::Persisted);
    drop(orch);

    let reopened = MemoryStore::from_config(config, "u1").expect("reopen");
    assert_eq!(reopened.turn_count(), 1);
}

#[test]
fn corrupt_file_recovers_and_keeps_working() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("user.json");
    std::fs::write(&path, "{\"records\": [oops").expect("write garbage");

    let store = MemoryStore::open(Box::new(JsonFileBackend::new(&path)), no_recall())
        .expect("corruption is not fatal");
    let mut orch = orchestrator_on(store, 2);
    let outcome = orch.process_turn(TurnInput::new("hi again, long week", t0()));
    assert_eq!(outcome.turn, 1);
    assert_eq!(outcome.durability, Durability::Persisted);

    let reloaded = JsonFileBackend::new(&path)
        .load()
        .expect("valid now")
        .expect("saved");
    assert_eq!(reloaded.turn_count, 1);
}

#[test]
fn failed_save_degrades_turn_without_failing_it() {
    let store = MemoryStore::open(Box::new(BrokenDisk), no_recall()).expect("open");
    let mut orch = orchestrator_on(store, 3);
    let outcome = orch.process_turn(TurnInput::new("so tired today", t0()));
    assert!(matches!(outcome.durability, Durability::Degraded { .. }));
    assert_eq!(outcome.turn, 1);
    // The in-memory state still advanced.
    assert_eq!(orch.store().lock().turn_count(), 1);
}

// ---------------------------------------------------------------------------
// Disabled memory
// ---------------------------------------------------------------------------

#[test]
fn disabled_memory_still_tracks_affect_and_policy() {
    let backend = MemoryBackend::new();
    let mut config = no_recall();
    config.general.memory_enabled = false;
    let store = MemoryStore::open(Box::new(backend.clone()), config).expect("open");
    let mut orch = orchestrator_on(store, 4);

    let outcome = orch.process_turn(TurnInput::new("ugh I'm so frustrated and annoyed", t0()));
    assert_eq!(outcome.durability, Durability::Disabled);
    assert_eq!(outcome.turn, 1);
    assert_eq!(outcome.user_affect.label, UserEmotion::Frustrated);
    assert!(outcome.context.is_empty());
    assert_eq!(orch.relationship_depth(), 0);
    assert!(backend.bytes().is_none(), "nothing may be written");

    orch.store()
        .with(|s| s.set_feature_flags(FeatureFlags::default()))
        .expect("flags accepted while disabled");
    let outcome = orch.process_turn(TurnInput::new("ok that's better now honestly", t0()));
    assert_eq!(outcome.durability, Durability::Persisted);
    assert_eq!(outcome.turn, 1, "persisted count starts when memory is on");
}

// ---------------------------------------------------------------------------
// Relationship
// ---------------------------------------------------------------------------

#[test]
fn month_old_relationship_reaches_depth_31() {
    let now = t0();
    let mut doc = MemoryDocument::default();
    doc.turn_count = 24;
    doc.relationship.first_contact = Some(now - Duration::days(30));
    doc.relationship.personal_reveals = 1;
    for text in ["the haunted toaster", "Gerald the pigeon"] {
        doc.inside_jokes.push(InsideJoke {
            id: JokeId::new(),
            text: text.to_string(),
            times_referenced: 0,
            created_at: now - Duration::days(10),
        });
    }
    let backend = MemoryBackend::new();
    backend.save(&doc).expect("seed");

    let store = MemoryStore::open(Box::new(backend), no_recall()).expect("open");
    let mut orch = orchestrator_on(store, 5);
    let outcome = orch.process_turn(TurnInput::new("remember the haunted toaster?", now));

    assert_eq!(outcome.turn, 25);
    assert_eq!(outcome.depth, 31);
    let kinds: Vec<(MilestoneKind, u64)> =
        outcome.milestones.iter().map(|m| (m.kind, m.value)).collect();
    assert!(kinds.contains(&(MilestoneKind::Conversations, 25)));
    assert!(kinds.contains(&(MilestoneKind::Depth, 25)));
}

#[test]
fn depth_never_drops_between_turns() {
    let store = MemoryStore::in_memory(no_recall());
    let mut orch = orchestrator_on(store, 6);
    let mut last = 0;
    for i in 0..40 {
        let outcome = orch.process_turn(TurnInput::new(
            "just chatting about the weekend plans",
            t0() + Duration::hours(i),
        ));
        assert!(outcome.depth >= last);
        last = outcome.depth;
    }
    assert!(last > 0);
}

#[test]
fn anniversary_fires_once_across_same_day_turns() {
    let store = MemoryStore::in_memory(no_recall());
    let mut orch = orchestrator_on(store, 7);
    let anchor = NaiveDate::from_ymd_opt(2022, 8, 12).expect("valid date");
    orch.store()
        .with(|s| s.record_significant_moment("first chat", anchor, true, t0()))
        .expect("moment");

    let first = orch.process_turn(TurnInput::new("morning!", t0()));
    assert_eq!(first.anniversaries.len(), 1);
    assert_eq!(first.anniversaries[0].years, 2);

    for i in 1..5 {
        let later = orch.process_turn(TurnInput::new("still here", t0() + Duration::hours(i)));
        assert!(later.anniversaries.is_empty());
    }
}

// ---------------------------------------------------------------------------
// Salience
// ---------------------------------------------------------------------------

#[test]
fn proactive_recall_prefers_recent_memory_and_marks_it() {
    let mut config = RapportConfig::default();
    config.turn.recall_probability = 1.0;
    let store = MemoryStore::in_memory(config);
    let mut orch = orchestrator_on(store, 8);
    let now = t0();

    orch.store().with(|s| -> Result<()> {
        s.record_fact("trip.lisbon", "went to Lisbon".into(), 0.9, now - Duration::days(20))?;
        s.record_fact("job.interview", "interview on Monday".into(), 0.6, now - Duration::days(1))
    })
    .expect("seed");

    let outcome = orch.process_turn(TurnInput::new("hey", now));
    let recall = outcome.recall.expect("B is eligible");
    assert_eq!(recall.record.key, "job.interview");
    assert_eq!(
        orch.store()
            .lock()
            .get("job.interview")
            .and_then(|r| r.last_referenced),
        Some(now)
    );

    // Within the cooldown nothing is eligible.
    let outcome = orch.process_turn(TurnInput::new("hey", now + Duration::hours(2)));
    assert!(outcome.recall.is_none());
}

#[test]
fn context_ranking_follows_topic() {
    let store = MemoryStore::in_memory(no_recall());
    let mut orch = orchestrator_on(store, 9);
    orch.store()
        .with(|s| -> Result<()> {
            s.record_fact("_internal.cursor", "music 42".into(), 1.0, t0())?;
            s.record_fact("music.band", "Radiohead".into(), 0.7, t0())?;
            s.set(
                "music.instrument",
                "learning guitar".into(),
                RecordType::Event,
                0.7,
                RecordMeta::default().with_emotion("proud"),
                t0(),
            )?;
            s.record_fact("food.favorite", "ramen".into(), 1.0, t0())
        })
        .expect("seed");

    let outcome = orch.process_turn(
        TurnInput::new("been playing a lot lately", t0()).with_topic("music"),
    );
    let keys: Vec<&str> = outcome.context.iter().map(|s| s.record.key.as_str()).collect();
    assert_eq!(keys, vec!["music.instrument", "music.band"]);
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

#[test]
fn trait_cap_and_cadence_hold_over_a_conversation() {
    let store = MemoryStore::in_memory(no_recall());
    let mut orch = orchestrator_on(store, 10);
    let ids = [
        "curious", "playful", "kind", "anxious", "organized", "musical", "sporty", "bookish",
        "night_owl", "foodie", "outdoorsy",
    ];
    orch.store()
        .with(|s| -> Result<()> {
            for id in ids {
                s.observe_trait(TraitObservation::new(id, TraitCategory::Interest), t0())?;
            }
            Ok(())
        })
        .expect("observe");
    assert!(orch.active_traits().len() <= 8);

    let mut decay_turns = Vec::new();
    for i in 0..25 {
        let outcome = orch.process_turn(TurnInput::new(
            "talking about my hobbies again",
            t0() + Duration::days(i),
        ));
        if outcome.decay.is_some() {
            decay_turns.push(outcome.turn);
        }
        assert!(orch.active_traits().len() <= 8);
    }
    assert_eq!(decay_turns, vec![5, 10, 15, 20, 25]);
    assert_eq!(orch.store().lock().trait_history().count(), 1);
}

// ---------------------------------------------------------------------------
// Affect and policy
// ---------------------------------------------------------------------------

#[test]
fn withdrawal_blocks_questions_and_reaches_agent() {
    let store = MemoryStore::in_memory(no_recall());
    let mut orch = orchestrator_on(store, 11);
    let mut outcome = orch.process_turn(TurnInput::new("k", t0()));
    for i in 1..4 {
        outcome = orch.process_turn(TurnInput::new("...", t0() + Duration::minutes(i)));
    }
    assert_eq!(outcome.reply_type, ReplyType::Silence);
    assert_eq!(outcome.user_affect.label, UserEmotion::Withdrawn);
    assert_eq!(outcome.policy.silence_streak, 3);
    // Withdrawal alone is too weak to pull the agent off its held mood,
    // but it is heard.
    assert!(outcome
        .agent_signals
        .iter()
        .any(|s| s == "user_withdrawn:concerned"));

    let closed = orch.process_turn(TurnInput::new("fine", t0() + Duration::minutes(5)));
    assert!(!closed.may_ask_question);
}

#[test]
fn agent_misses_user_after_long_absence() {
    let store = MemoryStore::in_memory(no_recall());
    let mut orch = orchestrator_on(store, 12);
    orch.process_turn(TurnInput::new("talk tomorrow, going to bed now", t0()));
    let outcome = orch.process_turn(TurnInput::new(
        "sorry I disappeared for a while there",
        t0() + Duration::days(4),
    ));
    assert_eq!(outcome.agent_affect.label, AgentEmotion::Lonely);
}

#[test]
fn question_pacing_over_several_exchanges() {
    let store = MemoryStore::in_memory(no_recall());
    let mut orch = orchestrator_on(store, 13);
    let mut t = t0();
    let mut step = || {
        t += Duration::minutes(1);
        t
    };

    assert!(orch
        .process_turn(TurnInput::new("I finally finished my thesis draft", step()))
        .may_ask_question);
    orch.complete_turn("That's huge! How does it feel?", Some("thesis"), step());

    for reply in ["You earned a rest.", "Drafts are the hardest part.", "Proud of you."] {
        let outcome = orch.process_turn(TurnInput::new(
            "It feels unreal honestly, I keep rereading it",
            step(),
        ));
        assert!(!outcome.may_ask_question);
        orch.complete_turn(reply, None, step());
    }

    let outcome = orch.process_turn(TurnInput::new(
        "Thanks, I think I will take the weekend off",
        step(),
    ));
    assert!(outcome.may_ask_question);
    assert!(orch.policy().recently_asked("thesis"));
}
