//! Property-Based Tests for Rapport Core
//!
//! Uses `proptest` to check the bounds and monotonicity guarantees of the
//! memory, relationship and affect layers under random inputs.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use rapport_core::affect::{AffectState, AgentEmotion, UserEmotion};
use rapport_core::config::{AffectConfig, RelationshipConfig, SalienceConfig, TraitConfig};
use rapport_core::decay::{self, TraitObservation};
use rapport_core::memory::{
    MemoryRecord, PersonalityTrait, RecordMeta, RecordType, RecordValue, TraitCategory,
};
use rapport_core::relationship::{self, DepthInputs};
use rapport_core::salience;
use rapport_core::RingBuffer;

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid date")
}

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

fn arb_user_emotion() -> impl Strategy<Value = UserEmotion> {
    prop_oneof![
        Just(UserEmotion::Neutral),
        Just(UserEmotion::Happy),
        Just(UserEmotion::Excited),
        Just(UserEmotion::Sad),
        Just(UserEmotion::Anxious),
        Just(UserEmotion::Frustrated),
        Just(UserEmotion::Tired),
        Just(UserEmotion::Withdrawn),
    ]
}

fn arb_trait() -> impl Strategy<Value = PersonalityTrait> {
    (0..40usize, 0.0..1.0f32, 0.0..1.0f32, 0..120i64).prop_map(|(n, score, salience, age)| {
        PersonalityTrait::new(
            format!("trait_{n}"),
            TraitCategory::Interest,
            score,
            salience,
            epoch() - Duration::days(age),
        )
    })
}

fn arb_record() -> impl Strategy<Value = MemoryRecord> {
    (
        0..30usize,
        -1.0..2.0f32,
        proptest::option::of(-1.0..2.0f32),
        any::<bool>(),
        0..60i64,
    )
        .prop_map(|(n, confidence, significance, emotional, age)| {
            let mut meta = RecordMeta {
                significance,
                emotion: None,
            };
            if emotional {
                meta = meta.with_emotion("glad");
            }
            MemoryRecord::new(
                format!("note.{n}"),
                RecordValue::from(format!("value {n}")),
                RecordType::Fact,
                confidence,
                meta,
                epoch() - Duration::days(age),
            )
        })
}

// ---------------------------------------------------------------------------
// Property: record confidence stays in [0, 1] under repeated observations
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn record_confidence_always_clamped(
        initial in -5.0..5.0f32,
        repeats in proptest::collection::vec((any::<bool>(), -5.0..5.0f32), 0..40),
    ) {
        let mut record = MemoryRecord::new(
            "pet.name",
            "Miso".into(),
            RecordType::Fact,
            initial,
            RecordMeta::default(),
            epoch(),
        );
        prop_assert!((0.0..=1.0).contains(&record.confidence));
        for (i, (same, confidence)) in repeats.into_iter().enumerate() {
            let value = if same { "Miso" } else { "Mochi" };
            record.reaffirm(
                value.into(),
                RecordType::Fact,
                confidence,
                RecordMeta::default(),
                0.1,
                epoch() + Duration::hours(i as i64),
            );
            prop_assert!((0.0..=1.0).contains(&record.confidence));
        }
    }
}

// ---------------------------------------------------------------------------
// Property: ranking is bounded, sorted, and skips internal keys
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn ranking_bounded_and_sorted(
        records in proptest::collection::vec(arb_record(), 0..30),
        limit in 0..10usize,
    ) {
        let config = SalienceConfig::default();
        let ranked = salience::rank_for_context(&records, None, limit, "_", &config);
        prop_assert!(ranked.len() <= limit);
        for pair in ranked.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
        for scored in &ranked {
            prop_assert!(!scored.record.key.starts_with('_'));
        }
    }

    #[test]
    fn recall_salience_is_finite_and_non_negative(record in arb_record(), hours in 0..2000i64) {
        let config = SalienceConfig::default();
        let now = epoch() + Duration::hours(hours);
        if let Some(s) = salience::recall_salience(&record, now, "_", &config) {
            prop_assert!(s.is_finite());
            prop_assert!(s >= 0.0);
        }
    }
}

// ---------------------------------------------------------------------------
// Property: trait scores stay in range and the active cap holds
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn decay_keeps_scores_in_range_and_cap(
        mut traits in proptest::collection::vec(arb_trait(), 0..30),
        days in 0..400i64,
    ) {
        let config = TraitConfig::default();
        let now = epoch() + Duration::days(days);
        decay::decay_traits(&mut traits, now, &config);
        prop_assert!(traits.iter().filter(|t| t.active).count() <= config.max_active);
        for t in &traits {
            prop_assert!((0.0..=1.0).contains(&t.score));
            prop_assert!((0.0..=1.0).contains(&t.salience));
        }
    }

    #[test]
    fn observations_never_break_the_cap(
        ids in proptest::collection::vec(0..20usize, 1..80),
    ) {
        let config = TraitConfig::default();
        let mut traits = Vec::new();
        for (i, n) in ids.into_iter().enumerate() {
            decay::observe_trait(
                &mut traits,
                TraitObservation::new(format!("trait_{n}"), TraitCategory::Habit),
                epoch() + Duration::minutes(i as i64),
                &config,
            );
            prop_assert!(traits.iter().filter(|t| t.active).count() <= config.max_active);
            for t in &traits {
                prop_assert!((0.0..=1.0).contains(&t.score));
            }
        }
    }

    #[test]
    fn repeated_decay_does_not_compound(
        mut traits in proptest::collection::vec(arb_trait(), 1..8),
        days in 1..60i64,
    ) {
        let config = TraitConfig::default();
        let now = epoch() + Duration::days(days);
        decay::decay_traits(&mut traits, now, &config);
        let once: Vec<f32> = traits.iter().map(|t| t.score).collect();
        decay::decay_traits(&mut traits, now, &config);
        let twice: Vec<f32> = traits.iter().map(|t| t.score).collect();
        prop_assert_eq!(once, twice);
    }
}

// ---------------------------------------------------------------------------
// Property: relationship depth is bounded and ratchets
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn depth_bounded(
        turns in 0..1_000_000u64,
        days_known in 0.0..5000.0f64,
        inside_jokes in 0..100usize,
        personal_reveals in 0..100u32,
    ) {
        let config = RelationshipConfig::default();
        let depth = relationship::compute_depth(
            &DepthInputs { turns, days_known, inside_jokes, personal_reveals },
            &config,
        );
        prop_assert!(depth <= 100);
    }

    #[test]
    fn stored_depth_never_decreases(candidates in proptest::collection::vec(0..=100u32, 1..50)) {
        let mut state = rapport_core::memory::RelationshipState::default();
        let mut high = 0;
        for candidate in candidates {
            relationship::update_depth(&mut state, candidate);
            prop_assert!(state.depth >= high);
            high = state.depth;
        }
    }

    #[test]
    fn milestones_are_recorded_once(turns in 0..2000u64, depth in 0..=100u32) {
        let config = RelationshipConfig::default();
        let mut milestones = Vec::new();
        let first = relationship::detect_milestones(&mut milestones, turns, depth, epoch(), &config);
        let again = relationship::detect_milestones(&mut milestones, turns, depth, epoch(), &config);
        prop_assert!(again.is_empty());
        prop_assert_eq!(first.len(), milestones.len());
    }
}

// ---------------------------------------------------------------------------
// Property: smoothed affect stays in [0, 1]
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn user_affect_intensity_clamped(
        readings in proptest::collection::vec((arb_user_emotion(), -3.0..3.0f32), 1..60),
    ) {
        let config = AffectConfig::default();
        let mut state = AffectState::neutral(config.neutral_confidence);
        for (label, intensity) in readings {
            state.smooth(label, intensity, &config);
            prop_assert!((0.0..=1.0).contains(&state.intensity));
        }
    }

    #[test]
    fn agent_affect_intensity_clamped(intensities in proptest::collection::vec(-3.0..3.0f32, 1..60)) {
        let config = AffectConfig::default();
        let mut state = AffectState::neutral(config.agent_baseline);
        for (i, intensity) in intensities.into_iter().enumerate() {
            let label = if i % 2 == 0 { AgentEmotion::Lonely } else { AgentEmotion::Content };
            state.smooth(label, intensity, &config);
            prop_assert!((0.0..=1.0).contains(&state.intensity));
        }
    }
}

// ---------------------------------------------------------------------------
// Property: ring buffers keep the newest N items
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn ring_buffer_keeps_newest(items in proptest::collection::vec(any::<u32>(), 0..50)) {
        let mut ring: RingBuffer<u32, 5> = RingBuffer::new();
        for item in &items {
            ring.push(*item);
        }
        let kept: Vec<u32> = ring.iter().copied().collect();
        let start = items.len().saturating_sub(5);
        prop_assert_eq!(kept, items[start..].to_vec());
    }
}
