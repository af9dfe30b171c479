//! Record salience: contextual ranking and proactive recall.
//!
//! Two read paths over the record store:
//!
//! 1. **Contextual ranking** picks the records most worth putting in front of
//!    the language backend for the current topic:
//!
//!    ```text
//!    score = confidence × significance_w × emotion_w × referenced_w
//!    significance_w = 1 + significance        (1.0 when absent)
//!    emotion_w      = 1.5 if tagged           (else 1.0)
//!    referenced_w   = 1.2 if ever referenced  (else 1.0)
//!    ```
//!
//! 2. **Proactive recall** picks one recent record for the agent to bring up
//!    unprompted ("how did the interview go?"):
//!
//!    ```text
//!    salience = confidence × max(0.5, 1 − age_days / 14) × type_w
//!    ```
//!
//!    restricted to confident, recent, not-recently-mentioned records. The
//!    final pick is uniform among the best few.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::config::SalienceConfig;
use crate::memory::{MemoryRecord, RecordType};
use crate::types::{days_between, hours_between, RankScore};

/// Per-factor weights behind a contextual score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    /// Record confidence.
    pub confidence: f64,
    /// `1 + significance`.
    pub significance: f64,
    /// Emotion-tag multiplier.
    pub emotion: f64,
    /// Referenced-before multiplier.
    pub referenced: f64,
}

impl ScoreBreakdown {
    /// Product of all factors.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.confidence * self.significance * self.emotion * self.referenced
    }
}

/// A record with its contextual score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    /// The record (owned copy).
    pub record: MemoryRecord,
    /// Final score.
    pub score: RankScore,
    /// Factor breakdown for debugging.
    pub breakdown: ScoreBreakdown,
}

/// A proactive-recall pick.
#[derive(Debug, Clone, PartialEq)]
pub struct RecallCandidate {
    /// The record to bring up (owned copy, taken before it was marked
    /// referenced).
    pub record: MemoryRecord,
    /// Its recall salience.
    pub salience: RankScore,
}

/// Compute the contextual score factors for one record.
#[must_use]
pub fn context_breakdown(record: &MemoryRecord, config: &SalienceConfig) -> ScoreBreakdown {
    ScoreBreakdown {
        confidence: f64::from(record.confidence),
        significance: 1.0 + record.significance.map_or(0.0, f64::from),
        emotion: if record.emotion.is_some() {
            config.emotion_weight
        } else {
            1.0
        },
        referenced: if record.last_referenced.is_some() {
            config.referenced_weight
        } else {
            1.0
        },
    }
}

/// Rank records for the current conversational context.
///
/// Records whose key starts with `internal_prefix` are never returned. When
/// `topic` is given, only records whose key or text value mention it
/// (case-insensitively) take part. Returns at most `limit` records, best
/// first; ties keep insertion order.
#[must_use]
pub fn rank_for_context(
    records: &[MemoryRecord],
    topic: Option<&str>,
    limit: usize,
    internal_prefix: &str,
    config: &SalienceConfig,
) -> Vec<ScoredRecord> {
    let topic = topic.map(str::trim).filter(|t| !t.is_empty());

    let mut scored: Vec<ScoredRecord> = records
        .iter()
        .filter(|r| !r.is_internal(internal_prefix))
        .filter(|r| topic.is_none_or(|t| r.matches_topic(t)))
        .map(|r| {
            let breakdown = context_breakdown(r, config);
            ScoredRecord {
                record: r.clone(),
                score: RankScore::new(breakdown.total()),
                breakdown,
            }
        })
        .collect();

    // `sort_by` is stable, so equal scores keep insertion order.
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(limit);
    scored
}

/// Recall salience of a record at `now`, or `None` if it is not eligible.
#[must_use]
pub fn recall_salience(
    record: &MemoryRecord,
    now: DateTime<Utc>,
    internal_prefix: &str,
    config: &SalienceConfig,
) -> Option<f64> {
    if record.is_internal(internal_prefix) || record.confidence < config.recall_min_confidence {
        return None;
    }

    let age_days = days_between(record.created_at, now);
    if age_days > config.recall_window_days {
        return None;
    }

    if let Some(referenced) = record.last_referenced {
        if hours_between(referenced, now) < config.recall_cooldown_hours {
            return None;
        }
    }

    let recency = if config.recall_window_days > 0.0 {
        (1.0 - age_days / config.recall_window_days).max(config.recall_min_recency)
    } else {
        config.recall_min_recency
    };
    let type_weight = match record.record_type {
        RecordType::Preference => config.preference_multiplier,
        RecordType::Fact | RecordType::Event => 1.0,
    };

    Some(f64::from(record.confidence) * recency * type_weight)
}

/// Eligible records with their recall salience, best first (stable), cut to
/// the configured pool size.
#[must_use]
pub fn recall_pool<'a>(
    records: &'a [MemoryRecord],
    now: DateTime<Utc>,
    internal_prefix: &str,
    config: &SalienceConfig,
) -> Vec<(&'a MemoryRecord, RankScore)> {
    let mut pool: Vec<(&MemoryRecord, RankScore)> = records
        .iter()
        .filter_map(|r| {
            recall_salience(r, now, internal_prefix, config).map(|s| (r, RankScore::new(s)))
        })
        .collect();
    pool.sort_by(|a, b| b.1.cmp(&a.1));
    pool.truncate(config.recall_pool_size);
    pool
}

/// Pick a proactive-recall candidate: uniform among the best
/// `recall_pick_from` of the pool, using the injected RNG.
///
/// This is pure; the caller marks the chosen record as referenced.
pub fn select_recall<R: Rng + ?Sized>(
    records: &[MemoryRecord],
    now: DateTime<Utc>,
    internal_prefix: &str,
    config: &SalienceConfig,
    rng: &mut R,
) -> Option<RecallCandidate> {
    let pool = recall_pool(records, now, internal_prefix, config);
    let pick_from = pool.len().min(config.recall_pick_from);
    if pick_from == 0 {
        return None;
    }
    let (record, salience) = pool[rng.gen_range(0..pick_from)];
    Some(RecallCandidate {
        record: record.clone(),
        salience,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::RecordMeta;
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-20T12:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    fn record(key: &str, confidence: f32, age_days: i64) -> MemoryRecord {
        MemoryRecord::new(
            key,
            "value".into(),
            RecordType::Fact,
            confidence,
            RecordMeta::default(),
            now() - Duration::days(age_days),
        )
    }

    #[test]
    fn context_score_multiplies_factors() {
        let mut r = MemoryRecord::new(
            "trip",
            "Lisbon".into(),
            RecordType::Event,
            0.8,
            RecordMeta::significant(0.5).with_emotion("excited"),
            now(),
        );
        r.last_referenced = Some(now());
        let b = context_breakdown(&r, &SalienceConfig::default());
        let expected = 0.8 * 1.5 * 1.5 * 1.2;
        assert!((b.total() - expected).abs() < 1e-6);
    }

    #[test]
    fn ranking_excludes_internal_and_filters_topic() {
        let records = vec![
            record("_session.id", 1.0, 0),
            record("pet.name", 0.7, 0),
            record("pet.age", 0.9, 0),
            record("job.title", 1.0, 0),
        ];
        let ranked = rank_for_context(&records, Some("PET"), 5, "_", &SalienceConfig::default());
        let keys: Vec<&str> = ranked.iter().map(|s| s.record.key.as_str()).collect();
        assert_eq!(keys, vec!["pet.age", "pet.name"]);

        let all = rank_for_context(&records, None, 5, "_", &SalienceConfig::default());
        assert!(all.iter().all(|s| !s.record.key.starts_with('_')));
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn ranking_ties_keep_insertion_order_and_limit() {
        let records = vec![record("a", 0.5, 0), record("b", 0.5, 0), record("c", 0.5, 0)];
        let ranked = rank_for_context(&records, None, 2, "_", &SalienceConfig::default());
        let keys: Vec<&str> = ranked.iter().map(|s| s.record.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn old_confident_record_loses_to_recent_one() {
        let a = record("a", 0.9, 20);
        let b = record("b", 0.6, 1);
        let config = SalienceConfig::default();

        assert!(recall_salience(&a, now(), "_", &config).is_none());
        let b_salience = recall_salience(&b, now(), "_", &config).expect("eligible");
        assert!((b_salience - 0.6 * (1.0 - 1.0 / 14.0)).abs() < 1e-6);

        let records = vec![a, b];
        let mut rng = StdRng::seed_from_u64(7);
        let pick = select_recall(&records, now(), "_", &config, &mut rng).expect("candidate");
        assert_eq!(pick.record.key, "b");
    }

    #[test]
    fn recall_respects_cooldown_and_confidence() {
        let config = SalienceConfig::default();
        let mut recent = record("x", 0.9, 2);
        recent.last_referenced = Some(now() - Duration::hours(3));
        assert!(recall_salience(&recent, now(), "_", &config).is_none());

        recent.last_referenced = Some(now() - Duration::hours(30));
        assert!(recall_salience(&recent, now(), "_", &config).is_some());

        assert!(recall_salience(&record("y", 0.59, 0), now(), "_", &config).is_none());
        assert!(recall_salience(&record("_y", 1.0, 0), now(), "_", &config).is_none());
    }

    #[test]
    fn recency_is_floored_and_preferences_boosted() {
        let config = SalienceConfig::default();
        let old = record("old", 1.0, 13);
        assert!((recall_salience(&old, now(), "_", &config).expect("eligible") - 0.5).abs() < 1e-6);

        let mut pref = record("pref", 1.0, 0);
        pref.record_type = RecordType::Preference;
        assert!((recall_salience(&pref, now(), "_", &config).expect("eligible") - 1.2).abs() < 1e-6);
    }

    #[test]
    fn pick_is_always_among_top_three() {
        let records: Vec<MemoryRecord> = (0..8)
            .map(|i| record(&format!("k{i}"), 0.6 + 0.05 * i as f32, 0))
            .collect();
        let config = SalienceConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let pick = select_recall(&records, now(), "_", &config, &mut rng).expect("candidate");
            assert!(["k7", "k6", "k5"].contains(&pick.record.key.as_str()));
        }
    }

    #[test]
    fn empty_pool_yields_none() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(select_recall(&[], now(), "_", &SalienceConfig::default(), &mut rng).is_none());
    }
}
