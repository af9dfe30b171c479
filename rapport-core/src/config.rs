//! Configuration for the rapport core.
//!
//! Maps directly to `rapport.toml`. Every tuned constant (decay rates,
//! multipliers, cooldown lengths, thresholds) lives here so deployments can
//! override it instead of the code guessing at "correct" values.

use serde::{Deserialize, Serialize};

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RapportConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Persistence backend settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Record store behavior.
    #[serde(default)]
    pub store: StoreConfig,
    /// Retrieval ranking and proactive recall.
    #[serde(default)]
    pub salience: SalienceConfig,
    /// Personality trait learning and decay.
    #[serde(default)]
    pub traits: TraitConfig,
    /// Relationship depth and milestones.
    #[serde(default)]
    pub relationship: RelationshipConfig,
    /// Affect detection and smoothing.
    #[serde(default)]
    pub affect: AffectConfig,
    /// Dialogue policy arbitration.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Per-turn orchestration cadence.
    #[serde(default)]
    pub turn: TurnConfig,
}

impl RapportConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `RapportError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::RapportError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Initial value of the persisted `memory_enabled` flag for new documents.
    #[serde(default = "default_true")]
    pub memory_enabled: bool,
    /// Initial value of the persisted `traits_enabled` flag for new documents.
    #[serde(default = "default_true")]
    pub traits_enabled: bool,
    /// The user's wall-clock offset from UTC, in minutes.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            memory_enabled: true,
            traits_enabled: true,
            utc_offset_minutes: 0,
        }
    }
}

/// Persistence / save configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Backend: "json", "sqlite" or "memory".
    #[serde(default = "default_json")]
    pub backend: String,
    /// Location of the persisted document.
    #[serde(default = "default_path")]
    pub path: String,
    /// Use WAL mode (sqlite backend only).
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Number of rotating backups to keep (sqlite backend only).
    #[serde(default = "default_3_u32")]
    pub backup_count: u32,
    /// Detect save corruption via checksums (sqlite backend only).
    #[serde(default = "default_true")]
    pub checksum_enabled: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: "json".to_string(),
            path: "rapport.json".to_string(),
            wal_mode: true,
            backup_count: 3,
            checksum_enabled: true,
        }
    }
}

/// Record store behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Confidence added when an existing record is observed again.
    #[serde(default = "default_0_1")]
    pub reaffirm_increment: f32,
    /// Key prefix marking internally namespaced records.
    #[serde(default = "default_internal_prefix")]
    pub internal_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            reaffirm_increment: 0.1,
            internal_prefix: "_".to_string(),
        }
    }
}

/// Retrieval ranking and proactive-recall tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalienceConfig {
    /// Number of records returned by contextual ranking.
    #[serde(default = "default_5_usize")]
    pub context_top_n: usize,
    /// Multiplier for records carrying an emotion tag.
    #[serde(default = "default_1_5")]
    pub emotion_weight: f64,
    /// Multiplier for records that were ever referenced.
    #[serde(default = "default_1_2")]
    pub referenced_weight: f64,
    /// Minimum confidence for a proactive-recall candidate.
    #[serde(default = "default_0_6")]
    pub recall_min_confidence: f32,
    /// Candidates must have been created within this many days.
    #[serde(default = "default_14")]
    pub recall_window_days: f64,
    /// Candidates must not have been referenced within this many hours.
    #[serde(default = "default_24")]
    pub recall_cooldown_hours: f64,
    /// Floor of the recall recency multiplier.
    #[serde(default = "default_0_5_f64")]
    pub recall_min_recency: f64,
    /// Multiplier for preference-type records.
    #[serde(default = "default_1_2")]
    pub preference_multiplier: f64,
    /// Size of the top-salience pool.
    #[serde(default = "default_5_usize")]
    pub recall_pool_size: usize,
    /// The random pick is made among this many best candidates.
    #[serde(default = "default_3_usize")]
    pub recall_pick_from: usize,
}

impl Default for SalienceConfig {
    fn default() -> Self {
        Self {
            context_top_n: 5,
            emotion_weight: 1.5,
            referenced_weight: 1.2,
            recall_min_confidence: 0.6,
            recall_window_days: 14.0,
            recall_cooldown_hours: 24.0,
            recall_min_recency: 0.5,
            preference_multiplier: 1.2,
            recall_pool_size: 5,
            recall_pick_from: 3,
        }
    }
}

/// Personality trait learning, decay and retirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraitConfig {
    /// Run the decay pass every N turns.
    #[serde(default = "default_5_u64")]
    pub decay_interval_turns: u64,
    /// Per-day multiplicative score decay.
    #[serde(default = "default_0_98")]
    pub score_decay_per_day: f64,
    /// Per-day multiplicative salience decay.
    #[serde(default = "default_0_97")]
    pub salience_decay_per_day: f64,
    /// Retirement requires salience below this.
    #[serde(default = "default_0_05")]
    pub retire_salience_below: f32,
    /// Retirement requires score below this.
    #[serde(default = "default_0_2")]
    pub retire_score_below: f32,
    /// Retirement requires at least this many days without an update.
    #[serde(default = "default_30")]
    pub retire_after_days: f64,
    /// Maximum simultaneously active traits.
    #[serde(default = "default_8")]
    pub max_active: usize,
    /// Score assigned to a newly observed trait.
    #[serde(default = "default_0_3")]
    pub initial_score: f32,
    /// Salience assigned to a newly observed trait.
    #[serde(default = "default_0_5")]
    pub initial_salience: f32,
    /// Upper bound of a single score increment.
    #[serde(default = "default_0_05")]
    pub max_score_increment: f32,
    /// Fraction of the remaining headroom added per observation.
    #[serde(default = "default_0_1")]
    pub headroom_rate: f32,
    /// Salience added per observation.
    #[serde(default = "default_0_05")]
    pub salience_boost: f32,
    /// Both members above this score trigger conflict resolution.
    #[serde(default = "default_0_7")]
    pub conflict_threshold: f32,
    /// Score removed from the weaker member of a conflicting pair.
    #[serde(default = "default_0_05")]
    pub conflict_penalty: f32,
    /// Conflict resolution never lowers a score below this.
    #[serde(default = "default_0_5")]
    pub conflict_floor: f32,
    /// Anti-correlated trait id pairs.
    #[serde(default = "default_anti_correlated")]
    pub anti_correlated: Vec<(String, String)>,
    /// Snapshot active traits into the history every N turns.
    #[serde(default = "default_25_u64")]
    pub snapshot_interval_turns: u64,
}

impl Default for TraitConfig {
    fn default() -> Self {
        Self {
            decay_interval_turns: 5,
            score_decay_per_day: 0.98,
            salience_decay_per_day: 0.97,
            retire_salience_below: 0.05,
            retire_score_below: 0.2,
            retire_after_days: 30.0,
            max_active: 8,
            initial_score: 0.3,
            initial_salience: 0.5,
            max_score_increment: 0.05,
            headroom_rate: 0.1,
            salience_boost: 0.05,
            conflict_threshold: 0.7,
            conflict_penalty: 0.05,
            conflict_floor: 0.5,
            anti_correlated: default_anti_correlated(),
            snapshot_interval_turns: 25,
        }
    }
}

/// Relationship depth formula and milestone thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipConfig {
    /// `turn_score = min(turn_cap, turn_factor·√turns)`.
    #[serde(default = "default_50_f64")]
    pub turn_cap: f64,
    /// Multiplier on the square root of the turn count.
    #[serde(default = "default_2_f64")]
    pub turn_factor: f64,
    /// `time_score = min(time_cap, per_day·days)`.
    #[serde(default = "default_30")]
    pub time_cap: f64,
    /// Points per day since first contact.
    #[serde(default = "default_0_5_f64")]
    pub per_day: f64,
    /// `joke_score = min(joke_cap, per_joke·jokes)`.
    #[serde(default = "default_10_f64")]
    pub joke_cap: f64,
    /// Points per inside joke.
    #[serde(default = "default_2_f64")]
    pub per_joke: f64,
    /// `reveal_score = min(reveal_cap, per_reveal·reveals)`.
    #[serde(default = "default_10_f64")]
    pub reveal_cap: f64,
    /// Points per personal reveal.
    #[serde(default = "default_1_5")]
    pub per_reveal: f64,
    /// Depth ceiling.
    #[serde(default = "default_100_f64")]
    pub max_depth: f64,
    /// Turn counts that fire a conversation milestone.
    #[serde(default = "default_conversation_milestones")]
    pub conversation_milestones: Vec<u64>,
    /// Depth values that fire a depth milestone.
    #[serde(default = "default_depth_milestones")]
    pub depth_milestones: Vec<u64>,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            turn_cap: 50.0,
            turn_factor: 2.0,
            time_cap: 30.0,
            per_day: 0.5,
            joke_cap: 10.0,
            per_joke: 2.0,
            reveal_cap: 10.0,
            per_reveal: 1.5,
            max_depth: 100.0,
            conversation_milestones: default_conversation_milestones(),
            depth_milestones: default_depth_milestones(),
        }
    }
}

/// Affect detection and smoothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectConfig {
    /// Exponential blend factor for same-label readings.
    #[serde(default = "default_0_3")]
    pub smoothing_alpha: f32,
    /// Readings at or above this intensity may switch the held label.
    #[serde(default = "default_0_5")]
    pub switch_threshold: f32,
    /// Held intensity is multiplied by this on a rejected low reading.
    #[serde(default = "default_0_9")]
    pub hold_decay: f32,
    /// Weight of the new reading when the label switches.
    #[serde(default = "default_0_5")]
    pub switch_blend: f32,
    /// Floor of the intensity after a label switch.
    #[serde(default = "default_0_5")]
    pub switch_floor: f32,
    /// Confidence reported when no user-emotion signal fires.
    #[serde(default = "default_0_3")]
    pub neutral_confidence: f32,
    /// Baseline score of the agent's neutral label.
    #[serde(default = "default_0_2")]
    pub agent_baseline: f32,
    /// Hours of absence after which the agent starts to feel lonely.
    #[serde(default = "default_24")]
    pub lonely_after_hours: f64,
    /// Hours of absence treated as a long absence.
    #[serde(default = "default_72")]
    pub long_absence_hours: f64,
    /// Interactions in one day after which the agent tires.
    #[serde(default = "default_30_u32")]
    pub busy_day_interactions: u32,
    /// Consecutive positive user turns that count as a streak.
    #[serde(default = "default_3_u32")]
    pub positive_streak: u32,
    /// Points each user-emotion cue contributes.
    #[serde(default)]
    pub user_weights: UserAffectWeights,
    /// Points each agent-emotion rule contributes.
    #[serde(default)]
    pub agent_weights: AgentAffectWeights,
}

impl Default for AffectConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: 0.3,
            switch_threshold: 0.5,
            hold_decay: 0.9,
            switch_blend: 0.5,
            switch_floor: 0.5,
            neutral_confidence: 0.3,
            agent_baseline: 0.2,
            lonely_after_hours: 24.0,
            long_absence_hours: 72.0,
            busy_day_interactions: 30,
            positive_streak: 3,
            user_weights: UserAffectWeights::default(),
            agent_weights: AgentAffectWeights::default(),
        }
    }
}

/// User-emotion cue weights. Scores per label add up and are clamped to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAffectWeights {
    /// Each lexicon keyword found in the utterance.
    #[serde(default = "default_0_35_f32")]
    pub keyword: f32,
    /// A `!!` anywhere in the utterance (toward excited).
    #[serde(default = "default_0_4")]
    pub double_bang: f32,
    /// A single `!` (toward excited).
    #[serde(default = "default_0_2")]
    pub bang: f32,
    /// A silent reply (toward withdrawn).
    #[serde(default = "default_0_5")]
    pub silence: f32,
    /// Mostly closed or silent recent replies (toward withdrawn).
    #[serde(default = "default_0_4")]
    pub closed_window: f32,
    /// Replies the window must hold before the closed-window cue applies.
    #[serde(default = "default_3_usize")]
    pub closed_window_min_turns: usize,
}

impl Default for UserAffectWeights {
    fn default() -> Self {
        Self {
            keyword: 0.35,
            double_bang: 0.4,
            bang: 0.2,
            silence: 0.5,
            closed_window: 0.4,
            closed_window_min_turns: 3,
        }
    }
}

/// Agent-emotion rule weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAffectWeights {
    /// Share of open replies at which the user counts as engaged.
    #[serde(default = "default_0_6")]
    pub engaged_open_share: f32,
    /// Engaged user, toward curious.
    #[serde(default = "default_0_4")]
    pub engaged_curious: f32,
    /// Happy user, toward cheerful.
    #[serde(default = "default_0_5")]
    pub happy_cheerful: f32,
    /// Excited user, toward cheerful.
    #[serde(default = "default_0_3")]
    pub excited_cheerful: f32,
    /// Excited user, toward playful.
    #[serde(default = "default_0_4")]
    pub excited_playful: f32,
    /// Sad, anxious or frustrated user, toward concerned.
    #[serde(default = "default_0_6")]
    pub distressed_concerned: f32,
    /// Sad, anxious or frustrated user, toward affectionate.
    #[serde(default = "default_0_3")]
    pub distressed_affectionate: f32,
    /// Withdrawn user, toward concerned.
    #[serde(default = "default_0_4")]
    pub withdrawn_concerned: f32,
    /// Tired user, toward concerned.
    #[serde(default = "default_0_3")]
    pub tired_concerned: f32,
    /// Absence past `lonely_after_hours`, toward lonely.
    #[serde(default = "default_0_4")]
    pub absence_lonely: f32,
    /// Absence past `long_absence_hours`, extra toward lonely.
    #[serde(default = "default_0_3")]
    pub long_absence_lonely: f32,
    /// Absence past `long_absence_hours`, toward affectionate.
    #[serde(default = "default_0_3")]
    pub reunion_affectionate: f32,
    /// Busy day, toward tired.
    #[serde(default = "default_0_5")]
    pub busy_day_tired: f32,
    /// Positive streak, toward playful.
    #[serde(default = "default_0_3")]
    pub streak_playful: f32,
    /// Positive streak, toward affectionate.
    #[serde(default = "default_0_2")]
    pub streak_affectionate: f32,
    /// Morning, toward cheerful.
    #[serde(default = "default_0_1")]
    pub morning_cheerful: f32,
    /// Afternoon, toward curious.
    #[serde(default = "default_0_1")]
    pub afternoon_curious: f32,
    /// Evening, toward affectionate.
    #[serde(default = "default_0_1")]
    pub evening_affectionate: f32,
    /// Night, toward tired.
    #[serde(default = "default_0_15")]
    pub night_tired: f32,
}

impl Default for AgentAffectWeights {
    fn default() -> Self {
        Self {
            engaged_open_share: 0.6,
            engaged_curious: 0.4,
            happy_cheerful: 0.5,
            excited_cheerful: 0.3,
            excited_playful: 0.4,
            distressed_concerned: 0.6,
            distressed_affectionate: 0.3,
            withdrawn_concerned: 0.4,
            tired_concerned: 0.3,
            absence_lonely: 0.4,
            long_absence_lonely: 0.3,
            reunion_affectionate: 0.3,
            busy_day_tired: 0.5,
            streak_playful: 0.3,
            streak_affectionate: 0.2,
            morning_cheerful: 0.1,
            afternoon_curious: 0.1,
            evening_affectionate: 0.1,
            night_tired: 0.15,
        }
    }
}

/// Dialogue policy arbitration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Turns that must pass after a question before another is allowed.
    #[serde(default = "default_3_u32")]
    pub question_cooldown_turns: u32,
    /// Replies with at most this many words may be classified closed.
    #[serde(default = "default_3_usize")]
    pub closed_max_words: usize,
    /// ...and must also be shorter than this many characters.
    #[serde(default = "default_20_usize")]
    pub closed_max_chars: usize,
    /// Mean user message length below which verbosity is short.
    #[serde(default = "default_20_usize")]
    pub short_verbosity_chars: usize,
    /// Mean user message length at or above which verbosity is long.
    #[serde(default = "default_100_usize")]
    pub long_verbosity_chars: usize,
    /// Agent replies longer than this are classified as stories.
    #[serde(default = "default_280_usize")]
    pub story_min_chars: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            question_cooldown_turns: 3,
            closed_max_words: 3,
            closed_max_chars: 20,
            short_verbosity_chars: 20,
            long_verbosity_chars: 100,
            story_min_chars: 280,
        }
    }
}

/// Per-turn orchestration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// Chance per turn that a proactive recall candidate is selected.
    #[serde(default = "default_0_35")]
    pub recall_probability: f64,
    /// Whether every turn is appended to the episode log.
    #[serde(default = "default_true")]
    pub log_episodes: bool,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            recall_probability: 0.35,
            log_episodes: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_json() -> String { "json".to_string() }
fn default_path() -> String { "rapport.json".to_string() }
fn default_internal_prefix() -> String { "_".to_string() }
fn default_anti_correlated() -> Vec<(String, String)> {
    [
        ("playful", "serious"),
        ("talkative", "reserved"),
        ("optimistic", "pessimistic"),
        ("spontaneous", "methodical"),
        ("adventurous", "cautious"),
    ]
    .into_iter()
    .map(|(a, b)| (a.to_string(), b.to_string()))
    .collect()
}
fn default_conversation_milestones() -> Vec<u64> { vec![1, 10, 25, 50, 100, 250, 500, 1000] }
fn default_depth_milestones() -> Vec<u64> { vec![25, 50, 75, 100] }
fn default_0_05() -> f32 { 0.05 }
fn default_0_1() -> f32 { 0.1 }
fn default_0_15() -> f32 { 0.15 }
fn default_0_2() -> f32 { 0.2 }
fn default_0_3() -> f32 { 0.3 }
fn default_0_35_f32() -> f32 { 0.35 }
fn default_0_4() -> f32 { 0.4 }
fn default_0_5() -> f32 { 0.5 }
fn default_0_6() -> f32 { 0.6 }
fn default_0_7() -> f32 { 0.7 }
fn default_0_9() -> f32 { 0.9 }
fn default_0_35() -> f64 { 0.35 }
fn default_0_5_f64() -> f64 { 0.5 }
fn default_0_97() -> f64 { 0.97 }
fn default_0_98() -> f64 { 0.98 }
fn default_1_2() -> f64 { 1.2 }
fn default_1_5() -> f64 { 1.5 }
fn default_2_f64() -> f64 { 2.0 }
fn default_10_f64() -> f64 { 10.0 }
fn default_14() -> f64 { 14.0 }
fn default_24() -> f64 { 24.0 }
fn default_30() -> f64 { 30.0 }
fn default_50_f64() -> f64 { 50.0 }
fn default_72() -> f64 { 72.0 }
fn default_100_f64() -> f64 { 100.0 }
fn default_3_u32() -> u32 { 3 }
fn default_30_u32() -> u32 { 30 }
fn default_3_usize() -> usize { 3 }
fn default_5_usize() -> usize { 5 }
fn default_8() -> usize { 8 }
fn default_20_usize() -> usize { 20 }
fn default_100_usize() -> usize { 100 }
fn default_280_usize() -> usize { 280 }
fn default_5_u64() -> u64 { 5 }
fn default_25_u64() -> u64 { 25 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = RapportConfig::from_toml("").expect("parse");
        assert_eq!(config.traits.max_active, 8);
        assert_eq!(config.policy.question_cooldown_turns, 3);
        assert!((config.salience.emotion_weight - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.persistence.backend, "json");
    }

    #[test]
    fn partial_sections_override_only_named_fields() {
        let config = RapportConfig::from_toml(
            r#"
            [policy]
            question_cooldown_turns = 5

            [traits]
            anti_correlated = [["bold", "shy"]]
            "#,
        )
        .expect("parse");
        assert_eq!(config.policy.question_cooldown_turns, 5);
        assert_eq!(config.policy.story_min_chars, 280);
        assert_eq!(
            config.traits.anti_correlated,
            vec![("bold".to_string(), "shy".to_string())]
        );
        assert!((config.traits.score_decay_per_day - 0.98).abs() < f64::EPSILON);
    }

    #[test]
    fn backup_count_defaults_to_three() {
        let config = RapportConfig::from_toml("[persistence]\nbackend = \"sqlite\"\n").expect("parse");
        assert_eq!(config.persistence.backup_count, 3);
    }

    #[test]
    fn affect_weights_override_individually() {
        let config = RapportConfig::from_toml(
            r#"
            [affect.agent_weights]
            night_tired = 0.5

            [affect.user_weights]
            silence = 0.8
            "#,
        )
        .expect("parse");
        assert!((config.affect.agent_weights.night_tired - 0.5).abs() < f32::EPSILON);
        assert!((config.affect.agent_weights.morning_cheerful - 0.1).abs() < f32::EPSILON);
        assert!((config.affect.user_weights.silence - 0.8).abs() < f32::EPSILON);
        assert_eq!(config.affect.user_weights.closed_window_min_turns, 3);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = RapportConfig::from_toml("[policy\n").expect_err("should fail");
        assert!(matches!(err, crate::RapportError::Config(_)));
    }
}
