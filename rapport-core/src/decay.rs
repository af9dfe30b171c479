//! Trait learning and forgetting.
//!
//! Personality traits follow a simple reinforcement/decay model:
//!
//! ```text
//! observe:  score    += min(0.05, (1 − score) × 0.1)
//!           salience  = min(1, salience + 0.05)
//! decay:    score    *= 0.98^days
//!           salience *= 0.97^days
//! retire:   salience < 0.05 ∧ score < 0.2 ∧ days_since_update ≥ 30
//! ```
//!
//! Score approaches 1.0 asymptotically, so no amount of evidence pushes it
//! out of range. Salience decays faster than score: a trait can be firmly
//! believed yet no longer worth mentioning.
//!
//! At most `max_active` traits are active at once. When the cap is exceeded
//! the weakest (`score × salience`) are retired, least recently updated
//! first on ties.
//!
//! Anti-correlated pairs (playful/serious…) can both climb high when the
//! user is inconsistent; [`resolve_conflicts`] nudges the weaker side down.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::TraitConfig;
use crate::memory::{PersonalityTrait, TraitCategory};
use crate::types::{days_between, unit, RankScore};

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// One piece of evidence for a trait.
#[derive(Debug, Clone, PartialEq)]
pub struct TraitObservation {
    /// Trait id, e.g. `"playful"`.
    pub id: String,
    /// Family used if the trait is new.
    pub category: TraitCategory,
    /// Evidence snippet.
    pub evidence: Option<String>,
    /// Where the evidence came from.
    pub source: Option<String>,
}

impl TraitObservation {
    /// Evidence-free observation.
    #[must_use]
    pub fn new(id: impl Into<String>, category: TraitCategory) -> Self {
        Self {
            id: id.into(),
            category,
            evidence: None,
            source: None,
        }
    }

    /// Attach an evidence snippet.
    #[must_use]
    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }

    /// Attach an evidence source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// What an observation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraitUpdate {
    /// A new trait was created.
    Created,
    /// An active trait was reinforced.
    Reinforced,
    /// A retired trait was reinforced and brought back.
    Reactivated,
}

/// Fold an observation into `traits`.
///
/// A trait that becomes active (created or reactivated) is exempt from the
/// cap enforcement that immediately follows; some other trait makes room.
pub fn observe_trait(
    traits: &mut Vec<PersonalityTrait>,
    observation: TraitObservation,
    now: DateTime<Utc>,
    config: &TraitConfig,
) -> TraitUpdate {
    let TraitObservation {
        id,
        category,
        evidence,
        source,
    } = observation;

    let update = if let Some(idx) = traits.iter().position(|t| t.id == id) {
        let existing = &mut traits[idx];
        let update = if existing.active {
            TraitUpdate::Reinforced
        } else {
            TraitUpdate::Reactivated
        };
        reinforce(existing, evidence, source, now, config);
        update
    } else {
        let mut created = PersonalityTrait::new(
            id.clone(),
            category,
            config.initial_score,
            config.initial_salience,
            now,
        );
        created.evidence_count = 1;
        if let Some(e) = evidence {
            created.evidence.push(e);
        }
        if let Some(s) = source {
            created.sources.push(s);
        }
        traits.push(created);
        TraitUpdate::Created
    };

    if update != TraitUpdate::Reinforced {
        let retired = enforce_active_cap(traits, config.max_active, Some(id.as_str()));
        if !retired.is_empty() {
            info!(trait_id = %id, retired = ?retired, "Trait cap enforced after activation");
        }
    }
    update
}

fn reinforce(
    t: &mut PersonalityTrait,
    evidence: Option<String>,
    source: Option<String>,
    now: DateTime<Utc>,
    config: &TraitConfig,
) {
    let headroom = (1.0 - t.score) * config.headroom_rate;
    t.score = unit(t.score + headroom.min(config.max_score_increment));
    t.salience = unit(t.salience + config.salience_boost);
    t.evidence_count = t.evidence_count.saturating_add(1);
    if let Some(e) = evidence {
        t.evidence.push(e);
    }
    if let Some(s) = source {
        t.sources.push(s);
    }
    t.active = true;
    t.updated_at = now;
}

// ---------------------------------------------------------------------------
// Decay pass
// ---------------------------------------------------------------------------

/// Outcome of one decay pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecayReport {
    /// Active traits whose weights were decayed.
    pub decayed: usize,
    /// Ids retired by the pass (threshold or cap).
    pub retired: Vec<String>,
}

/// Whether a cadence of `every` turns fires on `turn`. Zero disables it.
#[must_use]
pub fn is_due(turn: u64, every: u64) -> bool {
    every > 0 && turn > 0 && turn % every == 0
}

/// Decay every active trait, retire the faded ones, then enforce the cap.
///
/// Each pass only decays the days since the later of the last decay pass and
/// the last observation, so running it every few turns does not compound.
/// This departs from applying `rate^days_since_update` on every pass, which
/// would shrink a trait once per pass for the same elapsed time.
pub fn decay_traits(
    traits: &mut [PersonalityTrait],
    now: DateTime<Utc>,
    config: &TraitConfig,
) -> DecayReport {
    let mut report = DecayReport::default();

    for t in traits.iter_mut().filter(|t| t.active) {
        let days = days_between(t.decay_anchor(), now);
        if days > 0.0 {
            t.score = decayed(t.score, config.score_decay_per_day, days);
            t.salience = decayed(t.salience, config.salience_decay_per_day, days);
            t.decayed_at = Some(now);
            report.decayed += 1;
        }

        if t.salience < config.retire_salience_below
            && t.score < config.retire_score_below
            && days_between(t.updated_at, now) >= config.retire_after_days
        {
            t.active = false;
            report.retired.push(t.id.clone());
        }
    }

    report
        .retired
        .extend(enforce_active_cap(traits, config.max_active, None));

    debug!(
        decayed = report.decayed,
        retired = report.retired.len(),
        "Trait decay pass"
    );
    report
}

#[allow(clippy::cast_possible_truncation)]
fn decayed(value: f32, per_day: f64, days: f64) -> f32 {
    unit((f64::from(value) * per_day.powf(days)) as f32)
}

/// Retire the weakest active traits until at most `max_active` remain.
///
/// Weakest means lowest `score × salience`; ties go to the least recently
/// updated, then to id order. `protect` is never retired. Returns retired
/// ids in retirement order.
pub fn enforce_active_cap(
    traits: &mut [PersonalityTrait],
    max_active: usize,
    protect: Option<&str>,
) -> Vec<String> {
    let mut retired = Vec::new();
    let mut active = traits.iter().filter(|t| t.active).count();

    while active > max_active {
        let weakest = traits
            .iter_mut()
            .filter(|t| t.active && Some(t.id.as_str()) != protect)
            .min_by(|a, b| {
                RankScore::new(f64::from(a.weight()))
                    .cmp(&RankScore::new(f64::from(b.weight())))
                    .then(a.updated_at.cmp(&b.updated_at))
                    .then_with(|| a.id.cmp(&b.id))
            });
        let Some(weakest) = weakest else { break };
        weakest.active = false;
        retired.push(weakest.id.clone());
        active -= 1;
    }

    retired
}

// ---------------------------------------------------------------------------
// Conflicts
// ---------------------------------------------------------------------------

/// One conflict adjustment.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictAdjustment {
    /// Trait whose score was lowered.
    pub reduced: String,
    /// The stronger trait it conflicted with.
    pub against: String,
    /// Score after the adjustment.
    pub score: f32,
}

/// Lower the weaker member of every strongly held anti-correlated pair.
///
/// Both members must be active and above `conflict_threshold`. On equal
/// scores the second member of the configured pair is reduced.
pub fn resolve_conflicts(
    traits: &mut [PersonalityTrait],
    config: &TraitConfig,
) -> Vec<ConflictAdjustment> {
    let mut adjustments = Vec::new();

    for (first, second) in &config.anti_correlated {
        let find = |id: &str| traits.iter().position(|t| t.active && t.id == id);
        let (Some(i), Some(j)) = (find(first), find(second)) else {
            continue;
        };
        if i == j
            || traits[i].score <= config.conflict_threshold
            || traits[j].score <= config.conflict_threshold
        {
            continue;
        }

        let (loser, winner) = if traits[i].score < traits[j].score {
            (i, j)
        } else {
            (j, i)
        };
        let lowered = (traits[loser].score - config.conflict_penalty).max(config.conflict_floor);
        traits[loser].score = unit(lowered);

        debug!(
            reduced = %traits[loser].id,
            against = %traits[winner].id,
            score = traits[loser].score,
            "Trait conflict resolved"
        );
        adjustments.push(ConflictAdjustment {
            reduced: traits[loser].id.clone(),
            against: traits[winner].id.clone(),
            score: traits[loser].score,
        });
    }

    adjustments
}
