//! Relationship depth, milestones and anniversaries.
//!
//! Depth is a 0–100 summary of how well the agent knows the user:
//!
//! ```text
//! depth = round(min(100, turn + time + joke + reveal))
//!   turn   = min(50, 2·√turns)
//!   time   = min(30, 0.5·days_since_first_contact)
//!   joke   = min(10, 2·inside_jokes)
//!   reveal = min(10, 1.5·personal_reveals)
//! ```
//!
//! The stored depth is a ratchet: it is only ever replaced by a strictly
//! greater value, so a relationship never "cools" in the persisted state.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::RelationshipConfig;
use crate::memory::{
    DailyCount, Milestone, MilestoneKind, MemoryDocument, RelationshipState, SignificantMoment,
};
use crate::types::{days_between, hours_between, local_time, MomentId};

// ---------------------------------------------------------------------------
// Depth
// ---------------------------------------------------------------------------

/// Everything the depth formula reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthInputs {
    /// Processed turns.
    pub turns: u64,
    /// Days since first contact.
    pub days_known: f64,
    /// Inside jokes on file.
    pub inside_jokes: usize,
    /// Personal reveals counted.
    pub personal_reveals: u32,
}

impl DepthInputs {
    /// Read the inputs out of a document.
    #[must_use]
    pub fn from_document(doc: &MemoryDocument, now: DateTime<Utc>) -> Self {
        Self {
            turns: doc.turn_count,
            days_known: doc
                .relationship
                .first_contact
                .map_or(0.0, |first| days_between(first, now)),
            inside_jokes: doc.inside_jokes.len(),
            personal_reveals: doc.relationship.personal_reveals,
        }
    }
}

/// Compute the un-ratcheted depth.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn compute_depth(inputs: &DepthInputs, config: &RelationshipConfig) -> u32 {
    let turn = (config.turn_factor * (inputs.turns as f64).sqrt()).min(config.turn_cap);
    let time = (config.per_day * inputs.days_known).min(config.time_cap);
    let joke = (config.per_joke * inputs.inside_jokes as f64).min(config.joke_cap);
    let reveal = (config.per_reveal * f64::from(inputs.personal_reveals)).min(config.reveal_cap);

    let total = (turn + time + joke + reveal).min(config.max_depth).max(0.0);
    total.round() as u32
}

/// Raise the stored depth to `candidate` if it is strictly greater.
/// Returns whether the stored value changed.
pub fn update_depth(state: &mut RelationshipState, candidate: u32) -> bool {
    if candidate > state.depth {
        state.depth = candidate;
        true
    } else {
        false
    }
}

// ---------------------------------------------------------------------------
// Interaction bookkeeping
// ---------------------------------------------------------------------------

/// Timing facts about the interaction just recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionTiming {
    /// Hours since the previous interaction (`None` on first contact).
    pub hours_since_last: Option<f64>,
    /// Interactions today, including this one.
    pub interactions_today: u32,
}

/// Note an interaction at `now`: first contact, last interaction and the
/// per-day counter (days follow the user's wall clock).
pub fn record_interaction(
    state: &mut RelationshipState,
    now: DateTime<Utc>,
    utc_offset_minutes: i32,
) -> InteractionTiming {
    let hours_since_last = state.last_interaction.map(|last| hours_between(last, now));
    state.first_contact.get_or_insert(now);
    state.last_interaction = Some(now);

    let day = local_time(now, utc_offset_minutes).date_naive();
    let count = state.interactions_on(day).saturating_add(1);
    state.today = Some(DailyCount { day, count });

    InteractionTiming {
        hours_since_last,
        interactions_today: count,
    }
}

// ---------------------------------------------------------------------------
// Milestones
// ---------------------------------------------------------------------------

/// Record every threshold reached but not yet on file. Returns the new ones.
///
/// Thresholds skipped over (e.g. after importing an old document) are
/// caught up in one call. Calling again with the same inputs adds nothing.
pub fn detect_milestones(
    milestones: &mut Vec<Milestone>,
    turns: u64,
    depth: u32,
    now: DateTime<Utc>,
    config: &RelationshipConfig,
) -> Vec<Milestone> {
    let reached = config
        .conversation_milestones
        .iter()
        .filter(|&&t| turns >= t)
        .map(|&t| (MilestoneKind::Conversations, t))
        .chain(
            config
                .depth_milestones
                .iter()
                .filter(|&&d| u64::from(depth) >= d)
                .map(|&d| (MilestoneKind::Depth, d)),
        );

    let mut fresh = Vec::new();
    for (kind, value) in reached {
        if milestones.iter().any(|m| m.is(kind, value)) {
            continue;
        }
        let milestone = Milestone {
            kind,
            value,
            reached_at: now,
        };
        info!(kind = ?kind, value, "Milestone reached");
        milestones.push(milestone.clone());
        fresh.push(milestone);
    }
    fresh
}

// ---------------------------------------------------------------------------
// Anniversaries
// ---------------------------------------------------------------------------

/// An anniversary that fired this turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anniversary {
    /// The moment being celebrated.
    pub moment_id: MomentId,
    /// Its description.
    pub description: String,
    /// Whole years since the anchor date.
    pub years: i32,
}

fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

/// Whether `today` is the anniversary of `anchor` (ignoring the year).
/// A 29 February anchor is observed on 28 February in common years.
#[must_use]
pub fn falls_on(anchor: NaiveDate, today: NaiveDate) -> bool {
    if anchor.month() == today.month() && anchor.day() == today.day() {
        return true;
    }
    anchor.month() == 2
        && anchor.day() == 29
        && today.month() == 2
        && today.day() == 28
        && !is_leap_year(today.year())
}

/// Fire anniversaries of recurring moments falling on today's date.
///
/// Only years after the anchor year count. Each moment fires at most once
/// per calendar year: the year of `last_celebrated` is compared, not the
/// time elapsed since it.
pub fn detect_anniversaries(
    moments: &mut [SignificantMoment],
    now: DateTime<Utc>,
    utc_offset_minutes: i32,
) -> Vec<Anniversary> {
    let today = local_time(now, utc_offset_minutes).date_naive();
    let mut fired = Vec::new();

    for moment in moments.iter_mut().filter(|m| m.recurring) {
        if today.year() <= moment.anchor.year() || !falls_on(moment.anchor, today) {
            continue;
        }
        let celebrated_this_year = moment
            .last_celebrated
            .is_some_and(|at| local_time(at, utc_offset_minutes).year() == today.year());
        if celebrated_this_year {
            continue;
        }

        moment.last_celebrated = Some(now);
        let years = today.year() - moment.anchor.year();
        info!(moment = %moment.id, years, "Anniversary");
        fired.push(Anniversary {
            moment_id: moment.id,
            description: moment.description.clone(),
            years,
        });
    }
    fired
}
