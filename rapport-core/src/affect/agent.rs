//! Agent-emotion detection.
//!
//! The agent's apparent mood is a reaction to the relationship, not to the
//! words of a single message: how engaged the user has been, how long they
//! were away, how busy the day was, and the time of day.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::user::UserEmotion;
use super::{AffectLabel, AffectReading};
use crate::config::AffectConfig;
use crate::types::{unit, TimeOfDay};

/// What the agent presents as feeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentEmotion {
    /// Neutral baseline.
    Content,
    /// Upbeat.
    Cheerful,
    /// Interested, wants to know more.
    Curious,
    /// Teasing, light.
    Playful,
    /// Warm.
    Affectionate,
    /// Missed the user.
    Lonely,
    /// Low energy.
    Tired,
    /// Worried about the user.
    Concerned,
}

impl AffectLabel for AgentEmotion {
    fn neutral() -> Self {
        Self::Content
    }
}

impl fmt::Display for AgentEmotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Content => "content",
            Self::Cheerful => "cheerful",
            Self::Curious => "curious",
            Self::Playful => "playful",
            Self::Affectionate => "affectionate",
            Self::Lonely => "lonely",
            Self::Tired => "tired",
            Self::Concerned => "concerned",
        };
        f.write_str(s)
    }
}

/// Inputs to [`detect_agent_emotion`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentSignals {
    /// Share of open replies in the recent window.
    pub open_share: f32,
    /// The user's current (smoothed) emotion.
    pub user_emotion: UserEmotion,
    /// Hours since the previous interaction, if any.
    pub hours_since_last: Option<f64>,
    /// Interactions so far today.
    pub interactions_today: u32,
    /// Consecutive turns with a positive user emotion.
    pub positive_streak: u32,
    /// The user's local time of day.
    pub time_of_day: TimeOfDay,
}

// Tie-break order: Content first so a tie never leaves the baseline.
const ORDER: [AgentEmotion; 8] = [
    AgentEmotion::Content,
    AgentEmotion::Cheerful,
    AgentEmotion::Curious,
    AgentEmotion::Playful,
    AgentEmotion::Affectionate,
    AgentEmotion::Lonely,
    AgentEmotion::Tired,
    AgentEmotion::Concerned,
];

struct Tally {
    points: [f32; ORDER.len()],
    signals: Vec<String>,
}

impl Tally {
    fn add(&mut self, label: AgentEmotion, amount: f32, signal: &str) {
        if let Some(idx) = ORDER.iter().position(|l| *l == label) {
            self.points[idx] += amount;
        }
        self.signals.push(format!("{signal}:{label}"));
    }
}

/// Score every label and pick the highest; ties favour `Content`.
#[must_use]
pub fn detect_agent_emotion(
    signals: &AgentSignals,
    config: &AffectConfig,
) -> AffectReading<AgentEmotion> {
    let mut tally = Tally {
        points: [0.0; ORDER.len()],
        signals: Vec::new(),
    };
    tally.points[0] = config.agent_baseline;
    let w = &config.agent_weights;

    // Engagement quality.
    if signals.open_share >= w.engaged_open_share {
        tally.add(AgentEmotion::Curious, w.engaged_curious, "engaged");
    }
    match signals.user_emotion {
        UserEmotion::Happy => tally.add(AgentEmotion::Cheerful, w.happy_cheerful, "user_happy"),
        UserEmotion::Excited => {
            tally.add(AgentEmotion::Cheerful, w.excited_cheerful, "user_excited");
            tally.add(AgentEmotion::Playful, w.excited_playful, "user_excited");
        }
        UserEmotion::Sad | UserEmotion::Anxious | UserEmotion::Frustrated => {
            tally.add(AgentEmotion::Concerned, w.distressed_concerned, "user_distressed");
            tally.add(AgentEmotion::Affectionate, w.distressed_affectionate, "user_distressed");
        }
        UserEmotion::Withdrawn => {
            tally.add(AgentEmotion::Concerned, w.withdrawn_concerned, "user_withdrawn");
        }
        UserEmotion::Tired => tally.add(AgentEmotion::Concerned, w.tired_concerned, "user_tired"),
        UserEmotion::Neutral => {}
    }

    // Absence.
    if let Some(hours) = signals.hours_since_last {
        if hours >= config.lonely_after_hours {
            tally.add(AgentEmotion::Lonely, w.absence_lonely, "absence");
        }
        if hours >= config.long_absence_hours {
            tally.add(AgentEmotion::Lonely, w.long_absence_lonely, "long_absence");
            tally.add(AgentEmotion::Affectionate, w.reunion_affectionate, "reunion");
        }
    }

    // Busy day and warm streaks.
    if signals.interactions_today >= config.busy_day_interactions {
        tally.add(AgentEmotion::Tired, w.busy_day_tired, "busy_day");
    }
    if signals.positive_streak >= config.positive_streak {
        tally.add(AgentEmotion::Playful, w.streak_playful, "positive_streak");
        tally.add(AgentEmotion::Affectionate, w.streak_affectionate, "positive_streak");
    }

    // Time-of-day baseline.
    match signals.time_of_day {
        TimeOfDay::Morning => tally.add(AgentEmotion::Cheerful, w.morning_cheerful, "morning"),
        TimeOfDay::Afternoon => tally.add(AgentEmotion::Curious, w.afternoon_curious, "afternoon"),
        TimeOfDay::Evening => {
            tally.add(AgentEmotion::Affectionate, w.evening_affectionate, "evening");
        }
        TimeOfDay::Night => tally.add(AgentEmotion::Tired, w.night_tired, "night"),
    }

    let mut best = (AgentEmotion::Content, tally.points[0]);
    for (label, score) in ORDER.iter().zip(tally.points).skip(1) {
        if score > best.1 {
            best = (*label, score);
        }
    }

    AffectReading {
        label: best.0,
        intensity: unit(best.1.min(1.0)),
        signals: tally.signals,
    }
}
