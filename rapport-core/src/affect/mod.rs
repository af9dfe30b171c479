//! Affect: how the user seems to feel, and how the agent "feels" back.
//!
//! Both sides share one state machine, [`AffectState`], generic over the
//! label set. Raw per-turn readings are noisy (one "ugh" does not make a
//! user frustrated), so readings pass through hysteretic smoothing:
//!
//! ```text
//! same label            intensity = held·(1−α) + new·α
//! other label, new < θ  keep label, intensity ·= 0.9
//! other label, new ≥ θ  switch,     intensity = max(0.5, ½·held + ½·new)
//! ```
//!
//! with α = 0.3 and θ = 0.5 by default.

pub mod agent;
pub mod reply;
pub mod user;

pub use agent::{detect_agent_emotion, AgentEmotion, AgentSignals};
pub use reply::{classify_reply, open_share, ReplyType, ReplyWindow};
pub use user::{detect_user_emotion, UserEmotion};

use serde::{Deserialize, Serialize};

use crate::config::AffectConfig;
use crate::types::unit;

/// A label set an [`AffectState`] can hold.
pub trait AffectLabel: Copy + Eq + std::fmt::Debug {
    /// The resting label.
    fn neutral() -> Self;
}

/// One raw, unsmoothed classification.
#[derive(Debug, Clone, PartialEq)]
pub struct AffectReading<L> {
    /// Winning label.
    pub label: L,
    /// Confidence / intensity (0.0–1.0).
    pub intensity: f32,
    /// Human-readable reasons, e.g. `"lexicon:sad:tired"`.
    pub signals: Vec<String>,
}

/// How a reading changed the held state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition<L> {
    /// Same label; intensity blended.
    Reinforced,
    /// Different label too weak to switch; held label kept and faded.
    Held,
    /// Label switched away from `from`.
    Switched {
        /// Previously held label.
        from: L,
    },
}

/// A smoothed affect state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffectState<L> {
    /// Held label.
    pub label: L,
    /// Held intensity (0.0–1.0).
    pub intensity: f32,
}

impl<L: AffectLabel> AffectState<L> {
    /// Start at `label` with `intensity`.
    #[must_use]
    pub fn new(label: L, intensity: f32) -> Self {
        Self {
            label,
            intensity: unit(intensity),
        }
    }

    /// Start at the neutral label.
    #[must_use]
    pub fn neutral(intensity: f32) -> Self {
        Self::new(L::neutral(), intensity)
    }

    /// Fold a raw reading into the held state.
    pub fn smooth(&mut self, label: L, intensity: f32, config: &AffectConfig) -> Transition<L> {
        let new = unit(intensity);
        if label == self.label {
            let alpha = unit(config.smoothing_alpha);
            self.intensity = unit(self.intensity * (1.0 - alpha) + new * alpha);
            Transition::Reinforced
        } else if new < config.switch_threshold {
            self.intensity = unit(self.intensity * config.hold_decay);
            Transition::Held
        } else {
            let from = self.label;
            self.label = label;
            let blend = unit(config.switch_blend);
            let blended = self.intensity * (1.0 - blend) + new * blend;
            self.intensity = unit(blended.max(config.switch_floor));
            Transition::Switched { from }
        }
    }

    /// Fold a full reading.
    pub fn apply(&mut self, reading: &AffectReading<L>, config: &AffectConfig) -> Transition<L> {
        self.smooth(reading.label, reading.intensity, config)
    }
}
