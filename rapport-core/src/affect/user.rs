//! User-emotion detection.
//!
//! Lexicon and punctuation heuristics over a single utterance, plus the
//! shape of recent replies. Deliberately shallow: the output only steers
//! tone, and smoothing absorbs the misfires.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::reply::{ReplyType, ReplyWindow};
use super::{AffectLabel, AffectReading};
use crate::config::AffectConfig;
use crate::types::unit;

/// What the user seems to feel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserEmotion {
    /// No clear signal.
    Neutral,
    /// Content, pleased.
    Happy,
    /// Energized, enthusiastic.
    Excited,
    /// Down, hurting.
    Sad,
    /// Worried, nervous.
    Anxious,
    /// Annoyed, stuck.
    Frustrated,
    /// Drained.
    Tired,
    /// Pulling back from the conversation.
    Withdrawn,
}

impl UserEmotion {
    /// Happy or excited.
    #[must_use]
    pub fn is_positive(self) -> bool {
        matches!(self, Self::Happy | Self::Excited)
    }

    /// Sad, anxious, frustrated or withdrawn.
    #[must_use]
    pub fn is_distressed(self) -> bool {
        matches!(
            self,
            Self::Sad | Self::Anxious | Self::Frustrated | Self::Withdrawn
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Happy => "happy",
            Self::Excited => "excited",
            Self::Sad => "sad",
            Self::Anxious => "anxious",
            Self::Frustrated => "frustrated",
            Self::Tired => "tired",
            Self::Withdrawn => "withdrawn",
        }
    }
}

impl AffectLabel for UserEmotion {
    fn neutral() -> Self {
        Self::Neutral
    }
}

impl fmt::Display for UserEmotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Lexicons
// ---------------------------------------------------------------------------

const LEXICONS: &[(UserEmotion, &[&str])] = &[
    (
        UserEmotion::Happy,
        &[
            "happy", "glad", "great", "good", "nice", "love", "lovely", "thanks", "thank",
            "awesome", "fun", "enjoyed", "wonderful", ":)", "haha",
        ],
    ),
    (
        UserEmotion::Excited,
        &[
            "excited", "amazing", "can't wait", "cant wait", "omg", "wow", "finally",
            "incredible", "yay", "woohoo",
        ],
    ),
    (
        UserEmotion::Sad,
        &[
            "sad", "down", "lonely", "miss", "cry", "crying", "depressed", "hurt", "lost",
            "upset", "heartbroken", ":(",
        ],
    ),
    (
        UserEmotion::Anxious,
        &[
            "anxious", "worried", "worry", "nervous", "scared", "afraid", "stress",
            "stressed", "panic", "overwhelmed",
        ],
    ),
    (
        UserEmotion::Frustrated,
        &[
            "frustrated", "annoyed", "angry", "ugh", "hate", "stupid", "mad", "sick of",
            "fed up", "ridiculous",
        ],
    ),
    (
        UserEmotion::Tired,
        &[
            "tired", "exhausted", "sleepy", "drained", "worn out", "burnt out", "burned out",
            "no energy",
        ],
    ),
];

/// Labels in tie-break order (earlier wins).
const ORDER: [UserEmotion; 7] = [
    UserEmotion::Happy,
    UserEmotion::Excited,
    UserEmotion::Sad,
    UserEmotion::Anxious,
    UserEmotion::Frustrated,
    UserEmotion::Tired,
    UserEmotion::Withdrawn,
];

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | '!' | '?' | ';' | '"'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn mentions(lowered: &str, words: &[String], keyword: &str) -> bool {
    if keyword.contains(' ') || !keyword.chars().all(char::is_alphanumeric) {
        lowered.contains(keyword)
    } else {
        words.iter().any(|w| w == keyword)
    }
}

/// Detect the user's emotion from one utterance.
///
/// `window` holds the reply types of recent turns, the current one included.
#[must_use]
pub fn detect_user_emotion(
    utterance: &str,
    reply: ReplyType,
    window: &ReplyWindow,
    config: &AffectConfig,
) -> AffectReading<UserEmotion> {
    let lowered = utterance.to_lowercase();
    let words = tokens(&lowered);
    let mut points = [0.0_f32; ORDER.len()];
    let mut signals = Vec::new();
    let w = &config.user_weights;

    let mut add = |label: UserEmotion, amount: f32, signal: String| {
        if let Some(idx) = ORDER.iter().position(|l| *l == label) {
            points[idx] += amount;
        }
        signals.push(signal);
    };

    for (label, keywords) in LEXICONS {
        for keyword in *keywords {
            if mentions(&lowered, &words, keyword) {
                add(*label, w.keyword, format!("lexicon:{label}:{keyword}"));
            }
        }
    }

    if utterance.contains("!!") {
        add(UserEmotion::Excited, w.double_bang, "punctuation:!!".to_string());
    } else if utterance.contains('!') {
        add(UserEmotion::Excited, w.bang, "punctuation:!".to_string());
    }

    if reply == ReplyType::Silence {
        add(UserEmotion::Withdrawn, w.silence, "reply:silence".to_string());
    }

    let brush_offs = window.iter().filter(|r| **r != ReplyType::Open).count();
    if window.len() >= w.closed_window_min_turns && brush_offs * 2 > window.len() {
        add(
            UserEmotion::Withdrawn,
            w.closed_window,
            format!("window:closed:{brush_offs}/{}", window.len()),
        );
    }

    let mut best: Option<(UserEmotion, f32)> = None;
    for (label, score) in ORDER.iter().zip(points) {
        if score > 0.0 && best.is_none_or(|(_, top)| score > top) {
            best = Some((*label, score));
        }
    }

    match best {
        Some((label, score)) => AffectReading {
            label,
            intensity: unit(score),
            signals,
        },
        None => AffectReading {
            label: UserEmotion::Neutral,
            intensity: unit(config.neutral_confidence),
            signals,
        },
    }
}
