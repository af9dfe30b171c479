//! Reply-type classification.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::PolicyConfig;
use crate::ring::RingBuffer;

/// Replies kept for engagement and withdrawal detection.
pub const REPLY_WINDOW: usize = 5;

/// The rolling window of recent reply types.
pub type ReplyWindow = RingBuffer<ReplyType, REPLY_WINDOW>;

/// Coarse shape of a user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyType {
    /// Nothing said, or only punctuation ("...", "?").
    Silence,
    /// A short closed reply ("ok", "sure", "idk").
    Closed,
    /// Anything with substance.
    Open,
}

impl fmt::Display for ReplyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Silence => f.write_str("silence"),
            Self::Closed => f.write_str("closed"),
            Self::Open => f.write_str("open"),
        }
    }
}

const CLOSED_REPLIES: &[&str] = &[
    "ok", "k", "yes", "no", "sure", "fine", "idk", "lol", "hm", "mhm", "yeah", "yep", "nope",
    "cool", "nothing", "whatever", "nah", "maybe",
];

/// Classify a user utterance.
#[must_use]
pub fn classify_reply(utterance: &str, config: &PolicyConfig) -> ReplyType {
    let trimmed = utterance.trim();
    if trimmed.chars().all(|c| c.is_ascii_punctuation() || c == '…' || c.is_whitespace()) {
        return ReplyType::Silence;
    }

    let normalized: String = trimmed
        .trim_end_matches(|c: char| c.is_ascii_punctuation() || c == '…')
        .to_lowercase();
    if CLOSED_REPLIES.contains(&normalized.as_str()) {
        return ReplyType::Closed;
    }

    let words = trimmed.split_whitespace().count();
    if words <= config.closed_max_words && trimmed.chars().count() < config.closed_max_chars {
        ReplyType::Closed
    } else {
        ReplyType::Open
    }
}

/// Share of open replies in the window (0.0 when empty).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn open_share(window: &ReplyWindow) -> f32 {
    if window.is_empty() {
        return 0.0;
    }
    let open = window.iter().filter(|r| **r == ReplyType::Open).count();
    open as f32 / window.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(s: &str) -> ReplyType {
        classify_reply(s, &PolicyConfig::default())
    }

    #[test]
    fn punctuation_only_is_silence() {
        assert_eq!(classify(""), ReplyType::Silence);
        assert_eq!(classify("   "), ReplyType::Silence);
        assert_eq!(classify("..."), ReplyType::Silence);
        assert_eq!(classify("…"), ReplyType::Silence);
        assert_eq!(classify("?!"), ReplyType::Silence);
    }

    #[test]
    fn short_set_and_short_messages_are_closed() {
        assert_eq!(classify("OK"), ReplyType::Closed);
        assert_eq!(classify("idk."), ReplyType::Closed);
        assert_eq!(classify("whatever!!"), ReplyType::Closed);
        assert_eq!(classify("not really sure"), ReplyType::Closed);
    }

    #[test]
    fn substance_is_open() {
        assert_eq!(classify("I went hiking with my sister today"), ReplyType::Open);
        // Three words but too long to be a brush-off.
        assert_eq!(classify("extraordinarily complicated situation"), ReplyType::Open);
    }

    #[test]
    fn open_share_of_window() {
        let mut window = ReplyWindow::new();
        assert_eq!(open_share(&window), 0.0);
        window.extend([ReplyType::Open, ReplyType::Closed, ReplyType::Open, ReplyType::Silence]);
        assert!((open_share(&window) - 0.5).abs() < 1e-6);
    }
}
