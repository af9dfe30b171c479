//! Dialogue policy: what the agent may do next.
//!
//! The arbiter watches both sides of the conversation: the shape of the
//! user's recent messages and the kind of thing the agent just said. Its
//! main job is question pacing. After the agent asks a question it may not
//! ask another until a cooldown of agent turns has passed, and never right
//! after a question or into a closed-off reply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::affect::ReplyType;
use crate::config::PolicyConfig;
use crate::ring::RingBuffer;

/// Agent actions remembered by the arbiter.
pub const ACTION_HISTORY: usize = 3;
/// User message lengths averaged for verbosity.
pub const LENGTH_WINDOW: usize = 5;
/// Recently asked-about topics remembered.
pub const TOPIC_HISTORY: usize = 5;

/// Kind of conversational act an agent reply performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentAction {
    /// Asks the user something.
    Question,
    /// Opens with a greeting.
    Greeting,
    /// Acknowledges the user's feelings.
    Empathy,
    /// Proposes something.
    Suggestion,
    /// A long telling.
    Story,
    /// Anything else.
    Statement,
}

impl fmt::Display for AgentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Question => "question",
            Self::Greeting => "greeting",
            Self::Empathy => "empathy",
            Self::Suggestion => "suggestion",
            Self::Story => "story",
            Self::Statement => "statement",
        };
        f.write_str(s)
    }
}

const GREETING_OPENERS: &[&str] = &[
    "hi", "hey", "hello", "good morning", "good afternoon", "good evening", "welcome back",
    "morning",
];

const EMPATHY_OPENERS: &[&str] = &[
    "i'm sorry", "im sorry", "i am sorry", "that sounds", "that must", "i understand",
    "i hear you", "that's rough", "that's hard", "oh no",
];

const SUGGESTION_OPENERS: &[&str] = &[
    "maybe you could", "you could", "you might", "how about", "why not", "try", "let's",
    "perhaps",
];

fn opens_with(text: &str, openers: &[&str]) -> bool {
    openers.iter().any(|opener| {
        text.strip_prefix(opener)
            .is_some_and(|rest| rest.chars().next().is_none_or(|c| !c.is_alphanumeric()))
    })
}

/// Classify an agent reply.
#[must_use]
pub fn classify_agent_reply(reply: &str, config: &PolicyConfig) -> AgentAction {
    let trimmed = reply.trim();
    if trimmed.contains('?') {
        return AgentAction::Question;
    }
    let lowered = trimmed.to_lowercase();
    if opens_with(&lowered, GREETING_OPENERS) {
        AgentAction::Greeting
    } else if opens_with(&lowered, EMPATHY_OPENERS) {
        AgentAction::Empathy
    } else if opens_with(&lowered, SUGGESTION_OPENERS) {
        AgentAction::Suggestion
    } else if trimmed.chars().count() > config.story_min_chars {
        AgentAction::Story
    } else {
        AgentAction::Statement
    }
}

/// How much the user has been writing lately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// Mean length below the short threshold.
    Short,
    /// In between (also the answer with no data).
    Medium,
    /// Mean length at or above the long threshold.
    Long,
}

/// Whether questions are currently held back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyState {
    /// No cooldown pending.
    Free,
    /// This many agent turns left before a question may be asked.
    CoolingDown(u32),
}

/// A remembered agent action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// What the agent did.
    pub action: AgentAction,
    /// When.
    pub at: DateTime<Utc>,
}

/// Read-only copy of the arbiter's state for a turn outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    /// Cooldown state.
    pub state: PolicyState,
    /// Most recent agent action.
    pub last_action: Option<AgentAction>,
    /// Current verbosity estimate.
    pub verbosity: Verbosity,
    /// Consecutive silent user turns.
    pub silence_streak: u32,
    /// Shape of the latest user message.
    pub engagement: Option<ReplyType>,
    /// Recently asked-about topics, oldest first.
    pub recent_topics: Vec<String>,
}

/// The dialogue-policy arbiter. Lives for one conversation; not persisted.
#[derive(Debug, Clone)]
pub struct DialoguePolicy {
    config: PolicyConfig,
    actions: RingBuffer<ActionRecord, ACTION_HISTORY>,
    lengths: RingBuffer<usize, LENGTH_WINDOW>,
    topics: RingBuffer<String, TOPIC_HISTORY>,
    silence_streak: u32,
    cooldown: u32,
    engagement: Option<ReplyType>,
}

impl DialoguePolicy {
    /// Fresh arbiter: no history, no cooldown.
    #[must_use]
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            config,
            actions: RingBuffer::new(),
            lengths: RingBuffer::new(),
            topics: RingBuffer::new(),
            silence_streak: 0,
            cooldown: 0,
            engagement: None,
        }
    }

    /// Note a user message.
    pub fn observe_user(&mut self, utterance: &str, reply: ReplyType) {
        self.lengths.push(utterance.trim().chars().count());
        self.silence_streak = if reply == ReplyType::Silence {
            self.silence_streak.saturating_add(1)
        } else {
            0
        };
        self.engagement = Some(reply);
    }

    /// Note an agent reply. Returns how it was classified.
    pub fn observe_agent(
        &mut self,
        reply: &str,
        topic: Option<&str>,
        at: DateTime<Utc>,
    ) -> AgentAction {
        let action = classify_agent_reply(reply, &self.config);
        self.actions.push(ActionRecord { action, at });

        if action == AgentAction::Question {
            self.cooldown = self.config.question_cooldown_turns;
            if let Some(topic) = topic.map(str::trim).filter(|t| !t.is_empty()) {
                self.topics.push(topic.to_string());
            }
        } else {
            self.cooldown = self.cooldown.saturating_sub(1);
        }
        action
    }

    /// Whether the agent may ask a question now.
    #[must_use]
    pub fn may_ask_question(&self) -> bool {
        self.cooldown == 0
            && self.last_action() != Some(AgentAction::Question)
            && self.engagement != Some(ReplyType::Closed)
    }

    /// Cooldown state.
    #[must_use]
    pub fn state(&self) -> PolicyState {
        match self.cooldown {
            0 => PolicyState::Free,
            n => PolicyState::CoolingDown(n),
        }
    }

    /// Most recent agent action.
    #[must_use]
    pub fn last_action(&self) -> Option<AgentAction> {
        self.actions.latest().map(|r| r.action)
    }

    /// Remembered agent actions, oldest first.
    pub fn recent_actions(&self) -> impl Iterator<Item = &ActionRecord> {
        self.actions.iter()
    }

    /// Mean-length verbosity of recent user messages.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.lengths.is_empty() {
            return Verbosity::Medium;
        }
        let mean = self.lengths.iter().sum::<usize>() / self.lengths.len();
        if mean < self.config.short_verbosity_chars {
            Verbosity::Short
        } else if mean < self.config.long_verbosity_chars {
            Verbosity::Medium
        } else {
            Verbosity::Long
        }
    }

    /// Consecutive silent user turns.
    #[must_use]
    pub fn silence_streak(&self) -> u32 {
        self.silence_streak
    }

    /// Shape of the latest user message.
    #[must_use]
    pub fn engagement(&self) -> Option<ReplyType> {
        self.engagement
    }

    /// Whether a question about `topic` was asked recently
    /// (case-insensitive).
    #[must_use]
    pub fn recently_asked(&self, topic: &str) -> bool {
        let topic = topic.trim();
        self.topics.iter().any(|t| t.eq_ignore_ascii_case(topic))
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> PolicySnapshot {
        PolicySnapshot {
            state: self.state(),
            last_action: self.last_action(),
            verbosity: self.verbosity(),
            silence_streak: self.silence_streak,
            engagement: self.engagement,
            recent_topics: self.topics.iter().cloned().collect(),
        }
    }
}
