//! The turn orchestrator: the one entry point callers drive.
//!
//! One user message is one call to [`TurnOrchestrator::process_turn`]; the
//! agent's reply, once produced elsewhere, is fed back with
//! [`TurnOrchestrator::complete_turn`]. A turn runs, in order:
//!
//! 1. reply-type classification and user-emotion detection + smoothing;
//! 2. turn counter, interaction bookkeeping and episode log;
//! 3. relationship depth ratchet, milestones and anniversaries;
//! 4. trait decay and conflict resolution, and trait snapshots, on cadence;
//! 5. agent-emotion detection + smoothing;
//! 6. policy bookkeeping for the user message;
//! 7. contextual ranking and (probability-gated) proactive recall;
//! 8. a single persist of the document.
//!
//! Steps 2–8 run under one store lock. Affect and policy state belong to the
//! orchestrator and live only as long as it does.

use std::time::Instant;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::affect::{
    classify_reply, detect_agent_emotion, detect_user_emotion, open_share, AffectState,
    AgentEmotion, AgentSignals, ReplyType, ReplyWindow, UserEmotion,
};
use crate::config::RapportConfig;
use crate::decay::{decay_traits, is_due, resolve_conflicts, ConflictAdjustment, DecayReport};
use crate::memory::{Episode, Milestone, PersonalityTrait, TraitSnapshot};
use crate::policy::{AgentAction, DialoguePolicy, PolicySnapshot};
use crate::relationship::{
    compute_depth, detect_anniversaries, detect_milestones, record_interaction, update_depth,
    Anniversary, DepthInputs, InteractionTiming,
};
use crate::salience::{rank_for_context, select_recall, RecallCandidate, ScoredRecord};
use crate::store::SharedStore;
use crate::types::TimeOfDay;

const EPISODE_EXCERPT_CHARS: usize = 120;

/// One user message.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnInput {
    /// What the user said.
    pub utterance: String,
    /// Reply type, if the caller already knows it; classified otherwise.
    pub reply_type: Option<ReplyType>,
    /// Current conversation topic, used to filter context.
    pub topic: Option<String>,
    /// When the message arrived.
    pub timestamp: DateTime<Utc>,
}

impl TurnInput {
    /// A message with no hints.
    #[must_use]
    pub fn new(utterance: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            utterance: utterance.into(),
            reply_type: None,
            topic: None,
            timestamp,
        }
    }

    /// Supply the reply type.
    #[must_use]
    pub fn with_reply_type(mut self, reply_type: ReplyType) -> Self {
        self.reply_type = Some(reply_type);
        self
    }

    /// Supply the topic.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }
}

/// Whether the turn's memory changes reached the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Durability {
    /// Saved.
    Persisted,
    /// Memory is disabled; nothing to save.
    Disabled,
    /// The save failed. The in-memory state is ahead of the backend until
    /// the next successful save.
    Degraded {
        /// Backend error message.
        reason: String,
    },
}

/// Everything a turn produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Turn number (persisted count, or the session count when memory is
    /// disabled).
    pub turn: u64,
    /// Shape of the user message.
    pub reply_type: ReplyType,
    /// Smoothed user affect.
    pub user_affect: AffectState<UserEmotion>,
    /// Signals behind this turn's raw user reading.
    pub user_signals: Vec<String>,
    /// Smoothed agent affect.
    pub agent_affect: AffectState<AgentEmotion>,
    /// Signals behind this turn's raw agent reading.
    pub agent_signals: Vec<String>,
    /// Policy state after the user message.
    pub policy: PolicySnapshot,
    /// Whether the agent may ask a question in its reply.
    pub may_ask_question: bool,
    /// Records ranked for the current context.
    pub context: Vec<ScoredRecord>,
    /// A record to bring up unprompted, if one was picked.
    pub recall: Option<RecallCandidate>,
    /// Milestones reached this turn.
    pub milestones: Vec<Milestone>,
    /// Anniversaries falling on this turn.
    pub anniversaries: Vec<Anniversary>,
    /// Relationship depth after the ratchet.
    pub depth: u32,
    /// Decay report, on decay turns.
    pub decay: Option<DecayReport>,
    /// Trait conflict adjustments, on decay turns.
    pub conflicts: Vec<ConflictAdjustment>,
    /// Save result.
    pub durability: Durability,
}

#[derive(Default)]
struct MemoryEffects {
    turn: u64,
    timing: Option<InteractionTiming>,
    depth: u32,
    milestones: Vec<Milestone>,
    anniversaries: Vec<Anniversary>,
    decay: Option<DecayReport>,
    conflicts: Vec<ConflictAdjustment>,
    context: Vec<ScoredRecord>,
    recall: Option<RecallCandidate>,
}

/// Sequences one conversation's turns over a shared store.
pub struct TurnOrchestrator<R: Rng = StdRng> {
    store: SharedStore,
    config: RapportConfig,
    user: AffectState<UserEmotion>,
    agent: AffectState<AgentEmotion>,
    replies: ReplyWindow,
    policy: DialoguePolicy,
    positive_streak: u32,
    session_turns: u64,
    rng: R,
}

impl<R: Rng> std::fmt::Debug for TurnOrchestrator<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnOrchestrator")
            .field("user", &self.user)
            .field("agent", &self.agent)
            .field("policy", &self.policy.snapshot())
            .field("session_turns", &self.session_turns)
            .finish_non_exhaustive()
    }
}

impl TurnOrchestrator<StdRng> {
    /// Orchestrator with an entropy-seeded RNG.
    #[must_use]
    pub fn new(store: SharedStore) -> Self {
        Self::with_rng(store, StdRng::from_entropy())
    }
}

impl<R: Rng> TurnOrchestrator<R> {
    /// Orchestrator with an injected RNG (seed it for reproducible recall).
    #[must_use]
    pub fn with_rng(store: SharedStore, rng: R) -> Self {
        let config = store.lock().config().clone();
        Self {
            user: AffectState::neutral(config.affect.neutral_confidence),
            agent: AffectState::neutral(config.affect.agent_baseline),
            replies: ReplyWindow::new(),
            policy: DialoguePolicy::new(config.policy.clone()),
            positive_streak: 0,
            session_turns: 0,
            store,
            config,
            rng,
        }
    }

    /// Process one user message.
    pub fn process_turn(&mut self, input: TurnInput) -> TurnOutcome {
        let start = Instant::now();
        let TurnInput {
            utterance,
            reply_type,
            topic,
            timestamp: now,
        } = input;
        let offset = self.config.general.utc_offset_minutes;

        // 1. User affect.
        let reply = reply_type.unwrap_or_else(|| classify_reply(&utterance, &self.config.policy));
        self.replies.push(reply);
        let user_reading = detect_user_emotion(&utterance, reply, &self.replies, &self.config.affect);
        self.user.apply(&user_reading, &self.config.affect);
        self.positive_streak = if user_reading.label.is_positive() {
            self.positive_streak.saturating_add(1)
        } else {
            0
        };
        self.session_turns += 1;

        let mut store = self.store.lock();
        let memory_on = store.is_enabled();
        let traits_on = store.traits_enabled();

        // 2–4. Memory bookkeeping.
        let mut effects = MemoryEffects {
            turn: self.session_turns,
            ..MemoryEffects::default()
        };
        if memory_on {
            let doc = store.document_mut();
            doc.turn_count += 1;
            let turn = doc.turn_count;
            effects.turn = turn;
            effects.timing = Some(record_interaction(&mut doc.relationship, now, offset));

            if self.config.turn.log_episodes {
                doc.episodes.push(Episode::new(episode_line(reply, &utterance), turn, now));
            }

            let candidate =
                compute_depth(&DepthInputs::from_document(doc, now), &self.config.relationship);
            update_depth(&mut doc.relationship, candidate);
            effects.depth = doc.relationship.depth;
            effects.milestones = detect_milestones(
                &mut doc.milestones,
                turn,
                effects.depth,
                now,
                &self.config.relationship,
            );
            effects.anniversaries = detect_anniversaries(&mut doc.significant_moments, now, offset);

            if traits_on && is_due(turn, self.config.traits.decay_interval_turns) {
                effects.decay = Some(decay_traits(&mut doc.traits, now, &self.config.traits));
                effects.conflicts = resolve_conflicts(&mut doc.traits, &self.config.traits);
            }
            if traits_on && is_due(turn, self.config.traits.snapshot_interval_turns) {
                doc.trait_history
                    .push(TraitSnapshot::capture(&doc.traits, turn, now));
            }
        }

        // 5. Agent affect.
        let timing = effects.timing.unwrap_or(InteractionTiming {
            hours_since_last: None,
            interactions_today: 0,
        });
        let agent_reading = detect_agent_emotion(
            &AgentSignals {
                open_share: open_share(&self.replies),
                user_emotion: self.user.label,
                hours_since_last: timing.hours_since_last,
                interactions_today: timing.interactions_today,
                positive_streak: self.positive_streak,
                time_of_day: TimeOfDay::at(now, offset),
            },
            &self.config.affect,
        );
        self.agent.apply(&agent_reading, &self.config.affect);

        // 6. Policy.
        self.policy.observe_user(&utterance, reply);

        // 7. Context and recall.
        if memory_on {
            let prefix = self.config.store.internal_prefix.as_str();
            let doc = store.document_mut();
            effects.context = rank_for_context(
                &doc.records,
                topic.as_deref(),
                self.config.salience.context_top_n,
                prefix,
                &self.config.salience,
            );

            let p = self.config.turn.recall_probability.clamp(0.0, 1.0);
            if self.rng.gen_bool(p) {
                effects.recall =
                    select_recall(&doc.records, now, prefix, &self.config.salience, &mut self.rng);
                if let Some(pick) = &effects.recall {
                    if let Some(record) = doc.record_mut(&pick.record.key) {
                        record.last_referenced = Some(now);
                    }
                }
            }
        }

        // 8. Persist once.
        let durability = if memory_on {
            match store.persist() {
                Ok(()) => Durability::Persisted,
                Err(e) => {
                    warn!(turn = effects.turn, error = %e, "Turn persisted in memory only");
                    Durability::Degraded {
                        reason: e.to_string(),
                    }
                }
            }
        } else {
            Durability::Disabled
        };
        drop(store);

        debug!(
            turn = effects.turn,
            reply = %reply,
            user = %self.user.label,
            agent = %self.agent.label,
            depth = effects.depth,
            recall = effects.recall.is_some(),
            elapsed_us = start.elapsed().as_micros(),
            "Turn processed"
        );

        TurnOutcome {
            turn: effects.turn,
            reply_type: reply,
            user_affect: self.user,
            user_signals: user_reading.signals,
            agent_affect: self.agent,
            agent_signals: agent_reading.signals,
            policy: self.policy.snapshot(),
            may_ask_question: self.policy.may_ask_question(),
            context: effects.context,
            recall: effects.recall,
            milestones: effects.milestones,
            anniversaries: effects.anniversaries,
            depth: effects.depth,
            decay: effects.decay,
            conflicts: effects.conflicts,
            durability,
        }
    }

    /// Feed the agent's produced reply back to the policy arbiter.
    pub fn complete_turn(
        &mut self,
        agent_reply: &str,
        topic: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> AgentAction {
        let action = self.policy.observe_agent(agent_reply, topic, timestamp);
        debug!(action = %action, state = ?self.policy.state(), "Agent turn recorded");
        action
    }

    /// Smoothed user affect.
    #[must_use]
    pub fn user_affect(&self) -> AffectState<UserEmotion> {
        self.user
    }

    /// Smoothed agent affect.
    #[must_use]
    pub fn agent_affect(&self) -> AffectState<AgentEmotion> {
        self.agent
    }

    /// Stored relationship depth.
    #[must_use]
    pub fn relationship_depth(&self) -> u32 {
        self.store.lock().relationship().depth
    }

    /// Copies of the active traits.
    #[must_use]
    pub fn active_traits(&self) -> Vec<PersonalityTrait> {
        self.store.lock().active_traits().cloned().collect()
    }

    /// Whether the agent may ask a question now.
    #[must_use]
    pub fn may_ask_question(&self) -> bool {
        self.policy.may_ask_question()
    }

    /// The policy arbiter.
    #[must_use]
    pub fn policy(&self) -> &DialoguePolicy {
        &self.policy
    }

    /// Consecutive turns with a positive user emotion.
    #[must_use]
    pub fn positive_streak(&self) -> u32 {
        self.positive_streak
    }

    /// The store handle.
    #[must_use]
    pub fn store(&self) -> &SharedStore {
        &self.store
    }
}

fn episode_line(reply: ReplyType, utterance: &str) -> String {
    let trimmed = utterance.trim();
    let mut excerpt: String = trimmed.chars().take(EPISODE_EXCERPT_CHARS).collect();
    if trimmed.chars().count() > EPISODE_EXCERPT_CHARS {
        excerpt.push('…');
    }
    format!("user ({reply}): {excerpt}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn orchestrator() -> TurnOrchestrator<StdRng> {
        let store = SharedStore::new(MemoryStore::in_memory(RapportConfig::default()));
        TurnOrchestrator::with_rng(store, StdRng::seed_from_u64(3))
    }

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-07-01T15:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    #[test]
    fn first_turn_counts_and_fires_first_milestone() {
        let mut orch = orchestrator();
        let outcome = orch.process_turn(TurnInput::new("hello there, how are you", start()));
        assert_eq!(outcome.turn, 1);
        assert_eq!(outcome.durability, Durability::Persisted);
        assert_eq!(outcome.milestones.len(), 1);
        assert_eq!(outcome.depth, 2);
        assert_eq!(orch.store().lock().episodes().count(), 1);
    }

    #[test]
    fn question_gate_follows_agent_replies() {
        let mut orch = orchestrator();
        let t = start();
        let outcome = orch.process_turn(TurnInput::new("I adopted a kitten yesterday", t));
        assert!(outcome.may_ask_question);

        orch.complete_turn("A kitten! What did you name it?", Some("kitten"), t);
        let outcome = orch.process_turn(TurnInput::new(
            "Her name is Pickle and she is tiny",
            t + Duration::minutes(1),
        ));
        assert!(!outcome.may_ask_question);
        assert!(!orch.may_ask_question());
    }

    #[test]
    fn positive_streak_resets_on_neutral_turn() {
        let mut orch = orchestrator();
        let t = start();
        orch.process_turn(TurnInput::new("this is great, thanks", t));
        orch.process_turn(TurnInput::new("I love it, so happy", t));
        assert_eq!(orch.positive_streak(), 2);
        orch.process_turn(TurnInput::new("I had pasta for lunch", t));
        assert_eq!(orch.positive_streak(), 0);
    }

    #[test]
    fn episode_line_truncates_long_messages() {
        let line = episode_line(ReplyType::Open, &"x".repeat(200));
        assert!(line.starts_with("user (open): "));
        assert!(line.ends_with('…'));
        assert_eq!(line.chars().count(), "user (open): ".len() + EPISODE_EXCERPT_CHARS + 1);
    }
}
