//! # Rapport Core Library
//!
//! Long-lived relational memory and moment-to-moment affect for a
//! conversational agent.
//!
//! Everything the agent knows about one user lives in a single persisted
//! [`MemoryDocument`](memory::MemoryDocument):
//!
//! - **Records**: "What I know about you" (facts, events, preferences)
//! - **Episodes**: "What we talked about"
//! - **Traits**: "Who you seem to be"
//! - **Goals, reminders, people, moods**: "What's going on in your life"
//! - **Shared history**: inside jokes, milestones, anniversaries
//!
//! On top of the store sit the salience/decay engine ([`salience`],
//! [`decay`]), relationship scoring ([`relationship`]), the affect state
//! machine ([`affect`]) and the dialogue policy arbiter ([`policy`]). The
//! [`TurnOrchestrator`] sequences them for each user message.
//!
//! ## Example
//!
//! ```
//! use rapport_core::{MemoryStore, RapportConfig, SharedStore, TurnInput, TurnOrchestrator};
//!
//! let store = SharedStore::new(MemoryStore::in_memory(RapportConfig::default()));
//! let mut orchestrator = TurnOrchestrator::new(store);
//!
//! let outcome = orchestrator.process_turn(TurnInput::new("I got the job!!", chrono::Utc::now()));
//! assert_eq!(outcome.turn, 1);
//! ```

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod affect;
pub mod config;
pub mod decay;
pub mod error;
pub mod memory;
pub mod persistence;
pub mod policy;
pub mod relationship;
pub mod ring;
pub mod salience;
pub mod store;
pub mod turn;
pub mod types;

pub use config::RapportConfig;
pub use error::RapportError;
pub use memory::{MemoryDocument, MemoryRecord, RecordMeta, RecordType, RecordValue};
pub use ring::RingBuffer;
pub use store::{MemoryStore, SharedStore};
pub use turn::{Durability, TurnInput, TurnOrchestrator, TurnOutcome};
