//! Word Warrior game engine: a grammar-tagging card battler.
//!
//! This crate provides:
//! - A card economy (deck, candidates, hand, discard) with reshuffling
//! - Adaptive question selection weighted by recent answers
//! - Grading of role-tagged sentences into attack and block
//! - A turn-based combat state machine stepped on a virtual clock
//! - Floor maps, encounters and per-question stats persistence
//!
//! # Quick Start
//!
//! ```ignore
//! use word_warrior_core::{GameConfig, GameSession, Role};
//! use std::time::Duration;
//!
//! let mut session = GameSession::with_defaults(GameConfig::default().with_seed(7));
//! session.start();
//! session.enter_node("node_1_0");
//! for i in 0..session.max_select() {
//!     session.toggle_card(i);
//! }
//! session.confirm_selection()?;
//! session.mark_block(0, Role::Verb);
//! session.submit();
//! session.continue_round();
//! session.advance_clock(Duration::from_millis(300));
//! ```

pub mod cards;
pub mod combat;
pub mod config;
pub mod entity;
pub mod map;
pub mod quiz;
pub mod scheduler;
pub mod scoring;
pub mod selector;
pub mod session;
pub mod stats;
pub mod testing;

// Primary public API
pub use cards::{Card, CardId, CardKind, CardPiles, CardType, Rarity};
pub use config::{ConfigError, GameConfig, PhaseTimings};
pub use quiz::{CatalogError, QuestionSource, Role, Sentence, StaticCatalog};
pub use session::{GameSession, GameSnapshot, GameStatus, SessionError};
pub use stats::{JsonFileStore, MemoryStatsStore, StatsError, StatsStore};
pub use testing::TestHarness;
