//! Testing utilities.
//!
//! `TestHarness` wraps a seeded [`GameSession`] with helpers for scripted
//! play: entering fights, picking cards, answering perfectly or badly, and
//! stepping the clock until the session waits on the player again.

use crate::config::GameConfig;
use crate::quiz::Role;
use crate::session::{GameSession, GameStatus};
use std::time::Duration;

/// Seed used when a test does not pick one.
pub const DEFAULT_TEST_SEED: u64 = 0x5EED;

/// Upper bound on phases stepped by [`TestHarness::settle`].
const MAX_SETTLE_STEPS: usize = 1_000;

/// Scripted driver for a [`GameSession`].
pub struct TestHarness {
    pub session: GameSession,
}

impl TestHarness {
    /// A harness with no reinforcements, so fights are predictable.
    pub fn new() -> Self {
        Self::with_config(
            GameConfig::default()
                .with_seed(DEFAULT_TEST_SEED)
                .with_spawn_chance(0.0),
        )
    }

    pub fn with_config(config: GameConfig) -> Self {
        Self {
            session: GameSession::with_defaults(config),
        }
    }

    pub fn status(&self) -> GameStatus {
        self.session.status()
    }

    /// Assert the session is in the given status.
    pub fn assert_status(&self, expected: GameStatus) {
        assert_eq!(
            self.session.status(),
            expected,
            "expected status {expected}, got {}",
            self.session.status()
        );
    }

    /// Start a run and enter the first node.
    pub fn start_battle(&mut self) {
        assert!(self.session.start(), "start was rejected");
        let node = self.session.map().current_node_id.clone();
        assert!(self.session.enter_node(&node), "could not enter {node}");
    }

    /// Enter the next node on the map.
    pub fn enter_next_node(&mut self) -> bool {
        let next = self
            .session
            .map()
            .reachable_nodes()
            .first()
            .map(|n| n.id.clone());
        match next {
            Some(id) => self.session.enter_node(&id),
            None => false,
        }
    }

    /// Pick the first `max_select` candidates and confirm.
    pub fn pick_first_cards(&mut self) {
        for i in 0..self.session.max_select() {
            assert!(self.session.toggle_card(i), "pick {i} was rejected");
        }
        assert!(
            self.session.confirm_selection().expect("question selection failed"),
            "confirm was rejected"
        );
    }

    /// Tag the current sentence exactly as the ground truth does.
    pub fn tag_correctly(&mut self) {
        let Some(sentence) = self.session.current_sentence() else {
            return;
        };
        let analysis = sentence.analysis.clone();
        for role in Role::all() {
            for &idx in analysis.indices(role) {
                self.session.mark_block(idx, role);
            }
        }
    }

    /// Tag correctly, submit, and dismiss the feedback.
    pub fn answer_perfectly(&mut self) {
        self.tag_correctly();
        assert!(self.session.submit(), "submit was rejected");
        assert!(self.session.continue_round(), "continue was rejected");
    }

    /// Submit with nothing tagged, and dismiss the feedback.
    pub fn answer_blank(&mut self) {
        assert!(self.session.submit(), "submit was rejected");
        assert!(self.session.continue_round(), "continue was rejected");
    }

    /// Step the clock through timed phases until the session waits on input.
    ///
    /// Countdown ticks fire along the way but never run the countdown out on
    /// their own; a question waiting for an answer stops the settle.
    pub fn settle(&mut self) {
        for _ in 0..MAX_SETTLE_STEPS {
            if self.session.status() == GameStatus::Paused {
                return;
            }
            let Some(due) = self.session.next_phase_due() else {
                return;
            };
            let wait = due.saturating_sub(self.session.now());
            self.session.advance_clock(wait);
        }
        panic!("session did not settle after {MAX_SETTLE_STEPS} phases");
    }

    /// Answer every question of the current hand perfectly, then resolve the round.
    pub fn play_round_perfectly(&mut self) {
        while self.session.status() == GameStatus::Playing {
            self.answer_perfectly();
            self.settle();
        }
    }

    /// Answer every question of the current hand blank, then resolve the round.
    pub fn play_round_blank(&mut self) {
        while self.session.status() == GameStatus::Playing {
            self.answer_blank();
            self.settle();
        }
    }

    /// Move the clock by a fixed amount.
    pub fn wait(&mut self, elapsed: Duration) -> usize {
        self.session.advance_clock(elapsed)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_reaches_card_selection() {
        let mut harness = TestHarness::new();
        harness.start_battle();
        harness.assert_status(GameStatus::CardSelection);
    }

    #[test]
    fn test_perfect_round_reaches_next_decision() {
        let mut harness = TestHarness::new();
        harness.start_battle();
        harness.pick_first_cards();
        harness.play_round_perfectly();

        assert!(matches!(
            harness.status(),
            GameStatus::Victory | GameStatus::CardSelection
        ));
        assert!(harness.session.score() > 0 || harness.session.hero().vitals.block > 0);
    }
}
