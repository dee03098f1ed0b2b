//! Adaptive question selection.
//!
//! Questions the player keeps getting right fade out of rotation and
//! questions they keep missing come back more often. Weights depend only on
//! the last three recorded outcomes.

use crate::stats::{now_millis, QuestionStats, StatsStore};
use rand::Rng;
use thiserror::Error;
use tracing::debug;

/// Weight for questions with fewer than three attempts.
pub const DEFAULT_WEIGHT: f64 = 1.0;
/// Weight after three passes in a row.
pub const MASTERED_WEIGHT: f64 = 0.05;
/// Weight after three failures in a row.
pub const STRUGGLING_WEIGHT: f64 = 2.0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("Cannot select from an empty question pool")]
    EmptyPool,
}

/// Weighted sampler backed by a stats store.
pub struct QuestionSelector<'a> {
    stats: &'a dyn StatsStore,
}

impl<'a> QuestionSelector<'a> {
    pub fn new(stats: &'a dyn StatsStore) -> Self {
        Self { stats }
    }

    /// Selection weight for a question, from its last three outcomes.
    pub fn calculate_weight(&self, question_id: &str) -> f64 {
        let Some(stats) = self.stats.get(question_id) else {
            return DEFAULT_WEIGHT;
        };
        if stats.recent_results.len() < 3 {
            return DEFAULT_WEIGHT;
        }

        match stats.last(3).iter().filter(|passed| **passed).count() {
            3 => MASTERED_WEIGHT,
            2 => 0.7,
            1 => 1.3,
            _ => STRUGGLING_WEIGHT,
        }
    }

    /// Draw one item, with probability proportional to its question's weight.
    pub fn weighted_select<'p, T, R>(
        &self,
        pool: &'p [T],
        id_of: impl Fn(&T) -> &str,
        rng: &mut R,
    ) -> Result<&'p T, SelectorError>
    where
        R: Rng,
    {
        match pool {
            [] => return Err(SelectorError::EmptyPool),
            [only] => return Ok(only),
            _ => {}
        }

        let weights: Vec<f64> = pool
            .iter()
            .map(|item| self.calculate_weight(id_of(item)))
            .collect();
        let total: f64 = weights.iter().sum();
        let target = rng.gen_range(0.0..total);

        let mut cumulative = 0.0;
        for (item, weight) in pool.iter().zip(&weights) {
            cumulative += weight;
            if cumulative > target {
                debug!(question_id = id_of(item), weight, total, "selected question");
                return Ok(item);
            }
        }

        // Rounding can leave the target just past the last boundary.
        Ok(&pool[pool.len() - 1])
    }
}

/// Record one graded answer. Call exactly once per answer, before the next selection.
pub fn update_stats(store: &mut dyn StatsStore, question_id: &str, was_perfect: bool) -> QuestionStats {
    update_stats_at(store, question_id, was_perfect, now_millis())
}

/// [`update_stats`] with an explicit timestamp.
pub fn update_stats_at(
    store: &mut dyn StatsStore,
    question_id: &str,
    was_perfect: bool,
    at_millis: u64,
) -> QuestionStats {
    let mut stats = store
        .get(question_id)
        .unwrap_or_else(|| QuestionStats::new(question_id));
    stats.record(was_perfect, at_millis);
    store.put(question_id, stats.clone());
    stats
}
