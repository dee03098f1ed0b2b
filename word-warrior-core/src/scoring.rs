//! Grading answers and turning them into card results.
//!
//! Grading compares the player's tags with the ground truth per role, then
//! the card charged with the question converts accuracy into attack or block.

use crate::cards::{Card, CardId, CardKind, CardType};
use crate::quiz::{CharBlock, Role, Sentence};
use crate::selector::update_stats;
use crate::stats::StatsStore;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Conversion bonus a defense card earns for a perfect answer.
pub const PERFECT_CONVERSION_BONUS: f64 = 0.01;

/// Outcome of comparing tags with ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub correct: usize,
    pub wrong: usize,
    pub total_targets: usize,
    /// In [0, 1].
    pub accuracy: f64,
    pub is_perfect: bool,
}

/// Grade the current tags of a sentence.
pub fn grade(sentence: &Sentence) -> Grade {
    let mut correct = 0;
    let mut wrong = 0;

    for role in Role::all() {
        let truth = sentence.analysis.indices(role);
        correct += truth
            .iter()
            .filter(|idx| {
                sentence
                    .blocks
                    .iter()
                    .any(|b| b.original_index == **idx && b.selected == Some(role))
            })
            .count();
        wrong += sentence
            .blocks
            .iter()
            .filter(|b| b.selected == Some(role) && !truth.contains(&b.original_index))
            .count();
    }

    let total_targets = sentence.analysis.target_count();
    let accuracy = ((correct as f64 - wrong as f64) / total_targets.max(1) as f64).max(0.0);
    Grade {
        correct,
        wrong,
        total_targets,
        accuracy,
        is_perfect: correct == total_targets && wrong == 0,
    }
}

/// `1 + remaining / limit`, with remaining clamped to [0, limit]. Always in [1, 2].
pub fn time_multiplier(remaining_secs: f64, time_limit_secs: f64) -> f64 {
    if time_limit_secs <= 0.0 {
        return 1.0;
    }
    1.0 + remaining_secs.clamp(0.0, time_limit_secs) / time_limit_secs
}

/// One graded card, consumed when the hand resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardResult {
    pub card_id: CardId,
    pub card_type: CardType,
    pub attack_power: u32,
    pub attack_count: u32,
    pub block_power: u32,
    pub hp_conversion: f64,
    pub time_multiplier: f64,
    pub is_perfect: bool,
}

impl CardResult {
    /// Convert a grade into this card's contribution.
    pub fn from_grade(card: &Card, grade: &Grade, time_multiplier: f64) -> Self {
        let mut result = CardResult {
            card_id: card.id,
            card_type: card.card_type(),
            attack_power: 0,
            attack_count: 0,
            block_power: 0,
            hp_conversion: 0.0,
            time_multiplier,
            is_perfect: grade.is_perfect,
        };
        match card.kind {
            CardKind::Attack {
                base_attack,
                attack_count,
            } => {
                result.attack_power = (f64::from(base_attack) * grade.accuracy).floor() as u32;
                result.attack_count = attack_count + u32::from(grade.is_perfect);
            }
            CardKind::Defense {
                base_block,
                hp_conversion_rate,
            } => {
                result.block_power = (f64::from(base_block) * grade.accuracy).floor() as u32;
                result.hp_conversion = if grade.is_perfect {
                    hp_conversion_rate + PERFECT_CONVERSION_BONUS
                } else {
                    hp_conversion_rate
                };
            }
            CardKind::Skill => {}
        }
        result
    }
}

/// Read-only copy of an answer for display. Owns its blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub question_id: String,
    pub card_name: String,
    pub user_blocks: Vec<CharBlock>,
    /// Blocks tagged with their ground-truth roles.
    pub correct_blocks: Vec<CharBlock>,
    pub grade: Grade,
    pub is_perfect: bool,
    pub time_multiplier: f64,
}

impl Feedback {
    fn capture(sentence: &Sentence, card: &Card, grade: Grade, time_multiplier: f64) -> Self {
        let correct_blocks = sentence
            .blocks
            .iter()
            .map(|b| CharBlock {
                selected: sentence.analysis.role_at(b.original_index),
                ..b.clone()
            })
            .collect();
        Self {
            question_id: sentence.question_id.clone(),
            card_name: card.name.clone(),
            user_blocks: sentence.blocks.clone(),
            correct_blocks,
            grade,
            is_perfect: grade.is_perfect,
            time_multiplier,
        }
    }
}

/// A graded answer: the card result plus its feedback snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredAnswer {
    pub result: CardResult,
    pub feedback: Feedback,
}

/// Grade an answer for a card and record the outcome in the stats store.
pub fn score_answer(
    card: &Card,
    sentence: &Sentence,
    remaining_secs: f64,
    stats: &mut dyn StatsStore,
) -> ScoredAnswer {
    let grade = grade(sentence);
    let multiplier = time_multiplier(remaining_secs, f64::from(sentence.time_limit_secs));
    update_stats(stats, &sentence.question_id, grade.is_perfect);

    debug!(
        question_id = %sentence.question_id,
        card = %card.name,
        correct = grade.correct,
        wrong = grade.wrong,
        accuracy = grade.accuracy,
        perfect = grade.is_perfect,
        multiplier,
        "graded answer"
    );

    ScoredAnswer {
        result: CardResult::from_grade(card, &grade, multiplier),
        feedback: Feedback::capture(sentence, card, grade, multiplier),
    }
}
