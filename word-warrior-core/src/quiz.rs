//! Sentences, grammatical roles and the question catalog.
//!
//! A question is a sentence split into one block per character. Each block
//! has a fixed position and a ground-truth role; the player tags blocks with
//! roles and the scoring engine compares the two.

use crate::cards::{Card, Rarity};
use crate::selector::{QuestionSelector, SelectorError};
use crate::stats::StatsStore;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Roles and Blocks
// ============================================================================

/// Grammatical role a block can be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Subject,
    Verb,
    Object,
    /// Particles, adverbs, prepositions and other function words.
    Helper,
}

impl Role {
    pub fn all() -> [Role; 4] {
        [Role::Subject, Role::Verb, Role::Object, Role::Helper]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Role::Subject => "Subject",
            Role::Verb => "Verb",
            Role::Object => "Object",
            Role::Helper => "Helper",
        }
    }

    /// Single-letter shorthand used by the headless driver.
    pub fn letter(&self) -> char {
        match self {
            Role::Subject => 's',
            Role::Verb => 'v',
            Role::Object => 'o',
            Role::Helper => 'h',
        }
    }

    pub fn from_letter(c: char) -> Option<Role> {
        match c.to_ascii_lowercase() {
            's' => Some(Role::Subject),
            'v' => Some(Role::Verb),
            'o' => Some(Role::Object),
            'h' => Some(Role::Helper),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One character of a sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharBlock {
    pub ch: char,
    pub original_index: usize,
    /// Role chosen by the player, if any.
    pub selected: Option<Role>,
}

/// Ground-truth role positions for a sentence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub subject: Vec<usize>,
    pub verb: Vec<usize>,
    pub object: Vec<usize>,
    pub helper: Vec<usize>,
}

impl Analysis {
    pub fn indices(&self, role: Role) -> &[usize] {
        match role {
            Role::Subject => &self.subject,
            Role::Verb => &self.verb,
            Role::Object => &self.object,
            Role::Helper => &self.helper,
        }
    }

    /// The ground-truth role at a position.
    pub fn role_at(&self, index: usize) -> Option<Role> {
        Role::all()
            .into_iter()
            .find(|r| self.indices(*r).contains(&index))
    }

    /// Total number of tagged positions.
    pub fn target_count(&self) -> usize {
        Role::all().iter().map(|r| self.indices(*r).len()).sum()
    }
}

// ============================================================================
// Timing
// ============================================================================

/// Per-difficulty answer timing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuestionTiming {
    pub time_limit_secs: u32,
    pub perfect_threshold: f64,
}

impl QuestionTiming {
    pub fn for_rarity(rarity: Rarity) -> Self {
        let time_limit_secs = match rarity {
            Rarity::Rare => 30,
            Rarity::SuperRare => 25,
            Rarity::UltraRare => 20,
        };
        Self {
            time_limit_secs,
            perfect_threshold: 1.0,
        }
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// A catalog record whose role tags do not fit its text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("{id}: {role} index {index} out of range ({len} chars)")]
    IndexOutOfRange {
        id: String,
        role: Role,
        index: usize,
        len: usize,
    },

    #[error("{id}: index {index} tagged twice")]
    DuplicateTag { id: String, index: usize },
}

/// A read-only catalog record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stable id, used as the stats key.
    pub id: String,
    pub text: String,
    pub analysis: Analysis,
    pub difficulty: Rarity,
}

impl CatalogEntry {
    /// Check that every tagged index is inside the text and tagged at most once.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let len = self.text.chars().count();
        let mut seen = vec![false; len];
        for role in Role::all() {
            for &index in self.analysis.indices(role) {
                if index >= len {
                    return Err(CatalogError::IndexOutOfRange {
                        id: self.id.clone(),
                        role,
                        index,
                        len,
                    });
                }
                if seen[index] {
                    return Err(CatalogError::DuplicateTag {
                        id: self.id.clone(),
                        index,
                    });
                }
                seen[index] = true;
            }
        }
        Ok(())
    }

    /// Instantiate a fresh, untagged sentence for play.
    pub fn to_sentence<R: Rng>(&self, timing: QuestionTiming, rng: &mut R) -> Sentence {
        Sentence {
            id: uuid::Builder::from_random_bytes(rng.gen()).into_uuid(),
            question_id: self.id.clone(),
            text: self.text.clone(),
            blocks: self
                .text
                .chars()
                .enumerate()
                .map(|(original_index, ch)| CharBlock {
                    ch,
                    original_index,
                    selected: None,
                })
                .collect(),
            analysis: self.analysis.clone(),
            difficulty: self.difficulty,
            time_limit_secs: timing.time_limit_secs,
            perfect_threshold: timing.perfect_threshold,
            is_clearing: false,
        }
    }
}

/// A sentence being answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    /// Instance id.
    pub id: Uuid,
    /// Catalog id, the key for question stats.
    pub question_id: String,
    pub text: String,
    pub blocks: Vec<CharBlock>,
    pub analysis: Analysis,
    pub difficulty: Rarity,
    pub time_limit_secs: u32,
    pub perfect_threshold: f64,
    /// Set once the answer is accepted and the sentence is animating away.
    pub is_clearing: bool,
}

impl Sentence {
    /// Tag a block with a role; tagging with the same role again clears it.
    ///
    /// Returns false for an out-of-range index.
    pub fn toggle(&mut self, index: usize, role: Role) -> bool {
        let Some(block) = self.blocks.get_mut(index) else {
            return false;
        };
        block.selected = if block.selected == Some(role) {
            None
        } else {
            Some(role)
        };
        true
    }

    /// Clear every player tag.
    pub fn reset_selection(&mut self) {
        for block in &mut self.blocks {
            block.selected = None;
        }
    }
}

/// External quiz catalog, queried read-only.
pub trait QuestionSource {
    fn entries(&self) -> &[CatalogEntry];

    /// Entries of one difficulty, or all of them.
    fn by_difficulty(&self, difficulty: Option<Rarity>) -> Vec<&CatalogEntry> {
        self.entries()
            .iter()
            .filter(|e| difficulty.map_or(true, |d| e.difficulty == d))
            .collect()
    }

    fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries().iter().find(|e| e.id == id)
    }
}

/// Pick `count` questions uniformly at random, optionally of one difficulty.
pub fn fetch<S, R>(source: &S, count: usize, difficulty: Option<Rarity>, rng: &mut R) -> Vec<Sentence>
where
    S: QuestionSource + ?Sized,
    R: Rng,
{
    let mut pool = source.by_difficulty(difficulty);
    pool.shuffle(rng);
    pool.into_iter()
        .take(count)
        .map(|e| e.to_sentence(QuestionTiming::for_rarity(e.difficulty), rng))
        .collect()
}

/// Pick one question per card, weighted by recent performance.
///
/// Each card draws from entries matching its rarity (the whole catalog when
/// none match). Questions already chosen for this hand are skipped while
/// other candidates remain. The time limit follows the card's rarity.
pub fn questions_for_cards<S, R>(
    source: &S,
    stats: &dyn StatsStore,
    cards: &[Card],
    rng: &mut R,
) -> Result<Vec<Sentence>, SelectorError>
where
    S: QuestionSource + ?Sized,
    R: Rng,
{
    let selector = QuestionSelector::new(stats);
    let mut chosen: Vec<String> = Vec::with_capacity(cards.len());
    let mut sentences = Vec::with_capacity(cards.len());

    for card in cards {
        let mut pool = source.by_difficulty(Some(card.rarity));
        if pool.is_empty() {
            pool = source.by_difficulty(None);
        }
        let fresh: Vec<&CatalogEntry> = pool
            .iter()
            .copied()
            .filter(|e| !chosen.contains(&e.id))
            .collect();
        if !fresh.is_empty() {
            pool = fresh;
        }

        let entry = selector.weighted_select(&pool, |e| e.id.as_str(), rng)?;
        chosen.push(entry.id.clone());
        sentences.push(entry.to_sentence(QuestionTiming::for_rarity(card.rarity), rng));
    }

    Ok(sentences)
}

// ============================================================================
// Built-in Catalog
// ============================================================================

struct RawEntry {
    id: &'static str,
    text: &'static str,
    subject: &'static [usize],
    verb: &'static [usize],
    object: &'static [usize],
    helper: &'static [usize],
    difficulty: Rarity,
}

const CLASSICS: &[RawEntry] = &[
    RawEntry {
        id: "analects-01",
        text: "有朋自遠方來",
        subject: &[1],
        verb: &[0, 5],
        object: &[],
        helper: &[2, 3, 4],
        difficulty: Rarity::SuperRare,
    },
    RawEntry {
        id: "analects-02",
        text: "三人行必有我師焉",
        subject: &[0, 1],
        verb: &[2, 4],
        object: &[5, 6],
        helper: &[3, 7],
        difficulty: Rarity::UltraRare,
    },
    RawEntry {
        id: "analects-03",
        text: "學而時習之",
        subject: &[],
        verb: &[0, 3],
        object: &[4],
        helper: &[1, 2],
        difficulty: Rarity::Rare,
    },
    RawEntry {
        id: "analects-04",
        text: "己所不欲勿施於人",
        subject: &[0],
        verb: &[3, 5],
        object: &[7],
        helper: &[1, 2, 4, 6],
        difficulty: Rarity::UltraRare,
    },
    RawEntry {
        id: "analects-05",
        text: "溫故而知新",
        subject: &[],
        verb: &[0, 3],
        object: &[1, 4],
        helper: &[2],
        difficulty: Rarity::Rare,
    },
    RawEntry {
        id: "analects-06",
        text: "知之者不如好之者",
        subject: &[2, 7],
        verb: &[0, 4, 5],
        object: &[1, 6],
        helper: &[3],
        difficulty: Rarity::UltraRare,
    },
    RawEntry {
        id: "analects-07",
        text: "見賢思齊焉",
        subject: &[],
        verb: &[0, 2],
        object: &[1, 3],
        helper: &[4],
        difficulty: Rarity::Rare,
    },
    RawEntry {
        id: "analects-08",
        text: "見不賢而內自省",
        subject: &[],
        verb: &[0, 6],
        object: &[2],
        helper: &[1, 3, 4, 5],
        difficulty: Rarity::SuperRare,
    },
    RawEntry {
        id: "analects-09",
        text: "過而不改",
        subject: &[],
        verb: &[0, 3],
        object: &[],
        helper: &[1, 2],
        difficulty: Rarity::Rare,
    },
    RawEntry {
        id: "analects-10",
        text: "工欲善其事",
        subject: &[0],
        verb: &[1, 2],
        object: &[4],
        helper: &[3],
        difficulty: Rarity::Rare,
    },
    RawEntry {
        id: "analects-11",
        text: "必先利其器",
        subject: &[],
        verb: &[2],
        object: &[4],
        helper: &[0, 1, 3],
        difficulty: Rarity::Rare,
    },
    RawEntry {
        id: "analects-12",
        text: "逝者如斯夫",
        subject: &[0, 1],
        verb: &[2],
        object: &[3],
        helper: &[4],
        difficulty: Rarity::Rare,
    },
    RawEntry {
        id: "analects-13",
        text: "不亦說乎",
        subject: &[],
        verb: &[2],
        object: &[],
        helper: &[0, 1, 3],
        difficulty: Rarity::Rare,
    },
    RawEntry {
        id: "analects-14",
        text: "言必信行必果",
        subject: &[0, 3],
        verb: &[2, 5],
        object: &[],
        helper: &[1, 4],
        difficulty: Rarity::SuperRare,
    },
];

/// The built-in sentence library.
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    entries: Vec<CatalogEntry>,
}

impl StaticCatalog {
    pub fn builtin() -> Self {
        let entries = CLASSICS
            .iter()
            .map(|raw| CatalogEntry {
                id: raw.id.to_string(),
                text: raw.text.to_string(),
                analysis: Analysis {
                    subject: raw.subject.to_vec(),
                    verb: raw.verb.to_vec(),
                    object: raw.object.to_vec(),
                    helper: raw.helper.to_vec(),
                },
                difficulty: raw.difficulty,
            })
            .collect();
        Self { entries }
    }

    /// A catalog over caller-supplied entries, each checked with [`CatalogEntry::validate`].
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        for entry in &entries {
            entry.validate()?;
        }
        Ok(Self { entries })
    }
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl QuestionSource for StaticCatalog {
    fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::initialize_deck;
    use crate::stats::MemoryStatsStore;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_builtin_catalog_is_consistent() {
        let catalog = StaticCatalog::builtin();
        assert_eq!(catalog.entries().len(), 14);
        for entry in catalog.entries() {
            entry.validate().unwrap();
        }
        for rarity in Rarity::all() {
            assert!(!catalog.by_difficulty(Some(rarity)).is_empty());
        }
    }

    #[test]
    fn test_validate_rejects_double_tag() {
        let entry = CatalogEntry {
            id: "bad".to_string(),
            text: "學而".to_string(),
            analysis: Analysis {
                verb: vec![0],
                helper: vec![0, 1],
                ..Analysis::default()
            },
            difficulty: Rarity::Rare,
        };
        assert_eq!(
            entry.validate(),
            Err(CatalogError::DuplicateTag {
                id: "bad".to_string(),
                index: 0,
            })
        );
    }

    #[test]
    fn test_catalog_rejects_malformed_entries() {
        let out_of_range = CatalogEntry {
            id: "short".to_string(),
            text: "學".to_string(),
            analysis: Analysis {
                object: vec![3],
                ..Analysis::default()
            },
            difficulty: Rarity::Rare,
        };
        assert!(matches!(
            StaticCatalog::from_entries(vec![out_of_range]),
            Err(CatalogError::IndexOutOfRange {
                role: Role::Object,
                index: 3,
                len: 1,
                ..
            })
        ));

        let builtin = StaticCatalog::builtin().entries().to_vec();
        let catalog = StaticCatalog::from_entries(builtin).unwrap();
        assert_eq!(catalog.entries().len(), 14);
    }

    #[test]
    fn test_sentence_ids_follow_the_rng() {
        let catalog = StaticCatalog::builtin();
        let entry = &catalog.entries()[0];
        let timing = QuestionTiming::for_rarity(entry.difficulty);

        let mut a = ChaCha8Rng::seed_from_u64(99);
        let mut b = ChaCha8Rng::seed_from_u64(99);
        let first = entry.to_sentence(timing, &mut a);
        assert_eq!(first.id, entry.to_sentence(timing, &mut b).id);
        assert_ne!(first.id, entry.to_sentence(timing, &mut a).id);
    }

    #[test]
    fn test_sentence_blocks_follow_text() {
        let catalog = StaticCatalog::builtin();
        let entry = catalog.get("analects-03").unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let sentence = entry.to_sentence(QuestionTiming::for_rarity(entry.difficulty), &mut rng);

        assert_eq!(sentence.blocks.len(), 5);
        assert_eq!(sentence.blocks[3].ch, '習');
        assert_eq!(sentence.blocks[3].original_index, 3);
        assert!(sentence.blocks.iter().all(|b| b.selected.is_none()));
        assert_eq!(sentence.time_limit_secs, 30);
        assert_eq!(sentence.analysis.role_at(4), Some(Role::Object));
    }

    #[test]
    fn test_toggle_sets_and_clears() {
        let catalog = StaticCatalog::builtin();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut sentence =
            catalog.entries()[0].to_sentence(QuestionTiming::for_rarity(Rarity::Rare), &mut rng);

        assert!(sentence.toggle(1, Role::Subject));
        assert_eq!(sentence.blocks[1].selected, Some(Role::Subject));
        assert!(sentence.toggle(1, Role::Verb));
        assert_eq!(sentence.blocks[1].selected, Some(Role::Verb));
        assert!(sentence.toggle(1, Role::Verb));
        assert_eq!(sentence.blocks[1].selected, None);
        assert!(!sentence.toggle(99, Role::Verb));
    }

    #[test]
    fn test_fetch_respects_difficulty_and_count() {
        let catalog = StaticCatalog::builtin();
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let hard = fetch(&catalog, 10, Some(Rarity::UltraRare), &mut rng);
        assert_eq!(hard.len(), 3);
        assert!(hard.iter().all(|s| s.difficulty == Rarity::UltraRare));
        assert!(hard.iter().all(|s| s.time_limit_secs == 20));

        let any = fetch(&catalog, 4, None, &mut rng);
        assert_eq!(any.len(), 4);
    }

    #[test]
    fn test_questions_for_cards_match_rarity_without_repeats() {
        let catalog = StaticCatalog::builtin();
        let store = MemoryStatsStore::new();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let deck = initialize_deck(&mut rng);
        let hand: Vec<Card> = deck.into_iter().take(5).collect();

        let questions = questions_for_cards(&catalog, &store, &hand, &mut rng).unwrap();
        assert_eq!(questions.len(), 5);
        for (card, question) in hand.iter().zip(&questions) {
            assert_eq!(question.difficulty, card.rarity);
            assert_eq!(
                question.time_limit_secs,
                QuestionTiming::for_rarity(card.rarity).time_limit_secs
            );
        }
        let mut ids: Vec<&str> = questions.iter().map(|q| q.question_id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn test_questions_for_cards_on_empty_catalog_fails() {
        let catalog = StaticCatalog::from_entries(Vec::new()).unwrap();
        let store = MemoryStatsStore::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let hand = initialize_deck(&mut rng);

        let result = questions_for_cards(&catalog, &store, &hand[..1], &mut rng);
        assert!(matches!(result, Err(SelectorError::EmptyPool)));
    }
}
