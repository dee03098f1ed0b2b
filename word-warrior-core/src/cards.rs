//! Cards and the deck manager.
//!
//! A run owns a fixed set of cards that only ever moves between piles:
//! draw pile, the candidates offered for selection, the committed hand,
//! and the discard pile. Nothing here creates or destroys a card after
//! [`initialize_deck`].

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

// ============================================================================
// Card Types
// ============================================================================

/// Unique identifier for a card instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardId(pub Uuid);

impl CardId {
    /// Build an identifier from the injected random source.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self(uuid::Builder::from_random_bytes(rng.gen()).into_uuid())
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Broad card category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardType {
    Attack,
    Defense,
    Skill,
}

impl CardType {
    pub fn name(&self) -> &'static str {
        match self {
            CardType::Attack => "Attack",
            CardType::Defense => "Defense",
            CardType::Skill => "Skill",
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Card tier. Also selects the difficulty of the question a card is charged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rarity {
    #[serde(rename = "R")]
    Rare,
    #[serde(rename = "SR")]
    SuperRare,
    #[serde(rename = "UR")]
    UltraRare,
}

impl Rarity {
    pub fn code(&self) -> &'static str {
        match self {
            Rarity::Rare => "R",
            Rarity::SuperRare => "SR",
            Rarity::UltraRare => "UR",
        }
    }

    pub fn all() -> [Rarity; 3] {
        [Rarity::Rare, Rarity::SuperRare, Rarity::UltraRare]
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Special effect tag carried by a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CardEffect {
    #[default]
    None,
    /// Hits every enemy.
    Aoe,
    /// Swaps attack and defense output.
    SwapAtkDef,
    DoubleDamage,
    Heal,
}

/// Type-specific card parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CardKind {
    Attack { base_attack: u32, attack_count: u32 },
    Defense { base_block: u32, hp_conversion_rate: f64 },
    Skill,
}

impl CardKind {
    pub fn card_type(&self) -> CardType {
        match self {
            CardKind::Attack { .. } => CardType::Attack,
            CardKind::Defense { .. } => CardType::Defense,
            CardKind::Skill => CardType::Skill,
        }
    }
}

/// A single card instance. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub name: String,
    pub rarity: Rarity,
    pub kind: CardKind,
    pub time_bonus_multiplier: f64,
    #[serde(default)]
    pub effect: CardEffect,
}

impl Card {
    pub fn card_type(&self) -> CardType {
        self.kind.card_type()
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            CardKind::Attack {
                base_attack,
                attack_count,
            } => write!(
                f,
                "{} [{}] ATK {base_attack} x{attack_count}",
                self.name, self.rarity
            ),
            CardKind::Defense {
                base_block,
                hp_conversion_rate,
            } => write!(
                f,
                "{} [{}] BLK {base_block} ({:.0}% heal)",
                self.name,
                self.rarity,
                hp_conversion_rate * 100.0
            ),
            CardKind::Skill => write!(
                f,
                "{} [{}] SKILL x{:.1}",
                self.name, self.rarity, self.time_bonus_multiplier
            ),
        }
    }
}

// ============================================================================
// Starter Deck
// ============================================================================

struct CardTemplate {
    name: &'static str,
    rarity: Rarity,
    kind: CardKind,
    time_bonus_multiplier: f64,
    copies: usize,
}

const STARTER_DECK: &[CardTemplate] = &[
    CardTemplate {
        name: "Strike",
        rarity: Rarity::Rare,
        kind: CardKind::Attack {
            base_attack: 50,
            attack_count: 1,
        },
        time_bonus_multiplier: 1.0,
        copies: 5,
    },
    CardTemplate {
        name: "Heavy Blow",
        rarity: Rarity::SuperRare,
        kind: CardKind::Attack {
            base_attack: 80,
            attack_count: 1,
        },
        time_bonus_multiplier: 1.0,
        copies: 2,
    },
    CardTemplate {
        name: "Twin Strike",
        rarity: Rarity::Rare,
        kind: CardKind::Attack {
            base_attack: 30,
            attack_count: 2,
        },
        time_bonus_multiplier: 1.0,
        copies: 1,
    },
    CardTemplate {
        name: "Guard",
        rarity: Rarity::Rare,
        kind: CardKind::Defense {
            base_block: 40,
            hp_conversion_rate: 0.05,
        },
        time_bonus_multiplier: 1.0,
        copies: 3,
    },
    CardTemplate {
        name: "Iron Wall",
        rarity: Rarity::SuperRare,
        kind: CardKind::Defense {
            base_block: 70,
            hp_conversion_rate: 0.08,
        },
        time_bonus_multiplier: 1.0,
        copies: 1,
    },
    CardTemplate {
        name: "Recover",
        rarity: Rarity::Rare,
        kind: CardKind::Defense {
            base_block: 30,
            hp_conversion_rate: 0.15,
        },
        time_bonus_multiplier: 1.0,
        copies: 1,
    },
    CardTemplate {
        name: "Focus",
        rarity: Rarity::Rare,
        kind: CardKind::Skill,
        time_bonus_multiplier: 1.5,
        copies: 1,
    },
    CardTemplate {
        name: "Meditate",
        rarity: Rarity::Rare,
        kind: CardKind::Skill,
        time_bonus_multiplier: 1.3,
        copies: 1,
    },
];

/// Build the starter deck with fresh identities, in template order.
pub fn initialize_deck<R: Rng>(rng: &mut R) -> Vec<Card> {
    let deck: Vec<Card> = STARTER_DECK
        .iter()
        .flat_map(|t| std::iter::repeat(t).take(t.copies))
        .map(|t| Card {
            id: CardId::random(rng),
            name: t.name.to_string(),
            rarity: t.rarity,
            kind: t.kind,
            time_bonus_multiplier: t.time_bonus_multiplier,
            effect: CardEffect::None,
        })
        .collect();
    debug!(size = deck.len(), "initialized starter deck");
    deck
}

/// Uniformly permute a pile in place (Fisher-Yates).
pub fn shuffle<T, R: Rng>(pile: &mut [T], rng: &mut R) {
    pile.shuffle(rng);
}

/// Result of [`draw_with_reshuffle`].
#[derive(Debug, Clone, Default)]
pub struct Draw {
    pub drawn: Vec<Card>,
    pub deck: Vec<Card>,
    pub discard: Vec<Card>,
}

/// Draw up to `n` cards from the top of `deck`.
///
/// Whenever the deck runs dry and the discard pile has cards, the discard
/// pile is shuffled into a fresh deck. When both are empty the draw stops
/// early and returns fewer than `n` cards.
pub fn draw_with_reshuffle<R: Rng>(
    mut deck: Vec<Card>,
    mut discard: Vec<Card>,
    n: usize,
    rng: &mut R,
) -> Draw {
    let mut drawn = Vec::with_capacity(n);

    while drawn.len() < n {
        if deck.is_empty() {
            if discard.is_empty() {
                debug!(wanted = n, got = drawn.len(), "deck and discard exhausted");
                break;
            }
            deck = std::mem::take(&mut discard);
            shuffle(&mut deck, rng);
            debug!(size = deck.len(), "reshuffled discard pile into deck");
        }

        let take = (n - drawn.len()).min(deck.len());
        drawn.extend(deck.drain(..take));
    }

    Draw {
        drawn,
        deck,
        discard,
    }
}

// ============================================================================
// Card Piles
// ============================================================================

/// The four disjoint piles a run's cards live in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardPiles {
    pub deck: Vec<Card>,
    /// Cards drawn and offered for selection this round.
    pub candidates: Vec<Card>,
    /// Cards committed for this round, in pick order.
    pub hand: Vec<Card>,
    pub discard: Vec<Card>,
}

impl CardPiles {
    /// Start a run: everything in the draw pile, shuffled.
    pub fn new<R: Rng>(mut cards: Vec<Card>, rng: &mut R) -> Self {
        shuffle(&mut cards, rng);
        Self {
            deck: cards,
            ..Self::default()
        }
    }

    /// Number of cards across all piles.
    pub fn total(&self) -> usize {
        self.deck.len() + self.candidates.len() + self.hand.len() + self.discard.len()
    }

    /// Draw `n` fresh candidates. Leftover candidates are discarded first.
    ///
    /// Returns how many were drawn.
    pub fn draw_candidates<R: Rng>(&mut self, n: usize, rng: &mut R) -> usize {
        let stale = std::mem::take(&mut self.candidates);
        self.discard.extend(stale);

        let draw = draw_with_reshuffle(
            std::mem::take(&mut self.deck),
            std::mem::take(&mut self.discard),
            n,
            rng,
        );
        self.deck = draw.deck;
        self.discard = draw.discard;
        self.candidates = draw.drawn;
        self.candidates.len()
    }

    /// Move the picked candidates into the hand (in pick order) and the rest to discard.
    ///
    /// Ids that are not current candidates are ignored.
    pub fn commit_selection(&mut self, picks: &[CardId]) {
        let mut remaining = std::mem::take(&mut self.candidates);
        for id in picks {
            if let Some(pos) = remaining.iter().position(|c| c.id == *id) {
                self.hand.push(remaining.remove(pos));
            }
        }
        self.discard.extend(remaining);
    }

    /// Move the hand to the discard pile.
    pub fn discard_hand(&mut self) {
        let hand = std::mem::take(&mut self.hand);
        self.discard.extend(hand);
    }

    /// Move every card in play (candidates and hand) to the discard pile.
    pub fn discard_in_play(&mut self) {
        let candidates = std::mem::take(&mut self.candidates);
        self.discard.extend(candidates);
        self.discard_hand();
    }

    pub fn candidate(&self, id: CardId) -> Option<&Card> {
        self.candidates.iter().find(|c| c.id == id)
    }
}
