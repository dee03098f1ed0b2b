//! Hero and enemy entities.

use crate::map::EnemyKind;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for enemies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnemyId(pub Uuid);

impl EnemyId {
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self(uuid::Builder::from_random_bytes(rng.gen()).into_uuid())
    }
}

impl fmt::Display for EnemyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Health and Shield
// ============================================================================

/// Health pool with a damage-absorbing shield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vitals {
    pub current: u32,
    pub maximum: u32,
    pub block: u32,
}

/// Outcome of [`Vitals::take_damage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageResult {
    pub absorbed: u32,
    pub health_lost: u32,
    pub dropped_to_zero: bool,
}

impl Vitals {
    pub fn new(maximum: u32) -> Self {
        Self {
            current: maximum,
            maximum,
            block: 0,
        }
    }

    /// Shield soaks damage first, the rest comes off health (never below zero).
    pub fn take_damage(&mut self, amount: u32) -> DamageResult {
        let absorbed = self.block.min(amount);
        self.block -= absorbed;
        let remaining = amount - absorbed;
        let health_lost = remaining.min(self.current);
        self.current -= health_lost;
        DamageResult {
            absorbed,
            health_lost,
            dropped_to_zero: self.current == 0,
        }
    }

    /// Heal up to maximum; returns the amount actually restored.
    pub fn heal(&mut self, amount: u32) -> u32 {
        let restored = amount.min(self.maximum - self.current);
        self.current += restored;
        restored
    }

    pub fn add_block(&mut self, amount: u32) {
        self.block = self.block.saturating_add(amount);
    }

    pub fn is_dead(&self) -> bool {
        self.current == 0
    }
}

// ============================================================================
// Hero
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hero {
    pub vitals: Vitals,
    /// Presentation flags; they only gate timing.
    pub is_hit: bool,
    pub is_attacking: bool,
}

impl Hero {
    pub fn new(max_hp: u32) -> Self {
        Self {
            vitals: Vitals::new(max_hp),
            is_hit: false,
            is_attacking: false,
        }
    }
}

// ============================================================================
// Enemies
// ============================================================================

/// An enemy's pre-committed action for its next turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EnemyIntent {
    Attack,
    Defend,
    /// Multi-hit spell, dealt as twice its value.
    Cast,
    #[default]
    Unknown,
}

impl EnemyIntent {
    pub fn name(&self) -> &'static str {
        match self {
            EnemyIntent::Attack => "Attack",
            EnemyIntent::Defend => "Defend",
            EnemyIntent::Cast => "Cast",
            EnemyIntent::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for EnemyIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Roll an intent: 70% attack (100-200), 20% defend (50-100), 10% cast (30-80).
pub fn roll_intent<R: Rng>(rng: &mut R) -> (EnemyIntent, u32) {
    let roll: f64 = rng.gen();
    if roll < 0.7 {
        (EnemyIntent::Attack, rng.gen_range(100..=200))
    } else if roll < 0.9 {
        (EnemyIntent::Defend, rng.gen_range(50..=100))
    } else {
        (EnemyIntent::Cast, rng.gen_range(30..=80))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enemy {
    pub id: EnemyId,
    pub kind: EnemyKind,
    pub vitals: Vitals,
    pub intent: EnemyIntent,
    pub intent_value: u32,
    pub is_hit: bool,
    pub is_attacking: bool,
    pub last_damage_taken: Option<u32>,
}

impl Enemy {
    pub fn new<R: Rng>(kind: EnemyKind, max_hp: u32, rng: &mut R) -> Self {
        Self {
            id: EnemyId::random(rng),
            kind,
            vitals: Vitals::new(max_hp),
            intent: EnemyIntent::Unknown,
            intent_value: 0,
            is_hit: false,
            is_attacking: false,
            last_damage_taken: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        !self.vitals.is_dead()
    }

    /// Commit to a freshly rolled intent.
    pub fn assign_intent<R: Rng>(&mut self, rng: &mut R) {
        let (intent, value) = roll_intent(rng);
        self.intent = intent;
        self.intent_value = value;
    }

    /// Incoming damage this enemy's intent represents for the hero.
    pub fn intended_damage(&self) -> u32 {
        match self.intent {
            EnemyIntent::Attack => self.intent_value,
            EnemyIntent::Cast => self.intent_value * 2,
            EnemyIntent::Defend | EnemyIntent::Unknown => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_shield_absorbs_before_health() {
        let mut vitals = Vitals::new(500);
        vitals.add_block(50);
        let result = vitals.take_damage(80);
        assert_eq!(result.absorbed, 50);
        assert_eq!(result.health_lost, 30);
        assert_eq!(vitals.block, 0);
        assert_eq!(vitals.current, 470);
    }

    #[test]
    fn test_shield_covers_small_hits() {
        let mut vitals = Vitals::new(100);
        vitals.add_block(60);
        let result = vitals.take_damage(25);
        assert_eq!(result.health_lost, 0);
        assert_eq!(vitals.block, 35);
        assert_eq!(vitals.current, 100);
    }

    #[test]
    fn test_damage_clamps_at_zero() {
        let mut vitals = Vitals::new(10);
        let result = vitals.take_damage(50);
        assert_eq!(result.health_lost, 10);
        assert!(result.dropped_to_zero);
        assert!(vitals.is_dead());
    }

    #[test]
    fn test_heal_caps_at_maximum() {
        let mut vitals = Vitals::new(100);
        vitals.take_damage(30);
        assert_eq!(vitals.heal(50), 30);
        assert_eq!(vitals.current, 100);
    }

    #[test]
    fn test_intent_distribution_and_ranges() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut counts = [0usize; 3];
        for _ in 0..5000 {
            let (intent, value) = roll_intent(&mut rng);
            match intent {
                EnemyIntent::Attack => {
                    assert!((100..=200).contains(&value));
                    counts[0] += 1;
                }
                EnemyIntent::Defend => {
                    assert!((50..=100).contains(&value));
                    counts[1] += 1;
                }
                EnemyIntent::Cast => {
                    assert!((30..=80).contains(&value));
                    counts[2] += 1;
                }
                EnemyIntent::Unknown => panic!("rolled unknown intent"),
            }
        }
        assert!((3200..3800).contains(&counts[0]), "{counts:?}");
        assert!((800..1200).contains(&counts[1]), "{counts:?}");
        assert!((300..700).contains(&counts[2]), "{counts:?}");
    }

    #[test]
    fn test_cast_deals_double() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut enemy = Enemy::new(EnemyKind::Slime, 500, &mut rng);
        enemy.intent = EnemyIntent::Cast;
        enemy.intent_value = 40;
        assert_eq!(enemy.intended_damage(), 80);
        enemy.intent = EnemyIntent::Defend;
        assert_eq!(enemy.intended_damage(), 0);
    }
}
