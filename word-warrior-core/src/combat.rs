//! Hand resolution and the enemy turn.
//!
//! Resolution follows the same two steps everywhere: a `resolve_*` function
//! reads the combatants and produces a [`Resolution`] (effects plus a
//! narrative), and [`apply_effects`] commits those effects. Resolving never
//! mutates state, so the caller decides when an outcome lands.

use crate::cards::CardType;
use crate::entity::{Enemy, EnemyId, EnemyIntent, Hero};
use crate::scoring::CardResult;
use serde::{Deserialize, Serialize};

/// Default cap on enemies hit by one hand.
pub const MAX_TARGETS_PER_ROUND: u32 = 10;

// ============================================================================
// Aggregation
// ============================================================================

/// The combined output of one hand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HandTotals {
    pub total_base_attack: u32,
    pub attack_time_multiplier: f64,
    pub final_attack: u32,
    /// Enemies hit this round, already capped.
    pub total_attack_count: u32,
    pub total_base_block: u32,
    pub block_time_multiplier: f64,
    pub final_block: u32,
    pub total_hp_conversion: f64,
    /// `floor(final_block * total_hp_conversion)`, before capping at max health.
    pub heal: u32,
}

/// Combine card results.
///
/// Attack and block each use `floor(sum(power) * sum(time multiplier))`
/// over the results of their own card type. Skill results contribute nothing.
pub fn aggregate(results: &[CardResult], max_targets: u32) -> HandTotals {
    let mut totals = HandTotals::default();
    let mut attack_count: u32 = 0;

    for r in results {
        match r.card_type {
            CardType::Attack => {
                totals.total_base_attack += r.attack_power;
                totals.attack_time_multiplier += r.time_multiplier;
                attack_count = attack_count.saturating_add(r.attack_count);
            }
            CardType::Defense => {
                totals.total_base_block += r.block_power;
                totals.block_time_multiplier += r.time_multiplier;
                totals.total_hp_conversion += r.hp_conversion;
            }
            CardType::Skill => {}
        }
    }

    totals.final_attack =
        (f64::from(totals.total_base_attack) * totals.attack_time_multiplier).floor() as u32;
    totals.total_attack_count = attack_count.min(max_targets);
    totals.final_block =
        (f64::from(totals.total_base_block) * totals.block_time_multiplier).floor() as u32;
    if totals.total_hp_conversion > 0.0 {
        totals.heal = (f64::from(totals.final_block) * totals.total_hp_conversion).floor() as u32;
    }
    totals
}

// ============================================================================
// Effects
// ============================================================================

/// Everything a fight touches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combatants {
    pub hero: Hero,
    pub enemies: Vec<Enemy>,
}

impl Combatants {
    pub fn living_enemies(&self) -> impl Iterator<Item = &Enemy> {
        self.enemies.iter().filter(|e| e.is_alive())
    }

    pub fn enemy(&self, id: EnemyId) -> Option<&Enemy> {
        self.enemies.iter().find(|e| e.id == id)
    }
}

/// A concrete state change produced by resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    HeroShieldGained { amount: u32 },
    HeroHealed { amount: u32 },
    HeroDamaged {
        amount: u32,
        absorbed: u32,
        health_lost: u32,
        dropped_to_zero: bool,
    },
    EnemyDamaged {
        enemy_id: EnemyId,
        amount: u32,
        absorbed: u32,
        health_lost: u32,
        killed: bool,
    },
    EnemyShieldGained { enemy_id: EnemyId, amount: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub effects: Vec<Effect>,
    pub narrative: String,
}

impl Resolution {
    pub fn new(narrative: impl Into<String>) -> Self {
        Self {
            effects: Vec::new(),
            narrative: narrative.into(),
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }

    /// Total health enemies lost.
    pub fn enemy_health_lost(&self) -> u32 {
        self.effects
            .iter()
            .map(|e| match e {
                Effect::EnemyDamaged { health_lost, .. } => *health_lost,
                _ => 0,
            })
            .sum()
    }

    pub fn enemies_killed(&self) -> usize {
        self.effects
            .iter()
            .filter(|e| matches!(e, Effect::EnemyDamaged { killed: true, .. }))
            .count()
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// The player's side of a round: shield and heal for the hero, then damage.
///
/// Up to `total_attack_count` living enemies are hit in list order, each for
/// the full `final_attack`. Dead enemies never take a hit, so a kill moves
/// the next hit on to the next living enemy.
pub fn resolve_hand(combatants: &Combatants, totals: &HandTotals) -> Resolution {
    let mut effects = Vec::new();
    let mut hero = combatants.hero.vitals;

    if totals.final_block > 0 {
        hero.add_block(totals.final_block);
        effects.push(Effect::HeroShieldGained {
            amount: totals.final_block,
        });
    }
    if totals.heal > 0 {
        let restored = hero.heal(totals.heal);
        if restored > 0 {
            effects.push(Effect::HeroHealed { amount: restored });
        }
    }

    let mut hits = 0;
    if totals.final_attack > 0 && totals.total_attack_count > 0 {
        for enemy in combatants.enemies.iter().filter(|e| e.is_alive()) {
            if hits >= totals.total_attack_count {
                break;
            }
            let mut vitals = enemy.vitals;
            let outcome = vitals.take_damage(totals.final_attack);
            effects.push(Effect::EnemyDamaged {
                enemy_id: enemy.id,
                amount: totals.final_attack,
                absorbed: outcome.absorbed,
                health_lost: outcome.health_lost,
                killed: outcome.dropped_to_zero,
            });
            hits += 1;
        }
    }

    let narrative = if hits > 0 {
        format!(
            "You strike {hits} {} for {} damage.",
            if hits == 1 { "enemy" } else { "enemies" },
            totals.final_attack
        )
    } else if totals.final_block > 0 {
        format!("You brace behind {} shield.", totals.final_block)
    } else {
        "Your hand fizzles.".to_string()
    };
    Resolution::new(narrative).with_effects(effects)
}

/// Every living enemy acts on its intent. Damage pools into one hit on the hero.
pub fn resolve_enemy_turn(combatants: &Combatants) -> Resolution {
    let mut effects = Vec::new();
    let mut pooled: u32 = 0;

    for enemy in combatants.living_enemies() {
        match enemy.intent {
            EnemyIntent::Attack | EnemyIntent::Cast => {
                pooled = pooled.saturating_add(enemy.intended_damage());
            }
            EnemyIntent::Defend => effects.push(Effect::EnemyShieldGained {
                enemy_id: enemy.id,
                amount: enemy.intent_value,
            }),
            EnemyIntent::Unknown => {}
        }
    }

    if pooled == 0 {
        return Resolution::new("The enemies hold their ground.").with_effects(effects);
    }

    let mut hero = combatants.hero.vitals;
    let outcome = hero.take_damage(pooled);
    effects.push(Effect::HeroDamaged {
        amount: pooled,
        absorbed: outcome.absorbed,
        health_lost: outcome.health_lost,
        dropped_to_zero: outcome.dropped_to_zero,
    });

    let narrative = if outcome.absorbed > 0 {
        format!(
            "Enemies deal {pooled} damage; your shield absorbs {} and you lose {} HP.",
            outcome.absorbed, outcome.health_lost
        )
    } else {
        format!("Enemies deal {pooled} damage.")
    };
    Resolution::new(narrative).with_effects(effects)
}

/// Apply effects in order.
pub fn apply_effects(combatants: &mut Combatants, effects: &[Effect]) {
    for effect in effects {
        apply_effect(combatants, effect);
    }
}

/// Apply a single effect.
pub fn apply_effect(combatants: &mut Combatants, effect: &Effect) {
    match effect {
        Effect::HeroShieldGained { amount } => combatants.hero.vitals.add_block(*amount),
        Effect::HeroHealed { amount } => {
            combatants.hero.vitals.heal(*amount);
        }
        Effect::HeroDamaged { amount, .. } => {
            combatants.hero.vitals.take_damage(*amount);
            combatants.hero.is_hit = true;
        }
        Effect::EnemyDamaged {
            enemy_id, amount, ..
        } => {
            if let Some(enemy) = combatants.enemies.iter_mut().find(|e| e.id == *enemy_id) {
                enemy.vitals.take_damage(*amount);
                enemy.is_hit = true;
                enemy.last_damage_taken = Some(*amount);
            }
        }
        Effect::EnemyShieldGained { enemy_id, amount } => {
            if let Some(enemy) = combatants.enemies.iter_mut().find(|e| e.id == *enemy_id) {
                enemy.vitals.add_block(*amount);
            }
        }
    }
}

/// Remove dead enemies and clear hit markers. Returns how many were removed.
pub fn purge_dead(enemies: &mut Vec<Enemy>) -> usize {
    let before = enemies.len();
    enemies.retain(|e| e.is_alive());
    for enemy in enemies.iter_mut() {
        enemy.is_hit = false;
        enemy.last_damage_taken = None;
    }
    before - enemies.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::CardId;
    use crate::map::EnemyKind;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use uuid::Uuid;

    fn attack(power: u32, count: u32, mult: f64) -> CardResult {
        CardResult {
            card_id: CardId(Uuid::nil()),
            card_type: CardType::Attack,
            attack_power: power,
            attack_count: count,
            block_power: 0,
            hp_conversion: 0.0,
            time_multiplier: mult,
            is_perfect: false,
        }
    }

    fn defense(block: u32, conversion: f64, mult: f64) -> CardResult {
        CardResult {
            card_type: CardType::Defense,
            attack_power: 0,
            attack_count: 0,
            block_power: block,
            hp_conversion: conversion,
            ..attack(0, 0, mult)
        }
    }

    fn combatants(hp: &[u32]) -> Combatants {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        Combatants {
            hero: Hero::new(500),
            enemies: hp
                .iter()
                .map(|h| {
                    let mut e = Enemy::new(EnemyKind::Slime, 500, &mut rng);
                    e.vitals.current = *h;
                    e
                })
                .collect(),
        }
    }

    #[test]
    fn test_aggregate_sums_time_multipliers() {
        let totals = aggregate(&[attack(40, 1, 1.5), attack(30, 1, 2.0)], 10);
        assert_eq!(totals.total_base_attack, 70);
        assert_eq!(totals.attack_time_multiplier, 3.5);
        assert_eq!(totals.final_attack, 245);
        assert_eq!(totals.total_attack_count, 2);
    }

    #[test]
    fn test_aggregate_caps_targets() {
        let results: Vec<CardResult> = (0..5).map(|_| attack(10, 3, 1.0)).collect();
        assert_eq!(aggregate(&results, 10).total_attack_count, 10);
    }

    #[test]
    fn test_aggregate_block_and_heal() {
        let totals = aggregate(&[defense(40, 0.06, 1.5), defense(30, 0.15, 1.0)], 10);
        assert_eq!(totals.final_block, 175);
        assert_eq!(totals.heal, 36);
        assert_eq!(totals.final_attack, 0);
    }

    #[test]
    fn test_aggregate_empty_hand() {
        assert_eq!(aggregate(&[], 10), HandTotals::default());
    }

    #[test]
    fn test_cascade_skips_dead_and_stops_at_count() {
        let mut c = combatants(&[10, 500, 500]);
        let totals = HandTotals {
            final_attack: 50,
            total_attack_count: 2,
            ..HandTotals::default()
        };
        let resolution = resolve_hand(&c, &totals);
        apply_effects(&mut c, &resolution.effects);

        assert_eq!(c.enemies[0].vitals.current, 0);
        assert_eq!(c.enemies[1].vitals.current, 450);
        assert_eq!(c.enemies[2].vitals.current, 500);
        assert_eq!(resolution.enemies_killed(), 1);
        assert_eq!(resolution.enemy_health_lost(), 60);

        assert_eq!(purge_dead(&mut c.enemies), 1);
        assert_eq!(c.enemies.len(), 2);
        assert!(c.enemies.iter().all(|e| !e.is_hit));
    }

    #[test]
    fn test_dead_enemies_are_never_targeted() {
        let c = combatants(&[0, 0, 300]);
        let totals = HandTotals {
            final_attack: 100,
            total_attack_count: 1,
            ..HandTotals::default()
        };
        let resolution = resolve_hand(&c, &totals);
        assert_eq!(resolution.effects.len(), 1);
        assert!(matches!(
            resolution.effects[0],
            Effect::EnemyDamaged { enemy_id, .. } if enemy_id == c.enemies[2].id
        ));
    }

    #[test]
    fn test_enemy_shield_absorbs_hero_damage() {
        let mut c = combatants(&[500]);
        c.enemies[0].vitals.block = 30;
        let totals = HandTotals {
            final_attack: 100,
            total_attack_count: 1,
            ..HandTotals::default()
        };
        let resolution = resolve_hand(&c, &totals);
        apply_effects(&mut c, &resolution.effects);
        assert_eq!(c.enemies[0].vitals.current, 430);
        assert_eq!(c.enemies[0].vitals.block, 0);
    }

    #[test]
    fn test_heal_is_capped_at_max() {
        let mut c = combatants(&[500]);
        c.hero.vitals.current = 490;
        let totals = HandTotals {
            final_block: 200,
            heal: 40,
            ..HandTotals::default()
        };
        let resolution = resolve_hand(&c, &totals);
        apply_effects(&mut c, &resolution.effects);
        assert_eq!(c.hero.vitals.current, 500);
        assert_eq!(c.hero.vitals.block, 200);
        assert!(resolution.effects.contains(&Effect::HeroHealed { amount: 10 }));
    }

    #[test]
    fn test_enemy_turn_pools_damage_through_shield() {
        let mut c = combatants(&[500, 500, 500]);
        c.hero.vitals.block = 50;
        c.enemies[0].intent = EnemyIntent::Attack;
        c.enemies[0].intent_value = 50;
        c.enemies[1].intent = EnemyIntent::Cast;
        c.enemies[1].intent_value = 15;
        c.enemies[2].intent = EnemyIntent::Defend;
        c.enemies[2].intent_value = 70;

        let resolution = resolve_enemy_turn(&c);
        apply_effects(&mut c, &resolution.effects);

        // 50 + 2 * 15 = 80 against a 50 shield.
        assert_eq!(c.hero.vitals.current, 470);
        assert_eq!(c.hero.vitals.block, 0);
        assert_eq!(c.enemies[2].vitals.block, 70);
    }

    #[test]
    fn test_enemy_turn_can_kill_hero() {
        let mut c = combatants(&[500]);
        c.hero.vitals.current = 20;
        c.enemies[0].intent = EnemyIntent::Attack;
        c.enemies[0].intent_value = 150;
        let resolution = resolve_enemy_turn(&c);
        apply_effects(&mut c, &resolution.effects);
        assert_eq!(c.hero.vitals.current, 0);
        assert!(matches!(
            resolution.effects.last(),
            Some(Effect::HeroDamaged {
                dropped_to_zero: true,
                ..
            })
        ));
    }
}
