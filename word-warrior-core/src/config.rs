//! Game configuration.

use crate::cards::Rarity;
use crate::combat::MAX_TARGETS_PER_ROUND;
use crate::quiz::QuestionTiming;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Delays between combat phases, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseTimings {
    /// Answered sentence clears before the next question.
    pub clear_ms: u64,
    /// Hero wind-up before the hand lands.
    pub strike_ms: u64,
    /// Hit markers linger before dead enemies are removed.
    pub purge_ms: u64,
    pub enemy_windup_ms: u64,
    pub enemy_recover_ms: u64,
    /// Countdown granularity.
    pub tick_ms: u64,
}

impl Default for PhaseTimings {
    fn default() -> Self {
        Self {
            clear_ms: 300,
            strike_ms: 300,
            purge_ms: 800,
            enemy_windup_ms: 800,
            enemy_recover_ms: 500,
            tick_ms: 100,
        }
    }
}

impl PhaseTimings {
    pub fn clear(&self) -> Duration {
        Duration::from_millis(self.clear_ms)
    }

    pub fn strike(&self) -> Duration {
        Duration::from_millis(self.strike_ms)
    }

    pub fn purge(&self) -> Duration {
        Duration::from_millis(self.purge_ms)
    }

    pub fn enemy_windup(&self) -> Duration {
        Duration::from_millis(self.enemy_windup_ms)
    }

    pub fn enemy_recover(&self) -> Duration {
        Duration::from_millis(self.enemy_recover_ms)
    }
}

/// Per-rarity question timing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingTable {
    pub rare: QuestionTiming,
    pub super_rare: QuestionTiming,
    pub ultra_rare: QuestionTiming,
}

impl Default for TimingTable {
    fn default() -> Self {
        Self {
            rare: QuestionTiming::for_rarity(Rarity::Rare),
            super_rare: QuestionTiming::for_rarity(Rarity::SuperRare),
            ultra_rare: QuestionTiming::for_rarity(Rarity::UltraRare),
        }
    }
}

impl TimingTable {
    pub fn for_rarity(&self, rarity: Rarity) -> QuestionTiming {
        match rarity {
            Rarity::Rare => self.rare,
            Rarity::SuperRare => self.super_rare,
            Rarity::UltraRare => self.ultra_rare,
        }
    }
}

/// Configuration for a game session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub hero_max_hp: u32,

    /// Max HP of a plain floor-1 enemy.
    pub base_enemy_hp: u32,

    /// Candidates drawn per round.
    pub draw_size: usize,

    /// Cards committed per round.
    pub hand_size: usize,

    /// Chance of reinforcements after each answered question.
    pub spawn_chance: f64,

    pub max_targets: u32,

    /// Seed for the session's random source. Entropy when unset.
    pub seed: Option<u64>,

    pub timing: TimingTable,

    pub phases: PhaseTimings,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            hero_max_hp: 500,
            base_enemy_hp: 500,
            draw_size: 8,
            hand_size: 5,
            spawn_chance: 0.2,
            max_targets: MAX_TARGETS_PER_ROUND,
            seed: None,
            timing: TimingTable::default(),
            phases: PhaseTimings::default(),
        }
    }
}

impl GameConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: GameConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hero_max_hp == 0 {
            return Err(ConfigError::Invalid {
                field: "hero_max_hp",
                reason: "must be positive".to_string(),
            });
        }
        if self.base_enemy_hp == 0 {
            return Err(ConfigError::Invalid {
                field: "base_enemy_hp",
                reason: "must be positive".to_string(),
            });
        }
        if self.hand_size == 0 || self.draw_size < self.hand_size {
            return Err(ConfigError::Invalid {
                field: "draw_size",
                reason: format!(
                    "need 0 < hand_size ({}) <= draw_size ({})",
                    self.hand_size, self.draw_size
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.spawn_chance) {
            return Err(ConfigError::Invalid {
                field: "spawn_chance",
                reason: format!("{} is not a probability", self.spawn_chance),
            });
        }
        if self.phases.tick_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "phases.tick_ms",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_hero_max_hp(mut self, hp: u32) -> Self {
        self.hero_max_hp = hp;
        self
    }

    pub fn with_base_enemy_hp(mut self, hp: u32) -> Self {
        self.base_enemy_hp = hp;
        self
    }

    pub fn with_spawn_chance(mut self, chance: f64) -> Self {
        self.spawn_chance = chance;
        self
    }

    /// Set how many candidates are drawn and how many are kept.
    pub fn with_hand(mut self, draw_size: usize, hand_size: usize) -> Self {
        self.draw_size = draw_size;
        self.hand_size = hand_size;
        self
    }

    pub fn with_phases(mut self, phases: PhaseTimings) -> Self {
        self.phases = phases;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = GameConfig::default();
        assert_eq!(config.hero_max_hp, 500);
        assert_eq!(config.draw_size, 8);
        assert_eq!(config.hand_size, 5);
        assert_eq!(config.max_targets, 10);
        assert_eq!(config.timing.for_rarity(Rarity::SuperRare).time_limit_secs, 25);
        assert_eq!(config.phases.purge(), Duration::from_millis(800));
        config.validate().unwrap();
    }

    #[test]
    fn test_load_partial_json() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"hero_max_hp": 900, "seed": 42, "phases": {"purge_ms": 10}}"#,
        )
        .unwrap();

        let config = GameConfig::load_json(&path).unwrap();
        assert_eq!(config.hero_max_hp, 900);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.phases.purge_ms, 10);
        assert_eq!(config.phases.strike_ms, 300);
        assert_eq!(config.base_enemy_hp, 500);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"draw_size": 3, "hand_size": 5}"#).unwrap();
        assert!(matches!(
            GameConfig::load_json(&path),
            Err(ConfigError::Invalid { field: "draw_size", .. })
        ));

        assert!(GameConfig::default()
            .with_spawn_chance(1.5)
            .validate()
            .is_err());
        assert!(matches!(
            GameConfig::default().with_base_enemy_hp(0).validate(),
            Err(ConfigError::Invalid { field: "base_enemy_hp", .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            GameConfig::load_json("/definitely/not/here.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
