//! GameSession - the primary public API for playing a run.
//!
//! The session is a finite-state machine. User intents are methods that
//! return whether they were accepted; anything arriving in the wrong status
//! is a no-op. Timed phases (sentence clear, strike, purge, enemy turn) and
//! the per-question countdown are events on a [`Scheduler`], so nothing
//! happens until the driver moves the clock with [`GameSession::advance_clock`].

use crate::cards::{initialize_deck, Card, CardId, CardPiles, CardType, Rarity};
use crate::combat::{
    aggregate, apply_effects, purge_dead, resolve_enemy_turn, resolve_hand, Combatants,
    HandTotals,
};
use crate::config::{ConfigError, GameConfig};
use crate::entity::{Enemy, Hero};
use crate::map::{
    generate_encounter, generate_floor_map, scaled_hp, EnemyKind, MapState, NodeType,
};
use crate::quiz::{questions_for_cards, CharBlock, QuestionSource, Role, Sentence, StaticCatalog};
use crate::scheduler::Scheduler;
use crate::scoring::{score_answer, CardResult, Feedback};
use crate::selector::SelectorError;
use crate::stats::{JsonFileStore, MemoryStatsStore, StatsError, StatsStore};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from GameSession operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Question selection failed: {0}")]
    Selector(#[from] SelectorError),

    #[error("Stats error: {0}")]
    Stats(#[from] StatsError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Where the session is in its flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameStatus {
    Start,
    Map,
    CardSelection,
    Playing,
    Feedback,
    PlayerAttack,
    EnemyAttack,
    Victory,
    GameOver,
    Paused,
}

impl GameStatus {
    pub fn name(&self) -> &'static str {
        match self {
            GameStatus::Start => "START",
            GameStatus::Map => "MAP",
            GameStatus::CardSelection => "CARD_SELECTION",
            GameStatus::Playing => "PLAYING",
            GameStatus::Feedback => "FEEDBACK",
            GameStatus::PlayerAttack => "PLAYER_ATTACK",
            GameStatus::EnemyAttack => "ENEMY_ATTACK",
            GameStatus::Victory => "VICTORY",
            GameStatus::GameOver => "GAMEOVER",
            GameStatus::Paused => "PAUSED",
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Scheduled Events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// The answered sentence has cleared.
    Cleared,
    /// The hero's attack lands.
    Strike,
    /// Dead enemies are removed.
    Purge,
    /// Enemy damage lands.
    EnemyStrike,
    EnemyRecover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    /// Countdown tick, tagged with the question it belongs to and the time it covers.
    Tick { generation: u64, step_ms: u64 },
    Phase(Phase),
}

// ============================================================================
// Snapshots
// ============================================================================

/// The question currently on screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionView {
    pub question_id: String,
    pub text: String,
    pub blocks: Vec<CharBlock>,
    pub card_name: String,
    pub card_type: CardType,
    pub rarity: Rarity,
    pub time_limit_secs: u32,
    pub is_clearing: bool,
}

/// Card counts per pile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PileSizes {
    pub deck: usize,
    pub candidates: usize,
    pub hand: usize,
    pub discard: usize,
}

/// Everything a presentation layer needs for one frame. Fully owned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub status: GameStatus,
    /// Status to return to when paused.
    pub paused_from: Option<GameStatus>,
    pub score: u64,
    pub combo: u32,
    pub level: u32,
    pub round: u32,
    /// Questions answered this round.
    pub round_progress: usize,
    /// Questions in this round's hand.
    pub round_length: usize,
    pub perfects_in_round: u32,
    /// What the hand would resolve to right now.
    pub preview: HandTotals,
    pub hero: Hero,
    pub enemies: Vec<Enemy>,
    pub feedback: Option<Feedback>,
    pub time_left_secs: f64,
    pub question: Option<QuestionView>,
    pub candidates: Vec<Card>,
    /// Candidate indices in pick order.
    pub picked: Vec<usize>,
    pub max_select: usize,
    pub map: MapState,
    pub piles: PileSizes,
}

// ============================================================================
// Session
// ============================================================================

/// A single player's run.
pub struct GameSession {
    config: GameConfig,
    source: Box<dyn QuestionSource + Send>,
    stats: Box<dyn StatsStore>,
    rng: ChaCha8Rng,
    scheduler: Scheduler<Event>,

    status: GameStatus,
    paused_from: Option<GameStatus>,
    score: u64,
    combo: u32,
    level: u32,
    round: u32,

    map: MapState,
    combatants: Combatants,
    piles: CardPiles,
    picks: Vec<CardId>,

    sentences: Vec<Sentence>,
    current: usize,
    results: Vec<CardResult>,
    perfects_in_round: u32,
    feedback: Option<Feedback>,
    /// Countdown in milliseconds.
    time_left_ms: u64,
    countdown_generation: u64,

    journal: Vec<String>,
}

impl GameSession {
    /// Create a session over a question source and a stats store.
    pub fn new(
        config: GameConfig,
        source: Box<dyn QuestionSource + Send>,
        stats: Box<dyn StatsStore>,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let hero = Hero::new(config.hero_max_hp);
        Self {
            config,
            source,
            stats,
            rng,
            scheduler: Scheduler::new(),
            status: GameStatus::Start,
            paused_from: None,
            score: 0,
            combo: 0,
            level: 1,
            round: 0,
            map: generate_floor_map(1),
            combatants: Combatants {
                hero,
                enemies: Vec::new(),
            },
            piles: CardPiles::default(),
            picks: Vec::new(),
            sentences: Vec::new(),
            current: 0,
            results: Vec::new(),
            perfects_in_round: 0,
            feedback: None,
            time_left_ms: 0,
            countdown_generation: 0,
            journal: Vec::new(),
        }
    }

    /// A session over the built-in catalog and volatile stats.
    pub fn with_defaults(config: GameConfig) -> Self {
        Self::new(
            config,
            Box::new(StaticCatalog::builtin()),
            Box::new(MemoryStatsStore::new()),
        )
    }

    /// Like [`new`](Self::new), but rejects an invalid config.
    pub fn try_new(
        config: GameConfig,
        source: Box<dyn QuestionSource + Send>,
        stats: Box<dyn StatsStore>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self::new(config, source, stats))
    }

    /// A session over the built-in catalog with stats kept in a JSON file.
    pub fn with_stats_file(config: GameConfig, path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let store = JsonFileStore::open(path)?;
        Self::try_new(config, Box::new(StaticCatalog::builtin()), Box::new(store))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn hero(&self) -> &Hero {
        &self.combatants.hero
    }

    pub fn enemies(&self) -> &[Enemy] {
        &self.combatants.enemies
    }

    pub fn map(&self) -> &MapState {
        &self.map
    }

    pub fn piles(&self) -> &CardPiles {
        &self.piles
    }

    pub fn results(&self) -> &[CardResult] {
        &self.results
    }

    pub fn feedback(&self) -> Option<&Feedback> {
        self.feedback.as_ref()
    }

    pub fn stats(&self) -> &dyn StatsStore {
        self.stats.as_ref()
    }

    /// The sentence being answered (or clearing).
    pub fn current_sentence(&self) -> Option<&Sentence> {
        self.sentences.get(self.current)
    }

    pub fn time_left_secs(&self) -> f64 {
        self.time_left_ms as f64 / 1000.0
    }

    /// Virtual time since the session was created.
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    /// How many candidates must be picked before confirming.
    pub fn max_select(&self) -> usize {
        self.config.hand_size.min(self.piles.candidates.len())
    }

    /// Mutable access for scripted scenarios.
    pub fn combatants_mut(&mut self) -> &mut Combatants {
        &mut self.combatants
    }

    /// Take the journal lines written since the last call.
    pub fn drain_log(&mut self) -> Vec<String> {
        std::mem::take(&mut self.journal)
    }

    /// When the next timed phase (not a countdown tick) is due.
    pub fn next_phase_due(&self) -> Option<Duration> {
        self.scheduler
            .next_due_where(|e| matches!(e, Event::Phase(_)))
    }

    pub fn snapshot(&self) -> GameSnapshot {
        let picked = self
            .picks
            .iter()
            .filter_map(|id| self.piles.candidates.iter().position(|c| c.id == *id))
            .collect();
        let question = self.current_sentence().and_then(|s| {
            let card = self.piles.hand.get(self.current)?;
            Some(QuestionView {
                question_id: s.question_id.clone(),
                text: s.text.clone(),
                blocks: s.blocks.clone(),
                card_name: card.name.clone(),
                card_type: card.card_type(),
                rarity: card.rarity,
                time_limit_secs: s.time_limit_secs,
                is_clearing: s.is_clearing,
            })
        });

        GameSnapshot {
            status: self.status,
            paused_from: self.paused_from,
            score: self.score,
            combo: self.combo,
            level: self.level,
            round: self.round,
            round_progress: self.results.len(),
            round_length: self.sentences.len(),
            perfects_in_round: self.perfects_in_round,
            preview: aggregate(&self.results, self.config.max_targets),
            hero: self.combatants.hero.clone(),
            enemies: self.combatants.enemies.clone(),
            feedback: self.feedback.clone(),
            time_left_secs: self.time_left_secs(),
            question,
            candidates: self.piles.candidates.clone(),
            picked,
            max_select: self.max_select(),
            map: self.map.clone(),
            piles: PileSizes {
                deck: self.piles.deck.len(),
                candidates: self.piles.candidates.len(),
                hand: self.piles.hand.len(),
                discard: self.piles.discard.len(),
            },
        }
    }

    fn log(&mut self, line: impl Into<String>) {
        self.journal.push(line.into());
    }

    // ========================================================================
    // Intents
    // ========================================================================

    /// Begin a run from the title screen.
    pub fn start(&mut self) -> bool {
        if self.status != GameStatus::Start {
            return false;
        }
        self.new_run();
        true
    }

    /// Begin a fresh run after defeat.
    pub fn restart(&mut self) -> bool {
        if self.status != GameStatus::GameOver {
            return false;
        }
        self.new_run();
        true
    }

    /// Abandon the run and return to the title screen.
    pub fn quit(&mut self) -> bool {
        if self.status == GameStatus::Start {
            return false;
        }
        self.scheduler.clear();
        self.piles.discard_in_play();
        self.picks.clear();
        self.clear_round();
        self.paused_from = None;
        self.status = GameStatus::Start;
        info!(score = self.score, level = self.level, "run abandoned");
        self.log("You leave the tower.");
        true
    }

    /// Enter a map node: the current one if it is still open, or the next one.
    pub fn enter_node(&mut self, node_id: &str) -> bool {
        if self.status != GameStatus::Map {
            return false;
        }

        let open_here = self.map.current_node_id == node_id
            && self.map.current_node().is_some_and(|n| !n.completed);
        if !open_here {
            if self.map.current_node().is_some_and(|n| !n.completed) {
                warn!(node = node_id, "current node must be cleared first");
                return false;
            }
            let moved = self.map.move_to_node(node_id);
            if moved.current_node_id != node_id {
                return false;
            }
            self.map = moved;
        }

        let Some(node) = self.map.current_node() else {
            return false;
        };
        let node_type = node.node_type;

        match generate_encounter(node_type, self.map.floor) {
            Some(encounter) => {
                let hp = encounter.enemy_hp(self.config.base_enemy_hp);
                let mut enemies = Vec::with_capacity(encounter.enemy_count as usize);
                for _ in 0..encounter.enemy_count {
                    let mut enemy = Enemy::new(encounter.kind, hp, &mut self.rng);
                    enemy.assign_intent(&mut self.rng);
                    enemies.push(enemy);
                }
                info!(
                    node = node_id,
                    kind = %encounter.kind,
                    count = encounter.enemy_count,
                    hp,
                    "encounter started"
                );
                self.log(format!(
                    "{node_type}: {} {} appear ({hp} HP each).",
                    encounter.enemy_count, encounter.kind
                ));
                self.combatants.enemies = enemies;
                self.combatants.hero.vitals.block = 0;
                self.combatants.hero.is_hit = false;
                self.combatants.hero.is_attacking = false;
                self.round = 0;
                self.start_round();
            }
            None => {
                self.map = self.map.complete_node(node_id);
                debug!(node = node_id, %node_type, "non-combat node completed");
                self.log(format!("{node_type}: nothing stirs. Node cleared."));
            }
        }
        true
    }

    /// Pick or unpick a candidate by index.
    pub fn toggle_card(&mut self, index: usize) -> bool {
        if self.status != GameStatus::CardSelection {
            return false;
        }
        let Some(card) = self.piles.candidates.get(index) else {
            return false;
        };
        let id = card.id;
        if let Some(pos) = self.picks.iter().position(|p| *p == id) {
            self.picks.remove(pos);
            return true;
        }
        if self.picks.len() >= self.max_select() {
            return false;
        }
        self.picks.push(id);
        true
    }

    /// Commit the picked cards and draw one question per card.
    ///
    /// Accepted only with exactly [`max_select`](Self::max_select) picks.
    pub fn confirm_selection(&mut self) -> Result<bool, SessionError> {
        if self.status != GameStatus::CardSelection || self.picks.len() != self.max_select() {
            return Ok(false);
        }

        let hand: Vec<Card> = self
            .picks
            .iter()
            .filter_map(|id| self.piles.candidate(*id).cloned())
            .collect();
        let mut sentences =
            questions_for_cards(self.source.as_ref(), self.stats.as_ref(), &hand, &mut self.rng)?;
        for (sentence, card) in sentences.iter_mut().zip(&hand) {
            let timing = self.config.timing.for_rarity(card.rarity);
            sentence.time_limit_secs = timing.time_limit_secs;
            sentence.perfect_threshold = timing.perfect_threshold;
        }

        let picks = std::mem::take(&mut self.picks);
        self.piles.commit_selection(&picks);
        self.sentences = sentences;
        self.current = 0;
        debug!(hand = self.piles.hand.len(), "hand committed");
        self.log(format!(
            "Hand: {}",
            self.piles
                .hand
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
        self.start_question();
        Ok(true)
    }

    /// Tag (or untag) a block of the current sentence.
    pub fn mark_block(&mut self, index: usize, role: Role) -> bool {
        if self.status != GameStatus::Playing {
            return false;
        }
        match self.sentences.get_mut(self.current) {
            Some(sentence) if !sentence.is_clearing => sentence.toggle(index, role),
            _ => false,
        }
    }

    /// Grade the current sentence.
    pub fn submit(&mut self) -> bool {
        if self.status != GameStatus::Playing {
            return false;
        }
        let (Some(sentence), Some(card)) =
            (self.sentences.get(self.current), self.piles.hand.get(self.current))
        else {
            return false;
        };
        if sentence.is_clearing {
            return false;
        }

        let scored = score_answer(card, sentence, self.time_left_secs(), self.stats.as_mut());
        let line = format!(
            "{} {}: accuracy {:.0}%, time x{:.2}{}",
            card.name,
            sentence.text,
            scored.feedback.grade.accuracy * 100.0,
            scored.feedback.time_multiplier,
            if scored.feedback.is_perfect { " PERFECT" } else { "" }
        );
        self.stop_countdown();

        if scored.feedback.is_perfect {
            self.perfects_in_round += 1;
            self.combo += 1;
        } else {
            self.combo = 0;
        }
        self.log(line);
        self.results.push(scored.result);
        self.feedback = Some(scored.feedback);
        self.status = GameStatus::Feedback;
        true
    }

    /// Dismiss feedback and move on to the next question or the attack.
    pub fn continue_round(&mut self) -> bool {
        if self.status != GameStatus::Feedback || self.feedback.is_none() {
            return false;
        }
        self.feedback = None;
        if let Some(sentence) = self.sentences.get_mut(self.current) {
            sentence.is_clearing = true;
        }
        self.status = GameStatus::Playing;
        self.maybe_spawn();
        self.scheduler
            .schedule(self.config.phases.clear(), Event::Phase(Phase::Cleared));
        true
    }

    pub fn pause(&mut self) -> bool {
        if !matches!(self.status, GameStatus::Playing | GameStatus::Feedback) {
            return false;
        }
        self.paused_from = Some(self.status);
        self.status = GameStatus::Paused;
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.status != GameStatus::Paused {
            return false;
        }
        let Some(previous) = self.paused_from.take() else {
            return false;
        };
        self.status = previous;
        true
    }

    /// Leave the victory screen: back to the map, or up a floor after a boss.
    pub fn advance(&mut self) -> bool {
        if self.status != GameStatus::Victory {
            return false;
        }
        let boss_down = self
            .map
            .current_node()
            .is_some_and(|n| n.node_type == NodeType::Boss && n.completed);
        if boss_down {
            self.level += 1;
            self.map = generate_floor_map(self.level);
            info!(floor = self.level, "floor cleared");
            self.log(format!("You climb to floor {}.", self.level));
        }
        self.status = GameStatus::Map;
        true
    }

    // ========================================================================
    // Clock
    // ========================================================================

    /// Move the virtual clock forward, firing every event that comes due.
    ///
    /// Paused sessions do not move. Returns how many events fired.
    pub fn advance_clock(&mut self, elapsed: Duration) -> usize {
        if self.status == GameStatus::Paused {
            return 0;
        }
        let target = self.scheduler.now() + elapsed;
        let mut fired = 0;
        while let Some(event) = self.scheduler.pop_due(target) {
            fired += 1;
            match event {
                Event::Tick {
                    generation,
                    step_ms,
                } => self.on_tick(generation, step_ms),
                Event::Phase(phase) => self.on_phase(phase),
            }
        }
        self.scheduler.set_now(target);
        fired
    }

    fn on_tick(&mut self, generation: u64, step_ms: u64) {
        if generation != self.countdown_generation || self.status != GameStatus::Playing {
            return;
        }
        self.time_left_ms = self.time_left_ms.saturating_sub(step_ms);
        if self.time_left_ms == 0 {
            debug!("countdown expired, auto-submitting");
            self.log("Time is up!");
            self.submit();
        } else {
            self.schedule_tick();
        }
    }

    /// Queue the next countdown tick, never overshooting the time left.
    fn schedule_tick(&mut self) {
        let step_ms = self.config.phases.tick_ms.min(self.time_left_ms);
        self.scheduler.schedule(
            Duration::from_millis(step_ms),
            Event::Tick {
                generation: self.countdown_generation,
                step_ms,
            },
        );
    }

    fn on_phase(&mut self, phase: Phase) {
        debug!(?phase, status = %self.status, "phase");
        match phase {
            Phase::Cleared => {
                if self.current + 1 < self.sentences.len() {
                    self.current += 1;
                    self.start_question();
                } else {
                    self.status = GameStatus::PlayerAttack;
                    self.combatants.hero.is_attacking = true;
                    self.scheduler
                        .schedule(self.config.phases.strike(), Event::Phase(Phase::Strike));
                }
            }
            Phase::Strike => {
                let totals = aggregate(&self.results, self.config.max_targets);
                let resolution = resolve_hand(&self.combatants, &totals);
                apply_effects(&mut self.combatants, &resolution.effects);
                self.combatants.hero.is_attacking = false;
                self.score += u64::from(totals.final_attack);
                debug!(
                    attack = totals.final_attack,
                    targets = totals.total_attack_count,
                    block = totals.final_block,
                    heal = totals.heal,
                    "hand resolved"
                );
                self.log(resolution.narrative);
                self.scheduler
                    .schedule(self.config.phases.purge(), Event::Phase(Phase::Purge));
            }
            Phase::Purge => {
                let removed = purge_dead(&mut self.combatants.enemies);
                if removed > 0 {
                    self.log(format!("{removed} enemy(s) defeated."));
                }
                if self.combatants.enemies.is_empty() {
                    self.win_encounter();
                } else {
                    self.status = GameStatus::EnemyAttack;
                    for enemy in &mut self.combatants.enemies {
                        enemy.is_attacking = true;
                    }
                    self.scheduler.schedule(
                        self.config.phases.enemy_windup(),
                        Event::Phase(Phase::EnemyStrike),
                    );
                }
            }
            Phase::EnemyStrike => {
                let resolution = resolve_enemy_turn(&self.combatants);
                apply_effects(&mut self.combatants, &resolution.effects);
                for enemy in &mut self.combatants.enemies {
                    enemy.is_attacking = false;
                }
                self.log(resolution.narrative);
                self.scheduler.schedule(
                    self.config.phases.enemy_recover(),
                    Event::Phase(Phase::EnemyRecover),
                );
            }
            Phase::EnemyRecover => {
                self.combatants.hero.is_hit = false;
                if self.combatants.hero.vitals.is_dead() {
                    self.piles.discard_in_play();
                    self.clear_round();
                    self.status = GameStatus::GameOver;
                    info!(score = self.score, level = self.level, "hero defeated");
                    self.log(format!("You fall. Final score: {}.", self.score));
                } else {
                    for enemy in &mut self.combatants.enemies {
                        enemy.assign_intent(&mut self.rng);
                    }
                    self.start_round();
                }
            }
        }
    }

    // ========================================================================
    // Flow
    // ========================================================================

    fn new_run(&mut self) {
        self.scheduler.clear();
        self.score = 0;
        self.combo = 0;
        self.level = 1;
        self.round = 0;
        self.paused_from = None;
        self.map = generate_floor_map(1);
        self.combatants = Combatants {
            hero: Hero::new(self.config.hero_max_hp),
            enemies: Vec::new(),
        };
        let deck = initialize_deck(&mut self.rng);
        self.piles = CardPiles::new(deck, &mut self.rng);
        self.picks.clear();
        self.clear_round();
        self.status = GameStatus::Map;
        info!("new run");
        self.log("You enter the tower. Floor 1.");
    }

    fn clear_round(&mut self) {
        self.sentences.clear();
        self.results.clear();
        self.current = 0;
        self.perfects_in_round = 0;
        self.feedback = None;
        self.stop_countdown();
    }

    fn start_round(&mut self) {
        self.piles.discard_hand();
        self.picks.clear();
        self.clear_round();
        self.round += 1;

        let drawn = self.piles.draw_candidates(self.config.draw_size, &mut self.rng);
        if drawn == 0 {
            warn!("no cards left to draw, ending encounter");
            self.log("Your deck is exhausted; the enemies withdraw.");
            self.win_encounter();
            return;
        }
        debug!(round = self.round, drawn, "round started");
        self.status = GameStatus::CardSelection;
        self.log(format!("Round {}: pick {} cards.", self.round, self.max_select()));
    }

    fn start_question(&mut self) {
        let Some(sentence) = self.sentences.get(self.current) else {
            return;
        };
        self.time_left_ms = u64::from(sentence.time_limit_secs) * 1000;
        self.countdown_generation += 1;
        self.schedule_tick();
        self.status = GameStatus::Playing;
    }

    fn stop_countdown(&mut self) {
        self.countdown_generation += 1;
        self.scheduler
            .cancel_where(|e| matches!(e, Event::Tick { .. }));
    }

    fn maybe_spawn(&mut self) {
        if self.rng.gen::<f64>() >= self.config.spawn_chance {
            return;
        }
        let count = if self.rng.gen_bool(0.5) { 1 } else { 2 };
        let hp = scaled_hp(self.config.base_enemy_hp, self.level);
        for _ in 0..count {
            let mut enemy = Enemy::new(EnemyKind::Slime, hp, &mut self.rng);
            enemy.assign_intent(&mut self.rng);
            self.combatants.enemies.push(enemy);
        }
        debug!(count, hp, "reinforcements spawned");
        self.log(format!("{count} more slime(s) join the fight!"));
    }

    fn win_encounter(&mut self) {
        self.scheduler.clear();
        self.piles.discard_in_play();
        self.picks.clear();
        self.clear_round();
        self.combatants.enemies.clear();
        self.combatants.hero.is_attacking = false;
        self.combatants.hero.is_hit = false;
        let node_id = self.map.current_node_id.clone();
        self.map = self.map.complete_node(&node_id);
        self.status = GameStatus::Victory;
        info!(node = %node_id, score = self.score, "encounter won");
        self.log("Victory!");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhaseTimings;

    fn session() -> GameSession {
        GameSession::with_defaults(GameConfig::default().with_seed(21).with_spawn_chance(0.0))
    }

    fn pick_all(s: &mut GameSession) {
        for i in 0..s.max_select() {
            assert!(s.toggle_card(i));
        }
    }

    #[test]
    fn test_intents_rejected_in_wrong_status() {
        let mut s = session();
        assert!(!s.submit());
        assert!(!s.continue_round());
        assert!(!s.toggle_card(0));
        assert!(!s.confirm_selection().unwrap());
        assert!(!s.pause());
        assert!(!s.resume());
        assert!(!s.advance());
        assert!(!s.restart());
        assert!(!s.quit());
        assert_eq!(s.status(), GameStatus::Start);
    }

    #[test]
    fn test_start_enters_map() {
        let mut s = session();
        assert!(s.start());
        assert_eq!(s.status(), GameStatus::Map);
        assert_eq!(s.piles().total(), 15);
        assert!(!s.start());
    }

    #[test]
    fn test_entering_battle_draws_candidates() {
        let mut s = session();
        s.start();
        assert!(s.enter_node("node_1_0"));
        assert_eq!(s.status(), GameStatus::CardSelection);
        assert_eq!(s.piles().candidates.len(), 8);
        assert_eq!(s.enemies().len(), 1);
        assert!(s.enemies()[0].intent_value > 0);
        assert_eq!(s.piles().total(), 15);
    }

    #[test]
    fn test_cannot_skip_ahead_on_map() {
        let mut s = session();
        s.start();
        assert!(!s.enter_node("node_1_1"));
        assert!(!s.enter_node("node_1_5"));
        assert_eq!(s.status(), GameStatus::Map);
    }

    #[test]
    fn test_selection_needs_exact_count() {
        let mut s = session();
        s.start();
        s.enter_node("node_1_0");
        for i in 0..4 {
            s.toggle_card(i);
        }
        assert!(!s.confirm_selection().unwrap());
        assert!(s.toggle_card(4));
        assert!(!s.toggle_card(5), "sixth pick is refused");
        assert!(s.toggle_card(4), "unpick");
        assert!(s.toggle_card(6));
        assert_eq!(s.snapshot().picked, vec![0, 1, 2, 3, 6]);
        assert!(s.confirm_selection().unwrap());
        assert_eq!(s.status(), GameStatus::Playing);
        assert_eq!(s.piles().hand.len(), 5);
        assert_eq!(s.piles().discard.len(), 3);
    }

    #[test]
    fn test_submit_then_continue_moves_to_next_question() {
        let mut s = session();
        s.start();
        s.enter_node("node_1_0");
        pick_all(&mut s);
        s.confirm_selection().unwrap();

        assert!(s.submit());
        assert_eq!(s.status(), GameStatus::Feedback);
        assert!(!s.submit(), "double submit is a no-op");
        assert!(s.continue_round());
        assert!(!s.continue_round());
        assert!(!s.submit(), "sentence is clearing");

        s.advance_clock(Duration::from_millis(300));
        assert_eq!(s.status(), GameStatus::Playing);
        assert_eq!(s.snapshot().round_progress, 1);
        assert!(!s.current_sentence().unwrap().is_clearing);
    }

    #[test]
    fn test_countdown_auto_submits() {
        let mut s = session();
        s.start();
        s.enter_node("node_1_0");
        pick_all(&mut s);
        s.confirm_selection().unwrap();
        let limit = s.current_sentence().unwrap().time_limit_secs;

        s.advance_clock(Duration::from_millis(u64::from(limit) * 1000 - 100));
        assert_eq!(s.status(), GameStatus::Playing);
        assert!((s.time_left_secs() - 0.1).abs() < 1e-9);

        s.advance_clock(Duration::from_millis(100));
        assert_eq!(s.status(), GameStatus::Feedback);
        assert_eq!(s.feedback().unwrap().time_multiplier, 1.0);
    }

    #[test]
    fn test_countdown_follows_wall_time_at_any_tick_rate() {
        for tick_ms in [40, 250, 7_000] {
            let phases = PhaseTimings {
                tick_ms,
                ..PhaseTimings::default()
            };
            let mut s = GameSession::with_defaults(
                GameConfig::default()
                    .with_seed(21)
                    .with_spawn_chance(0.0)
                    .with_phases(phases),
            );
            s.start();
            s.enter_node("node_1_0");
            pick_all(&mut s);
            s.confirm_selection().unwrap();
            let limit_ms = u64::from(s.current_sentence().unwrap().time_limit_secs) * 1000;

            s.advance_clock(Duration::from_millis(limit_ms - 1));
            assert_eq!(s.status(), GameStatus::Playing, "tick {tick_ms}");
            assert!(s.time_left_secs() > 0.0);

            s.advance_clock(Duration::from_millis(1));
            assert_eq!(s.status(), GameStatus::Feedback, "tick {tick_ms}");
        }
    }

    #[test]
    fn test_pause_freezes_countdown_and_restores_status() {
        let mut s = session();
        s.start();
        s.enter_node("node_1_0");
        pick_all(&mut s);
        s.confirm_selection().unwrap();

        s.advance_clock(Duration::from_millis(1000));
        let before = s.time_left_secs();
        assert!(s.pause());
        assert!(!s.mark_block(0, Role::Verb));
        assert_eq!(s.advance_clock(Duration::from_secs(60)), 0);
        assert_eq!(s.time_left_secs(), before);
        assert!(s.resume());
        assert_eq!(s.status(), GameStatus::Playing);
        assert!(s.mark_block(0, Role::Verb));
    }

    #[test]
    fn test_quit_returns_cards() {
        let mut s = session();
        s.start();
        s.enter_node("node_1_0");
        pick_all(&mut s);
        s.confirm_selection().unwrap();
        assert!(s.quit());
        assert_eq!(s.status(), GameStatus::Start);
        assert_eq!(s.piles().total(), 15);
        assert!(s.piles().hand.is_empty());
        assert_eq!(s.advance_clock(Duration::from_secs(5)), 0);
    }

    #[test]
    fn test_rest_node_completes_immediately() {
        let mut s = session();
        s.start();
        // Clear the first three nodes by hand to reach the rest at index 3.
        for i in 0..3 {
            s.map = s.map.complete_node(&format!("node_1_{i}"));
        }
        s.map.current_node_id = "node_1_2".to_string();
        assert!(s.enter_node("node_1_3"));
        assert_eq!(s.status(), GameStatus::Map);
        assert!(s.map().node("node_1_3").unwrap().completed);
    }

    #[test]
    fn test_empty_draw_wins_the_encounter() {
        let mut s = session();
        s.start();
        s.piles = CardPiles::default();
        assert!(s.enter_node("node_1_0"));
        assert_eq!(s.status(), GameStatus::Victory);
        assert!(s.map().node("node_1_0").unwrap().completed);
        assert!(s.enemies().is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut s = session();
        s.start();
        s.enter_node("node_1_0");
        pick_all(&mut s);
        s.confirm_selection().unwrap();
        let snap = s.snapshot();
        s.mark_block(0, Role::Subject);
        assert!(snap.question.unwrap().blocks[0].selected.is_none());
        assert_eq!(snap.status, GameStatus::Playing);
    }
}
