//! Per-question answer history and its storage.
//!
//! The selector reads stats on every weight calculation and the scoring
//! engine writes them after every graded answer. Storage is behind
//! [`StatsStore`] so the core never assumes a particular backend.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, error, warn};

/// Number of recent outcomes kept per question.
pub const MAX_RECENT_RESULTS: usize = 5;

/// Errors from stats storage.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rolling answer record for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionStats {
    pub question_id: String,
    /// Most recent outcomes, oldest first.
    pub recent_results: Vec<bool>,
    pub total_correct: u32,
    pub total_attempts: u32,
    /// Milliseconds since the Unix epoch.
    pub last_attempt_time: u64,
}

impl QuestionStats {
    pub fn new(question_id: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            recent_results: Vec::new(),
            total_correct: 0,
            total_attempts: 0,
            last_attempt_time: 0,
        }
    }

    /// Append an outcome, dropping the oldest beyond the window.
    pub fn record(&mut self, passed: bool, at_millis: u64) {
        self.recent_results.push(passed);
        if self.recent_results.len() > MAX_RECENT_RESULTS {
            let excess = self.recent_results.len() - MAX_RECENT_RESULTS;
            self.recent_results.drain(..excess);
        }
        self.total_attempts += 1;
        if passed {
            self.total_correct += 1;
        }
        self.last_attempt_time = at_millis;
    }

    /// The last `n` outcomes (fewer if not enough history).
    pub fn last(&self, n: usize) -> &[bool] {
        let start = self.recent_results.len().saturating_sub(n);
        &self.recent_results[start..]
    }
}

/// Key-value storage for question stats.
pub trait StatsStore: Send {
    fn get(&self, question_id: &str) -> Option<QuestionStats>;
    fn put(&mut self, question_id: &str, stats: QuestionStats);
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// ============================================================================
// In-memory Store
// ============================================================================

/// Volatile store, used in tests and when no stats file is configured.
#[derive(Debug, Clone, Default)]
pub struct MemoryStatsStore {
    records: HashMap<String, QuestionStats>,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl StatsStore for MemoryStatsStore {
    fn get(&self, question_id: &str) -> Option<QuestionStats> {
        self.records.get(question_id).cloned()
    }

    fn put(&mut self, question_id: &str, stats: QuestionStats) {
        self.records.insert(question_id.to_string(), stats);
    }
}

// ============================================================================
// JSON File Store
// ============================================================================

/// Durable store: one JSON object keyed by question id, written through on every put.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    records: BTreeMap<String, QuestionStats>,
}

impl JsonFileStore {
    /// Open a stats file.
    ///
    /// A missing file starts empty. An unreadable document or individual
    /// malformed entries are treated as no history and logged.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StatsError> {
        let path = path.as_ref().to_path_buf();
        let records = match std::fs::read(&path) {
            Ok(bytes) => parse_records(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), entries = records.len(), "opened stats file");
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write every record to disk.
    pub fn flush(&self) -> Result<(), StatsError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&self.records)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// Drop all history, on disk too.
    pub fn clear(&mut self) -> Result<(), StatsError> {
        self.records.clear();
        self.flush()
    }
}

fn parse_records(bytes: &[u8]) -> BTreeMap<String, QuestionStats> {
    let document: serde_json::Value = match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(e) => {
            warn!("stats file is not valid JSON, starting fresh: {e}");
            return BTreeMap::new();
        }
    };

    let serde_json::Value::Object(entries) = document else {
        warn!("stats file is not a JSON object, starting fresh");
        return BTreeMap::new();
    };

    entries
        .into_iter()
        .filter_map(
            |(id, value)| match serde_json::from_value::<QuestionStats>(value) {
                Ok(stats) => Some((id, stats)),
                Err(e) => {
                    warn!(question_id = %id, "skipping corrupt stats entry: {e}");
                    None
                }
            },
        )
        .collect()
}

impl StatsStore for JsonFileStore {
    fn get(&self, question_id: &str) -> Option<QuestionStats> {
        self.records.get(question_id).cloned()
    }

    fn put(&mut self, question_id: &str, stats: QuestionStats) {
        self.records.insert(question_id.to_string(), stats);
        if let Err(e) = self.flush() {
            error!(path = %self.path.display(), "failed to save stats: {e}");
        }
    }
}
