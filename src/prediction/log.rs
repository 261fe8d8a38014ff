//! Append-only prediction log

use crate::error::{MortalityError, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Largest page `query` returns
pub const MAX_LOG_LIMIT: usize = 1000;

/// One served prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionLogEntry {
    pub id: Uuid,
    pub model_id: Uuid,
    /// Input fields as received
    pub input_features: serde_json::Value,
    pub prediction: u8,
    pub probability: f64,
    pub latency_ms: f64,
    pub created_at: DateTime<Utc>,
}

/// Filter and page for log queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogQuery {
    #[serde(default)]
    pub model_id: Option<Uuid>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            model_id: None,
            start: None,
            end: None,
            skip: 0,
            limit: default_limit(),
        }
    }
}

impl LogQuery {
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 || self.limit > MAX_LOG_LIMIT {
            return Err(MortalityError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_LOG_LIMIT
            )));
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(MortalityError::Validation("start is after end".to_string()));
            }
        }
        Ok(())
    }

    fn matches(&self, entry: &PredictionLogEntry) -> bool {
        self.model_id.map_or(true, |id| id == entry.model_id)
            && self.start.map_or(true, |s| entry.created_at >= s)
            && self.end.map_or(true, |e| entry.created_at <= e)
    }
}

pub trait PredictionLogStore: Send + Sync {
    fn append(&self, entries: Vec<PredictionLogEntry>) -> Result<()>;

    /// Matching entries, newest first
    fn query(&self, query: &LogQuery) -> Result<Vec<PredictionLogEntry>>;
}

/// Bounded in-memory log; the oldest tenth is dropped when full
#[derive(Debug, Clone)]
pub struct InMemoryPredictionLog {
    entries: Arc<RwLock<Vec<PredictionLogEntry>>>,
    max_entries: usize,
}

impl InMemoryPredictionLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            max_entries: max_entries.max(1),
        }
    }

    pub fn count(&self) -> usize {
        self.entries.read().len()
    }
}

impl Default for InMemoryPredictionLog {
    fn default() -> Self {
        Self::new(100_000)
    }
}

impl PredictionLogStore for InMemoryPredictionLog {
    fn append(&self, new_entries: Vec<PredictionLogEntry>) -> Result<()> {
        let mut entries = self.entries.write();
        let overflow = (entries.len() + new_entries.len()).saturating_sub(self.max_entries);
        if overflow > 0 {
            let drain = overflow.max(self.max_entries / 10).min(entries.len());
            entries.drain(..drain);
        }
        entries.extend(new_entries);
        Ok(())
    }

    fn query(&self, query: &LogQuery) -> Result<Vec<PredictionLogEntry>> {
        query.validate()?;
        let entries = self.entries.read();
        Ok(entries
            .iter()
            .rev()
            .filter(|e| query.matches(e))
            .skip(query.skip)
            .take(query.limit)
            .cloned()
            .collect())
    }
}
