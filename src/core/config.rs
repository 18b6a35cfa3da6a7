use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::core::error::Result;

/// Where TF-IDF / BM25 take their document and term counts from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringStatsMode {
    /// Statistics aggregated over every shard the query touches
    Global,
    /// Each shard scores with its own document count and frequencies
    Shard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub default_number_of_shards: u32,
    pub default_replication_factor: u32,

    pub indexing_threads: usize,        // rayon pool used when a link is backfilled
    pub backfill_batch_size: usize,

    pub sync_timeout_ms: u64,           // bound on waitForSync visibility waits
    pub query_timeout_ms: Option<u64>,  // per-shard deadline, none by default

    pub scoring_stats: ScoringStatsMode,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_number_of_shards: 1,
            default_replication_factor: 1,
            indexing_threads: num_cpus::get(),
            backfill_batch_size: 1000,
            sync_timeout_ms: 5_000,
            query_timeout_ms: None,
            scoring_stats: ScoringStatsMode::Global,
        }
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }
}
