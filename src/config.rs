//! Engine configuration: pool shape and thread placement.
//!
//! A config can be built in code, taken from [`EngineConfig::default`]
//! (one domain, one sub-worker per hardware thread), or loaded from a
//! JSON file for benchmark harnesses that sweep pool shapes.

use std::num::NonZeroUsize;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Shape of the traversal worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// NUMA domains to partition the vertex set across.
    pub num_domains: usize,
    /// Worker threads per domain.
    pub sub_workers: usize,
    /// Pin each worker to its domain's CPU share (Linux only).
    pub pin_threads: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let threads = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
        Self {
            num_domains: 1,
            sub_workers: threads,
            pin_threads: false,
        }
    }
}

impl EngineConfig {
    /// A `domains x sub_workers` pool without pinning.
    pub fn with_shape(num_domains: usize, sub_workers: usize) -> Self {
        Self {
            num_domains,
            sub_workers,
            pin_threads: false,
        }
    }

    /// Loads and validates a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the shape is usable.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.num_domains >= 1, "num_domains must be at least 1");
        anyhow::ensure!(self.sub_workers >= 1, "sub_workers must be at least 1");
        Ok(())
    }

    /// Total worker threads.
    pub fn total_workers(&self) -> usize {
        self.num_domains * self.sub_workers
    }
}
