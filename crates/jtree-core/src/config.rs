//! Engine configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Scheduler memory budget in megabytes. `0.0` means unbounded.
    pub max_memory_mb: f64,

    /// Bytes used by one entry of a materialised table.
    pub bytes_per_entry: usize,

    /// Fixed per-table overhead (headers, variable lists) in bytes.
    pub table_overhead_bytes: usize,

    /// Worker threads used by candidate-change generation.
    pub learning_threads: usize,

    /// Reject candidate graphs whose largest clique exceeds this log10 size.
    pub max_log10_clique_domain_size: Option<f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: 0.0,
            bytes_per_entry: std::mem::size_of::<f64>(),
            table_overhead_bytes: 0,
            learning_threads: 4,
            max_log10_clique_domain_size: None,
        }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `JTREE_MAX_MEMORY_MB`: scheduler budget in megabytes (0 = unbounded)
    /// - `JTREE_BYTES_PER_ENTRY`: bytes per table entry
    /// - `JTREE_TABLE_OVERHEAD_BYTES`: fixed bytes per table
    /// - `JTREE_LEARNING_THREADS`: worker threads for candidate generation
    /// - `JTREE_MAX_LOG10_CLIQUE_SIZE`: induced-width threshold for learning
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("JTREE_MAX_MEMORY_MB") {
            if let Ok(v) = s.parse::<f64>() {
                cfg.max_memory_mb = v;
            }
        }

        if let Ok(s) = std::env::var("JTREE_BYTES_PER_ENTRY") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.bytes_per_entry = v;
            }
        }

        if let Ok(s) = std::env::var("JTREE_TABLE_OVERHEAD_BYTES") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.table_overhead_bytes = v;
            }
        }

        if let Ok(s) = std::env::var("JTREE_LEARNING_THREADS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.learning_threads = v;
            }
        }

        if let Ok(s) = std::env::var("JTREE_MAX_LOG10_CLIQUE_SIZE") {
            if let Ok(v) = s.parse::<f64>() {
                cfg.max_log10_clique_domain_size = Some(v);
            }
        }

        cfg
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        if !self.max_memory_mb.is_finite() || self.max_memory_mb < 0.0 {
            return Err(Error::Config(format!(
                "max_memory_mb must be a finite non-negative number, got {}",
                self.max_memory_mb
            )));
        }
        if self.bytes_per_entry == 0 {
            return Err(Error::Config("bytes_per_entry must be positive".into()));
        }
        if self.learning_threads == 0 {
            return Err(Error::Config("learning_threads must be positive".into()));
        }
        if let Some(limit) = self.max_log10_clique_domain_size {
            if !limit.is_finite() || limit < 0.0 {
                return Err(Error::Config(format!(
                    "max_log10_clique_domain_size must be finite and non-negative, got {limit}"
                )));
            }
        }
        Ok(())
    }
}
