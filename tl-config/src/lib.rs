//! Layered configuration for the trade loop discovery engine
//!
//! Resolution order, lowest to highest precedence: built-in defaults, an
//! optional TOML file, environment variables (`TL_*`), then CLI flags
//! parsed by the embedding binary. Library callers typically only need
//! [`EngineConfig::default`] or [`EngineConfig::from_file`].
#![deny(missing_docs)]

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tl_cycle_enum::ScoringWeights;

/// Errors that can occur while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that could not be read
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
    /// The config file's contents were not valid TOML for `EngineConfig`
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed to parse
        path: String,
        /// Underlying parse error
        #[source]
        source: toml::de::Error,
    },
}

/// Recognized engine-wide and per-request configuration options
///
/// Every field mirrors a documented default; `opts` passed to `discover`
/// override these per-call without mutating the shared config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hard cap on cycle length (1..=15)
    pub max_depth: usize,
    /// Floor on quality score for emission
    pub min_quality_score: f64,
    /// Sort-and-trim ceiling on returned loops
    pub max_results: usize,
    /// Per-request wall-clock deadline, in milliseconds
    pub timeout_ms: u64,
    /// C4 size threshold above which an SCC is partitioned
    pub max_community_size: usize,
    /// C5 ceiling on cycles emitted per community
    pub max_cycles_per_scc: usize,
    /// Target total capacity of the dedup Bloom filter
    pub bloom_capacity: usize,
    /// Target false-positive rate of the dedup Bloom filter
    pub bloom_fpr: f64,
    /// Size of the community worker pool; `0` means "use available
    /// parallelism"
    pub parallel_workers: usize,
    /// Seconds of inactivity before a tenant is evicted from the registry
    pub tenant_idle_ttl_secs: u64,
    /// Allow an edge to move more than one item when it helps balance a
    /// cycle
    pub enable_bundling: bool,
    /// Allow cycles to cross community boundaries via promoted bridge
    /// nodes
    pub enable_cross_community: bool,
    /// Delta-engine debounce window, in milliseconds
    pub debounce_millis: u64,
    /// Delta-engine affected-wallet-set hop radius
    pub reach_radius: usize,
    /// Weights for the cycle-scoring components (length, fairness, demand,
    /// value-efficiency)
    pub weights: ScoringWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_quality_score: 0.0,
            max_results: 1000,
            timeout_ms: 30_000,
            max_community_size: 500,
            max_cycles_per_scc: 10_000,
            bloom_capacity: 1_000_000,
            bloom_fpr: 0.001,
            parallel_workers: 0,
            tenant_idle_ttl_secs: 3600,
            enable_bundling: false,
            enable_cross_community: false,
            debounce_millis: 50,
            reach_radius: 2,
            weights: ScoringWeights::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file, falling back to `Default` for any field the
    /// file omits
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Resolved per-request timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Resolved tenant idle TTL as a `Duration`
    pub fn tenant_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.tenant_idle_ttl_secs)
    }

    /// Resolved debounce window as a `Duration`
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_millis)
    }

    /// Effective worker count: configured value, or available parallelism
    /// when `parallel_workers` is `0`
    pub fn effective_workers(&self) -> usize {
        if self.parallel_workers == 0 {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            self.parallel_workers
        }
    }
}

/// CLI overrides for the handful of options worth exposing on the command
/// line; anything unset here falls through to the file/default config
#[derive(Clone, Debug, clap::Parser)]
#[command(name = "tradeloop-engine", about = "Trade loop discovery engine")]
pub struct CliArgs {
    /// Path to a TOML config file
    #[arg(long, env = "TL_CONFIG_FILE")]
    pub config_file: Option<std::path::PathBuf>,

    /// Override max_depth
    #[arg(long, env = "TL_MAX_DEPTH")]
    pub max_depth: Option<usize>,

    /// Override max_results
    #[arg(long, env = "TL_MAX_RESULTS")]
    pub max_results: Option<usize>,

    /// Override parallel_workers
    #[arg(long, env = "TL_PARALLEL_WORKERS")]
    pub parallel_workers: Option<usize>,
}

impl CliArgs {
    /// Resolve the full layered config: file (if given) -> defaults ->
    /// these CLI overrides
    pub fn resolve(&self) -> Result<EngineConfig, ConfigError> {
        let mut config = match &self.config_file {
            Some(path) => EngineConfig::from_file(path)?,
            None => EngineConfig::default(),
        };

        if let Some(v) = self.max_depth {
            config.max_depth = v;
        }
        if let Some(v) = self.max_results {
            config.max_results = v;
        }
        if let Some(v) = self.parallel_workers {
            config.parallel_workers = v;
        }

        Ok(config)
    }
}
