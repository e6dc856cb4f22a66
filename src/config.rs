use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub indexer: IndexerConfig,
    pub chain: ChainConfig,
}

/// Where records come from.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexerMode {
    /// Synthetic records on a jittered tick.
    #[default]
    Mock,
    /// Poll a live EVM endpoint.
    Chain,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum resident records; oldest evicted beyond this.
    pub capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexerConfig {
    pub mode: IndexerMode,
    pub warmup_records: usize,
    pub tick_min_ms: u64,
    pub tick_max_ms: u64,
    pub success_probability: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub network_name: String,
    pub stats_interval_secs: u64,
    pub block_interval_secs: u64,
    pub max_txs_per_block: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            mode: IndexerMode::Mock,
            warmup_records: 50,
            tick_min_ms: 2000,
            tick_max_ms: 5000,
            success_probability: 0.92,
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://evm.cronos.org".into(),
            chain_id: 25,
            network_name: "Cronos".into(),
            stats_interval_secs: 5,
            block_interval_secs: 15,
            max_txs_per_block: 20,
        }
    }
}

impl Config {
    /// Load config from a TOML file. Falls back to defaults if file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Config loaded from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", path.display());
                Self::default()
            }
        }
    }
}
