use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::ChainConfig;
use crate::core::store::SharedStore;
use crate::core::{RawTransaction, TxStatus};
use crate::indexer::ingest::ingest;
use crate::indexer::Classifier;

/// Simple EVM JSON-RPC client.
pub struct EvmRpc {
    url: String,
    client: Client,
}

impl EvmRpc {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: Client::new(),
        }
    }

    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let resp = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(RpcError::Http)?;

        let json: Value = resp.json().await.map_err(RpcError::Http)?;

        if let Some(err) = json.get("error").and_then(|e| {
            if e.is_null() {
                None
            } else {
                Some(e.clone())
            }
        }) {
            return Err(RpcError::Rpc(err));
        }

        Ok(json["result"].clone())
    }

    pub async fn block_number(&self) -> Result<u64, RpcError> {
        let result = self.call("eth_blockNumber", vec![]).await?;
        parse_hex_u64(&result)
    }

    /// Current gas price in gwei.
    pub async fn gas_price_gwei(&self) -> Result<f64, RpcError> {
        let result = self.call("eth_gasPrice", vec![]).await?;
        Ok(parse_hex_u128(&result)? as f64 / 1e9)
    }

    /// Latest block with full transaction objects.
    pub async fn latest_block(&self) -> Result<Value, RpcError> {
        self.call("eth_getBlockByNumber", vec![json!("latest"), json!(true)])
            .await
    }
}

#[derive(Debug)]
pub enum RpcError {
    Http(reqwest::Error),
    Rpc(Value),
    BadQuantity(String),
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcError::Http(e) => write!(f, "HTTP error: {e}"),
            RpcError::Rpc(e) => write!(f, "RPC error: {e}"),
            RpcError::BadQuantity(s) => write!(f, "bad hex quantity: {s}"),
        }
    }
}

impl std::error::Error for RpcError {}

fn hex_str(value: &Value) -> Result<&str, RpcError> {
    value
        .as_str()
        .ok_or_else(|| RpcError::BadQuantity(value.to_string()))
}

pub fn parse_hex_u64(value: &Value) -> Result<u64, RpcError> {
    let s = hex_str(value)?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|_| RpcError::BadQuantity(s.to_string()))
}

pub fn parse_hex_u128(value: &Value) -> Result<u128, RpcError> {
    let s = hex_str(value)?;
    u128::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|_| RpcError::BadQuantity(s.to_string()))
}

/// Convert a hex wei quantity into a whole-token decimal string.
pub fn wei_hex_to_amount(value: &Value) -> Result<String, RpcError> {
    let wei = parse_hex_u128(value)?;
    Ok(format!("{:.2}", wei as f64 / 1e18))
}

/// Cached network-level stats, retained stale when a poll fails.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkStats {
    pub block_number: u64,
    pub avg_gas_gwei: String,
    pub chain_id: u64,
    pub network_name: String,
    pub last_update: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SharedNetworkStats {
    inner: Arc<Mutex<NetworkStats>>,
}

impl SharedNetworkStats {
    pub fn new(config: &ChainConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(NetworkStats {
                block_number: 0,
                avg_gas_gwei: "0".to_string(),
                chain_id: config.chain_id,
                network_name: config.network_name.clone(),
                last_update: Utc::now(),
            })),
        }
    }

    pub fn get(&self) -> NetworkStats {
        self.inner.lock().unwrap().clone()
    }

    fn update(&self, block_number: u64, avg_gas_gwei: f64) {
        let mut stats = self.inner.lock().unwrap();
        stats.block_number = block_number;
        stats.avg_gas_gwei = format!("{avg_gas_gwei:.2}");
        stats.last_update = Utc::now();
    }
}

/// Map a block's transaction objects into raw ingestion inputs. Fields the
/// chain does not carry stay None for the classifier to fill.
pub fn map_block_txs(block: &Value, max_txs: usize) -> Vec<RawTransaction> {
    let Some(txs) = block["transactions"].as_array() else {
        return Vec::new();
    };
    let block_number = parse_hex_u64(&block["number"]).ok();
    let timestamp = parse_hex_u64(&block["timestamp"])
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs as i64, 0).single());

    txs.iter()
        .take(max_txs)
        .map(|tx| RawTransaction {
            hash: tx["hash"].as_str().map(str::to_string),
            timestamp,
            block_number,
            from: tx["from"].as_str().map(str::to_string),
            to: tx["to"].as_str().map(str::to_string),
            value: wei_hex_to_amount(&tx["value"]).ok(),
            status: Some(TxStatus::Success),
            gas_used: None,
            gas_price: parse_hex_u128(&tx["gasPrice"])
                .ok()
                .map(|wei| format!("{:.2}", wei as f64 / 1e9)),
            ..Default::default()
        })
        .collect()
}

/// Poll network stats on a short interval; keep the stale cache on failure.
pub async fn run_stats_poller(rpc: Arc<EvmRpc>, stats: SharedNetworkStats, interval_secs: u64) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
    loop {
        interval.tick().await;
        let block = rpc.block_number().await;
        let gas = rpc.gas_price_gwei().await;
        match (block, gas) {
            (Ok(block_number), Ok(gwei)) => {
                stats.update(block_number, gwei);
                debug!(block_number, "Network stats refreshed");
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("Network stats poll failed, keeping cached values: {e}");
            }
        }
    }
}

/// Poll the latest block and ingest its transactions into the store. Each
/// block is ingested once; classification gaps are filled by the injected
/// classifier (demo enrichment, not chain truth).
pub async fn run_block_poller(
    rpc: Arc<EvmRpc>,
    store: SharedStore,
    classifier: Arc<dyn Classifier>,
    interval_secs: u64,
    max_txs_per_block: usize,
) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
    let mut last_ingested_block: Option<u64> = None;

    loop {
        interval.tick().await;
        let block = match rpc.latest_block().await {
            Ok(block) => block,
            Err(e) => {
                warn!("Block poll failed, retrying next tick: {e}");
                continue;
            }
        };

        let block_number = parse_hex_u64(&block["number"]).ok();
        if block_number.is_some() && block_number == last_ingested_block {
            continue;
        }

        let mut inserted = 0;
        for raw in map_block_txs(&block, max_txs_per_block) {
            match ingest(&raw, classifier.as_ref()) {
                Ok(record) => {
                    store.insert(record);
                    inserted += 1;
                }
                Err(e) => warn!("Skipping malformed chain transaction: {e}"),
            }
        }
        last_ingested_block = block_number;
        info!(block = ?block_number, inserted, "Ingested latest block");
    }
}

/// Wire up both pollers for external mode.
pub async fn run_chain_indexer(
    store: SharedStore,
    stats: SharedNetworkStats,
    classifier: Arc<dyn Classifier>,
    config: ChainConfig,
) {
    info!(url = %config.rpc_url, network = %config.network_name, "Starting chain indexer");
    let rpc = Arc::new(EvmRpc::new(&config.rpc_url));

    let stats_task = run_stats_poller(rpc.clone(), stats, config.stats_interval_secs);
    let blocks_task = run_block_poller(
        rpc,
        store,
        classifier,
        config.block_interval_secs,
        config.max_txs_per_block,
    );
    tokio::join!(stats_task, blocks_task);
}
