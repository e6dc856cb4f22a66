use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use txpulse::analytics;
use txpulse::chain::{self, SharedNetworkStats};
use txpulse::config::{Config, IndexerMode};
use txpulse::core::store::SharedStore;
use txpulse::indexer::{self, RandomClassifier};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("txpulse=info".parse().unwrap()),
        )
        .init();

    tracing::info!("txpulse starting...");

    let config = Config::load("config.toml");
    tracing::info!("Config: {:?}", config);

    let store = SharedStore::new(config.store.capacity);

    // Live feed: log each record as it lands in the store.
    let mut feed = store.subscribe();
    tokio::spawn(async move {
        loop {
            match feed.recv().await {
                Ok(record) => tracing::info!(
                    hash = %record.hash,
                    agent = %record.agent,
                    protocol = %record.protocol,
                    amount = %record.amount,
                    status = ?record.status,
                    "New transaction"
                ),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("Feed subscriber lagged, {n} records dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    match config.indexer.mode {
        IndexerMode::Mock => {
            tokio::spawn(indexer::run_mock_indexer(
                store.clone(),
                config.indexer.clone(),
            ));
        }
        IndexerMode::Chain => {
            let stats = SharedNetworkStats::new(&config.chain);
            let classifier = Arc::new(RandomClassifier {
                success_probability: config.indexer.success_probability,
            });
            tokio::spawn(chain::run_chain_indexer(
                store.clone(),
                stats,
                classifier,
                config.chain.clone(),
            ));
        }
    }

    // Periodic rolling-window summary.
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
    loop {
        interval.tick().await;
        let snapshot = store.snapshot();
        let report = analytics::health_report(&snapshot, store.agent_count(), Utc::now());
        tracing::info!(
            status = ?report.status,
            score = report.score,
            volume = %report.overview.volume,
            transactions = report.overview.transactions,
            unique_agents = report.overview.unique_agents,
            success_rate = %report.overview.success_rate,
            indexed = report.total_transactions_indexed,
            "24h overview"
        );
    }
}
