pub mod ingest;

use chrono::{Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;
use uuid::Uuid;

use crate::config::IndexerConfig;
use crate::core::store::SharedStore;
use crate::core::{Classification, RawTransaction, TxRecord, TxStatus};

// Fixed demo label sets.
pub const AGENTS: [&str; 8] = [
    "0x742d35Cc6634C0532925a3b844Bc9e7595f8fEfb",
    "0x8Ba1f109551bD432803012645Ac136ddd64DBA72",
    "0xAb5801a7D398351b8bE11C439e05C5B3259aeC9B",
    "0x1234567890AbcdEF1234567890AbcdEF12345678",
    "0xDeadBeef1234567890AbcdEF1234567890AbcdEF",
    "0xCafeBABE1234567890AbcdEF1234567890AbcdEF",
    "0xFACEB00C1234567890AbcdEF1234567890AbcdEF",
    "0xC0FFEE001234567890AbcdEF1234567890AbcdEF",
];

/// (protocol name, category) pairs.
pub const PROTOCOLS: [(&str, &str); 5] = [
    ("VVS Finance", "DEX"),
    ("Moonlander", "Perpetuals"),
    ("Delphi", "Prediction Markets"),
    ("Ferro Protocol", "Stablecoin DEX"),
    ("Tectonic", "Lending"),
];

pub const TOKEN_SYMBOLS: [&str; 6] = ["CRO", "USDC", "USDT", "WCRO", "VVS", "TONIC"];

pub const TX_TYPES: [&str; 7] = [
    "swap", "transfer", "stake", "unstake", "borrow", "repay", "provide_liquidity",
];

pub const X402_TYPES: [&str; 3] = ["payment", "authorization", "settlement"];

pub const ERROR_REASONS: [&str; 4] = [
    "Insufficient funds",
    "Slippage too high",
    "Gas limit exceeded",
    "Contract reverted",
];

/// Fills in classification fields an upstream source does not carry.
///
/// The random implementation below is a demo placeholder for a real
/// enrichment pipeline; swapping in a real classifier touches neither the
/// aggregation nor the query engines.
pub trait Classifier: Send + Sync {
    fn classify(&self, raw: &RawTransaction) -> Classification;
}

/// Uniform sampling over the fixed label sets, success as a Bernoulli draw.
pub struct RandomClassifier {
    pub success_probability: f64,
}

impl Default for RandomClassifier {
    fn default() -> Self {
        Self {
            success_probability: 0.92,
        }
    }
}

impl Classifier for RandomClassifier {
    fn classify(&self, _raw: &RawTransaction) -> Classification {
        let mut rng = rand::thread_rng();
        let (protocol, category) = *PROTOCOLS.choose(&mut rng).unwrap();
        Classification {
            protocol: protocol.to_string(),
            protocol_category: category.to_string(),
            token: TOKEN_SYMBOLS.choose(&mut rng).unwrap().to_string(),
            tx_type: TX_TYPES.choose(&mut rng).unwrap().to_string(),
            x402_type: X402_TYPES.choose(&mut rng).unwrap().to_string(),
            success: rng.gen_bool(self.success_probability),
        }
    }
}

fn random_hash() -> String {
    format!("0x{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn random_address() -> String {
    let hex = format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    );
    format!("0x{}", &hex[..40])
}

pub fn random_error_reason() -> String {
    ERROR_REASONS
        .choose(&mut rand::thread_rng())
        .unwrap()
        .to_string()
}

/// Synthesize one fully-populated record with `now` as its timestamp.
pub fn generate_record(classifier: &dyn Classifier) -> TxRecord {
    let raw = RawTransaction::default();
    let cls = classifier.classify(&raw);

    let mut rng = rand::thread_rng();
    let agent = AGENTS.choose(&mut rng).unwrap().to_string();
    let amount = rng.gen_range(0.0..10_000.0);
    let gas_used = 21_000 + rng.gen_range(0..200_000);
    let gas_price_gwei = rng.gen_range(5.0..55.0);
    let gas_cost_usd = gas_used as f64 * gas_price_gwei / 1e9 * 0.1;
    let status = if cls.success {
        TxStatus::Success
    } else {
        TxStatus::Failed
    };

    TxRecord {
        id: Uuid::new_v4().to_string(),
        hash: random_hash(),
        block_number: 12_000_000 + rng.gen_range(0..1_000_000),
        timestamp: Utc::now(),
        agent: agent.clone(),
        from: agent,
        to: random_address(),
        amount: format!("{amount:.2}"),
        token: cls.token,
        token_address: random_address(),
        protocol: cls.protocol,
        protocol_category: cls.protocol_category,
        tx_type: cls.tx_type,
        x402_type: cls.x402_type,
        status,
        error_message: match status {
            TxStatus::Success => None,
            TxStatus::Failed => Some(random_error_reason()),
        },
        gas_used,
        gas_price: format!("{gas_price_gwei:.2}"),
        gas_cost_usd: format!("{gas_cost_usd:.4}"),
    }
}

/// Backfill the store with records whose timestamps are jittered uniformly
/// into the past hour, then restore newest-first order.
pub fn warm_up(store: &SharedStore, classifier: &dyn Classifier, count: usize) {
    for _ in 0..count {
        let mut record = generate_record(classifier);
        let back_ms = rand::thread_rng().gen_range(0..3_600_000);
        record.timestamp = Utc::now() - Duration::milliseconds(back_ms);
        store.insert(record);
    }
    store.sort_by_timestamp_desc();
}

fn jittered_tick_ms(config: &IndexerConfig) -> u64 {
    let min = config.tick_min_ms;
    let max = config.tick_max_ms.max(min + 1);
    rand::thread_rng().gen_range(min..max)
}

/// Run the synthetic indexer: warm-up backfill, then one record per jittered
/// tick. Sole writer to the store in mock mode.
pub async fn run_mock_indexer(store: SharedStore, config: IndexerConfig) {
    info!(
        warmup = config.warmup_records,
        "Starting mock transaction indexer"
    );
    let classifier = RandomClassifier {
        success_probability: config.success_probability,
    };

    warm_up(&store, &classifier, config.warmup_records);
    info!(records = store.len(), "Warm-up backfill complete");

    loop {
        let delay = jittered_tick_ms(&config);
        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        store.insert(generate_record(&classifier));
    }
}
