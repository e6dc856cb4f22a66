pub mod store;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Success,
    Failed,
}

impl TxStatus {
    pub fn is_success(self) -> bool {
        self == TxStatus::Success
    }
}

/// One observed agent transaction. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxRecord {
    pub id: String,
    pub hash: String,
    pub block_number: u64,
    /// Ordering and bucketing key.
    pub timestamp: DateTime<Utc>,

    pub agent: String,
    pub from: String,
    pub to: String,

    /// Decimal string with 2 places. All arithmetic goes through `parse_amount`.
    pub amount: String,
    pub token: String,
    pub token_address: String,

    pub protocol: String,
    pub protocol_category: String,
    pub tx_type: String,
    pub x402_type: String,

    pub status: TxStatus,
    /// Present iff status is Failed.
    pub error_message: Option<String>,

    pub gas_used: u64,
    pub gas_price: String,
    pub gas_cost_usd: String,
}

impl TxRecord {
    /// Numeric value of `amount`. Malformed amounts read as 0.0 so one bad
    /// record cannot poison an aggregation over the rest of the store.
    pub fn amount_value(&self) -> f64 {
        parse_amount(&self.amount)
    }
}

/// The one sanctioned decimal parse for money strings.
pub fn parse_amount(s: &str) -> f64 {
    s.parse::<f64>().unwrap_or(0.0)
}

/// Running per-agent totals, updated only on the store's insert path.
/// Invariant: total_transactions == successful_transactions + failed_transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStats {
    pub address: String,
    pub total_transactions: u64,
    pub successful_transactions: u64,
    pub failed_transactions: u64,
    pub total_volume: f64,
    pub first_seen: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub protocols: BTreeSet<String>,
}

impl AgentStats {
    pub fn new(address: &str, seen_at: DateTime<Utc>) -> Self {
        Self {
            address: address.to_string(),
            total_transactions: 0,
            successful_transactions: 0,
            failed_transactions: 0,
            total_volume: 0.0,
            first_seen: seen_at,
            last_active: seen_at,
            protocols: BTreeSet::new(),
        }
    }

    /// Fold one record into the running totals.
    pub fn apply(&mut self, record: &TxRecord) {
        self.total_transactions += 1;
        match record.status {
            TxStatus::Success => self.successful_transactions += 1,
            TxStatus::Failed => self.failed_transactions += 1,
        }
        self.total_volume += record.amount_value();
        self.last_active = record.timestamp;
        self.protocols.insert(record.protocol.clone());
    }
}

/// A transaction-like object as it arrives from an upstream source, before
/// mapping and enrichment. Only `hash` and `timestamp` are required identity
/// fields; everything else may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTransaction {
    pub hash: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub block_number: Option<u64>,
    pub from: Option<String>,
    pub to: Option<String>,
    /// Decimal string in whole-token units.
    pub value: Option<String>,
    pub status: Option<TxStatus>,
    pub gas_used: Option<u64>,
    pub gas_price: Option<String>,
    pub token: Option<String>,
    pub token_address: Option<String>,
    pub protocol: Option<String>,
    pub protocol_category: Option<String>,
    pub tx_type: Option<String>,
    pub x402_type: Option<String>,
}

/// Classification for fields an upstream source does not carry.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub protocol: String,
    pub protocol_category: String,
    pub token: String,
    pub tx_type: String,
    pub x402_type: String,
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_amount(amount: &str, status: TxStatus) -> TxRecord {
        TxRecord {
            id: "r1".into(),
            hash: "0xabc".into(),
            block_number: 12_000_000,
            timestamp: Utc::now(),
            agent: "0xagent".into(),
            from: "0xagent".into(),
            to: "0xdest".into(),
            amount: amount.into(),
            token: "CRO".into(),
            token_address: "0xtoken".into(),
            protocol: "VVS Finance".into(),
            protocol_category: "DEX".into(),
            tx_type: "swap".into(),
            x402_type: "payment".into(),
            status,
            error_message: None,
            gas_used: 21000,
            gas_price: "12.00".into(),
            gas_cost_usd: "0.0100".into(),
        }
    }

    #[test]
    fn parse_amount_valid() {
        assert!((parse_amount("150.25") - 150.25).abs() < 1e-9);
    }

    #[test]
    fn parse_amount_malformed_is_zero() {
        assert_eq!(parse_amount("not-a-number"), 0.0);
        assert_eq!(parse_amount(""), 0.0);
    }

    #[test]
    fn agent_stats_invariant_holds() {
        let now = Utc::now();
        let mut stats = AgentStats::new("0xagent", now);
        stats.apply(&record_with_amount("100.00", TxStatus::Success));
        stats.apply(&record_with_amount("50.00", TxStatus::Failed));
        stats.apply(&record_with_amount("25.00", TxStatus::Success));

        assert_eq!(stats.total_transactions, 3);
        assert_eq!(
            stats.total_transactions,
            stats.successful_transactions + stats.failed_transactions
        );
        assert!((stats.total_volume - 175.0).abs() < 1e-9);
    }

    #[test]
    fn agent_stats_tracks_protocols() {
        let mut stats = AgentStats::new("0xagent", Utc::now());
        let mut a = record_with_amount("1.00", TxStatus::Success);
        stats.apply(&a);
        a.protocol = "Tectonic".into();
        stats.apply(&a);
        stats.apply(&a);
        assert_eq!(stats.protocols.len(), 2);
    }

    #[test]
    fn status_serde_lowercase() {
        assert_eq!(serde_json::to_string(&TxStatus::Failed).unwrap(), "\"failed\"");
        assert_eq!(
            serde_json::from_str::<TxStatus>("\"success\"").unwrap(),
            TxStatus::Success
        );
    }
}
