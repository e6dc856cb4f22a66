use uuid::Uuid;

use super::{random_error_reason, Classifier};
use crate::core::{parse_amount, RawTransaction, TxRecord, TxStatus};

/// Why a raw transaction could not be mapped. Only missing identity fields
/// reject a record; every other field has a default or is classifier-filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestError {
    MissingHash,
    MissingTimestamp,
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::MissingHash => write!(f, "raw transaction has no hash"),
            IngestError::MissingTimestamp => write!(f, "raw transaction has no timestamp"),
        }
    }
}

impl std::error::Error for IngestError {}

/// Map an upstream transaction object into a TxRecord, filling classification
/// gaps from the classifier seam.
pub fn ingest(raw: &RawTransaction, classifier: &dyn Classifier) -> Result<TxRecord, IngestError> {
    let hash = raw
        .hash
        .clone()
        .filter(|h| !h.is_empty())
        .ok_or(IngestError::MissingHash)?;
    let timestamp = raw.timestamp.ok_or(IngestError::MissingTimestamp)?;

    let cls = classifier.classify(raw);
    let status = raw.status.unwrap_or(if cls.success {
        TxStatus::Success
    } else {
        TxStatus::Failed
    });

    let amount = raw
        .value
        .as_deref()
        .map(|v| format!("{:.2}", parse_amount(v)))
        .unwrap_or_else(|| "0.00".to_string());
    let from = raw.from.clone().unwrap_or_default();
    let gas_used = raw.gas_used.unwrap_or(0);
    let gas_price = raw.gas_price.clone().unwrap_or_else(|| "0.00".to_string());
    let gas_cost_usd = gas_used as f64 * parse_amount(&gas_price) / 1e9 * 0.1;

    Ok(TxRecord {
        id: Uuid::new_v4().to_string(),
        hash,
        block_number: raw.block_number.unwrap_or(0),
        timestamp,
        agent: from.clone(),
        from,
        to: raw
            .to
            .clone()
            .unwrap_or_else(|| "Contract Creation".to_string()),
        amount,
        token: raw.token.clone().unwrap_or(cls.token),
        token_address: raw.token_address.clone().unwrap_or_default(),
        protocol: raw.protocol.clone().unwrap_or(cls.protocol),
        protocol_category: raw
            .protocol_category
            .clone()
            .unwrap_or(cls.protocol_category),
        tx_type: raw.tx_type.clone().unwrap_or(cls.tx_type),
        x402_type: raw.x402_type.clone().unwrap_or(cls.x402_type),
        status,
        error_message: match status {
            TxStatus::Success => None,
            TxStatus::Failed => Some(random_error_reason()),
        },
        gas_used,
        gas_price,
        gas_cost_usd: format!("{gas_cost_usd:.4}"),
    })
}
