pub mod search;

use serde::{Deserialize, Serialize};

use crate::core::{TxRecord, TxStatus};

pub const DEFAULT_LIMIT: usize = 50;

/// Structured listing filter. All predicates are optional and conjoined;
/// input validation is the boundary layer's job.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxFilter {
    pub status: Option<TxStatus>,
    /// Case-insensitive exact match.
    pub agent: Option<String>,
    /// Case-insensitive substring match.
    pub protocol: Option<String>,
    /// Inclusive bound.
    pub min_amount: Option<f64>,
    /// Inclusive bound.
    pub max_amount: Option<f64>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pagination {
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TxPage {
    pub data: Vec<TxRecord>,
    pub pagination: Pagination,
}

fn matches(record: &TxRecord, filter: &TxFilter) -> bool {
    if let Some(status) = filter.status {
        if record.status != status {
            return false;
        }
    }
    if let Some(agent) = &filter.agent {
        if !record.agent.eq_ignore_ascii_case(agent) {
            return false;
        }
    }
    if let Some(protocol) = &filter.protocol {
        if !record
            .protocol
            .to_lowercase()
            .contains(&protocol.to_lowercase())
        {
            return false;
        }
    }
    if let Some(min) = filter.min_amount {
        if record.amount_value() < min {
            return false;
        }
    }
    if let Some(max) = filter.max_amount {
        if record.amount_value() > max {
            return false;
        }
    }
    true
}

/// Apply the filter conjunction over a snapshot, preserving recency order,
/// then paginate.
pub fn filter_transactions(snapshot: &[TxRecord], filter: &TxFilter) -> TxPage {
    let filtered: Vec<&TxRecord> = snapshot.iter().filter(|r| matches(r, filter)).collect();
    let limit = filter.limit.unwrap_or(DEFAULT_LIMIT);
    let offset = filter.offset.unwrap_or(0);

    let data = filtered
        .iter()
        .skip(offset)
        .take(limit)
        .map(|r| (*r).clone())
        .collect();

    TxPage {
        data,
        pagination: Pagination {
            total: filtered.len(),
            limit,
            offset,
        },
    }
}
