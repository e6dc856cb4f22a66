use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::Serialize;

use crate::core::{TxRecord, TxStatus};
use crate::indexer::PROTOCOLS;

type Predicate = Box<dyn Fn(&TxRecord) -> bool>;

/// One pattern rule of the free-text interpreter. Given the lowercased query
/// it either contributes a filter predicate plus an interpretation fragment,
/// or nothing.
///
/// Rule order is a committed contract: status keywords are mutually
/// exclusive, both amount rules may apply, only the first matching time
/// window applies, protocol match is first-wins, type keywords are mutually
/// exclusive. This is a best-effort heuristic, not a grammar.
trait QueryRule {
    fn name(&self) -> &str;
    fn apply(&self, query: &str, now: DateTime<Utc>) -> Option<(Predicate, String)>;
}

fn default_rules() -> Vec<Box<dyn QueryRule>> {
    vec![
        Box::new(StatusRule),
        Box::new(OverAmountRule),
        Box::new(UnderAmountRule),
        Box::new(TimeWindowRule),
        Box::new(ProtocolRule),
        Box::new(TypeRule),
    ]
}

struct StatusRule;
impl QueryRule for StatusRule {
    fn name(&self) -> &str {
        "status"
    }
    fn apply(&self, query: &str, _now: DateTime<Utc>) -> Option<(Predicate, String)> {
        if query.contains("failed") {
            Some((
                Box::new(|r| r.status == TxStatus::Failed),
                "Failed transactions".to_string(),
            ))
        } else if query.contains("success") {
            Some((
                Box::new(|r| r.status == TxStatus::Success),
                "Successful transactions".to_string(),
            ))
        } else {
            None
        }
    }
}

static OVER_RE: OnceLock<Regex> = OnceLock::new();
static UNDER_RE: OnceLock<Regex> = OnceLock::new();

fn over_re() -> &'static Regex {
    OVER_RE.get_or_init(|| Regex::new(r"over \$?(\d+)").unwrap())
}

fn under_re() -> &'static Regex {
    UNDER_RE.get_or_init(|| Regex::new(r"under \$?(\d+)").unwrap())
}

struct OverAmountRule;
impl QueryRule for OverAmountRule {
    fn name(&self) -> &str {
        "amount_over"
    }
    fn apply(&self, query: &str, _now: DateTime<Utc>) -> Option<(Predicate, String)> {
        let caps = over_re().captures(query)?;
        let threshold: f64 = caps[1].parse().ok()?;
        let fragment = format!(" with amount > ${}", &caps[1]);
        Some((Box::new(move |r| r.amount_value() > threshold), fragment))
    }
}

struct UnderAmountRule;
impl QueryRule for UnderAmountRule {
    fn name(&self) -> &str {
        "amount_under"
    }
    fn apply(&self, query: &str, _now: DateTime<Utc>) -> Option<(Predicate, String)> {
        let caps = under_re().captures(query)?;
        let threshold: f64 = caps[1].parse().ok()?;
        let fragment = format!(" with amount < ${}", &caps[1]);
        Some((Box::new(move |r| r.amount_value() < threshold), fragment))
    }
}

struct TimeWindowRule;
impl QueryRule for TimeWindowRule {
    fn name(&self) -> &str {
        "time_window"
    }
    fn apply(&self, query: &str, now: DateTime<Utc>) -> Option<(Predicate, String)> {
        if query.contains("today") || query.contains("last 24") || query.contains("24h") {
            let since = now - Duration::hours(24);
            Some((
                Box::new(move |r| r.timestamp > since),
                " in last 24 hours".to_string(),
            ))
        } else if query.contains("hour") {
            let since = now - Duration::hours(1);
            Some((
                Box::new(move |r| r.timestamp > since),
                " in last hour".to_string(),
            ))
        } else {
            None
        }
    }
}

struct ProtocolRule;
impl QueryRule for ProtocolRule {
    fn name(&self) -> &str {
        "protocol"
    }
    fn apply(&self, query: &str, _now: DateTime<Utc>) -> Option<(Predicate, String)> {
        for (name, _) in PROTOCOLS {
            if query.contains(&name.to_lowercase()) {
                let fragment = format!(" on {name}");
                return Some((Box::new(move |r| r.protocol == name), fragment));
            }
        }
        None
    }
}

struct TypeRule;
impl QueryRule for TypeRule {
    fn name(&self) -> &str {
        "tx_type"
    }
    fn apply(&self, query: &str, _now: DateTime<Utc>) -> Option<(Predicate, String)> {
        if query.contains("swap") {
            Some((
                Box::new(|r| r.tx_type == "swap"),
                " (swaps only)".to_string(),
            ))
        } else if query.contains("transfer") {
            Some((
                Box::new(|r| r.tx_type == "transfer"),
                " (transfers only)".to_string(),
            ))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<TxRecord>,
    pub interpretation: String,
    pub total_matches: usize,
}

pub fn search_transactions(snapshot: &[TxRecord], query: &str, limit: usize) -> SearchOutcome {
    search_transactions_at(snapshot, query, limit, Utc::now())
}

/// Run the ordered rule list against the query and apply the composed
/// conjunction to the snapshot. Pure in `snapshot`, `query` and `now`.
pub fn search_transactions_at(
    snapshot: &[TxRecord],
    query: &str,
    limit: usize,
    now: DateTime<Utc>,
) -> SearchOutcome {
    let query_lower = query.to_lowercase();
    let mut predicates: Vec<Predicate> = Vec::new();
    let mut interpretation = String::new();

    for rule in default_rules() {
        if let Some((predicate, fragment)) = rule.apply(&query_lower, now) {
            tracing::debug!(rule = rule.name(), "Query rule matched");
            predicates.push(predicate);
            interpretation.push_str(&fragment);
        }
    }

    let filtered: Vec<TxRecord> = snapshot
        .iter()
        .filter(|r| predicates.iter().all(|p| p(r)))
        .cloned()
        .collect();

    let interpretation = if interpretation.is_empty() {
        "All matching transactions".to_string()
    } else {
        interpretation.trim().to_string()
    };

    let total_matches = filtered.len();
    let mut results = filtered;
    results.truncate(limit);

    SearchOutcome {
        results,
        interpretation,
        total_matches,
    }
}
