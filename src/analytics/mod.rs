use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::Serialize;

use crate::core::{parse_amount, AgentStats, TxRecord};

/// Caller-chosen lookback window. Drives both the cutoff filter and the
/// bucket granularity of the chart series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    Hour,
    Day,
    Week,
}

impl TimeRange {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1h" => Some(TimeRange::Hour),
            "24h" => Some(TimeRange::Day),
            "7d" => Some(TimeRange::Week),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeRange::Hour => "1h",
            TimeRange::Day => "24h",
            TimeRange::Week => "7d",
        }
    }

    pub fn duration(self) -> Duration {
        match self {
            TimeRange::Hour => Duration::hours(1),
            TimeRange::Day => Duration::hours(24),
            TimeRange::Week => Duration::days(7),
        }
    }

    pub fn bucket_count(self) -> usize {
        match self {
            TimeRange::Hour => 12,
            TimeRange::Day => 24,
            TimeRange::Week => 7,
        }
    }

    pub fn bucket_width(self) -> Duration {
        match self {
            TimeRange::Hour => Duration::minutes(5),
            TimeRange::Day => Duration::hours(1),
            TimeRange::Week => Duration::days(1),
        }
    }

    /// Round a timestamp down to this range's bucket boundary
    /// (5-minute multiple, top of hour, or UTC midnight).
    fn align(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        ts.duration_trunc(self.bucket_width()).unwrap_or(ts)
    }

    fn bucket_label(self, start: DateTime<Utc>) -> String {
        match self {
            TimeRange::Hour | TimeRange::Day => start.format("%H:%M").to_string(),
            TimeRange::Week => start.format("%a").to_string(),
        }
    }
}

/// Four-level classification of ecosystem success rate. The single
/// definition used by every read path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Critical,
    Warning,
    Good,
    Healthy,
}

impl HealthStatus {
    pub fn from_success_rate(rate: f64) -> Self {
        if rate < 0.70 {
            HealthStatus::Critical
        } else if rate < 0.85 {
            HealthStatus::Warning
        } else if rate < 0.95 {
            HealthStatus::Good
        } else {
            HealthStatus::Healthy
        }
    }

    pub fn score(self) -> u8 {
        match self {
            HealthStatus::Critical => 30,
            HealthStatus::Warning => 60,
            HealthStatus::Good => 85,
            HealthStatus::Healthy => 100,
        }
    }
}

/// Fraction of successful outcomes, 0.0 for an empty set.
pub fn success_rate(successful: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        successful as f64 / total as f64
    }
}

/// 0-100 reputation derived from the success ratio.
pub fn reputation_score(successful: u64, total: u64) -> f64 {
    successful as f64 / total.max(1) as f64 * 100.0
}

pub fn format_volume(v: f64) -> String {
    format!("{v:.2}")
}

pub fn format_rate(r: f64) -> String {
    format!("{r:.4}")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolVolume {
    pub name: String,
    pub volume: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub label: String,
    pub volume: String,
    pub count: usize,
}

/// Rolling-window statistics. Every field is scoped to the requested range;
/// nothing here secretly means "last 24 hours".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub range: &'static str,
    pub volume: String,
    pub transactions: usize,
    pub unique_agents: usize,
    pub success_rate: String,
    pub top_protocols: Vec<ProtocolVolume>,
    pub series: Vec<Bucket>,
}

pub fn overview(snapshot: &[TxRecord], range: TimeRange) -> Overview {
    overview_at(snapshot, range, Utc::now())
}

/// Compute the overview against an explicit `now` (injected for tests).
pub fn overview_at(snapshot: &[TxRecord], range: TimeRange, now: DateTime<Utc>) -> Overview {
    let since = now - range.duration();
    let selected: Vec<&TxRecord> = snapshot.iter().filter(|r| r.timestamp > since).collect();

    let volume: f64 = selected.iter().map(|r| r.amount_value()).sum();
    let successful = selected.iter().filter(|r| r.status.is_success()).count();
    let mut agents: Vec<&str> = selected.iter().map(|r| r.agent.as_str()).collect();
    agents.sort_unstable();
    agents.dedup();

    Overview {
        range: range.as_str(),
        volume: format_volume(volume),
        transactions: selected.len(),
        unique_agents: agents.len(),
        success_rate: format_rate(success_rate(successful as u64, selected.len() as u64)),
        top_protocols: top_protocols(&selected),
        series: bucket_series(snapshot, range, now),
    }
}

/// Top 5 protocols by summed volume over the selected records. Stable:
/// equal volumes keep first-encounter order.
fn top_protocols(selected: &[&TxRecord]) -> Vec<ProtocolVolume> {
    let mut groups: Vec<(String, f64)> = Vec::new();
    for record in selected {
        let amount = record.amount_value();
        match groups.iter().position(|(name, _)| *name == record.protocol) {
            Some(i) => groups[i].1 += amount,
            None => groups.push((record.protocol.clone(), amount)),
        }
    }
    // Vec::sort_by is stable.
    groups.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    groups.truncate(5);
    groups
        .into_iter()
        .map(|(name, volume)| ProtocolVolume {
            name,
            volume: format_volume(volume),
        })
        .collect()
}

/// Aligned, contiguous chart buckets ending at the bucket containing `now`.
/// Each bucket scans the full snapshot, not the range-filtered subset, so
/// edge buckets report correct totals.
fn bucket_series(snapshot: &[TxRecord], range: TimeRange, now: DateTime<Utc>) -> Vec<Bucket> {
    let width = range.bucket_width();
    let count = range.bucket_count();
    let newest_start = range.align(now);

    (0..count)
        .map(|i| {
            let start = newest_start - width * (count - 1 - i) as i32;
            let end = start + width;
            let mut volume = 0.0;
            let mut bucket_count = 0;
            for record in snapshot {
                if record.timestamp >= start && record.timestamp < end {
                    volume += record.amount_value();
                    bucket_count += 1;
                }
            }
            Bucket {
                label: range.bucket_label(start),
                volume: format_volume(volume),
                count: bucket_count,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub score: u8,
    #[serde(flatten)]
    pub overview: Overview,
    pub total_transactions_indexed: usize,
    pub total_agents_tracked: usize,
    pub last_updated: DateTime<Utc>,
}

/// Ecosystem health over the last 24 hours plus store-wide totals.
pub fn health_report(
    snapshot: &[TxRecord],
    total_agents_tracked: usize,
    now: DateTime<Utc>,
) -> HealthReport {
    let overview = overview_at(snapshot, TimeRange::Day, now);
    let status = HealthStatus::from_success_rate(parse_amount(&overview.success_rate));
    HealthReport {
        status,
        score: status.score(),
        total_transactions_indexed: snapshot.len(),
        total_agents_tracked,
        last_updated: now,
        overview,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolStats {
    pub name: String,
    pub transactions: usize,
    pub volume: String,
    pub success_rate: String,
}

/// Per-protocol rollup over the whole snapshot, sorted by volume descending.
pub fn protocol_breakdown(snapshot: &[TxRecord]) -> Vec<ProtocolStats> {
    let mut groups: Vec<(String, usize, f64, u64)> = Vec::new();
    for record in snapshot {
        let i = match groups.iter().position(|(name, ..)| *name == record.protocol) {
            Some(i) => i,
            None => {
                groups.push((record.protocol.clone(), 0, 0.0, 0));
                groups.len() - 1
            }
        };
        groups[i].1 += 1;
        groups[i].2 += record.amount_value();
        if record.status.is_success() {
            groups[i].3 += 1;
        }
    }
    groups.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
    groups
        .into_iter()
        .map(|(name, transactions, volume, successful)| ProtocolStats {
            name,
            transactions,
            volume: format_volume(volume),
            success_rate: format_rate(success_rate(successful, transactions as u64)),
        })
        .collect()
}

/// Read-side view of an agent with all derived fields computed here and
/// nowhere else.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentProfile {
    pub address: String,
    pub total_transactions: u64,
    pub successful_transactions: u64,
    pub failed_transactions: u64,
    pub success_rate: String,
    pub total_volume: String,
    pub first_seen: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub favorite_protocols: Vec<String>,
    pub reputation_score: String,
}

pub fn agent_profile(stats: &AgentStats) -> AgentProfile {
    AgentProfile {
        address: stats.address.clone(),
        total_transactions: stats.total_transactions,
        successful_transactions: stats.successful_transactions,
        failed_transactions: stats.failed_transactions,
        success_rate: format_rate(success_rate(
            stats.successful_transactions,
            stats.total_transactions,
        )),
        total_volume: format_volume(stats.total_volume),
        first_seen: stats.first_seen,
        last_active: stats.last_active,
        favorite_protocols: stats.protocols.iter().cloned().collect(),
        reputation_score: format!(
            "{:.1}",
            reputation_score(stats.successful_transactions, stats.total_transactions)
        ),
    }
}

/// All agents ranked by total volume descending, address as deterministic
/// tiebreak.
pub fn agent_leaderboard(mut all: Vec<AgentStats>) -> Vec<AgentProfile> {
    all.sort_by(|a, b| {
        b.total_volume
            .partial_cmp(&a.total_volume)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.address.cmp(&b.address))
    });
    all.iter().map(agent_profile).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TxStatus;
    use chrono::{TimeZone, Timelike};

    fn record_at(
        id: &str,
        agent: &str,
        protocol: &str,
        amount: &str,
        status: TxStatus,
        timestamp: DateTime<Utc>,
    ) -> TxRecord {
        TxRecord {
            id: id.into(),
            hash: format!("0x{id}"),
            block_number: 12_000_000,
            timestamp,
            agent: agent.into(),
            from: agent.into(),
            to: "0xdest".into(),
            amount: amount.into(),
            token: "CRO".into(),
            token_address: "0xtoken".into(),
            protocol: protocol.into(),
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

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 12, 14, 37, 21).unwrap()
    }

    #[test]
    fn range_parsing() {
        assert_eq!(TimeRange::parse("1h"), Some(TimeRange::Hour));
        assert_eq!(TimeRange::parse("24h"), Some(TimeRange::Day));
        assert_eq!(TimeRange::parse("7d"), Some(TimeRange::Week));
        assert_eq!(TimeRange::parse("30d"), None);
    }

    #[test]
    fn success_rate_zero_on_empty() {
        assert_eq!(success_rate(0, 0), 0.0);
    }

    #[test]
    fn success_rate_bounded() {
        for (s, t) in [(0u64, 10u64), (5, 10), (10, 10)] {
            let r = success_rate(s, t);
            assert!((0.0..=1.0).contains(&r));
        }
    }

    #[test]
    fn health_thresholds() {
        assert_eq!(HealthStatus::from_success_rate(0.69), HealthStatus::Critical);
        assert_eq!(HealthStatus::from_success_rate(0.70), HealthStatus::Warning);
        assert_eq!(HealthStatus::from_success_rate(0.84), HealthStatus::Warning);
        assert_eq!(HealthStatus::from_success_rate(0.85), HealthStatus::Good);
        assert_eq!(HealthStatus::from_success_rate(0.94), HealthStatus::Good);
        assert_eq!(HealthStatus::from_success_rate(0.95), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_success_rate(1.0), HealthStatus::Healthy);
    }

    #[test]
    fn health_scores() {
        assert_eq!(HealthStatus::Critical.score(), 30);
        assert_eq!(HealthStatus::Warning.score(), 60);
        assert_eq!(HealthStatus::Good.score(), 85);
        assert_eq!(HealthStatus::Healthy.score(), 100);
    }

    #[test]
    fn overview_24h_scenario() {
        let now = fixed_now();
        let snapshot = vec![
            record_at("a", "0x1", "VVS Finance", "100.00", TxStatus::Success, now),
            record_at(
                "b",
                "0x2",
                "Tectonic",
                "50.00",
                TxStatus::Failed,
                now - Duration::minutes(30),
            ),
            record_at(
                "c",
                "0x1",
                "Delphi",
                "200.00",
                TxStatus::Success,
                now - Duration::days(2),
            ),
        ];

        let overview = overview_at(&snapshot, TimeRange::Day, now);
        assert_eq!(overview.volume, "150.00");
        assert_eq!(overview.transactions, 2);
        assert_eq!(overview.unique_agents, 2);
        assert_eq!(overview.success_rate, "0.5000");
    }

    #[test]
    fn overview_empty_window_is_well_formed() {
        let overview = overview_at(&[], TimeRange::Hour, fixed_now());
        assert_eq!(overview.volume, "0.00");
        assert_eq!(overview.transactions, 0);
        assert_eq!(overview.unique_agents, 0);
        assert_eq!(overview.success_rate, "0.0000");
        assert!(overview.top_protocols.is_empty());
        assert_eq!(overview.series.len(), 12);
        assert!(overview.series.iter().all(|b| b.count == 0));
    }

    #[test]
    fn malformed_amount_does_not_poison_aggregation() {
        let now = fixed_now();
        let snapshot = vec![
            record_at("a", "0x1", "VVS Finance", "garbage", TxStatus::Success, now),
            record_at("b", "0x1", "VVS Finance", "100.00", TxStatus::Success, now),
        ];
        let overview = overview_at(&snapshot, TimeRange::Day, now);
        assert_eq!(overview.volume, "100.00");
        assert_eq!(overview.transactions, 2);
    }

    #[test]
    fn top_protocols_ranked_descending_stable() {
        let now = fixed_now();
        let snapshot = vec![
            record_at("a", "0x1", "Alpha", "10.00", TxStatus::Success, now),
            record_at("b", "0x1", "Beta", "30.00", TxStatus::Success, now),
            record_at("c", "0x1", "Gamma", "10.00", TxStatus::Success, now),
            record_at("d", "0x1", "Beta", "5.00", TxStatus::Success, now),
        ];
        let overview = overview_at(&snapshot, TimeRange::Day, now);
        let names: Vec<&str> = overview
            .top_protocols
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        // Alpha and Gamma tie at 10.00; Alpha was encountered first.
        assert_eq!(names, vec!["Beta", "Alpha", "Gamma"]);
        assert_eq!(overview.top_protocols[0].volume, "35.00");
    }

    #[test]
    fn top_protocols_capped_at_five() {
        let now = fixed_now();
        let snapshot: Vec<TxRecord> = (0..8)
            .map(|i| {
                record_at(
                    &format!("r{i}"),
                    "0x1",
                    &format!("P{i}"),
                    &format!("{}.00", 10 + i),
                    TxStatus::Success,
                    now,
                )
            })
            .collect();
        let overview = overview_at(&snapshot, TimeRange::Day, now);
        assert_eq!(overview.top_protocols.len(), 5);
        assert_eq!(overview.top_protocols[0].name, "P7");
    }

    #[test]
    fn bucket_counts_per_range() {
        let now = fixed_now();
        for (range, expected) in [
            (TimeRange::Hour, 12),
            (TimeRange::Day, 24),
            (TimeRange::Week, 7),
        ] {
            assert_eq!(bucket_series(&[], range, now).len(), expected);
        }
    }

    #[test]
    fn buckets_are_contiguous_and_cover_the_window() {
        let now = fixed_now();
        for range in [TimeRange::Hour, TimeRange::Day, TimeRange::Week] {
            let width = range.bucket_width();
            let count = range.bucket_count() as i32;
            let newest_start = range.align(now);
            let first_start = newest_start - width * (count - 1);
            // Total span equals the requested window length.
            assert_eq!((newest_start + width) - first_start, range.duration());
        }
    }

    #[test]
    fn five_minute_buckets_align_to_boundaries() {
        // 14:37:21 rounds down to 14:35.
        let now = fixed_now();
        let series = bucket_series(&[], TimeRange::Hour, now);
        assert_eq!(series.last().unwrap().label, "14:35");
        assert_eq!(series.first().unwrap().label, "13:40");
        let aligned = TimeRange::Hour.align(now);
        assert_eq!(aligned.minute() % 5, 0);
        assert_eq!(aligned.second(), 0);
    }

    #[test]
    fn hourly_buckets_align_to_top_of_hour() {
        let now = fixed_now();
        let series = bucket_series(&[], TimeRange::Day, now);
        assert_eq!(series.last().unwrap().label, "14:00");
        assert_eq!(series.first().unwrap().label, "15:00"); // yesterday 15:00
    }

    #[test]
    fn daily_buckets_use_weekday_labels() {
        // 2024-06-12 is a Wednesday.
        let series = bucket_series(&[], TimeRange::Week, fixed_now());
        assert_eq!(series.last().unwrap().label, "Wed");
        assert_eq!(series.first().unwrap().label, "Thu");
    }

    #[test]
    fn bucket_partition_is_lossless() {
        let now = fixed_now();
        let mut snapshot = Vec::new();
        // Scatter records across and beyond the 24h bucket window.
        for i in 0..60 {
            snapshot.push(record_at(
                &format!("r{i}"),
                "0x1",
                "VVS Finance",
                "1.00",
                TxStatus::Success,
                now - Duration::minutes(i * 37),
            ));
        }

        let range = TimeRange::Day;
        let width = range.bucket_width();
        let count = range.bucket_count() as i32;
        let newest_start = range.align(now);
        let window_start = newest_start - width * (count - 1);
        let window_end = newest_start + width;

        let direct = snapshot
            .iter()
            .filter(|r| r.timestamp >= window_start && r.timestamp < window_end)
            .count();
        let bucketed: usize = bucket_series(&snapshot, range, now)
            .iter()
            .map(|b| b.count)
            .sum();
        assert_eq!(bucketed, direct);
    }

    #[test]
    fn series_uses_aligned_span_not_the_since_cutoff() {
        // now = 14:37:21, so the 1h selection cutoff is 13:37:21 while the
        // oldest aligned bucket starts at 13:40. A record at 13:38 is inside
        // the selection but outside every bucket.
        let now = fixed_now();
        let edge = record_at(
            "edge",
            "0x1",
            "VVS Finance",
            "10.00",
            TxStatus::Success,
            now - Duration::minutes(59),
        );
        let in_bucket = record_at(
            "in",
            "0x1",
            "VVS Finance",
            "10.00",
            TxStatus::Success,
            now - Duration::minutes(10),
        );
        let overview = overview_at(&[edge, in_bucket], TimeRange::Hour, now);
        assert_eq!(overview.transactions, 2);
        let total: usize = overview.series.iter().map(|b| b.count).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn health_report_over_24h() {
        let now = fixed_now();
        let snapshot = vec![
            record_at("a", "0x1", "VVS Finance", "10.00", TxStatus::Success, now),
            record_at("b", "0x2", "Tectonic", "10.00", TxStatus::Success, now),
            record_at("c", "0x3", "Delphi", "10.00", TxStatus::Failed, now),
        ];
        let report = health_report(&snapshot, 3, now);
        // 2/3 ≈ 0.6667 → critical.
        assert_eq!(report.status, HealthStatus::Critical);
        assert_eq!(report.score, 30);
        assert_eq!(report.total_transactions_indexed, 3);
        assert_eq!(report.total_agents_tracked, 3);
        assert_eq!(report.overview.range, "24h");
    }

    #[test]
    fn protocol_breakdown_counts_and_rates() {
        let now = fixed_now();
        let snapshot = vec![
            record_at("a", "0x1", "Alpha", "10.00", TxStatus::Success, now),
            record_at("b", "0x1", "Alpha", "10.00", TxStatus::Failed, now),
            record_at("c", "0x1", "Beta", "50.00", TxStatus::Success, now),
        ];
        let breakdown = protocol_breakdown(&snapshot);
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].name, "Beta");
        assert_eq!(breakdown[0].volume, "50.00");
        assert_eq!(breakdown[0].success_rate, "1.0000");
        assert_eq!(breakdown[1].name, "Alpha");
        assert_eq!(breakdown[1].transactions, 2);
        assert_eq!(breakdown[1].success_rate, "0.5000");
    }

    #[test]
    fn agent_profile_derived_fields() {
        let now = fixed_now();
        let mut stats = AgentStats::new("0x1", now);
        for i in 0..10 {
            let status = if i < 9 { TxStatus::Success } else { TxStatus::Failed };
            stats.apply(&record_at("r", "0x1", "Alpha", "10.00", status, now));
        }
        let profile = agent_profile(&stats);
        assert_eq!(profile.success_rate, "0.9000");
        assert_eq!(profile.reputation_score, "90.0");
        assert_eq!(profile.total_volume, "100.00");
        assert_eq!(profile.favorite_protocols, vec!["Alpha".to_string()]);
    }

    #[test]
    fn leaderboard_sorted_by_volume() {
        let now = fixed_now();
        let mut a = AgentStats::new("0xa", now);
        a.apply(&record_at("r", "0xa", "Alpha", "10.00", TxStatus::Success, now));
        let mut b = AgentStats::new("0xb", now);
        b.apply(&record_at("r", "0xb", "Alpha", "99.00", TxStatus::Success, now));
        let board = agent_leaderboard(vec![a, b]);
        assert_eq!(board[0].address, "0xb");
        assert_eq!(board[1].address, "0xa");
    }
}
