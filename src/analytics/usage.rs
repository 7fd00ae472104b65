use super::percentile::{round2, LatencyStats};
use crate::knowledge_store::AccessLogEntry;
use chrono::{DateTime, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Key used for audit rows that carry no domain.
pub const NO_DOMAIN: &str = "(none)";

const TOP_N: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Day,
    User,
    Tool,
    Domain,
}

impl GroupBy {
    fn key_for(self, entry: &AccessLogEntry) -> String {
        match self {
            GroupBy::Day => day_key(entry.created_at),
            GroupBy::User => entry.user_name.clone(),
            GroupBy::Tool => entry.tool.clone(),
            GroupBy::Domain => entry
                .domain
                .clone()
                .unwrap_or_else(|| NO_DOMAIN.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageBucket {
    pub key: String,
    pub queries: u64,
    pub chunks_returned: u64,
    pub avg_latency_ms: f64,
}

#[derive(Default)]
struct Accumulator {
    queries: u64,
    chunks_returned: u64,
    latency_sum: u64,
}

impl Accumulator {
    fn add(&mut self, entry: &AccessLogEntry) {
        self.queries += 1;
        self.chunks_returned += entry.chunks_returned as u64;
        self.latency_sum += entry.latency_ms;
    }

    fn into_bucket(self, key: String) -> UsageBucket {
        let avg_latency_ms = if self.queries == 0 {
            0.0
        } else {
            round2(self.latency_sum as f64 / self.queries as f64)
        };
        UsageBucket {
            key,
            queries: self.queries,
            chunks_returned: self.chunks_returned,
            avg_latency_ms,
        }
    }
}

pub fn utc_date(timestamp: i64) -> NaiveDate {
    DateTime::from_timestamp(timestamp, 0)
        .unwrap_or(DateTime::UNIX_EPOCH)
        .date_naive()
}

/// UTC calendar day of a unix timestamp, `YYYY-MM-DD`.
pub fn day_key(timestamp: i64) -> String {
    utc_date(timestamp).format("%Y-%m-%d").to_string()
}

/// Unix timestamp of midnight UTC on the first day of a `days` long window ending today.
pub fn window_start(now: i64, days: u32) -> i64 {
    let first_day = utc_date(now) - Duration::days(days.max(1) as i64 - 1);
    first_day
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc().timestamp())
        .unwrap_or(0)
}

fn accumulate(entries: &[AccessLogEntry], group_by: GroupBy) -> BTreeMap<String, Accumulator> {
    let mut groups: BTreeMap<String, Accumulator> = BTreeMap::new();
    for entry in entries {
        groups
            .entry(group_by.key_for(entry))
            .or_default()
            .add(entry);
    }
    groups
}

/// Buckets sorted by day ascending for `Day`, otherwise by queries desc then key.
pub fn group_usage(entries: &[AccessLogEntry], group_by: GroupBy) -> Vec<UsageBucket> {
    let mut buckets: Vec<UsageBucket> = accumulate(entries, group_by)
        .into_iter()
        .map(|(key, acc)| acc.into_bucket(key))
        .collect();
    if group_by != GroupBy::Day {
        buckets.sort_by(|a, b| b.queries.cmp(&a.queries).then_with(|| a.key.cmp(&b.key)));
    }
    buckets
}

/// One bucket per day of the window, days without traffic included as zeros.
pub fn daily_series(entries: &[AccessLogEntry], first_day: NaiveDate, days: u32) -> Vec<UsageBucket> {
    let mut by_day = accumulate(entries, GroupBy::Day);
    (0..days)
        .map(|offset| {
            let key = (first_day + Duration::days(offset as i64))
                .format("%Y-%m-%d")
                .to_string();
            by_day.remove(&key).unwrap_or_default().into_bucket(key)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageOverview {
    pub window_days: u32,
    pub total_queries: u64,
    pub unique_users: usize,
    pub unique_tools: usize,
    pub total_chunks_returned: u64,
    pub avg_chunks_per_query: f64,
    pub zero_result_queries: u64,
    pub latency: Option<LatencyStats>,
    pub top_users: Vec<UsageBucket>,
    pub top_tools: Vec<UsageBucket>,
    pub daily: Vec<UsageBucket>,
}

pub fn usage_overview(entries: &[AccessLogEntry], window_start: i64, days: u32) -> UsageOverview {
    let total_queries = entries.len() as u64;
    let total_chunks_returned: u64 = entries.iter().map(|e| e.chunks_returned as u64).sum();
    let unique_users: HashSet<&str> = entries.iter().map(|e| e.user_name.as_str()).collect();
    let unique_tools: HashSet<&str> = entries.iter().map(|e| e.tool.as_str()).collect();

    let mut top_users = group_usage(entries, GroupBy::User);
    top_users.truncate(TOP_N);
    let mut top_tools = group_usage(entries, GroupBy::Tool);
    top_tools.truncate(TOP_N);

    UsageOverview {
        window_days: days,
        total_queries,
        unique_users: unique_users.len(),
        unique_tools: unique_tools.len(),
        total_chunks_returned,
        avg_chunks_per_query: if total_queries == 0 {
            0.0
        } else {
            round2(total_chunks_returned as f64 / total_queries as f64)
        },
        zero_result_queries: entries.iter().filter(|e| e.chunks_returned == 0).count() as u64,
        latency: LatencyStats::from_entries(entries),
        top_users,
        top_tools,
        daily: daily_series(entries, utc_date(window_start), days),
    }
}
