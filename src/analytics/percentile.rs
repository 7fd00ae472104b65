use crate::knowledge_store::AccessLogEntry;
use serde::Serialize;
use std::collections::BTreeMap;

/// Nearest-rank percentile: the value at rank `ceil(p/100 * n)`, rank clamped to `[1, n]`.
pub fn percentile(values: &[u64], p: f64) -> Option<u64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    Some(percentile_of_sorted(&sorted, p))
}

/// Same as [`percentile`] for input already sorted ascending and non-empty.
fn percentile_of_sorted(sorted: &[u64], p: f64) -> u64 {
    let n = sorted.len();
    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) };
    let rank = (p * n as f64 / 100.0).ceil() as usize;
    sorted[rank.clamp(1, n) - 1]
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyStats {
    pub count: usize,
    pub avg_ms: f64,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
    pub max_ms: u64,
}

impl LatencyStats {
    pub fn from_latencies(values: &[u64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_unstable();
        let sum: u64 = sorted.iter().sum();
        Some(Self {
            count: sorted.len(),
            avg_ms: round2(sum as f64 / sorted.len() as f64),
            p50_ms: percentile_of_sorted(&sorted, 50.0),
            p95_ms: percentile_of_sorted(&sorted, 95.0),
            p99_ms: percentile_of_sorted(&sorted, 99.0),
            max_ms: sorted[sorted.len() - 1],
        })
    }

    pub fn from_entries(entries: &[AccessLogEntry]) -> Option<Self> {
        let latencies: Vec<u64> = entries.iter().map(|e| e.latency_ms).collect();
        Self::from_latencies(&latencies)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolLatency {
    pub tool: String,
    #[serde(flatten)]
    pub stats: LatencyStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyReport {
    pub overall: Option<LatencyStats>,
    pub by_tool: Vec<ToolLatency>,
}

/// Per-tool latency summaries, busiest tool first.
pub fn latency_by_tool(entries: &[AccessLogEntry]) -> Vec<ToolLatency> {
    let mut per_tool: BTreeMap<&str, Vec<u64>> = BTreeMap::new();
    for entry in entries {
        per_tool
            .entry(entry.tool.as_str())
            .or_default()
            .push(entry.latency_ms);
    }
    let mut result: Vec<ToolLatency> = per_tool
        .into_iter()
        .filter_map(|(tool, latencies)| {
            LatencyStats::from_latencies(&latencies).map(|stats| ToolLatency {
                tool: tool.to_string(),
                stats,
            })
        })
        .collect();
    result.sort_by(|a, b| b.stats.count.cmp(&a.stats.count).then(a.tool.cmp(&b.tool)));
    result
}

pub fn latency_report(entries: &[AccessLogEntry]) -> LatencyReport {
    LatencyReport {
        overall: LatencyStats::from_entries(entries),
        by_tool: latency_by_tool(entries),
    }
}
