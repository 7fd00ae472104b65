//! Aggregation routines behind the analytics endpoints. Every function here is
//! pure: it takes rows already read from the store and returns a serializable view.

mod cost;
mod coverage;
mod freshness;
mod percentile;
mod usage;

pub use cost::{
    cost_breakdown, CostBreakdown, CostBucket, CostModel, DEFAULT_ASSUMED_CHUNKS_PER_QUERY,
    DEFAULT_TOKENS_PER_CHUNK, DEFAULT_TOKENS_PER_QUERY, DEFAULT_USD_PER_MILLION_TOKENS,
};
pub use coverage::{
    coverage_report, is_coverage_gap, module_chunk_counts, module_coverage,
    unreferenced_entities, zero_result_domains, CoverageReport, EntityGap, ModuleCoverage,
    ZeroResultDomain, DEFAULT_COVERAGE_THRESHOLD,
};
pub use freshness::{
    freshness_report, hot_cold_domains, orphan_entities, stale_files, DomainActivity,
    FreshnessInput, FreshnessReport, HotColdDomains, OrphanEntity, StaleFile,
    DEFAULT_STALE_AFTER_DAYS,
};
pub use percentile::{latency_by_tool, latency_report, percentile, LatencyReport, LatencyStats, ToolLatency};
pub use usage::{
    daily_series, day_key, group_usage, usage_overview, utc_date, window_start, GroupBy,
    UsageBucket, UsageOverview, NO_DOMAIN,
};

#[cfg(test)]
pub(crate) fn test_entry(
    user: &str,
    tool: &str,
    domain: Option<&str>,
    created_at: i64,
    latency_ms: u64,
    chunks_returned: u32,
) -> crate::knowledge_store::AccessLogEntry {
    crate::knowledge_store::AccessLogEntry {
        id: 0,
        api_key_id: None,
        user_name: user.to_string(),
        tool: tool.to_string(),
        query: Some("q".to_string()),
        domain: domain.map(str::to_string),
        latency_ms,
        chunks_returned,
        chunks_considered: chunks_returned,
        access_level: crate::access::AccessLevel::Internal,
        created_at,
    }
}
