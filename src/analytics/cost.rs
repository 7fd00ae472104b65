use super::usage::{group_usage, GroupBy, UsageBucket};
use crate::knowledge_store::AccessLogEntry;
use serde::Serialize;

pub const DEFAULT_TOKENS_PER_QUERY: u64 = 500;
pub const DEFAULT_TOKENS_PER_CHUNK: u64 = 400;
pub const DEFAULT_ASSUMED_CHUNKS_PER_QUERY: u64 = 5;
pub const DEFAULT_USD_PER_MILLION_TOKENS: f64 = 3.0;

const PROJECTION_DAYS: f64 = 30.0;

/// Token based cost model. All estimates are deterministic functions of the counts given.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostModel {
    pub tokens_per_query: u64,
    pub tokens_per_chunk: u64,
    pub assumed_chunks_per_query: u64,
    pub usd_per_million_tokens: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            tokens_per_query: DEFAULT_TOKENS_PER_QUERY,
            tokens_per_chunk: DEFAULT_TOKENS_PER_CHUNK,
            assumed_chunks_per_query: DEFAULT_ASSUMED_CHUNKS_PER_QUERY,
            usd_per_million_tokens: DEFAULT_USD_PER_MILLION_TOKENS,
        }
    }
}

impl CostModel {
    pub fn tokens_per_estimated_query(&self) -> u64 {
        self.tokens_per_query + self.tokens_per_chunk * self.assumed_chunks_per_query
    }

    /// Cost of one query assuming `assumed_chunks_per_query` chunks are returned.
    pub fn per_query_cost(&self) -> f64 {
        self.tokens_to_usd(self.tokens_per_estimated_query())
    }

    pub fn estimate(&self, queries: u64) -> f64 {
        queries as f64 * self.per_query_cost()
    }

    /// Cost based on the chunks actually returned rather than the assumed count.
    pub fn actual_cost(&self, queries: u64, chunks_returned: u64) -> f64 {
        self.tokens_to_usd(queries * self.tokens_per_query + chunks_returned * self.tokens_per_chunk)
    }

    fn tokens_to_usd(&self, tokens: u64) -> f64 {
        tokens as f64 * self.usd_per_million_tokens / 1_000_000.0
    }
}

fn round_usd(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBucket {
    pub key: String,
    pub queries: u64,
    pub chunks_returned: u64,
    pub estimated_cost_usd: f64,
    pub actual_cost_usd: f64,
}

impl CostBucket {
    fn from_usage(model: &CostModel, bucket: UsageBucket) -> Self {
        Self {
            estimated_cost_usd: round_usd(model.estimate(bucket.queries)),
            actual_cost_usd: round_usd(model.actual_cost(bucket.queries, bucket.chunks_returned)),
            key: bucket.key,
            queries: bucket.queries,
            chunks_returned: bucket.chunks_returned,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub model: CostModel,
    pub per_query_cost_usd: f64,
    pub window_days: u32,
    pub total_queries: u64,
    pub total_chunks_returned: u64,
    pub estimated_cost_usd: f64,
    pub actual_cost_usd: f64,
    pub projected_30_day_cost_usd: f64,
    pub by_day: Vec<CostBucket>,
    pub by_user: Vec<CostBucket>,
}

pub fn cost_breakdown(model: &CostModel, entries: &[AccessLogEntry], window_days: u32) -> CostBreakdown {
    let total_queries = entries.len() as u64;
    let total_chunks_returned: u64 = entries.iter().map(|e| e.chunks_returned as u64).sum();
    let actual = model.actual_cost(total_queries, total_chunks_returned);
    let daily_average = actual / window_days.max(1) as f64;

    let to_cost_buckets = |group_by: GroupBy| -> Vec<CostBucket> {
        group_usage(entries, group_by)
            .into_iter()
            .map(|bucket| CostBucket::from_usage(model, bucket))
            .collect()
    };

    CostBreakdown {
        model: *model,
        per_query_cost_usd: model.per_query_cost(),
        window_days,
        total_queries,
        total_chunks_returned,
        estimated_cost_usd: round_usd(model.estimate(total_queries)),
        actual_cost_usd: round_usd(actual),
        projected_30_day_cost_usd: round_usd(daily_average * PROJECTION_DAYS),
        by_day: to_cost_buckets(GroupBy::Day),
        by_user: to_cost_buckets(GroupBy::User),
    }
}
