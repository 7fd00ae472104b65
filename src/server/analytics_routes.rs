//! Analytics routes. All views require L3 and aggregate audit rows in memory.

use crate::access::AccessLevel;
use crate::analytics::{
    cost_breakdown, coverage_report, daily_series, freshness_report, group_usage, latency_report,
    usage_overview, utc_date, window_start, CostBreakdown, CoverageReport, FreshnessInput,
    FreshnessReport, GroupBy, LatencyReport, UsageBucket, UsageOverview,
};
use crate::knowledge_store::{
    AccessLogEntry, AuditLogStore, ChunkFilter, ChunkStore, EntityFilter, EntityGraphStore,
    FileFilter,
};

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::extract::ApiQuery;
use super::session::AccessSession;
use super::state::ServerState;

pub const ANALYTICS_LEVEL: AccessLevel = AccessLevel::Confidential;
pub const MAX_WINDOW_DAYS: u32 = 365;

#[derive(Deserialize, Debug, Default)]
struct WindowQuery {
    days: Option<u32>,
}

#[derive(Deserialize, Debug)]
struct UsageQuery {
    group_by: Option<GroupBy>,
    days: Option<u32>,
}

#[derive(Deserialize, Debug)]
struct FreshnessQuery {
    days: Option<u32>,
    stale_days: Option<u32>,
}

#[derive(Serialize)]
struct UsageResponse {
    group_by: GroupBy,
    window_days: u32,
    buckets: Vec<UsageBucket>,
}

#[derive(Serialize)]
struct LatencyResponse {
    window_days: u32,
    #[serde(flatten)]
    report: LatencyReport,
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

fn resolve_window(state: &ServerState, requested: Option<u32>) -> Result<u32, ApiError> {
    let days = requested.unwrap_or(state.config.analytics.default_window_days);
    if days == 0 || days > MAX_WINDOW_DAYS {
        return Err(ApiError::BadRequest(format!(
            "days must be between 1 and {} (got {})",
            MAX_WINDOW_DAYS, days
        )));
    }
    Ok(days)
}

/// Audit rows in the window together with the window's first timestamp.
fn load_window(state: &ServerState, days: u32) -> Result<(i64, Vec<AccessLogEntry>), ApiError> {
    let start = window_start(now_unix(), days);
    let entries = state.store.access_log_since(start)?;
    Ok((start, entries))
}

async fn get_overview(
    session: AccessSession,
    State(state): State<ServerState>,
    ApiQuery(query): ApiQuery<WindowQuery>,
) -> Result<Json<UsageOverview>, ApiError> {
    session.require(ANALYTICS_LEVEL)?;
    let days = resolve_window(&state, query.days)?;
    let (start, entries) = load_window(&state, days)?;
    Ok(Json(usage_overview(&entries, start, days)))
}

async fn get_usage(
    session: AccessSession,
    State(state): State<ServerState>,
    ApiQuery(query): ApiQuery<UsageQuery>,
) -> Result<Json<UsageResponse>, ApiError> {
    session.require(ANALYTICS_LEVEL)?;
    let days = resolve_window(&state, query.days)?;
    let group_by = query.group_by.unwrap_or(GroupBy::Day);
    let (start, entries) = load_window(&state, days)?;
    let buckets = match group_by {
        GroupBy::Day => daily_series(&entries, utc_date(start), days),
        other => group_usage(&entries, other),
    };
    Ok(Json(UsageResponse {
        group_by,
        window_days: days,
        buckets,
    }))
}

async fn get_latency(
    session: AccessSession,
    State(state): State<ServerState>,
    ApiQuery(query): ApiQuery<WindowQuery>,
) -> Result<Json<LatencyResponse>, ApiError> {
    session.require(ANALYTICS_LEVEL)?;
    let days = resolve_window(&state, query.days)?;
    let (_, entries) = load_window(&state, days)?;
    Ok(Json(LatencyResponse {
        window_days: days,
        report: latency_report(&entries),
    }))
}

async fn get_costs(
    session: AccessSession,
    State(state): State<ServerState>,
    ApiQuery(query): ApiQuery<WindowQuery>,
) -> Result<Json<CostBreakdown>, ApiError> {
    session.require(ANALYTICS_LEVEL)?;
    let days = resolve_window(&state, query.days)?;
    let (_, entries) = load_window(&state, days)?;
    Ok(Json(cost_breakdown(&state.config.cost_model, &entries, days)))
}

async fn get_coverage(
    session: AccessSession,
    State(state): State<ServerState>,
    ApiQuery(query): ApiQuery<WindowQuery>,
) -> Result<Json<CoverageReport>, ApiError> {
    session.require(ANALYTICS_LEVEL)?;
    let days = resolve_window(&state, query.days)?;
    let (_, entries) = load_window(&state, days)?;
    let module_counts = state.store.count_chunks_by_module()?;
    let entities = state.store.list_entities(&EntityFilter::default())?;
    let chunks = state.store.list_chunks(&ChunkFilter::default())?;
    Ok(Json(coverage_report(
        &module_counts,
        &entities,
        &chunks,
        &entries,
        state.config.analytics.coverage_threshold,
    )))
}

async fn get_freshness(
    session: AccessSession,
    State(state): State<ServerState>,
    ApiQuery(query): ApiQuery<FreshnessQuery>,
) -> Result<Json<FreshnessReport>, ApiError> {
    session.require(ANALYTICS_LEVEL)?;
    let days = resolve_window(&state, query.days)?;
    let stale_after_days = query
        .stale_days
        .unwrap_or(state.config.analytics.stale_after_days);
    let (_, entries) = load_window(&state, days)?;
    let files = state.store.list_knowledge_files(&FileFilter::default())?;
    let domains = state.store.domain_summaries(AccessLevel::Admin)?;
    let input = FreshnessInput {
        files: &files,
        entities: state.store.list_entities(&EntityFilter::default())?,
        edges: state.store.list_edges()?,
        domains: &domains,
        entries: &entries,
    };
    Ok(Json(freshness_report(input, now_unix(), stale_after_days)))
}

pub fn make_analytics_routes(state: ServerState) -> Router {
    Router::new()
        .route("/overview", get(get_overview))
        .route("/usage", get(get_usage))
        .route("/latency", get(get_latency))
        .route("/costs", get(get_costs))
        .route("/coverage", get(get_coverage))
        .route("/freshness", get(get_freshness))
        .with_state(state)
}
