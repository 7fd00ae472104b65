//! Search proxy route

use crate::search::{SearchRequest, SearchResponse, DEFAULT_TOOL};

use axum::{extract::State, routing::post, Json, Router};
use std::time::Instant;

use super::error::ApiError;
use super::extract::ApiJson;
use super::metrics::record_search;
use super::session::AccessSession;
use super::state::{GuardedSearcher, ServerState};

async fn search(
    session: AccessSession,
    State(searcher): State<GuardedSearcher>,
    ApiJson(body): ApiJson<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = Instant::now();
    let caller = session.as_search_caller();
    let result = searcher.search(&caller, &body);

    let tool = match &result {
        Ok(response) => response.tool.clone(),
        Err(_) => body
            .tool
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TOOL.to_string()),
    };
    let outcome = if result.is_ok() { "ok" } else { "error" };
    record_search(&tool, outcome, start.elapsed());

    Ok(Json(result?))
}

pub fn make_search_routes(state: ServerState) -> Router {
    Router::new()
        .route("/v1/search", post(search))
        .with_state(state)
}
