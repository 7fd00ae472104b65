//! API key and access control administration. Every route requires L4.

use crate::access::{AccessLevel, KeyManager};
use crate::knowledge_store::{AccessLogEntry, AccessLogFilter, ApiKey, AuditLogStore};

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::ApiError;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::metrics::set_active_api_keys;
use super::session::AccessSession;
use super::state::{GuardedKeyManager, ServerState};

pub const DEFAULT_AUDIT_PAGE_SIZE: usize = 100;
pub const MAX_AUDIT_PAGE_SIZE: usize = 1000;

#[derive(Deserialize, Debug)]
struct CreateKeyBody {
    owner: String,
    description: Option<String>,
    /// Validated by the key manager so that out-of-range values yield a 400.
    access_level: i64,
}

#[derive(Deserialize, Debug)]
struct UpdateLevelBody {
    access_level: i64,
}

#[derive(Deserialize, Debug)]
struct AuditQuery {
    user: Option<String>,
    tool: Option<String>,
    since: Option<i64>,
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Serialize, Debug)]
struct CreatedKeyResponse {
    key: ApiKey,
    /// Shown exactly once.
    plaintext: String,
}

#[derive(Serialize, Debug)]
struct AccessLevelSummary {
    level: AccessLevel,
    label: &'static str,
    description: &'static str,
    active_keys: usize,
}

#[derive(Serialize, Debug)]
struct AuditPage {
    limit: usize,
    offset: usize,
    entries: Vec<AccessLogEntry>,
}

fn refresh_key_gauge(key_manager: &KeyManager) {
    if let Ok(counts) = key_manager.active_key_counts() {
        set_active_api_keys(&counts);
    }
}

async fn list_keys(
    session: AccessSession,
    State(key_manager): State<GuardedKeyManager>,
) -> Result<Json<Vec<ApiKey>>, ApiError> {
    session.require(AccessLevel::Admin)?;
    Ok(Json(key_manager.list_keys()?))
}

async fn create_key(
    session: AccessSession,
    State(key_manager): State<GuardedKeyManager>,
    ApiJson(body): ApiJson<CreateKeyBody>,
) -> Result<(StatusCode, Json<CreatedKeyResponse>), ApiError> {
    session.require(AccessLevel::Admin)?;
    let created =
        key_manager.create_key(&body.owner, body.description.as_deref(), body.access_level)?;
    info!(
        "{} created API key {} for {}",
        session.owner, created.key.id, created.key.owner
    );
    refresh_key_gauge(&key_manager);
    Ok((
        StatusCode::CREATED,
        Json(CreatedKeyResponse {
            plaintext: created.plaintext.as_str().to_string(),
            key: created.key,
        }),
    ))
}

async fn update_level(
    session: AccessSession,
    State(key_manager): State<GuardedKeyManager>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateLevelBody>,
) -> Result<Json<ApiKey>, ApiError> {
    session.require(AccessLevel::Admin)?;
    let key = key_manager.update_access_level(id, body.access_level)?;
    info!("{} set API key {} to {}", session.owner, id, key.access_level);
    refresh_key_gauge(&key_manager);
    Ok(Json(key))
}

async fn revoke_key(
    session: AccessSession,
    State(key_manager): State<GuardedKeyManager>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiKey>, ApiError> {
    session.require(AccessLevel::Admin)?;
    let key = key_manager.revoke_key(id)?;
    info!("{} revoked API key {}", session.owner, id);
    refresh_key_gauge(&key_manager);
    Ok(Json(key))
}

async fn reactivate_key(
    session: AccessSession,
    State(key_manager): State<GuardedKeyManager>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiKey>, ApiError> {
    session.require(AccessLevel::Admin)?;
    let key = key_manager.reactivate_key(id)?;
    info!("{} reactivated API key {}", session.owner, id);
    refresh_key_gauge(&key_manager);
    Ok(Json(key))
}

async fn get_levels(
    session: AccessSession,
    State(key_manager): State<GuardedKeyManager>,
) -> Result<Json<Vec<AccessLevelSummary>>, ApiError> {
    session.require(AccessLevel::Admin)?;
    let counts = key_manager.active_key_counts()?;
    set_active_api_keys(&counts);
    let summaries = counts
        .into_iter()
        .map(|(level, active_keys)| AccessLevelSummary {
            level,
            label: level.label(),
            description: level.description(),
            active_keys,
        })
        .collect();
    Ok(Json(summaries))
}

async fn get_audit_log(
    session: AccessSession,
    State(state): State<ServerState>,
    ApiQuery(query): ApiQuery<AuditQuery>,
) -> Result<Json<AuditPage>, ApiError> {
    session.require(AccessLevel::Admin)?;
    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_PAGE_SIZE);
    if limit == 0 || limit > MAX_AUDIT_PAGE_SIZE {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_AUDIT_PAGE_SIZE
        )));
    }
    let offset = query.offset.unwrap_or(0);
    let filter = AccessLogFilter {
        user_name: query.user.filter(|u| !u.trim().is_empty()),
        tool: query.tool.filter(|t| !t.trim().is_empty()),
        since: query.since,
    };
    let entries = state.store.list_access_log(&filter, limit, offset)?;
    Ok(Json(AuditPage {
        limit,
        offset,
        entries,
    }))
}

pub fn make_admin_routes(state: ServerState) -> Router {
    Router::new()
        .route("/keys", get(list_keys))
        .route("/keys", post(create_key))
        .route("/keys/{id}", delete(revoke_key))
        .route("/keys/{id}/level", put(update_level))
        .route("/keys/{id}/reactivate", post(reactivate_key))
        .route("/levels", get(get_levels))
        .route("/audit", get(get_audit_log))
        .with_state(state)
}
