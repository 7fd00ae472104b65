//! Read-only browsing of indexed files and chunks, filtered by the caller's level.

use crate::access::AccessLevel;
use crate::knowledge_store::{Chunk, ChunkFilter, ChunkStore, DomainSummary, FileFilter, KnowledgeFile};
use crate::search::make_preview;

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

pub const DEFAULT_CHUNK_PAGE_SIZE: usize = 50;
pub const MAX_CHUNK_PAGE_SIZE: usize = 500;

#[derive(Deserialize, Debug)]
struct FilesQuery {
    domain: Option<String>,
    content_type: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChunksQuery {
    domain: Option<String>,
    module: Option<String>,
    content_type: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Serialize, Debug)]
struct ChunkView {
    id: i64,
    file_id: i64,
    domain: String,
    module: String,
    content_type: String,
    access_level: AccessLevel,
    entity_codes: Vec<String>,
    preview: String,
    created_at: i64,
}

impl ChunkView {
    fn from_chunk(chunk: Chunk, preview_graphemes: usize) -> Self {
        ChunkView {
            preview: make_preview(&chunk.content, "", preview_graphemes),
            module: chunk.module_name().to_string(),
            id: chunk.id,
            file_id: chunk.file_id,
            domain: chunk.domain,
            content_type: chunk.content_type,
            access_level: chunk.access_level,
            entity_codes: chunk.entity_codes,
            created_at: chunk.created_at,
        }
    }
}

#[derive(Serialize, Debug)]
struct ChunkPage {
    limit: usize,
    offset: usize,
    chunks: Vec<ChunkView>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn get_files(
    session: AccessSession,
    State(state): State<ServerState>,
    ApiQuery(query): ApiQuery<FilesQuery>,
) -> Result<Json<Vec<KnowledgeFile>>, ApiError> {
    let filter = FileFilter {
        domain: non_empty(query.domain),
        content_type: non_empty(query.content_type),
        max_level: session.access_level,
    };
    Ok(Json(state.store.list_knowledge_files(&filter)?))
}

async fn get_chunks(
    session: AccessSession,
    State(state): State<ServerState>,
    ApiQuery(query): ApiQuery<ChunksQuery>,
) -> Result<Json<ChunkPage>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_CHUNK_PAGE_SIZE);
    if limit == 0 || limit > MAX_CHUNK_PAGE_SIZE {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_CHUNK_PAGE_SIZE
        )));
    }
    let offset = query.offset.unwrap_or(0);
    let filter = ChunkFilter {
        domain: non_empty(query.domain),
        module: non_empty(query.module),
        content_type: non_empty(query.content_type),
        max_level: session.access_level,
        limit: Some(limit),
        offset,
    };
    let preview_graphemes = state.config.search.preview_graphemes;
    let chunks = state
        .store
        .list_chunks(&filter)?
        .into_iter()
        .map(|chunk| ChunkView::from_chunk(chunk, preview_graphemes))
        .collect();
    Ok(Json(ChunkPage {
        limit,
        offset,
        chunks,
    }))
}

async fn get_domains(
    session: AccessSession,
    State(state): State<ServerState>,
) -> Result<Json<Vec<DomainSummary>>, ApiError> {
    Ok(Json(state.store.domain_summaries(session.access_level)?))
}

pub fn make_knowledge_routes(state: ServerState) -> Router {
    Router::new()
        .route("/files", get(get_files))
        .route("/chunks", get(get_chunks))
        .route("/domains", get(get_domains))
        .with_state(state)
}
