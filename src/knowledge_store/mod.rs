mod models;
mod schema;
mod sqlite_knowledge_store;

pub use models::*;
pub use schema::KNOWLEDGE_VERSIONED_SCHEMAS;
pub use sqlite_knowledge_store::SqliteKnowledgeStore;

use crate::access::AccessLevel;
use anyhow::Result;

pub trait ChunkStore: Send + Sync {
    /// Inserts a file row, returns its id. Paths are unique.
    fn insert_knowledge_file(&self, file: &NewKnowledgeFile) -> Result<i64>;
    fn get_knowledge_file(&self, id: i64) -> Result<Option<KnowledgeFile>>;
    fn list_knowledge_files(&self, filter: &FileFilter) -> Result<Vec<KnowledgeFile>>;

    fn insert_chunk(&self, chunk: &NewChunk) -> Result<i64>;
    fn list_chunks(&self, filter: &ChunkFilter) -> Result<Vec<Chunk>>;
    /// Chunk counts per module, chunks without a module are counted under "Unknown".
    fn count_chunks_by_module(&self) -> Result<Vec<(String, usize)>>;
    /// File and chunk counts per domain, restricted to records readable at `max_level`.
    fn domain_summaries(&self, max_level: AccessLevel) -> Result<Vec<DomainSummary>>;

    /// Case-insensitive substring match over chunk content. Returns the best `limit`
    /// matches by occurrence count, then shorter content, then id.
    fn search_chunks(
        &self,
        query: &str,
        max_level: AccessLevel,
        domain: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ChunkMatch>>;
    /// Number of chunks `search_chunks` would match without a limit.
    fn count_chunk_matches(
        &self,
        query: &str,
        max_level: AccessLevel,
        domain: Option<&str>,
    ) -> Result<usize>;
}

pub trait EntityGraphStore: Send + Sync {
    fn upsert_entity(&self, entity: &Entity) -> Result<()>;
    fn get_entity(&self, code: &str) -> Result<Option<Entity>>;
    fn list_entities(&self, filter: &EntityFilter) -> Result<Vec<Entity>>;

    /// Returns false when the same (source, target, relationship) edge already exists.
    fn insert_edge(&self, edge: &NewEntityEdge) -> Result<bool>;
    fn list_edges(&self) -> Result<Vec<EntityEdge>>;
    /// Edges where `code` is either the source or the target.
    fn edges_for(&self, code: &str) -> Result<Vec<EntityEdge>>;
}

pub trait AuditLogStore: Send + Sync {
    fn record_access(&self, entry: &NewAccessLogEntry) -> Result<i64>;
    /// Newest entries first.
    fn list_access_log(
        &self,
        filter: &AccessLogFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AccessLogEntry>>;
    /// Entries at or after `since`, oldest first.
    fn access_log_since(&self, since: i64) -> Result<Vec<AccessLogEntry>>;
    fn prune_access_log_older_than(&self, before_timestamp: i64) -> Result<usize>;
}

pub trait ApiKeyStore: Send + Sync {
    fn insert_api_key(&self, key: &NewApiKey) -> Result<i64>;
    fn get_api_key(&self, id: i64) -> Result<Option<ApiKey>>;
    fn get_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>>;
    fn list_api_keys(&self) -> Result<Vec<ApiKey>>;
    /// Returns false when no key has this id.
    fn set_api_key_access_level(&self, id: i64, level: AccessLevel) -> Result<bool>;
    /// Deactivating stamps `revoked_at` with `at`, reactivating clears it.
    fn set_api_key_active(&self, id: i64, active: bool, at: i64) -> Result<bool>;
    fn touch_api_key(&self, id: i64, at: i64) -> Result<()>;
    fn count_active_keys_at_level(&self, level: AccessLevel) -> Result<usize>;
}

/// Combined trait for everything the HTTP layer reads and writes.
pub trait KnowledgeStore: ChunkStore + EntityGraphStore + AuditLogStore + ApiKeyStore {}

impl<T: ChunkStore + EntityGraphStore + AuditLogStore + ApiKeyStore> KnowledgeStore for T {}
