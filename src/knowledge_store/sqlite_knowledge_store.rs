use super::models::*;
use super::schema::KNOWLEDGE_VERSIONED_SCHEMAS;
use super::{ApiKeyStore, AuditLogStore, ChunkStore, EntityGraphStore};
use crate::access::AccessLevel;
use crate::search::count_occurrences;
use crate::sqlite_persistence::open_versioned_database;
use anyhow::{Context, Result};
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

const FILE_COLUMNS: &str =
    "id, path, domain, content_type, access_level, title, updated_at, created_at";
const CHUNK_COLUMNS: &str =
    "id, file_id, domain, module, content_type, access_level, content, entity_codes, created_at";
const ENTITY_COLUMNS: &str = "code, name, entity_type, description, domain, updated_at";
const EDGE_COLUMNS: &str = "id, source_code, target_code, relationship, created_at";
const AUDIT_COLUMNS: &str = "id, api_key_id, user_name, tool, query, domain, latency_ms, \
     chunks_returned, chunks_considered, access_level, created_at";
const API_KEY_COLUMNS: &str = "id, key_hash, key_prefix, owner, description, access_level, \
     is_active, created_at, last_used_at, revoked_at";

/// Unicode case-insensitive, non-overlapping occurrences of the second argument in the first.
/// SQLite's own lower() only folds ASCII.
const OCCURRENCES_FN: &str = "occurrences";

fn register_search_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        OCCURRENCES_FN,
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let content = ctx.get::<String>(0)?;
            let query = ctx.get::<String>(1)?;
            Ok(count_occurrences(&content, &query) as i64)
        },
    )
    .context("Failed to register search functions")?;
    Ok(())
}

pub struct SqliteKnowledgeStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKnowledgeStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned_database(db_path, KNOWLEDGE_VERSIONED_SCHEMAS, "knowledge")?;
        register_search_functions(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// A fresh database that lives as long as the store, used by tests and tooling.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        KNOWLEDGE_VERSIONED_SCHEMAS
            .last()
            .context("No knowledge schema defined")?
            .create(&conn)?;
        register_search_functions(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_file(row: &Row) -> rusqlite::Result<KnowledgeFile> {
        Ok(KnowledgeFile {
            id: row.get("id")?,
            path: row.get("path")?,
            domain: row.get("domain")?,
            content_type: row.get("content_type")?,
            access_level: row.get("access_level")?,
            title: row.get("title")?,
            updated_at: row.get("updated_at")?,
            created_at: row.get("created_at")?,
        })
    }

    fn row_to_chunk(row: &Row) -> rusqlite::Result<Chunk> {
        let entity_codes: String = row.get("entity_codes")?;
        Ok(Chunk {
            id: row.get("id")?,
            file_id: row.get("file_id")?,
            domain: row.get("domain")?,
            module: row.get("module")?,
            content_type: row.get("content_type")?,
            access_level: row.get("access_level")?,
            content: row.get("content")?,
            entity_codes: split_entity_codes(&entity_codes),
            created_at: row.get("created_at")?,
        })
    }

    fn row_to_entity(row: &Row) -> rusqlite::Result<Entity> {
        Ok(Entity {
            code: row.get("code")?,
            name: row.get("name")?,
            entity_type: row.get("entity_type")?,
            description: row.get("description")?,
            domain: row.get("domain")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn row_to_edge(row: &Row) -> rusqlite::Result<EntityEdge> {
        Ok(EntityEdge {
            id: row.get("id")?,
            source_code: row.get("source_code")?,
            target_code: row.get("target_code")?,
            relationship: row.get("relationship")?,
            created_at: row.get("created_at")?,
        })
    }

    fn row_to_access_log_entry(row: &Row) -> rusqlite::Result<AccessLogEntry> {
        Ok(AccessLogEntry {
            id: row.get("id")?,
            api_key_id: row.get("api_key_id")?,
            user_name: row.get("user_name")?,
            tool: row.get("tool")?,
            query: row.get("query")?,
            domain: row.get("domain")?,
            latency_ms: row.get::<_, i64>("latency_ms")?.max(0) as u64,
            chunks_returned: row.get::<_, i64>("chunks_returned")?.max(0) as u32,
            chunks_considered: row.get::<_, i64>("chunks_considered")?.max(0) as u32,
            access_level: row.get("access_level")?,
            created_at: row.get("created_at")?,
        })
    }

    fn row_to_api_key(row: &Row) -> rusqlite::Result<ApiKey> {
        Ok(ApiKey {
            id: row.get("id")?,
            key_hash: row.get("key_hash")?,
            key_prefix: row.get("key_prefix")?,
            owner: row.get("owner")?,
            description: row.get("description")?,
            access_level: row.get("access_level")?,
            is_active: row.get::<_, i64>("is_active")? == 1,
            created_at: row.get("created_at")?,
            last_used_at: row.get("last_used_at")?,
            revoked_at: row.get("revoked_at")?,
        })
    }
}

fn sql_limit(limit: Option<usize>) -> i64 {
    // SQLite treats a negative LIMIT as unbounded
    limit.map(|l| l as i64).unwrap_or(-1)
}

impl ChunkStore for SqliteKnowledgeStore {
    fn insert_knowledge_file(&self, file: &NewKnowledgeFile) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO knowledge_files (path, domain, content_type, access_level, title, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                file.path,
                file.domain,
                file.content_type,
                file.access_level,
                file.title,
                file.updated_at
            ],
        )
        .with_context(|| format!("Failed to insert knowledge file {}", file.path))?;
        Ok(conn.last_insert_rowid())
    }

    fn get_knowledge_file(&self, id: i64) -> Result<Option<KnowledgeFile>> {
        let conn = self.conn.lock().unwrap();
        let file = conn
            .query_row(
                &format!("SELECT {} FROM knowledge_files WHERE id = ?1", FILE_COLUMNS),
                params![id],
                Self::row_to_file,
            )
            .optional()?;
        Ok(file)
    }

    fn list_knowledge_files(&self, filter: &FileFilter) -> Result<Vec<KnowledgeFile>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM knowledge_files \
             WHERE access_level <= ?1 \
               AND (?2 IS NULL OR domain = ?2) \
               AND (?3 IS NULL OR content_type = ?3) \
             ORDER BY path",
            FILE_COLUMNS
        ))?;
        let files = stmt
            .query_map(
                params![filter.max_level, filter.domain, filter.content_type],
                Self::row_to_file,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(files)
    }

    fn insert_chunk(&self, chunk: &NewChunk) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO chunks (file_id, domain, module, content_type, access_level, content, entity_codes, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                chunk.file_id,
                chunk.domain,
                chunk.module,
                chunk.content_type,
                chunk.access_level,
                chunk.content,
                join_entity_codes(&chunk.entity_codes),
                chunk.created_at
            ],
        )
        .with_context(|| format!("Failed to insert chunk for file {}", chunk.file_id))?;
        Ok(conn.last_insert_rowid())
    }

    fn list_chunks(&self, filter: &ChunkFilter) -> Result<Vec<Chunk>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM chunks \
             WHERE access_level <= ?1 \
               AND (?2 IS NULL OR domain = ?2) \
               AND (?3 IS NULL OR content_type = ?3) \
               AND (?4 IS NULL OR COALESCE(NULLIF(TRIM(module), ''), ?5) = ?4) \
             ORDER BY id LIMIT ?6 OFFSET ?7",
            CHUNK_COLUMNS
        ))?;
        let chunks = stmt
            .query_map(
                params![
                    filter.max_level,
                    filter.domain,
                    filter.content_type,
                    filter.module,
                    UNKNOWN_MODULE,
                    sql_limit(filter.limit),
                    filter.offset as i64
                ],
                Self::row_to_chunk,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(chunks)
    }

    fn count_chunks_by_module(&self) -> Result<Vec<(String, usize)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT COALESCE(NULLIF(TRIM(module), ''), ?1) AS module_name, COUNT(*) AS chunk_count \
             FROM chunks GROUP BY module_name ORDER BY module_name",
        )?;
        let counts = stmt
            .query_map(params![UNKNOWN_MODULE], |row| {
                Ok((row.get(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(counts)
    }

    fn domain_summaries(&self, max_level: AccessLevel) -> Result<Vec<DomainSummary>> {
        let conn = self.conn.lock().unwrap();
        let mut by_domain: BTreeMap<String, DomainSummary> = BTreeMap::new();

        let mut files_stmt = conn.prepare(
            "SELECT domain, COUNT(*) FROM knowledge_files WHERE access_level <= ?1 GROUP BY domain",
        )?;
        let file_counts = files_stmt
            .query_map(params![max_level], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for (domain, count) in file_counts {
            by_domain
                .entry(domain.clone())
                .or_insert_with(|| DomainSummary {
                    domain,
                    files: 0,
                    chunks: 0,
                })
                .files = count as usize;
        }

        let mut chunks_stmt = conn.prepare(
            "SELECT domain, COUNT(*) FROM chunks WHERE access_level <= ?1 GROUP BY domain",
        )?;
        let chunk_counts = chunks_stmt
            .query_map(params![max_level], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for (domain, count) in chunk_counts {
            by_domain
                .entry(domain.clone())
                .or_insert_with(|| DomainSummary {
                    domain,
                    files: 0,
                    chunks: 0,
                })
                .chunks = count as usize;
        }

        Ok(by_domain.into_values().collect())
    }

    fn search_chunks(
        &self,
        query: &str,
        max_level: AccessLevel,
        domain: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ChunkMatch>> {
        let conn = self.conn.lock().unwrap();
        // Ranked in SQL so that LIMIT keeps the best matches, not the oldest ones
        let mut stmt = conn.prepare(
            "SELECT * FROM ( \
                SELECT c.id AS id, c.file_id AS file_id, c.domain AS domain, c.module AS module, \
                       c.content_type AS content_type, c.access_level AS access_level, \
                       c.content AS content, c.entity_codes AS entity_codes, \
                       c.created_at AS created_at, f.path AS file_path, \
                       occurrences(c.content, ?2) AS score, \
                       length(CAST(c.content AS BLOB)) AS content_bytes \
                FROM chunks c JOIN knowledge_files f ON f.id = c.file_id \
                WHERE c.access_level <= ?1 AND (?3 IS NULL OR c.domain = ?3)) \
             WHERE score > 0 \
             ORDER BY score DESC, content_bytes ASC, id ASC LIMIT ?4",
        )?;
        let matches = stmt
            .query_map(params![max_level, query, domain, limit as i64], |row| {
                Ok(ChunkMatch {
                    chunk: Self::row_to_chunk(row)?,
                    file_path: row.get("file_path")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(
            "Substring search for {:?} at {} kept {} chunks",
            query,
            max_level,
            matches.len()
        );
        Ok(matches)
    }

    fn count_chunk_matches(
        &self,
        query: &str,
        max_level: AccessLevel,
        domain: Option<&str>,
    ) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chunks c JOIN knowledge_files f ON f.id = c.file_id \
             WHERE c.access_level <= ?1 AND (?3 IS NULL OR c.domain = ?3) \
               AND occurrences(c.content, ?2) > 0",
            params![max_level, query, domain],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl EntityGraphStore for SqliteKnowledgeStore {
    fn upsert_entity(&self, entity: &Entity) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO entities (code, name, entity_type, description, domain, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(code) DO UPDATE SET \
                name = excluded.name, \
                entity_type = excluded.entity_type, \
                description = excluded.description, \
                domain = excluded.domain, \
                updated_at = excluded.updated_at",
            params![
                entity.code,
                entity.name,
                entity.entity_type,
                entity.description,
                entity.domain,
                entity.updated_at
            ],
        )?;
        Ok(())
    }

    fn get_entity(&self, code: &str) -> Result<Option<Entity>> {
        let conn = self.conn.lock().unwrap();
        let entity = conn
            .query_row(
                &format!("SELECT {} FROM entities WHERE code = ?1", ENTITY_COLUMNS),
                params![code],
                Self::row_to_entity,
            )
            .optional()?;
        Ok(entity)
    }

    fn list_entities(&self, filter: &EntityFilter) -> Result<Vec<Entity>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM entities \
             WHERE (?1 IS NULL OR entity_type = ?1) AND (?2 IS NULL OR domain = ?2) \
             ORDER BY code",
            ENTITY_COLUMNS
        ))?;
        let entities = stmt
            .query_map(
                params![filter.entity_type, filter.domain],
                Self::row_to_entity,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entities)
    }

    fn insert_edge(&self, edge: &NewEntityEdge) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO entity_edges (source_code, target_code, relationship) \
             VALUES (?1, ?2, ?3)",
            params![edge.source_code, edge.target_code, edge.relationship],
        )?;
        Ok(inserted == 1)
    }

    fn list_edges(&self) -> Result<Vec<EntityEdge>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM entity_edges ORDER BY id",
            EDGE_COLUMNS
        ))?;
        let edges = stmt
            .query_map([], Self::row_to_edge)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }

    fn edges_for(&self, code: &str) -> Result<Vec<EntityEdge>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM entity_edges WHERE source_code = ?1 OR target_code = ?1 ORDER BY id",
            EDGE_COLUMNS
        ))?;
        let edges = stmt
            .query_map(params![code], Self::row_to_edge)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }
}

impl AuditLogStore for SqliteKnowledgeStore {
    fn record_access(&self, entry: &NewAccessLogEntry) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO access_audit_log \
             (api_key_id, user_name, tool, query, domain, latency_ms, chunks_returned, \
              chunks_considered, access_level, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry.api_key_id,
                entry.user_name,
                entry.tool,
                entry.query,
                entry.domain,
                entry.latency_ms as i64,
                entry.chunks_returned,
                entry.chunks_considered,
                entry.access_level,
                entry.created_at
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn list_access_log(
        &self,
        filter: &AccessLogFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AccessLogEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM access_audit_log \
             WHERE (?1 IS NULL OR user_name = ?1) \
               AND (?2 IS NULL OR tool = ?2) \
               AND (?3 IS NULL OR created_at >= ?3) \
             ORDER BY created_at DESC, id DESC LIMIT ?4 OFFSET ?5",
            AUDIT_COLUMNS
        ))?;
        let entries = stmt
            .query_map(
                params![
                    filter.user_name,
                    filter.tool,
                    filter.since,
                    limit as i64,
                    offset as i64
                ],
                Self::row_to_access_log_entry,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn access_log_since(&self, since: i64) -> Result<Vec<AccessLogEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM access_audit_log WHERE created_at >= ?1 ORDER BY created_at, id",
            AUDIT_COLUMNS
        ))?;
        let entries = stmt
            .query_map(params![since], Self::row_to_access_log_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn prune_access_log_older_than(&self, before_timestamp: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM access_audit_log WHERE created_at < ?1",
            params![before_timestamp],
        )?;
        if deleted > 0 {
            info!("Pruned {} access log entries", deleted);
        }
        Ok(deleted)
    }
}

impl ApiKeyStore for SqliteKnowledgeStore {
    fn insert_api_key(&self, key: &NewApiKey) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO api_keys (key_hash, key_prefix, owner, description, access_level) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                key.key_hash,
                key.key_prefix,
                key.owner,
                key.description,
                key.access_level
            ],
        )
        .with_context(|| format!("Failed to insert API key for {}", key.owner))?;
        Ok(conn.last_insert_rowid())
    }

    fn get_api_key(&self, id: i64) -> Result<Option<ApiKey>> {
        let conn = self.conn.lock().unwrap();
        let key = conn
            .query_row(
                &format!("SELECT {} FROM api_keys WHERE id = ?1", API_KEY_COLUMNS),
                params![id],
                Self::row_to_api_key,
            )
            .optional()?;
        Ok(key)
    }

    fn get_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>> {
        let conn = self.conn.lock().unwrap();
        let key = conn
            .query_row(
                &format!("SELECT {} FROM api_keys WHERE key_hash = ?1", API_KEY_COLUMNS),
                params![key_hash],
                Self::row_to_api_key,
            )
            .optional()?;
        Ok(key)
    }

    fn list_api_keys(&self) -> Result<Vec<ApiKey>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM api_keys ORDER BY id",
            API_KEY_COLUMNS
        ))?;
        let keys = stmt
            .query_map([], Self::row_to_api_key)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
    }

    fn set_api_key_access_level(&self, id: i64, level: AccessLevel) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE api_keys SET access_level = ?2 WHERE id = ?1",
            params![id, level],
        )?;
        Ok(updated == 1)
    }

    fn set_api_key_active(&self, id: i64, active: bool, at: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let revoked_at = if active { None } else { Some(at) };
        let updated = conn.execute(
            "UPDATE api_keys SET is_active = ?2, revoked_at = ?3 WHERE id = ?1",
            params![id, active as i64, revoked_at],
        )?;
        Ok(updated == 1)
    }

    fn touch_api_key(&self, id: i64, at: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE api_keys SET last_used_at = ?2 WHERE id = ?1",
            params![id, at],
        )?;
        Ok(())
    }

    fn count_active_keys_at_level(&self, level: AccessLevel) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM api_keys WHERE is_active = 1 AND access_level = ?1",
            params![level],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct TestStore {
        store: SqliteKnowledgeStore,
        _temp_dir: TempDir,
    }

    fn create_test_store() -> TestStore {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("knowledge.db");
        let store = SqliteKnowledgeStore::new(&db_path).unwrap();
        TestStore {
            store,
            _temp_dir: temp_dir,
        }
    }

    fn add_file(store: &SqliteKnowledgeStore, path: &str, domain: &str, level: AccessLevel) -> i64 {
        store
            .insert_knowledge_file(&NewKnowledgeFile {
                path: path.to_string(),
                domain: domain.to_string(),
                content_type: "markdown".to_string(),
                access_level: level,
                title: None,
                updated_at: 1_700_000_000,
            })
            .unwrap()
    }

    fn add_chunk(
        store: &SqliteKnowledgeStore,
        file_id: i64,
        domain: &str,
        module: Option<&str>,
        level: AccessLevel,
        content: &str,
    ) -> i64 {
        store
            .insert_chunk(&NewChunk {
                file_id,
                domain: domain.to_string(),
                module: module.map(str::to_string),
                content_type: "markdown".to_string(),
                access_level: level,
                content: content.to_string(),
                entity_codes: vec!["ACC-1".to_string()],
                created_at: 1_700_000_000,
            })
            .unwrap()
    }

    fn audit_entry(user: &str, tool: &str, created_at: i64) -> NewAccessLogEntry {
        NewAccessLogEntry {
            api_key_id: None,
            user_name: user.to_string(),
            tool: tool.to_string(),
            query: Some("invoice".to_string()),
            domain: Some("finance".to_string()),
            latency_ms: 42,
            chunks_returned: 3,
            chunks_considered: 10,
            access_level: AccessLevel::Internal,
            created_at,
        }
    }

    #[test]
    fn test_chunks_are_filtered_by_level_domain_and_module() {
        let test = create_test_store();
        let store = &test.store;
        let file = add_file(store, "finance/invoices.md", "finance", AccessLevel::Public);
        add_chunk(store, file, "finance", Some("billing"), AccessLevel::Public, "a");
        add_chunk(store, file, "finance", None, AccessLevel::Confidential, "b");
        add_chunk(store, file, "hr", Some(" "), AccessLevel::Public, "c");

        let public = store
            .list_chunks(&ChunkFilter {
                max_level: AccessLevel::Public,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(public.len(), 2);

        let finance = store
            .list_chunks(&ChunkFilter {
                domain: Some("finance".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(finance.len(), 2);

        let unknown = store
            .list_chunks(&ChunkFilter {
                module: Some(UNKNOWN_MODULE.to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(unknown.len(), 2);
        assert_eq!(unknown[0].entity_codes, vec!["ACC-1".to_string()]);

        let paged = store
            .list_chunks(&ChunkFilter {
                limit: Some(1),
                offset: 1,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].content, "b");
    }

    #[test]
    fn test_count_chunks_by_module_groups_missing_modules_as_unknown() {
        let test = create_test_store();
        let store = &test.store;
        let file = add_file(store, "a.md", "ops", AccessLevel::Public);
        add_chunk(store, file, "ops", Some("deploy"), AccessLevel::Public, "x");
        add_chunk(store, file, "ops", Some("deploy"), AccessLevel::Public, "y");
        add_chunk(store, file, "ops", None, AccessLevel::Public, "z");
        add_chunk(store, file, "ops", Some(""), AccessLevel::Public, "w");

        let counts = store.count_chunks_by_module().unwrap();
        assert_eq!(
            counts,
            vec![
                (UNKNOWN_MODULE.to_string(), 2),
                ("deploy".to_string(), 2)
            ]
        );
    }

    #[test]
    fn test_domain_summaries_respect_level() {
        let test = create_test_store();
        let store = &test.store;
        let f1 = add_file(store, "f1.md", "finance", AccessLevel::Public);
        let f2 = add_file(store, "f2.md", "legal", AccessLevel::Admin);
        add_chunk(store, f1, "finance", None, AccessLevel::Public, "a");
        add_chunk(store, f1, "finance", None, AccessLevel::Public, "b");
        add_chunk(store, f2, "legal", None, AccessLevel::Admin, "c");

        let summaries = store.domain_summaries(AccessLevel::Internal).unwrap();
        assert_eq!(
            summaries,
            vec![DomainSummary {
                domain: "finance".to_string(),
                files: 1,
                chunks: 2
            }]
        );
        assert_eq!(store.domain_summaries(AccessLevel::Admin).unwrap().len(), 2);
    }

    #[test]
    fn test_search_chunks_is_case_insensitive_and_level_filtered() {
        let test = create_test_store();
        let store = &test.store;
        let file = add_file(store, "docs/a.md", "finance", AccessLevel::Public);
        add_chunk(store, file, "finance", None, AccessLevel::Public, "Invoice totals");
        add_chunk(store, file, "finance", None, AccessLevel::Admin, "invoice secrets");
        add_chunk(store, file, "finance", None, AccessLevel::Public, "unrelated");

        let found = store
            .search_chunks("INVOICE", AccessLevel::Internal, None, 50)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file_path, "docs/a.md");
        assert_eq!(found[0].chunk.content, "Invoice totals");

        let admin = store
            .search_chunks("invoice", AccessLevel::Admin, Some("finance"), 50)
            .unwrap();
        assert_eq!(admin.len(), 2);

        let other_domain = store
            .search_chunks("invoice", AccessLevel::Admin, Some("hr"), 50)
            .unwrap();
        assert!(other_domain.is_empty());
    }

    #[test]
    fn test_search_folds_non_ascii_case() {
        let test = create_test_store();
        let store = &test.store;
        let file = add_file(store, "docs/de.md", "legal", AccessLevel::Public);
        add_chunk(store, file, "legal", None, AccessLevel::Public, "Über die Straße");

        for query in ["über", "ÜBER", "straße"] {
            let found = store
                .search_chunks(query, AccessLevel::Public, None, 50)
                .unwrap();
            assert_eq!(found.len(), 1, "query {:?}", query);
            assert_eq!(
                store
                    .count_chunk_matches(query, AccessLevel::Public, None)
                    .unwrap(),
                1
            );
        }
    }

    #[test]
    fn test_search_limit_keeps_highest_scoring_chunks() {
        let test = create_test_store();
        let store = &test.store;
        let file = add_file(store, "docs/tax.md", "finance", AccessLevel::Public);
        for _ in 0..3 {
            add_chunk(store, file, "finance", None, AccessLevel::Public, "tax once");
        }
        let best = add_chunk(store, file, "finance", None, AccessLevel::Public, "tax tax tax tax");
        let short = add_chunk(store, file, "finance", None, AccessLevel::Public, "tax tax");
        add_chunk(store, file, "finance", None, AccessLevel::Admin, "tax tax tax tax tax");

        let found = store
            .search_chunks("TAX", AccessLevel::Internal, None, 2)
            .unwrap();
        let ids: Vec<i64> = found.iter().map(|m| m.chunk.id).collect();
        assert_eq!(ids, vec![best, short]);
        assert_eq!(
            store
                .count_chunk_matches("TAX", AccessLevel::Internal, None)
                .unwrap(),
            5
        );
        assert_eq!(
            store
                .count_chunk_matches("tax", AccessLevel::Internal, Some("hr"))
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_search_treats_like_wildcards_literally() {
        let test = create_test_store();
        let store = &test.store;
        let file = add_file(store, "docs/a.md", "finance", AccessLevel::Public);
        add_chunk(store, file, "finance", None, AccessLevel::Public, "100% done");
        add_chunk(store, file, "finance", None, AccessLevel::Public, "1000 done");

        let found = store
            .search_chunks("0%", AccessLevel::Public, None, 50)
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_entities_upsert_and_edges() {
        let test = create_test_store();
        let store = &test.store;
        let mut entity = Entity {
            code: "ACC-1".to_string(),
            name: "Account".to_string(),
            entity_type: "table".to_string(),
            description: None,
            domain: Some("finance".to_string()),
            updated_at: 1,
        };
        store.upsert_entity(&entity).unwrap();
        entity.name = "Customer account".to_string();
        store.upsert_entity(&entity).unwrap();

        let loaded = store.get_entity("ACC-1").unwrap().unwrap();
        assert_eq!(loaded.name, "Customer account");
        assert!(store.get_entity("nope").unwrap().is_none());

        let edge = NewEntityEdge {
            source_code: "ACC-1".to_string(),
            target_code: "INV-1".to_string(),
            relationship: "owns".to_string(),
        };
        assert!(store.insert_edge(&edge).unwrap());
        assert!(!store.insert_edge(&edge).unwrap());
        store
            .insert_edge(&NewEntityEdge {
                source_code: "X".to_string(),
                target_code: "Y".to_string(),
                relationship: "uses".to_string(),
            })
            .unwrap();

        assert_eq!(store.list_edges().unwrap().len(), 2);
        assert_eq!(store.edges_for("INV-1").unwrap().len(), 1);

        let tables = store
            .list_entities(&EntityFilter {
                entity_type: Some("table".to_string()),
                domain: None,
            })
            .unwrap();
        assert_eq!(tables.len(), 1);
    }

    #[test]
    fn test_access_log_listing_and_pruning() {
        let test = create_test_store();
        let store = &test.store;
        store.record_access(&audit_entry("alice", "search", 100)).unwrap();
        store.record_access(&audit_entry("bob", "search", 200)).unwrap();
        store.record_access(&audit_entry("alice", "lookup", 300)).unwrap();

        let all = store
            .list_access_log(&AccessLogFilter::default(), 10, 0)
            .unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].created_at, 300);

        let alice = store
            .list_access_log(
                &AccessLogFilter {
                    user_name: Some("alice".to_string()),
                    ..Default::default()
                },
                10,
                0,
            )
            .unwrap();
        assert_eq!(alice.len(), 2);

        let since = store.access_log_since(200).unwrap();
        assert_eq!(since.len(), 2);
        assert_eq!(since[0].created_at, 200);
        assert_eq!(since[0].latency_ms, 42);
        assert_eq!(since[0].chunks_considered, 10);

        assert_eq!(store.prune_access_log_older_than(250).unwrap(), 2);
        assert_eq!(store.access_log_since(0).unwrap().len(), 1);
    }

    #[test]
    fn test_api_key_lifecycle() {
        let test = create_test_store();
        let store = &test.store;
        let id = store
            .insert_api_key(&NewApiKey {
                key_hash: "hash-1".to_string(),
                key_prefix: "mcpk_abcdefg".to_string(),
                owner: "ops".to_string(),
                description: Some("bootstrap".to_string()),
                access_level: AccessLevel::Admin,
            })
            .unwrap();

        let key = store.get_api_key_by_hash("hash-1").unwrap().unwrap();
        assert_eq!(key.id, id);
        assert!(key.is_active);
        assert_eq!(key.access_level, AccessLevel::Admin);
        assert_eq!(store.count_active_keys_at_level(AccessLevel::Admin).unwrap(), 1);

        assert!(store.set_api_key_active(id, false, 500).unwrap());
        let revoked = store.get_api_key(id).unwrap().unwrap();
        assert!(!revoked.is_active);
        assert_eq!(revoked.revoked_at, Some(500));
        assert_eq!(store.count_active_keys_at_level(AccessLevel::Admin).unwrap(), 0);

        assert!(store.set_api_key_active(id, true, 600).unwrap());
        assert_eq!(store.get_api_key(id).unwrap().unwrap().revoked_at, None);

        assert!(store
            .set_api_key_access_level(id, AccessLevel::Internal)
            .unwrap());
        assert!(!store
            .set_api_key_access_level(999, AccessLevel::Internal)
            .unwrap());

        store.touch_api_key(id, 700).unwrap();
        assert_eq!(store.get_api_key(id).unwrap().unwrap().last_used_at, Some(700));
        assert_eq!(store.list_api_keys().unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_key_hash_is_rejected() {
        let test = create_test_store();
        let store = &test.store;
        let key = NewApiKey {
            key_hash: "same".to_string(),
            key_prefix: "mcpk_x".to_string(),
            owner: "a".to_string(),
            description: None,
            access_level: AccessLevel::Public,
        };
        store.insert_api_key(&key).unwrap();
        assert!(store.insert_api_key(&key).is_err());
    }

    #[test]
    fn test_reopening_existing_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("knowledge.db");
        {
            let store = SqliteKnowledgeStore::new(&db_path).unwrap();
            add_file(&store, "a.md", "ops", AccessLevel::Public);
        }
        let store = SqliteKnowledgeStore::new(&db_path).unwrap();
        assert_eq!(
            store
                .list_knowledge_files(&FileFilter::default())
                .unwrap()
                .len(),
            1
        );
    }
}
