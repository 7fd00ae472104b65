//! SQLite schema definitions for the knowledge store.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};
use anyhow::Result;
use rusqlite::Connection;

const KNOWLEDGE_FILE_FK: ForeignKey = ForeignKey {
    foreign_table: "knowledge_files",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const API_KEY_FK: ForeignKey = ForeignKey {
    foreign_table: "api_keys",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::SetNull,
};

const KNOWLEDGE_FILES_TABLE_V1: Table = Table {
    name: "knowledge_files",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!("path", SqlType::Text, non_null = true),
        sqlite_column!("domain", SqlType::Text, non_null = true),
        sqlite_column!("content_type", SqlType::Text, non_null = true),
        sqlite_column!("access_level", SqlType::Integer, non_null = true),
        sqlite_column!("title", SqlType::Text),
        sqlite_column!("updated_at", SqlType::Integer, non_null = true),
        sqlite_column!(
            "created_at",
            SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_knowledge_files_domain", "domain")],
    unique_constraints: &[&["path"]],
};

const CHUNKS_TABLE_V1: Table = Table {
    name: "chunks",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "file_id",
            SqlType::Integer,
            non_null = true,
            foreign_key = Some(&KNOWLEDGE_FILE_FK)
        ),
        sqlite_column!("domain", SqlType::Text, non_null = true),
        sqlite_column!("content_type", SqlType::Text, non_null = true),
        sqlite_column!("access_level", SqlType::Integer, non_null = true),
        sqlite_column!("content", SqlType::Text, non_null = true),
        sqlite_column!(
            "entity_codes",
            SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!(
            "created_at",
            SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_chunks_file_id", "file_id"),
        ("idx_chunks_domain", "domain"),
    ],
    unique_constraints: &[],
};

/// V2 adds the nullable `module` column, appended by ALTER TABLE.
const CHUNKS_TABLE_V2: Table = Table {
    name: "chunks",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "file_id",
            SqlType::Integer,
            non_null = true,
            foreign_key = Some(&KNOWLEDGE_FILE_FK)
        ),
        sqlite_column!("domain", SqlType::Text, non_null = true),
        sqlite_column!("content_type", SqlType::Text, non_null = true),
        sqlite_column!("access_level", SqlType::Integer, non_null = true),
        sqlite_column!("content", SqlType::Text, non_null = true),
        sqlite_column!(
            "entity_codes",
            SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!(
            "created_at",
            SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("module", SqlType::Text),
    ],
    indices: &[
        ("idx_chunks_file_id", "file_id"),
        ("idx_chunks_domain", "domain"),
        ("idx_chunks_module", "module"),
    ],
    unique_constraints: &[],
};

const ENTITIES_TABLE_V1: Table = Table {
    name: "entities",
    columns: &[
        sqlite_column!("code", SqlType::Text, is_primary_key = true),
        sqlite_column!("name", SqlType::Text, non_null = true),
        sqlite_column!("entity_type", SqlType::Text, non_null = true),
        sqlite_column!("description", SqlType::Text),
        sqlite_column!("domain", SqlType::Text),
        sqlite_column!("updated_at", SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_entities_type", "entity_type")],
    unique_constraints: &[],
};

/// Edges may point at codes without an entity row, so there is no foreign key here.
const ENTITY_EDGES_TABLE_V1: Table = Table {
    name: "entity_edges",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!("source_code", SqlType::Text, non_null = true),
        sqlite_column!("target_code", SqlType::Text, non_null = true),
        sqlite_column!("relationship", SqlType::Text, non_null = true),
        sqlite_column!(
            "created_at",
            SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_entity_edges_source", "source_code"),
        ("idx_entity_edges_target", "target_code"),
    ],
    unique_constraints: &[&["source_code", "target_code", "relationship"]],
};

const API_KEYS_TABLE_V1: Table = Table {
    name: "api_keys",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!("key_hash", SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("key_prefix", SqlType::Text, non_null = true),
        sqlite_column!("owner", SqlType::Text, non_null = true),
        sqlite_column!("description", SqlType::Text),
        sqlite_column!("access_level", SqlType::Integer, non_null = true),
        sqlite_column!(
            "is_active",
            SqlType::Integer,
            non_null = true,
            default_value = Some("1")
        ),
        sqlite_column!(
            "created_at",
            SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_used_at", SqlType::Integer),
        sqlite_column!("revoked_at", SqlType::Integer),
    ],
    indices: &[("idx_api_keys_owner", "owner")],
    unique_constraints: &[],
};

const ACCESS_AUDIT_LOG_TABLE_V1: Table = Table {
    name: "access_audit_log",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "api_key_id",
            SqlType::Integer,
            foreign_key = Some(&API_KEY_FK)
        ),
        sqlite_column!("user_name", SqlType::Text, non_null = true),
        sqlite_column!("tool", SqlType::Text, non_null = true),
        sqlite_column!("query", SqlType::Text),
        sqlite_column!("domain", SqlType::Text),
        sqlite_column!("latency_ms", SqlType::Integer, non_null = true),
        sqlite_column!("chunks_returned", SqlType::Integer, non_null = true),
        sqlite_column!(
            "chunks_considered",
            SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("access_level", SqlType::Integer, non_null = true),
        sqlite_column!(
            "created_at",
            SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_access_audit_log_created_at", "created_at"),
        ("idx_access_audit_log_user", "user_name"),
        ("idx_access_audit_log_tool", "tool"),
    ],
    unique_constraints: &[],
};

fn migrate_v1_to_v2(conn: &Connection) -> Result<()> {
    conn.execute("ALTER TABLE chunks ADD COLUMN module TEXT", [])?;
    conn.execute("CREATE INDEX idx_chunks_module ON chunks(module)", [])?;
    Ok(())
}

pub const KNOWLEDGE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[
            KNOWLEDGE_FILES_TABLE_V1,
            CHUNKS_TABLE_V1,
            ENTITIES_TABLE_V1,
            ENTITY_EDGES_TABLE_V1,
            API_KEYS_TABLE_V1,
            ACCESS_AUDIT_LOG_TABLE_V1,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 2,
        tables: &[
            KNOWLEDGE_FILES_TABLE_V1,
            CHUNKS_TABLE_V2,
            ENTITIES_TABLE_V1,
            ENTITY_EDGES_TABLE_V1,
            API_KEYS_TABLE_V1,
            ACCESS_AUDIT_LOG_TABLE_V1,
        ],
        migration: Some(migrate_v1_to_v2),
    },
];
