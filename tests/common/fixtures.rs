//! Test fixture creation for the knowledge database
//!
//! Seeds files, chunks, entities, edges, audit rows and one API key per
//! access level through the store traits.

use super::constants::*;
use anyhow::Result;
use knowledge_admin_server::access::{hash_api_key, AccessLevel, DISPLAY_PREFIX_LENGTH};
use knowledge_admin_server::knowledge_store::{
    ApiKeyStore, AuditLogStore, ChunkStore, Entity, EntityGraphStore, NewAccessLogEntry,
    NewApiKey, NewChunk, NewEntityEdge, NewKnowledgeFile, SqliteKnowledgeStore,
};
use std::path::PathBuf;
use tempfile::TempDir;

const DAY: i64 = 86_400;

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn insert_key(store: &SqliteKnowledgeStore, plaintext: &str, owner: &str, level: AccessLevel) -> Result<i64> {
    store.insert_api_key(&NewApiKey {
        key_hash: hash_api_key(plaintext),
        key_prefix: plaintext[..DISPLAY_PREFIX_LENGTH].to_string(),
        owner: owner.to_string(),
        description: Some(format!("{} test key", level)),
        access_level: level,
    })
}

fn seed_knowledge(store: &SqliteKnowledgeStore, now: i64) -> Result<()> {
    let invoices = store.insert_knowledge_file(&NewKnowledgeFile {
        path: INVOICES_PATH.to_string(),
        domain: BILLING_DOMAIN.to_string(),
        content_type: "doc".to_string(),
        access_level: AccessLevel::Public,
        title: Some("Invoices".to_string()),
        updated_at: now - DAY,
    })?;
    let ledger = store.insert_knowledge_file(&NewKnowledgeFile {
        path: LEDGER_PATH.to_string(),
        domain: BILLING_DOMAIN.to_string(),
        content_type: "doc".to_string(),
        access_level: AccessLevel::Confidential,
        title: Some("Ledger".to_string()),
        updated_at: now - 200 * DAY,
    })?;
    let policies = store.insert_knowledge_file(&NewKnowledgeFile {
        path: POLICIES_PATH.to_string(),
        domain: HR_DOMAIN.to_string(),
        content_type: "policy".to_string(),
        access_level: AccessLevel::Internal,
        title: None,
        updated_at: now - 10 * DAY,
    })?;

    let chunks = [
        (
            invoices,
            BILLING_DOMAIN,
            Some("Invoicing"),
            AccessLevel::Public,
            "Invoices are generated monthly. The invoice total includes tax.",
            vec![INVOICE_ENTITY],
        ),
        (
            invoices,
            BILLING_DOMAIN,
            Some("Invoicing"),
            AccessLevel::Public,
            "Late invoice reminders are sent after thirty days.",
            vec![INVOICE_ENTITY, CUSTOMER_ENTITY],
        ),
        (
            ledger,
            BILLING_DOMAIN,
            Some("Ledger"),
            AccessLevel::Confidential,
            "The ledger reconciles every invoice against incoming payments.",
            vec![LEDGER_ENTITY],
        ),
        (
            policies,
            HR_DOMAIN,
            None,
            AccessLevel::Internal,
            "Vacation policy: employees accrue leave monthly.",
            vec![],
        ),
    ];
    for (file_id, domain, module, level, content, codes) in chunks {
        store.insert_chunk(&NewChunk {
            file_id,
            domain: domain.to_string(),
            module: module.map(str::to_string),
            content_type: "doc".to_string(),
            access_level: level,
            content: content.to_string(),
            entity_codes: codes.into_iter().map(str::to_string).collect(),
            created_at: now - DAY,
        })?;
    }

    let entities = [
        (INVOICE_ENTITY, "Invoice", "document", Some(BILLING_DOMAIN)),
        (CUSTOMER_ENTITY, "Customer", "party", Some(BILLING_DOMAIN)),
        (LEDGER_ENTITY, "Ledger", "document", Some(BILLING_DOMAIN)),
        (EMPLOYEE_ENTITY, "Employee", "party", Some(HR_DOMAIN)),
    ];
    for (code, name, entity_type, domain) in entities {
        store.upsert_entity(&Entity {
            code: code.to_string(),
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            description: None,
            domain: domain.map(str::to_string),
            updated_at: now - DAY,
        })?;
    }

    let edges = [
        (INVOICE_ENTITY, CUSTOMER_ENTITY, "billed_to"),
        (LEDGER_ENTITY, INVOICE_ENTITY, "records"),
        (INVOICE_ENTITY, PAYMENT_ENTITY, "settled_by"),
    ];
    for (source, target, relationship) in edges {
        store.insert_edge(&NewEntityEdge {
            source_code: source.to_string(),
            target_code: target.to_string(),
            relationship: relationship.to_string(),
        })?;
    }

    Ok(())
}

fn seed_audit_log(store: &SqliteKnowledgeStore, now: i64) -> Result<()> {
    let rows = [
        ("alice", "search_knowledge", Some(BILLING_DOMAIN), 100, 2),
        ("alice", "search_knowledge", Some(BILLING_DOMAIN), 200, 0),
        ("bob", "get_entity", Some(HR_DOMAIN), 300, 1),
    ];
    for (user, tool, domain, latency_ms, chunks_returned) in rows {
        store.record_access(&NewAccessLogEntry {
            api_key_id: None,
            user_name: user.to_string(),
            tool: tool.to_string(),
            query: Some("invoice".to_string()),
            domain: domain.map(str::to_string),
            latency_ms,
            chunks_returned,
            chunks_considered: chunks_returned,
            access_level: AccessLevel::Internal,
            created_at: now - 60,
        })?;
    }
    Ok(())
}

/// Creates a temporary database directory with a fully seeded knowledge.db
/// Returns (temp_dir, db_path)
pub fn create_test_db() -> Result<(TempDir, PathBuf)> {
    let dir = TempDir::new()?;
    let db_path = dir.path().join("knowledge.db");
    let store = SqliteKnowledgeStore::new(&db_path)?;
    let now = now();

    seed_knowledge(&store, now)?;
    seed_audit_log(&store, now)?;

    insert_key(&store, PUBLIC_KEY, PUBLIC_OWNER, AccessLevel::Public)?;
    insert_key(&store, INTERNAL_KEY, INTERNAL_OWNER, AccessLevel::Internal)?;
    insert_key(&store, CONFIDENTIAL_KEY, CONFIDENTIAL_OWNER, AccessLevel::Confidential)?;
    insert_key(&store, ADMIN_KEY, ADMIN_OWNER, AccessLevel::Admin)?;

    Ok((dir, db_path))
}
