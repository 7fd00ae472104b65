use crate::access::AccessLevel;
use serde::{Deserialize, Serialize};

/// Module name that chunks without a module aggregate under.
pub const UNKNOWN_MODULE: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeFile {
    pub id: i64,
    pub path: String,
    pub domain: String,
    pub content_type: String,
    pub access_level: AccessLevel,
    pub title: Option<String>,
    pub updated_at: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewKnowledgeFile {
    pub path: String,
    pub domain: String,
    pub content_type: String,
    pub access_level: AccessLevel,
    pub title: Option<String>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: i64,
    pub file_id: i64,
    pub domain: String,
    pub module: Option<String>,
    pub content_type: String,
    pub access_level: AccessLevel,
    pub content: String,
    pub entity_codes: Vec<String>,
    pub created_at: i64,
}

impl Chunk {
    /// The module this chunk aggregates under, `"Unknown"` when absent or blank.
    pub fn module_name(&self) -> &str {
        normalize_module(self.module.as_deref())
    }

    pub fn references(&self, entity_code: &str) -> bool {
        self.entity_codes.iter().any(|code| code == entity_code)
    }
}

pub fn normalize_module(module: Option<&str>) -> &str {
    match module.map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => UNKNOWN_MODULE,
    }
}

/// Entity codes are stored as a comma separated list.
pub fn join_entity_codes(codes: &[String]) -> String {
    codes
        .iter()
        .map(|code| code.trim())
        .filter(|code| !code.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn split_entity_codes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct NewChunk {
    pub file_id: i64,
    pub domain: String,
    pub module: Option<String>,
    pub content_type: String,
    pub access_level: AccessLevel,
    pub content: String,
    pub entity_codes: Vec<String>,
    pub created_at: i64,
}

/// A chunk returned by a substring search, joined with its file path.
#[derive(Debug, Clone)]
pub struct ChunkMatch {
    pub chunk: Chunk,
    pub file_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainSummary {
    pub domain: String,
    pub files: usize,
    pub chunks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub code: String,
    pub name: String,
    pub entity_type: String,
    pub description: Option<String>,
    pub domain: Option<String>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityEdge {
    pub id: i64,
    pub source_code: String,
    pub target_code: String,
    pub relationship: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewEntityEdge {
    pub source_code: String,
    pub target_code: String,
    pub relationship: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessLogEntry {
    pub id: i64,
    pub api_key_id: Option<i64>,
    pub user_name: String,
    pub tool: String,
    pub query: Option<String>,
    pub domain: Option<String>,
    pub latency_ms: u64,
    pub chunks_returned: u32,
    pub chunks_considered: u32,
    pub access_level: AccessLevel,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewAccessLogEntry {
    pub api_key_id: Option<i64>,
    pub user_name: String,
    pub tool: String,
    pub query: Option<String>,
    pub domain: Option<String>,
    pub latency_ms: u64,
    pub chunks_returned: u32,
    pub chunks_considered: u32,
    pub access_level: AccessLevel,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiKey {
    pub id: i64,
    #[serde(skip)]
    pub key_hash: String,
    pub key_prefix: String,
    pub owner: String,
    pub description: Option<String>,
    pub access_level: AccessLevel,
    pub is_active: bool,
    pub created_at: i64,
    pub last_used_at: Option<i64>,
    pub revoked_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub key_hash: String,
    pub key_prefix: String,
    pub owner: String,
    pub description: Option<String>,
    pub access_level: AccessLevel,
}

#[derive(Debug, Clone)]
pub struct FileFilter {
    pub domain: Option<String>,
    pub content_type: Option<String>,
    pub max_level: AccessLevel,
}

impl Default for FileFilter {
    fn default() -> Self {
        Self {
            domain: None,
            content_type: None,
            max_level: AccessLevel::Admin,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChunkFilter {
    pub domain: Option<String>,
    /// `Some("Unknown")` matches chunks without a module.
    pub module: Option<String>,
    pub content_type: Option<String>,
    pub max_level: AccessLevel,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Default for ChunkFilter {
    fn default() -> Self {
        Self {
            domain: None,
            module: None,
            content_type: None,
            max_level: AccessLevel::Admin,
            limit: None,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    pub entity_type: Option<String>,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AccessLogFilter {
    pub user_name: Option<String>,
    pub tool: Option<String>,
    pub since: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_or_missing_module_is_unknown() {
        assert_eq!(normalize_module(None), UNKNOWN_MODULE);
        assert_eq!(normalize_module(Some("  ")), UNKNOWN_MODULE);
        assert_eq!(normalize_module(Some("billing")), "billing");
        assert_eq!(normalize_module(Some(" billing ")), "billing");
    }

    #[test]
    fn entity_codes_are_trimmed_and_skip_empty_entries() {
        assert_eq!(
            split_entity_codes(" ACC-1, ,INV-2,"),
            vec!["ACC-1".to_string(), "INV-2".to_string()]
        );
        assert!(split_entity_codes("").is_empty());
        assert_eq!(
            join_entity_codes(&["A".to_string(), " ".to_string(), "B ".to_string()]),
            "A,B"
        );
    }
}
