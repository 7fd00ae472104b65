//! Substring search over indexed chunks on behalf of an authenticated caller.
//! Results are restricted to the caller's access level and every query is
//! written to the audit log.

mod preview;

pub use preview::{count_occurrences, find_case_insensitive, make_preview, MIN_PREVIEW_GRAPHEMES};

use crate::access::AccessLevel;
use crate::knowledge_store::{
    AuditLogStore, ChunkMatch, ChunkStore, KnowledgeStore, NewAccessLogEntry,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_TOOL: &str = "search_knowledge";

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub preview_graphemes: usize,
    /// Upper bound on ranked rows read from the store.
    pub candidate_limit: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            max_top_k: 20,
            preview_graphemes: 300,
            candidate_limit: 500,
        }
    }
}

impl SearchSettings {
    pub fn clamp_top_k(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_top_k)
            .clamp(1, self.max_top_k.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Who is searching. Built from the authenticated API key.
#[derive(Debug, Clone)]
pub struct SearchCaller {
    pub api_key_id: Option<i64>,
    pub user_name: String,
    pub access_level: AccessLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub chunk_id: i64,
    pub file_path: String,
    pub domain: String,
    pub module: String,
    pub content_type: String,
    pub access_level: AccessLevel,
    pub score: usize,
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub tool: String,
    pub access_level: AccessLevel,
    pub total_matches: usize,
    pub results: Vec<SearchHit>,
    pub latency_ms: u64,
}

struct ScoredMatch {
    score: usize,
    matched: ChunkMatch,
}

fn compare_scored(a: &ScoredMatch, b: &ScoredMatch) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.matched.chunk.content.len().cmp(&b.matched.chunk.content.len()))
        .then_with(|| a.matched.chunk.id.cmp(&b.matched.chunk.id))
}

/// Orders candidates by occurrence count, then shorter content, then id.
pub fn rank_matches(query: &str, candidates: Vec<ChunkMatch>) -> Vec<(usize, ChunkMatch)> {
    let mut scored: Vec<ScoredMatch> = candidates
        .into_iter()
        .map(|matched| ScoredMatch {
            score: count_occurrences(&matched.chunk.content, query),
            matched,
        })
        .collect();
    scored.sort_by(compare_scored);
    scored.into_iter().map(|s| (s.score, s.matched)).collect()
}

fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub struct KnowledgeSearcher {
    store: Arc<dyn KnowledgeStore>,
    settings: SearchSettings,
}

impl KnowledgeSearcher {
    pub fn new(store: Arc<dyn KnowledgeStore>, settings: SearchSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    pub fn search(
        &self,
        caller: &SearchCaller,
        request: &SearchRequest,
    ) -> Result<SearchResponse, SearchError> {
        let start = Instant::now();
        let query = request.query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let tool = normalize_optional(request.tool.as_deref()).unwrap_or_else(|| DEFAULT_TOOL.to_string());
        let domain = normalize_optional(request.domain.as_deref());
        let top_k = self.settings.clamp_top_k(request.top_k);

        let total_matches =
            self.store
                .count_chunk_matches(query, caller.access_level, domain.as_deref())?;
        let candidates = self.store.search_chunks(
            query,
            caller.access_level,
            domain.as_deref(),
            self.settings.candidate_limit.max(top_k),
        )?;
        let results: Vec<SearchHit> = rank_matches(query, candidates)
            .into_iter()
            .take(top_k)
            .map(|(score, matched)| SearchHit {
                preview: make_preview(&matched.chunk.content, query, self.settings.preview_graphemes),
                module: matched.chunk.module_name().to_string(),
                chunk_id: matched.chunk.id,
                file_path: matched.file_path,
                domain: matched.chunk.domain,
                content_type: matched.chunk.content_type,
                access_level: matched.chunk.access_level,
                score,
            })
            .collect();
        let latency_ms = start.elapsed().as_millis() as u64;

        let entry = NewAccessLogEntry {
            api_key_id: caller.api_key_id,
            user_name: caller.user_name.clone(),
            tool: tool.clone(),
            query: Some(query.to_string()),
            domain,
            latency_ms,
            chunks_returned: results.len() as u32,
            chunks_considered: total_matches as u32,
            access_level: caller.access_level,
            created_at: chrono::Utc::now().timestamp(),
        };
        // A failed audit write does not fail the search itself.
        if let Err(err) = self.store.record_access(&entry) {
            warn!("Failed to record audit entry for {}: {}", caller.user_name, err);
        }
        debug!(
            "{} searched {:?} via {}: {} of {} matches",
            caller.user_name,
            query,
            tool,
            results.len(),
            total_matches
        );

        Ok(SearchResponse {
            query: query.to_string(),
            tool,
            access_level: caller.access_level,
            total_matches,
            results,
            latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge_store::{
        AccessLogFilter, AuditLogStore, ChunkStore, NewChunk, NewKnowledgeFile, SqliteKnowledgeStore,
    };

    fn create_searcher() -> (Arc<SqliteKnowledgeStore>, KnowledgeSearcher) {
        let store = Arc::new(SqliteKnowledgeStore::in_memory().unwrap());
        let searcher = KnowledgeSearcher::new(store.clone(), SearchSettings::default());
        (store, searcher)
    }

    fn add_chunk(store: &SqliteKnowledgeStore, path: &str, domain: &str, level: AccessLevel, content: &str) -> i64 {
        let file_id = store
            .insert_knowledge_file(&NewKnowledgeFile {
                path: path.to_string(),
                domain: domain.to_string(),
                content_type: "markdown".to_string(),
                access_level: level,
                title: None,
                updated_at: 1_700_000_000,
            })
            .unwrap();
        store
            .insert_chunk(&NewChunk {
                file_id,
                domain: domain.to_string(),
                module: None,
                content_type: "markdown".to_string(),
                access_level: level,
                content: content.to_string(),
                entity_codes: vec![],
                created_at: 1_700_000_000,
            })
            .unwrap()
    }

    fn caller(level: AccessLevel) -> SearchCaller {
        SearchCaller {
            api_key_id: None,
            user_name: "alice".to_string(),
            access_level: level,
        }
    }

    fn request(query: &str) -> SearchRequest {
        SearchRequest {
            query: query.to_string(),
            tool: None,
            domain: None,
            top_k: None,
        }
    }

    #[test]
    fn top_k_defaults_and_clamps() {
        let settings = SearchSettings::default();
        assert_eq!(settings.clamp_top_k(None), 5);
        assert_eq!(settings.clamp_top_k(Some(0)), 1);
        assert_eq!(settings.clamp_top_k(Some(7)), 7);
        assert_eq!(settings.clamp_top_k(Some(500)), 20);
    }

    #[test]
    fn empty_query_is_rejected() {
        let (_store, searcher) = create_searcher();
        let result = searcher.search(&caller(AccessLevel::Admin), &request("   "));
        assert!(matches!(result, Err(SearchError::EmptyQuery)));
    }

    #[test]
    fn ranks_by_occurrences_then_length_then_id() {
        let (store, searcher) = create_searcher();
        let once_long = add_chunk(&store, "a.md", "finance", AccessLevel::Public, "invoice and a long tail of text");
        let twice = add_chunk(&store, "b.md", "finance", AccessLevel::Public, "invoice invoice");
        let once_short = add_chunk(&store, "c.md", "finance", AccessLevel::Public, "Invoice");
        add_chunk(&store, "d.md", "finance", AccessLevel::Public, "unrelated");

        let response = searcher.search(&caller(AccessLevel::Public), &request("invoice")).unwrap();
        let ids: Vec<i64> = response.results.iter().map(|h| h.chunk_id).collect();
        assert_eq!(ids, vec![twice, once_short, once_long]);
        assert_eq!(response.results[0].score, 2);
        assert_eq!(response.total_matches, 3);
        assert_eq!(response.tool, DEFAULT_TOOL);
        assert_eq!(response.results[0].module, "Unknown");
    }

    #[test]
    fn best_match_wins_even_past_the_candidate_limit() {
        let store = Arc::new(SqliteKnowledgeStore::in_memory().unwrap());
        let settings = SearchSettings {
            candidate_limit: 3,
            ..SearchSettings::default()
        };
        let searcher = KnowledgeSearcher::new(store.clone(), settings);
        for i in 0..3 {
            add_chunk(&store, &format!("once{i}.md"), "finance", AccessLevel::Public, "tax once");
        }
        let best = add_chunk(&store, "many.md", "finance", AccessLevel::Public, "tax tax tax tax");

        let mut req = request("tax");
        req.top_k = Some(1);
        let response = searcher.search(&caller(AccessLevel::Public), &req).unwrap();
        assert_eq!(response.total_matches, 4);
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].chunk_id, best);
        assert_eq!(response.results[0].score, 4);

        let log = store.list_access_log(&AccessLogFilter::default(), 10, 0).unwrap();
        assert_eq!(log[0].chunks_considered, 4);
    }

    #[test]
    fn matches_non_ascii_text_regardless_of_case() {
        let (store, searcher) = create_searcher();
        let id = add_chunk(&store, "de.md", "legal", AccessLevel::Public, "Über die Straße");

        let response = searcher.search(&caller(AccessLevel::Public), &request("über")).unwrap();
        assert_eq!(response.total_matches, 1);
        assert_eq!(response.results[0].chunk_id, id);
        assert_eq!(response.results[0].preview, "Über die Straße");
    }

    #[test]
    fn results_are_limited_to_callers_level() {
        let (store, searcher) = create_searcher();
        add_chunk(&store, "public.md", "finance", AccessLevel::Public, "budget");
        add_chunk(&store, "secret.md", "finance", AccessLevel::Confidential, "budget");

        let internal = searcher.search(&caller(AccessLevel::Internal), &request("budget")).unwrap();
        assert_eq!(internal.total_matches, 1);
        assert_eq!(internal.results[0].file_path, "public.md");

        let confidential = searcher
            .search(&caller(AccessLevel::Confidential), &request("budget"))
            .unwrap();
        assert_eq!(confidential.total_matches, 2);
    }

    #[test]
    fn domain_filter_and_top_k_apply() {
        let (store, searcher) = create_searcher();
        for i in 0..4 {
            add_chunk(&store, &format!("f{i}.md"), "finance", AccessLevel::Public, "ledger");
        }
        add_chunk(&store, "hr.md", "hr", AccessLevel::Public, "ledger");

        let mut req = request("ledger");
        req.domain = Some("finance".to_string());
        req.top_k = Some(2);
        let response = searcher.search(&caller(AccessLevel::Public), &req).unwrap();
        assert_eq!(response.total_matches, 4);
        assert_eq!(response.results.len(), 2);
        assert!(response.results.iter().all(|h| h.domain == "finance"));
    }

    #[test]
    fn every_search_is_audited() {
        let (store, searcher) = create_searcher();
        add_chunk(&store, "a.md", "finance", AccessLevel::Public, "tax rules");

        let mut req = request("tax");
        req.tool = Some("lookup_entity".to_string());
        req.domain = Some("finance".to_string());
        searcher.search(&caller(AccessLevel::Internal), &req).unwrap();
        searcher.search(&caller(AccessLevel::Internal), &request("nothing-matches")).unwrap();

        let log = store.list_access_log(&AccessLogFilter::default(), 10, 0).unwrap();
        assert_eq!(log.len(), 2);
        let tax = log.iter().find(|e| e.query.as_deref() == Some("tax")).unwrap();
        assert_eq!(tax.tool, "lookup_entity");
        assert_eq!(tax.domain.as_deref(), Some("finance"));
        assert_eq!(tax.chunks_returned, 1);
        assert_eq!(tax.user_name, "alice");
        assert_eq!(tax.access_level, AccessLevel::Internal);
        let miss = log.iter().find(|e| e.query.as_deref() == Some("nothing-matches")).unwrap();
        assert_eq!(miss.chunks_returned, 0);
        assert_eq!(miss.domain, None);
    }

    #[test]
    fn long_chunks_get_bounded_previews() {
        let (store, searcher) = create_searcher();
        let content = format!("{} needle {}", "x".repeat(2_000), "y".repeat(2_000));
        add_chunk(&store, "big.md", "finance", AccessLevel::Public, &content);
        let response = searcher.search(&caller(AccessLevel::Public), &request("needle")).unwrap();
        let preview = &response.results[0].preview;
        assert!(preview.chars().count() <= 300);
        assert!(preview.contains("needle"));
    }
}
