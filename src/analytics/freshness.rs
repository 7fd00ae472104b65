use crate::graph::EntityGraph;
use crate::knowledge_store::{AccessLogEntry, DomainSummary, Entity, EntityEdge, KnowledgeFile};
use serde::Serialize;
use std::collections::BTreeMap;

pub const DEFAULT_STALE_AFTER_DAYS: u32 = 90;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleFile {
    pub id: i64,
    pub path: String,
    pub domain: String,
    pub updated_at: i64,
    pub age_days: i64,
}

/// Files not updated for more than `stale_after_days`, oldest first.
pub fn stale_files(files: &[KnowledgeFile], now: i64, stale_after_days: u32) -> Vec<StaleFile> {
    let cutoff = now - stale_after_days as i64 * SECONDS_PER_DAY;
    let mut stale: Vec<StaleFile> = files
        .iter()
        .filter(|file| file.updated_at < cutoff)
        .map(|file| StaleFile {
            id: file.id,
            path: file.path.clone(),
            domain: file.domain.clone(),
            updated_at: file.updated_at,
            age_days: (now - file.updated_at) / SECONDS_PER_DAY,
        })
        .collect();
    stale.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.path.cmp(&b.path)));
    stale
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanEntity {
    pub code: String,
    pub name: String,
    pub entity_type: String,
}

pub fn orphan_entities(entities: Vec<Entity>, edges: Vec<EntityEdge>) -> Vec<OrphanEntity> {
    let graph = EntityGraph::from_edges(entities, edges);
    graph
        .orphans()
        .into_iter()
        .map(|entity| OrphanEntity {
            code: entity.code.clone(),
            name: entity.name.clone(),
            entity_type: entity.entity_type.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainActivity {
    pub domain: String,
    pub chunk_count: usize,
    pub queries: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HotColdDomains {
    pub hot: Vec<DomainActivity>,
    pub cold: Vec<DomainActivity>,
}

/// Hot domains are the top quartile by query count (at least one domain when
/// anything was queried). Cold domains hold chunks but saw no queries.
pub fn hot_cold_domains(domains: &[DomainSummary], entries: &[AccessLogEntry]) -> HotColdDomains {
    let mut activity: BTreeMap<String, DomainActivity> = domains
        .iter()
        .map(|summary| {
            (
                summary.domain.clone(),
                DomainActivity {
                    domain: summary.domain.clone(),
                    chunk_count: summary.chunks,
                    queries: 0,
                },
            )
        })
        .collect();
    for domain in entries.iter().filter_map(|entry| entry.domain.as_deref()) {
        activity
            .entry(domain.to_string())
            .or_insert_with(|| DomainActivity {
                domain: domain.to_string(),
                chunk_count: 0,
                queries: 0,
            })
            .queries += 1;
    }

    let mut queried: Vec<DomainActivity> = activity
        .values()
        .filter(|a| a.queries > 0)
        .cloned()
        .collect();
    queried.sort_by(|a, b| b.queries.cmp(&a.queries).then_with(|| a.domain.cmp(&b.domain)));
    let hot_count = queried.len().div_ceil(4);
    let hot = match queried.get(hot_count.saturating_sub(1)) {
        // ties with the last hot domain are hot too
        Some(last_hot) => {
            let threshold = last_hot.queries;
            queried.into_iter().take_while(|a| a.queries >= threshold).collect()
        }
        None => Vec::new(),
    };

    let cold = activity
        .into_values()
        .filter(|a| a.chunk_count > 0 && a.queries == 0)
        .collect();

    HotColdDomains { hot, cold }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FreshnessReport {
    pub stale_after_days: u32,
    pub stale_files: Vec<StaleFile>,
    pub orphan_entities: Vec<OrphanEntity>,
    pub hot_domains: Vec<DomainActivity>,
    pub cold_domains: Vec<DomainActivity>,
}

pub struct FreshnessInput<'a> {
    pub files: &'a [KnowledgeFile],
    pub entities: Vec<Entity>,
    pub edges: Vec<EntityEdge>,
    pub domains: &'a [DomainSummary],
    pub entries: &'a [AccessLogEntry],
}

pub fn freshness_report(input: FreshnessInput<'_>, now: i64, stale_after_days: u32) -> FreshnessReport {
    let HotColdDomains { hot, cold } = hot_cold_domains(input.domains, input.entries);
    FreshnessReport {
        stale_after_days,
        stale_files: stale_files(input.files, now, stale_after_days),
        orphan_entities: orphan_entities(input.entities, input.edges),
        hot_domains: hot,
        cold_domains: cold,
    }
}
