use super::usage::NO_DOMAIN;
use crate::knowledge_store::{AccessLogEntry, Chunk, Entity, UNKNOWN_MODULE};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

pub const DEFAULT_COVERAGE_THRESHOLD: usize = 10;

/// Share of zero-result queries above which a domain is reported.
const ZERO_RESULT_RATE_THRESHOLD: f64 = 0.5;

/// A module is a gap when it has fewer chunks than `threshold`. The "Unknown"
/// bucket collects unclassified chunks and is never a gap.
pub fn is_coverage_gap(module: &str, chunk_count: usize, threshold: usize) -> bool {
    module != UNKNOWN_MODULE && chunk_count < threshold
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleCoverage {
    pub module: String,
    pub chunk_count: usize,
    pub is_gap: bool,
}

/// Modules ordered from least to most covered.
pub fn module_coverage(module_counts: &[(String, usize)], threshold: usize) -> Vec<ModuleCoverage> {
    let mut coverage: Vec<ModuleCoverage> = module_counts
        .iter()
        .map(|(module, count)| ModuleCoverage {
            module: module.clone(),
            chunk_count: *count,
            is_gap: is_coverage_gap(module, *count, threshold),
        })
        .collect();
    coverage.sort_by(|a, b| {
        a.chunk_count
            .cmp(&b.chunk_count)
            .then_with(|| a.module.cmp(&b.module))
    });
    coverage
}

pub fn module_chunk_counts(chunks: &[Chunk]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for chunk in chunks {
        *counts.entry(chunk.module_name()).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(module, count)| (module.to_string(), count))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityGap {
    pub code: String,
    pub name: String,
    pub entity_type: String,
}

/// Entities that no chunk references.
pub fn unreferenced_entities(entities: &[Entity], chunks: &[Chunk]) -> Vec<EntityGap> {
    let referenced: HashSet<&str> = chunks
        .iter()
        .flat_map(|chunk| chunk.entity_codes.iter().map(String::as_str))
        .collect();
    entities
        .iter()
        .filter(|entity| !referenced.contains(entity.code.as_str()))
        .map(|entity| EntityGap {
            code: entity.code.clone(),
            name: entity.name.clone(),
            entity_type: entity.entity_type.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZeroResultDomain {
    pub domain: String,
    pub queries: u64,
    pub zero_result_queries: u64,
    pub zero_result_rate: f64,
}

/// Domains where more than half of the queries returned no chunks.
pub fn zero_result_domains(entries: &[AccessLogEntry]) -> Vec<ZeroResultDomain> {
    let mut per_domain: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for entry in entries {
        let domain = entry.domain.as_deref().unwrap_or(NO_DOMAIN);
        let counts = per_domain.entry(domain).or_default();
        counts.0 += 1;
        if entry.chunks_returned == 0 {
            counts.1 += 1;
        }
    }
    let mut result: Vec<ZeroResultDomain> = per_domain
        .into_iter()
        .filter_map(|(domain, (queries, zero))| {
            let rate = zero as f64 / queries as f64;
            (rate > ZERO_RESULT_RATE_THRESHOLD).then(|| ZeroResultDomain {
                domain: domain.to_string(),
                queries,
                zero_result_queries: zero,
                zero_result_rate: super::percentile::round2(rate),
            })
        })
        .collect();
    result.sort_by(|a, b| b.zero_result_queries.cmp(&a.zero_result_queries));
    result
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub threshold: usize,
    pub modules: Vec<ModuleCoverage>,
    pub gap_modules: Vec<String>,
    pub unreferenced_entities: Vec<EntityGap>,
    pub zero_result_domains: Vec<ZeroResultDomain>,
}

pub fn coverage_report(
    module_counts: &[(String, usize)],
    entities: &[Entity],
    chunks: &[Chunk],
    entries: &[AccessLogEntry],
    threshold: usize,
) -> CoverageReport {
    let modules = module_coverage(module_counts, threshold);
    let gap_modules = modules
        .iter()
        .filter(|m| m.is_gap)
        .map(|m| m.module.clone())
        .collect();
    CoverageReport {
        threshold,
        modules,
        gap_modules,
        unreferenced_entities: unreferenced_entities(entities, chunks),
        zero_result_domains: zero_result_domains(entries),
    }
}
