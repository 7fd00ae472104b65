mod file_config;

pub use file_config::{AnalyticsConfig, CostConfig, FileConfig, SearchConfig};

use crate::analytics::{
    CostModel, DEFAULT_ASSUMED_CHUNKS_PER_QUERY, DEFAULT_COVERAGE_THRESHOLD,
    DEFAULT_STALE_AFTER_DAYS, DEFAULT_TOKENS_PER_CHUNK, DEFAULT_TOKENS_PER_QUERY,
    DEFAULT_USD_PER_MILLION_TOKENS,
};
use crate::search::{SearchSettings, MIN_PREVIEW_GRAPHEMES};
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub audit_retention_days: u64,
    pub prune_interval_hours: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    /// Audit rows older than this are pruned, 0 keeps everything.
    pub audit_retention_days: u64,
    pub prune_interval_hours: u64,

    // Feature configs (with defaults)
    pub analytics: AnalyticsSettings,
    pub cost_model: CostModel,
    pub search: SearchSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyticsSettings {
    pub coverage_threshold: usize,
    pub stale_after_days: u32,
    pub default_window_days: u32,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            coverage_threshold: DEFAULT_COVERAGE_THRESHOLD,
            stale_after_days: DEFAULT_STALE_AFTER_DAYS,
            default_window_days: DEFAULT_WINDOW_DAYS,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());
        let audit_retention_days = file
            .audit_retention_days
            .unwrap_or(cli.audit_retention_days);
        let prune_interval_hours = file
            .prune_interval_hours
            .unwrap_or(cli.prune_interval_hours);

        let analytics_file = file.analytics.unwrap_or_default();
        let analytics = AnalyticsSettings {
            coverage_threshold: analytics_file
                .coverage_threshold
                .unwrap_or(DEFAULT_COVERAGE_THRESHOLD),
            stale_after_days: analytics_file
                .stale_after_days
                .unwrap_or(DEFAULT_STALE_AFTER_DAYS),
            default_window_days: analytics_file
                .default_window_days
                .unwrap_or(DEFAULT_WINDOW_DAYS),
        };
        if analytics.default_window_days == 0 {
            bail!("analytics.default_window_days must be at least 1");
        }

        let cost_file = file.cost.unwrap_or_default();
        let cost_model = CostModel {
            tokens_per_query: cost_file.tokens_per_query.unwrap_or(DEFAULT_TOKENS_PER_QUERY),
            tokens_per_chunk: cost_file.tokens_per_chunk.unwrap_or(DEFAULT_TOKENS_PER_CHUNK),
            assumed_chunks_per_query: cost_file
                .assumed_chunks_per_query
                .unwrap_or(DEFAULT_ASSUMED_CHUNKS_PER_QUERY),
            usd_per_million_tokens: cost_file
                .usd_per_million_tokens
                .unwrap_or(DEFAULT_USD_PER_MILLION_TOKENS),
        };
        if !cost_model.usd_per_million_tokens.is_finite() || cost_model.usd_per_million_tokens < 0.0
        {
            bail!(
                "cost.usd_per_million_tokens must be a non-negative number (got {})",
                cost_model.usd_per_million_tokens
            );
        }

        let search_defaults = SearchSettings::default();
        let search_file = file.search.unwrap_or_default();
        let search = SearchSettings {
            default_top_k: search_file
                .default_top_k
                .unwrap_or(search_defaults.default_top_k),
            max_top_k: search_file.max_top_k.unwrap_or(search_defaults.max_top_k),
            preview_graphemes: search_file
                .preview_graphemes
                .unwrap_or(search_defaults.preview_graphemes),
            candidate_limit: search_file
                .candidate_limit
                .unwrap_or(search_defaults.candidate_limit),
        };
        if search.max_top_k == 0 || search.default_top_k == 0 {
            bail!("search.default_top_k and search.max_top_k must be at least 1");
        }
        if search.default_top_k > search.max_top_k {
            bail!(
                "search.default_top_k ({}) exceeds search.max_top_k ({})",
                search.default_top_k,
                search.max_top_k
            );
        }
        if search.preview_graphemes < MIN_PREVIEW_GRAPHEMES {
            bail!(
                "search.preview_graphemes must be at least {}",
                MIN_PREVIEW_GRAPHEMES
            );
        }

        Ok(Self {
            db_dir,
            port,
            metrics_port,
            logging_level,
            frontend_dir_path,
            audit_retention_days,
            prune_interval_hours,
            analytics,
            cost_model,
            search,
        })
    }

    pub fn knowledge_db_path(&self) -> PathBuf {
        self.db_dir.join("knowledge.db")
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
