use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use knowledge_admin_server::config::{AppConfig, CliConfig, FileConfig};
use knowledge_admin_server::knowledge_store::{AuditLogStore, SqliteKnowledgeStore};
use knowledge_admin_server::server::{self, run_metrics_server, run_server, RequestsLoggingLevel};
use knowledge_admin_server::{KeyManager, ServerConfig};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file, its values override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding knowledge.db.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3002)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9092)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Number of days to retain audit log rows before pruning. Set to 0 to disable pruning.
    #[clap(long, default_value_t = 90)]
    pub audit_retention_days: u64,

    /// Interval in hours between pruning runs. Only used if audit_retention_days > 0.
    #[clap(long, default_value_t = 24)]
    pub prune_interval_hours: u64,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_dir: self.db_dir.clone(),
            port: self.port,
            metrics_port: self.metrics_port,
            logging_level: self.logging_level.clone(),
            frontend_dir_path: self.frontend_dir_path.clone(),
            audit_retention_days: self.audit_retention_days,
            prune_interval_hours: self.prune_interval_hours,
        }
    }
}

fn spawn_audit_pruning(store: Arc<SqliteKnowledgeStore>, retention_days: u64, interval_hours: u64) {
    info!(
        "Audit pruning enabled: retaining {} days, pruning every {} hours",
        retention_days, interval_hours
    );

    tokio::spawn(async move {
        let interval = Duration::from_secs(interval_hours.max(1) * 60 * 60);
        let mut ticker = tokio::time::interval(interval);

        // Skip the first immediate tick, wait for the first interval
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let cutoff = chrono::Utc::now().timestamp() - (retention_days as i64 * 24 * 60 * 60);
            match store.prune_access_log_older_than(cutoff) {
                Ok(count) => {
                    if count > 0 {
                        info!("Pruned {} old audit log rows", count);
                    }
                }
                Err(e) => {
                    error!("Failed to prune audit log: {}", e);
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}...", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let app_config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    let db_path = app_config.knowledge_db_path();
    info!("Opening SQLite knowledge database at {:?}...", db_path);
    let store = Arc::new(SqliteKnowledgeStore::new(&db_path)?);

    info!("Initializing metrics...");
    server::metrics::init_metrics();
    let key_counts = KeyManager::new(store.clone()).active_key_counts()?;
    server::metrics::set_active_api_keys(&key_counts);
    if !key_counts
        .iter()
        .any(|(level, count)| level.is_admin() && *count > 0)
    {
        info!("No active L4 key found, create one with cli-keys");
    }

    if app_config.audit_retention_days > 0 {
        spawn_audit_pruning(
            store.clone(),
            app_config.audit_retention_days,
            app_config.prune_interval_hours,
        );
    }

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        frontend_dir_path: app_config.frontend_dir_path.clone(),
        analytics: app_config.analytics,
        cost_model: app_config.cost_model,
        search: app_config.search,
    };

    tokio::select! {
        result = run_server(server_config, store) => result,
        result = run_metrics_server(app_config.metrics_port) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
            Ok(())
        }
    }
}
