use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, middleware, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tower_http::services::ServeDir;
use tracing::info;

use super::admin_routes::make_admin_routes;
use super::analytics_routes::make_analytics_routes;
use super::graph_routes::make_graph_routes;
use super::knowledge_routes::make_knowledge_routes;
use super::metrics::metrics_handler;
use super::search::make_search_routes;
use super::{log_requests, state::*, ServerConfig};
use crate::knowledge_store::KnowledgeStore;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    Json(stats)
}

pub fn make_app<S: KnowledgeStore + 'static>(config: ServerConfig, store: Arc<S>) -> Result<Router> {
    let state = ServerState::new(config.clone(), store);

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let app: Router = home_router
        .merge(make_search_routes(state.clone()))
        .nest("/v1/analytics", make_analytics_routes(state.clone()))
        .nest("/v1/knowledge", make_knowledge_routes(state.clone()))
        .nest("/v1/graph", make_graph_routes(state.clone()))
        .nest("/v1/admin", make_admin_routes(state.clone()))
        .layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

pub async fn run_server<S: KnowledgeStore + 'static>(
    config: ServerConfig,
    store: Arc<S>,
) -> Result<()> {
    let port = config.port;
    let app = make_app(config, store)?;

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Ready to serve at port {}!", port);

    Ok(axum::serve(listener, app).await?)
}

pub async fn run_metrics_server(port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", port))?;
    info!("Metrics available at port {}!", port);

    Ok(axum::serve(listener, make_metrics_app()).await?)
}
