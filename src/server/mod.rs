mod admin_routes;
mod analytics_routes;
pub mod config;
pub mod error;
mod extract;
mod graph_routes;
mod http_layers;
mod knowledge_routes;
pub mod metrics;
mod search;
pub mod server;
pub mod session;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use http_layers::*;
pub use server::{make_app, make_metrics_app, run_metrics_server, run_server};
