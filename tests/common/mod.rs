//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TestClient};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_graph_stats() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::public(server.base_url.clone());
//!
//!     let response = client.graph_stats().await;
//!     assert_eq!(response.status(), StatusCode::OK);
//! }
//! ```

#[allow(dead_code)]
mod client;
#[allow(dead_code)]
mod constants;
mod fixtures;
#[allow(dead_code)]
mod server;

// Public API - this is what tests import
#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use constants::*;
pub use server::TestServer;
