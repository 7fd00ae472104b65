//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all admin server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::{RequestBuilder, Response};
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP test client authenticating with an optional API key
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    api_key: Option<String>,
}

impl TestClient {
    /// Creates a client that sends no API key
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            api_key: None,
        }
    }

    /// Creates a client sending `Authorization: Bearer <api_key>`
    pub fn with_key(base_url: String, api_key: &str) -> Self {
        Self {
            api_key: Some(api_key.to_string()),
            ..Self::new(base_url)
        }
    }

    pub fn public(base_url: String) -> Self {
        Self::with_key(base_url, PUBLIC_KEY)
    }

    pub fn internal(base_url: String) -> Self {
        Self::with_key(base_url, INTERNAL_KEY)
    }

    pub fn confidential(base_url: String) -> Self {
        Self::with_key(base_url, CONFIDENTIAL_KEY)
    }

    pub fn admin(base_url: String) -> Self {
        Self::with_key(base_url, ADMIN_KEY)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// GET on a path relative to the base URL
    pub async fn get(&self, path: &str) -> Response {
        self.authorize(self.client.get(format!("{}{}", self.base_url, path)))
            .send()
            .await
            .expect("GET request failed")
    }

    pub async fn delete(&self, path: &str) -> Response {
        self.authorize(self.client.delete(format!("{}{}", self.base_url, path)))
            .send()
            .await
            .expect("DELETE request failed")
    }

    async fn send_json(&self, request: RequestBuilder, body: Value) -> Response {
        self.authorize(request)
            .json(&body)
            .send()
            .await
            .expect("Request failed")
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// POST /v1/search
    pub async fn search(&self, query: &str) -> Response {
        self.search_with(json!({ "query": query })).await
    }

    /// POST /v1/search with a custom body
    pub async fn search_with(&self, body: Value) -> Response {
        self.send_json(
            self.client.post(format!("{}/v1/search", self.base_url)),
            body,
        )
        .await
    }

    // ========================================================================
    // Analytics
    // ========================================================================

    /// GET /v1/analytics/{view}
    pub async fn analytics(&self, view: &str) -> Response {
        self.get(&format!("/v1/analytics/{}", view)).await
    }

    // ========================================================================
    // Knowledge Browser
    // ========================================================================

    /// GET /v1/knowledge/files
    pub async fn list_files(&self) -> Response {
        self.get("/v1/knowledge/files").await
    }

    /// GET /v1/knowledge/chunks with a raw query string
    pub async fn list_chunks(&self, query: &str) -> Response {
        self.get(&format!("/v1/knowledge/chunks{}", query)).await
    }

    /// GET /v1/knowledge/domains
    pub async fn list_domains(&self) -> Response {
        self.get("/v1/knowledge/domains").await
    }

    // ========================================================================
    // Entity Graph
    // ========================================================================

    /// GET /v1/graph/entities
    pub async fn list_entities(&self) -> Response {
        self.get("/v1/graph/entities").await
    }

    /// GET /v1/graph/entities/{code}
    pub async fn get_entity(&self, code: &str) -> Response {
        self.get(&format!("/v1/graph/entities/{}", code)).await
    }

    /// GET /v1/graph/entities/{code}/neighborhood?depth={depth}
    pub async fn get_neighborhood(&self, code: &str, depth: u32) -> Response {
        self.get(&format!(
            "/v1/graph/entities/{}/neighborhood?depth={}",
            code, depth
        ))
        .await
    }

    /// GET /v1/graph/stats
    pub async fn graph_stats(&self) -> Response {
        self.get("/v1/graph/stats").await
    }

    // ========================================================================
    // Admin
    // ========================================================================

    /// GET /v1/admin/keys
    pub async fn list_keys(&self) -> Response {
        self.get("/v1/admin/keys").await
    }

    /// POST /v1/admin/keys
    pub async fn create_key(&self, owner: &str, access_level: i64) -> Response {
        self.send_json(
            self.client.post(format!("{}/v1/admin/keys", self.base_url)),
            json!({ "owner": owner, "access_level": access_level }),
        )
        .await
    }

    /// POST /v1/admin/keys with an arbitrary JSON body
    pub async fn create_key_with(&self, body: Value) -> Response {
        self.send_json(
            self.client.post(format!("{}/v1/admin/keys", self.base_url)),
            body,
        )
        .await
    }

    /// DELETE /v1/admin/keys/{id}
    pub async fn revoke_key(&self, id: i64) -> Response {
        self.authorize(
            self.client
                .delete(format!("{}/v1/admin/keys/{}", self.base_url, id)),
        )
        .send()
        .await
        .expect("Revoke request failed")
    }

    /// PUT /v1/admin/keys/{id}/level
    pub async fn update_key_level(&self, id: i64, access_level: i64) -> Response {
        self.send_json(
            self.client
                .put(format!("{}/v1/admin/keys/{}/level", self.base_url, id)),
            json!({ "access_level": access_level }),
        )
        .await
    }

    /// POST /v1/admin/keys/{id}/reactivate
    pub async fn reactivate_key(&self, id: i64) -> Response {
        self.authorize(self.client.post(format!(
            "{}/v1/admin/keys/{}/reactivate",
            self.base_url, id
        )))
        .send()
        .await
        .expect("Reactivate request failed")
    }

    /// GET /v1/admin/levels
    pub async fn list_levels(&self) -> Response {
        self.get("/v1/admin/levels").await
    }

    /// GET /v1/admin/audit with a raw query string
    pub async fn audit_log(&self, query: &str) -> Response {
        self.get(&format!("/v1/admin/audit{}", query)).await
    }

    /// Id of the key whose owner is `owner`, looked up through the admin API
    pub async fn key_id_for_owner(&self, owner: &str) -> i64 {
        let keys: Value = self.list_keys().await.json().await.expect("Invalid JSON");
        keys.as_array()
            .expect("keys should be an array")
            .iter()
            .find(|key| key["owner"] == owner)
            .and_then(|key| key["id"].as_i64())
            .unwrap_or_else(|| panic!("No key for owner {}", owner))
    }
}
