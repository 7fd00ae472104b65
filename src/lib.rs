//! Knowledge Admin Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod access;
pub mod analytics;
pub mod config;
pub mod graph;
pub mod knowledge_store;
pub mod search;
pub mod server;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use access::{AccessLevel, KeyManager};
pub use knowledge_store::{KnowledgeStore, SqliteKnowledgeStore};
pub use server::{run_server, RequestsLoggingLevel, ServerConfig};
