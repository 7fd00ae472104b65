use axum::extract::FromRef;

use crate::access::KeyManager;
use crate::knowledge_store::KnowledgeStore;
use crate::search::KnowledgeSearcher;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedKnowledgeStore = Arc<dyn KnowledgeStore>;
pub type GuardedKeyManager = Arc<KeyManager>;
pub type GuardedSearcher = Arc<KnowledgeSearcher>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub store: GuardedKnowledgeStore,
    pub key_manager: GuardedKeyManager,
    pub searcher: GuardedSearcher,
}

impl ServerState {
    pub fn new<S: KnowledgeStore + 'static>(config: ServerConfig, store: Arc<S>) -> ServerState {
        let key_manager = Arc::new(KeyManager::new(store.clone()));
        let searcher = Arc::new(KnowledgeSearcher::new(store.clone(), config.search));
        ServerState {
            config,
            start_time: Instant::now(),
            store,
            key_manager,
            searcher,
        }
    }
}

impl FromRef<ServerState> for GuardedKnowledgeStore {
    fn from_ref(input: &ServerState) -> Self {
        input.store.clone()
    }
}

impl FromRef<ServerState> for GuardedKeyManager {
    fn from_ref(input: &ServerState) -> Self {
        input.key_manager.clone()
    }
}

impl FromRef<ServerState> for GuardedSearcher {
    fn from_ref(input: &ServerState) -> Self {
        input.searcher.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
