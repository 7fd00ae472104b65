use super::api_key::{hash_api_key, ApiKeyValue};
use super::level::AccessLevel;
use crate::knowledge_store::{ApiKey, ApiKeyStore, NewApiKey};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum KeyManagementError {
    #[error("access level must be one of 1, 2, 3, 4 (got {0})")]
    InvalidAccessLevel(i64),

    #[error("owner must not be empty")]
    EmptyOwner,

    #[error("API key {0} not found")]
    NotFound(i64),

    #[error("API key {0} is already revoked")]
    AlreadyRevoked(i64),

    #[error("cannot revoke or demote the last active L4 key")]
    LastAdminKey,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// A freshly created key together with its plaintext, which is never stored.
#[derive(Debug)]
pub struct CreatedApiKey {
    pub key: ApiKey,
    pub plaintext: ApiKeyValue,
}

pub fn parse_access_level(raw: i64) -> Result<AccessLevel, KeyManagementError> {
    AccessLevel::from_int(raw).ok_or(KeyManagementError::InvalidAccessLevel(raw))
}

/// Rejects revoking `target` when it is the only active L4 key left.
pub fn check_revoke_allowed(
    target: &ApiKey,
    active_admin_keys: usize,
) -> Result<(), KeyManagementError> {
    if !target.is_active {
        return Err(KeyManagementError::AlreadyRevoked(target.id));
    }
    if target.access_level == AccessLevel::Admin && active_admin_keys <= 1 {
        return Err(KeyManagementError::LastAdminKey);
    }
    Ok(())
}

/// Rejects moving the only active L4 key to a lower level.
pub fn check_level_change_allowed(
    target: &ApiKey,
    new_level: AccessLevel,
    active_admin_keys: usize,
) -> Result<(), KeyManagementError> {
    let is_demotion = target.access_level == AccessLevel::Admin && new_level != AccessLevel::Admin;
    if target.is_active && is_demotion && active_admin_keys <= 1 {
        return Err(KeyManagementError::LastAdminKey);
    }
    Ok(())
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

pub struct KeyManager {
    store: Arc<dyn ApiKeyStore>,
    // Serializes guard checks with the writes they protect.
    mutation_lock: Mutex<()>,
}

impl KeyManager {
    pub fn new(store: Arc<dyn ApiKeyStore>) -> Self {
        Self {
            store,
            mutation_lock: Mutex::new(()),
        }
    }

    pub fn create_key(
        &self,
        owner: &str,
        description: Option<&str>,
        level: i64,
    ) -> Result<CreatedApiKey, KeyManagementError> {
        let level = parse_access_level(level)?;
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(KeyManagementError::EmptyOwner);
        }

        let plaintext = ApiKeyValue::generate();
        let id = self.store.insert_api_key(&NewApiKey {
            key_hash: plaintext.hash(),
            key_prefix: plaintext.display_prefix(),
            owner: owner.to_string(),
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            access_level: level,
        })?;
        let key = self.load(id)?;
        info!("Created API key {} for {} at {}", id, owner, level);
        Ok(CreatedApiKey { key, plaintext })
    }

    /// Resolves a plaintext key to its record. Unknown and revoked keys yield `None`.
    pub fn authenticate(&self, plaintext: &str) -> anyhow::Result<Option<ApiKey>> {
        let plaintext = plaintext.trim();
        if plaintext.is_empty() {
            return Ok(None);
        }
        let Some(mut key) = self.store.get_api_key_by_hash(&hash_api_key(plaintext))? else {
            return Ok(None);
        };
        if !key.is_active {
            warn!("Rejected revoked API key {} ({})", key.id, key.key_prefix);
            return Ok(None);
        }
        let now = now_unix();
        self.store.touch_api_key(key.id, now)?;
        key.last_used_at = Some(now);
        Ok(Some(key))
    }

    pub fn list_keys(&self) -> anyhow::Result<Vec<ApiKey>> {
        self.store.list_api_keys()
    }

    pub fn get_key(&self, id: i64) -> Result<ApiKey, KeyManagementError> {
        self.load(id)
    }

    pub fn revoke_key(&self, id: i64) -> Result<ApiKey, KeyManagementError> {
        let _guard = self.mutation_lock.lock().unwrap();
        let target = self.load(id)?;
        let active_admins = self.store.count_active_keys_at_level(AccessLevel::Admin)?;
        check_revoke_allowed(&target, active_admins)?;

        self.store.set_api_key_active(id, false, now_unix())?;
        info!("Revoked API key {} ({})", id, target.key_prefix);
        self.load(id)
    }

    pub fn update_access_level(&self, id: i64, level: i64) -> Result<ApiKey, KeyManagementError> {
        let level = parse_access_level(level)?;
        let _guard = self.mutation_lock.lock().unwrap();
        let target = self.load(id)?;
        let active_admins = self.store.count_active_keys_at_level(AccessLevel::Admin)?;
        check_level_change_allowed(&target, level, active_admins)?;

        self.store.set_api_key_access_level(id, level)?;
        info!(
            "Changed API key {} access level from {} to {}",
            id, target.access_level, level
        );
        self.load(id)
    }

    /// Reactivating an active key leaves it untouched.
    pub fn reactivate_key(&self, id: i64) -> Result<ApiKey, KeyManagementError> {
        let _guard = self.mutation_lock.lock().unwrap();
        let target = self.load(id)?;
        if target.is_active {
            return Ok(target);
        }
        self.store.set_api_key_active(id, true, now_unix())?;
        info!("Reactivated API key {} ({})", id, target.key_prefix);
        self.load(id)
    }

    pub fn active_key_counts(&self) -> anyhow::Result<Vec<(AccessLevel, usize)>> {
        AccessLevel::ALL
            .into_iter()
            .map(|level| {
                self.store
                    .count_active_keys_at_level(level)
                    .map(|count| (level, count))
            })
            .collect()
    }

    fn load(&self, id: i64) -> Result<ApiKey, KeyManagementError> {
        self.store
            .get_api_key(id)?
            .ok_or(KeyManagementError::NotFound(id))
    }
}
