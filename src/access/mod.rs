//! Access levels, API key values and the key management service.

mod api_key;
mod key_manager;
mod level;

pub use api_key::{hash_api_key, ApiKeyValue, API_KEY_PREFIX, DISPLAY_PREFIX_LENGTH};
pub use key_manager::{
    check_level_change_allowed, check_revoke_allowed, parse_access_level, CreatedApiKey,
    KeyManagementError, KeyManager,
};
pub use level::{AccessLevel, InvalidAccessLevel};
