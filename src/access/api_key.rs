//! API key values: generation, hashing and display prefixes.

use rand::distr::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::fmt;

pub const API_KEY_PREFIX: &str = "mcpk_";
const API_KEY_RANDOM_LENGTH: usize = 40;

/// Number of leading plaintext characters kept for display.
pub const DISPLAY_PREFIX_LENGTH: usize = 12;

/// A plaintext API key. Only ever shown once, at creation time.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ApiKeyValue(String);

impl ApiKeyValue {
    pub fn generate() -> ApiKeyValue {
        let rng = rand::rng();
        let random_part: String = rng
            .sample_iter(&Alphanumeric)
            .take(API_KEY_RANDOM_LENGTH)
            .map(char::from)
            .collect();
        ApiKeyValue(format!("{}{}", API_KEY_PREFIX, random_part))
    }

    pub fn from_plaintext<S: Into<String>>(plaintext: S) -> ApiKeyValue {
        ApiKeyValue(plaintext.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn hash(&self) -> String {
        hash_api_key(&self.0)
    }

    pub fn display_prefix(&self) -> String {
        self.0.chars().take(DISPLAY_PREFIX_LENGTH).collect()
    }
}

impl fmt::Debug for ApiKeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKeyValue({}…)", self.display_prefix())
    }
}

/// Lowercase hex SHA-256 of the plaintext key, the only form that is persisted.
pub fn hash_api_key(plaintext: &str) -> String {
    Sha256::digest(plaintext.as_bytes())
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_have_prefix_and_length() {
        let key = ApiKeyValue::generate();
        assert!(key.as_str().starts_with(API_KEY_PREFIX));
        assert_eq!(key.as_str().len(), API_KEY_PREFIX.len() + API_KEY_RANDOM_LENGTH);
        assert!(key.as_str()[API_KEY_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn generated_keys_differ() {
        assert_ne!(ApiKeyValue::generate(), ApiKeyValue::generate());
    }

    #[test]
    fn hash_is_stable_sha256_hex() {
        assert_eq!(
            hash_api_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        let key = ApiKeyValue::from_plaintext("abc");
        assert_eq!(key.hash(), hash_api_key("abc"));
    }

    #[test]
    fn display_prefix_and_debug_do_not_leak_the_key() {
        let key = ApiKeyValue::from_plaintext("mcpk_0123456789abcdef");
        assert_eq!(key.display_prefix(), "mcpk_0123456");
        let debug = format!("{:?}", key);
        assert!(!debug.contains("abcdef"));
    }
}
