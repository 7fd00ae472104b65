use super::error::ApiError;
use super::metrics::record_auth_failure;
use super::state::ServerState;
use crate::access::AccessLevel;
use crate::search::SearchCaller;

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, error};

pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_API_KEY: &str = "X-Api-Key";

/// The authenticated caller of a request, resolved from its API key.
#[derive(Debug, Clone)]
pub struct AccessSession {
    pub key_id: i64,
    pub key_prefix: String,
    pub owner: String,
    pub access_level: AccessLevel,
}

impl AccessSession {
    pub fn require(&self, required: AccessLevel) -> Result<(), ApiError> {
        if self.access_level >= required {
            Ok(())
        } else {
            debug!(
                "Key {} at {} denied, {} required",
                self.key_prefix, self.access_level, required
            );
            Err(ApiError::AccessDenied { required })
        }
    }

    pub fn as_search_caller(&self) -> SearchCaller {
        SearchCaller {
            api_key_id: Some(self.key_id),
            user_name: self.owner.clone(),
            access_level: self.access_level,
        }
    }
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// `Authorization: Bearer <key>` wins over `X-Api-Key: <key>`.
fn extract_api_key(parts: &Parts) -> Option<&str> {
    header_value(parts, HEADER_AUTHORIZATION)
        .map(|value| {
            value
                .strip_prefix("Bearer ")
                .or_else(|| value.strip_prefix("bearer "))
                .unwrap_or(value)
                .trim()
        })
        .or_else(|| header_value(parts, HEADER_API_KEY))
}

impl FromRequestParts<ServerState> for AccessSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let Some(plaintext) = extract_api_key(parts) else {
            debug!("No API key in request headers.");
            record_auth_failure("missing");
            return Err(ApiError::Unauthenticated);
        };

        match ctx.key_manager.authenticate(plaintext) {
            Ok(Some(key)) => Ok(AccessSession {
                key_id: key.id,
                key_prefix: key.key_prefix,
                owner: key.owner,
                access_level: key.access_level,
            }),
            Ok(None) => {
                debug!("API key not recognized.");
                record_auth_failure("invalid");
                Err(ApiError::Unauthenticated)
            }
            Err(err) => {
                error!("Failed to authenticate API key: {}", err);
                Err(ApiError::Internal(err))
            }
        }
    }
}
