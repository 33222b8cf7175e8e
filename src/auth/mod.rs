//! Inbound request authorization.
//!
//! Requests to the proxy route must carry an RS256 bearer token issued by the
//! configured tenant. Verification checks the signature against a key from the
//! tenant's published key set, the issuer, the audience, and finally the
//! permission required for user lookups. Only the last check is an
//! authorization failure; everything before it is an authentication failure.

pub mod jwks;
pub mod middleware;

use crate::errors::ApiError;
use serde::Deserialize;
use thiserror::Error;

/// Permission an inbound token must carry to read user data.
pub const READ_USERDATA: &str = "read:userdata";

/// Why an inbound request was rejected
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingHeader,
    #[error("Authorization header is not a bearer token")]
    MalformedHeader,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("No signing key matches the token")]
    UnknownSigningKey,
    #[error("Signing key discovery failed: {0}")]
    KeyDiscovery(String),
    #[error("Token does not grant read:userdata")]
    InsufficientScope,
}

impl From<AuthError> for ApiError {
    /// Insufficient scope is the only authorization failure; every other
    /// rejection is an authentication failure.
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InsufficientScope => ApiError::forbidden(error.to_string()),
            _ => ApiError::unauthorized(error.to_string()),
        }
    }
}

/// Claims extracted from a verified bearer token
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Subject of the token
    pub sub: String,
    /// Space-delimited OAuth scopes
    #[serde(default)]
    pub scope: Option<String>,
    /// Permissions granted through the tenant's RBAC
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl TokenClaims {
    /// Whether the token carries the given permission, through either the
    /// `permissions` claim or the space-delimited `scope` claim.
    pub fn has_permission(&self, permission: &str) -> bool {
        if self.permissions.iter().any(|p| p == permission) {
            return true;
        }
        self.scope
            .as_deref()
            .map(|scope| scope.split_whitespace().any(|p| p == permission))
            .unwrap_or(false)
    }
}
