use super::AccessTokenClaims;
use crate::domain_model::UserId;
use crate::domain_port::StoreError;
use serde::Serialize;
use std::fmt;
use tracing::{error, warn};

/// Caller-visible failures. `InvalidCredentials` and `InvalidOrExpiredToken`
/// carry no detail on purpose.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid or expired token")]
    InvalidOrExpiredToken,
    #[error("token algorithm rejected")]
    AlgorithmRejected,
    #[error("email already registered")]
    EmailTaken,
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Only a transient store failure may be retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::StoreUnavailable(_))
    }
}

impl From<StoreError> for AuthError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Unavailable(e) => {
                warn!(error = %e, "store unavailable");
                AuthError::StoreUnavailable(e)
            }
            other => {
                error!(error = %other, "store failure");
                AuthError::InternalError(other.to_string())
            }
        }
    }
}

#[derive(Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginInput")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub const TOKEN_TYPE_BEARER: &str = "bearer";

#[derive(Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    /// Whole seconds, for client display.
    pub access_token_expires_in: i64,
    #[serde(rename = "refresh_token")]
    pub refresh_secret: String,
    pub token_type: &'static str,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("access_token_expires_in", &self.access_token_expires_in)
            .field("refresh_secret", &"<redacted>")
            .field("token_type", &self.token_type)
            .finish()
    }
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, request: LoginInput) -> Result<TokenPair, AuthError>;

    /// Rotate `refresh_secret`: it is consumed whether or not the caller
    /// ever sees the replacement.
    async fn refresh(&self, refresh_secret: &str) -> Result<TokenPair, AuthError>;

    /// Verify an access token presented as a bearer credential.
    async fn authenticate(&self, access_token: &str) -> Result<AccessTokenClaims, AuthError>;

    /// Revoke the session the access token was minted with.
    async fn logout(&self, claims: &AccessTokenClaims) -> Result<(), AuthError>;

    async fn logout_all(&self, subject_id: UserId) -> Result<u64, AuthError>;
}
