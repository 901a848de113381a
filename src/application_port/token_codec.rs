use crate::domain_model::{RecordId, UserId};
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("signing algorithm rejected")]
    AlgorithmRejected,
    #[error("signature invalid")]
    SignatureInvalid,
    #[error("token expired")]
    Expired,
    #[error("encode failed: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTokenClaims {
    pub subject: UserId,
    pub email: String,
    /// The refresh record this token was minted alongside.
    pub session_id: RecordId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub trait TokenCodec: Send + Sync {
    fn encode(
        &self,
        subject: UserId,
        email: &str,
        session_id: RecordId,
        ttl: Duration,
    ) -> Result<String, TokenError>;

    /// Checks, in order: structure, algorithm, signature, expiry.
    fn decode(&self, token: &str) -> Result<AccessTokenClaims, TokenError>;

    /// The configured lifetime of tokens minted for sessions.
    fn access_ttl(&self) -> Duration;

    fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl().num_seconds()
    }
}
