use super::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

#[derive(
    Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct RecordId(pub uuid::Uuid);

impl RecordId {
    pub fn new_v4() -> Self {
        RecordId(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::from_str(s).map(RecordId)
    }
}

/// A server-tracked refresh capability.
///
/// `revoked` is the single terminal flag shared by rotation and explicit
/// logout. Expiry is never written; it is observed against `expires_at`.
#[derive(Clone)]
pub struct RefreshTokenRecord {
    pub record_id: RecordId,
    pub subject_id: UserId,
    pub secret: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }
}

impl fmt::Debug for RefreshTokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshTokenRecord")
            .field("record_id", &self.record_id)
            .field("subject_id", &self.subject_id)
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("revoked", &self.revoked)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Hex SHA-256 of a refresh secret. Stores key on this, never on the secret.
pub fn secret_digest(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}
