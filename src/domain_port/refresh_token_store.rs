use super::StoreError;
use crate::domain_model::*;
use chrono::Duration;

#[async_trait::async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Mint a fresh secret for `subject_id` and persist an active record
    /// expiring `ttl` from now. The returned record is the only place the
    /// plaintext secret ever appears.
    async fn create(
        &self,
        subject_id: UserId,
        ttl: Duration,
    ) -> Result<RefreshTokenRecord, StoreError>;

    /// Flip the record matching `secret` from active to revoked in a single
    /// conditional write. Returns the record as it was before the flip, or
    /// `None` when no active record matches. Of any number of concurrent
    /// callers presenting the same secret, at most one gets `Some`.
    async fn find_and_invalidate(
        &self,
        secret: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Idempotent.
    async fn revoke(&self, record_id: RecordId) -> Result<(), StoreError>;

    /// Idempotent. Returns how many records were newly revoked.
    async fn revoke_all(&self, subject_id: UserId) -> Result<u64, StoreError>;

    /// Drop records past their expiry. Backends with native expiry return 0.
    async fn purge_expired(&self) -> Result<u64, StoreError>;
}
