use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Records keyed by secret digest. The conditional flip in
/// `find_and_invalidate` runs under the shard write lock `get_mut` holds, so
/// the check and the write cannot interleave with another caller.
#[derive(Default)]
pub struct MemoryRefreshTokenStore {
    records: DashMap<String, RefreshTokenRecord>,
    digests: DashMap<RecordId, String>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait::async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn create(
        &self,
        subject_id: UserId,
        ttl: Duration,
    ) -> Result<RefreshTokenRecord, StoreError> {
        let secret = generate_secret();
        let digest = secret_digest(&secret);
        let now = Utc::now();
        let record = RefreshTokenRecord {
            record_id: RecordId::new_v4(),
            subject_id,
            secret: String::new(),
            expires_at: now + ttl,
            revoked: false,
            created_at: now,
        };

        match self.records.entry(digest.clone()) {
            Entry::Occupied(_) => return Err(StoreError::Duplicate),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
            }
        }
        self.digests.insert(record.record_id, digest);

        Ok(RefreshTokenRecord { secret, ..record })
    }

    async fn find_and_invalidate(
        &self,
        secret: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let digest = secret_digest(secret);
        let now = Utc::now();

        let Some(mut entry) = self.records.get_mut(&digest) else {
            return Ok(None);
        };
        if !entry.is_active_at(now) {
            return Ok(None);
        }
        let before = RefreshTokenRecord {
            secret: secret.to_owned(),
            ..entry.clone()
        };
        entry.revoked = true;
        Ok(Some(before))
    }

    async fn revoke(&self, record_id: RecordId) -> Result<(), StoreError> {
        let Some(digest) = self.digests.get(&record_id).map(|d| d.clone()) else {
            return Ok(());
        };
        if let Some(mut entry) = self.records.get_mut(&digest) {
            entry.revoked = true;
        }
        Ok(())
    }

    async fn revoke_all(&self, subject_id: UserId) -> Result<u64, StoreError> {
        let mut revoked = 0;
        for mut entry in self.records.iter_mut() {
            if entry.subject_id == subject_id && !entry.revoked {
                entry.revoked = true;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let before = self.records.len();
        self.records.retain(|_, rec| rec.expires_at > now);
        self.digests
            .retain(|_, digest| self.records.contains_key(digest.as_str()));
        Ok(before.saturating_sub(self.records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn created_record_is_active_and_carries_secret_once() {
        let store = MemoryRefreshTokenStore::new();
        let subject = UserId::new_v4();
        let rec = store.create(subject, Duration::days(1)).await.unwrap();

        assert_eq!(rec.subject_id, subject);
        assert!(!rec.revoked);
        assert!(!rec.secret.is_empty());
        assert!(store.records.iter().all(|r| r.secret.is_empty()));
    }

    #[tokio::test]
    async fn find_and_invalidate_returns_pre_flip_record_once() {
        let store = MemoryRefreshTokenStore::new();
        let rec = store.create(UserId::new_v4(), Duration::days(1)).await.unwrap();

        let first = store.find_and_invalidate(&rec.secret).await.unwrap().unwrap();
        assert_eq!(first.record_id, rec.record_id);
        assert!(!first.revoked);
        assert_eq!(first.secret, rec.secret);

        assert!(store.find_and_invalidate(&rec.secret).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_record_never_matches() {
        let store = MemoryRefreshTokenStore::new();
        let rec = store
            .create(UserId::new_v4(), Duration::seconds(-1))
            .await
            .unwrap();
        assert!(store.find_and_invalidate(&rec.secret).await.unwrap().is_none());
        assert!(store.find_and_invalidate(&rec.secret).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn revoke_is_idempotent_and_final() {
        let store = MemoryRefreshTokenStore::new();
        let rec = store.create(UserId::new_v4(), Duration::days(1)).await.unwrap();

        store.revoke(rec.record_id).await.unwrap();
        store.revoke(rec.record_id).await.unwrap();
        store.revoke(RecordId::new_v4()).await.unwrap();
        assert!(store.find_and_invalidate(&rec.secret).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn revoke_all_touches_only_that_subject() {
        let store = MemoryRefreshTokenStore::new();
        let alice = UserId::new_v4();
        let bob = UserId::new_v4();
        let a1 = store.create(alice, Duration::days(1)).await.unwrap();
        let a2 = store.create(alice, Duration::days(1)).await.unwrap();
        let b1 = store.create(bob, Duration::days(1)).await.unwrap();

        assert_eq!(store.revoke_all(alice).await.unwrap(), 2);
        assert_eq!(store.revoke_all(alice).await.unwrap(), 0);
        assert!(store.find_and_invalidate(&a1.secret).await.unwrap().is_none());
        assert!(store.find_and_invalidate(&a2.secret).await.unwrap().is_none());
        assert!(store.find_and_invalidate(&b1.secret).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn purge_drops_only_expired() {
        let store = MemoryRefreshTokenStore::new();
        let live = store.create(UserId::new_v4(), Duration::days(1)).await.unwrap();
        store
            .create(UserId::new_v4(), Duration::seconds(-1))
            .await
            .unwrap();

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.digests.len(), 1);
        assert!(store.find_and_invalidate(&live.secret).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_presentations_yield_one_winner() {
        let store = Arc::new(MemoryRefreshTokenStore::new());
        let rec = store.create(UserId::new_v4(), Duration::days(1)).await.unwrap();

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let store = store.clone();
                let secret = rec.secret.clone();
                tokio::spawn(async move { store.find_and_invalidate(&secret).await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
