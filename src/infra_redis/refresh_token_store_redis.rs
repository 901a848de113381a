use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Duration, Utc};
use redis::Script;
use redis::aio::ConnectionManager;

const REFRESH_CONSUME: &str = include_str!("refresh_consume.lua");
const REFRESH_REVOKE: &str = include_str!("refresh_revoke.lua");
const REFRESH_REVOKE_ALL: &str = include_str!("refresh_revoke_all.lua");

/// Refresh records as Redis hashes.
///
/// Layout under `prefix`:
/// - `{prefix}:rt:{digest}` hash with the record fields, expiring with it
/// - `{prefix}:rid:{record_id}` the record's digest, for revoke by id
/// - `{prefix}:sub:{subject_id}` set of the subject's digests
///
/// Every state transition is a Lua script, so the check and the flip are a
/// single server-side step.
pub struct RedisRefreshTokenStore {
    conn: ConnectionManager,
    prefix: String,
    consume: Script,
    revoke: Script,
    revoke_all: Script,
}

impl RedisRefreshTokenStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisRefreshTokenStore {
            conn,
            prefix: prefix.into(),
            consume: Script::new(REFRESH_CONSUME),
            revoke: Script::new(REFRESH_REVOKE),
            revoke_all: Script::new(REFRESH_REVOKE_ALL),
        }
    }

    fn record_prefix(&self) -> String {
        format!("{}:rt:", self.prefix)
    }

    fn record_key(&self, digest: &str) -> String {
        format!("{}:rt:{}", self.prefix, digest)
    }

    fn id_key(&self, record_id: RecordId) -> String {
        format!("{}:rid:{}", self.prefix, record_id)
    }

    fn subject_key(&self, subject_id: UserId) -> String {
        format!("{}:sub:{}", self.prefix, subject_id)
    }
}

fn store_error(e: redis::RedisError) -> StoreError {
    if e.is_io_error() || e.is_timeout() || e.is_connection_dropped() || e.is_connection_refusal()
    {
        StoreError::Unavailable(e.to_string())
    } else {
        StoreError::Internal(e.to_string())
    }
}

fn millis(field: &str) -> Result<DateTime<Utc>, StoreError> {
    field
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| StoreError::Internal(format!("bad timestamp field: {field}")))
}

fn parse_field<T: std::str::FromStr>(field: &str) -> Result<T, StoreError> {
    field
        .parse::<T>()
        .map_err(|_| StoreError::Internal(format!("bad id field: {field}")))
}

#[async_trait::async_trait]
impl RefreshTokenStore for RedisRefreshTokenStore {
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
            secret,
            expires_at: now + ttl,
            revoked: false,
            created_at: now,
        };
        let expires_ms = record.expires_at.timestamp_millis();

        let record_key = self.record_key(&digest);
        let subject_key = self.subject_key(subject_id);
        let fields = [
            ("record_id", record.record_id.to_string()),
            ("subject_id", subject_id.to_string()),
            ("expires_at", expires_ms.to_string()),
            ("created_at", now.timestamp_millis().to_string()),
            ("revoked", "0".to_string()),
        ];

        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .hset_multiple(&record_key, &fields)
            .ignore()
            .cmd("PEXPIREAT")
            .arg(&record_key)
            .arg(expires_ms)
            .ignore()
            .cmd("SET")
            .arg(self.id_key(record.record_id))
            .arg(&digest)
            .arg("PXAT")
            .arg(expires_ms)
            .ignore()
            .sadd(&subject_key, &digest)
            .ignore()
            .cmd("PEXPIREAT")
            .arg(&subject_key)
            .arg(expires_ms)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;

        Ok(record)
    }

    async fn find_and_invalidate(
        &self,
        secret: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let key = self.record_key(&secret_digest(secret));
        let mut conn = self.conn.clone();
        let consumed: Option<(String, String, String, String)> = self
            .consume
            .key(&key)
            .arg(Utc::now().timestamp_millis())
            .invoke_async(&mut conn)
            .await
            .map_err(store_error)?;

        let Some((record_id, subject_id, expires_at, created_at)) = consumed else {
            return Ok(None);
        };
        Ok(Some(RefreshTokenRecord {
            record_id: parse_field(&record_id)?,
            subject_id: parse_field(&subject_id)?,
            secret: secret.to_owned(),
            expires_at: millis(&expires_at)?,
            revoked: false,
            created_at: millis(&created_at)?,
        }))
    }

    async fn revoke(&self, record_id: RecordId) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = self
            .revoke
            .key(self.id_key(record_id))
            .arg(self.record_prefix())
            .invoke_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn revoke_all(&self, subject_id: UserId) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let revoked: u64 = self
            .revoke_all
            .key(self.subject_key(subject_id))
            .arg(self.record_prefix())
            .invoke_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(revoked)
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        // keys carry PEXPIREAT; Redis evicts them itself
        Ok(0)
    }
}
