use super::util::{store_error, uuid_from_bytes};
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Duration, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

/// Refresh records in MySQL, keyed by secret digest.
///
/// Rotation is a conditional `UPDATE ... WHERE revoked = 0 AND expires_at > ?`;
/// InnoDB's row lock serializes concurrent updates to the same row and the
/// loser re-evaluates the predicate against the committed `revoked = 1`, so
/// it affects zero rows. MySQL has no row TTL; expired rows are removed by
/// `purge_expired`, which the server runs on an interval.
pub struct MySqlRefreshTokenStore {
    pool: MySqlPool,
}

impl MySqlRefreshTokenStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlRefreshTokenStore { pool }
    }

    fn row_to_record(row: MySqlRow, secret: &str) -> Result<RefreshTokenRecord, StoreError> {
        let record_id: Vec<u8> = row.try_get("record_id").map_err(store_error)?;
        let subject_id: Vec<u8> = row.try_get("subject_id").map_err(store_error)?;
        let expires_at: DateTime<Utc> = row.try_get("expires_at").map_err(store_error)?;
        let revoked: bool = row.try_get("revoked").map_err(store_error)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(store_error)?;

        Ok(RefreshTokenRecord {
            record_id: RecordId(uuid_from_bytes(&record_id)?),
            subject_id: UserId(uuid_from_bytes(&subject_id)?),
            secret: secret.to_owned(),
            expires_at,
            revoked,
            created_at,
        })
    }
}

#[async_trait::async_trait]
impl RefreshTokenStore for MySqlRefreshTokenStore {
    async fn create(
        &self,
        subject_id: UserId,
        ttl: Duration,
    ) -> Result<RefreshTokenRecord, StoreError> {
        let secret = generate_secret();
        let now = Utc::now();
        let record = RefreshTokenRecord {
            record_id: RecordId::new_v4(),
            subject_id,
            secret,
            expires_at: now + ttl,
            revoked: false,
            created_at: now,
        };

        sqlx::query(
            r#"
INSERT INTO refresh_token (record_id, subject_id, secret_hash, expires_at, revoked, created_at)
VALUES (?, ?, ?, ?, 0, ?)
"#,
        )
        .bind(record.record_id.0.as_bytes().as_slice())
        .bind(record.subject_id.0.as_bytes().as_slice())
        .bind(secret_digest(&record.secret))
        .bind(record.expires_at)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(record)
    }

    async fn find_and_invalidate(
        &self,
        secret: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let digest = secret_digest(secret);
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        let flipped = sqlx::query(
            r#"
UPDATE refresh_token
SET revoked = 1
WHERE secret_hash = ? AND revoked = 0 AND expires_at > ?
"#,
        )
        .bind(&digest)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(store_error)?;

        if flipped.rows_affected() != 1 {
            tx.rollback().await.map_err(store_error)?;
            return Ok(None);
        }

        let row = sqlx::query(
            r#"
SELECT record_id, subject_id, expires_at, revoked, created_at
FROM refresh_token
WHERE secret_hash = ?
"#,
        )
        .bind(&digest)
        .fetch_one(&mut *tx)
        .await
        .map_err(store_error)?;

        tx.commit().await.map_err(store_error)?;

        let record = Self::row_to_record(row, secret)?;
        Ok(Some(RefreshTokenRecord {
            revoked: false,
            ..record
        }))
    }

    async fn revoke(&self, record_id: RecordId) -> Result<(), StoreError> {
        sqlx::query("UPDATE refresh_token SET revoked = 1 WHERE record_id = ?")
            .bind(record_id.0.as_bytes().as_slice())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn revoke_all(&self, subject_id: UserId) -> Result<u64, StoreError> {
        let result =
            sqlx::query("UPDATE refresh_token SET revoked = 1 WHERE subject_id = ? AND revoked = 0")
                .bind(subject_id.0.as_bytes().as_slice())
                .execute(&self.pool)
                .await
                .map_err(store_error)?;
        Ok(result.rows_affected())
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_token WHERE expires_at <= ?")
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected())
    }
}
