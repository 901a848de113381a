use crate::domain_port::StoreError;
use sqlx::mysql::MySqlDatabaseError;
use uuid::Uuid;

pub fn is_dup_key(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db) = err {
        if let Some(mysql_err) = db.try_downcast_ref::<MySqlDatabaseError>() {
            return mysql_err.number() == 1062; // ER_DUP_ENTRY
        }
    }

    false
}

/// Connection-level failures are transient; everything else is not.
pub fn store_error(err: sqlx::Error) -> StoreError {
    if is_dup_key(&err) {
        return StoreError::Duplicate;
    }
    match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
        _ => StoreError::Internal(err.to_string()),
    }
}

#[inline]
pub fn uuid_from_bytes(bytes: &[u8]) -> Result<Uuid, StoreError> {
    Uuid::from_slice(bytes).map_err(|e| StoreError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_exhaustion_is_transient() {
        assert!(store_error(sqlx::Error::PoolTimedOut).is_transient());
        assert!(store_error(sqlx::Error::PoolClosed).is_transient());
    }

    #[test]
    fn missing_row_is_not_transient() {
        assert!(!store_error(sqlx::Error::RowNotFound).is_transient());
    }

    #[test]
    fn short_uuid_is_an_internal_error() {
        assert!(matches!(uuid_from_bytes(&[1, 2, 3]), Err(StoreError::Internal(_))));
    }
}
