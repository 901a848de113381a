use super::util::{store_error, uuid_from_bytes};
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

pub struct MySqlCredentialRepo {
    pool: MySqlPool,
}

impl MySqlCredentialRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlCredentialRepo { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<CredentialRecord, StoreError> {
        let user_id_bytes: Vec<u8> = row.try_get("user_id").map_err(store_error)?;
        let user_id = UserId(uuid_from_bytes(&user_id_bytes)?);

        let name: String = row.try_get("name").map_err(store_error)?;
        let email: String = row.try_get("email").map_err(store_error)?;
        let password_hash: String = row.try_get("password_hash").map_err(store_error)?;
        let role: String = row.try_get("role").map_err(store_error)?;
        let role = role.parse::<Role>().map_err(StoreError::Internal)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(store_error)?;

        Ok(CredentialRecord {
            user_id,
            name,
            email,
            password_hash,
            role,
            created_at,
        })
    }
}

#[async_trait::async_trait]
impl CredentialRepo for MySqlCredentialRepo {
    async fn create(&self, credential: NewCredential) -> Result<UserId, StoreError> {
        let user_id = UserId::new_v4();

        sqlx::query(
            r#"
INSERT INTO credential (user_id, name, email, password_hash, role)
VALUES (?, ?, ?, ?, ?)
"#,
        )
        .bind(user_id.0.as_bytes().as_slice())
        .bind(&credential.name)
        .bind(&credential.email)
        .bind(&credential.password_hash)
        .bind(credential.role.as_str())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(user_id)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT user_id, name, email, password_hash, role, created_at
FROM credential
WHERE email = ?
"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<CredentialRecord>, StoreError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT user_id, name, email, password_hash, role, created_at
FROM credential
WHERE user_id = ?
"#,
        )
        .bind(user_id.0.as_bytes().as_slice())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row_opt.map(Self::row_to_record).transpose()
    }
}
