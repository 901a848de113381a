use super::StoreError;
use crate::domain_model::*;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCredential {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// The identity store. Emails are expected in normalized form.
#[async_trait::async_trait]
pub trait CredentialRepo: Send + Sync {
    /// Insert a credential. A taken email yields `StoreError::Duplicate`.
    async fn create(&self, credential: NewCredential) -> Result<UserId, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<CredentialRecord>, StoreError>;

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<CredentialRecord>, StoreError>;
}
