use crate::application_port::{AuthError, CredentialHasher, RegisterInput, UserService};
use crate::domain_model::{Role, UserId, normalize_email};
use crate::domain_port::{CredentialRepo, NewCredential, StoreError};
use super::store_timeout::{DEFAULT_STORE_TIMEOUT, bounded};
use std::sync::Arc;
use tracing::info;

/// Registration and role lookup. Identity store calls share the
/// `store_timeout` bound used by [`super::RealAuthService`].
pub struct RealUserService {
    credential_repo: Arc<dyn CredentialRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    store_timeout: std::time::Duration,
}

impl RealUserService {
    pub fn new(
        credential_repo: Arc<dyn CredentialRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
    ) -> RealUserService {
        RealUserService {
            credential_repo,
            credential_hasher,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, store_timeout: std::time::Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }
}

#[async_trait::async_trait]
impl UserService for RealUserService {
    async fn register(&self, request: RegisterInput) -> Result<UserId, AuthError> {
        let RegisterInput {
            name,
            email,
            password,
        } = request;
        let email = normalize_email(&email);

        let password_hash = self.credential_hasher.hash_password(&password).await?;
        let user_id = bounded(
            self.store_timeout,
            "credential_repo.create",
            self.credential_repo.create(NewCredential {
                name: name.trim().to_string(),
                email,
                password_hash,
                role: Role::User,
            }),
        )
        .await
        .map_err(|e| match e {
                StoreError::Duplicate => AuthError::EmailTaken,
                other => AuthError::from(other),
            })?;

        info!(user_id = %user_id, "user registered");
        Ok(user_id)
    }

    async fn role_of(&self, user_id: UserId) -> Result<Option<Role>, AuthError> {
        let rec = bounded(
            self.store_timeout,
            "credential_repo.find_by_id",
            self.credential_repo.find_by_id(user_id),
        )
        .await?;
        Ok(rec.map(|r| r.role))
    }
}
