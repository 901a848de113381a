use super::AuthError;

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;

    /// `false` on mismatch, on an unparseable hash and on any internal
    /// failure. Never errors.
    async fn verify_password(&self, password: &str, password_hash: &str) -> bool;
}
