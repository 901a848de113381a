use crate::application_port::AuthError;
use crate::domain_model::{Role, UserId};
use std::fmt;

#[derive(Clone)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for RegisterInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterInput")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    async fn register(&self, request: RegisterInput) -> Result<UserId, AuthError>;

    /// `None` when the subject no longer exists.
    async fn role_of(&self, user_id: UserId) -> Result<Option<Role>, AuthError>;
}
