use crate::application_port::{AuthError, CredentialHasher};
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use tracing::{error, warn};

/// A well-formed PHC string that no password verifies against. Checked on
/// logins for unknown emails so they cost the same as a wrong password.
pub const DUMMY_PASSWORD_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Argon2id with the fixed cost m=19456 KiB, t=2, p=1 (`Params::DEFAULT`).
/// One verification takes a few tens of milliseconds on a commodity core.
///
/// Both operations run on the blocking pool so they never stall the
/// reactor.
#[derive(Clone)]
pub struct Argon2PasswordHasher {
    argon2: Argon2<'static>,
}

impl Argon2PasswordHasher {
    pub fn new() -> Self {
        Self::with_params(Params::DEFAULT)
    }

    pub fn with_params(params: Params) -> Self {
        Argon2PasswordHasher {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

impl Default for Argon2PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CredentialHasher for Argon2PasswordHasher {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let argon2 = self.argon2.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
        })
        .await
        .map_err(|e| AuthError::InternalError(format!("hash task: {e}")))?
        .map_err(|e| AuthError::InternalError(format!("hash: {e}")))
    }

    async fn verify_password(&self, password: &str, password_hash: &str) -> bool {
        if password_hash.is_empty() {
            return false;
        }

        let argon2 = self.argon2.clone();
        let password = password.to_owned();
        let password_hash = password_hash.to_owned();
        let outcome = tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&password_hash)?;
            argon2.verify_password(password.as_bytes(), &parsed)
        })
        .await;

        match outcome {
            Ok(Ok(())) => true,
            Ok(Err(argon2::password_hash::Error::Password)) => false,
            Ok(Err(e)) => {
                warn!(error = %e, "stored password hash rejected");
                false
            }
            Err(e) => {
                error!(error = %e, "password verification task failed");
                false
            }
        }
    }
}
