use super::DUMMY_PASSWORD_HASH;
use super::store_timeout::{DEFAULT_STORE_TIMEOUT, bounded};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Duration;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Login and refresh-token rotation.
///
/// Holds no mutable state of its own; every durable transition happens in
/// the [`RefreshTokenStore`]. Each store call is bounded by `store_timeout`
/// and an elapsed timeout surfaces as [`AuthError::StoreUnavailable`].
///
/// A `refresh` that times out may still have committed its rotation, in
/// which case a retry with the same secret fails with
/// [`AuthError::InvalidOrExpiredToken`] and the client has to log in again.
pub struct RealAuthService {
    credential_repo: Arc<dyn CredentialRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_codec: Arc<dyn TokenCodec>,
    refresh_store: Arc<dyn RefreshTokenStore>,
    refresh_ttl: Duration,
    store_timeout: std::time::Duration,
}

impl RealAuthService {
    pub fn new(
        credential_repo: Arc<dyn CredentialRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
        refresh_store: Arc<dyn RefreshTokenStore>,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            credential_repo,
            credential_hasher,
            token_codec,
            refresh_store,
            refresh_ttl,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, store_timeout: std::time::Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        bounded(self.store_timeout, op, fut).await.map_err(AuthError::from)
    }

    /// The only place tokens are minted: both halves or neither.
    async fn issue(&self, subject_id: UserId, email: &str) -> Result<TokenPair, AuthError> {
        let record = self
            .bounded(
                "refresh_store.create",
                self.refresh_store.create(subject_id, self.refresh_ttl),
            )
            .await?;

        let access_token = match self.token_codec.encode(
            subject_id,
            email,
            record.record_id,
            self.token_codec.access_ttl(),
        ) {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, user_id = %subject_id, "access token encode failed");
                // the secret was never handed out; make sure it never can be
                if let Err(e) = self
                    .bounded("refresh_store.revoke", self.refresh_store.revoke(record.record_id))
                    .await
                {
                    warn!(error = %e, "could not revoke orphaned refresh record");
                }
                return Err(AuthError::InternalError(e.to_string()));
            }
        };

        info!(user_id = %subject_id, session_id = %record.record_id, "tokens issued");
        Ok(TokenPair {
            access_token,
            access_token_expires_in: self.token_codec.access_ttl_seconds(),
            refresh_secret: record.secret,
            token_type: TOKEN_TYPE_BEARER,
        })
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn login(&self, request: LoginInput) -> Result<TokenPair, AuthError> {
        let LoginInput { email, password } = request;
        let email = normalize_email(&email);

        let rec = self
            .bounded(
                "credential_repo.find_by_email",
                self.credential_repo.find_by_email(&email),
            )
            .await?;

        let Some(rec) = rec else {
            // same cost as a wrong password so unknown emails are not observable
            let _ = self
                .credential_hasher
                .verify_password(&password, DUMMY_PASSWORD_HASH)
                .await;
            debug!("login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !self
            .credential_hasher
            .verify_password(&password, &rec.password_hash)
            .await
        {
            debug!(user_id = %rec.user_id, "login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        self.issue(rec.user_id, &rec.email).await
    }

    async fn refresh(&self, refresh_secret: &str) -> Result<TokenPair, AuthError> {
        let consumed = self
            .bounded(
                "refresh_store.find_and_invalidate",
                self.refresh_store.find_and_invalidate(refresh_secret),
            )
            .await?;

        let Some(record) = consumed else {
            warn!("refresh secret rejected");
            return Err(AuthError::InvalidOrExpiredToken);
        };

        // re-resolve so a changed email shows up in the next access token
        let subject = self
            .bounded(
                "credential_repo.find_by_id",
                self.credential_repo.find_by_id(record.subject_id),
            )
            .await?;
        let Some(subject) = subject else {
            warn!(user_id = %record.subject_id, "refresh for a subject that no longer exists");
            return Err(AuthError::InvalidOrExpiredToken);
        };

        debug!(user_id = %record.subject_id, session_id = %record.record_id, "refresh secret rotated");
        self.issue(subject.user_id, &subject.email).await
    }

    async fn authenticate(&self, access_token: &str) -> Result<AccessTokenClaims, AuthError> {
        self.token_codec
            .decode(access_token)
            .map_err(|e| match e {
                TokenError::AlgorithmRejected => {
                    warn!("access token with foreign algorithm");
                    AuthError::AlgorithmRejected
                }
                TokenError::Encode(e) => AuthError::InternalError(e),
                _ => AuthError::InvalidOrExpiredToken,
            })
    }

    async fn logout(&self, claims: &AccessTokenClaims) -> Result<(), AuthError> {
        self.bounded(
            "refresh_store.revoke",
            self.refresh_store.revoke(claims.session_id),
        )
        .await?;
        info!(user_id = %claims.subject, session_id = %claims.session_id, "session revoked");
        Ok(())
    }

    async fn logout_all(&self, subject_id: UserId) -> Result<u64, AuthError> {
        let revoked = self
            .bounded(
                "refresh_store.revoke_all",
                self.refresh_store.revoke_all(subject_id),
            )
            .await?;
        info!(user_id = %subject_id, revoked, "all sessions revoked");
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{JwtConfig, JwtHs256Codec};
    use crate::infra_memory::{MemoryCredentialRepo, MemoryRefreshTokenStore};
    use chrono::Utc;

    /// Plaintext "hasher" so the orchestration tests stay fast.
    struct PlainHasher;

    #[async_trait::async_trait]
    impl CredentialHasher for PlainHasher {
        async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
            Ok(format!("plain:{password}"))
        }

        async fn verify_password(&self, password: &str, password_hash: &str) -> bool {
            password_hash == format!("plain:{password}")
        }
    }

    /// A store whose every call hangs past any sane timeout.
    struct StalledStore;

    #[async_trait::async_trait]
    impl RefreshTokenStore for StalledStore {
        async fn create(&self, _: UserId, _: Duration) -> Result<RefreshTokenRecord, StoreError> {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Err(StoreError::Internal("unreachable".into()))
        }

        async fn find_and_invalidate(
            &self,
            _: &str,
        ) -> Result<Option<RefreshTokenRecord>, StoreError> {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok(None)
        }

        async fn revoke(&self, _: RecordId) -> Result<(), StoreError> {
            Ok(())
        }

        async fn revoke_all(&self, _: UserId) -> Result<u64, StoreError> {
            Ok(0)
        }

        async fn purge_expired(&self) -> Result<u64, StoreError> {
            Ok(0)
        }
    }

    /// A store that is down.
    struct DownStore;

    #[async_trait::async_trait]
    impl RefreshTokenStore for DownStore {
        async fn create(&self, _: UserId, _: Duration) -> Result<RefreshTokenRecord, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn find_and_invalidate(
            &self,
            _: &str,
        ) -> Result<Option<RefreshTokenRecord>, StoreError> {
            Err(StoreError::Internal("syntax error near 'revoked'".into()))
        }

        async fn revoke(&self, _: RecordId) -> Result<(), StoreError> {
            Ok(())
        }

        async fn revoke_all(&self, _: UserId) -> Result<u64, StoreError> {
            Ok(0)
        }

        async fn purge_expired(&self) -> Result<u64, StoreError> {
            Ok(0)
        }
    }

    fn codec() -> Arc<JwtHs256Codec> {
        Arc::new(JwtHs256Codec::new(JwtConfig {
            signing_key: b"unit-test-secret".to_vec(),
            access_ttl: Duration::minutes(15),
        }))
    }

    async fn seeded_repo() -> (Arc<MemoryCredentialRepo>, UserId) {
        let repo = Arc::new(MemoryCredentialRepo::new());
        let id = repo
            .create(NewCredential {
                name: "Alice".into(),
                email: "alice@example.com".into(),
                password_hash: "plain:p@ss1".into(),
                role: Role::User,
            })
            .await
            .unwrap();
        (repo, id)
    }

    async fn service_with(store: Arc<dyn RefreshTokenStore>) -> (RealAuthService, Arc<MemoryCredentialRepo>, UserId) {
        let (repo, id) = seeded_repo().await;
        let svc = RealAuthService::new(
            repo.clone(),
            Arc::new(PlainHasher),
            codec(),
            store,
            Duration::days(30),
        );
        (svc, repo, id)
    }

    fn login_input(email: &str, password: &str) -> LoginInput {
        LoginInput {
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn login_issues_a_bearer_pair() {
        let (svc, _, id) = service_with(Arc::new(MemoryRefreshTokenStore::new())).await;
        let pair = svc.login(login_input("alice@example.com", "p@ss1")).await.unwrap();

        assert_eq!(pair.token_type, "bearer");
        assert_eq!(pair.access_token_expires_in, 900);
        let claims = svc.authenticate(&pair.access_token).await.unwrap();
        assert_eq!(claims.subject, id);
        assert_eq!(claims.email, "alice@example.com");
    }

    #[tokio::test]
    async fn login_normalizes_email() {
        let (svc, _, _) = service_with(Arc::new(MemoryRefreshTokenStore::new())).await;
        assert!(svc.login(login_input("  ALICE@example.com ", "p@ss1")).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_look_identical() {
        let (svc, _, _) = service_with(Arc::new(MemoryRefreshTokenStore::new())).await;
        let unknown = svc.login(login_input("bob@example.com", "p@ss1")).await.unwrap_err();
        let wrong = svc.login(login_input("alice@example.com", "nope")).await.unwrap_err();
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn refresh_rotates_once() {
        let (svc, _, _) = service_with(Arc::new(MemoryRefreshTokenStore::new())).await;
        let pair = svc.login(login_input("alice@example.com", "p@ss1")).await.unwrap();

        let next = svc.refresh(&pair.refresh_secret).await.unwrap();
        assert_ne!(next.refresh_secret, pair.refresh_secret);

        let replay = svc.refresh(&pair.refresh_secret).await.unwrap_err();
        assert!(matches!(replay, AuthError::InvalidOrExpiredToken));
        assert!(svc.refresh(&next.refresh_secret).await.is_ok());
    }

    #[tokio::test]
    async fn refresh_picks_up_current_email() {
        let (svc, repo, id) = service_with(Arc::new(MemoryRefreshTokenStore::new())).await;
        let pair = svc.login(login_input("alice@example.com", "p@ss1")).await.unwrap();

        repo.set_email(id, "alice@new.example.com");
        let next = svc.refresh(&pair.refresh_secret).await.unwrap();
        let claims = svc.authenticate(&next.access_token).await.unwrap();
        assert_eq!(claims.email, "alice@new.example.com");
    }

    #[tokio::test]
    async fn refresh_for_vanished_subject_fails_and_stays_consumed() {
        let (svc, repo, id) = service_with(Arc::new(MemoryRefreshTokenStore::new())).await;
        let pair = svc.login(login_input("alice@example.com", "p@ss1")).await.unwrap();

        repo.remove(id);
        let err = svc.refresh(&pair.refresh_secret).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpiredToken));
    }

    #[tokio::test]
    async fn unknown_secret_is_invalid() {
        let (svc, _, _) = service_with(Arc::new(MemoryRefreshTokenStore::new())).await;
        let err = svc.refresh("never-issued").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpiredToken));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn expired_secret_is_invalid() {
        let (repo, _) = seeded_repo().await;
        let svc = RealAuthService::new(
            repo,
            Arc::new(PlainHasher),
            codec(),
            Arc::new(MemoryRefreshTokenStore::new()),
            Duration::seconds(-1),
        );
        let pair = svc.login(login_input("alice@example.com", "p@ss1")).await.unwrap();
        let err = svc.refresh(&pair.refresh_secret).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpiredToken));
    }

    #[tokio::test]
    async fn logout_kills_only_that_session() {
        let (svc, _, _) = service_with(Arc::new(MemoryRefreshTokenStore::new())).await;
        let laptop = svc.login(login_input("alice@example.com", "p@ss1")).await.unwrap();
        let phone = svc.login(login_input("alice@example.com", "p@ss1")).await.unwrap();

        let claims = svc.authenticate(&laptop.access_token).await.unwrap();
        svc.logout(&claims).await.unwrap();
        svc.logout(&claims).await.unwrap();

        assert!(matches!(
            svc.refresh(&laptop.refresh_secret).await,
            Err(AuthError::InvalidOrExpiredToken)
        ));
        assert!(svc.refresh(&phone.refresh_secret).await.is_ok());
    }

    #[tokio::test]
    async fn logout_all_kills_every_session() {
        let (svc, _, id) = service_with(Arc::new(MemoryRefreshTokenStore::new())).await;
        let a = svc.login(login_input("alice@example.com", "p@ss1")).await.unwrap();
        let b = svc.login(login_input("alice@example.com", "p@ss1")).await.unwrap();

        assert_eq!(svc.logout_all(id).await.unwrap(), 2);
        assert_eq!(svc.logout_all(id).await.unwrap(), 0);
        assert!(svc.refresh(&a.refresh_secret).await.is_err());
        assert!(svc.refresh(&b.refresh_secret).await.is_err());
    }

    #[tokio::test]
    async fn stalled_store_times_out_as_retryable() {
        let (svc, _, _) = service_with(Arc::new(StalledStore)).await;
        let svc = svc.with_store_timeout(std::time::Duration::from_millis(20));

        let err = svc.refresh("whatever").await.unwrap_err();
        assert!(matches!(err, AuthError::StoreUnavailable(_)));
        assert!(err.is_retryable());

        let err = svc.login(login_input("alice@example.com", "p@ss1")).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn store_failures_split_into_transient_and_internal() {
        let (svc, _, _) = service_with(Arc::new(DownStore)).await;

        let err = svc.login(login_input("alice@example.com", "p@ss1")).await.unwrap_err();
        assert!(matches!(err, AuthError::StoreUnavailable(_)));

        let err = svc.refresh("whatever").await.unwrap_err();
        assert!(matches!(err, AuthError::InternalError(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn authenticate_maps_codec_failures() {
        let (svc, _, id) = service_with(Arc::new(MemoryRefreshTokenStore::new())).await;

        assert!(matches!(
            svc.authenticate("garbage").await,
            Err(AuthError::InvalidOrExpiredToken)
        ));

        let expired = codec()
            .encode(id, "alice@example.com", RecordId::new_v4(), Duration::seconds(-5))
            .unwrap();
        assert!(matches!(
            svc.authenticate(&expired).await,
            Err(AuthError::InvalidOrExpiredToken)
        ));

        let hs512 = jsonwebtoken::encode(
            &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS512),
            &serde_json::json!({
                "sub": id.to_string(),
                "email": "alice@example.com",
                "sid": RecordId::new_v4().to_string(),
                "iat": Utc::now().timestamp(),
                "exp": Utc::now().timestamp() + 600,
            }),
            &jsonwebtoken::EncodingKey::from_secret(b"unit-test-secret"),
        )
        .unwrap();
        assert!(matches!(
            svc.authenticate(&hs512).await,
            Err(AuthError::AlgorithmRejected)
        ));
    }
}
