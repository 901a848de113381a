use argon2::Params;
use chrono::Duration;
use futures_util::future::join_all;
use std::sync::Arc;
use turnstile::application_impl::*;
use turnstile::application_port::*;
use turnstile::domain_model::Role;
use turnstile::infra_memory::*;

const SIGNING_KEY: &[u8] = b"integration-signing-key";

struct Harness {
    auth: Arc<RealAuthService>,
    users: RealUserService,
    codec: Arc<JwtHs256Codec>,
    store: Arc<MemoryRefreshTokenStore>,
    repo: Arc<MemoryCredentialRepo>,
}

fn harness() -> Harness {
    let repo = Arc::new(MemoryCredentialRepo::new());
    let store = Arc::new(MemoryRefreshTokenStore::new());
    let codec = Arc::new(JwtHs256Codec::new(JwtConfig {
        signing_key: SIGNING_KEY.to_vec(),
        access_ttl: Duration::seconds(900),
    }));
    // cheap parameters, same algorithm
    let hasher = Arc::new(Argon2PasswordHasher::with_params(
        Params::new(1024, 1, 1, None).unwrap(),
    ));

    let auth = Arc::new(RealAuthService::new(
        repo.clone(),
        hasher.clone(),
        codec.clone(),
        store.clone(),
        Duration::days(30),
    ));
    let users = RealUserService::new(repo.clone(), hasher);
    Harness {
        auth,
        users,
        codec,
        store,
        repo,
    }
}

async fn register(h: &Harness, email: &str, password: &str) -> turnstile::domain_model::UserId {
    h.users
        .register(RegisterInput {
            name: "Grace Hopper".into(),
            email: email.into(),
            password: password.into(),
        })
        .await
        .unwrap()
}

fn login_input(email: &str, password: &str) -> LoginInput {
    LoginInput {
        email: email.into(),
        password: password.into(),
    }
}

#[tokio::test]
async fn login_then_refresh_rotates_the_secret() {
    let h = harness();
    let id = register(&h, "grace@example.com", "cobol1959").await;

    let first = h
        .auth
        .login(login_input("grace@example.com", "cobol1959"))
        .await
        .unwrap();
    assert_eq!(first.access_token_expires_in, 900);
    assert_eq!(first.token_type, TOKEN_TYPE_BEARER);

    let claims = h.codec.decode(&first.access_token).unwrap();
    assert_eq!(claims.subject, id);
    assert_eq!(claims.email, "grace@example.com");

    let second = h.auth.refresh(&first.refresh_secret).await.unwrap();
    assert_ne!(second.refresh_secret, first.refresh_secret);
    assert_eq!(h.codec.decode(&second.access_token).unwrap().subject, id);

    // the old secret is spent
    assert!(matches!(
        h.auth.refresh(&first.refresh_secret).await,
        Err(AuthError::InvalidOrExpiredToken)
    ));
    // the new one works exactly once too
    let third = h.auth.refresh(&second.refresh_secret).await.unwrap();
    assert!(h.auth.refresh(&second.refresh_secret).await.is_err());
    assert!(h.auth.authenticate(&third.access_token).await.is_ok());
}

#[tokio::test]
async fn login_accepts_any_email_casing() {
    let h = harness();
    register(&h, "Grace@Example.com", "cobol1959").await;

    let pair = h
        .auth
        .login(login_input("  GRACE@example.COM ", "cobol1959"))
        .await
        .unwrap();
    assert_eq!(
        h.codec.decode(&pair.access_token).unwrap().email,
        "grace@example.com"
    );
}

#[tokio::test]
async fn unknown_email_and_wrong_password_look_the_same() {
    let h = harness();
    register(&h, "grace@example.com", "cobol1959").await;

    let unknown = h
        .auth
        .login(login_input("nobody@example.com", "cobol1959"))
        .await
        .unwrap_err();
    let wrong = h
        .auth
        .login(login_input("grace@example.com", "fortran57"))
        .await
        .unwrap_err();
    assert_eq!(unknown.to_string(), wrong.to_string());
    assert!(matches!(unknown, AuthError::InvalidCredentials));
    assert!(h.store.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_refresh_has_one_winner() {
    let h = harness();
    register(&h, "grace@example.com", "cobol1959").await;
    let pair = h
        .auth
        .login(login_input("grace@example.com", "cobol1959"))
        .await
        .unwrap();

    let attempts = (0..16).map(|_| {
        let auth = h.auth.clone();
        let secret = pair.refresh_secret.clone();
        tokio::spawn(async move { auth.refresh(&secret).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, AuthError::InvalidOrExpiredToken))
    );
}

#[tokio::test]
async fn refresh_picks_up_a_changed_email() {
    let h = harness();
    let id = register(&h, "grace@example.com", "cobol1959").await;
    let pair = h
        .auth
        .login(login_input("grace@example.com", "cobol1959"))
        .await
        .unwrap();

    h.repo.set_email(id, "admiral@example.com");
    let next = h.auth.refresh(&pair.refresh_secret).await.unwrap();
    assert_eq!(
        h.codec.decode(&next.access_token).unwrap().email,
        "admiral@example.com"
    );
}

#[tokio::test]
async fn logout_revokes_only_the_calling_session() {
    let h = harness();
    register(&h, "grace@example.com", "cobol1959").await;
    let laptop = h
        .auth
        .login(login_input("grace@example.com", "cobol1959"))
        .await
        .unwrap();
    let phone = h
        .auth
        .login(login_input("grace@example.com", "cobol1959"))
        .await
        .unwrap();

    let claims = h.auth.authenticate(&laptop.access_token).await.unwrap();
    h.auth.logout(&claims).await.unwrap();

    assert!(h.auth.refresh(&laptop.refresh_secret).await.is_err());
    assert!(h.auth.refresh(&phone.refresh_secret).await.is_ok());
}

#[tokio::test]
async fn logout_all_revokes_every_session() {
    let h = harness();
    let id = register(&h, "grace@example.com", "cobol1959").await;
    let mut secrets = Vec::new();
    for _ in 0..3 {
        let pair = h
            .auth
            .login(login_input("grace@example.com", "cobol1959"))
            .await
            .unwrap();
        secrets.push(pair.refresh_secret);
    }

    assert_eq!(h.auth.logout_all(id).await.unwrap(), 3);
    assert_eq!(h.auth.logout_all(id).await.unwrap(), 0);
    for secret in secrets {
        assert!(h.auth.refresh(&secret).await.is_err());
    }
}

#[tokio::test]
async fn register_twice_is_email_taken() {
    let h = harness();
    let id = register(&h, "grace@example.com", "cobol1959").await;
    assert_eq!(h.users.role_of(id).await.unwrap(), Some(Role::User));

    let err = h
        .users
        .register(RegisterInput {
            name: "Impostor".into(),
            email: "GRACE@example.com".into(),
            password: "whatever1".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::EmailTaken));
}
