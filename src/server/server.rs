use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::{IdentityBackend, SessionBackend, Settings};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Everything a request handler needs, built once at startup and passed
/// down by reference. Nothing in here is torn down while requests run;
/// `shutdown` is for after the listener has stopped.
pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub user_service: Arc<dyn UserService>,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    pool: Option<MySqlPool>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let wants_mysql = settings.identity.backend == IdentityBackend::Mysql
            || settings.session.backend == SessionBackend::Mysql;
        let pool = match (&settings.mysql, wants_mysql) {
            (Some(mysql), true) => {
                let pool = MySqlPoolOptions::new()
                    .max_connections(mysql.max_connections)
                    .acquire_timeout(settings.auth.store_timeout())
                    .connect(&mysql.dsn)
                    .await?;
                ensure_schema(&pool).await?;
                info!("connected to mysql");
                Some(pool)
            }
            (None, true) => return Err(anyhow::anyhow!("mysql backend selected without [mysql]")),
            (_, false) => None,
        };

        let credential_repo: Arc<dyn CredentialRepo> = match settings.identity.backend {
            IdentityBackend::Mysql => Arc::new(MySqlCredentialRepo::new(require(&pool)?)),
            IdentityBackend::Memory => {
                warn!("identity backend is in-memory; credentials vanish on restart");
                Arc::new(MemoryCredentialRepo::new())
            }
        };

        let refresh_store: Arc<dyn RefreshTokenStore> = match settings.session.backend {
            SessionBackend::Mysql => Arc::new(MySqlRefreshTokenStore::new(require(&pool)?)),
            SessionBackend::Redis => {
                let redis = settings
                    .redis
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("redis backend selected without [redis]"))?;
                let client = redis::Client::open(redis.dsn.as_str())?;
                let manager = client.get_connection_manager().await?;
                info!(prefix = %redis.prefix, "connected to redis");
                Arc::new(RedisRefreshTokenStore::new(manager, redis.prefix.clone()))
            }
            SessionBackend::Memory => {
                warn!("session backend is in-memory; sessions vanish on restart");
                Arc::new(MemoryRefreshTokenStore::new())
            }
        };

        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher::new());
        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(JwtConfig {
            signing_key: settings.auth.signing_key.clone().into_bytes(),
            access_ttl: settings.auth.access_ttl(),
        }));

        let auth_service: Arc<dyn AuthService> = Arc::new(
            RealAuthService::new(
                credential_repo.clone(),
                credential_hasher.clone(),
                token_codec,
                refresh_store.clone(),
                settings.auth.refresh_ttl(),
            )
            .with_store_timeout(settings.auth.store_timeout()),
        );
        let user_service: Arc<dyn UserService> = Arc::new(
            RealUserService::new(credential_repo, credential_hasher)
                .with_store_timeout(settings.auth.store_timeout()),
        );

        let server = Self::from_parts(auth_service, user_service, pool);
        server.start_sweeper(
            refresh_store,
            Duration::from_secs(settings.session.sweep_interval_secs),
        );
        Ok(server)
    }

    pub fn from_parts(
        auth_service: Arc<dyn AuthService>,
        user_service: Arc<dyn UserService>,
        pool: Option<MySqlPool>,
    ) -> Self {
        Server {
            auth_service,
            user_service,
            sweeper_handle: Mutex::new(None),
            cancel: CancellationToken::new(),
            pool,
        }
    }

    /// Periodically drop expired refresh records. A zero interval disables it.
    pub fn start_sweeper(&self, store: Arc<dyn RefreshTokenStore>, every: Duration) {
        if every.is_zero() {
            return;
        }

        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => match store.purge_expired().await {
                        Ok(0) => {}
                        Ok(purged) => debug!(purged, "expired refresh records purged"),
                        Err(e) => warn!(error = %e, "refresh record purge failed"),
                    },
                }
            }
        });

        if let Ok(mut lock) = self.sweeper_handle.lock() {
            if let Some(old) = lock.replace(handle) {
                old.abort();
            }
        }
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = self.sweeper_handle.lock().ok().and_then(|mut lock| lock.take());
        if let Some(handle) = handle {
            let r = handle.await;
            info!("sweeper handle dropped: {:?}", r);
        }

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

fn require(pool: &Option<MySqlPool>) -> anyhow::Result<MySqlPool> {
    pool.clone()
        .ok_or_else(|| anyhow::anyhow!("mysql backend selected without [mysql]"))
}
