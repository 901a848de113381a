use anyhow::{Result, anyhow, bail};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub identity: Identity,
    pub session: Session,
    pub mysql: Option<MySql>,
    pub redis: Option<Redis>,
    pub http: Http,
    pub log: Log,
}

#[derive(Deserialize)]
pub struct Auth {
    pub signing_key: String,
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("signing_key", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .finish()
    }
}

fn default_access_ttl_secs() -> u64 {
    15 * 60
}

fn default_refresh_ttl_secs() -> u64 {
    720 * 60 * 60
}

fn default_store_timeout_ms() -> u64 {
    5_000
}

impl Auth {
    pub fn access_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.access_ttl_secs as i64)
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_ttl_secs as i64)
    }

    pub fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.store_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityBackend {
    Mysql,
    Memory,
}

#[derive(Debug, Deserialize)]
pub struct Identity {
    pub backend: IdentityBackend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    Mysql,
    Redis,
    Memory,
}

#[derive(Debug, Deserialize)]
pub struct Session {
    pub backend: SessionBackend,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_sweep_interval_secs() -> u64 {
    10 * 60
}

#[derive(Deserialize)]
pub struct MySql {
    pub dsn: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl fmt::Debug for MySql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySql")
            .field("dsn", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

fn default_max_connections() -> u32 {
    50
}

#[derive(Deserialize)]
pub struct Redis {
    pub dsn: String,
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

impl fmt::Debug for Redis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Redis")
            .field("dsn", &"<redacted>")
            .field("prefix", &self.prefix)
            .finish()
    }
}

fn default_redis_prefix() -> String {
    "turnstile".to_string()
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
    /// `"*"` or full origins such as `https://app.example.com`. Comma
    /// separated when set through `TURNSTILE__HTTP__CORS_ALLOWED_ORIGINS`.
    #[serde(default = "default_cors_allowed_origins")]
    pub cors_allowed_origins: Vec<String>,
}

fn default_cors_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn is_origin(origin: &str) -> bool {
    match origin.split_once("://") {
        Some((scheme, host)) => {
            matches!(scheme, "http" | "https")
                && !host.is_empty()
                && !host.contains(['/', '?', '#', '@'])
                && !host.contains(char::is_whitespace)
        }
        None => false,
    }
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Environment overrides use this prefix and `__` between path segments,
/// e.g. `TURNSTILE__AUTH__SIGNING_KEY`.
pub const ENV_PREFIX: &str = "TURNSTILE";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);
    build(File::with_name(path))
}

pub fn parse_settings_str(toml: &str) -> Result<Settings> {
    build(File::from_str(toml, FileFormat::Toml))
}

fn build<S>(file: S) -> Result<Settings>
where
    S: config::Source + Send + Sync + 'static,
{
    let settings: Settings = Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("http.cors_allowed_origins"),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    settings.check()?;
    Ok(settings)
}

impl Settings {
    fn check(&self) -> Result<()> {
        if self.auth.signing_key.is_empty() {
            bail!("auth.signing_key is required");
        }
        if self.auth.access_ttl_secs == 0 {
            bail!("auth.access_ttl_secs must be positive");
        }
        if self.auth.refresh_ttl_secs == 0 {
            bail!("auth.refresh_ttl_secs must be positive");
        }
        let wants_mysql = self.identity.backend == IdentityBackend::Mysql
            || self.session.backend == SessionBackend::Mysql;
        if wants_mysql && self.mysql.is_none() {
            bail!("a [mysql] section is required by the selected backends");
        }
        if self.session.backend == SessionBackend::Redis && self.redis.is_none() {
            bail!("a [redis] section is required by session.backend = \"redis\"");
        }
        if self.http.cors_allowed_origins.is_empty() {
            bail!("http.cors_allowed_origins must not be empty");
        }
        if let Some(bad) = self
            .http
            .cors_allowed_origins
            .iter()
            .find(|o| o.as_str() != "*" && !is_origin(o))
        {
            bail!("http.cors_allowed_origins has an invalid origin: {bad:?}");
        }
        if self.http.cert_path.is_some() != self.http.key_path.is_some() {
            bail!("http.cert_path and http.key_path must be set together");
        }
        Ok(())
    }
}
