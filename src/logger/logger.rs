use crate::settings::Log;
use anyhow::{Result, anyhow};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

/// Process-wide subscriber. Starts at `info` (or `RUST_LOG`) so settings
/// loading itself is logged, then narrows to the configured filter.
pub struct Logger {
    reload_handle: reload::Handle<EnvFilter, Registry>,
    env_override: bool,
}

impl Logger {
    pub fn new_bootstrap() -> Self {
        let (filter, env_override) = match EnvFilter::try_from_default_env() {
            Ok(filter) => (filter, true),
            Err(_) => (EnvFilter::new("info"), false),
        };
        let (filter, reload_handle) = reload::Layer::new(filter);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();

        Self {
            reload_handle,
            env_override,
        }
    }

    /// Apply `log.filter` unless `RUST_LOG` was set at startup.
    pub fn reload_from_settings(&self, log: &Log) -> Result<()> {
        if self.env_override {
            tracing::debug!("RUST_LOG set, ignoring log.filter");
            return Ok(());
        }
        let filter = EnvFilter::try_new(&log.filter).map_err(|e| anyhow!(e))?;
        self.reload_handle.reload(filter).map_err(|e| anyhow!(e))?;
        Ok(())
    }
}
