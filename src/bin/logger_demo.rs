use turnstile::logger::*;
use turnstile::settings::Log;

fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    trace!("bootstrap trace log");
    debug!("bootstrap debug log");
    info!("bootstrap info log");

    let log = Log {
        filter: "turnstile=debug".to_string(),
    };
    logger.reload_from_settings(&log)?;
    trace!("application trace log");
    debug!("application debug log");
    info!("application info log");

    Ok(())
}
