use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use turnstile::api;
use turnstile::logger::*;
use turnstile::server::*;
use turnstile::settings::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    info!(?project_settings);
    logger.reload_from_settings(&project_settings.log)?;

    let address: SocketAddr = project_settings.http.address.parse()?;
    let tls = match (&project_settings.http.cert_path, &project_settings.http.key_path) {
        (Some(cert), Some(key)) => {
            for path in [cert, key] {
                if !fs::metadata(path)?.is_file() {
                    return Err(anyhow::anyhow!("TLS file is not a regular file: {:?}", path));
                }
            }
            Some((cert.clone(), key.clone()))
        }
        (None, None) => {
            warn!("no TLS material configured, serving plain HTTP");
            None
        }
        _ => return Err(anyhow::anyhow!("http.cert_path and http.key_path go together")),
    };

    let server = Arc::new(Server::try_new(&project_settings).await?);

    let app = api::app(server.clone(), &project_settings.http.cors_allowed_origins);

    let shutdown_signal = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("could not listen for SIGINT: {}", e);
        }
    };

    info!(%address, tls = tls.is_some(), "listening");
    match tls {
        Some((cert, key)) => {
            warp::serve(app)
                .tls()
                .cert_path(cert)
                .key_path(key)
                .bind_with_graceful_shutdown(address, shutdown_signal)
                .1
                .await
        }
        None => {
            warp::serve(app)
                .try_bind_with_graceful_shutdown(address, shutdown_signal)?
                .1
                .await
        }
    }

    let shutdown_timeout = std::time::Duration::from_secs(30);
    match tokio::time::timeout(shutdown_timeout, server.shutdown()).await {
        Ok(_) => info!("server shutdown successfully"),
        Err(_) => error!("server shutdown timed out"),
    }

    Ok(())
}
