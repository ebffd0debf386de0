pub mod api;

use self::api::{ router, AppState };
use std::error::Error;
use std::net::SocketAddr;
use log::{ info, error };

#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert_path: String,
    pub key_path: String,
}

pub struct Server {
    addr: String,
    state: AppState,
    tls: Option<TlsPaths>,
}

impl Server {
    pub fn new(addr: String, state: AppState, tls: Option<TlsPaths>) -> Self {
        Self { addr, state, tls }
    }

    pub async fn run(self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.addr.parse::<SocketAddr>()?;
        let app = router(self.state);

        match self.tls {
            Some(tls) => {
                info!(
                    "TLS enabled. Loading certificate from '{}' and key from '{}'",
                    tls.cert_path,
                    tls.key_path
                );
                let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                    &tls.cert_path,
                    &tls.key_path
                ).await?;
                info!("HTTPS server listening on: https://{}", addr);
                axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
            }
            None => {
                let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
                    error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
                    e
                })?;
                info!("HTTP server listening on: http://{}", listener.local_addr()?);
                axum::serve(listener, app.into_make_service())
                    .with_graceful_shutdown(shutdown_signal()).await?;
            }
        }

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
