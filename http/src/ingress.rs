//! # Ingress Module - HTTP Entry Point
//!
//! `HttpIngress` is the transport adapter, not a web server: every `POST`
//! on any path is one engine dispatch.
//!
//! ## API Surface
//!
//! - `bind(addr)` - where to listen
//! - `compress(bool)` / `max_body_bytes(n)` - body handling
//! - `run()` / `run_with_shutdown(signal)` - accept loop
//! - `into_service()` - escape hatch to the raw hyper service

use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;

use callo_runtime::Engine;

use crate::config::HttpConfig;
use crate::service::CalloService;

#[derive(Error, Debug)]
pub enum IngressError {
    #[error("invalid bind address {addr:?}: {source}")]
    Addr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP ingress for one engine.
pub struct HttpIngress {
    engine: Engine,
    config: HttpConfig,
}

impl HttpIngress {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            config: HttpConfig::default(),
        }
    }

    pub fn config(mut self, config: HttpConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the bind address for the server.
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.config.bind = addr.into();
        self
    }

    pub fn compress(mut self, enabled: bool) -> Self {
        self.config.compress = enabled;
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.config.max_body_bytes = limit;
        self
    }

    pub fn into_service(self) -> CalloService {
        CalloService::new(self.engine, self.config)
    }

    /// Run until the process is interrupted (Ctrl-C).
    pub async fn run(self) -> Result<(), IngressError> {
        self.run_with_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn run_with_shutdown(
        self,
        shutdown: impl Future<Output = ()> + Send,
    ) -> Result<(), IngressError> {
        let addr: SocketAddr = self.config.bind.parse().map_err(|source| IngressError::Addr {
            addr: self.config.bind.clone(),
            source,
        })?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    /// In-flight connections are left to finish on their own tasks.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send,
    ) -> Result<(), IngressError> {
        let local = listener.local_addr()?;
        let service = self.into_service();
        tracing::info!("Callo HTTP ingress listening on http://{}", local);

        tokio::pin!(shutdown);
        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(err) => {
                        tracing::warn!(error = %err, "Failed to accept connection");
                        continue;
                    }
                },
                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received; no longer accepting connections");
                    return Ok(());
                }
            };

            let io = TokioIo::new(stream);
            let service = service.clone();
            tokio::task::spawn(async move {
                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::debug!(%peer, "Error serving connection: {:?}", err);
                }
            });
        }
    }
}
