//! Connector binding.
//!
//! # Responsibilities
//! - Bind one listening socket per connector
//! - Serve plain or TLS connections with the connector's router
//! - Report bind failures before startup is considered complete
//! - Drain connections on shutdown

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tokio::task::JoinHandle;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// The serving task ended with an error.
    #[error("connector {addr} failed: {source}")]
    Serve {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// The serving task panicked or was cancelled.
    #[error("connector task for {addr} did not complete")]
    Join { addr: SocketAddr },
}

/// A connector whose socket is bound and serving.
#[derive(Debug)]
pub struct BoundConnector {
    local_addr: SocketAddr,
    handle: Handle,
    task: JoinHandle<io::Result<()>>,
}

impl BoundConnector {
    /// Bind `port` on all interfaces and start serving `app`.
    ///
    /// Returns once the socket is listening, or with the bind error.
    pub async fn bind(
        port: u16,
        app: Router,
        tls: Option<RustlsConfig>,
    ) -> Result<Self, ListenerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let handle = Handle::new();
        let service = app.into_make_service_with_connect_info::<SocketAddr>();

        let task = match tls {
            Some(config) => tokio::spawn(
                axum_server::bind_rustls(addr, config)
                    .handle(handle.clone())
                    .serve(service),
            ),
            None => tokio::spawn(axum_server::bind(addr).handle(handle.clone()).serve(service)),
        };

        match handle.listening().await {
            Some(local_addr) => {
                tracing::info!(address = %local_addr, "Listener bound");
                Ok(Self {
                    local_addr,
                    handle,
                    task,
                })
            }
            None => Err(match task.await {
                Ok(Err(source)) => ListenerError::Bind { addr, source },
                Ok(Ok(())) => ListenerError::Bind {
                    addr,
                    source: io::Error::new(io::ErrorKind::Other, "listener closed before binding"),
                },
                Err(_) => ListenerError::Join { addr },
            }),
        }
    }

    /// Get the local address this connector is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, drain open connections for up to `grace`, then close.
    pub async fn shutdown(self, grace: Duration) -> Result<(), ListenerError> {
        let addr = self.local_addr;
        self.handle.graceful_shutdown(Some(grace));
        match self.task.await {
            Ok(Ok(())) => {
                tracing::info!(address = %addr, "Listener closed");
                Ok(())
            }
            Ok(Err(source)) => Err(ListenerError::Serve { addr, source }),
            Err(_) => Err(ListenerError::Join { addr }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let occupied = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
        let port = occupied.local_addr().unwrap().port();

        let err = BoundConnector::bind(port, Router::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ListenerError::Bind { .. }));
    }

    #[tokio::test]
    async fn bind_and_shutdown() {
        let listener = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let connector = BoundConnector::bind(port, Router::new(), None).await.unwrap();
        assert_eq!(connector.local_addr().port(), port);
        connector.shutdown(Duration::from_millis(100)).await.unwrap();
    }
}
