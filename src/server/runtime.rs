//! Axum-backed server runtime.
//!
//! Every connector gets its own router holding all contexts, so a context
//! descriptor can behave differently on plain and secure connectors.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use futures_util::future::join_all;
use tracing_appender::non_blocking::WorkerGuard;

use crate::config::loader::load_server_descriptor;
use crate::http::context::{unpack_archive, ContextError, MountedContext};
use crate::http::middleware::access_log::AccessLog;
use crate::http::server::build_router;
use crate::net::listener::BoundConnector;
use crate::net::tls::load_tls_config;
use crate::server::external::plan_from_descriptor;
use crate::server::plan::{ConnectorKind, ConnectorSpec, EmbeddedPlan};
use crate::server::{ExternalSpec, RunningServer, ServerError, ServerRuntime};

/// Default time connectors get to drain open connections.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Protocol identifiers the HTTP connectors understand.
const SUPPORTED_HTTP_PROTOCOLS: &[&str] = &["HTTP/1.1", "HTTP/2", "auto"];

/// Prefix of servlet-container HTTP/1.1 connector class names.
const HTTP11_CLASS_PREFIX: &str = "org.apache.coyote.http11.";

/// Whether a connector of `kind` can speak `protocol`.
pub fn is_supported_protocol(kind: ConnectorKind, protocol: &str) -> bool {
    match kind {
        ConnectorKind::Ajp => false,
        ConnectorKind::Http | ConnectorKind::Https => {
            let protocol = protocol.trim();
            protocol.starts_with(HTTP11_CLASS_PREFIX)
                || SUPPORTED_HTTP_PROTOCOLS
                    .iter()
                    .any(|p| p.eq_ignore_ascii_case(protocol))
        }
    }
}

/// Runtime serving contexts with axum over axum-server listeners.
#[derive(Debug, Clone)]
pub struct AxumRuntime {
    grace: Duration,
}

impl Default for AxumRuntime {
    fn default() -> Self {
        Self::new(DEFAULT_SHUTDOWN_GRACE)
    }
}

impl AxumRuntime {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    async fn mount_contexts(plan: &EmbeddedPlan) -> Result<Vec<MountedContext>, ServerError> {
        let mut mounted = Vec::with_capacity(plan.contexts.len());
        for context in &plan.contexts {
            let archive = context.doc_base.clone();
            let doc_root = plan.work_dir.join(context.path.base_name());
            let destination = doc_root.clone();
            let unpacked = tokio::task::spawn_blocking(move || unpack_archive(&archive, &destination))
                .await
                .map_err(|e| ServerError::Task(e.to_string()))?;
            unpacked.map_err(|source| ContextError::Unpack {
                archive: context.doc_base.clone(),
                source,
            })?;

            tracing::info!(
                context = %context.path,
                archive = %context.doc_base.display(),
                "Deploying web application"
            );
            mounted.push(MountedContext {
                path: context.path.clone(),
                doc_root,
                descriptor: context.descriptor.clone().unwrap_or_default(),
            });
        }
        Ok(mounted)
    }

    async fn bind_connector(
        connector: &ConnectorSpec,
        contexts: &[MountedContext],
        access_log: Option<&AccessLog>,
    ) -> Result<BoundConnector, ServerError> {
        let router = build_router(contexts, connector, access_log)?;
        let tls = match (connector.kind, &connector.tls) {
            (ConnectorKind::Https, Some(settings)) => Some(
                load_tls_config(settings)
                    .await
                    .map_err(|source| ServerError::Tls {
                        port: connector.port,
                        source,
                    })?,
            ),
            (ConnectorKind::Https, None) => {
                return Err(ServerError::Tls {
                    port: connector.port,
                    source: crate::net::tls::TlsError::MissingKeystore,
                })
            }
            _ => None,
        };
        Ok(BoundConnector::bind(connector.port, router, tls).await?)
    }
}

impl ServerRuntime for AxumRuntime {
    type Server = AxumServer;

    async fn start_external(&self, spec: ExternalSpec) -> Result<AxumServer, ServerError> {
        tracing::info!(config = %spec.config_path.display(), "Loading server descriptor");
        let descriptor = load_server_descriptor(&spec.config_path)?;
        let plan = plan_from_descriptor(&descriptor, &spec)?;
        self.start_embedded(plan).await
    }

    async fn start_embedded(&self, plan: EmbeddedPlan) -> Result<AxumServer, ServerError> {
        for connector in &plan.connectors {
            if !is_supported_protocol(connector.kind, &connector.protocol) {
                return Err(ServerError::UnsupportedProtocol {
                    port: connector.port,
                    protocol: connector.protocol.clone(),
                });
            }
        }

        let contexts = Self::mount_contexts(&plan).await?;

        let (access_log, guard) = match &plan.access_log {
            Some(spec) => {
                let (log, guard) = AccessLog::open(&spec.directory, spec.pattern.as_deref())
                    .map_err(ServerError::AccessLog)?;
                (Some(log), Some(guard))
            }
            None => (None, None),
        };

        let mut bound = Vec::with_capacity(plan.connectors.len());
        for connector in &plan.connectors {
            match Self::bind_connector(connector, &contexts, access_log.as_ref()).await {
                Ok(listener) => bound.push(listener),
                Err(e) => {
                    tracing::error!(port = connector.port, error = %e, "Connector failed to start");
                    shutdown_all(bound, self.grace).await;
                    return Err(e);
                }
            }
        }

        tracing::info!(
            connectors = bound.len(),
            contexts = contexts.len(),
            naming = plan.naming_enabled,
            "Server started"
        );

        Ok(AxumServer {
            connectors: bound,
            default_connector: plan.default_connector_index(),
            naming_enabled: plan.naming_enabled,
            work_dir: plan.work_dir,
            grace: self.grace,
            _access_log_guard: guard,
        })
    }
}

async fn shutdown_all(connectors: Vec<BoundConnector>, grace: Duration) -> Vec<ServerError> {
    join_all(connectors.into_iter().map(|c| c.shutdown(grace)))
        .await
        .into_iter()
        .filter_map(|r| r.err().map(ServerError::from))
        .collect()
}

/// A running axum server.
pub struct AxumServer {
    connectors: Vec<BoundConnector>,
    default_connector: Option<usize>,
    naming_enabled: bool,
    work_dir: PathBuf,
    grace: Duration,
    _access_log_guard: Option<WorkerGuard>,
}

impl AxumServer {
    pub fn naming_enabled(&self) -> bool {
        self.naming_enabled
    }

    /// Directory holding unpacked applications.
    pub fn work_dir(&self) -> &std::path::Path {
        &self.work_dir
    }

    /// Address of the default connector.
    pub fn default_address(&self) -> Option<SocketAddr> {
        self.default_connector
            .and_then(|i| self.connectors.get(i))
            .map(BoundConnector::local_addr)
    }
}

impl RunningServer for AxumServer {
    fn addresses(&self) -> Vec<SocketAddr> {
        let mut addresses: Vec<SocketAddr> = Vec::with_capacity(self.connectors.len());
        if let Some(default) = self.default_address() {
            addresses.push(default);
        }
        for (index, connector) in self.connectors.iter().enumerate() {
            if Some(index) != self.default_connector {
                addresses.push(connector.local_addr());
            }
        }
        addresses
    }

    async fn stop(self) -> Result<(), ServerError> {
        let grace = self.grace;
        let mut errors = shutdown_all(self.connectors, grace).await;
        tracing::info!("Server stopped");
        match errors.pop() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
