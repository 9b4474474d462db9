//! Embedded server runtime.
//!
//! # Data Flow
//! ```text
//! Orchestrator
//!     → plan.rs (EmbeddedPlan: connectors, contexts, access log)
//!       or external.rs (server.toml → EmbeddedPlan)
//!     → ServerRuntime::start_* (runtime.rs: axum + axum-server)
//!     → RunningServer (stop drains every connector)
//! ```
//!
//! # Design Decisions
//! - The orchestrator only talks to the `ServerRuntime` trait
//! - A start either binds every connector or none
//! - Unsupported protocols fail the start instead of being skipped

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::loader::ConfigError;
use crate::deploy::spec::SpecError;
use crate::http::context::ContextError;
use crate::net::listener::ListenerError;
use crate::net::tls::TlsError;

pub mod external;
pub mod plan;
pub mod runtime;

pub use plan::{ConnectorKind, ConnectorSpec, ContextSpec, EmbeddedPlan};
pub use runtime::{AxumRuntime, AxumServer};

/// Error type for server start and stop.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("connector on port {port} uses unsupported protocol '{protocol}'")]
    UnsupportedProtocol { port: u16, protocol: String },

    #[error("TLS setup for port {port} failed: {source}")]
    Tls {
        port: u16,
        #[source]
        source: TlsError,
    },

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Descriptor(#[from] plan::DescriptorError),

    #[error(transparent)]
    InvalidContext(#[from] SpecError),

    #[error("failed to open access log: {0}")]
    AccessLog(#[source] io::Error),

    #[error("failed to scan {}: {source}", path.display())]
    AppBase {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("background task failed: {0}")]
    Task(String),
}

/// Inputs for starting from an external server descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalSpec {
    /// Descriptor file to load.
    pub config_path: PathBuf,
    /// Directory relative descriptor paths resolve against.
    pub base_dir: PathBuf,
    pub naming_enabled: bool,
}

/// A started server instance.
pub trait RunningServer: Send {
    /// Addresses of all bound connectors, default connector first.
    fn addresses(&self) -> Vec<SocketAddr>;

    /// Stop every connector and release the server's resources.
    fn stop(self) -> impl Future<Output = Result<(), ServerError>> + Send
    where
        Self: Sized;
}

/// Factory for server instances.
pub trait ServerRuntime: Send + Sync {
    type Server: RunningServer;

    /// Start from an external descriptor file.
    fn start_external(
        &self,
        spec: ExternalSpec,
    ) -> impl Future<Output = Result<Self::Server, ServerError>> + Send;

    /// Start from a programmatic plan.
    fn start_embedded(
        &self,
        plan: EmbeddedPlan,
    ) -> impl Future<Output = Result<Self::Server, ServerError>> + Send;
}
