//! Launcher bootstrap.
//!
//! # Responsibilities
//! - Install the requested logging bridge
//! - Load bundled properties and derive the runtime configuration
//! - Parse the archive spec and (re)populate the working directory
//! - Hand the result to the orchestrator and block until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and maps to an exit code
//! - Configuration is derived before extraction (it picks destination names)
//! - An existing working directory is reused unless a reset is requested

use std::io;
use std::path::PathBuf;

use crate::config::loader::ConfigError;
use crate::config::properties::{PropertyError, PropertySource, WARS_KEY};
use crate::config::runtime::{Overrides, RuntimeConfigurator, TlsEnvironment};
use crate::deploy::extract::{should_extract, DestinationNaming, ExtractError, ExtractionEngine};
use crate::deploy::layout::WorkingDirectory;
use crate::deploy::resources::BundledResources;
use crate::deploy::spec::{parse_archive_spec, SpecError};
use crate::lifecycle::orchestrator::{OrchestratorError, ServerOrchestrator};
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::logging::install_bridge;
use crate::server::ServerRuntime;

/// Working directory used when none is given.
pub const DEFAULT_EXTRACT_DIRECTORY: &str = ".extract";

/// Everything the launcher needs besides the bundle and the runtime.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub extract_directory: PathBuf,
    /// Wipe and re-extract an existing working directory.
    pub reset_extract: bool,
    pub overrides: Overrides,
    pub tls_env: TlsEnvironment,
    /// Name of the logging bridge to install, if any.
    pub log_bridge: Option<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            extract_directory: PathBuf::from(DEFAULT_EXTRACT_DIRECTORY),
            reset_extract: false,
            overrides: Overrides::default(),
            tls_env: TlsEnvironment::default(),
            log_bridge: None,
        }
    }
}

/// Fatal launcher error.
#[derive(Debug, thiserror::Error)]
pub enum LauncherError {
    #[error(transparent)]
    Properties(#[from] PropertyError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("failed to prepare working directory {}: {source}", path.display())]
    Layout {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

impl LauncherError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            LauncherError::Extract(ExtractError::DirectoryCreation { .. })
            | LauncherError::Layout { .. } => 2,
            LauncherError::Extract(ExtractError::ResourceNotFound { .. }) => 3,
            LauncherError::Extract(_) => 1,
            LauncherError::Properties(_) | LauncherError::Config(_) | LauncherError::Spec(_) => 4,
            LauncherError::Orchestrator(
                OrchestratorError::Start(_) | OrchestratorError::AlreadyConfigured,
            ) => 5,
            LauncherError::Orchestrator(
                OrchestratorError::WaitInterrupted | OrchestratorError::Stop(_),
            ) => 1,
        }
    }
}

/// Run every bootstrap step up to, but not including, server start.
pub fn prepare<R: ServerRuntime>(
    options: &LaunchOptions,
    resources: &dyn BundledResources,
    runtime: R,
    shutdown: Shutdown,
) -> Result<ServerOrchestrator<R>, LauncherError> {
    if let Some(name) = options.log_bridge.as_deref() {
        install_bridge(name);
    }

    let properties = PropertySource::load(resources)?;
    let config =
        RuntimeConfigurator::new(&properties, &options.overrides, &options.tls_env).derive()?;

    let wars = properties.get_str(WARS_KEY).unwrap_or_default();
    let contexts = parse_archive_spec(&wars)?;
    for (context, archive) in contexts.iter() {
        tracing::debug!(context = %context, archive = archive.as_str(), "Context mapping");
    }

    let layout = WorkingDirectory::new(&options.extract_directory);
    if should_extract(layout.exists(), options.reset_extract) {
        let naming = if config.uses_external_config() {
            DestinationNaming::PreserveNames
        } else {
            DestinationNaming::RootRewrite
        };
        ExtractionEngine::new(resources, &layout, naming).extract(&contexts)?;
    } else {
        tracing::info!(
            path = %layout.root().display(),
            "Reusing existing working directory"
        );
    }

    layout.ensure_layout().map_err(|source| LauncherError::Layout {
        path: layout.root().to_path_buf(),
        source,
    })?;

    Ok(ServerOrchestrator::new(runtime, config, layout, contexts, shutdown))
}

/// Bootstrap, start, wait for shutdown and stop.
pub async fn run<R: ServerRuntime>(
    options: &LaunchOptions,
    resources: &dyn BundledResources,
    runtime: R,
    shutdown: Shutdown,
) -> Result<(), LauncherError> {
    let mut orchestrator = prepare(options, resources, runtime, shutdown)?;
    orchestrator.start().await?;

    let waited = orchestrator.wait().await;
    let stopped = orchestrator.stop().await;
    waited?;
    stopped?;
    tracing::info!("Shutdown complete");
    Ok(())
}
