//! Server orchestration.
//!
//! Turns a [`RuntimeConfiguration`] and the deployed context map into a
//! running server, waits on the shutdown token and stops the server again.
//!
//! ```text
//! Created --start--> Configuring --runtime ok--> Running --stop--> Stopped
//! ```

use std::path::PathBuf;

use crate::config::runtime::RuntimeConfiguration;
use crate::deploy::layout::WorkingDirectory;
use crate::deploy::spec::ArchiveSpecMap;
use crate::lifecycle::shutdown::Shutdown;
use crate::server::plan::{
    read_context_descriptor, AccessLogSpec, ConnectorSpec, EmbeddedPlan,
};
use crate::server::{ExternalSpec, RunningServer, ServerError, ServerRuntime};

/// Descriptor file used in external mode when no explicit path applies.
pub const DEFAULT_SERVER_CONFIG: &str = "server.toml";

/// Error type for orchestration.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("server has already been configured")]
    AlreadyConfigured,

    #[error("server failed to start: {0}")]
    Start(#[source] ServerError),

    #[error("server failed to stop cleanly: {0}")]
    Stop(#[source] ServerError),

    #[error("interrupted while waiting for shutdown")]
    WaitInterrupted,
}

/// A started server tagged with the way it was configured.
#[derive(Debug)]
pub enum ServerHandle<S> {
    External(S),
    Embedded(S),
}

impl<S> ServerHandle<S> {
    pub fn server(&self) -> &S {
        match self {
            ServerHandle::External(server) | ServerHandle::Embedded(server) => server,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, ServerHandle::External(_))
    }

    fn into_inner(self) -> S {
        match self {
            ServerHandle::External(server) | ServerHandle::Embedded(server) => server,
        }
    }
}

/// Lifecycle phase of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Created,
    Configuring,
    Running,
    Stopped,
}

enum Phase<S> {
    Created,
    Configuring,
    Running(ServerHandle<S>),
    Stopped,
}

/// Drives a [`ServerRuntime`] through one start/stop cycle.
pub struct ServerOrchestrator<R: ServerRuntime> {
    runtime: R,
    config: RuntimeConfiguration,
    layout: WorkingDirectory,
    contexts: ArchiveSpecMap,
    shutdown: Shutdown,
    phase: Phase<R::Server>,
}

impl<R: ServerRuntime> ServerOrchestrator<R> {
    pub fn new(
        runtime: R,
        config: RuntimeConfiguration,
        layout: WorkingDirectory,
        contexts: ArchiveSpecMap,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            runtime,
            config,
            layout,
            contexts,
            shutdown,
            phase: Phase::Created,
        }
    }

    pub fn state(&self) -> OrchestratorState {
        match self.phase {
            Phase::Created => OrchestratorState::Created,
            Phase::Configuring => OrchestratorState::Configuring,
            Phase::Running(_) => OrchestratorState::Running,
            Phase::Stopped => OrchestratorState::Stopped,
        }
    }

    /// The running server, if any.
    pub fn server(&self) -> Option<&ServerHandle<R::Server>> {
        match &self.phase {
            Phase::Running(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Descriptor path for external mode.
    ///
    /// An explicit path is used only if it exists on disk.
    pub fn external_config_path(&self) -> PathBuf {
        match &self.config.server_config_path {
            Some(path) if path.exists() => path.clone(),
            Some(path) => {
                tracing::warn!(
                    path = %path.display(),
                    "Server config not found, using the extracted one"
                );
                self.layout.conf().join(DEFAULT_SERVER_CONFIG)
            }
            None => self.layout.conf().join(DEFAULT_SERVER_CONFIG),
        }
    }

    pub fn external_spec(&self) -> ExternalSpec {
        ExternalSpec {
            config_path: self.external_config_path(),
            base_dir: self.layout.root().to_path_buf(),
            naming_enabled: self.config.naming_enabled,
        }
    }

    /// Build the programmatic server plan.
    pub fn embedded_plan(&self) -> EmbeddedPlan {
        let layout = &self.layout;
        let config = &self.config;
        let mut plan = EmbeddedPlan::new(layout.root(), layout.webapps(), layout.work());
        plan.naming_enabled = config.naming_enabled;

        let ports = config.ports;
        let mut http_index = None;
        if let Some(port) = ports.http {
            let mut connector = ConnectorSpec::http(port, &config.http_protocol);
            if let Some(https) = ports.https {
                connector = connector.with_redirect_port(https);
            }
            let index = plan.add_connector(connector);
            plan.set_default_connector(index);
            http_index = Some(index);
        }

        plan.access_log = Some(AccessLogSpec {
            directory: layout.logs(),
            pattern: config.access_log_pattern.clone(),
        });

        if let (Some(port), Some(tls)) = (ports.https, &config.tls) {
            let index = plan.add_connector(ConnectorSpec::https(
                port,
                &config.http_protocol,
                tls.clone(),
            ));
            if http_index.is_none() {
                plan.set_default_connector(index);
            }
        }

        if let Some(port) = ports.ajp {
            plan.add_connector(ConnectorSpec::ajp(port));
        }

        for (context, archive) in self.contexts.iter() {
            let doc_base = layout.archive_path(context, archive, true);
            let descriptor = match read_context_descriptor(&doc_base) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    tracing::debug!(
                        archive = %doc_base.display(),
                        error = %e,
                        "No usable context descriptor"
                    );
                    None
                }
            };
            plan.add_webapp(context.clone(), doc_base).descriptor = descriptor;
        }
        plan
    }

    /// Configure and start the server. Applies once.
    pub async fn start(&mut self) -> Result<(), OrchestratorError> {
        if !matches!(self.phase, Phase::Created) {
            return Err(OrchestratorError::AlreadyConfigured);
        }
        self.phase = Phase::Configuring;

        let handle = if self.config.uses_external_config() {
            let spec = self.external_spec();
            tracing::info!(config = %spec.config_path.display(), "Starting from server config");
            ServerHandle::External(
                self.runtime
                    .start_external(spec)
                    .await
                    .map_err(OrchestratorError::Start)?,
            )
        } else {
            let plan = self.embedded_plan();
            tracing::info!(
                connectors = plan.connectors.len(),
                contexts = plan.contexts.len(),
                "Starting embedded server"
            );
            ServerHandle::Embedded(
                self.runtime
                    .start_embedded(plan)
                    .await
                    .map_err(OrchestratorError::Start)?,
            )
        };

        for address in handle.server().addresses() {
            tracing::info!(address = %address, "Listening");
        }
        self.phase = Phase::Running(handle);
        Ok(())
    }

    /// Block until shutdown is requested.
    pub async fn wait(&self) -> Result<(), OrchestratorError> {
        self.shutdown
            .wait()
            .await
            .map_err(|_| OrchestratorError::WaitInterrupted)
    }

    /// Stop the running server. A no-op in every other state.
    pub async fn stop(&mut self) -> Result<(), OrchestratorError> {
        let phase = std::mem::replace(&mut self.phase, Phase::Stopped);
        let handle = match phase {
            Phase::Running(handle) => handle,
            other => {
                self.phase = other;
                return Ok(());
            }
        };

        self.shutdown.trigger();
        let external = handle.is_external();
        tracing::info!(external, "Stopping server");
        handle
            .into_inner()
            .stop()
            .await
            .map_err(OrchestratorError::Stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::runtime::{Ports, TlsSettings};
    use crate::deploy::spec::parse_archive_spec;
    use crate::server::plan::ConnectorKind;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        External(ExternalSpec),
        Embedded(EmbeddedPlan),
        Stop,
    }

    #[derive(Clone, Default)]
    struct RecordingRuntime {
        calls: Arc<Mutex<Vec<Call>>>,
        fail: bool,
    }

    struct RecordingServer {
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl RunningServer for RecordingServer {
        fn addresses(&self) -> Vec<SocketAddr> {
            vec![SocketAddr::from(([127, 0, 0, 1], 8080))]
        }

        async fn stop(self) -> Result<(), ServerError> {
            self.calls.lock().unwrap().push(Call::Stop);
            Ok(())
        }
    }

    impl ServerRuntime for RecordingRuntime {
        type Server = RecordingServer;

        async fn start_external(&self, spec: ExternalSpec) -> Result<RecordingServer, ServerError> {
            self.calls.lock().unwrap().push(Call::External(spec));
            self.result()
        }

        async fn start_embedded(&self, plan: EmbeddedPlan) -> Result<RecordingServer, ServerError> {
            self.calls.lock().unwrap().push(Call::Embedded(plan));
            self.result()
        }
    }

    impl RecordingRuntime {
        fn result(&self) -> Result<RecordingServer, ServerError> {
            if self.fail {
                return Err(ServerError::Task("refused".to_string()));
            }
            Ok(RecordingServer {
                calls: self.calls.clone(),
            })
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn config(ports: Ports) -> RuntimeConfiguration {
        RuntimeConfiguration {
            use_server_config: false,
            server_config_path: None,
            naming_enabled: false,
            ports,
            http_protocol: "HTTP/1.1".to_string(),
            tls: None,
            access_log_pattern: None,
        }
    }

    fn tls() -> TlsSettings {
        TlsSettings {
            keystore_file: Some(PathBuf::from("/keys/server.pem")),
            keystore_password: None,
            keystore_type: "PEM".to_string(),
            truststore_file: None,
            truststore_password: None,
            truststore_type: "PEM".to_string(),
            client_auth: false,
            key_alias: None,
        }
    }

    fn orchestrator(
        runtime: RecordingRuntime,
        config: RuntimeConfiguration,
        spec: &str,
    ) -> ServerOrchestrator<RecordingRuntime> {
        ServerOrchestrator::new(
            runtime,
            config,
            WorkingDirectory::new("/srv/.extract"),
            parse_archive_spec(spec).unwrap(),
            Shutdown::new(),
        )
    }

    #[test]
    fn plan_with_http_only() {
        let ports = Ports {
            http: Some(8080),
            ..Ports::default()
        };
        let plan = orchestrator(RecordingRuntime::default(), config(ports), "foo.war").embedded_plan();

        assert_eq!(plan.connectors.len(), 1);
        let http = plan.default_connector().unwrap();
        assert_eq!(http.kind, ConnectorKind::Http);
        assert_eq!(http.port, 8080);
        assert_eq!(http.redirect_port, None);
        assert_eq!(plan.app_base, PathBuf::from("/srv/.extract/webapps"));
        assert_eq!(plan.contexts.len(), 1);
        assert!(plan.contexts[0].path.is_root());
        assert_eq!(
            plan.contexts[0].doc_base,
            PathBuf::from("/srv/.extract/webapps/ROOT.war")
        );
        assert!(plan.contexts[0].descriptor.is_none());
        assert_eq!(
            plan.access_log.unwrap().directory,
            PathBuf::from("/srv/.extract/logs")
        );
    }

    #[test]
    fn plan_with_all_connectors() {
        let mut config = config(Ports {
            http: Some(8080),
            https: Some(8443),
            ajp: Some(8009),
        });
        config.tls = Some(tls());
        config.access_log_pattern = Some("combined".to_string());
        let plan = orchestrator(RecordingRuntime::default(), config, "a.war|/a;b.war|/b").embedded_plan();

        let kinds: Vec<_> = plan.connectors.iter().map(|c| (c.kind, c.port)).collect();
        assert_eq!(
            kinds,
            vec![
                (ConnectorKind::Http, 8080),
                (ConnectorKind::Https, 8443),
                (ConnectorKind::Ajp, 8009),
            ]
        );
        assert_eq!(plan.default_connector_index(), Some(0));
        assert_eq!(plan.connectors[0].redirect_port, Some(8443));
        assert_eq!(plan.connectors[1].tls, Some(tls()));
        assert_eq!(plan.connectors[2].protocol, "AJP/1.3");
        assert_eq!(plan.access_log.unwrap().pattern.as_deref(), Some("combined"));

        let docs: Vec<_> = plan.contexts.iter().map(|c| c.doc_base.clone()).collect();
        assert_eq!(
            docs,
            vec![
                PathBuf::from("/srv/.extract/webapps/a.war"),
                PathBuf::from("/srv/.extract/webapps/b.war"),
            ]
        );
    }

    #[test]
    fn https_is_default_without_http() {
        let mut config = config(Ports {
            https: Some(8443),
            ..Ports::default()
        });
        config.tls = Some(tls());
        let plan = orchestrator(RecordingRuntime::default(), config, "").embedded_plan();
        assert_eq!(plan.default_connector().unwrap().kind, ConnectorKind::Https);
    }

    #[test]
    fn ajp_is_never_the_default_connector() {
        let plan = orchestrator(
            RecordingRuntime::default(),
            config(Ports {
                ajp: Some(8009),
                ..Ports::default()
            }),
            "",
        )
        .embedded_plan();
        assert_eq!(plan.connectors.len(), 1);
        assert_eq!(plan.connectors[0].kind, ConnectorKind::Ajp);
        assert!(plan.default_connector().is_none());
    }

    #[tokio::test]
    async fn external_mode_falls_back_to_extracted_config() {
        let runtime = RecordingRuntime::default();
        let mut config = config(Ports::default());
        config.use_server_config = true;
        config.naming_enabled = true;
        config.server_config_path = Some(PathBuf::from("/definitely/missing/server.toml"));

        let mut orchestrator = orchestrator(runtime.clone(), config, "app.war");
        orchestrator.start().await.unwrap();
        assert!(orchestrator.server().unwrap().is_external());

        assert_eq!(
            runtime.calls(),
            vec![Call::External(ExternalSpec {
                config_path: PathBuf::from("/srv/.extract/conf/server.toml"),
                base_dir: PathBuf::from("/srv/.extract"),
                naming_enabled: true,
            })]
        );
    }

    #[tokio::test]
    async fn start_applies_once() {
        let runtime = RecordingRuntime::default();
        let mut orchestrator = orchestrator(runtime, config(Ports::default()), "");
        orchestrator.start().await.unwrap();
        assert_eq!(orchestrator.state(), OrchestratorState::Running);
        assert!(matches!(
            orchestrator.start().await,
            Err(OrchestratorError::AlreadyConfigured)
        ));
    }

    #[tokio::test]
    async fn failed_start_leaves_nothing_to_stop() {
        let runtime = RecordingRuntime {
            fail: true,
            ..RecordingRuntime::default()
        };
        let mut orchestrator = orchestrator(runtime.clone(), config(Ports::default()), "");
        assert!(matches!(
            orchestrator.start().await,
            Err(OrchestratorError::Start(_))
        ));
        assert_eq!(orchestrator.state(), OrchestratorState::Configuring);
        orchestrator.stop().await.unwrap();
        assert_eq!(runtime.calls().len(), 1);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let runtime = RecordingRuntime::default();
        let mut orchestrator = orchestrator(runtime.clone(), config(Ports::default()), "");

        orchestrator.stop().await.unwrap();
        assert_eq!(orchestrator.state(), OrchestratorState::Created);

        orchestrator.start().await.unwrap();
        orchestrator.stop().await.unwrap();
        orchestrator.stop().await.unwrap();
        assert_eq!(orchestrator.state(), OrchestratorState::Stopped);
        assert!(orchestrator.shutdown().is_triggered());

        let stops = runtime.calls().iter().filter(|c| **c == Call::Stop).count();
        assert_eq!(stops, 1);
    }

    #[tokio::test]
    async fn wait_returns_after_stop_request() {
        let orchestrator = orchestrator(RecordingRuntime::default(), config(Ports::default()), "");
        orchestrator.shutdown().trigger();
        orchestrator.wait().await.unwrap();
    }

    #[tokio::test]
    async fn interrupted_wait_is_an_error() {
        let orchestrator = orchestrator(RecordingRuntime::default(), config(Ports::default()), "");
        orchestrator.shutdown().interrupt();
        assert!(matches!(
            orchestrator.wait().await,
            Err(OrchestratorError::WaitInterrupted)
        ));
    }
}
