//! Programmatic server plan.
//!
//! An [`EmbeddedPlan`] is the complete description of a server built without
//! an external descriptor: host, connectors, access log and contexts. The
//! orchestrator assembles it; a [`ServerRuntime`](crate::server::ServerRuntime)
//! turns it into listening sockets.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::runtime::{TlsSettings, AJP_PROTOCOL};
use crate::deploy::spec::ContextPath;

/// Archive entry holding a per-application context descriptor.
pub const CONTEXT_DESCRIPTOR_ENTRY: &str = "META-INF/context.toml";

/// Wire protocol family of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorKind {
    Http,
    Https,
    Ajp,
}

/// One network listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorSpec {
    pub kind: ConnectorKind,
    pub port: u16,
    /// Protocol implementation identifier.
    pub protocol: String,
    /// HTTPS port for requests that must be served securely.
    pub redirect_port: Option<u16>,
    pub tls: Option<TlsSettings>,
}

impl ConnectorSpec {
    pub fn http(port: u16, protocol: impl Into<String>) -> Self {
        Self {
            kind: ConnectorKind::Http,
            port,
            protocol: protocol.into(),
            redirect_port: None,
            tls: None,
        }
    }

    pub fn https(port: u16, protocol: impl Into<String>, tls: TlsSettings) -> Self {
        Self {
            kind: ConnectorKind::Https,
            port,
            protocol: protocol.into(),
            redirect_port: None,
            tls: Some(tls),
        }
    }

    pub fn ajp(port: u16) -> Self {
        Self {
            kind: ConnectorKind::Ajp,
            port,
            protocol: AJP_PROTOCOL.to_string(),
            redirect_port: None,
            tls: None,
        }
    }

    pub fn with_redirect_port(mut self, port: u16) -> Self {
        self.redirect_port = Some(port);
        self
    }

    pub fn is_secure(&self) -> bool {
        self.kind == ConnectorKind::Https
    }
}

/// Access log written under `directory`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessLogSpec {
    pub directory: PathBuf,
    /// `None` selects the runtime's default pattern.
    pub pattern: Option<String>,
}

/// Settings an application ships inside its archive.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContextDescriptor {
    /// Redirect plain-HTTP requests to the connector's redirect port.
    pub require_secure: bool,
    /// Serve `index.html` for directory requests.
    pub index_html: bool,
    /// Headers added to every response of the context.
    pub response_headers: BTreeMap<String, String>,
}

impl Default for ContextDescriptor {
    fn default() -> Self {
        Self {
            require_secure: false,
            index_html: true,
            response_headers: BTreeMap::new(),
        }
    }
}

/// Error raised while reading a context descriptor from an archive.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("cannot read archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("cannot read META-INF/context.toml in {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid META-INF/context.toml in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Look for [`CONTEXT_DESCRIPTOR_ENTRY`] inside `archive`.
///
/// A missing archive or a missing entry yields `Ok(None)`.
pub fn read_context_descriptor(archive: &Path) -> Result<Option<ContextDescriptor>, DescriptorError> {
    tracing::debug!(archive = %archive.display(), "Searching context descriptor");
    let file = match File::open(archive) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(DescriptorError::Read {
                path: archive.to_path_buf(),
                source: e,
            })
        }
    };
    let mut zip = zip::ZipArchive::new(file).map_err(|source| DescriptorError::Archive {
        path: archive.to_path_buf(),
        source,
    })?;
    let mut entry = match zip.by_name(CONTEXT_DESCRIPTOR_ENTRY) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(source) => {
            return Err(DescriptorError::Archive {
                path: archive.to_path_buf(),
                source,
            })
        }
    };

    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|source| DescriptorError::Read {
            path: archive.to_path_buf(),
            source,
        })?;
    toml::from_str(&content)
        .map(Some)
        .map_err(|source| DescriptorError::Parse {
            path: archive.to_path_buf(),
            source,
        })
}

/// A context to mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSpec {
    pub path: ContextPath,
    /// Archive deployed at `path`.
    pub doc_base: PathBuf,
    /// Descriptor found inside the archive, if any.
    pub descriptor: Option<ContextDescriptor>,
}

/// Complete programmatic server description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedPlan {
    /// Working directory the server runs in.
    pub base_dir: PathBuf,
    /// Directory holding deployed archives.
    pub app_base: PathBuf,
    /// Scratch directory for unpacked applications.
    pub work_dir: PathBuf,
    pub naming_enabled: bool,
    pub connectors: Vec<ConnectorSpec>,
    default_connector: Option<usize>,
    pub access_log: Option<AccessLogSpec>,
    pub contexts: Vec<ContextSpec>,
}

impl EmbeddedPlan {
    pub fn new(base_dir: impl Into<PathBuf>, app_base: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            app_base: app_base.into(),
            work_dir: work_dir.into(),
            naming_enabled: false,
            connectors: Vec::new(),
            default_connector: None,
            access_log: None,
            contexts: Vec::new(),
        }
    }

    /// Add a connector and return its index.
    pub fn add_connector(&mut self, connector: ConnectorSpec) -> usize {
        self.connectors.push(connector);
        self.connectors.len() - 1
    }

    /// Mark the connector at `index` as the default one.
    pub fn set_default_connector(&mut self, index: usize) {
        if index < self.connectors.len() {
            self.default_connector = Some(index);
        }
    }

    pub fn default_connector(&self) -> Option<&ConnectorSpec> {
        self.default_connector.and_then(|i| self.connectors.get(i))
    }

    pub fn default_connector_index(&self) -> Option<usize> {
        self.default_connector
    }

    /// Mount `doc_base` at `path`.
    pub fn add_webapp(&mut self, path: ContextPath, doc_base: impl Into<PathBuf>) -> &mut ContextSpec {
        self.contexts.push(ContextSpec {
            path,
            doc_base: doc_base.into(),
            descriptor: None,
        });
        let last = self.contexts.len() - 1;
        &mut self.contexts[last]
    }
}
