//! External server descriptor schema.
//!
//! In external configuration mode the whole server is described by a TOML
//! file (`conf/server.toml` by default) instead of being assembled from
//! launcher properties. All types derive Serde traits for deserialization.
//!
//! ```toml
//! [host]
//! app_base = "webapps"
//! auto_deploy = true
//!
//! [[connector]]
//! port = 8080
//! redirect_port = 8443
//!
//! [[connector]]
//! port = 8443
//! scheme = "https"
//! tls = { keystore_file = "conf/server.pem" }
//!
//! [[context]]
//! path = "/shop"
//! doc_base = "shop.war"
//! ```

use serde::{Deserialize, Serialize};

use crate::config::runtime::{TlsSettings, DEFAULT_HTTP_PROTOCOL, DEFAULT_STORE_TYPE};

/// Root of an external server descriptor.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerDescriptor {
    /// Virtual host settings.
    pub host: HostConfig,

    /// Network listeners.
    #[serde(rename = "connector")]
    pub connectors: Vec<ConnectorConfig>,

    /// Explicitly mounted contexts.
    #[serde(rename = "context")]
    pub contexts: Vec<ContextConfig>,

    /// Access log settings; no access log when absent.
    pub access_log: Option<AccessLogConfig>,
}

/// Host configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    /// Directory holding archives, relative to the working directory.
    pub app_base: String,

    /// Deploy every `*.war` found in `app_base` (`ROOT.war` at `/`).
    pub auto_deploy: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            app_base: "webapps".to_string(),
            auto_deploy: true,
        }
    }
}

/// URL scheme served by a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

/// Connector configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectorConfig {
    /// Listen port.
    pub port: u16,

    /// Protocol identifier (default `HTTP/1.1`).
    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(default)]
    pub scheme: Scheme,

    /// HTTPS port that `require_secure` contexts redirect to.
    #[serde(default)]
    pub redirect_port: Option<u16>,

    /// Mark this connector as the server's default connector.
    #[serde(default)]
    pub default: bool,

    /// TLS material, required for `scheme = "https"`.
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

fn default_protocol() -> String {
    DEFAULT_HTTP_PROTOCOL.to_string()
}

/// TLS configuration for an HTTPS connector.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// PEM file with certificate chain and private key.
    pub keystore_file: String,

    #[serde(default)]
    pub keystore_password: Option<String>,

    #[serde(default = "default_store_type")]
    pub keystore_type: String,

    /// PEM bundle of CAs trusted for client certificates.
    #[serde(default)]
    pub truststore_file: Option<String>,

    #[serde(default)]
    pub truststore_password: Option<String>,

    #[serde(default = "default_store_type")]
    pub truststore_type: String,

    #[serde(default)]
    pub client_auth: bool,

    #[serde(default)]
    pub key_alias: Option<String>,
}

fn default_store_type() -> String {
    DEFAULT_STORE_TYPE.to_string()
}

impl TlsConfig {
    /// Convert to runtime TLS settings, resolving relative paths against `base`.
    pub fn to_settings(&self, base: &std::path::Path) -> TlsSettings {
        TlsSettings {
            keystore_file: Some(base.join(&self.keystore_file)),
            keystore_password: self.keystore_password.clone(),
            keystore_type: self.keystore_type.clone(),
            truststore_file: self.truststore_file.as_ref().map(|f| base.join(f)),
            truststore_password: self.truststore_password.clone(),
            truststore_type: self.truststore_type.clone(),
            client_auth: self.client_auth,
            key_alias: self.key_alias.clone(),
        }
    }
}

/// Context mounted explicitly by the descriptor.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContextConfig {
    /// Context path (`/` for root).
    pub path: String,

    /// Archive path, relative to the host's app base.
    pub doc_base: String,
}

/// Access log configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AccessLogConfig {
    /// Log directory, relative to the working directory (default `logs`).
    pub directory: Option<String>,

    /// Log pattern (default `common`).
    pub pattern: Option<String>,
}
