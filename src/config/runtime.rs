//! Runtime configuration derivation.
//!
//! # Responsibilities
//! - Merge command-line overrides, launcher properties and built-in defaults
//! - Decide which connectors are enabled
//! - Collect TLS material when an HTTPS connector is enabled
//!
//! # Design Decisions
//! - Precedence: non-blank override > property > default
//! - A port is enabled only when it is a positive integer
//! - The result is computed once and never mutated

use std::path::PathBuf;

use crate::config::loader::ConfigError;
use crate::config::properties::{
    PropertySource, ACCESS_LOG_VALVE_FORMAT_KEY, AJP_PORT_KEY, ENABLE_NAMING_KEY,
    HTTPS_PORT_KEY, HTTP_PORT_KEY, HTTP_PROTOCOL_KEY, USE_SERVER_XML_KEY,
};

/// Protocol used by HTTP/HTTPS connectors unless configured otherwise.
pub const DEFAULT_HTTP_PROTOCOL: &str = "HTTP/1.1";

/// Protocol identifier of the AJP connector.
pub const AJP_PROTOCOL: &str = "AJP/1.3";

/// Keystore/truststore type used when none is given.
pub const DEFAULT_STORE_TYPE: &str = "PEM";

pub const DEFAULT_HTTP_PORT: i64 = 8080;

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub http_port: Option<i64>,
    pub https_port: Option<i64>,
    pub ajp_port: Option<i64>,
    pub http_protocol: Option<String>,
    pub server_config_path: Option<PathBuf>,
    pub client_auth: bool,
    pub key_alias: Option<String>,
}

/// TLS material read from the process environment.
#[derive(Debug, Clone, Default)]
pub struct TlsEnvironment {
    pub keystore_file: Option<PathBuf>,
    pub keystore_password: Option<String>,
    pub keystore_type: Option<String>,
    pub truststore_file: Option<PathBuf>,
    pub truststore_password: Option<String>,
    pub truststore_type: Option<String>,
}

/// TLS settings for an HTTPS connector.
#[derive(Clone, PartialEq, Eq)]
pub struct TlsSettings {
    pub keystore_file: Option<PathBuf>,
    pub keystore_password: Option<String>,
    pub keystore_type: String,
    pub truststore_file: Option<PathBuf>,
    pub truststore_password: Option<String>,
    pub truststore_type: String,
    pub client_auth: bool,
    pub key_alias: Option<String>,
}

// Passwords stay out of logs.
impl std::fmt::Debug for TlsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |p: &Option<String>| p.as_ref().map(|_| "***");
        f.debug_struct("TlsSettings")
            .field("keystore_file", &self.keystore_file)
            .field("keystore_password", &redact(&self.keystore_password))
            .field("keystore_type", &self.keystore_type)
            .field("truststore_file", &self.truststore_file)
            .field("truststore_password", &redact(&self.truststore_password))
            .field("truststore_type", &self.truststore_type)
            .field("client_auth", &self.client_auth)
            .field("key_alias", &self.key_alias)
            .finish()
    }
}

/// Enabled connector ports. `None` means the connector is disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ports {
    pub http: Option<u16>,
    pub https: Option<u16>,
    pub ajp: Option<u16>,
}

/// Derived, read-only configuration consumed by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfiguration {
    /// Start from an external server descriptor instead of building connectors.
    pub use_server_config: bool,
    /// Explicit descriptor path; falls back to `conf/server.toml` when missing.
    pub server_config_path: Option<PathBuf>,
    pub naming_enabled: bool,
    pub ports: Ports,
    /// Protocol identifier for HTTP and HTTPS connectors.
    pub http_protocol: String,
    /// Present only when the HTTPS connector is enabled.
    pub tls: Option<TlsSettings>,
    /// Access log pattern, verbatim. `None` lets the runtime pick its default.
    pub access_log_pattern: Option<String>,
}

impl RuntimeConfiguration {
    /// Whether extraction and startup use the external descriptor path.
    pub fn uses_external_config(&self) -> bool {
        self.use_server_config
    }
}

/// Derives a [`RuntimeConfiguration`] from its inputs.
pub struct RuntimeConfigurator<'a> {
    properties: &'a PropertySource,
    overrides: &'a Overrides,
    tls_env: &'a TlsEnvironment,
}

impl<'a> RuntimeConfigurator<'a> {
    pub fn new(
        properties: &'a PropertySource,
        overrides: &'a Overrides,
        tls_env: &'a TlsEnvironment,
    ) -> Self {
        Self {
            properties,
            overrides,
            tls_env,
        }
    }

    pub fn derive(&self) -> Result<RuntimeConfiguration, ConfigError> {
        let props = self.properties;

        let ports = Ports {
            http: self.port("http", self.overrides.http_port, HTTP_PORT_KEY, DEFAULT_HTTP_PORT)?,
            https: self.port("https", self.overrides.https_port, HTTPS_PORT_KEY, 0)?,
            ajp: self.port("ajp", self.overrides.ajp_port, AJP_PORT_KEY, 0)?,
        };

        let http_protocol = non_blank(self.overrides.http_protocol.clone())
            .or_else(|| non_blank(props.get_str(HTTP_PROTOCOL_KEY)))
            .unwrap_or_else(|| DEFAULT_HTTP_PROTOCOL.to_string());

        let tls = ports.https.map(|_| self.tls_settings());

        let config = RuntimeConfiguration {
            use_server_config: self.overrides.server_config_path.is_some()
                || props.get_bool(USE_SERVER_XML_KEY),
            server_config_path: self.overrides.server_config_path.clone(),
            naming_enabled: props.get_bool(ENABLE_NAMING_KEY),
            ports,
            http_protocol,
            tls,
            access_log_pattern: props.get_str(ACCESS_LOG_VALVE_FORMAT_KEY),
        };

        tracing::debug!(?config, "Runtime configuration derived");
        Ok(config)
    }

    fn port(
        &self,
        name: &'static str,
        explicit: Option<i64>,
        key: &str,
        default: i64,
    ) -> Result<Option<u16>, ConfigError> {
        let value = match explicit {
            Some(value) => value,
            None => self.properties.get_int(key)?.unwrap_or(default),
        };
        if value <= 0 {
            return Ok(None);
        }
        u16::try_from(value)
            .map(Some)
            .map_err(|_| ConfigError::InvalidPort { name, value })
    }

    fn tls_settings(&self) -> TlsSettings {
        let env = self.tls_env;
        TlsSettings {
            keystore_file: env.keystore_file.clone(),
            keystore_password: env.keystore_password.clone(),
            keystore_type: non_blank(env.keystore_type.clone())
                .unwrap_or_else(|| DEFAULT_STORE_TYPE.to_string()),
            truststore_file: env.truststore_file.clone(),
            truststore_password: env.truststore_password.clone(),
            truststore_type: non_blank(env.truststore_type.clone())
                .unwrap_or_else(|| DEFAULT_STORE_TYPE.to_string()),
            client_auth: self.overrides.client_auth,
            key_alias: non_blank(self.overrides.key_alias.clone()),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derive(props: &PropertySource, overrides: &Overrides) -> RuntimeConfiguration {
        RuntimeConfigurator::new(props, overrides, &TlsEnvironment::default())
            .derive()
            .unwrap()
    }

    #[test]
    fn defaults() {
        let config = derive(&PropertySource::empty(), &Overrides::default());
        assert!(!config.use_server_config);
        assert!(!config.naming_enabled);
        assert_eq!(
            config.ports,
            Ports {
                http: Some(8080),
                https: None,
                ajp: None
            }
        );
        assert_eq!(config.http_protocol, "HTTP/1.1");
        assert!(config.tls.is_none());
        assert!(config.access_log_pattern.is_none());
    }

    #[test]
    fn override_beats_property_beats_default() {
        let props = PropertySource::from_pairs([
            (HTTP_PORT_KEY, "9000"),
            (HTTPS_PORT_KEY, "9443"),
            (HTTP_PROTOCOL_KEY, "auto"),
        ]);
        let config = derive(&props, &Overrides::default());
        assert_eq!(config.ports.http, Some(9000));
        assert_eq!(config.ports.https, Some(9443));
        assert_eq!(config.http_protocol, "auto");

        let overrides = Overrides {
            http_port: Some(7000),
            http_protocol: Some("HTTP/2".into()),
            ..Default::default()
        };
        let config = derive(&props, &overrides);
        assert_eq!(config.ports.http, Some(7000));
        assert_eq!(config.ports.https, Some(9443));
        assert_eq!(config.http_protocol, "HTTP/2");
    }

    #[test]
    fn blank_protocol_override_is_ignored() {
        let props = PropertySource::from_pairs([(HTTP_PROTOCOL_KEY, "auto")]);
        let overrides = Overrides {
            http_protocol: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(derive(&props, &overrides).http_protocol, "auto");
    }

    #[test]
    fn non_positive_ports_are_disabled() {
        let overrides = Overrides {
            http_port: Some(0),
            https_port: Some(-1),
            ajp_port: Some(8009),
            ..Default::default()
        };
        let config = derive(&PropertySource::empty(), &overrides);
        assert_eq!(config.ports.http, None);
        assert_eq!(config.ports.https, None);
        assert_eq!(config.ports.ajp, Some(8009));
    }

    #[test]
    fn out_of_range_port_is_rejected() {
        let overrides = Overrides {
            http_port: Some(70_000),
            ..Default::default()
        };
        let err = RuntimeConfigurator::new(
            &PropertySource::empty(),
            &overrides,
            &TlsEnvironment::default(),
        )
        .derive()
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { name: "http", value: 70_000 }));
    }

    #[test]
    fn tls_only_read_with_https() {
        let env = TlsEnvironment {
            keystore_file: Some("server.pem".into()),
            keystore_password: Some("secret".into()),
            ..Default::default()
        };
        let props = PropertySource::empty();

        let plain = Overrides::default();
        let config = RuntimeConfigurator::new(&props, &plain, &env).derive().unwrap();
        assert!(config.tls.is_none());

        let secure = Overrides {
            https_port: Some(8443),
            client_auth: true,
            key_alias: Some("web".into()),
            ..Default::default()
        };
        let config = RuntimeConfigurator::new(&props, &secure, &env).derive().unwrap();
        let tls = config.tls.unwrap();
        assert_eq!(tls.keystore_file, Some(PathBuf::from("server.pem")));
        assert_eq!(tls.keystore_type, "PEM");
        assert_eq!(tls.truststore_type, "PEM");
        assert!(tls.truststore_file.is_none());
        assert!(tls.client_auth);
        assert_eq!(tls.key_alias.as_deref(), Some("web"));
        assert!(!format!("{:?}", tls).contains("secret"));
    }

    #[test]
    fn server_config_path_activates_external_mode() {
        let overrides = Overrides {
            server_config_path: Some("/etc/runner/server.toml".into()),
            ..Default::default()
        };
        assert!(derive(&PropertySource::empty(), &overrides).uses_external_config());

        let props = PropertySource::from_pairs([(USE_SERVER_XML_KEY, "true")]);
        assert!(derive(&props, &Overrides::default()).uses_external_config());
    }

    #[test]
    fn access_log_pattern_is_verbatim() {
        let props = PropertySource::from_pairs([
            (ACCESS_LOG_VALVE_FORMAT_KEY, "%h %t \"%r\""),
            (ENABLE_NAMING_KEY, "true"),
        ]);
        let config = derive(&props, &Overrides::default());
        assert_eq!(config.access_log_pattern.as_deref(), Some("%h %t \"%r\""));
        assert!(config.naming_enabled);
    }
}
