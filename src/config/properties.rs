//! Launcher property source.
//!
//! Properties are read once from `runner.toml` at the root of the bundle and
//! never change afterwards. Keys keep the names the packaging step writes.

use crate::deploy::resources::{self, BundledResources};

/// Name of the property file inside the bundle.
pub const PROPERTIES_RESOURCE: &str = "runner.toml";

/// `true`/`false`: start from an external full server configuration.
pub const USE_SERVER_XML_KEY: &str = "useServerXml";

/// Archive spec, e.g. `wars = "foo.war|/foo;bar.war"`.
pub const WARS_KEY: &str = "wars";

pub const ENABLE_NAMING_KEY: &str = "enableNaming";

pub const ACCESS_LOG_VALVE_FORMAT_KEY: &str = "accessLogValveFormat";

/// Protocol identifier for HTTP and HTTPS connectors (`HTTP/1.1`, `auto`, ...).
pub const HTTP_PROTOCOL_KEY: &str = "connectorhttpProtocol";

pub const HTTP_PORT_KEY: &str = "httpPort";
pub const HTTPS_PORT_KEY: &str = "httpsPort";
pub const AJP_PORT_KEY: &str = "ajpPort";

/// Error type for property loading.
#[derive(Debug, thiserror::Error)]
pub enum PropertyError {
    #[error("failed to read runner.toml: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse runner.toml: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("property '{key}' has invalid value '{value}'")]
    InvalidValue { key: String, value: String },
}

/// Immutable key/value configuration available at process start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertySource {
    values: toml::Table,
}

impl PropertySource {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse properties from TOML text.
    pub fn parse(content: &str) -> Result<Self, PropertyError> {
        Ok(Self {
            values: content.parse::<toml::Table>()?,
        })
    }

    /// Build a property source from string pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), toml::Value::String(v.into())))
            .collect();
        Self { values }
    }

    /// Load `runner.toml` from the bundle. A missing file yields an empty set.
    pub fn load(resources: &dyn BundledResources) -> Result<Self, PropertyError> {
        match resources::read_to_string(resources, PROPERTIES_RESOURCE)? {
            Some(content) => {
                let properties = Self::parse(&content)?;
                tracing::debug!(keys = properties.values.len(), "Properties loaded");
                Ok(properties)
            }
            None => {
                tracing::warn!(
                    resource = PROPERTIES_RESOURCE,
                    "Property file not found in bundle, using empty properties"
                );
                Ok(Self::empty())
            }
        }
    }

    /// String value of `key`. Scalars other than strings are rendered as text.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            toml::Value::String(s) => Some(s.clone()),
            toml::Value::Integer(i) => Some(i.to_string()),
            toml::Value::Boolean(b) => Some(b.to_string()),
            toml::Value::Float(f) => Some(f.to_string()),
            _ => None,
        }
    }

    /// Boolean value of `key`. Only `true` (any case) is true; anything else,
    /// including a missing key, is false.
    pub fn get_bool(&self, key: &str) -> bool {
        match self.values.get(key) {
            Some(toml::Value::Boolean(b)) => *b,
            Some(toml::Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// Integer value of `key`, accepting numeric strings.
    pub fn get_int(&self, key: &str) -> Result<Option<i64>, PropertyError> {
        let invalid = |value: String| PropertyError::InvalidValue {
            key: key.to_string(),
            value,
        };
        match self.values.get(key) {
            None => Ok(None),
            Some(toml::Value::Integer(i)) => Ok(Some(*i)),
            Some(toml::Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(toml::Value::String(s)) => {
                s.trim().parse().map(Some).map_err(|_| invalid(s.clone()))
            }
            Some(other) => Err(invalid(other.to_string())),
        }
    }
}
