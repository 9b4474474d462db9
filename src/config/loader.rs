//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::properties::PropertyError;
use crate::config::schema::ServerDescriptor;
use crate::config::validation::{validate_descriptor, ValidationError};

/// Error type for configuration loading and derivation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error(transparent)]
    Properties(#[from] PropertyError),

    #[error("{name} port {value} is out of range")]
    InvalidPort { name: &'static str, value: i64 },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate an external server descriptor from a TOML file.
pub fn load_server_descriptor(path: &Path) -> Result<ServerDescriptor, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let descriptor: ServerDescriptor =
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    validate_descriptor(&descriptor).map_err(ConfigError::Validation)?;

    Ok(descriptor)
}
