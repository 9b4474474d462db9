//! Descriptor validation.
//!
//! # Responsibilities
//! - Semantic validation of external server descriptors (serde handles syntax)
//! - Validate ports, context paths and TLS presence
//! - Detect conflicting connectors and contexts
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerDescriptor → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::{Scheme, ServerDescriptor};
use crate::deploy::spec::ContextPath;

/// A single semantic problem in a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    NoConnectors,
    ZeroPort { index: usize },
    DuplicatePort { port: u16 },
    MissingTls { port: u16 },
    MultipleDefaultConnectors,
    InvalidContextPath { path: String },
    DuplicateContextPath { path: String },
    EmptyDocBase { path: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::NoConnectors => write!(f, "no connector configured"),
            ValidationError::ZeroPort { index } => write!(f, "connector #{} has port 0", index),
            ValidationError::DuplicatePort { port } => {
                write!(f, "port {} used by more than one connector", port)
            }
            ValidationError::MissingTls { port } => {
                write!(f, "https connector on port {} has no tls section", port)
            }
            ValidationError::MultipleDefaultConnectors => {
                write!(f, "more than one connector marked default")
            }
            ValidationError::InvalidContextPath { path } => {
                write!(f, "invalid context path '{}'", path)
            }
            ValidationError::DuplicateContextPath { path } => {
                write!(f, "context path '{}' declared twice", path)
            }
            ValidationError::EmptyDocBase { path } => {
                write!(f, "context '{}' has an empty doc_base", path)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a descriptor, collecting every error found.
pub fn validate_descriptor(descriptor: &ServerDescriptor) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if descriptor.connectors.is_empty() {
        errors.push(ValidationError::NoConnectors);
    }

    let mut ports = HashSet::new();
    for (index, connector) in descriptor.connectors.iter().enumerate() {
        if connector.port == 0 {
            errors.push(ValidationError::ZeroPort { index });
        } else if !ports.insert(connector.port) {
            errors.push(ValidationError::DuplicatePort {
                port: connector.port,
            });
        }
        if connector.scheme == Scheme::Https && connector.tls.is_none() {
            errors.push(ValidationError::MissingTls {
                port: connector.port,
            });
        }
    }

    if descriptor.connectors.iter().filter(|c| c.default).count() > 1 {
        errors.push(ValidationError::MultipleDefaultConnectors);
    }

    let mut paths = HashSet::new();
    for context in &descriptor.contexts {
        match ContextPath::parse(&context.path) {
            Ok(path) => {
                if !paths.insert(path) {
                    errors.push(ValidationError::DuplicateContextPath {
                        path: context.path.clone(),
                    });
                }
            }
            Err(_) => errors.push(ValidationError::InvalidContextPath {
                path: context.path.clone(),
            }),
        }
        if context.doc_base.trim().is_empty() {
            errors.push(ValidationError::EmptyDocBase {
                path: context.path.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_text: &str) -> ServerDescriptor {
        toml::from_str(toml_text).unwrap()
    }

    #[test]
    fn valid_descriptor_passes() {
        let descriptor = parse(
            r#"
            [[connector]]
            port = 8080
            default = true

            [[context]]
            path = "/"
            doc_base = "ROOT.war"
            "#,
        );
        assert!(validate_descriptor(&descriptor).is_ok());
    }

    #[test]
    fn all_errors_are_collected() {
        let descriptor = parse(
            r#"
            [[connector]]
            port = 8080
            default = true

            [[connector]]
            port = 8080
            default = true

            [[connector]]
            port = 8443
            scheme = "https"

            [[context]]
            path = "/a"
            doc_base = "a.war"

            [[context]]
            path = "a/"
            doc_base = ""
            "#,
        );
        let errors = validate_descriptor(&descriptor).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicatePort { port: 8080 }));
        assert!(errors.contains(&ValidationError::MissingTls { port: 8443 }));
        assert!(errors.contains(&ValidationError::MultipleDefaultConnectors));
        assert!(errors.contains(&ValidationError::DuplicateContextPath { path: "a/".into() }));
        assert!(errors.contains(&ValidationError::EmptyDocBase { path: "a/".into() }));
    }

    #[test]
    fn empty_descriptor_needs_a_connector() {
        let errors = validate_descriptor(&ServerDescriptor::default()).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NoConnectors]);
    }
}
