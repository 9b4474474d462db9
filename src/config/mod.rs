//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! runner.toml (bundle)          CLI flags / env
//!     → properties.rs               → runtime.rs Overrides, TlsEnvironment
//!     → runtime.rs (merge: override > property > default)
//!     → RuntimeConfiguration (validated, immutable)
//!
//! External mode only:
//!     conf/server.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerDescriptor
//! ```
//!
//! # Design Decisions
//! - Config is immutable once derived
//! - All descriptor fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod properties;
pub mod runtime;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use properties::PropertySource;
pub use runtime::{Overrides, Ports, RuntimeConfiguration, RuntimeConfigurator, TlsEnvironment, TlsSettings};
pub use schema::ServerDescriptor;
