//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured fields)
//!     → logging.rs (subscriber: filter + fmt/json layer)
//!
//! Third-party `log` records:
//!     → LogBridgeInstaller (tracing-log) → same subscriber
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Log level from `RUST_LOG`, else `--debug`
//! - The access log has its own rolling file (see `http::middleware::access_log`)

pub mod logging;

pub use logging::{init_logging, install_bridge, LogFormat};
