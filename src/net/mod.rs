//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ConnectorSpec
//!     → tls.rs (HTTPS only: PEM keystore/truststore → rustls config)
//!     → listener.rs (bind, serve router, graceful drain)
//!     → BoundConnector owned by the running server
//! ```
//!
//! # Design Decisions
//! - One socket and one serving task per connector
//! - Bind errors surface synchronously during startup
//! - TLS is optional and handled transparently

pub mod listener;
pub mod tls;

pub use listener::{BoundConnector, ListenerError};
