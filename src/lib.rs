//! Standalone web-archive runner.
//!
//! A single executable that carries its web archives and configuration,
//! extracts them into a working directory and serves them from an embedded
//! server.
//!
//! # Architecture Overview
//!
//! ```text
//!   CLI + bundled runner.toml
//!        │
//!        ▼
//!   ┌──────────────┐   ┌──────────────┐   ┌────────────────┐
//!   │   config     │──▶│   deploy     │──▶│   lifecycle    │
//!   │ properties   │   │ spec parser  │   │ orchestrator   │
//!   │ configurator │   │ extraction   │   │ shutdown/sig   │
//!   └──────────────┘   └──────────────┘   └───────┬────────┘
//!                                                 │ ServerRuntime
//!                                                 ▼
//!                      ┌──────────────────────────────────────┐
//!                      │ server (axum runtime)                │
//!                      │   net: listeners + rustls            │
//!                      │   http: contexts, access log         │
//!                      └──────────────────────────────────────┘
//! ```

pub mod cli;
pub mod config;
pub mod deploy;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod server;

pub use config::runtime::RuntimeConfiguration;
pub use lifecycle::{LaunchOptions, LauncherError, ServerOrchestrator, Shutdown};
pub use server::{AxumRuntime, ServerRuntime};
