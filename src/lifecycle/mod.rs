//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Properties → Runtime configuration → Archive spec → Extraction → Orchestrator
//!
//! Orchestration (orchestrator.rs):
//!     Plan or external descriptor → ServerRuntime::start → wait → stop
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then extraction, then listeners
//! - Ordered shutdown: trigger token, drain connectors, exit
//! - Shutdown has a grace period per connector

pub mod orchestrator;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use orchestrator::{OrchestratorError, ServerHandle, ServerOrchestrator};
pub use shutdown::Shutdown;
pub use startup::{LaunchOptions, LauncherError};
