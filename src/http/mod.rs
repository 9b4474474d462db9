//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! EmbeddedPlan contexts
//!     → context.rs (unpack archive into work/, apply descriptor)
//!     → server.rs (one router per connector, root context as fallback)
//!     → middleware/access_log.rs (one line per request in logs/)
//!     → handed to net::listener for serving
//! ```

pub mod context;
pub mod middleware;
pub mod server;

pub use context::{ContextError, MountedContext};
pub use server::build_router;
