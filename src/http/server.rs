//! Router assembly for a connector.
//!
//! # Responsibilities
//! - Mount every deployed context under its path
//! - Route the root context as the fallback
//! - Wire up middleware (tracing, access log)

use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

use crate::http::context::{context_router, ContextError, MountedContext};
use crate::http::middleware::access_log::{access_log_middleware, AccessLog};
use crate::server::plan::ConnectorSpec;

/// Build the router served by `connector`.
pub fn build_router(
    contexts: &[MountedContext],
    connector: &ConnectorSpec,
    access_log: Option<&AccessLog>,
) -> Result<Router, ContextError> {
    let mut router = Router::new();
    for context in contexts {
        let service = context_router(context, connector)?;
        router = if context.path.is_root() {
            router.fallback_service(service)
        } else {
            router.nest_service(context.path.as_str(), service)
        };
        tracing::debug!(
            context = %context.path,
            port = connector.port,
            "Context mounted"
        );
    }

    if let Some(log) = access_log {
        router = router.layer(middleware::from_fn_with_state(log.clone(), access_log_middleware));
    }
    Ok(router.layer(TraceLayer::new_for_http()))
}
