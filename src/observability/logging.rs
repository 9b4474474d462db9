//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber
//! - Bridge records of other logging frameworks into it
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log level configurable via `RUST_LOG` and `--debug`

use std::str::FromStr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of the console log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Default filter directive.
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        "standalone_runner=debug,tower_http=debug"
    } else {
        "standalone_runner=info"
    }
}

/// Install the global subscriber. Does nothing if one is already set.
pub fn init_logging(debug: bool, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(debug).into());
    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };
    if let Err(e) = result {
        eprintln!("logging already initialized: {e}");
    }
}

/// Routes records of another logging framework into tracing.
pub trait LogBridgeInstaller {
    /// Name the bridge is selected by.
    fn name(&self) -> &'static str;

    /// Install the bridge. Installing twice is harmless.
    fn install(&self) -> Result<(), String>;
}

/// Bridge for the `log` crate facade.
#[cfg(feature = "log-bridge")]
#[derive(Debug, Default)]
pub struct LogCrateBridge;

#[cfg(feature = "log-bridge")]
impl LogBridgeInstaller for LogCrateBridge {
    fn name(&self) -> &'static str {
        "log"
    }

    fn install(&self) -> Result<(), String> {
        tracing_log::LogTracer::init().map_err(|e| e.to_string())
    }
}

/// Bridges compiled into this binary.
pub fn available_bridges() -> Vec<Box<dyn LogBridgeInstaller>> {
    #[allow(unused_mut)]
    let mut bridges: Vec<Box<dyn LogBridgeInstaller>> = Vec::new();
    #[cfg(feature = "log-bridge")]
    bridges.push(Box::new(LogCrateBridge));
    bridges
}

/// Install the bridge called `name`.
///
/// Returns whether a bridge was installed; unknown names are warned about.
pub fn install_bridge(name: &str) -> bool {
    let bridge = available_bridges()
        .into_iter()
        .find(|b| b.name().eq_ignore_ascii_case(name.trim()));
    match bridge {
        Some(bridge) => match bridge.install() {
            Ok(()) => {
                tracing::debug!(bridge = bridge.name(), "Log bridge installed");
                true
            }
            Err(e) => {
                tracing::debug!(bridge = bridge.name(), error = %e, "Log bridge already active");
                true
            }
        },
        None => {
            tracing::warn!(bridge = name, "Unknown log bridge, skipping");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_format() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn unknown_bridge_is_skipped() {
        assert!(!install_bridge("slf4j"));
    }

    #[cfg(feature = "log-bridge")]
    #[test]
    fn log_bridge_installs_twice() {
        assert!(install_bridge("log"));
        assert!(install_bridge("LOG"));
    }

    #[test]
    fn debug_widens_filter() {
        assert!(default_filter(true).contains("debug"));
        assert!(!default_filter(false).contains("debug"));
    }
}
