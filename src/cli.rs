//! Command line of the launcher.

use std::path::PathBuf;

use clap::Parser;

use crate::config::runtime::{Overrides, TlsEnvironment};
use crate::lifecycle::startup::{LaunchOptions, DEFAULT_EXTRACT_DIRECTORY};
use crate::observability::logging::LogFormat;

#[derive(Debug, Parser)]
#[command(name = "standalone-runner", version)]
#[command(about = "Extracts bundled web archives and serves them", long_about = None)]
#[command(allow_negative_numbers = true)]
pub struct Cli {
    /// HTTP connector port (0 or negative disables it)
    #[arg(long)]
    pub http_port: Option<i64>,

    /// HTTPS connector port
    #[arg(long)]
    pub https_port: Option<i64>,

    /// AJP connector port. The built-in server does not speak AJP, so any
    /// positive value makes startup fail
    #[arg(long)]
    pub ajp_port: Option<i64>,

    /// Protocol of the HTTP and HTTPS connectors
    #[arg(long)]
    pub http_protocol: Option<String>,

    /// External server descriptor, used when the bundle enables it
    #[arg(long)]
    pub server_config: Option<PathBuf>,

    /// Delete and re-extract an existing working directory
    #[arg(long)]
    pub reset_extract: bool,

    /// Working directory the bundle is extracted into
    #[arg(long, default_value = DEFAULT_EXTRACT_DIRECTORY)]
    pub extract_directory: PathBuf,

    /// Read the bundle from this directory instead of the embedded one
    #[arg(long)]
    pub bundle_dir: Option<PathBuf>,

    /// PEM file with certificate chain and private key
    #[arg(long, env = "RUNNER_KEYSTORE")]
    pub keystore: Option<PathBuf>,

    #[arg(long, env = "RUNNER_KEYSTORE_PASSWORD", hide_env_values = true)]
    pub keystore_password: Option<String>,

    #[arg(long, env = "RUNNER_KEYSTORE_TYPE")]
    pub keystore_type: Option<String>,

    /// PEM bundle of CAs trusted for client certificates
    #[arg(long, env = "RUNNER_TRUSTSTORE")]
    pub truststore: Option<PathBuf>,

    #[arg(long, env = "RUNNER_TRUSTSTORE_PASSWORD", hide_env_values = true)]
    pub truststore_password: Option<String>,

    #[arg(long, env = "RUNNER_TRUSTSTORE_TYPE")]
    pub truststore_type: Option<String>,

    /// Require client certificates on the HTTPS connector
    #[arg(long)]
    pub client_auth: bool,

    #[arg(long)]
    pub key_alias: Option<String>,

    /// Forward records of another logging framework (`log`)
    #[arg(long)]
    pub log_bridge: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Console log format: text or json
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            http_port: self.http_port,
            https_port: self.https_port,
            ajp_port: self.ajp_port,
            http_protocol: self.http_protocol.clone(),
            server_config_path: self.server_config.clone(),
            client_auth: self.client_auth,
            key_alias: self.key_alias.clone(),
        }
    }

    pub fn tls_environment(&self) -> TlsEnvironment {
        TlsEnvironment {
            keystore_file: self.keystore.clone(),
            keystore_password: self.keystore_password.clone(),
            keystore_type: self.keystore_type.clone(),
            truststore_file: self.truststore.clone(),
            truststore_password: self.truststore_password.clone(),
            truststore_type: self.truststore_type.clone(),
        }
    }

    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            extract_directory: self.extract_directory.clone(),
            reset_extract: self.reset_extract,
            overrides: self.overrides(),
            tls_env: self.tls_environment(),
            log_bridge: self.log_bridge.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["standalone-runner"]).unwrap();
        assert_eq!(cli.extract_directory, PathBuf::from(".extract"));
        assert!(!cli.reset_extract);
        assert_eq!(cli.log_format, LogFormat::Text);
        assert!(cli.http_port.is_none());
    }

    #[test]
    fn ajp_help_warns_about_missing_support() {
        use clap::CommandFactory;
        let command = Cli::command();
        let ajp = command
            .get_arguments()
            .find(|arg| arg.get_id() == "ajp_port")
            .unwrap();
        let help = ajp.get_help().unwrap().to_string();
        assert!(help.contains("does not speak AJP"), "{help}");
    }

    #[test]
    fn overrides_from_flags() {
        let cli = Cli::try_parse_from([
            "standalone-runner",
            "--http-port",
            "-1",
            "--https-port",
            "8443",
            "--http-protocol",
            "HTTP/2",
            "--client-auth",
            "--key-alias",
            "web",
            "--server-config",
            "/etc/runner/server.toml",
            "--log-format",
            "json",
        ])
        .unwrap();

        let overrides = cli.overrides();
        assert_eq!(overrides.http_port, Some(-1));
        assert_eq!(overrides.https_port, Some(8443));
        assert_eq!(overrides.http_protocol.as_deref(), Some("HTTP/2"));
        assert!(overrides.client_auth);
        assert_eq!(overrides.key_alias.as_deref(), Some("web"));
        assert_eq!(
            overrides.server_config_path,
            Some(PathBuf::from("/etc/runner/server.toml"))
        );
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn tls_flags_fill_environment() {
        let cli = Cli::try_parse_from([
            "standalone-runner",
            "--keystore",
            "conf/server.pem",
            "--truststore-type",
            "PEM",
        ])
        .unwrap();
        let tls = cli.tls_environment();
        assert_eq!(tls.keystore_file, Some(PathBuf::from("conf/server.pem")));
        assert_eq!(tls.truststore_type.as_deref(), Some("PEM"));
    }
}
