use std::process::ExitCode;

use clap::Parser;

use standalone_runner::cli::Cli;
use standalone_runner::deploy::resources::{BundledResources, DirectoryBundle, EmbeddedBundle};
use standalone_runner::lifecycle::{signals, startup, Shutdown};
use standalone_runner::observability::init_logging;
use standalone_runner::server::AxumRuntime;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug, cli.log_format);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "standalone-runner starting");

    let resources: Box<dyn BundledResources> = match &cli.bundle_dir {
        Some(dir) => {
            tracing::info!(bundle = %dir.display(), "Using bundle directory");
            Box::new(DirectoryBundle::new(dir))
        }
        None => Box::new(EmbeddedBundle),
    };

    let shutdown = Shutdown::new();
    let listener = signals::spawn_listener(shutdown.clone());

    let options = cli.launch_options();
    let result = startup::run(&options, resources.as_ref(), AxumRuntime::default(), shutdown).await;
    listener.abort();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, code = e.exit_code(), "Launcher failed");
            ExitCode::from(e.exit_code())
        }
    }
}
