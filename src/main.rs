//! Binary entry point for the Azure File volume plugin.

use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;
use tracing::warn;

use azfile_driver::plugin::{self, ServeError};
use azfile_driver::{
    AzureFileShares, CifsMounter, DriverConfig, FileMetadataStore, VolumeDriver, logging,
};

mod cli;

use cli::{Cli, ServeCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("metadata store error: {0}")]
    Metadata(String),
    #[error(transparent)]
    Serve(#[from] ServeError),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli {
        Cli::Serve(command) => serve(command).await,
    }
}

async fn serve(args: ServeCommand) -> Result<(), CliError> {
    if let Err(err) = logging::init() {
        writeln!(io::stderr(), "failed to initialise logging: {err}").ok();
    }

    let config =
        DriverConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    let settings = config
        .driver_settings()
        .map_err(|err| CliError::Config(err.to_string()))?;
    let socket = Utf8PathBuf::from(args.socket.unwrap_or_else(|| config.socket_path.clone()));

    let store = FileMetadataStore::open(config.metadata_root.trim())
        .map_err(|err| CliError::Metadata(err.to_string()))?;
    let shares = AzureFileShares::new(settings.credentials.clone());
    let driver = Arc::new(VolumeDriver::new(
        shares,
        CifsMounter::with_process_runner(),
        store,
        settings,
    ));

    plugin::serve(driver, &socket, shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "could not listen for ctrl-c; shutting down");
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
