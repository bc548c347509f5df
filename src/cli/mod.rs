//! Command-line interface definitions for the `azfile-driver` binary.
//!
//! Shared by the binary and the build script, which renders the manual
//! page from the same parser.

use clap::Parser;

/// Top-level CLI for the `azfile-driver` binary.
#[derive(Debug, Parser)]
#[command(
    name = "azfile-driver",
    about = "Docker volume plugin exposing Azure File shares as local mountpoints",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Serve the volume plugin protocol until interrupted.
    #[command(name = "serve", about = "Serve the volume plugin protocol until interrupted")]
    Serve(ServeCommand),
}

/// Arguments for the `azfile-driver serve` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ServeCommand {
    /// Listen on this Unix socket instead of the configured `socket_path`.
    #[arg(long, value_name = "PATH")]
    pub(crate) socket: Option<String>,
}
