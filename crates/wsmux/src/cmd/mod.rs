use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept WebSocket peers and echo every channel they open.
    Serve(ServeArgs),
    /// Open one channel, send a payload and print what comes back.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(default_value = "127.0.0.1:9000")]
    pub addr: SocketAddr,
    /// Exit after N channels have been echoed to completion.
    #[arg(long)]
    pub count: Option<usize>,
    /// Receive buffer per channel, in bytes.
    #[arg(long, default_value_t = wsmux_peer::DEFAULT_READ_BUFFER_SIZE)]
    pub read_buffer: usize,
    /// Unacknowledged bytes per channel before writes stall.
    #[arg(long, default_value_t = wsmux_peer::DEFAULT_WRITE_MAX_OUTSTANDING)]
    pub max_outstanding: usize,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// WebSocket URL to connect to.
    pub url: String,
    /// Channel metadata (JSON).
    #[arg(long, default_value = "{}")]
    pub meta: String,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Maximum time for the whole exchange (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("runtime setup failed: {err}")))
}
