use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use clap::{Args, Subcommand};
use slipframe::transport::{Result as TransportResult, MAX_CHUNK_SIZE};
use slipframe::{DriverConfig, Endpoint, ErrorMode, TransportError};
use tracing::warn;

use crate::exit::{io_error, transport_error, CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod decode;
pub mod echo;
pub mod encode;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode one message as a SLIP packet on stdout.
    Encode(EncodeArgs),
    /// Decode a SLIP byte stream and print every message.
    Decode(DecodeArgs),
    /// Send a single message to a listening peer.
    Send(SendArgs),
    /// Listen and print received messages.
    Listen(ListenArgs),
    /// Start an echo server.
    Echo(EchoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args),
        Command::Decode(args) => decode::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Echo(args) => echo::run(args),
        Command::Version(args) => version::run(args),
    }
}

/// Message payload source. Stdin is read when neither flag is given.
#[derive(Args, Debug)]
pub struct PayloadArgs {
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Emit an END byte before the packet as well as after it.
    #[arg(long)]
    pub leading_end: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Read the byte stream from a file instead of stdin.
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Tolerate malformed escape sequences instead of rejecting the packet.
    #[arg(long)]
    pub relaxed: bool,
    /// Bytes requested per read (at most 16 MiB).
    #[arg(
        long,
        default_value_t = 8192,
        value_parser = clap::value_parser!(u64).range(1..=MAX_CHUNK_SIZE as u64)
    )]
    pub chunk_size: u64,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Endpoint to connect to (tcp:HOST:PORT, unix:PATH, HOST:PORT or a socket path).
    pub endpoint: String,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Emit an END byte before the packet as well as after it.
    #[arg(long)]
    pub leading_end: bool,
    /// Tolerate malformed escape sequences in the response.
    #[arg(long)]
    pub relaxed: bool,
    /// Wait for one response message and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for response when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Endpoint to bind (tcp:HOST:PORT, unix:PATH, HOST:PORT or a socket path).
    pub endpoint: String,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Tolerate malformed escape sequences instead of rejecting the packet.
    #[arg(long)]
    pub relaxed: bool,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Endpoint to bind (tcp:HOST:PORT, unix:PATH, HOST:PORT or a socket path).
    pub endpoint: String,
    /// Tolerate malformed escape sequences instead of rejecting the packet.
    #[arg(long)]
    pub relaxed: bool,
    /// Emit an END byte before each echoed packet.
    #[arg(long)]
    pub leading_end: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn driver_config(leading_end: bool, relaxed: bool) -> DriverConfig {
    let mode = if relaxed {
        ErrorMode::Relaxed
    } else {
        ErrorMode::Strict
    };
    DriverConfig::default()
        .with_leading_end(leading_end)
        .with_error_mode(mode)
}

pub(crate) fn parse_endpoint(input: &str) -> CliResult<Endpoint> {
    input
        .parse()
        .map_err(|err| transport_error("invalid endpoint", err))
}

pub(crate) fn resolve_payload(args: &PayloadArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return std::fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    let mut payload = Vec::new();
    std::io::stdin()
        .lock()
        .read_to_end(&mut payload)
        .map_err(|err| io_error("failed reading stdin", err))?;
    Ok(payload)
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        // A second interrupt while blocked in accept/recv exits immediately.
        if !running.swap(false, Ordering::SeqCst) {
            std::process::exit(130);
        }
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

/// What a receive loop does with the result of `recv_msg`.
pub(crate) enum Received {
    Message(Bytes),
    Skipped,
    Disconnected,
    Fatal(TransportError),
}

/// Malformed packets are logged and skipped; the connection stays usable.
pub(crate) fn classify_recv(result: TransportResult<Option<Bytes>>, peer: &str) -> Received {
    match result {
        Ok(Some(msg)) => Received::Message(msg),
        Ok(None) => Received::Disconnected,
        Err(TransportError::Driver(err)) if err.is_protocol() => {
            warn!(%peer, error = %err, "skipping malformed packet");
            Received::Skipped
        }
        Err(err) => Received::Fatal(err),
    }
}
