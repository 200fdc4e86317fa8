use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use serialrw_packet::PacketKind;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod demo;
pub mod send;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run three position requests against a scripted in-memory device.
    Demo(DemoArgs),
    /// Send one request over a socket link and print its outcome.
    Send(SendArgs),
    /// Act as a device: acknowledge every request and echo it back.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Demo(args) => demo::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Simulate(args) => simulate::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Time to let the scripted replies settle before printing (e.g. 1s, 200ms).
    #[arg(long, default_value = "1s")]
    pub settle: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path of the device link.
    pub path: PathBuf,
    /// Packet kind to send (name or numeric tag).
    #[arg(long, short = 'k', default_value = "request-position")]
    pub kind: PacketKind,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Silence after which the request times out (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub response_timeout: String,
    /// Give up waiting for an outcome after this long.
    #[arg(long, default_value = "10s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Acknowledge requests but never answer them.
    #[arg(long)]
    pub ack_only: bool,
    /// Delay between acknowledgement and response (e.g. 50ms).
    #[arg(long)]
    pub delay: Option<String>,
    /// Exit after handling N requests.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `5s`, `250ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
