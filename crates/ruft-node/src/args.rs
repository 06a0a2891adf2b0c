//! CLI grammar and argument validation for both peers.
//!
//! Violations exit with a non-zero status and a diagnostic, before any
//! socket or file is touched.

use clap::Parser;
use std::path::PathBuf;

/// Lowest usable port — the start of the dynamic/private range.
pub const PORT_MIN: u16 = 49152;
/// Highest usable port.
pub const PORT_MAX: u16 = 65535;
/// Smallest permitted window: one full segment.
pub const MIN_WINDOW: usize = 1000;

pub fn parse_port(s: &str) -> Result<u16, String> {
    let port: u16 = s
        .parse()
        .map_err(|_| format!("port must be numerical: {s}"))?;
    if !(PORT_MIN..=PORT_MAX).contains(&port) {
        return Err(format!(
            "port must be between {PORT_MIN} and {PORT_MAX}: {port}"
        ));
    }
    Ok(port)
}

pub fn parse_max_win(s: &str) -> Result<usize, String> {
    let max_win: usize = s
        .parse()
        .map_err(|_| format!("max_win must be numerical: {s}"))?;
    if max_win < MIN_WINDOW {
        return Err(format!(
            "max_win must be greater than or equal to {MIN_WINDOW}: {max_win}"
        ));
    }
    Ok(max_win)
}

pub fn parse_loss(s: &str) -> Result<f64, String> {
    let p: f64 = s
        .parse()
        .map_err(|_| format!("loss probability must be numerical: {s}"))?;
    if !(0.0..=1.0).contains(&p) {
        return Err(format!("loss probability must be between 0 and 1: {p}"));
    }
    Ok(p)
}

/// `sender <sendport> <recvport> <filename> <max_win> <rto_ms> <flp> <rlp>`
#[derive(Parser, Debug)]
#[command(name = "sender", about = "ruft sender — reliable file transfer over lossy UDP")]
pub struct SenderCli {
    /// Local UDP port to bind; ACKs arrive here.
    #[arg(value_parser = parse_port)]
    pub sendport: u16,

    /// Receiver's UDP port on loopback.
    #[arg(value_parser = parse_port)]
    pub recvport: u16,

    /// Text file to transfer.
    pub filename: PathBuf,

    /// Maximum window in bytes (at least 1000).
    #[arg(value_parser = parse_max_win)]
    pub max_win: usize,

    /// Retransmission timeout in milliseconds.
    pub rto_ms: u64,

    /// Forward loss probability, sender → receiver.
    #[arg(value_parser = parse_loss)]
    pub flp: f64,

    /// Reverse loss probability, receiver → sender.
    #[arg(value_parser = parse_loss)]
    pub rlp: f64,

    /// Deterministic seed for the ISN and both loss gates (reproducible runs).
    #[arg(long)]
    pub seed: Option<u64>,
}

/// `receiver <recvport> <sendport> <filename> <max_win>`
#[derive(Parser, Debug)]
#[command(
    name = "receiver",
    about = "ruft receiver — reassembles the transferred file and ACKs the sender"
)]
pub struct ReceiverCli {
    /// Local UDP port to bind; the sender's segments arrive here.
    #[arg(value_parser = parse_port)]
    pub recvport: u16,

    /// Sender's UDP port on loopback.
    #[arg(value_parser = parse_port)]
    pub sendport: u16,

    /// Path the reassembled file is written to.
    pub filename: PathBuf,

    /// Maximum window in bytes (at least 1000).
    #[arg(value_parser = parse_max_win)]
    pub max_win: usize,
}
