//! `sender <sendport> <recvport> <filename> <max_win> <rto_ms> <flp> <rlp>`
//!
//! Transfers `filename` to the receiver peer on loopback, tolerating the
//! configured forward/reverse loss, and writes `Sender_log.txt` in the
//! working directory.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ruft_node::args::SenderCli;
use ruft_node::sender::{self, SenderSetup};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .compact()
        .init();

    let cli = SenderCli::parse();
    sender::run(SenderSetup::from_cli(cli))
}
