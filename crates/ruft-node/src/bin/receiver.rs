//! `receiver <recvport> <sendport> <filename> <max_win>`
//!
//! Reassembles the transferred file into `filename`, ACKing the sender peer
//! on loopback, and writes `Receiver_log.txt` in the working directory.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ruft_node::args::ReceiverCli;
use ruft_node::receiver::{self, ReceiverSetup};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .compact()
        .init();

    let cli = ReceiverCli::parse();
    receiver::run(ReceiverSetup::from_cli(cli))
}
