//! Receiver driver: wires the [`ruft_transport::receiver::Receiver`] machine
//! to a connected UDP socket, the output file, and the journal.
//!
//! Single receive loop with a coarse socket timeout; the only other thread
//! is the one-shot time-wait timer, which flips a shared `alive` flag two
//! seconds after the first FIN. The journal clock starts at the arrival of
//! the opening SYN, so that event (and its log line) sits at `0.00`.

use anyhow::Context;
use bytes::Bytes;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::net::UdpSocket;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use ruft_transport::journal::{Direction, FileJournal};
use ruft_transport::receiver::{Receiver, ReceiverConfig, ReceiverEvent, ReceiverState};
use ruft_transport::wire::{Segment, SegmentKind, MAX_DATAGRAM};

use crate::sender::LOCALHOST;

/// Coarse receive timeout governing the main loop.
const RECV_POLL: Duration = Duration::from_secs(1);

/// How long an idle receiver waits for the opening SYN before giving up.
const PRE_SYN_IDLE_LIMIT: Duration = Duration::from_secs(10);

/// Shutdown delay after the first FIN, absorbing retransmitted FINs.
const TIME_WAIT: Duration = Duration::from_secs(2);

/// Everything the receiver driver needs, already validated.
#[derive(Debug)]
pub struct ReceiverSetup {
    pub recvport: u16,
    pub sendport: u16,
    pub filename: PathBuf,
    pub max_win: usize,
    /// Journal location; the CLI fixes this to `Receiver_log.txt` in the
    /// working directory.
    pub log_path: PathBuf,
}

impl ReceiverSetup {
    pub fn from_cli(cli: crate::args::ReceiverCli) -> Self {
        ReceiverSetup {
            recvport: cli.recvport,
            sendport: cli.sendport,
            filename: cli.filename,
            max_win: cli.max_win,
            log_path: PathBuf::from("Receiver_log.txt"),
        }
    }
}

/// Run a complete receiver lifecycle: listen, reassemble, time-wait,
/// statistics. Returns once the output file and journal trailer are on disk.
pub fn run(setup: ReceiverSetup) -> anyhow::Result<()> {
    let socket = UdpSocket::bind((LOCALHOST, setup.recvport))
        .with_context(|| format!("binding udp {LOCALHOST}:{}", setup.recvport))?;
    socket
        .connect((LOCALHOST, setup.sendport))
        .with_context(|| format!("connecting udp {LOCALHOST}:{}", setup.sendport))?;
    socket
        .set_read_timeout(Some(RECV_POLL))
        .context("setting socket timeout")?;

    let mut output = BufWriter::new(
        File::create(&setup.filename)
            .with_context(|| format!("creating {}", setup.filename.display()))?,
    );
    let mut journal = FileJournal::create(&setup.log_path)
        .with_context(|| format!("creating {}", setup.log_path.display()))?;
    let mut machine = Receiver::new(ReceiverConfig {
        max_win: setup.max_win,
    });

    tracing::info!(
        recvport = setup.recvport,
        sendport = setup.sendport,
        file = %setup.filename.display(),
        max_win = setup.max_win,
        "receiver listening"
    );

    let alive = Arc::new(AtomicBool::new(true));
    let mut time_wait_timer: Option<JoinHandle<()>> = None;
    let started = Instant::now();
    let mut buf = [0u8; MAX_DATAGRAM];

    while alive.load(Ordering::Relaxed) {
        let n = match socket.recv(&mut buf) {
            Ok(n) => n,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                if machine.state() == ReceiverState::Listen
                    && started.elapsed() >= PRE_SYN_IDLE_LIMIT
                {
                    tracing::info!("no opening syn within {PRE_SYN_IDLE_LIMIT:?}, shutting down");
                    return Ok(());
                }
                continue;
            }
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                tracing::error!("sender unreachable: connection refused, shutting down");
                break;
            }
            Err(e) => return Err(e).context("udp receive"),
        };

        let seg = match Segment::decode(&mut Bytes::copy_from_slice(&buf[..n])) {
            Ok(seg) => seg,
            Err(e) => {
                // Trusted loopback: malformed datagrams vanish.
                tracing::trace!(error = %e, "undecodable datagram dropped");
                continue;
            }
        };

        // Nothing before the opening SYN has a timestamp to log against.
        if !journal.clock_started() {
            if seg.kind != SegmentKind::Syn {
                tracing::trace!(kind = %seg.kind, "segment before syn — ignored");
                continue;
            }
            journal.start_clock();
        }

        journal
            .record(Direction::Recv, seg.kind, seg.seq, seg.payload.len())
            .context("writing receiver journal")?;
        machine.on_segment(seg);

        let events: Vec<ReceiverEvent> = machine.drain_events().collect();
        for ev in events {
            match ev {
                ReceiverEvent::Deliver(data) => {
                    output
                        .write_all(&data)
                        .with_context(|| format!("writing {}", setup.filename.display()))?;
                }
                ReceiverEvent::Transmit(ack) => {
                    journal
                        .record(Direction::Send, ack.kind, ack.seq, 0)
                        .context("writing receiver journal")?;
                    match socket.send(&ack.encode()) {
                        Ok(_) => {}
                        Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                            tracing::warn!("ack bounced: sender endpoint gone");
                        }
                        Err(e) => return Err(e).context("udp send"),
                    }
                }
                ReceiverEvent::TimeWaitStarted => {
                    tracing::debug!("fin received — entering time-wait");
                    let alive = alive.clone();
                    time_wait_timer = Some(
                        thread::Builder::new()
                            .name("ruft-time-wait".into())
                            .spawn(move || {
                                thread::sleep(TIME_WAIT);
                                alive.store(false, Ordering::Relaxed);
                            })
                            .expect("failed to spawn time-wait thread"),
                    );
                }
            }
        }
    }

    output
        .flush()
        .with_context(|| format!("flushing {}", setup.filename.display()))?;
    journal
        .finish(&machine.stats().render())
        .context("writing receiver statistics")?;
    if let Some(timer) = time_wait_timer {
        let _ = timer.join();
    }

    let stats = machine.stats();
    tracing::info!(
        data_received = stats.original_data_received,
        segments = stats.original_segments_received,
        dup_data = stats.dup_data_segments_received,
        dup_acks = stats.dup_ack_segments_sent,
        "receiver finished"
    );
    Ok(())
}
