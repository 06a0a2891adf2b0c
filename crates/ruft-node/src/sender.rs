//! Sender driver: wires the [`ruft_transport::sender::Sender`] machine to a
//! connected UDP socket, the input file, and the journal.
//!
//! Three threads cooperate around one mutex-guarded control block:
//!
//! - the **application** (caller's) thread reads the file and manages the
//!   window, blocking on the condvar for handshake completion, window space,
//!   teardown drain, and final termination;
//! - the **listener** thread receives ACK datagrams and feeds them through
//!   the machine;
//! - the **timer** thread sleeps on the condvar until the machine's RTO
//!   deadline and fires expiry. It re-reads the deadline under the mutex
//!   after every wake, so a concurrent re-arm or cancellation always beats a
//!   stale expiry.
//!
//! Journal writes happen under the same mutex as the state transition they
//! describe, so log order is a linearization of protocol events.

use anyhow::Context;
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::File;
use std::io::{self, Read};
use std::net::UdpSocket;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ruft_transport::journal::{Direction, FileJournal};
use ruft_transport::loss::LossGate;
use ruft_transport::sender::{Sender, SenderConfig, SenderEvent};
use ruft_transport::seq::SeqNum;
use ruft_transport::wire::{Segment, SegmentKind, MAX_DATAGRAM, MAX_PAYLOAD};

/// Both peers live on loopback.
pub const LOCALHOST: &str = "127.0.0.1";

/// Listener poll interval: how often the receive loop rechecks liveness.
const LISTEN_POLL: Duration = Duration::from_millis(100);

/// Everything the sender driver needs, already validated.
#[derive(Debug)]
pub struct SenderSetup {
    pub sendport: u16,
    pub recvport: u16,
    pub filename: PathBuf,
    pub max_win: usize,
    pub rto: Duration,
    pub flp: f64,
    pub rlp: f64,
    pub seed: Option<u64>,
    /// Journal location; the CLI fixes this to `Sender_log.txt` in the
    /// working directory.
    pub log_path: PathBuf,
}

impl SenderSetup {
    pub fn from_cli(cli: crate::args::SenderCli) -> Self {
        SenderSetup {
            sendport: cli.sendport,
            recvport: cli.recvport,
            filename: cli.filename,
            max_win: cli.max_win,
            rto: Duration::from_millis(cli.rto_ms),
            flp: cli.flp,
            rlp: cli.rlp,
            seed: cli.seed,
            log_path: PathBuf::from("Sender_log.txt"),
        }
    }
}

// ─── Shared control block ───────────────────────────────────────────────────

struct Inner {
    machine: Sender,
    journal: FileJournal,
}

struct Shared {
    inner: Mutex<Inner>,
    cv: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Perform the machine's queued events: journal lines and socket sends.
fn pump(inner: &mut Inner, socket: &UdpSocket) -> anyhow::Result<()> {
    let events: Vec<SenderEvent> = inner.machine.drain_events().collect();
    for ev in events {
        match ev {
            SenderEvent::Transmit(seg) => {
                inner
                    .journal
                    .record(Direction::Send, seg.kind, seg.seq, seg.payload.len())
                    .context("writing sender journal")?;
                match socket.send(&seg.encode()) {
                    Ok(_) => {}
                    Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                        tracing::error!("receiver unreachable: connection refused, shutting down");
                        inner.machine.fail();
                    }
                    Err(e) => return Err(e).context("udp send"),
                }
            }
            SenderEvent::ForwardDropped(seg) => {
                inner
                    .journal
                    .record(Direction::Drop, seg.kind, seg.seq, seg.payload.len())
                    .context("writing sender journal")?;
            }
            SenderEvent::AckReceived(ack) => {
                inner
                    .journal
                    .record(Direction::Recv, SegmentKind::Ack, ack, 0)
                    .context("writing sender journal")?;
            }
            SenderEvent::AckDropped(ack) => {
                inner
                    .journal
                    .record(Direction::Drop, SegmentKind::Ack, ack, 0)
                    .context("writing sender journal")?;
            }
        }
    }
    Ok(())
}

// ─── Worker threads ─────────────────────────────────────────────────────────

fn spawn_listener(shared: Arc<Shared>, socket: Arc<UdpSocket>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("ruft-listener".into())
        .spawn(move || {
            let mut buf = [0u8; MAX_DATAGRAM];
            loop {
                if shared.lock().machine.terminated() {
                    break;
                }
                let n = match socket.recv(&mut buf) {
                    Ok(n) => n,
                    Err(e)
                        if matches!(
                            e.kind(),
                            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                        ) =>
                    {
                        continue;
                    }
                    Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                        tracing::error!("receiver unreachable: connection refused, shutting down");
                        let mut inner = shared.lock();
                        inner.machine.fail();
                        shared.cv.notify_all();
                        break;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "socket receive failed, shutting down");
                        let mut inner = shared.lock();
                        inner.machine.fail();
                        shared.cv.notify_all();
                        break;
                    }
                };

                let seg = match Segment::decode(&mut Bytes::copy_from_slice(&buf[..n])) {
                    Ok(seg) => seg,
                    Err(e) => {
                        // Trusted loopback: malformed datagrams vanish.
                        tracing::trace!(error = %e, "undecodable datagram dropped");
                        continue;
                    }
                };
                if seg.kind != SegmentKind::Ack {
                    tracing::trace!(kind = %seg.kind, "non-ack segment ignored");
                    continue;
                }

                let mut inner = shared.lock();
                inner.machine.on_ack(seg.seq);
                if let Err(e) = pump(&mut inner, &socket) {
                    tracing::error!(error = %e, "event pump failed, shutting down");
                    inner.machine.fail();
                }
                shared.cv.notify_all();
            }
        })
        .expect("failed to spawn listener thread")
}

fn spawn_timer(shared: Arc<Shared>, socket: Arc<UdpSocket>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("ruft-rto".into())
        .spawn(move || {
            let mut inner = shared.lock();
            loop {
                if inner.machine.terminated() {
                    break;
                }
                match inner.machine.rto_deadline() {
                    None => {
                        inner = shared
                            .cv
                            .wait(inner)
                            .unwrap_or_else(PoisonError::into_inner);
                    }
                    Some(deadline) => {
                        let now = quanta::Instant::now();
                        if now < deadline {
                            // Woken early by an ACK retiring the head? The
                            // next iteration reads the fresh deadline.
                            let (guard, _) = shared
                                .cv
                                .wait_timeout(inner, deadline.duration_since(now))
                                .unwrap_or_else(PoisonError::into_inner);
                            inner = guard;
                        } else {
                            inner.machine.on_rto();
                            if let Err(e) = pump(&mut inner, &socket) {
                                tracing::error!(error = %e, "event pump failed, shutting down");
                                inner.machine.fail();
                            }
                            shared.cv.notify_all();
                        }
                    }
                }
            }
        })
        .expect("failed to spawn timer thread")
}

// ─── Driver ─────────────────────────────────────────────────────────────────

/// Fill `buf` from the reader, short only at end of file.
fn read_chunk(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Run a complete sender lifecycle: handshake, transfer, teardown,
/// statistics. Returns once the journal trailer is on disk.
pub fn run(setup: SenderSetup) -> anyhow::Result<()> {
    let socket = UdpSocket::bind((LOCALHOST, setup.sendport))
        .with_context(|| format!("binding udp {LOCALHOST}:{}", setup.sendport))?;
    socket
        .connect((LOCALHOST, setup.recvport))
        .with_context(|| format!("connecting udp {LOCALHOST}:{}", setup.recvport))?;
    socket
        .set_read_timeout(Some(LISTEN_POLL))
        .context("setting socket timeout")?;
    let socket = Arc::new(socket);

    let mut reader = File::open(&setup.filename)
        .with_context(|| format!("opening {}", setup.filename.display()))?;

    let config = SenderConfig {
        max_win: setup.max_win,
        rto: setup.rto,
        forward_loss: setup.flp,
        reverse_loss: setup.rlp,
    };
    let machine = match setup.seed {
        Some(seed) => {
            let mut rng = StdRng::seed_from_u64(seed);
            let isn = SeqNum::random(&mut rng);
            Sender::with_parts(
                config,
                isn,
                LossGate::seeded(setup.flp, seed.wrapping_add(1)),
                LossGate::seeded(setup.rlp, seed.wrapping_add(2)),
            )
        }
        None => Sender::new(config),
    };

    tracing::info!(
        sendport = setup.sendport,
        recvport = setup.recvport,
        file = %setup.filename.display(),
        max_win = setup.max_win,
        rto_ms = setup.rto.as_millis() as u64,
        flp = setup.flp,
        rlp = setup.rlp,
        isn = %machine.isn(),
        "sender starting"
    );

    let journal = FileJournal::create(&setup.log_path)
        .with_context(|| format!("creating {}", setup.log_path.display()))?;

    let shared = Arc::new(Shared {
        inner: Mutex::new(Inner { machine, journal }),
        cv: Condvar::new(),
    });

    // ── Handshake ───────────────────────────────────────────────
    {
        let mut inner = shared.lock();
        inner.journal.start_clock();
        inner.machine.open();
        pump(&mut inner, &socket)?;
    }

    let listener = spawn_listener(shared.clone(), socket.clone());
    let timer = spawn_timer(shared.clone(), socket.clone());

    {
        let mut inner = shared.lock();
        while !inner.machine.syn_acked() && !inner.machine.terminated() {
            inner = shared
                .cv
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    // ── Transfer ────────────────────────────────────────────────
    let mut buf = [0u8; MAX_PAYLOAD];
    loop {
        let mut inner = shared.lock();
        while !inner.machine.window_available() && !inner.machine.terminated() {
            inner = shared
                .cv
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if inner.machine.terminated() {
            break;
        }
        drop(inner);

        let n = read_chunk(&mut reader, &mut buf)
            .with_context(|| format!("reading {}", setup.filename.display()))?;
        if n == 0 {
            break;
        }

        let mut inner = shared.lock();
        if inner.machine.terminated() {
            break;
        }
        inner.machine.push_data(Bytes::copy_from_slice(&buf[..n]));
        pump(&mut inner, &socket)?;
        shared.cv.notify_all();
    }

    // ── Teardown ────────────────────────────────────────────────
    {
        let mut inner = shared.lock();
        while !inner.machine.all_acked() && !inner.machine.terminated() {
            inner = shared
                .cv
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if !inner.machine.terminated() {
            inner.machine.push_fin();
            pump(&mut inner, &socket)?;
            shared.cv.notify_all();
        }
        while !inner.machine.terminated() {
            inner = shared
                .cv
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }

        let trailer = inner.machine.stats().render();
        inner
            .journal
            .finish(&trailer)
            .context("writing sender statistics")?;

        let stats = inner.machine.stats();
        tracing::info!(
            data_sent = stats.original_data_sent,
            data_acked = stats.original_data_acked,
            retransmitted = stats.retransmitted_segments,
            dropped = stats.data_segments_dropped,
            "transfer complete"
        );
    }
    shared.cv.notify_all();

    let _ = listener.join();
    let _ = timer.join();
    Ok(())
}
