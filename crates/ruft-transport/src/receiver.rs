//! # Receiver State Machine
//!
//! Pure logic — no I/O. Tracks the next expected sequence number, buffers
//! out-of-order DATA, delivers payloads strictly in order, and answers every
//! arrival with a cumulative ACK equal to the current `expected_seq`.
//! Produces [`ReceiverEvent`]s for the driver to perform against the output
//! file, the journal, and the socket.
//!
//! ## Lifecycle
//!
//! ```text
//!   Listen ──SYN──▶ Established ──FIN──▶ TimeWait ──2s deadline──▶ done
//! ```
//!
//! The time-wait deadline itself lives in the driver (a one-shot timer
//! flipping the shared alive flag); the machine only reports when it starts.

use bytes::Bytes;
use std::collections::HashMap;

use crate::seq::SeqNum;
use crate::stats::ReceiverStats;
use crate::wire::{Segment, SegmentKind};

// ─── Configuration ──────────────────────────────────────────────────────────

/// Receiver configuration parameters.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Peer window in bytes; bounds how many out-of-order segments can be
    /// in flight, so it sizes the reorder buffer.
    pub max_win: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        ReceiverConfig { max_win: 3000 }
    }
}

// ─── State ──────────────────────────────────────────────────────────────────

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// Waiting for the opening SYN.
    Listen,
    /// Connection live; DATA flows.
    Established,
    /// FIN seen; absorbing retransmissions until the shutdown deadline.
    TimeWait,
}

// ─── Events ─────────────────────────────────────────────────────────────────

/// What the driver must do, in order, after feeding in a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverEvent {
    /// Append this payload to the output file.
    Deliver(Bytes),
    /// Send this ACK and journal `snd`.
    Transmit(Segment),
    /// The time-wait shutdown deadline starts now (one-shot, 2 s).
    TimeWaitStarted,
}

// ─── Receiver ───────────────────────────────────────────────────────────────

/// Receiver state machine.
pub struct Receiver {
    state: ReceiverState,
    /// Next in-order sequence number awaited. Meaningless in `Listen`.
    expected_seq: SeqNum,
    /// Out-of-order DATA keyed by raw sequence number, first write wins.
    buffer: HashMap<u16, Bytes>,
    stats: ReceiverStats,
    events: Vec<ReceiverEvent>,
}

impl Receiver {
    pub fn new(config: ReceiverConfig) -> Self {
        Receiver {
            state: ReceiverState::Listen,
            expected_seq: SeqNum::new(0),
            buffer: HashMap::with_capacity(config.max_win / crate::sender::WINDOW_SLOT),
            stats: ReceiverStats::default(),
            events: Vec::new(),
        }
    }

    /// Feed one decoded segment through the state machine.
    pub fn on_segment(&mut self, seg: Segment) {
        match seg.kind {
            SegmentKind::Syn => self.on_syn(seg.seq),
            SegmentKind::Data => self.on_data(seg.seq, seg.payload),
            SegmentKind::Fin => self.on_fin(seg.seq),
            SegmentKind::Ack => {
                // The sender never ACKs us; nothing to do.
                tracing::trace!(seq = %seg.seq, "ignoring stray ack");
            }
        }
    }

    fn on_syn(&mut self, seq: SeqNum) {
        if self.state == ReceiverState::Listen {
            self.state = ReceiverState::Established;
        }
        // A retransmitted SYN lands here too and is simply re-ACKed.
        self.expected_seq = seq.step(1);
        self.emit_ack();
    }

    fn on_data(&mut self, seq: SeqNum, payload: Bytes) {
        if self.state == ReceiverState::Listen {
            // No handshake yet, so no expected sequence to ACK against.
            tracing::trace!(%seq, "data before syn — ignored");
            return;
        }

        if seq == self.expected_seq {
            self.deliver(payload);
            // Drain the reorder buffer up to the first gap.
            while let Some(next) = self.buffer.remove(&self.expected_seq.value()) {
                self.deliver(next);
            }
            self.emit_ack();
            return;
        }

        // Out of order: either a retransmission of delivered data, a
        // duplicate of something buffered, or a fresh gap-straddling
        // segment. All three answer with a duplicate ACK.
        if self.expected_seq.is_after(seq) {
            self.stats.dup_data_segments_received += 1;
        } else if self.buffer.contains_key(&seq.value()) {
            self.stats.dup_data_segments_received += 1;
        } else {
            self.buffer.insert(seq.value(), payload);
        }
        self.stats.dup_ack_segments_sent += 1;
        self.emit_ack();
    }

    fn on_fin(&mut self, seq: SeqNum) {
        if self.state == ReceiverState::Listen {
            tracing::trace!(%seq, "fin before syn — ignored");
            return;
        }
        self.expected_seq = seq.step(1);
        if self.state != ReceiverState::TimeWait {
            self.state = ReceiverState::TimeWait;
            self.events.push(ReceiverEvent::TimeWaitStarted);
        }
        self.emit_ack();
    }

    fn deliver(&mut self, payload: Bytes) {
        self.stats.original_data_received += payload.len() as u64;
        self.stats.original_segments_received += 1;
        self.expected_seq = self.expected_seq.step(payload.len() as u16);
        self.events.push(ReceiverEvent::Deliver(payload));
    }

    fn emit_ack(&mut self) {
        self.events
            .push(ReceiverEvent::Transmit(Segment::ack(self.expected_seq)));
    }

    // ─── Driver plumbing ─────────────────────────────────────────────────

    /// Drain pending events for the driver to perform, in order.
    pub fn drain_events(&mut self) -> impl Iterator<Item = ReceiverEvent> + '_ {
        self.events.drain(..)
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// The next in-order sequence number awaited.
    pub fn expected_seq(&self) -> SeqNum {
        self.expected_seq
    }

    /// Number of out-of-order segments currently buffered.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }
}
