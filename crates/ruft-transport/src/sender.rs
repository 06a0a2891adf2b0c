//! # Sender State Machine
//!
//! Pure logic — no I/O. Owns the sliding-window control block: the
//! outstanding queue, slot-accounted bytes in flight, duplicate-ACK
//! bookkeeping, the single RTO deadline, and both loss gates. Produces
//! [`SenderEvent`]s for the driver to perform against the socket and the
//! journal.
//!
//! ## Lifecycle
//!
//! ```text
//!   open() ──ACK(ISN+1)──▶ syn_acked ──push_data()*──▶ all_acked
//!        ──push_fin()──▶ ACK(fin_ack_target) ──▶ terminated
//! ```
//!
//! 1. **Handshake**: SYN occupies one window slot until acknowledged
//! 2. **Transfer**: DATA admitted while `bytes_in_flight + 1000 ≤ max_win`
//! 3. **Teardown**: FIN sent once `outstanding` has drained
//!
//! ACK classification follows the cumulative-acknowledgement rules: the
//! expected ACK retires the head, an ACK equal to the head's sequence is a
//! duplicate (three in a row trigger fast retransmit), and an ACK ahead of
//! the expected one retires every segment it covers. All comparisons use the
//! half-space rule from [`crate::seq`].

use bytes::Bytes;
use quanta::Instant;
use std::collections::VecDeque;
use std::time::Duration;

use crate::loss::LossGate;
use crate::seq::SeqNum;
use crate::stats::SenderStats;
use crate::wire::{Segment, MAX_PAYLOAD};

// ─── Configuration ──────────────────────────────────────────────────────────

/// Every outstanding segment occupies one fixed-size window slot, SYN and
/// FIN included.
pub const WINDOW_SLOT: usize = 1000;

/// Consecutive duplicate ACKs that trigger a fast retransmit.
pub const DUP_ACK_THRESHOLD: u32 = 3;

/// Sender configuration parameters.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Maximum window in bytes, accounted in [`WINDOW_SLOT`] units.
    pub max_win: usize,
    /// Retransmission timeout.
    pub rto: Duration,
    /// Forward (sender → receiver) loss probability.
    pub forward_loss: f64,
    /// Reverse (receiver → sender) loss probability.
    pub reverse_loss: f64,
}

impl Default for SenderConfig {
    fn default() -> Self {
        SenderConfig {
            max_win: 3000,
            rto: Duration::from_millis(200),
            forward_loss: 0.0,
            reverse_loss: 0.0,
        }
    }
}

// ─── Events ─────────────────────────────────────────────────────────────────

/// What the driver must do, in order, after each state-machine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderEvent {
    /// Put the segment on the wire and journal `snd`.
    Transmit(Segment),
    /// The forward gate ate the segment: journal `drp`, nothing is sent.
    ForwardDropped(Segment),
    /// An ACK survived the reverse gate: journal `rcv`.
    AckReceived(SeqNum),
    /// The reverse gate ate an arriving ACK: journal `drp`.
    AckDropped(SeqNum),
}

// ─── Sender ─────────────────────────────────────────────────────────────────

/// Sender state machine.
pub struct Sender {
    config: SenderConfig,
    isn: SeqNum,
    /// Next sequence number to assign to a new DATA byte (or the FIN).
    next_seq: SeqNum,
    /// Unacknowledged transmissions, oldest first, modularly increasing.
    outstanding: VecDeque<Segment>,
    bytes_in_flight: usize,
    dup_ack_count: u32,
    syn_acked: bool,
    /// The ACK number that completes teardown, once the FIN is queued.
    fin_ack_target: Option<SeqNum>,
    terminated: bool,
    forward_gate: LossGate,
    reverse_gate: LossGate,
    rto_deadline: Option<Instant>,
    stats: SenderStats,
    events: Vec<SenderEvent>,
}

impl Sender {
    /// Create a sender with a uniformly random ISN and OS-seeded loss gates.
    pub fn new(config: SenderConfig) -> Self {
        let mut rng = rand::rng();
        let isn = SeqNum::random(&mut rng);
        let forward_gate = LossGate::new(config.forward_loss);
        let reverse_gate = LossGate::new(config.reverse_loss);
        Self::with_parts(config, isn, forward_gate, reverse_gate)
    }

    /// Create a sender from explicit parts — deterministic runs and tests.
    pub fn with_parts(
        config: SenderConfig,
        isn: SeqNum,
        forward_gate: LossGate,
        reverse_gate: LossGate,
    ) -> Self {
        Sender {
            next_seq: isn.step(1),
            isn,
            config,
            outstanding: VecDeque::new(),
            bytes_in_flight: 0,
            dup_ack_count: 0,
            syn_acked: false,
            fin_ack_target: None,
            terminated: false,
            forward_gate,
            reverse_gate,
            rto_deadline: None,
            stats: SenderStats::default(),
            events: Vec::new(),
        }
    }

    // ─── Handshake ───────────────────────────────────────────────────────

    /// Queue the SYN and arm the RTO timer. Call exactly once.
    pub fn open(&mut self) {
        debug_assert!(self.outstanding.is_empty() && !self.syn_acked);
        let seg = Segment::syn(self.isn);
        self.outstanding.push_back(seg.clone());
        self.bytes_in_flight = WINDOW_SLOT;
        self.arm_rto();
        self.dispatch(seg);
    }

    // ─── Transfer ────────────────────────────────────────────────────────

    /// Whether the window admits another DATA segment right now.
    pub fn window_available(&self) -> bool {
        self.syn_acked && self.bytes_in_flight + WINDOW_SLOT <= self.config.max_win
    }

    /// Queue one DATA segment. The caller must have checked
    /// [`Self::window_available`]; `payload` is 1..=1000 bytes.
    pub fn push_data(&mut self, payload: Bytes) {
        debug_assert!(!payload.is_empty() && payload.len() <= MAX_PAYLOAD);
        debug_assert!(self.window_available());
        let seg = Segment::data(self.next_seq, payload);
        self.stats.original_data_sent += seg.payload.len() as u64;
        self.stats.original_segments_sent += 1;
        self.next_seq = self.next_seq.step(seg.seq_span());
        self.outstanding.push_back(seg.clone());
        self.bytes_in_flight += WINDOW_SLOT;
        self.dispatch(seg);
    }

    // ─── Teardown ────────────────────────────────────────────────────────

    /// Every transmission so far has been acknowledged.
    pub fn all_acked(&self) -> bool {
        self.outstanding.is_empty()
    }

    /// Queue the FIN. Call once, after [`Self::all_acked`] holds.
    pub fn push_fin(&mut self) {
        debug_assert!(self.all_acked() && self.fin_ack_target.is_none());
        let seg = Segment::fin(self.next_seq);
        self.fin_ack_target = Some(self.next_seq.step(1));
        self.next_seq = self.next_seq.step(1);
        self.outstanding.push_back(seg.clone());
        self.bytes_in_flight += WINDOW_SLOT;
        self.dispatch(seg);
    }

    // ─── ACK processing ──────────────────────────────────────────────────

    /// Process one arriving ACK number (listener path). The reverse loss
    /// gate runs first; a dropped ACK leaves every other field untouched.
    pub fn on_ack(&mut self, ack: SeqNum) {
        if self.terminated {
            return;
        }
        if self.reverse_gate.roll() {
            self.stats.ack_segments_dropped += 1;
            self.events.push(SenderEvent::AckDropped(ack));
            return;
        }
        self.events.push(SenderEvent::AckReceived(ack));

        if ack == self.isn.step(1) {
            self.syn_acked = true;
        }
        if self.fin_ack_target == Some(ack) {
            self.terminated = true;
            self.outstanding.clear();
            self.bytes_in_flight = 0;
            self.rto_deadline = None;
            return;
        }

        let Some(head) = self.outstanding.front() else {
            return;
        };
        let head_seq = head.seq;
        let expected = head_seq.step(head.seq_span());

        if ack == expected {
            if let Some(seg) = self.outstanding.pop_front() {
                self.bytes_in_flight -= WINDOW_SLOT;
                self.stats.original_data_acked += seg.payload.len() as u64;
            }
            self.dup_ack_count = 0;
            self.arm_rto();
        } else if ack == head_seq {
            self.dup_ack_count += 1;
            self.stats.dup_acks_received += 1;
            if self.dup_ack_count == DUP_ACK_THRESHOLD {
                self.dup_ack_count = 0;
                if let Some(seg) = self.outstanding.front().cloned() {
                    self.stats.retransmitted_segments += 1;
                    tracing::debug!(seq = %seg.seq, "triple duplicate ack — fast retransmit");
                    self.dispatch(seg);
                }
            }
        } else if ack.is_after(expected) {
            // Cumulative ACK: retire everything it covers, keeping at least
            // one entry queued (an ACK landing past the tail is reconciled
            // by the next duplicate ACK or RTO expiry).
            while self.outstanding.len() > 1 {
                let retire = match self.outstanding.front() {
                    Some(head) => head.seq != ack && ack.is_after(head.seq),
                    None => false,
                };
                if !retire {
                    break;
                }
                if let Some(seg) = self.outstanding.pop_front() {
                    self.bytes_in_flight -= WINDOW_SLOT;
                    self.stats.original_data_acked += seg.payload.len() as u64;
                }
            }
            self.arm_rto();
        }
        // Anything behind the window is a stale ACK: ignore.
    }

    // ─── RTO timer ───────────────────────────────────────────────────────

    /// Timer expiry: retransmit the window head (if any) and re-arm.
    pub fn on_rto(&mut self) {
        if self.terminated {
            return;
        }
        if let Some(seg) = self.outstanding.front().cloned() {
            self.stats.retransmitted_segments += 1;
            tracing::debug!(seq = %seg.seq, kind = %seg.kind, "rto expiry — retransmitting window head");
            self.dispatch(seg);
        }
        self.arm_rto();
    }

    /// Current timer deadline; `None` while cancelled.
    pub fn rto_deadline(&self) -> Option<Instant> {
        self.rto_deadline
    }

    fn arm_rto(&mut self) {
        self.rto_deadline = Some(Instant::now() + self.config.rto);
    }

    // ─── Driver plumbing ─────────────────────────────────────────────────

    /// Tear the machine down from outside the protocol (peer unreachable).
    pub fn fail(&mut self) {
        self.terminated = true;
        self.rto_deadline = None;
    }

    /// Drain pending events for the driver to perform, in order.
    pub fn drain_events(&mut self) -> impl Iterator<Item = SenderEvent> + '_ {
        self.events.drain(..)
    }

    pub fn isn(&self) -> SeqNum {
        self.isn
    }

    pub fn syn_acked(&self) -> bool {
        self.syn_acked
    }

    pub fn terminated(&self) -> bool {
        self.terminated
    }

    pub fn bytes_in_flight(&self) -> usize {
        self.bytes_in_flight
    }

    pub fn outstanding_len(&self) -> usize {
        self.outstanding.len()
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }

    // Run the forward loss gate and queue the surviving transmission.
    fn dispatch(&mut self, seg: Segment) {
        if self.forward_gate.roll() {
            self.stats.data_segments_dropped += 1;
            self.events.push(SenderEvent::ForwardDropped(seg));
        } else {
            self.events.push(SenderEvent::Transmit(seg));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::SegmentKind;

    fn lossless(max_win: usize) -> Sender {
        Sender::with_parts(
            SenderConfig {
                max_win,
                ..Default::default()
            },
            SeqNum::new(100),
            LossGate::seeded(0.0, 1),
            LossGate::seeded(0.0, 2),
        )
    }

    fn transmits(s: &mut Sender) -> Vec<Segment> {
        s.drain_events()
            .filter_map(|e| match e {
                SenderEvent::Transmit(seg) => Some(seg),
                _ => None,
            })
            .collect()
    }

    fn complete_handshake(s: &mut Sender) {
        s.open();
        s.drain_events().for_each(drop);
        s.on_ack(s.isn().step(1));
        s.drain_events().for_each(drop);
    }

    // ─── Handshake ──────────────────────────────────────────────────────

    #[test]
    fn open_transmits_syn_and_occupies_a_slot() {
        let mut s = lossless(3000);
        s.open();
        let out = transmits(&mut s);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, SegmentKind::Syn);
        assert_eq!(out[0].seq, SeqNum::new(100));
        assert_eq!(s.bytes_in_flight(), WINDOW_SLOT);
        assert!(s.rto_deadline().is_some());
        assert!(!s.window_available(), "window closed until SYN is acked");
    }

    #[test]
    fn handshake_ack_opens_the_window() {
        let mut s = lossless(3000);
        s.open();
        s.on_ack(SeqNum::new(101));
        assert!(s.syn_acked());
        assert!(s.all_acked(), "SYN retired by its expected ACK");
        assert_eq!(s.bytes_in_flight(), 0);
        assert!(s.window_available());
    }

    // ─── Window accounting ──────────────────────────────────────────────

    #[test]
    fn window_bounds_bytes_in_flight() {
        let mut s = lossless(3000);
        complete_handshake(&mut s);
        for i in 0..3 {
            assert!(s.window_available(), "slot {i} should be admissible");
            s.push_data(Bytes::from(vec![b'x'; 1000]));
            assert!(s.bytes_in_flight() <= 3000);
        }
        assert!(!s.window_available(), "three slots fill a 3000-byte window");
    }

    #[test]
    fn max_win_1000_degenerates_to_stop_and_wait() {
        let mut s = lossless(1000);
        complete_handshake(&mut s);
        s.push_data(Bytes::from(vec![b'a'; 1000]));
        assert!(!s.window_available());
        s.on_ack(SeqNum::new(101).step(1000));
        assert!(s.window_available(), "window reopens only after the ACK");
    }

    #[test]
    fn short_segment_still_occupies_a_full_slot() {
        let mut s = lossless(1000);
        complete_handshake(&mut s);
        s.push_data(Bytes::from_static(b"tiny"));
        assert_eq!(s.bytes_in_flight(), WINDOW_SLOT);
        assert!(!s.window_available());
    }

    // ─── Sequence assignment ────────────────────────────────────────────

    #[test]
    fn data_sequences_advance_by_payload_length() {
        let mut s = lossless(10_000);
        complete_handshake(&mut s);
        s.push_data(Bytes::from(vec![0u8; 1000]));
        s.push_data(Bytes::from(vec![0u8; 500]));
        s.push_data(Bytes::from(vec![0u8; 1]));
        let out = transmits(&mut s);
        assert_eq!(out[0].seq, SeqNum::new(101));
        assert_eq!(out[1].seq, SeqNum::new(1101));
        assert_eq!(out[2].seq, SeqNum::new(1601));
    }

    #[test]
    fn sequence_numbers_wrap_modulo_space() {
        let mut s = Sender::with_parts(
            SenderConfig::default(),
            SeqNum::new(65530),
            LossGate::seeded(0.0, 1),
            LossGate::seeded(0.0, 2),
        );
        s.open();
        s.on_ack(SeqNum::new(65531));
        s.push_data(Bytes::from(vec![0u8; 10]));
        s.push_data(Bytes::from(vec![0u8; 10]));
        let out = transmits(&mut s);
        let data: Vec<&Segment> = out.iter().filter(|p| p.kind == SegmentKind::Data).collect();
        assert_eq!(data[0].seq, SeqNum::new(65531));
        assert_eq!(data[1].seq, SeqNum::new(5), "65541 mod 65536");
    }

    // ─── ACK classification ─────────────────────────────────────────────

    #[test]
    fn expected_ack_retires_head_and_credits_bytes() {
        let mut s = lossless(3000);
        complete_handshake(&mut s);
        s.push_data(Bytes::from(vec![0u8; 1000]));
        s.on_ack(SeqNum::new(1101));
        assert!(s.all_acked());
        assert_eq!(s.stats().original_data_acked, 1000);
        assert_eq!(s.bytes_in_flight(), 0);
    }

    #[test]
    fn triple_duplicate_ack_fast_retransmits_once() {
        let mut s = lossless(10_000);
        complete_handshake(&mut s);
        s.push_data(Bytes::from(vec![0u8; 1000]));
        s.push_data(Bytes::from(vec![0u8; 1000]));
        s.drain_events().for_each(drop);

        // Three ACKs pinned to the head's own sequence number.
        for _ in 0..3 {
            s.on_ack(SeqNum::new(101));
        }
        let out = transmits(&mut s);
        assert_eq!(out.len(), 1, "exactly one fast retransmit");
        assert_eq!(out[0].seq, SeqNum::new(101));
        assert_eq!(s.stats().retransmitted_segments, 1);
        assert_eq!(s.stats().dup_acks_received, 3);

        // The counter reset: two more duplicates do nothing.
        s.on_ack(SeqNum::new(101));
        s.on_ack(SeqNum::new(101));
        assert!(transmits(&mut s).is_empty());
        assert_eq!(s.stats().retransmitted_segments, 1);
    }

    #[test]
    fn cumulative_ack_retires_covered_segments() {
        let mut s = lossless(10_000);
        complete_handshake(&mut s);
        for _ in 0..4 {
            s.push_data(Bytes::from(vec![0u8; 1000]));
        }
        s.drain_events().for_each(drop);

        // ACK covering the first two segments: both retire and the head
        // lands exactly on the ack number.
        s.on_ack(SeqNum::new(101).step(2000));
        assert_eq!(s.outstanding_len(), 2);
        assert_eq!(s.stats().original_data_acked, 2000);
        assert_eq!(s.bytes_in_flight(), 2000);
    }

    #[test]
    fn cumulative_ack_across_wrap_retires_in_order() {
        let mut s = Sender::with_parts(
            SenderConfig {
                max_win: 10_000,
                ..Default::default()
            },
            SeqNum::new(65530),
            LossGate::seeded(0.0, 1),
            LossGate::seeded(0.0, 2),
        );
        s.open();
        s.on_ack(SeqNum::new(65531));
        for _ in 0..4 {
            s.push_data(Bytes::from(vec![0u8; 1000]));
        }
        s.drain_events().for_each(drop);

        // Sequences are 65531, 995, 1995, 2995; ack the end of the second.
        s.on_ack(SeqNum::new(1995));
        assert_eq!(s.outstanding_len(), 2);
        assert_eq!(s.stats().original_data_acked, 2000);
    }

    #[test]
    fn stale_ack_behind_the_window_is_ignored() {
        let mut s = lossless(3000);
        complete_handshake(&mut s);
        s.push_data(Bytes::from(vec![0u8; 1000]));
        s.drain_events().for_each(drop);
        let before = s.outstanding_len();
        s.on_ack(SeqNum::new(50)); // far behind the ISN
        assert_eq!(s.outstanding_len(), before);
        assert!(transmits(&mut s).is_empty());
    }

    // ─── RTO ────────────────────────────────────────────────────────────

    #[test]
    fn rto_retransmits_head_and_rearms() {
        let mut s = lossless(3000);
        complete_handshake(&mut s);
        s.push_data(Bytes::from(vec![0u8; 1000]));
        s.drain_events().for_each(drop);

        s.on_rto();
        let out = transmits(&mut s);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].seq, SeqNum::new(101));
        assert_eq!(s.stats().retransmitted_segments, 1);
        assert!(s.rto_deadline().is_some());
    }

    #[test]
    fn rto_with_empty_outstanding_is_a_noop() {
        let mut s = lossless(3000);
        complete_handshake(&mut s);
        s.on_rto();
        assert!(transmits(&mut s).is_empty());
        assert_eq!(s.stats().retransmitted_segments, 0);
        assert!(s.rto_deadline().is_some(), "timer re-arms until teardown");
    }

    // ─── Loss gates ─────────────────────────────────────────────────────

    #[test]
    fn forward_gate_drop_counts_and_suppresses_transmit() {
        let mut s = Sender::with_parts(
            SenderConfig {
                forward_loss: 1.0,
                ..Default::default()
            },
            SeqNum::new(0),
            LossGate::seeded(1.0, 1),
            LossGate::seeded(0.0, 2),
        );
        s.open();
        let events: Vec<SenderEvent> = s.drain_events().collect();
        assert!(matches!(events[0], SenderEvent::ForwardDropped(_)));
        assert_eq!(s.stats().data_segments_dropped, 1, "SYN drops count too");
        // The SYN is still outstanding: the RTO path recovers it.
        assert_eq!(s.outstanding_len(), 1);
    }

    #[test]
    fn reverse_gate_drop_leaves_state_untouched() {
        let mut s = Sender::with_parts(
            SenderConfig::default(),
            SeqNum::new(100),
            LossGate::seeded(0.0, 1),
            LossGate::seeded(1.0, 2),
        );
        s.open();
        s.drain_events().for_each(drop);
        s.on_ack(SeqNum::new(101));
        let events: Vec<SenderEvent> = s.drain_events().collect();
        assert_eq!(events, vec![SenderEvent::AckDropped(SeqNum::new(101))]);
        assert!(!s.syn_acked(), "a dropped ACK never happened");
        assert_eq!(s.stats().ack_segments_dropped, 1);
    }

    // ─── Teardown ───────────────────────────────────────────────────────

    #[test]
    fn fin_ack_terminates_and_cancels_the_timer() {
        let mut s = lossless(3000);
        complete_handshake(&mut s);
        s.push_fin();
        let out = transmits(&mut s);
        assert_eq!(out[0].kind, SegmentKind::Fin);
        assert_eq!(out[0].seq, SeqNum::new(101));

        s.on_ack(SeqNum::new(102));
        assert!(s.terminated());
        assert!(s.rto_deadline().is_none());
        assert!(s.all_acked());
    }

    #[test]
    fn empty_transfer_is_syn_then_fin() {
        let mut s = lossless(3000);
        s.open();
        s.on_ack(SeqNum::new(101));
        assert!(s.all_acked());
        s.push_fin();
        s.on_ack(SeqNum::new(102));
        assert!(s.terminated());
        let kinds: Vec<SegmentKind> = transmits(&mut s).iter().map(|p| p.kind).collect();
        assert!(!kinds.contains(&SegmentKind::Data));
        assert_eq!(s.stats().original_segments_sent, 0);
    }
}
