//! # Transfer Statistics
//!
//! Counters accumulated by the state machines and rendered as the trailing
//! block of each peer's journal. Both structs serialize to JSON as well, so
//! harnesses can consume them without scraping the log.

use serde::Serialize;

// ─── Sender Stats ───────────────────────────────────────────────────────────

/// Sender-side counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SenderStats {
    /// Payload bytes of first-transmission DATA segments.
    pub original_data_sent: u64,
    /// Payload bytes acknowledged by the receiver.
    pub original_data_acked: u64,
    /// First-transmission DATA segments.
    pub original_segments_sent: u64,
    /// Retransmission attempts (RTO and fast retransmit).
    pub retransmitted_segments: u64,
    /// ACKs that arrived equal to the oldest outstanding sequence.
    pub dup_acks_received: u64,
    /// Forward drops by the loss gate (DATA, SYN and FIN uniformly).
    pub data_segments_dropped: u64,
    /// Reverse drops of arriving ACKs by the loss gate.
    pub ack_segments_dropped: u64,
}

impl SenderStats {
    /// The journal trailer, exact wording and order.
    pub fn render(&self) -> String {
        format!(
            "Original data sent: {}\n\
             Original data acked: {}\n\
             Original segments sent: {}\n\
             Retransmitted segments: {}\n\
             Dup acks received: {}\n\
             Data segments dropped: {}\n\
             Ack segments dropped: {}\n",
            self.original_data_sent,
            self.original_data_acked,
            self.original_segments_sent,
            self.retransmitted_segments,
            self.dup_acks_received,
            self.data_segments_dropped,
            self.ack_segments_dropped,
        )
    }
}

// ─── Receiver Stats ─────────────────────────────────────────────────────────

/// Receiver-side counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReceiverStats {
    /// Payload bytes delivered to the output file.
    pub original_data_received: u64,
    /// DATA segments delivered (in order or drained from the buffer).
    pub original_segments_received: u64,
    /// DATA segments whose sequence was already delivered or buffered.
    pub dup_data_segments_received: u64,
    /// Duplicate ACKs emitted for out-of-order or retransmitted DATA.
    pub dup_ack_segments_sent: u64,
}

impl ReceiverStats {
    /// The journal trailer, exact wording and order.
    pub fn render(&self) -> String {
        format!(
            "Original data received: {}\n\
             Original segments received: {}\n\
             Dup data segments received: {}\n\
             Dup ack segments sent: {}\n",
            self.original_data_received,
            self.original_segments_received,
            self.dup_data_segments_received,
            self.dup_ack_segments_sent,
        )
    }
}
