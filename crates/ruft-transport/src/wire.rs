//! # ruft Wire Format
//!
//! Fixed 4-byte header, no options, no checksum (the substrate is trusted
//! loopback).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |          Type (16)            |      Seq / Ack number (16)    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                     Payload (0..=1000 bytes, DATA only)       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Both header fields are big-endian. ACK/SYN/FIN carry an empty payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

use crate::seq::SeqNum;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Header size: 2 (type) + 2 (sequence number).
pub const HEADER_LEN: usize = 4;

/// Maximum payload carried by a single DATA segment.
pub const MAX_PAYLOAD: usize = 1000;

/// Maximum datagram size on the wire.
pub const MAX_DATAGRAM: usize = HEADER_LEN + MAX_PAYLOAD;

// ─── Segment Kind ────────────────────────────────────────────────────────────

/// Wire-level segment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SegmentKind {
    Data = 0,
    Ack = 1,
    Syn = 2,
    Fin = 3,
}

impl SegmentKind {
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(SegmentKind::Data),
            1 => Some(SegmentKind::Ack),
            2 => Some(SegmentKind::Syn),
            3 => Some(SegmentKind::Fin),
            _ => None,
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SegmentKind::Data => "DATA",
            SegmentKind::Ack => "ACK",
            SegmentKind::Syn => "SYN",
            SegmentKind::Fin => "FIN",
        };
        f.write_str(name)
    }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Decode failure. The substrate is trusted loopback, so drivers drop these
/// silently rather than tearing the connection down.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WireError {
    #[error("datagram shorter than the {HEADER_LEN}-byte header: {len} bytes")]
    Truncated { len: usize },
    #[error("unknown segment type tag: {0}")]
    UnknownKind(u16),
}

// ─── Segment ─────────────────────────────────────────────────────────────────

/// A decoded wire segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub seq: SeqNum,
    pub payload: Bytes,
}

impl Segment {
    /// Build a DATA segment. `payload` must not exceed [`MAX_PAYLOAD`].
    pub fn data(seq: SeqNum, payload: Bytes) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD);
        Segment {
            kind: SegmentKind::Data,
            seq,
            payload,
        }
    }

    /// Build an ACK carrying `ack` as its number.
    pub fn ack(ack: SeqNum) -> Self {
        Segment {
            kind: SegmentKind::Ack,
            seq: ack,
            payload: Bytes::new(),
        }
    }

    pub fn syn(seq: SeqNum) -> Self {
        Segment {
            kind: SegmentKind::Syn,
            seq,
            payload: Bytes::new(),
        }
    }

    pub fn fin(seq: SeqNum) -> Self {
        Segment {
            kind: SegmentKind::Fin,
            seq,
            payload: Bytes::new(),
        }
    }

    /// How many sequence numbers this segment consumes: a DATA segment
    /// consumes one per payload byte, SYN and FIN consume one each, an ACK
    /// consumes none.
    pub fn seq_span(&self) -> u16 {
        match self.kind {
            SegmentKind::Data => self.payload.len() as u16,
            SegmentKind::Syn | SegmentKind::Fin => 1,
            SegmentKind::Ack => 0,
        }
    }

    /// Serialize header + payload into a fresh buffer.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.put_u16(self.kind as u16);
        buf.put_u16(self.seq.value());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decode a complete segment from raw datagram bytes.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        if buf.remaining() < HEADER_LEN {
            return Err(WireError::Truncated {
                len: buf.remaining(),
            });
        }
        let raw_kind = buf.get_u16();
        let kind = SegmentKind::from_raw(raw_kind).ok_or(WireError::UnknownKind(raw_kind))?;
        let seq = SeqNum::new(buf.get_u16());
        let payload = buf.copy_to_bytes(buf.remaining());
        Ok(Segment { kind, seq, payload })
    }
}
