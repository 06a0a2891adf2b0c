//! # ruft-transport
//!
//! ruft reliable file-transfer protocol.
//!
//! Sliding-window ARQ over an unreliable datagram substrate between exactly
//! two peers, with a 16-bit modular sequence space, cumulative
//! acknowledgements, triple-duplicate-ACK fast retransmit, and per-direction
//! simulated packet loss.
//!
//! ## Crate structure
//!
//! - [`wire`] — segment header serialization (DATA/ACK/SYN/FIN)
//! - [`seq`] — modular 16-bit sequence arithmetic
//! - [`loss`] — probabilistic drop gates for loss simulation
//! - [`journal`] — per-peer `snd`/`rcv`/`drp` event log
//! - [`stats`] — transfer counters and the final statistics block
//! - [`sender`] — sender state machine (handshake, window, teardown)
//! - [`receiver`] — receiver state machine (in-order delivery, time-wait)
//!
//! The state machines are pure logic: they own no sockets, files, or timer
//! threads. They emit typed events which a driver performs; the `ruft-node`
//! crate wires them to UDP sockets and the filesystem.

pub mod journal;
pub mod loss;
pub mod receiver;
pub mod sender;
pub mod seq;
pub mod stats;
pub mod wire;
