//! # ruft-node
//!
//! Peer drivers for the ruft file-transfer protocol. This crate owns
//! everything the transport library deliberately does not: CLI parsing and
//! validation, UDP sockets, file handles, and the threads that animate the
//! state machines (the sender's listener and RTO timer, the receiver's
//! time-wait one-shot).
//!
//! Two binaries are built from here: `sender` and `receiver`.

pub mod args;
pub mod receiver;
pub mod sender;
