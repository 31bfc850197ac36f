//! Single-process relay servers that broadcast every inbound message to
//! every current peer, the sender included.
//!
//! See `README.md` for usage. Two transport variants share one core; each
//! module focuses on a concrete responsibility:
//!
//! - [`cli`] parses the command-line interface for the relay and client
//!   modes of both transports.
//! - [`roster`] is the membership set: insertion-ordered, unique by key.
//! - [`multiplex`] waits on the whole membership at once and reports the
//!   ready subset, level-triggered.
//! - [`broadcast`] classifies read outcomes and fans a payload out to
//!   every member, best effort, without blocking.
//! - [`tcp`] runs the stream relay: one task owning the listener and all
//!   peer connections.
//! - [`udp`] runs the datagram relay: one socket, membership keyed by
//!   source address.
//! - [`client`] is an interactive terminal peer for either variant.
//!
//! Integration tests drive the relays through real sockets; unit tests
//! exercise the membership, readiness, and routing policies directly.

pub mod broadcast;
pub mod cli;
pub mod client;
pub mod multiplex;
pub mod roster;
pub mod tcp;
pub mod udp;
