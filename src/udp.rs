//! Datagram variant of the relay.
//!
//! One socket carries all traffic, so membership is keyed by source
//! address. A payload-bearing datagram from a new address joins it; an
//! empty datagram from a member is its leave signal.

use std::{future::Future, io, net::SocketAddr};

use anyhow::Result;
use tokio::{net::UdpSocket, select};
use tracing::{debug, info, warn};

use crate::{
    broadcast::{self, FanoutTarget, MAX_MESSAGE_LEN},
    roster::Roster,
};

/// What one received datagram means for membership and routing.
#[derive(Debug, PartialEq, Eq)]
enum DatagramAction {
    /// New sender with payload: admit it, then relay.
    JoinAndRelay,
    /// Known sender with payload: relay.
    Relay,
    /// Known sender, empty payload: retire it, relay nothing.
    Leave,
    /// Empty payload from a sender that was never a member.
    IgnoreEmpty,
}

fn classify_datagram(len: usize, known: bool) -> DatagramAction {
    match (len, known) {
        (0, true) => DatagramAction::Leave,
        (0, false) => DatagramAction::IgnoreEmpty,
        (_, false) => DatagramAction::JoinAndRelay,
        (_, true) => DatagramAction::Relay,
    }
}

/// One delivery attempt against a member address through the shared socket.
struct Dest<'a> {
    socket: &'a UdpSocket,
    addr: SocketAddr,
}

impl FanoutTarget for Dest<'_> {
    fn try_send(&self, payload: &[u8]) -> io::Result<usize> {
        self.socket.try_send_to(payload, self.addr)
    }

    fn label(&self) -> String {
        self.addr.to_string()
    }
}

/// Single-task UDP relay over one bound socket.
pub struct UdpRelay {
    socket: UdpSocket,
    members: Roster<SocketAddr, ()>,
}

impl UdpRelay {
    pub fn new(socket: UdpSocket) -> Self {
        Self {
            socket,
            members: Roster::new(),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Runs the relay until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let UdpRelay {
            socket,
            mut members,
        } = self;
        tokio::pin!(shutdown);
        let mut buffer = [0u8; MAX_MESSAGE_LEN];

        loop {
            select! {
                biased;

                _ = &mut shutdown => {
                    info!("datagram relay shutting down");
                    break;
                }
                received = socket.recv_from(&mut buffer) => {
                    handle_datagram(received, &buffer, &socket, &mut members);
                }
            }
        }

        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

/// Applies one datagram to the membership, then relays if it carried
/// payload. A new sender is admitted before the relay pass so it receives
/// its own first message like everyone else.
fn handle_datagram(
    received: io::Result<(usize, SocketAddr)>,
    buffer: &[u8],
    socket: &UdpSocket,
    members: &mut Roster<SocketAddr, ()>,
) {
    let (len, from) = match received {
        Ok(pair) => pair,
        Err(err) => {
            warn!(error = ?err, "failed to receive datagram");
            return;
        }
    };

    match classify_datagram(len, members.contains(&from)) {
        DatagramAction::JoinAndRelay => {
            members.insert(from, ());
            info!(peer = %from, members = members.len(), "peer joined");
            relay(socket, members, from, &buffer[..len]);
        }
        DatagramAction::Relay => {
            relay(socket, members, from, &buffer[..len]);
        }
        DatagramAction::Leave => {
            members.remove(&from);
            info!(peer = %from, members = members.len(), "peer left");
        }
        DatagramAction::IgnoreEmpty => {
            warn!(peer = %from, "empty datagram from unknown sender");
        }
    }
}

fn relay(socket: &UdpSocket, members: &Roster<SocketAddr, ()>, from: SocketAddr, payload: &[u8]) {
    let targets = members.keys().map(|addr| Dest {
        socket,
        addr: *addr,
    });
    let report = broadcast::fan_out(targets, payload);
    debug!(from = %from, bytes = payload.len(), ?report, "relayed payload");
}
