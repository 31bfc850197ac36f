//! Stream variant of the relay: accept TCP peers, relay every payload to
//! the whole membership, sender included.

use std::{
    future::Future,
    io,
    net::SocketAddr,
    task::{Context, Poll},
};

use anyhow::Result;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
};
use tracing::{debug, info, trace, warn};

use crate::{
    broadcast::{self, FanoutTarget, MAX_MESSAGE_LEN, ReadOutcome, classify_read},
    multiplex::{self, ReadySource},
    roster::Roster,
};

/// Identifies a stream peer for the lifetime of its connection.
pub type PeerId = u64;

/// A connected stream peer: its address for the logs, its socket for I/O.
#[derive(Debug)]
pub struct Member {
    addr: SocketAddr,
    stream: TcpStream,
}

impl ReadySource for Member {
    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.stream.poll_read_ready(cx)
    }
}

impl FanoutTarget for Member {
    fn try_send(&self, payload: &[u8]) -> io::Result<usize> {
        self.stream.try_write(payload)
    }

    fn label(&self) -> String {
        self.addr.to_string()
    }
}

/// Single-task TCP relay.
///
/// One loop owns the listener and the whole membership; no peer gets its
/// own task. Each iteration waits for the next readiness event and services
/// it inline, so membership changes never race with fan-out.
pub struct TcpRelay {
    listener: TcpListener,
    members: Roster<PeerId, Member>,
    next_id: PeerId,
}

impl TcpRelay {
    pub fn new(listener: TcpListener) -> Self {
        Self {
            listener,
            members: Roster::new(),
            next_id: 1,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the relay until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let TcpRelay {
            listener,
            mut members,
            mut next_id,
        } = self;
        tokio::pin!(shutdown);

        loop {
            select! {
                // Biased polling keeps the servicing order fixed: shutdown,
                // then the listener, then peer traffic.
                biased;

                _ = &mut shutdown => {
                    info!("stream relay shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    handle_accept(accept_result, &mut members, &mut next_id);
                }
                ready = multiplex::readable_members(&members) => {
                    for id in ready {
                        service_member(id, &mut members);
                    }
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

/// Admits one connection. Accept failures cost this attempt and nothing
/// else; the relay keeps serving whoever is already in.
fn handle_accept(
    result: io::Result<(TcpStream, SocketAddr)>,
    members: &mut Roster<PeerId, Member>,
    next_id: &mut PeerId,
) {
    match result {
        Ok((stream, addr)) => {
            let id = *next_id;
            *next_id += 1;
            if members.insert(id, Member { addr, stream }) {
                info!(peer = %addr, id, members = members.len(), "peer connected");
            } else {
                warn!(id, "duplicate peer id on accept; keeping the existing entry");
            }
        }
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

/// Reads once from a ready member and applies the outcome: payloads are
/// relayed to every member including the reader, end of stream and read
/// errors retire the member, spurious readiness is ignored.
fn service_member(id: PeerId, members: &mut Roster<PeerId, Member>) {
    let Some(member) = members.get(&id) else {
        return;
    };

    let mut buffer = [0u8; MAX_MESSAGE_LEN];
    match classify_read(member.stream.try_read(&mut buffer)) {
        ReadOutcome::Payload(len) => {
            let report = broadcast::fan_out(members.iter().map(|(_, m)| m), &buffer[..len]);
            debug!(from = %member.addr, bytes = len, ?report, "relayed payload");
        }
        ReadOutcome::Eof => {
            info!(peer = %member.addr, "peer closed the connection");
            members.remove(&id);
        }
        ReadOutcome::NotReady => {
            trace!(peer = %member.addr, "readiness without data");
        }
        ReadOutcome::Failed(error) => {
            warn!(peer = %member.addr, error = %error, "peer read failed");
            members.remove(&id);
        }
    }
}
