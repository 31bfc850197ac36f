//! Message routing policy: classify reads, relay to every member.
//!
//! The relay treats payloads as opaque bytes and delivery as best effort.
//! A member that cannot take a message right now simply misses it; only
//! the read side of a connection decides membership.

use std::io;

use tracing::warn;

/// Upper bound on a single relayed message.
///
/// Reads use a buffer of this size; longer stream payloads arrive as
/// multiple messages and are relayed as such.
pub const MAX_MESSAGE_LEN: usize = 1024;

/// What a non-blocking read attempt told us about the peer.
#[derive(Debug)]
pub enum ReadOutcome {
    /// `len` bytes of payload arrived and should be relayed.
    Payload(usize),
    /// Orderly end of stream; the peer left.
    Eof,
    /// Nothing to read after all. Readiness was spurious or the read was
    /// interrupted; the peer stays and the loop moves on.
    NotReady,
    /// The transport failed; the peer is gone.
    Failed(io::Error),
}

/// Maps a raw read result onto the lifecycle policy.
pub fn classify_read(result: io::Result<usize>) -> ReadOutcome {
    match result {
        Ok(0) => ReadOutcome::Eof,
        Ok(len) => ReadOutcome::Payload(len),
        Err(error)
            if error.kind() == io::ErrorKind::WouldBlock
                || error.kind() == io::ErrorKind::Interrupted =>
        {
            ReadOutcome::NotReady
        }
        Err(error) => ReadOutcome::Failed(error),
    }
}

/// A destination a relayed message can be attempted against.
pub trait FanoutTarget {
    /// Attempts a non-blocking send, returning how many bytes went out.
    fn try_send(&self, payload: &[u8]) -> io::Result<usize>;

    /// Identifies the target in log lines.
    fn label(&self) -> String;
}

impl<T: FanoutTarget + ?Sized> FanoutTarget for &T {
    fn try_send(&self, payload: &[u8]) -> io::Result<usize> {
        (**self).try_send(payload)
    }

    fn label(&self) -> String {
        (**self).label()
    }
}

/// Tally of one broadcast pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub attempted: usize,
    pub delivered: usize,
    /// Targets skipped because they could not take data without blocking.
    pub dropped: usize,
    /// Targets whose send failed outright.
    pub failed: usize,
    /// Deliveries that went out short; the remainder was discarded.
    pub truncated: usize,
}

/// Relays `payload` to every target, in order, one attempt each.
///
/// A target that is busy or failing costs exactly one skipped delivery;
/// it is never retried within the pass, nothing is queued for later, and
/// no outcome here removes a member. Send failures are the receive side's
/// concern only when its own reads fail.
pub fn fan_out<T>(targets: impl IntoIterator<Item = T>, payload: &[u8]) -> FanoutReport
where
    T: FanoutTarget,
{
    let mut report = FanoutReport::default();
    for target in targets {
        report.attempted += 1;
        match target.try_send(payload) {
            Ok(sent) if sent == payload.len() => report.delivered += 1,
            Ok(sent) => {
                warn!(
                    peer = %target.label(),
                    sent,
                    expected = payload.len(),
                    "short delivery; dropping the remainder"
                );
                report.delivered += 1;
                report.truncated += 1;
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                warn!(peer = %target.label(), "peer busy; dropping delivery");
                report.dropped += 1;
            }
            Err(error) => {
                warn!(peer = %target.label(), error = %error, "delivery failed");
                report.failed += 1;
            }
        }
    }
    report
}
