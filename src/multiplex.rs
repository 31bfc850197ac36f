//! Readiness multiplexing over the membership set.
//!
//! The relay loop needs one wait that covers every current member and
//! resolves with the subset that has data, without servicing any of them
//! yet. [`readable_members`] provides that wait; the enclosing `select!`
//! in the server loop merges it with the listener and the shutdown source
//! to form the full readiness set.

use std::future::poll_fn;
use std::io;
use std::task::{Context, Poll};

use crate::roster::Roster;

/// A source the multiplexer can watch for read readiness.
///
/// The stream relay implements this for its members over tokio's readiness
/// API; tests substitute scripted sources so the wait logic runs without a
/// network.
pub trait ReadySource {
    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>>;
}

/// Waits until at least one member is ready to read, then returns every
/// member that is ready, in membership order.
///
/// The watched set is whatever `members` holds at the time of the call; the
/// run loop constructs this future anew on every iteration, so membership
/// changes are always reflected in the next wait. Readiness is level
/// semantics: a member stays ready until a read observes `WouldBlock`, so
/// reporting a member in one batch and reading it on a later iteration
/// cannot lose a wake-up.
///
/// An empty roster never resolves; the caller's other `select!` branches
/// still fire.
pub async fn readable_members<K, V>(members: &Roster<K, V>) -> Vec<K>
where
    K: Copy,
    V: ReadySource,
{
    poll_fn(|cx| {
        let mut ready = Vec::new();
        for (key, source) in members.iter() {
            // Err readiness still needs servicing; the read that follows
            // surfaces the actual error to the lifecycle policy.
            if source.poll_ready(cx).is_ready() {
                ready.push(*key);
            }
        }
        if ready.is_empty() {
            Poll::Pending
        } else {
            Poll::Ready(ready)
        }
    })
    .await
}
