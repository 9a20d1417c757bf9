// =============================================================================
// Qoala Node Runtime - Typed Ports
// =============================================================================
// Table of Contents:
//   1. Port<T> - Typed async channel endpoint
//   2. PortError - Failure modes for port operations
// =============================================================================
// Purpose: Every cross-task communication path in a node (classical sockets,
//          the Qnos/Netstack assignment channels, the EntDist wire, the
//          memory-freed signal) is a `Port<T>`: a `tokio::mpsc` pair wrapped
//          so that a blocking receive can carry a `Deadline` and complete
//          with `PortError::Timeout` against the simulated clock instead of
//          the wall clock.
// =============================================================================

use crate::clock::{Deadline, SimClock};
use tokio::sync::mpsc;

// =============================================================================
// 1. Port<T> - Typed async channel endpoint
// =============================================================================

/// The sending half of a typed port. Sends are never blocking: a full
/// mailbox still enqueues because every port is built with enough capacity
/// for the traffic it is declared to carry (see `Port::pair`).
#[derive(Debug, Clone)]
pub struct PortSender<T> {
    inner: mpsc::Sender<T>,
}

/// The receiving half of a typed port.
#[derive(Debug)]
pub struct PortReceiver<T> {
    inner: mpsc::Receiver<T>,
}

impl<T> PortSender<T> {
    pub fn send(&self, value: T) -> Result<(), PortError> {
        self.inner.try_send(value).map_err(|_| PortError::Closed)
    }
}

impl<T> PortReceiver<T> {
    /// Suspend until a value arrives, with no deadline.
    pub async fn recv(&mut self) -> Result<T, PortError> {
        self.inner.recv().await.ok_or(PortError::Closed)
    }

    /// Suspend until a value arrives or `deadline` passes, whichever is
    /// first. This is the primitive behind every "receive with timeout" in
    /// §5: csocket receive, the Qnos/Netstack assignment wait, and the
    /// EntDist "pair ready" wait.
    pub async fn recv_before(&mut self, deadline: Deadline) -> Result<T, PortError> {
        tokio::select! {
            biased;
            value = self.inner.recv() => value.ok_or(PortError::Closed),
            _ = SimClock::wait(deadline.remaining_ns()) => Err(PortError::Timeout),
        }
    }

    pub fn try_recv(&mut self) -> Result<T, PortError> {
        self.inner.try_recv().map_err(|e| match e {
            mpsc::error::TryRecvError::Empty => PortError::Empty,
            mpsc::error::TryRecvError::Disconnected => PortError::Closed,
        })
    }
}

/// Builds a connected sender/receiver pair with room for `capacity`
/// in-flight messages (ample for the bursty, bounded traffic a single
/// simulated node produces).
pub fn port_pair<T>(capacity: usize) -> (PortSender<T>, PortReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (PortSender { inner: tx }, PortReceiver { inner: rx })
}

// =============================================================================
// 2. PortError - Failure modes for port operations
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("receive deadline elapsed before a message arrived")]
    Timeout,
    #[error("port closed: peer dropped its endpoint")]
    Closed,
    #[error("no message currently queued")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_send_recv() {
        let (tx, mut rx) = port_pair::<u32>(4);
        tx.send(7).unwrap();
        assert_eq!(rx.recv().await.unwrap(), 7);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_recv_before_times_out() {
        let (_tx, mut rx) = port_pair::<u32>(4);
        let deadline = Deadline::after(100);
        let result = rx.recv_before(deadline).await;
        assert_eq!(result, Err(PortError::Timeout));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_recv_before_gets_value_before_deadline() {
        let (tx, mut rx) = port_pair::<u32>(4);
        tx.send(42).unwrap();
        let deadline = Deadline::after(1_000);
        assert_eq!(rx.recv_before(deadline).await, Ok(42));
    }
}
