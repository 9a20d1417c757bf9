// =============================================================================
// Qoala Node Runtime - Classical Sockets
// =============================================================================
// Table of Contents:
//   1. CSocket - Timestamped classical channel endpoint
//   2. csocket_pair - Wires two CSockets together
// =============================================================================
// Purpose: §4.3's "classical socket (csocket): point-to-point channel to one
//          named peer... send is non-blocking; receive suspends until a
//          message is available or a deadline passes." We stamp every send
//          with the simulated time it left the sender and let the receiver
//          add the configured peer latency on arrival, so `recv_before`'s
//          deadline still races against the *true* completion time rather
//          than an already-elapsed one.
// =============================================================================

use crate::error::RuntimeError;
use qoala_kernel::clock::{Deadline, SimClock};
use qoala_kernel::port::{port_pair, PortReceiver, PortSender};
use qoala_lang::value::Value;

// =============================================================================
// 1. CSocket - Timestamped classical channel endpoint
// =============================================================================

struct TimestampedMessage {
    value: Value,
    sent_at_ns: u64,
}

/// One end of a point-to-point classical channel to a single named peer.
/// Construct a connected pair with `csocket_pair`.
pub struct CSocket {
    tx: PortSender<TimestampedMessage>,
    rx: PortReceiver<TimestampedMessage>,
    peer_latency_ns: u64,
}

impl CSocket {
    fn new(tx: PortSender<TimestampedMessage>, rx: PortReceiver<TimestampedMessage>, peer_latency_ns: u64) -> Self {
        Self { tx, rx, peer_latency_ns }
    }

    /// Non-blocking; timestamps the payload with the send time so the
    /// receiver can account for peer latency.
    pub fn send(&self, value: Value) -> Result<(), RuntimeError> {
        self.tx
            .send(TimestampedMessage {
                value,
                sent_at_ns: SimClock::now_ns(),
            })
            .map_err(|_| RuntimeError::Fatal("csocket peer disconnected".into()))
    }

    /// Suspends until a message arrives, then waits out whatever peer
    /// latency remains before handing it back.
    pub async fn recv(&mut self) -> Result<Value, RuntimeError> {
        let msg = self
            .rx
            .recv()
            .await
            .map_err(|_| RuntimeError::Fatal("csocket peer disconnected".into()))?;
        self.settle(msg).await
    }

    /// As `recv`, but fails with `RuntimeError::Timeout` if `deadline`
    /// passes first.
    pub async fn recv_before(&mut self, deadline: Deadline) -> Result<Value, RuntimeError> {
        let msg = self.rx.recv_before(deadline).await.map_err(|e| match e {
            qoala_kernel::port::PortError::Timeout => RuntimeError::Timeout,
            _ => RuntimeError::Fatal("csocket peer disconnected".into()),
        })?;
        self.settle(msg).await
    }

    async fn settle(&self, msg: TimestampedMessage) -> Result<Value, RuntimeError> {
        SimClock::wait_until(msg.sent_at_ns + self.peer_latency_ns).await;
        Ok(msg.value)
    }
}

// =============================================================================
// 2. csocket_pair - Wires two CSockets together
// =============================================================================

/// Builds two `CSocket`s, each the other's peer, with `peer_latency_ns`
/// applied to every message crossing either direction.
pub fn csocket_pair(peer_latency_ns: u64) -> (CSocket, CSocket) {
    let (tx_ab, rx_ab) = port_pair(32);
    let (tx_ba, rx_ba) = port_pair(32);
    (
        CSocket::new(tx_ab, rx_ba, peer_latency_ns),
        CSocket::new(tx_ba, rx_ab, peer_latency_ns),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_send_recv_applies_peer_latency() {
        let (a, mut b) = csocket_pair(100);
        let before = SimClock::now_ns();
        a.send(Value::Int(42)).unwrap();
        let value = b.recv().await.unwrap();
        assert_eq!(value, Value::Int(42));
        assert_eq!(SimClock::now_ns() - before, 100);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_recv_before_times_out_with_no_sender() {
        let (_a, mut b) = csocket_pair(0);
        let result = b.recv_before(Deadline::after(50)).await;
        assert_eq!(result, Err(RuntimeError::Timeout));
    }
}
