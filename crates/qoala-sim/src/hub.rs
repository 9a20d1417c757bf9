// =============================================================================
// Qoala Node Runtime - Classical Channel Hub
// =============================================================================
// Table of Contents:
//   1. ClassicalHub - Hands out matching CSocket ends across two nodes
// =============================================================================
// Purpose: A program's `csockets` map names a peer by node name, not by a
//          shared channel object; two nodes independently calling
//          `NodeEnvironment::connect_csocket` for each other need to end up
//          holding the two ends of the *same* `csocket_pair`. The hub is the
//          in-process rendezvous point that makes that work without either
//          node knowing about the other's internals.
// =============================================================================

use parking_lot::Mutex;
use qoala_runtime::socket::{csocket_pair, CSocket};
use std::collections::{HashMap, VecDeque};

pub struct ClassicalHub {
    /// Keyed by (from, to): an end waiting for `to` to call back with
    /// `connect(to, from)`.
    waiting: Mutex<HashMap<(u32, u32), VecDeque<CSocket>>>,
}

impl ClassicalHub {
    pub fn new() -> Self {
        Self { waiting: Mutex::new(HashMap::new()) }
    }

    /// Returns `from`'s end of a fresh point-to-point channel to `to`. The
    /// first caller of a given (from, to)/(to, from) pair mints the pair and
    /// parks the other end; the second caller claims it.
    pub fn connect(&self, from: u32, to: u32, peer_latency_ns: u64) -> CSocket {
        let mut waiting = self.waiting.lock();
        if let Some(queue) = waiting.get_mut(&(to, from)) {
            if let Some(sock) = queue.pop_front() {
                return sock;
            }
        }
        let (mine, theirs) = csocket_pair(peer_latency_ns);
        waiting.entry((from, to)).or_default().push_back(theirs);
        mine
    }
}

impl Default for ClassicalHub {
    fn default() -> Self {
        Self::new()
    }
}
