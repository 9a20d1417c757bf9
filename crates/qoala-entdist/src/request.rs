// =============================================================================
// Qoala Node Runtime - EntDist Requests & Wire Messages
// =============================================================================
// Table of Contents:
//   1. EntDistRequest - A node's bid to entangle with a peer
//   2. PairKey - Unordered (node, node) pairing key
//   3. EntDistMessage - The EntDist wire protocol
// =============================================================================

use serde::{Deserialize, Serialize};

// =============================================================================
// 1. EntDistRequest - A node's bid to entangle with a peer
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntDistRequest {
    pub local_node_id: u32,
    pub remote_node_id: u32,
    pub local_qubit_id: u32,
    pub pid: u64,
}

impl EntDistRequest {
    /// Two requests are matching iff each names the other as remote.
    /// `pid` is each side's own process id and is not compared directly —
    /// pairing authority comes from the netschedule timeslot, which names
    /// both sides' pids explicitly.
    pub fn names_as_remote(&self, other: &EntDistRequest) -> bool {
        self.remote_node_id == other.local_node_id && other.remote_node_id == self.local_node_id
    }
}

// =============================================================================
// 2. PairKey - Unordered (node, node) pairing key
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey(pub u32, pub u32);

impl PairKey {
    pub fn for_nodes(a: u32, b: u32) -> Self {
        if a <= b {
            PairKey(a, b)
        } else {
            PairKey(b, a)
        }
    }
}

// =============================================================================
// 3. EntDistMessage - The EntDist wire protocol
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntDistPayload {
    /// Empty for CREATE_KEEP-ready.
    None,
    /// A measurement outcome for MEASURE_DIRECTLY/REMOTE_STATE_PREP-ready.
    Outcome(u8),
    /// A reason string for `fail`.
    Reason(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntDistMessage {
    pub kind: EntDistMessageKind,
    pub local_node: u32,
    pub remote_node: u32,
    pub pid: u64,
    pub local_qubit: u32,
    pub payload: EntDistPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntDistMessageKind {
    Request,
    Ready,
    Fail,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_requests() {
        let a = EntDistRequest {
            local_node_id: 0,
            remote_node_id: 1,
            local_qubit_id: 0,
            pid: 5,
        };
        let b = EntDistRequest {
            local_node_id: 1,
            remote_node_id: 0,
            local_qubit_id: 0,
            pid: 5,
        };
        assert!(a.names_as_remote(&b));
    }

    #[test]
    fn test_pair_key_is_order_independent() {
        assert_eq!(PairKey::for_nodes(1, 2), PairKey::for_nodes(2, 1));
    }
}
