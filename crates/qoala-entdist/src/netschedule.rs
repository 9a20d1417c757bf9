// =============================================================================
// Qoala Node Runtime - Network Schedule
// =============================================================================
// Table of Contents:
//   1. Timeslot - Authorized (node, pid, node, pid) window
//   2. NetworkSchedule - Repeating timeslot pattern
// =============================================================================
// Purpose: Arbitrates which (node, pid) pair may attempt entanglement in
//          which simulated-time window. EntDist consults this before ever
//          pairing two requests.
// =============================================================================

// =============================================================================
// 1. Timeslot - Authorized (node, pid, node, pid) window
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeslot {
    pub node_a: u32,
    pub pid_a: u64,
    pub node_b: u32,
    pub pid_b: u64,
    pub start_ns: u64,
    pub length_ns: u64,
}

impl Timeslot {
    pub fn end_ns(&self) -> u64 {
        self.start_ns + self.length_ns
    }

    pub fn contains_time(&self, now_ns: u64) -> bool {
        now_ns >= self.start_ns && now_ns < self.end_ns()
    }

    /// True if this slot authorizes exactly the (nodes, pids) pairing,
    /// either orientation.
    pub fn authorizes(&self, node_a: u32, pid_a: u64, node_b: u32, pid_b: u64) -> bool {
        (self.node_a == node_a && self.pid_a == pid_a && self.node_b == node_b && self.pid_b == pid_b)
            || (self.node_a == node_b && self.pid_a == pid_b && self.node_b == node_a && self.pid_b == pid_a)
    }
}

// =============================================================================
// 2. NetworkSchedule - Repeating timeslot pattern
// =============================================================================

/// A fixed list of timeslots, repeating every `period_ns`. An empty pattern
/// (no timeslots) authorizes nothing, which is a legal and useful
/// configuration for single-pair test scenarios that want every instant
/// authorized — use `NetworkSchedule::unrestricted` for that instead.
#[derive(Debug, Clone)]
pub struct NetworkSchedule {
    timeslots: Vec<Timeslot>,
    period_ns: u64,
}

impl NetworkSchedule {
    pub fn new(timeslots: Vec<Timeslot>, period_ns: u64) -> Self {
        Self { timeslots, period_ns }
    }

    /// A schedule with no periodic structure that authorizes every
    /// (node, pid, node, pid) pairing at every instant. Used by tests that
    /// only want to exercise pairing logic, not timeslot arbitration.
    pub fn unrestricted() -> Self {
        Self {
            timeslots: Vec::new(),
            period_ns: 0,
        }
    }

    fn phase(&self, now_ns: u64) -> u64 {
        if self.period_ns == 0 {
            now_ns
        } else {
            now_ns % self.period_ns
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.period_ns == 0 && self.timeslots.is_empty()
    }

    /// Is `(node_a, pid_a, node_b, pid_b)` authorized at `now_ns`?
    pub fn authorizes_at(&self, now_ns: u64, node_a: u32, pid_a: u64, node_b: u32, pid_b: u64) -> bool {
        if self.is_unrestricted() {
            return true;
        }
        let phase = self.phase(now_ns);
        self.timeslots
            .iter()
            .any(|slot| slot.contains_time(phase) && slot.authorizes(node_a, pid_a, node_b, pid_b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeslot_authorizes_either_orientation() {
        let slot = Timeslot {
            node_a: 0,
            pid_a: 1,
            node_b: 1,
            pid_b: 1,
            start_ns: 0,
            length_ns: 100,
        };
        assert!(slot.authorizes(0, 1, 1, 1));
        assert!(slot.authorizes(1, 1, 0, 1));
        assert!(!slot.authorizes(0, 2, 1, 1));
    }

    #[test]
    fn test_unrestricted_authorizes_everything() {
        let schedule = NetworkSchedule::unrestricted();
        assert!(schedule.authorizes_at(12345, 0, 7, 1, 9));
    }

    #[test]
    fn test_schedule_rejects_outside_window() {
        let schedule = NetworkSchedule::new(
            vec![Timeslot {
                node_a: 0,
                pid_a: 0,
                node_b: 1,
                pid_b: 0,
                start_ns: 0,
                length_ns: 50,
            }],
            100,
        );
        assert!(schedule.authorizes_at(10, 0, 0, 1, 0));
        assert!(!schedule.authorizes_at(60, 0, 0, 1, 0));
        // next period's window
        assert!(schedule.authorizes_at(110, 0, 0, 1, 0));
    }

    #[test]
    fn test_schedule_rejects_wrong_pids() {
        let schedule = NetworkSchedule::new(
            vec![Timeslot {
                node_a: 0,
                pid_a: 0,
                node_b: 1,
                pid_b: 0,
                start_ns: 0,
                length_ns: 50,
            }],
            100,
        );
        assert!(!schedule.authorizes_at(10, 0, 1, 1, 1));
    }
}
