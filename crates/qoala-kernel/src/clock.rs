// =============================================================================
// Qoala Node Runtime - Simulated Clock
// =============================================================================
// Table of Contents:
//   1. SimClock - Simulated-time suspension primitive
//   2. Deadline - Absolute-time helper for receive-with-timeout
// =============================================================================
// Purpose: Every cooperative task (Host/Qnos/Netstack processors, CPU/QPU
//          drivers, EntDist) suspends against the same simulated clock, never
//          the wall clock. We ride `tokio::time` with the clock paused: a
//          paused Tokio clock auto-advances to the next pending timer once no
//          task is runnable, which is exactly the discrete-event semantics
//          this runtime needs, without hand-rolling an event heap.
// =============================================================================

use std::sync::OnceLock;
use std::time::Duration;
use tokio::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

// =============================================================================
// 1. SimClock - Simulated-time suspension primitive
// =============================================================================

/// A zero-sized handle onto the process-wide simulated clock.
///
/// Must be used from within a `tokio` runtime that has called
/// `tokio::time::pause()` (current-thread flavor; see `qoala_sim::run`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SimClock;

impl SimClock {
    /// Nanoseconds elapsed since the first call to any `SimClock` method in
    /// this process. That first call fixes the epoch.
    pub fn now_ns() -> u64 {
        let epoch = *EPOCH.get_or_init(Instant::now);
        Instant::now().saturating_duration_since(epoch).as_nanos() as u64
    }

    /// Suspend the calling task for `delta_ns` of simulated time.
    pub async fn wait(delta_ns: u64) {
        if delta_ns == 0 {
            tokio::task::yield_now().await;
            return;
        }
        tokio::time::sleep(Duration::from_nanos(delta_ns)).await;
    }

    /// Suspend until simulated time reaches `target_ns`. Returns immediately
    /// if that time has already passed.
    pub async fn wait_until(target_ns: u64) {
        let now = Self::now_ns();
        if target_ns > now {
            Self::wait(target_ns - now).await;
        } else {
            tokio::task::yield_now().await;
        }
    }
}

// =============================================================================
// 2. Deadline - Absolute-time helper for receive-with-timeout
// =============================================================================

/// An absolute simulated-time deadline, used by blocking receives that may
/// time out (csocket receive, EntDist pair-ready wait).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(pub u64);

impl Deadline {
    pub fn after(delta_ns: u64) -> Self {
        Self(SimClock::now_ns() + delta_ns)
    }

    pub fn remaining_ns(&self) -> u64 {
        self.0.saturating_sub(SimClock::now_ns())
    }

    pub fn has_passed(&self) -> bool {
        SimClock::now_ns() >= self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_wait_advances_clock() {
        let before = SimClock::now_ns();
        SimClock::wait(1_000).await;
        let after = SimClock::now_ns();
        assert_eq!(after - before, 1_000);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_deadline_remaining() {
        let deadline = Deadline::after(500);
        assert!(!deadline.has_passed());
        SimClock::wait(500).await;
        assert!(deadline.has_passed());
        assert_eq!(deadline.remaining_ns(), 0);
    }
}
