// =============================================================================
// Qoala Node Runtime - Precedence Signal Bus
// =============================================================================
// Table of Contents:
//   1. TaskKey - (pid, task_id) identity of a scheduled task
//   2. DriverBus - Shared precedence-signal map
// =============================================================================
// Purpose: §9's design notes replace the source's cyclic
//          `cpu_driver.set_other_driver(qpu_driver)` wiring with a single
//          shared value both drivers hold a reference to. A `DriverBus` is
//          that value: a map from `(pid, task_id)` to a `Notify`, fired once
//          the task finishes so any task waiting on it as a precedence edge
//          wakes up. Multiple waiters on the same key are all woken
//          (`Notify` is multi-waiter safe via `notify_waiters`).
// =============================================================================

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// A one-shot event: `fire` is safe to call before or after any number of
/// `wait` calls, and every waiter observes the fire regardless of arrival
/// order, unlike a bare `Notify` permit (which only covers one late
/// waiter).
#[derive(Debug, Default)]
struct OnceSignal {
    done: AtomicBool,
    notify: Notify,
}

impl OnceSignal {
    fn fire(&self) {
        self.done.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    async fn wait(&self) {
        if self.done.load(Ordering::SeqCst) {
            return;
        }
        loop {
            let notified = self.notify.notified();
            if self.done.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
            if self.done.load(Ordering::SeqCst) {
                return;
            }
        }
    }
}

// =============================================================================
// 1. TaskKey - (pid, task_id) identity of a scheduled task
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey {
    pub pid: u64,
    pub task_id: u64,
}

impl TaskKey {
    pub fn new(pid: u64, task_id: u64) -> Self {
        Self { pid, task_id }
    }
}

// =============================================================================
// 2. DriverBus - Shared precedence-signal map
// =============================================================================

/// Cloning a `DriverBus` shares the same underlying signal map; the CPU and
/// QPU drivers each hold a clone instead of a reference to one another.
#[derive(Debug, Clone, Default)]
pub struct DriverBus {
    signals: Arc<Mutex<HashMap<TaskKey, Arc<OnceSignal>>>>,
}

impl DriverBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: TaskKey) -> Arc<OnceSignal> {
        let mut signals = self.signals.lock();
        signals.entry(key).or_insert_with(|| Arc::new(OnceSignal::default())).clone()
    }

    /// Mark `key` as done, waking every task currently suspended on it via
    /// `wait_for`. A signal once fired stays fired: a later `wait_for` on a
    /// key whose task already completed returns immediately.
    pub fn signal_done(&self, key: TaskKey) {
        self.entry(key).fire();
    }

    /// Suspend until `key`'s task signals done. Safe to call before or
    /// after `signal_done` fires; keys are not reused across task graphs
    /// because `task_id` is assigned monotonically per installation.
    pub async fn wait_for(&self, key: TaskKey) {
        self.entry(key).wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_signal_wakes_waiter() {
        let bus = DriverBus::new();
        let key = TaskKey::new(1, 0);
        let waiter_bus = bus.clone();

        let waiter = tokio::spawn(async move {
            waiter_bus.wait_for(key).await;
        });

        tokio::task::yield_now().await;
        bus.signal_done(key);
        waiter.await.unwrap();
    }
}
