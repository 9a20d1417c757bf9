// =============================================================================
// Qoala Node Runtime - Entanglement Distributor
// =============================================================================
// Table of Contents:
//   1. EntDistOutcome - What a successful pairing hands back to the caller
//   2. PendingRequest - A queued EntDistRequest plus its resolution channel
//   3. EntDist - Pairs concurrent requests under the netschedule
// =============================================================================
// Purpose: Global to the network. Receives `EntDistRequest`s from every
//          node's Netstack, pairs matching concurrent requests under the
//          netschedule, and drives each side's `QDevice` to realize the
//          Bell pair. The `EntDistMessage` wire shape in `request.rs` is the
//          *external* protocol (§6); in-process, a Netstack talks to this
//          `EntDist` directly through `submit`, matching how Scheduler and
//          Host talk to each other in-process within one node (no simulated
//          network hop below the EntDist boundary).
// =============================================================================

use crate::error::EntDistError;
use crate::link::LinkSampler;
use crate::netschedule::NetworkSchedule;
use crate::request::{EntDistRequest, PairKey};
use parking_lot::Mutex;
use qoala_device::qdevice::QDevice;
use qoala_kernel::clock::SimClock;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

// =============================================================================
// 1. EntDistOutcome - What a successful pairing hands back to the caller
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntDistOutcome {
    /// The classical bit this node's half of the pair will measure to.
    pub correlated_outcome: u8,
}

// =============================================================================
// 2. PendingRequest - A queued EntDistRequest plus its resolution channel
// =============================================================================

struct PendingRequest {
    request: EntDistRequest,
    deadline_ns: u64,
    resolve: oneshot::Sender<Result<EntDistOutcome, EntDistError>>,
    /// Set by `try_pair` the moment it finds a counterpart naming this entry
    /// as remote but the netschedule won't authorize their window. Recorded
    /// on the entry itself rather than inferred from the counterpart's
    /// continued presence in the queue, since whichever side's timeout fires
    /// first removes its own entry before the other side gets to look.
    blocked_by_schedule: bool,
}

impl PendingRequest {
    fn expired(&self, now_ns: u64) -> bool {
        now_ns >= self.deadline_ns
    }
}

// =============================================================================
// 3. EntDist - Pairs concurrent requests under the netschedule
// =============================================================================

pub struct EntDist {
    devices: Mutex<HashMap<u32, Arc<dyn QDevice>>>,
    queues: Mutex<HashMap<PairKey, Vec<PendingRequest>>>,
    netschedule: NetworkSchedule,
    sampler: LinkSampler,
    rng: Mutex<StdRng>,
}

impl EntDist {
    pub fn new(netschedule: NetworkSchedule, sampler: LinkSampler) -> Self {
        Self {
            devices: Mutex::new(HashMap::new()),
            queues: Mutex::new(HashMap::new()),
            netschedule,
            sampler,
            rng: Mutex::new(StdRng::seed_from_u64(0)),
        }
    }

    /// Registers the `QDevice` EntDist should drive when delivering a pair
    /// to `node_id`.
    pub fn register_node(&self, node_id: u32, device: Arc<dyn QDevice>) {
        self.devices.lock().insert(node_id, device);
    }

    /// Submits a request and suspends until EntDist pairs it, fails it with
    /// `NoMatch` (timeslot window closed without a peer), or its own
    /// `timeout_ns` elapses (`EntDistError::Timeout`) — whichever comes
    /// first. Matches §4.5 step 1's "send it to the EntDist... suspend
    /// until EntDist delivers 'pair ready' or a timeout expires."
    pub async fn submit(&self, req: EntDistRequest, timeout_ns: u64) -> Result<EntDistOutcome, EntDistError> {
        let now = SimClock::now_ns();
        let (tx, rx) = oneshot::channel();
        let key = PairKey::for_nodes(req.local_node_id, req.remote_node_id);

        {
            let mut queues = self.queues.lock();
            queues.entry(key).or_default().push(PendingRequest {
                request: req,
                deadline_ns: now + timeout_ns,
                resolve: tx,
                blocked_by_schedule: false,
            });
        }
        self.try_pair(key);

        tokio::select! {
            biased;
            result = rx => result.unwrap_or(Err(EntDistError::NoMatch)),
            _ = SimClock::wait(timeout_ns) => {
                let err = self.classify_unmatched(key, &req);
                self.drop_if_pending(key, req);
                Err(err)
            }
        }
    }

    fn drop_if_pending(&self, key: PairKey, req: EntDistRequest) {
        let mut queues = self.queues.lock();
        if let Some(list) = queues.get_mut(&key) {
            list.retain(|p| p.request != req);
        }
    }

    /// Distinguishes why `req`'s own deadline elapsed without delivery:
    /// `try_pair` marks this entry `blocked_by_schedule` the moment it finds
    /// a counterpart naming it as remote whose window the netschedule never
    /// authorizes — that's `NoMatch`, per §4.6 step 4. Otherwise, nothing
    /// ever matched it — `Timeout`.
    fn classify_unmatched(&self, key: PairKey, req: &EntDistRequest) -> EntDistError {
        let queues = self.queues.lock();
        match queues.get(&key).and_then(|list| list.iter().find(|p| p.request == *req)) {
            Some(entry) if entry.blocked_by_schedule => EntDistError::NoMatch,
            _ => EntDistError::Timeout,
        }
    }

    /// Drops entries whose own timeout has elapsed and attempts to pair
    /// everything that remains. `submit` already races its own timeout, so
    /// this exists for lazily sweeping entries whose owning task was
    /// cancelled before its deadline — "EntDist drops expired entries
    /// lazily when it next inspects the queue" (§5).
    pub fn tick(&self) {
        let now = SimClock::now_ns();
        let keys: Vec<PairKey> = self.queues.lock().keys().copied().collect();
        for key in keys {
            {
                let mut queues = self.queues.lock();
                if let Some(list) = queues.get_mut(&key) {
                    list.retain(|p| !p.expired(now));
                }
            }
            self.try_pair(key);
        }
    }

    /// Attempts to pair the oldest mutually-matching pair of requests under
    /// `key`, first purging anything already expired so a stale entry is
    /// never matched. Ordering: pairings are made in the order the later of
    /// the two matching messages arrived, which falls out of always
    /// scanning from the front of the queue.
    fn try_pair(&self, key: PairKey) {
        let now = SimClock::now_ns();
        let (req_a, resolve_a, req_b, resolve_b) = {
            let mut queues = self.queues.lock();
            let Some(list) = queues.get_mut(&key) else { return };
            list.retain(|p| !p.expired(now));

            let mut found = None;
            'outer: for i in 0..list.len() {
                for j in 0..list.len() {
                    if i == j {
                        continue;
                    }
                    let a = list[i].request;
                    let b = list[j].request;
                    if !a.names_as_remote(&b) {
                        continue;
                    }
                    if self.netschedule.authorizes_at(now, a.local_node_id, a.pid, b.local_node_id, b.pid) {
                        found = Some((i, j));
                        break 'outer;
                    }
                    list[i].blocked_by_schedule = true;
                    list[j].blocked_by_schedule = true;
                }
            }

            let Some((i, j)) = found else { return };
            let (lo, hi) = if i < j { (i, j) } else { (j, i) };
            let hi_entry = list.remove(hi);
            let lo_entry = list.remove(lo);
            (lo_entry.request, lo_entry.resolve, hi_entry.request, hi_entry.resolve)
        };

        self.deliver_pair(req_a, resolve_a, req_b, resolve_b);
    }

    fn deliver_pair(
        &self,
        req_a: EntDistRequest,
        resolve_a: oneshot::Sender<Result<EntDistOutcome, EntDistError>>,
        req_b: EntDistRequest,
        resolve_b: oneshot::Sender<Result<EntDistOutcome, EntDistError>>,
    ) {
        let outcome = self.sampler.sample(&mut self.rng.lock());

        if !outcome.success {
            debug!("link sampler reported failure; dropping pairing attempt");
            let _ = resolve_a.send(Err(EntDistError::NoMatch));
            let _ = resolve_b.send(Err(EntDistError::NoMatch));
            return;
        }

        let devices = self.devices.lock();
        for req in [req_a, req_b] {
            if let Some(device) = devices.get(&req.local_node_id) {
                let _ = device.receive_entangled_qubit(req.local_qubit_id, outcome.correlated_outcome);
            }
        }
        drop(devices);

        info!(
            node_a = req_a.local_node_id,
            node_b = req_b.local_node_id,
            pid_a = req_a.pid,
            pid_b = req_b.pid,
            "delivering entangled pair"
        );
        let _ = resolve_a.send(Ok(EntDistOutcome {
            correlated_outcome: outcome.correlated_outcome,
        }));
        let _ = resolve_b.send(Ok(EntDistOutcome {
            correlated_outcome: outcome.correlated_outcome,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qoala_device::qdevice::InMemoryQDevice;

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_matching_requests_pair_and_deliver() {
        let entdist = Arc::new(EntDist::new(NetworkSchedule::unrestricted(), LinkSampler::perfect()));
        let alice_dev: Arc<dyn QDevice> = Arc::new(InMemoryQDevice::new(1, 0));
        let bob_dev: Arc<dyn QDevice> = Arc::new(InMemoryQDevice::new(1, 0));
        alice_dev.allocate_slot(0).unwrap();
        bob_dev.allocate_slot(0).unwrap();
        entdist.register_node(0, alice_dev.clone());
        entdist.register_node(1, bob_dev.clone());

        let alice_req = EntDistRequest {
            local_node_id: 0,
            remote_node_id: 1,
            local_qubit_id: 0,
            pid: 10,
        };
        let bob_req = EntDistRequest {
            local_node_id: 1,
            remote_node_id: 0,
            local_qubit_id: 0,
            pid: 20,
        };

        let e1 = entdist.clone();
        let e2 = entdist.clone();
        let alice_task = tokio::spawn(async move { e1.submit(alice_req, 1000).await });
        let bob_task = tokio::spawn(async move { e2.submit(bob_req, 1000).await });

        let (alice_result, bob_result) = tokio::join!(alice_task, bob_task);
        alice_result.unwrap().unwrap();
        bob_result.unwrap().unwrap();
        assert_eq!(alice_dev.measure(0).unwrap(), bob_dev.measure(0).unwrap());
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_unmatched_request_times_out() {
        let entdist = EntDist::new(NetworkSchedule::unrestricted(), LinkSampler::perfect());
        let alice_dev: Arc<dyn QDevice> = Arc::new(InMemoryQDevice::new(1, 0));
        alice_dev.allocate_slot(0).unwrap();
        entdist.register_node(0, alice_dev);

        let alice_req = EntDistRequest {
            local_node_id: 0,
            remote_node_id: 1,
            local_qubit_id: 0,
            pid: 1,
        };

        let result = entdist.submit(alice_req, 500).await;
        assert_eq!(result, Err(EntDistError::Timeout));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_netschedule_mismatch_yields_no_match() {
        let schedule = NetworkSchedule::new(
            vec![crate::netschedule::Timeslot {
                node_a: 0,
                pid_a: 0,
                node_b: 1,
                pid_b: 0,
                start_ns: 0,
                length_ns: 1_000_000,
            }],
            2_000_000,
        );
        let entdist = Arc::new(EntDist::new(schedule, LinkSampler::perfect()));
        let alice_dev: Arc<dyn QDevice> = Arc::new(InMemoryQDevice::new(1, 0));
        let bob_dev: Arc<dyn QDevice> = Arc::new(InMemoryQDevice::new(1, 0));
        alice_dev.allocate_slot(0).unwrap();
        bob_dev.allocate_slot(0).unwrap();
        entdist.register_node(0, alice_dev);
        entdist.register_node(1, bob_dev);

        // pid=1 on both sides is never authorized by the schedule above, so
        // the pair is never made, but each side does see the other's
        // request sitting in the queue — a schedule mismatch, not a
        // genuine absence of a peer.
        let alice_req = EntDistRequest {
            local_node_id: 0,
            remote_node_id: 1,
            local_qubit_id: 0,
            pid: 1,
        };
        let bob_req = EntDistRequest {
            local_node_id: 1,
            remote_node_id: 0,
            local_qubit_id: 0,
            pid: 1,
        };

        let e1 = entdist.clone();
        let e2 = entdist.clone();
        let alice_task = tokio::spawn(async move { e1.submit(alice_req, 100).await });
        let bob_task = tokio::spawn(async move { e2.submit(bob_req, 100).await });

        assert_eq!(alice_task.await.unwrap(), Err(EntDistError::NoMatch));
        assert_eq!(bob_task.await.unwrap(), Err(EntDistError::NoMatch));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_tick_sweeps_expired_entries() {
        let entdist = EntDist::new(NetworkSchedule::unrestricted(), LinkSampler::perfect());
        let req = EntDistRequest {
            local_node_id: 0,
            remote_node_id: 1,
            local_qubit_id: 0,
            pid: 1,
        };
        let key = PairKey::for_nodes(0, 1);
        {
            let (tx, _rx) = oneshot::channel();
            entdist.queues.lock().entry(key).or_default().push(PendingRequest {
                request: req,
                deadline_ns: 0,
                resolve: tx,
                blocked_by_schedule: false,
            });
        }
        SimClock::wait(1).await;
        entdist.tick();
        assert!(entdist.queues.lock().get(&key).unwrap().is_empty());
    }
}
