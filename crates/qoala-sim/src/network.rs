// =============================================================================
// Qoala Node Runtime - Network Wiring
// =============================================================================
// Table of Contents:
//   1. Network - Shared EntDist + NetworkSchedule + node name table
//   2. SimNodeEnvironment - A Node's NodeEnvironment against this Network
// =============================================================================
// Purpose: Grounded in original_source/qoala/runtime/environment.py's
//          `NetworkInfo`, which is the single place the original holds
//          "node name -> node id" plus the handles every node needs to
//          reach the rest of the network. We narrow that to exactly what
//          `qoala_runtime::scheduler::NodeEnvironment` requires: the shared
//          `EntDist`, peer name resolution, and classical-channel wiring via
//          `ClassicalHub`.
// =============================================================================

use crate::hub::ClassicalHub;
use qoala_device::qdevice::QDevice;
use qoala_entdist::entdist::EntDist;
use qoala_entdist::link::LinkSampler;
use qoala_entdist::netschedule::NetworkSchedule;
use qoala_runtime::scheduler::NodeEnvironment;
use qoala_runtime::socket::CSocket;
use std::collections::HashMap;
use std::sync::Arc;

// =============================================================================
// 1. Network - Shared EntDist + NetworkSchedule + node name table
// =============================================================================

pub struct Network {
    entdist: Arc<EntDist>,
    names: HashMap<String, u32>,
    hub: Arc<ClassicalHub>,
}

impl Network {
    pub fn new(schedule: NetworkSchedule, sampler: LinkSampler) -> Self {
        Self {
            entdist: Arc::new(EntDist::new(schedule, sampler)),
            names: HashMap::new(),
            hub: Arc::new(ClassicalHub::new()),
        }
    }

    /// A network with no timeslot restrictions and a perfect link, the
    /// configuration most integration tests want when they are exercising
    /// something other than netschedule arbitration.
    pub fn unrestricted() -> Self {
        Self::new(NetworkSchedule::unrestricted(), LinkSampler::perfect())
    }

    pub fn register_node_name(&mut self, name: &str, node_id: u32) {
        self.names.insert(name.to_string(), node_id);
    }

    pub fn entdist(&self) -> Arc<EntDist> {
        self.entdist.clone()
    }

    /// Builds the `NodeEnvironment` a `Node` with id `node_id` wires its
    /// `Scheduler` against. Call after every peer's name is registered.
    pub fn environment_for(&self, node_id: u32, device: Arc<dyn QDevice>, peer_latency_ns: u64) -> Arc<SimNodeEnvironment> {
        Arc::new(SimNodeEnvironment {
            node_id,
            names: self.names.clone(),
            entdist: self.entdist.clone(),
            hub: self.hub.clone(),
            device,
            peer_latency_ns,
        })
    }
}

// =============================================================================
// 2. SimNodeEnvironment - A Node's NodeEnvironment against this Network
// =============================================================================

pub struct SimNodeEnvironment {
    node_id: u32,
    names: HashMap<String, u32>,
    entdist: Arc<EntDist>,
    hub: Arc<ClassicalHub>,
    device: Arc<dyn QDevice>,
    peer_latency_ns: u64,
}

impl NodeEnvironment for SimNodeEnvironment {
    fn node_id(&self) -> u32 {
        self.node_id
    }

    fn resolve_peer(&self, peer_name: &str) -> Option<u32> {
        self.names.get(peer_name).copied()
    }

    fn connect_csocket(&self, peer_name: &str) -> Option<CSocket> {
        let peer_id = self.resolve_peer(peer_name)?;
        Some(self.hub.connect(self.node_id, peer_id, self.peer_latency_ns))
    }

    fn entdist(&self) -> Arc<EntDist> {
        self.entdist.clone()
    }

    fn device(&self) -> Arc<dyn QDevice> {
        self.device.clone()
    }
}
