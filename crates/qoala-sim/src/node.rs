// =============================================================================
// Qoala Node Runtime - Node
// =============================================================================
// Table of Contents:
//   1. default_unit_module - Best-effort UnitModule derived from a Program
//   2. Node - One network participant bundling device + memory + scheduler
// =============================================================================
// Purpose: Grounded in original_source/qoala/runtime/environment.py's
//          `LocalEnvironment`/`Node` split: a node owns its own hardware
//          (`QDevice`, `MemoryManager`) and registers with the shared
//          `EntDist`; everything it needs to reach other nodes comes through
//          the `Network` it was built against.
// =============================================================================

use qoala_device::ehi::{Ehi, UnitModule};
use qoala_device::qdevice::{QDevice, QubitCapability};
use qoala_lang::program::{Program, VirtIdMapping};
use qoala_lang::value::Template;
use qoala_runtime::error::RuntimeError;
use qoala_runtime::process::ProcessResult;
use qoala_runtime::scheduler::{BatchHandle, BatchInfo, BatchResult, Scheduler, SchedulerBuilder};
use qoala_runtime::task::TaskGraph;
use qoala_runtime::template::InputValue;
use std::collections::HashMap;
use std::sync::Arc;

use crate::network::Network;

// =============================================================================
// 1. default_unit_module - Best-effort UnitModule derived from a Program
// =============================================================================

/// Declares every virtual qubit a program's local routines touch as
/// `MemoryOnly` and every virtual qubit its request routines touch as
/// `Communication` (the capability `MemoryManager::allocate` needs to place
/// it on a comm-capable slot). Only literal `num_pairs` templates are
/// expanded; a placeholder `num_pairs` falls back to declaring just the
/// mapping's base id, matching the same "resolve what we can" approach
/// `Scheduler::initialize_processes` takes for return-var sizes.
pub fn default_unit_module(program: &Program) -> UnitModule {
    let mut um = UnitModule::new();

    for routine in program.local_routines.values() {
        for &virt_id in &routine.qubit_use.used {
            um = um.declare(virt_id, QubitCapability::MemoryOnly);
        }
    }

    for routine in program.request_routines.values() {
        let req = &routine.request;
        let n = match req.num_pairs {
            Template::Literal(n) => n,
            Template::Placeholder(_) => 1,
        };
        match &req.virt_ids {
            VirtIdMapping::All(k) => um = um.declare(*k, QubitCapability::Communication),
            VirtIdMapping::Increment(k) => {
                for i in 0..n {
                    um = um.declare(k + i, QubitCapability::Communication);
                }
            }
            VirtIdMapping::Custom(ids) => {
                for &virt_id in ids {
                    um = um.declare(virt_id, QubitCapability::Communication);
                }
            }
        }
    }

    um
}

// =============================================================================
// 2. Node - One network participant bundling device + memory + scheduler
// =============================================================================

pub struct Node {
    pub node_id: u32,
    pub device: Arc<dyn QDevice>,
    pub memory: Arc<qoala_device::memory_manager::MemoryManager>,
    scheduler: Scheduler,
}

impl Node {
    pub fn new(node_id: u32, device: Arc<dyn QDevice>, ehi: Ehi, network: &Network, peer_latency_ns: u64) -> Self {
        let memory = Arc::new(qoala_device::memory_manager::MemoryManager::new(device.clone(), ehi));
        network.entdist().register_node(node_id, device.clone());
        let env = network.environment_for(node_id, device.clone(), peer_latency_ns);
        let scheduler = SchedulerBuilder::new(node_id)
            .with_environment(env)
            .with_memory_manager(memory.clone())
            .with_unit_module_factory(default_unit_module)
            .build();
        Self { node_id, device, memory, scheduler }
    }

    pub fn submit_batch(&self, info: BatchInfo) -> BatchHandle {
        self.scheduler.submit_batch(info)
    }

    pub fn initialize_processes(&self, batch: &BatchHandle) -> Result<(), RuntimeError> {
        self.scheduler.initialize_processes(batch)
    }

    pub fn get_tasks_to_schedule(&self, batch: &BatchHandle) -> TaskGraph {
        self.scheduler.get_tasks_to_schedule(batch)
    }

    pub fn upload_task_graph(&self, batch: &BatchHandle, graph: TaskGraph) {
        self.scheduler.upload_task_graph(batch, graph)
    }

    pub async fn run_installed(&self, batch: &BatchHandle) {
        self.scheduler.run_installed(batch).await
    }

    pub fn get_batch_results(&self, batch: &BatchHandle) -> BatchResult {
        self.scheduler.get_batch_results(batch)
    }

    /// Runs the full submit/initialize/schedule/install/run pipeline for a
    /// single process in one call; the six-scenario integration tests have
    /// no use for multi-iteration batches or for driving the pipeline's
    /// stages independently.
    pub async fn run_once(&self, program: Arc<Program>, inputs: HashMap<String, InputValue>) -> (u64, ProcessResult) {
        let batch = self.submit_batch(BatchInfo { program, num_iterations: 1, inputs: vec![inputs] });
        self.initialize_processes(&batch)
            .expect("process initialization should not fail for a well-formed program");
        let graph = self.get_tasks_to_schedule(&batch);
        self.upload_task_graph(&batch, graph);
        self.run_installed(&batch).await;
        let pid = batch.pids[0];
        let result = self.get_batch_results(&batch).results.into_iter().next().unwrap_or_default();
        (pid, result)
    }
}
