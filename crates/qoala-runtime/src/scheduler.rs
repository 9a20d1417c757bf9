// =============================================================================
// Qoala Node Runtime - Per-Node Scheduler
// =============================================================================
// Table of Contents:
//   1. NodeEnvironment - Node/network wiring a Scheduler depends on
//   2. BatchInfo / BatchHandle / BatchResult - Batch submission types
//   3. SchedulerBuilder - Resolves the §9 ObjectBuilder open question
//   4. Scheduler - Installs and drives a node's processes
// =============================================================================
// Purpose: §4.7's Scheduler pipeline: submit_batch, initialize_processes,
//          get_tasks_to_schedule, upload_task_graph, get_batch_results. The
//          spec names those five but not the step that actually drives
//          execution once a graph is installed; we add `run_installed` for
//          that (documented in DESIGN.md), spawning one CPU driver and one
//          QPU driver per process and letting them run to completion
//          concurrently.
// =============================================================================

use crate::driver::{CpuDriver, QpuDriver};
use crate::error::RuntimeError;
use crate::process::{EprSocketInfo, IqoalaProcess, ProcessResult, ProgramInstance};
use crate::socket::CSocket;
use crate::task::TaskGraph;
use crate::template::InputValue;
use parking_lot::Mutex;
use qoala_device::ehi::UnitModule;
use qoala_device::memory_manager::MemoryManager;
use qoala_device::qdevice::QDevice;
use qoala_entdist::entdist::EntDist;
use qoala_kernel::driverbus::DriverBus;
use qoala_lang::program::Program;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

// =============================================================================
// 1. NodeEnvironment - Node/network wiring a Scheduler depends on
// =============================================================================

/// The Scheduler's view onto everything outside its own node: peer name
/// resolution, classical-channel connection, and the shared EntDist/QDevice
/// this node was built with. `qoala-sim` supplies the concrete
/// implementation that wires several nodes together.
pub trait NodeEnvironment: Send + Sync {
    fn node_id(&self) -> u32;

    /// `None` if `peer_name` names no node this environment knows about.
    fn resolve_peer(&self, peer_name: &str) -> Option<u32>;

    /// `None` if `peer_name` names no node this environment knows about.
    fn connect_csocket(&self, peer_name: &str) -> Option<CSocket>;

    fn entdist(&self) -> Arc<EntDist>;

    fn device(&self) -> Arc<dyn QDevice>;

    /// Fidelity to record for an EPR socket when the program does not
    /// otherwise pin one via a per-request template.
    fn default_fidelity(&self) -> f64 {
        1.0
    }
}

// =============================================================================
// 2. BatchInfo / BatchHandle / BatchResult - Batch submission types
// =============================================================================

/// What `submit_batch` needs: a compiled program, how many process instances
/// to run, and each instance's concrete input bindings.
pub struct BatchInfo {
    pub program: Arc<Program>,
    pub num_iterations: usize,
    pub inputs: Vec<HashMap<String, InputValue>>,
}

#[derive(Debug, Clone)]
pub struct BatchHandle {
    pub pids: Vec<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub results: Vec<ProcessResult>,
}

// =============================================================================
// 3. SchedulerBuilder - Resolves the §9 ObjectBuilder open question
// =============================================================================

/// §9 notes the source has two co-existing object-construction shapes and
/// asks an implementation to pick one. We pick the shape that accepts a
/// network-info descriptor (here, a `NodeEnvironment`) plus a per-program
/// unit-module factory, since a `UnitModule` depends on which virtual qubits
/// a *specific* program declares and can't be fixed at builder-construction
/// time the way the environment and memory manager can.
pub struct SchedulerBuilder {
    node_id: u32,
    env: Option<Arc<dyn NodeEnvironment>>,
    memory: Option<Arc<MemoryManager>>,
    unit_module_factory: Option<Arc<dyn Fn(&Program) -> UnitModule + Send + Sync>>,
}

impl SchedulerBuilder {
    pub fn new(node_id: u32) -> Self {
        Self {
            node_id,
            env: None,
            memory: None,
            unit_module_factory: None,
        }
    }

    pub fn with_environment(mut self, env: Arc<dyn NodeEnvironment>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn with_memory_manager(mut self, memory: Arc<MemoryManager>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_unit_module_factory(mut self, factory: impl Fn(&Program) -> UnitModule + Send + Sync + 'static) -> Self {
        self.unit_module_factory = Some(Arc::new(factory));
        self
    }

    pub fn build(self) -> Scheduler {
        let env = self.env.expect("SchedulerBuilder requires with_environment");
        let memory = self.memory.expect("SchedulerBuilder requires with_memory_manager");
        Scheduler {
            node_id: self.node_id,
            env,
            memory,
            unit_module_factory: self.unit_module_factory,
            bus: DriverBus::new(),
            next_pid: AtomicU64::new(1),
            next_task_id: Mutex::new(0),
            processes: Mutex::new(HashMap::new()),
        }
    }
}

// =============================================================================
// 4. Scheduler - Installs and drives a node's processes
// =============================================================================

pub struct Scheduler {
    node_id: u32,
    env: Arc<dyn NodeEnvironment>,
    memory: Arc<MemoryManager>,
    unit_module_factory: Option<Arc<dyn Fn(&Program) -> UnitModule + Send + Sync>>,
    bus: DriverBus,
    next_pid: AtomicU64,
    next_task_id: Mutex<u64>,
    processes: Mutex<HashMap<u64, Arc<IqoalaProcess>>>,
}

impl Scheduler {
    /// Registers one `IqoalaProcess` per requested iteration, wiring its
    /// csockets and EPR sockets against the node environment.
    pub fn submit_batch(&self, info: BatchInfo) -> BatchHandle {
        let mut pids = Vec::with_capacity(info.num_iterations);
        for i in 0..info.num_iterations {
            let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
            let inputs = info.inputs.get(i).cloned().unwrap_or_default();
            let unit_module = self
                .unit_module_factory
                .as_ref()
                .map(|f| f(&info.program))
                .unwrap_or_default();
            self.memory.add_process(pid, unit_module.clone());
            // Pre-allocate every declared virtual qubit. Request-routine
            // ids get re-requested (harmlessly — `allocate` is idempotent
            // once a mapping exists) inside Netstack's per-pair loop;
            // local-routine-only ids have no other allocation path at all,
            // since Qnos only resolves an existing mapping, it never
            // allocates one.
            for virt_id in unit_module.declared_virt_ids() {
                if let Err(e) = self.memory.allocate(pid, virt_id) {
                    warn!(pid, virt_id, "failed to pre-allocate declared virtual qubit: {e}");
                }
            }

            let mut csockets = HashMap::new();
            for (id, peer) in &info.program.csockets {
                match self.env.connect_csocket(peer) {
                    Some(socket) => {
                        csockets.insert(*id, tokio::sync::Mutex::new(socket));
                    }
                    None => warn!(pid, peer, "no such peer; csocket {} left unconnected", id),
                }
            }

            let mut epr_sockets = HashMap::new();
            for (id, peer) in &info.program.epr_sockets {
                match self.env.resolve_peer(peer) {
                    Some(remote_node_id) => {
                        epr_sockets.insert(
                            *id,
                            EprSocketInfo {
                                remote_node_id,
                                fidelity: self.env.default_fidelity(),
                            },
                        );
                    }
                    None => warn!(pid, peer, "no such peer; epr socket {} left unresolved", id),
                }
            }

            let prog_instance = ProgramInstance {
                pid,
                program: info.program.clone(),
                inputs,
                unit_module,
                resolved_sizes: Mutex::new(HashMap::new()),
                task_graph: Mutex::new(TaskGraph::new()),
            };
            let process = Arc::new(IqoalaProcess::new(prog_instance, csockets, epr_sockets));
            self.processes.lock().insert(pid, process);
            pids.push(pid);
        }
        BatchHandle { pids }
    }

    /// Resolves every placeholder local-routine return-var size against
    /// each process's inputs, caching the result for the whole run.
    pub fn initialize_processes(&self, batch: &BatchHandle) -> Result<(), RuntimeError> {
        use qoala_lang::value::Template;

        let processes = self.processes.lock();
        for pid in &batch.pids {
            let process = processes.get(pid).ok_or_else(|| RuntimeError::Fatal(format!("unknown pid {pid}")))?;
            let mut resolved = HashMap::new();
            for routine in process.prog_instance.program.local_routines.values() {
                for rv in &routine.return_vars {
                    if let Some(Template::Placeholder(name)) = &rv.size {
                        let size = crate::template::resolve_u32(&Template::Placeholder(name.clone()), &process.prog_instance.inputs)?;
                        resolved.insert(name.clone(), size);
                    }
                }
            }
            *process.prog_instance.resolved_sizes.lock() = resolved;
        }
        Ok(())
    }

    /// Builds the task graph for every process in the batch, sharing one
    /// monotonic task-id counter across the whole node.
    pub fn get_tasks_to_schedule(&self, batch: &BatchHandle) -> TaskGraph {
        let mut next_id = self.next_task_id.lock();
        let processes = self.processes.lock();
        let graphs: Vec<TaskGraph> = batch
            .pids
            .iter()
            .filter_map(|pid| processes.get(pid))
            .map(|p| TaskGraph::for_program(p.pid(), &p.prog_instance.program, &mut next_id))
            .collect();
        TaskGraph::merge(graphs)
    }

    /// Installs the merged graph into every process named in the batch; a
    /// process's own query methods filter the shared graph by its pid.
    pub fn upload_task_graph(&self, batch: &BatchHandle, graph: TaskGraph) {
        let processes = self.processes.lock();
        for pid in &batch.pids {
            if let Some(process) = processes.get(pid) {
                *process.prog_instance.task_graph.lock() = graph.clone();
            }
        }
    }

    /// Drives every process in the batch to completion: a CPU driver and a
    /// QPU driver run concurrently per process, synchronized through the
    /// shared `DriverBus`. Not named in §4.7's pipeline list, but something
    /// has to turn an installed graph into execution; see DESIGN.md.
    pub async fn run_installed(&self, batch: &BatchHandle) {
        let processes: Vec<Arc<IqoalaProcess>> = {
            let guard = self.processes.lock();
            batch.pids.iter().filter_map(|pid| guard.get(pid).cloned()).collect()
        };

        let qpu_driver = Arc::new(QpuDriver::new(
            self.bus.clone(),
            self.memory.clone(),
            self.env.device(),
            self.env.entdist(),
            self.node_id,
        ));
        let cpu_driver = Arc::new(CpuDriver::new(self.bus.clone()));

        let mut handles = Vec::with_capacity(processes.len());
        for process in processes {
            let qpu_driver = qpu_driver.clone();
            let cpu_driver = cpu_driver.clone();
            handles.push(tokio::spawn(async move {
                let graph = process.prog_instance.task_graph.lock().clone();

                let qpu_graph = graph.clone();
                let qpu_process = process.clone();
                let qpu_driver_inner = qpu_driver.clone();
                let qpu_handle = tokio::spawn(async move { qpu_driver_inner.run(&qpu_process, &qpu_graph).await });

                let cpu_result = cpu_driver.run(&process, &graph).await;
                // Any companion task the CPU driver never reached (a branch
                // skipped its block) would otherwise hang forever waiting on
                // a handoff signal; every reachable companion has already
                // completed in lockstep with the CPU driver by this point.
                qpu_handle.abort();

                match cpu_result {
                    Ok(()) => process.mark_finished(),
                    Err(e) => process.mark_failed(e.to_string()),
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }

    pub fn get_batch_results(&self, batch: &BatchHandle) -> BatchResult {
        let processes = self.processes.lock();
        let results = batch
            .pids
            .iter()
            .filter_map(|pid| processes.get(pid))
            .map(|p| p.result.lock().clone())
            .collect();
        BatchResult { results }
    }
}
