// =============================================================================
// Qoala Node Runtime - CPU / QPU Drivers
// =============================================================================
// Table of Contents:
//   1. CpuDriver - Walks a process's Host task stream
//   2. QpuDriver - Walks a process's Qnos/Netstack task stream
// =============================================================================
// Purpose: §4.6/§4.7's pull-based drivers. Each repeatedly takes the next
//          task for its processor, waits out any pinned start time, waits on
//          any unmet precedence signal, executes, and signals done. The CPU
//          driver also carries control flow: a block's classical branch
//          instructions pick the next block name rather than strictly
//          following install order, so the driver walks by name rather than
//          by index.
// =============================================================================

use crate::error::RuntimeError;
use crate::host::HostProcessor;
use crate::netstack::NetstackProcessor;
use crate::process::{IqoalaProcess, ProcessState};
use crate::qnos::QnosProcessor;
use crate::task::{TaskBody, TaskGraph};
use qoala_device::memory_manager::MemoryManager;
use qoala_device::qdevice::QDevice;
use qoala_entdist::entdist::EntDist;
use qoala_kernel::clock::SimClock;
use qoala_kernel::driverbus::{DriverBus, TaskKey};
use std::sync::Arc;

// =============================================================================
// 1. CpuDriver - Walks a process's Host task stream
// =============================================================================

pub struct CpuDriver {
    bus: DriverBus,
    host: HostProcessor,
}

impl CpuDriver {
    pub fn new(bus: DriverBus) -> Self {
        Self { bus, host: HostProcessor::new() }
    }

    pub async fn run(&self, process: &IqoalaProcess, graph: &TaskGraph) -> Result<(), RuntimeError> {
        let pid = process.pid();
        process.set_state(ProcessState::Running);

        let mut current = process.prog_instance.program.blocks.first().map(|b| b.name.clone());
        while let Some(name) = current {
            let block = process
                .prog_instance
                .program
                .block(&name)
                .ok_or_else(|| RuntimeError::Fatal(format!("unknown block '{name}'")))?;
            let task = graph
                .host_task_for(pid, &name)
                .ok_or_else(|| RuntimeError::Fatal(format!("no host task installed for block '{name}'")))?;

            if let Some(start) = task.start_time_ns {
                SimClock::wait_until(start).await;
            }

            let outcome = self.host.execute_block(process, block, graph, &self.bus).await?;
            self.bus.signal_done(TaskKey::new(pid, task.id));
            current = outcome.next_block;
        }
        Ok(())
    }
}

// =============================================================================
// 2. QpuDriver - Walks a process's Qnos/Netstack task stream
// =============================================================================

pub struct QpuDriver {
    bus: DriverBus,
    qnos: QnosProcessor,
    netstack: NetstackProcessor,
    memory: Arc<MemoryManager>,
    device: Arc<dyn QDevice>,
    entdist: Arc<EntDist>,
    local_node_id: u32,
}

impl QpuDriver {
    pub fn new(
        bus: DriverBus,
        memory: Arc<MemoryManager>,
        device: Arc<dyn QDevice>,
        entdist: Arc<EntDist>,
        local_node_id: u32,
    ) -> Self {
        Self {
            bus,
            qnos: QnosProcessor::new(),
            netstack: NetstackProcessor::new(),
            memory,
            device,
            entdist,
            local_node_id,
        }
    }

    pub async fn run(&self, process: &IqoalaProcess, graph: &TaskGraph) -> Result<(), RuntimeError> {
        let pid = process.pid();
        for task in graph.qpu_schedule(pid) {
            if let Some(start) = task.start_time_ns {
                SimClock::wait_until(start).await;
            }
            let ready_id = task
                .handoff_ready_id
                .ok_or_else(|| RuntimeError::Fatal("qpu task has no handoff id".into()))?;
            self.bus.wait_for(TaskKey::new(pid, ready_id)).await;

            match &task.body {
                TaskBody::QnosLocal { .. } => {
                    let pending = process
                        .pending_lrcall
                        .lock()
                        .take()
                        .ok_or_else(|| RuntimeError::Fatal("qnos task ran with no pending local-routine call".into()))?;
                    self.qnos.assign_local_routine(process, &self.memory, self.device.as_ref(), pending)?;
                }
                TaskBody::NetstackRequest { .. } => {
                    let pending = process
                        .pending_rrcall
                        .lock()
                        .take()
                        .ok_or_else(|| RuntimeError::Fatal("netstack task ran with no pending request call".into()))?;
                    self.netstack
                        .assign_request_routine(process, &self.memory, self.device.as_ref(), &self.entdist, self.local_node_id, pending)
                        .await?;
                }
                TaskBody::Host { .. } => {
                    return Err(RuntimeError::Fatal("qpu schedule unexpectedly contains a host task".into()));
                }
            }

            self.bus.signal_done(TaskKey::new(pid, task.id));
        }
        Ok(())
    }
}
