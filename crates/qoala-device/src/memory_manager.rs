// =============================================================================
// Qoala Node Runtime - Virtual Qubit Memory Manager
// =============================================================================
// Table of Contents:
//   1. ProcessMemory - Per-process registration record
//   2. MemoryManager - Virtual-to-physical qubit map
// =============================================================================
// Purpose: Owns the partial function (pid, virt_id) -> phys_id described in
//          §4.1, enforcing that no physical slot backs two (pid, virt_id)
//          pairs at once, and wakes waiters suspended on a freed qubit.
//
//          Layering note: §4.1 lists `add_process`/`get_process` as
//          MemoryManager operations next to a full `IqoalaProcess`, but that
//          type is owned one layer up by `qoala-runtime` (which already
//          depends on this crate). The manager therefore registers a
//          `ProcessMemory` record — just the per-process unit module plus
//          its virt->phys map — and `qoala-runtime::Scheduler` is the one
//          that calls `add_process` when a process is created.
// =============================================================================

use crate::ehi::{Ehi, UnitModule};
use crate::error::MemoryError;
use crate::qdevice::QDevice;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;

// =============================================================================
// 1. ProcessMemory - Per-process registration record
// =============================================================================

#[derive(Debug, Default)]
struct ProcessMemory {
    unit_module: UnitModule,
    virt_to_phys: HashMap<u32, u32>,
}

// =============================================================================
// 2. MemoryManager - Virtual-to-physical qubit map
// =============================================================================

pub struct MemoryManager {
    device: Arc<dyn QDevice>,
    ehi: Ehi,
    processes: Mutex<HashMap<u64, ProcessMemory>>,
    /// Occupied physical slots, mirrored here so `allocate` can pick the
    /// lowest free id without locking the device for every candidate.
    phys_in_use: Mutex<HashMap<u32, (u64, u32)>>,
    freed_signal: Notify,
}

impl MemoryManager {
    pub fn new(device: Arc<dyn QDevice>, ehi: Ehi) -> Self {
        Self {
            device,
            ehi,
            processes: Mutex::new(HashMap::new()),
            phys_in_use: Mutex::new(HashMap::new()),
            freed_signal: Notify::new(),
        }
    }

    pub fn get_ehi(&self) -> &Ehi {
        &self.ehi
    }

    pub fn add_process(&self, pid: u64, unit_module: UnitModule) {
        self.processes.lock().insert(
            pid,
            ProcessMemory {
                unit_module,
                virt_to_phys: HashMap::new(),
            },
        );
    }

    pub fn has_process(&self, pid: u64) -> bool {
        self.processes.lock().contains_key(&pid)
    }

    pub fn remove_process(&self, pid: u64) {
        let mut processes = self.processes.lock();
        if let Some(proc_mem) = processes.remove(&pid) {
            let mut phys_in_use = self.phys_in_use.lock();
            for phys_id in proc_mem.virt_to_phys.values() {
                phys_in_use.remove(phys_id);
                let _ = self.device.free_slot(*phys_id);
            }
        }
        self.freed_signal.notify_waiters();
    }

    pub fn phys_id_for(&self, pid: u64, virt_id: u32) -> Option<u32> {
        self.processes
            .lock()
            .get(&pid)
            .and_then(|p| p.virt_to_phys.get(&virt_id))
            .copied()
    }

    /// Chooses the lowest-numbered free physical slot whose capability
    /// satisfies `virt_id`'s declared role in the process's unit module.
    pub fn allocate(&self, pid: u64, virt_id: u32) -> Result<u32, MemoryError> {
        let mut processes = self.processes.lock();
        let proc_mem = processes
            .get_mut(&pid)
            .ok_or(MemoryError::UnknownProcess(pid))?;

        if let Some(phys_id) = proc_mem.virt_to_phys.get(&virt_id) {
            return Ok(*phys_id);
        }

        let required = proc_mem.unit_module.required_capability(virt_id);
        let candidates = self.ehi.qubits_with_capability(required);

        let mut phys_in_use = self.phys_in_use.lock();
        let chosen = candidates
            .into_iter()
            .find(|phys_id| !phys_in_use.contains_key(phys_id))
            .ok_or(MemoryError::OutOfQubits)?;

        self.device.allocate_slot(chosen)?;
        phys_in_use.insert(chosen, (pid, virt_id));
        proc_mem.virt_to_phys.insert(virt_id, chosen);
        Ok(chosen)
    }

    /// Idempotent: freeing an unmapped pair is a no-op success. Wakes every
    /// task suspended in `wait_freed`; waiters re-check their own condition,
    /// so coalescing one wake across several frees is legal.
    pub fn free(&self, pid: u64, virt_id: u32) -> Result<(), MemoryError> {
        let mut processes = self.processes.lock();
        let proc_mem = processes
            .get_mut(&pid)
            .ok_or(MemoryError::UnknownProcess(pid))?;

        if let Some(phys_id) = proc_mem.virt_to_phys.remove(&virt_id) {
            self.phys_in_use.lock().remove(&phys_id);
            self.device.free_slot(phys_id)?;
        }
        drop(processes);
        self.freed_signal.notify_waiters();
        Ok(())
    }

    /// Suspends until some `free` call has happened after this call was
    /// made. Callers loop: check `phys_id_for`, then `wait_freed` if still
    /// unsatisfied.
    pub async fn wait_freed(&self) {
        self.freed_signal.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qdevice::{InMemoryQDevice, QubitCapability};
    use crate::ehi::QubitInfo;

    fn test_ehi() -> Ehi {
        Ehi::new()
            .with_qubit(QubitInfo {
                phys_id: 0,
                capability: QubitCapability::Communication,
                single_gate_duration_ns: 1,
                two_qubit_gate_duration_ns: 2,
            })
            .with_qubit(QubitInfo {
                phys_id: 1,
                capability: QubitCapability::MemoryOnly,
                single_gate_duration_ns: 1,
                two_qubit_gate_duration_ns: 2,
            })
    }

    #[test]
    fn test_allocate_picks_lowest_free_slot_with_capability() {
        let device = Arc::new(InMemoryQDevice::new(1, 1));
        let mm = MemoryManager::new(device, test_ehi());
        mm.add_process(1, UnitModule::new().declare(0, QubitCapability::MemoryOnly));
        let phys = mm.allocate(1, 0).unwrap();
        assert_eq!(phys, 1);
    }

    #[test]
    fn test_allocate_fails_when_out_of_qubits() {
        let device = Arc::new(InMemoryQDevice::new(1, 0));
        let mm = MemoryManager::new(device, Ehi::new().with_qubit(QubitInfo {
            phys_id: 0,
            capability: QubitCapability::Communication,
            single_gate_duration_ns: 1,
            two_qubit_gate_duration_ns: 2,
        }));
        mm.add_process(1, UnitModule::new().declare(0, QubitCapability::Communication));
        mm.add_process(2, UnitModule::new().declare(0, QubitCapability::Communication));
        mm.allocate(1, 0).unwrap();
        assert_eq!(mm.allocate(2, 0), Err(MemoryError::OutOfQubits));
    }

    #[test]
    fn test_no_two_processes_share_a_physical_slot() {
        let device = Arc::new(InMemoryQDevice::new(2, 0));
        let ehi = Ehi::new()
            .with_qubit(QubitInfo {
                phys_id: 0,
                capability: QubitCapability::Communication,
                single_gate_duration_ns: 1,
                two_qubit_gate_duration_ns: 2,
            })
            .with_qubit(QubitInfo {
                phys_id: 1,
                capability: QubitCapability::Communication,
                single_gate_duration_ns: 1,
                two_qubit_gate_duration_ns: 2,
            });
        let mm = MemoryManager::new(device, ehi);
        mm.add_process(1, UnitModule::new().declare(0, QubitCapability::Communication));
        mm.add_process(2, UnitModule::new().declare(0, QubitCapability::Communication));
        let phys1 = mm.allocate(1, 0).unwrap();
        let phys2 = mm.allocate(2, 0).unwrap();
        assert_ne!(phys1, phys2);
    }

    #[test]
    fn test_free_is_idempotent() {
        let device = Arc::new(InMemoryQDevice::new(1, 1));
        let mm = MemoryManager::new(device, test_ehi());
        mm.add_process(1, UnitModule::new());
        assert!(mm.free(1, 5).is_ok());
        assert!(mm.free(1, 5).is_ok());
    }
}
