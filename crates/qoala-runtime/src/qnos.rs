// =============================================================================
// Qoala Node Runtime - Qnos Processor
// =============================================================================
// Table of Contents:
//   1. QnosProcessor - Executes a local routine's NetQASM subroutine
// =============================================================================
// Purpose: §4.4's Qnos: replays a `LocalRoutine`'s NetQASM instructions
//          against the node's `QDevice`, resolving each routine-local
//          virtual qubit id to the physical slot the scheduler already
//          allocated via `MemoryManager`. Qubits are never allocated or
//          freed here — that happens around request-routine execution in
//          Netstack, or is assumed pre-staged for a purely local routine.
// =============================================================================

use crate::error::RuntimeError;
use crate::process::{IqoalaProcess, PendingLrCall};
use qoala_device::memory_manager::MemoryManager;
use qoala_device::qdevice::QDevice;
use qoala_lang::netqasm::NetQasmInstr;
use std::collections::HashMap;

#[derive(Default)]
pub struct QnosProcessor;

impl QnosProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn assign_local_routine(
        &self,
        process: &IqoalaProcess,
        memory: &MemoryManager,
        device: &dyn QDevice,
        pending: PendingLrCall,
    ) -> Result<(), RuntimeError> {
        let outcomes = self.run_routine_by_name(process, memory, device, &pending.routine_name)?;
        let mut mem = process.prog_memory.lock();
        mem.shared_mem.write_local_routine_out(pending.result_addr, &outcomes, 0)?;
        Ok(())
    }

    /// Replays `routine_name`'s NetQASM subroutine against `device`, resolving
    /// each virtual qubit it touches through `memory`, and returns the raw
    /// measurement-outcome word sequence. Shared by `assign_local_routine`
    /// (a QL block's `lrcall`) and a request routine's SEQUENTIAL/WAIT_ALL
    /// callback, which is itself just a local routine run on this node.
    pub fn run_routine_by_name(
        &self,
        process: &IqoalaProcess,
        memory: &MemoryManager,
        device: &dyn QDevice,
        routine_name: &str,
    ) -> Result<Vec<i64>, RuntimeError> {
        let pid = process.pid();
        let routine = process
            .prog_instance
            .program
            .local_routine(routine_name)
            .ok_or_else(|| RuntimeError::UnknownRoutine(routine_name.to_string()))?;

        let mut phys_of: HashMap<u32, u32> = HashMap::new();
        for virt in routine.subroutine.iter().flat_map(|i| i.qubits_touched()) {
            let phys = memory
                .phys_id_for(pid, virt)
                .ok_or_else(|| RuntimeError::Fatal(format!("virtual qubit {virt} not allocated for pid {pid}")))?;
            phys_of.insert(virt, phys);
        }

        let result_len = {
            let resolved = process.prog_instance.resolved_sizes.lock();
            routine.result_word_len(&resolved).max(1)
        };
        let mut outcomes = vec![0i64; result_len];

        for instr in &routine.subroutine {
            match instr {
                NetQasmInstr::InitQubit { .. } => {
                    // Allocation already brought the slot to |0>; nothing
                    // further to do against this QDevice model.
                }
                NetQasmInstr::ApplyGate { gate, qubit, angle_steps } => {
                    device.apply_gate(phys_of[qubit], *gate, *angle_steps)?;
                }
                NetQasmInstr::CtrlGate { gate, control, target } => {
                    device.apply_ctrl_gate(phys_of[control], phys_of[target], *gate)?;
                }
                NetQasmInstr::Measure { qubit, into_var } => {
                    let outcome = device.measure(phys_of[qubit])?;
                    if let Some(slot) = outcomes.get_mut(*into_var) {
                        *slot = outcome as i64;
                    }
                }
            }
        }

        Ok(outcomes)
    }
}
