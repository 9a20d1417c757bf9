// =============================================================================
// Qoala Node Runtime - Netstack Processor
// =============================================================================
// Table of Contents:
//   1. NetstackProcessor - Executes a request routine against EntDist
// =============================================================================
// Purpose: §4.5's Netstack: for each requested pair, allocates the virtual
//          qubit the request names, submits an `EntDistRequest`, and on
//          success realizes CREATE_KEEP/MEASURE_DIRECTLY/REMOTE_STATE_PREP
//          semantics, then runs the routine's callback either after each
//          pair (`Sequential`) or once after all pairs (`WaitAll`). A
//          timeout or a schedule miss frees whatever was allocated for that
//          pair and aborts the remaining pairs.
// =============================================================================

use crate::error::RuntimeError;
use crate::process::{IqoalaProcess, PendingRrCall};
use crate::qnos::QnosProcessor;
use crate::template;
use qoala_device::memory_manager::MemoryManager;
use qoala_device::qdevice::QDevice;
use qoala_device::shared_mem::MemAddr;
use qoala_entdist::entdist::EntDist;
use qoala_entdist::error::EntDistError;
use qoala_entdist::request::EntDistRequest;
use qoala_lang::program::{CallbackType, RequestType};
use tracing::warn;

/// Outcome words written for a pair that failed with `Timeout` or `NoMatch`,
/// kept distinct so a caller branching on the returned values (and a test
/// asserting on them) can tell the two failure modes apart. Neither
/// condition terminates the process; the request result region records the
/// failure per-pair instead.
const TIMEOUT_OUTCOME: i64 = -1;
const NO_MATCH_OUTCOME: i64 = -2;

#[derive(Default)]
pub struct NetstackProcessor {
    qnos: QnosProcessor,
}

impl NetstackProcessor {
    pub fn new() -> Self {
        Self { qnos: QnosProcessor::new() }
    }

    pub async fn assign_request_routine(
        &self,
        process: &IqoalaProcess,
        memory: &MemoryManager,
        device: &dyn QDevice,
        entdist: &EntDist,
        local_node_id: u32,
        pending: PendingRrCall,
    ) -> Result<(), RuntimeError> {
        let pid = process.pid();
        let routine = process
            .prog_instance
            .program
            .request_routine(&pending.request_name)
            .ok_or_else(|| RuntimeError::UnknownRequest(pending.request_name.clone()))?;
        let req = &routine.request;

        let remote_node_id = template::resolve_u32(&req.remote_id, &process.prog_instance.inputs)?;
        let num_pairs = template::resolve_u32(&req.num_pairs, &process.prog_instance.inputs)?;

        let mut outcomes = Vec::with_capacity(num_pairs as usize);

        for i in 0..num_pairs {
            let virt_id = req.virt_ids.virt_id_for(i as usize);
            let phys_id = memory.allocate(pid, virt_id)?;

            let entdist_req = EntDistRequest {
                local_node_id,
                remote_node_id,
                local_qubit_id: phys_id,
                pid,
            };

            let outcome = match entdist.submit(entdist_req, req.timeout).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    let _ = memory.free(pid, virt_id);
                    warn!(pid, request = %pending.request_name, pair = i, "entanglement request failed: {err}");
                    outcomes.push(match err {
                        EntDistError::Timeout => TIMEOUT_OUTCOME,
                        EntDistError::NoMatch => NO_MATCH_OUTCOME,
                    });
                    break;
                }
            };

            match req.typ {
                RequestType::CreateKeep => outcomes.push(0),
                RequestType::MeasureDirectly => {
                    let m = device.measure(phys_id)?;
                    outcomes.push(m as i64);
                    memory.free(pid, virt_id)?;
                }
                RequestType::RemoteStatePrep => {
                    outcomes.push(outcome.correlated_outcome as i64);
                    memory.free(pid, virt_id)?;
                }
            }

            if routine.callback_type == CallbackType::Sequential {
                self.run_callback_if_any(
                    process,
                    memory,
                    device,
                    &routine.callback_routine,
                    pending.callback_in_addr,
                    pending.callback_out_addr,
                )?;
            }
        }

        if routine.callback_type == CallbackType::WaitAll {
            self.run_callback_if_any(
                process,
                memory,
                device,
                &routine.callback_routine,
                pending.callback_in_addr,
                pending.callback_out_addr,
            )?;
        }

        {
            let mut mem = process.prog_memory.lock();
            if !outcomes.is_empty() {
                mem.shared_mem.write_request_out(pending.result_addr, &outcomes, 0)?;
            }
        }
        Ok(())
    }

    /// A callback routine runs on this node with no further network hop: it
    /// is itself a local routine, so it is dispatched through the same
    /// `QnosProcessor` replay path a QL block's `lrcall` uses, reading its
    /// callback-in region and writing real outcomes into callback-out.
    fn run_callback_if_any(
        &self,
        process: &IqoalaProcess,
        memory: &MemoryManager,
        device: &dyn QDevice,
        callback_routine: &Option<String>,
        callback_in_addr: MemAddr,
        callback_out_addr: MemAddr,
    ) -> Result<(), RuntimeError> {
        let Some(name) = callback_routine else { return Ok(()) };
        if process.prog_instance.program.local_routine(name).is_none() {
            return Err(RuntimeError::UnknownRoutine(name.clone()));
        }

        let _ = process.prog_memory.lock().shared_mem.read_callback_in(callback_in_addr, 0, 0);
        let outcomes = self.qnos.run_routine_by_name(process, memory, device, name)?;

        // Host allocates both callback regions with a fixed capacity of 4
        // words (see `run_request_routine`); truncate rather than overrun it.
        let mut mem = process.prog_memory.lock();
        let capacity = outcomes.len().min(4);
        mem.shared_mem.write_callback_out(callback_out_addr, &outcomes[..capacity], 0)?;
        Ok(())
    }
}
