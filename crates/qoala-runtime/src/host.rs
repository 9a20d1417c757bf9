// =============================================================================
// Qoala Node Runtime - Host Processor
// =============================================================================
// Table of Contents:
//   1. BlockOutcome - Where control flow goes next
//   2. HostProcessor - Executes one basic block's classical instructions
// =============================================================================
// Purpose: §4.3's Host: runs every `HostOp` in a block in order, resolving
//          operands against the process's classical memory. `run_subroutine`
//          and `run_request` stage their arguments into shared memory, hand
//          off to the paired Qnos/Netstack task via the `DriverBus`, and
//          suspend until that task signals completion — the "blocking
//          receive on the companion task's signal" suspension point from §5.
// =============================================================================

use crate::error::RuntimeError;
use crate::process::{IqoalaProcess, PendingLrCall, PendingRrCall, ProcessState};
use crate::task::TaskGraph;
use qoala_kernel::clock::{Deadline, SimClock};
use qoala_kernel::driverbus::{DriverBus, TaskKey};
use qoala_lang::program::{BasicBlock, HostOp, Program, ReturnVar};
use qoala_lang::value::{Template, Value};
use tracing::warn;

// =============================================================================
// 1. BlockOutcome - Where control flow goes next
// =============================================================================

pub struct BlockOutcome {
    pub next_block: Option<String>,
}

// =============================================================================
// 2. HostProcessor - Executes one basic block's classical instructions
// =============================================================================

#[derive(Default)]
pub struct HostProcessor;

impl HostProcessor {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute_block(
        &self,
        process: &IqoalaProcess,
        block: &BasicBlock,
        graph: &TaskGraph,
        bus: &DriverBus,
    ) -> Result<BlockOutcome, RuntimeError> {
        let pid = process.pid();
        let mut explicit_next: Option<String> = None;

        for op in &block.instructions {
            match op {
                HostOp::AssignConst { dest, value } => process.set_cvar(dest, Value::Int(*value)),
                HostOp::Add { dest, lhs, rhs } => {
                    let l = process.get_cvar(lhs).as_int().unwrap_or(0);
                    let r = process.get_cvar(rhs).as_int().unwrap_or(0);
                    process.set_cvar(dest, Value::Int(l + r));
                }
                HostOp::Multiply { dest, lhs, rhs } => {
                    let l = process.get_cvar(lhs).as_int().unwrap_or(0);
                    let r = process.get_cvar(rhs).as_int().unwrap_or(0);
                    process.set_cvar(dest, Value::Int(l * r));
                }
                HostOp::BitCondMultiply { dest, cond, factor } => {
                    if process.get_cvar(cond).as_int().unwrap_or(0) != 0 {
                        let d = process.get_cvar(dest).as_int().unwrap_or(0);
                        let f = process.get_cvar(factor).as_int().unwrap_or(0);
                        process.set_cvar(dest, Value::Int(d * f));
                    }
                }
                HostOp::BranchEq { lhs, rhs, target } => {
                    if process.get_cvar(lhs) == process.get_cvar(rhs) {
                        explicit_next = Some(target.clone());
                        break;
                    }
                }
                HostOp::BranchNeq { lhs, rhs, target } => {
                    if process.get_cvar(lhs) != process.get_cvar(rhs) {
                        explicit_next = Some(target.clone());
                        break;
                    }
                }
                HostOp::BranchLt { lhs, rhs, target } => {
                    let l = process.get_cvar(lhs).as_int().unwrap_or(0);
                    let r = process.get_cvar(rhs).as_int().unwrap_or(0);
                    if l < r {
                        explicit_next = Some(target.clone());
                        break;
                    }
                }
                HostOp::BranchGt { lhs, rhs, target } => {
                    let l = process.get_cvar(lhs).as_int().unwrap_or(0);
                    let r = process.get_cvar(rhs).as_int().unwrap_or(0);
                    if l > r {
                        explicit_next = Some(target.clone());
                        break;
                    }
                }
                HostOp::Jump { target } => {
                    explicit_next = Some(target.clone());
                    break;
                }
                HostOp::SendCMsg { csocket, value } => {
                    let socket = process.csockets.get(csocket).ok_or(RuntimeError::UnknownPeer(*csocket))?;
                    let val = process.get_cvar(value);
                    socket.lock().await.send(val)?;
                }
                HostOp::ReceiveCMsg { csocket, dest } => {
                    let socket = process.csockets.get(csocket).ok_or(RuntimeError::UnknownPeer(*csocket))?;
                    process.set_state(ProcessState::WaitingRecv);
                    let value = socket.lock().await.recv().await?;
                    process.set_state(ProcessState::Running);
                    process.set_cvar(dest, value);
                }
                HostOp::RunLocalRoutine { routine_name, args, result_vars } => {
                    self.run_local_routine(process, graph, bus, &block.name, routine_name, args, result_vars)
                        .await?;
                }
                HostOp::RunRequestRoutine { request_name, args, result_vars } => {
                    self.run_request_routine(process, graph, bus, &block.name, request_name, args, result_vars)
                        .await?;
                }
                HostOp::ReturnResult { var } => {
                    let value = process.get_cvar(var);
                    process.result.lock().values.insert(var.clone(), value);
                }
                HostOp::BusyWait { duration_ns } => {
                    SimClock::wait(*duration_ns).await;
                }
            }
        }

        let next = explicit_next.or_else(|| next_block_in_order(&process.prog_instance.program, &block.name));
        if let Some(next_name) = &next {
            if let Some(deadline_ns) = block.deadlines.get(next_name) {
                check_soft_deadline(process, graph, next_name, *deadline_ns);
            }
        }
        Ok(BlockOutcome { next_block: next })
    }

    async fn run_local_routine(
        &self,
        process: &IqoalaProcess,
        graph: &TaskGraph,
        bus: &DriverBus,
        block_name: &str,
        routine_name: &str,
        args: &[String],
        result_vars: &[String],
    ) -> Result<(), RuntimeError> {
        let pid = process.pid();
        let routine = process
            .prog_instance
            .program
            .local_routine(routine_name)
            .ok_or_else(|| RuntimeError::UnknownRoutine(routine_name.to_string()))?;
        let companion = graph
            .companion_for(pid, block_name)
            .ok_or_else(|| RuntimeError::Fatal(format!("no qnos task installed for block '{block_name}'")))?;
        let ready_id = companion
            .handoff_ready_id
            .ok_or_else(|| RuntimeError::Fatal(format!("qnos task for block '{block_name}' has no handoff id")))?;

        let arg_values: Vec<i64> = args.iter().map(|a| process.get_cvar(a).as_int().unwrap_or(0)).collect();
        let result_len = {
            let resolved = process.prog_instance.resolved_sizes.lock();
            routine.result_word_len(&resolved).max(1)
        };

        let (input_addr, result_addr) = {
            let mut mem = process.prog_memory.lock();
            let input_addr = mem.shared_mem.allocate_local_routine_in(arg_values.len().max(1));
            if !arg_values.is_empty() {
                mem.shared_mem.write_local_routine_in(input_addr, &arg_values, 0)?;
            }
            let result_addr = mem.shared_mem.allocate_local_routine_out(result_len);
            (input_addr, result_addr)
        };

        *process.pending_lrcall.lock() = Some(PendingLrCall {
            routine_name: routine_name.to_string(),
            input_addr,
            result_addr,
        });

        bus.signal_done(TaskKey::new(pid, ready_id));
        process.set_state(ProcessState::Running);
        bus.wait_for(TaskKey::new(pid, companion.id)).await;

        let results = {
            let mem = process.prog_memory.lock();
            mem.shared_mem.read_local_routine_out(result_addr, result_len, 0)?
        };
        bind_return_vars(process, &routine.return_vars, &results, result_vars);
        Ok(())
    }

    async fn run_request_routine(
        &self,
        process: &IqoalaProcess,
        graph: &TaskGraph,
        bus: &DriverBus,
        block_name: &str,
        request_name: &str,
        args: &[String],
        result_vars: &[String],
    ) -> Result<(), RuntimeError> {
        let pid = process.pid();
        let routine = process
            .prog_instance
            .program
            .request_routine(request_name)
            .ok_or_else(|| RuntimeError::UnknownRequest(request_name.to_string()))?;
        let companion = graph
            .companion_for(pid, block_name)
            .ok_or_else(|| RuntimeError::Fatal(format!("no netstack task installed for block '{block_name}'")))?;
        let ready_id = companion
            .handoff_ready_id
            .ok_or_else(|| RuntimeError::Fatal(format!("netstack task for block '{block_name}' has no handoff id")))?;

        let arg_values: Vec<i64> = args.iter().map(|a| process.get_cvar(a).as_int().unwrap_or(0)).collect();
        let result_len = routine.return_vars.len().max(1);

        let (input_addr, result_addr, callback_in_addr, callback_out_addr) = {
            let mut mem = process.prog_memory.lock();
            let input_addr = mem.shared_mem.allocate_request_in(arg_values.len().max(1));
            if !arg_values.is_empty() {
                mem.shared_mem.write_request_in(input_addr, &arg_values, 0)?;
            }
            let result_addr = mem.shared_mem.allocate_request_out(result_len);
            let callback_in_addr = mem.shared_mem.allocate_callback_in(4);
            let callback_out_addr = mem.shared_mem.allocate_callback_out(4);
            (input_addr, result_addr, callback_in_addr, callback_out_addr)
        };

        *process.pending_rrcall.lock() = Some(PendingRrCall {
            request_name: request_name.to_string(),
            input_addr,
            result_addr,
            callback_in_addr,
            callback_out_addr,
        });

        bus.signal_done(TaskKey::new(pid, ready_id));
        process.set_state(ProcessState::WaitingEntDist);
        bus.wait_for(TaskKey::new(pid, companion.id)).await;
        process.set_state(ProcessState::Running);

        let results = {
            let mem = process.prog_memory.lock();
            mem.shared_mem.read_request_out(result_addr, result_len, 0)?
        };
        bind_return_vars(process, &routine.return_vars, &results, result_vars);
        Ok(())
    }
}

fn bind_return_vars(process: &IqoalaProcess, return_vars: &[ReturnVar], results: &[i64], dest_names: &[String]) {
    let mut offset = 0;
    for (rv, dest) in return_vars.iter().zip(dest_names.iter()) {
        let size = match &rv.size {
            None => 1,
            Some(Template::Literal(n)) => *n as usize,
            Some(Template::Placeholder(name)) => process
                .prog_instance
                .resolved_sizes
                .lock()
                .get(name)
                .copied()
                .unwrap_or(1) as usize,
        };
        let end = (offset + size).min(results.len());
        let slice = &results[offset.min(results.len())..end];
        offset += size;
        if size <= 1 {
            process.set_cvar(dest, Value::Int(slice.first().copied().unwrap_or(0)));
        } else {
            process.set_cvar(dest, Value::IntVec(slice.to_vec()));
        }
    }
}

fn next_block_in_order(program: &Program, current: &str) -> Option<String> {
    let idx = program.blocks.iter().position(|b| b.name == current)?;
    program.blocks.get(idx + 1).map(|b| b.name.clone())
}

/// Deadlines are a soft constraint (§9 open question): the spec names a
/// `{successor-block-name -> ns}` map without saying what enforcement means,
/// so a miss is logged rather than failing the process.
fn check_soft_deadline(process: &IqoalaProcess, graph: &TaskGraph, next_block: &str, deadline_ns: u64) {
    if let Some(task) = graph.host_task_for(process.pid(), next_block) {
        if let Some(start) = task.start_time_ns {
            if start > SimClock::now_ns() + deadline_ns {
                warn!(pid = process.pid(), block = next_block, deadline_ns, "block deadline missed");
            }
        }
    }
}
