// =============================================================================
// Qoala Node Runtime - Process State
// =============================================================================
// Table of Contents:
//   1. ProcessState - Coarse scheduling state
//   2. EprSocketInfo - Resolved EPR socket endpoint
//   3. PendingLrCall / PendingRrCall - In-flight routine handoff
//   4. ProgramMemory - Classical variables + shared-memory regions
//   5. ProgramInstance - One process's static install data
//   6. ProcessResult / ProcessStatus - What a finished process hands back
//   7. IqoalaProcess - A program instantiated on this node
// =============================================================================
// Purpose: §4.2's `IqoalaProcess`/`ProgramInstance`/`ProgramMemory` triad,
//          plus the mailbox fields a Host block uses to hand a routine
//          invocation to its paired Qnos/Netstack task. Addresses for that
//          handoff are only known once the Host has actually allocated the
//          shared-memory region, so they travel as a one-shot mailbox rather
//          than as task-graph-time data.
// =============================================================================

use crate::socket::CSocket;
use crate::task::TaskGraph;
use crate::template::InputValue;
use parking_lot::Mutex;
use qoala_device::ehi::UnitModule;
use qoala_device::shared_mem::{MemAddr, SharedMemoryManager};
use qoala_lang::program::Program;
use qoala_lang::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

// =============================================================================
// 1. ProcessState - Coarse scheduling state
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    New,
    Running,
    WaitingRecv,
    WaitingQubit,
    WaitingEntDist,
    Finished,
    Failed,
}

// =============================================================================
// 2. EprSocketInfo - Resolved EPR socket endpoint
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct EprSocketInfo {
    pub remote_node_id: u32,
    pub fidelity: f64,
}

// =============================================================================
// 3. PendingLrCall / PendingRrCall - In-flight routine handoff
// =============================================================================

/// Written by the Host when a QL block's `run_subroutine` instruction has
/// finished staging its arguments; taken by the Qnos task once it observes
/// the paired "handoff ready" signal.
#[derive(Debug, Clone)]
pub struct PendingLrCall {
    pub routine_name: String,
    pub input_addr: MemAddr,
    pub result_addr: MemAddr,
}

/// As `PendingLrCall`, for a QC block's `run_request` instruction, plus the
/// callback regions a request routine's callback (if any) reads and writes.
#[derive(Debug, Clone)]
pub struct PendingRrCall {
    pub request_name: String,
    pub input_addr: MemAddr,
    pub result_addr: MemAddr,
    pub callback_in_addr: MemAddr,
    pub callback_out_addr: MemAddr,
}

// =============================================================================
// 4. ProgramMemory - Classical variables + shared-memory regions
// =============================================================================

#[derive(Default)]
pub struct ProgramMemory {
    pub classical: HashMap<String, Value>,
    pub shared_mem: SharedMemoryManager,
}

// =============================================================================
// 5. ProgramInstance - One process's static install data
// =============================================================================

pub struct ProgramInstance {
    pub pid: u64,
    pub program: Arc<Program>,
    pub inputs: HashMap<String, InputValue>,
    pub unit_module: UnitModule,
    /// Vector return-var sizes resolved from `inputs` once at
    /// initialization, since `result_word_len` is consulted repeatedly
    /// across a single routine invocation (Host alloc, Qnos write, Host
    /// read) and should see the same answer every time.
    pub resolved_sizes: Mutex<HashMap<String, u32>>,
    pub task_graph: Mutex<TaskGraph>,
}

// =============================================================================
// 6. ProcessResult / ProcessStatus - What a finished process hands back
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub enum ProcessStatus {
    #[default]
    Ok,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessResult {
    pub status: ProcessStatus,
    pub values: HashMap<String, Value>,
}

// =============================================================================
// 7. IqoalaProcess - A program instantiated on this node
// =============================================================================

pub struct IqoalaProcess {
    pub prog_instance: ProgramInstance,
    pub prog_memory: Mutex<ProgramMemory>,
    pub csockets: HashMap<u32, tokio::sync::Mutex<CSocket>>,
    pub epr_sockets: HashMap<u32, EprSocketInfo>,
    pub pending_lrcall: Mutex<Option<PendingLrCall>>,
    pub pending_rrcall: Mutex<Option<PendingRrCall>>,
    pub result: Mutex<ProcessResult>,
    state: Mutex<ProcessState>,
}

impl IqoalaProcess {
    pub fn new(
        prog_instance: ProgramInstance,
        csockets: HashMap<u32, tokio::sync::Mutex<CSocket>>,
        epr_sockets: HashMap<u32, EprSocketInfo>,
    ) -> Self {
        Self {
            prog_instance,
            prog_memory: Mutex::new(ProgramMemory::default()),
            csockets,
            epr_sockets,
            pending_lrcall: Mutex::new(None),
            pending_rrcall: Mutex::new(None),
            result: Mutex::new(ProcessResult::default()),
            state: Mutex::new(ProcessState::New),
        }
    }

    pub fn pid(&self) -> u64 {
        self.prog_instance.pid
    }

    pub fn state(&self) -> ProcessState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: ProcessState) {
        *self.state.lock() = state;
    }

    pub fn get_cvar(&self, name: &str) -> Value {
        self.prog_memory
            .lock()
            .classical
            .get(name)
            .cloned()
            .unwrap_or(Value::Int(0))
    }

    pub fn set_cvar(&self, name: &str, value: Value) {
        self.prog_memory.lock().classical.insert(name.to_string(), value);
    }

    pub fn mark_finished(&self) {
        self.set_state(ProcessState::Finished);
    }

    pub fn mark_failed(&self, reason: String) {
        self.set_state(ProcessState::Failed);
        self.result.lock().status = ProcessStatus::Failed(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskGraph;

    fn empty_instance(pid: u64) -> ProgramInstance {
        ProgramInstance {
            pid,
            program: Arc::new(Program {
                name: "t".into(),
                parameters: vec![],
                csockets: HashMap::new(),
                epr_sockets: HashMap::new(),
                blocks: vec![],
                local_routines: HashMap::new(),
                request_routines: HashMap::new(),
            }),
            inputs: HashMap::new(),
            unit_module: UnitModule::new(),
            resolved_sizes: Mutex::new(HashMap::new()),
            task_graph: Mutex::new(TaskGraph::new()),
        }
    }

    #[test]
    fn test_cvar_roundtrip_and_default() {
        let process = IqoalaProcess::new(empty_instance(1), HashMap::new(), HashMap::new());
        assert_eq!(process.get_cvar("missing"), Value::Int(0));
        process.set_cvar("x", Value::Int(7));
        assert_eq!(process.get_cvar("x"), Value::Int(7));
    }

    #[test]
    fn test_mark_failed_sets_state_and_result() {
        let process = IqoalaProcess::new(empty_instance(1), HashMap::new(), HashMap::new());
        process.mark_failed("boom".into());
        assert_eq!(process.state(), ProcessState::Failed);
        assert_eq!(process.result.lock().status, ProcessStatus::Failed("boom".into()));
    }
}
