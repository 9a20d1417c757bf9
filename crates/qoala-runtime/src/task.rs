// =============================================================================
// Qoala Node Runtime - Task Graph
// =============================================================================
// Table of Contents:
//   1. ProcessorKind - Which driver a task belongs to
//   2. TaskBody - What a task actually runs
//   3. Task - One scheduled unit of work
//   4. TaskGraph - A batch's installed schedule
// =============================================================================
// Purpose: §4.7's "ordered list of (optional absolute start time, task)"
//          where a task names a basic block. Every block gets exactly one
//          Host task; a QL block additionally gets a QnosLocal companion and
//          a QC block a NetstackRequest companion, since §3 requires those
//          blocks to carry exactly one routine-call instruction each. The
//          companion's `handoff_ready_id` is the DriverBus key its paired
//          Host task signals once the routine's arguments are staged in
//          shared memory; the companion's own `id` is the key it signals
//          back once execution completes.
// =============================================================================

use qoala_lang::program::{BlockType, Program};

// =============================================================================
// 1. ProcessorKind - Which driver a task belongs to
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorKind {
    Host,
    Qnos,
    Netstack,
}

// =============================================================================
// 2. TaskBody - What a task actually runs
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskBody {
    Host { block_name: String },
    QnosLocal { block_name: String },
    NetstackRequest { block_name: String },
}

impl TaskBody {
    pub fn processor_kind(&self) -> ProcessorKind {
        match self {
            TaskBody::Host { .. } => ProcessorKind::Host,
            TaskBody::QnosLocal { .. } => ProcessorKind::Qnos,
            TaskBody::NetstackRequest { .. } => ProcessorKind::Netstack,
        }
    }

    pub fn block_name(&self) -> &str {
        match self {
            TaskBody::Host { block_name } | TaskBody::QnosLocal { block_name } | TaskBody::NetstackRequest { block_name } => block_name,
        }
    }
}

// =============================================================================
// 3. Task - One scheduled unit of work
// =============================================================================

#[derive(Debug, Clone)]
pub struct Task {
    pub id: u64,
    pub pid: u64,
    pub body: TaskBody,
    /// Absolute simulated-time start, if the scheduler pinned one; `None`
    /// means "as soon as precedence allows."
    pub start_time_ns: Option<u64>,
    pub duration_estimate_ns: u64,
    /// Set only on QnosLocal/NetstackRequest tasks: the DriverBus key the
    /// paired Host task signals once its routine call is staged.
    pub handoff_ready_id: Option<u64>,
}

// =============================================================================
// 4. TaskGraph - A batch's installed schedule
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: Vec<Task>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the task list for one process's program: one Host task per
    /// block in program order, plus a QnosLocal/NetstackRequest companion
    /// for QL/QC blocks. `next_id` is a shared counter across the whole
    /// batch so ids never collide between processes sharing a `DriverBus`.
    pub fn for_program(pid: u64, program: &Program, next_id: &mut u64) -> Self {
        let mut tasks = Vec::new();
        for block in &program.blocks {
            let mut mint = || {
                let id = *next_id;
                *next_id += 1;
                id
            };

            let companion_id = match block.typ {
                BlockType::Ql | BlockType::Qc => Some(mint()),
                BlockType::Cl | BlockType::Cc => None,
            };
            let handoff_ready_id = companion_id.map(|_| mint());
            let host_id = mint();

            tasks.push(Task {
                id: host_id,
                pid,
                body: TaskBody::Host { block_name: block.name.clone() },
                start_time_ns: None,
                duration_estimate_ns: estimate_host_duration(block),
                handoff_ready_id: None,
            });

            if let Some(companion_id) = companion_id {
                let body = match block.typ {
                    BlockType::Ql => TaskBody::QnosLocal { block_name: block.name.clone() },
                    BlockType::Qc => TaskBody::NetstackRequest { block_name: block.name.clone() },
                    BlockType::Cl | BlockType::Cc => unreachable!(),
                };
                tasks.push(Task {
                    id: companion_id,
                    pid,
                    body,
                    start_time_ns: None,
                    duration_estimate_ns: 1_000,
                    handoff_ready_id,
                });
            }
        }
        Self { tasks }
    }

    /// Merges several processes' graphs into one installed schedule; the
    /// per-process query methods below filter by `pid` so a merged graph is
    /// a safe unit to hand every process.
    pub fn merge(graphs: impl IntoIterator<Item = TaskGraph>) -> Self {
        let mut tasks = Vec::new();
        for g in graphs {
            tasks.extend(g.tasks);
        }
        Self { tasks }
    }

    pub fn host_task_for(&self, pid: u64, block_name: &str) -> Option<&Task> {
        self.tasks
            .iter()
            .find(|t| t.pid == pid && t.body.processor_kind() == ProcessorKind::Host && t.body.block_name() == block_name)
    }

    pub fn companion_for(&self, pid: u64, block_name: &str) -> Option<&Task> {
        self.tasks
            .iter()
            .find(|t| t.pid == pid && t.body.processor_kind() != ProcessorKind::Host && t.body.block_name() == block_name)
    }

    pub fn qpu_schedule(&self, pid: u64) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|t| t.pid == pid && t.body.processor_kind() != ProcessorKind::Host)
            .cloned()
            .collect()
    }
}

fn estimate_host_duration(block: &qoala_lang::program::BasicBlock) -> u64 {
    block.instructions.len() as u64 * 10
}

#[cfg(test)]
mod tests {
    use super::*;
    use qoala_lang::program::{BasicBlock, HostOp};
    use std::collections::HashMap;

    fn program_with(blocks: Vec<BasicBlock>) -> Program {
        Program {
            name: "t".into(),
            parameters: vec![],
            csockets: HashMap::new(),
            epr_sockets: HashMap::new(),
            blocks,
            local_routines: HashMap::new(),
            request_routines: HashMap::new(),
        }
    }

    #[test]
    fn test_ql_block_gets_a_qnos_companion() {
        let program = program_with(vec![BasicBlock {
            name: "b0".into(),
            typ: BlockType::Ql,
            instructions: vec![HostOp::RunLocalRoutine {
                routine_name: "r".into(),
                args: vec![],
                result_vars: vec![],
            }],
            deadlines: HashMap::new(),
        }]);
        let mut next_id = 0;
        let graph = TaskGraph::for_program(1, &program, &mut next_id);
        let host = graph.host_task_for(1, "b0").unwrap();
        let companion = graph.companion_for(1, "b0").unwrap();
        assert_eq!(companion.body.processor_kind(), ProcessorKind::Qnos);
        assert_eq!(graph.qpu_schedule(1).len(), 1);
        assert_ne!(host.id, companion.id);
        assert!(companion.handoff_ready_id.is_some());
    }

    #[test]
    fn test_cl_block_has_no_companion() {
        let program = program_with(vec![BasicBlock {
            name: "b0".into(),
            typ: BlockType::Cl,
            instructions: vec![],
            deadlines: HashMap::new(),
        }]);
        let mut next_id = 0;
        let graph = TaskGraph::for_program(1, &program, &mut next_id);
        assert!(graph.companion_for(1, "b0").is_none());
        assert!(graph.qpu_schedule(1).is_empty());
    }
}
