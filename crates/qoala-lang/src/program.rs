// =============================================================================
// Qoala Node Runtime - Program Data Model
// =============================================================================
// Table of Contents:
//   1. Program - Top-level compiled unit
//   2. BasicBlock - Typed unit of host instructions
//   3. HostOp - Classical operation sum type
//   4. LocalRoutine - Named quantum subroutine + metadata
//   5. RequestRoutine / Request - Entanglement-generation request template
//   6. VirtIdMapping - Per-pair virtual qubit id strategy
// =============================================================================
// Purpose: One-for-one reproduction of §3's data model. `Program` is pure
//          data produced by the (out of scope) compiler front-end and
//          consumed by the scheduler and the three processors.
// =============================================================================

use crate::value::Template;
use std::collections::HashMap;

// =============================================================================
// 1. Program - Top-level compiled unit
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub name: String,
    pub parameters: Vec<String>,
    pub csockets: HashMap<u32, String>,
    pub epr_sockets: HashMap<u32, String>,
    pub blocks: Vec<BasicBlock>,
    pub local_routines: HashMap<String, LocalRoutine>,
    pub request_routines: HashMap<String, RequestRoutine>,
}

impl Program {
    pub fn block(&self, name: &str) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.name == name)
    }

    pub fn local_routine(&self, name: &str) -> Option<&LocalRoutine> {
        self.local_routines.get(name)
    }

    pub fn request_routine(&self, name: &str) -> Option<&RequestRoutine> {
        self.request_routines.get(name)
    }
}

// =============================================================================
// 2. BasicBlock - Typed unit of host instructions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// Classical local.
    Cl,
    /// Classical cross-node.
    Cc,
    /// Quantum local.
    Ql,
    /// Quantum cross-node.
    Qc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub name: String,
    pub typ: BlockType,
    pub instructions: Vec<HostOp>,
    pub deadlines: HashMap<String, u64>,
}

impl BasicBlock {
    /// Structural invariants from §3: QL carries exactly one
    /// run-local-routine instruction, QC exactly one run-request-routine
    /// instruction, CL/CC carry only classical operations.
    pub fn check_invariants(&self) -> Result<(), String> {
        let local_calls = self
            .instructions
            .iter()
            .filter(|i| matches!(i, HostOp::RunLocalRoutine { .. }))
            .count();
        let request_calls = self
            .instructions
            .iter()
            .filter(|i| matches!(i, HostOp::RunRequestRoutine { .. }))
            .count();

        match self.typ {
            BlockType::Ql => {
                if local_calls != 1 || request_calls != 0 {
                    return Err(format!(
                        "QL block '{}' must contain exactly one run-local-routine instruction",
                        self.name
                    ));
                }
            }
            BlockType::Qc => {
                if request_calls != 1 || local_calls != 0 {
                    return Err(format!(
                        "QC block '{}' must contain exactly one run-request-routine instruction",
                        self.name
                    ));
                }
            }
            BlockType::Cl | BlockType::Cc => {
                if local_calls != 0 || request_calls != 0 {
                    return Err(format!(
                        "classical block '{}' must not run quantum routines",
                        self.name
                    ));
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// 3. HostOp - Classical operation sum type
// =============================================================================

/// §9 design note: the source's duck-typed `ClassicalIqoalaOp` subclass
/// hierarchy becomes one sum type with a variant per operation. Operand
/// slots are classical-memory variable names; the host processor resolves
/// them at execution time.
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    AssignConst { dest: String, value: i64 },
    Add { dest: String, lhs: String, rhs: String },
    Multiply { dest: String, lhs: String, rhs: String },
    /// Multiply `dest` by `factor` only if `cond` is nonzero.
    BitCondMultiply {
        dest: String,
        cond: String,
        factor: String,
    },
    BranchEq { lhs: String, rhs: String, target: String },
    BranchNeq { lhs: String, rhs: String, target: String },
    BranchLt { lhs: String, rhs: String, target: String },
    BranchGt { lhs: String, rhs: String, target: String },
    Jump { target: String },
    SendCMsg { csocket: u32, value: String },
    ReceiveCMsg { csocket: u32, dest: String },
    RunLocalRoutine {
        routine_name: String,
        args: Vec<String>,
        result_vars: Vec<String>,
    },
    RunRequestRoutine {
        request_name: String,
        args: Vec<String>,
        result_vars: Vec<String>,
    },
    ReturnResult { var: String },
    BusyWait { duration_ns: u64 },
}

impl HostOp {
    pub fn name(&self) -> &'static str {
        match self {
            HostOp::AssignConst { .. } => "assign_cval",
            HostOp::Add { .. } => "add",
            HostOp::Multiply { .. } => "multiply",
            HostOp::BitCondMultiply { .. } => "bit_cond_mult",
            HostOp::BranchEq { .. } => "beq",
            HostOp::BranchNeq { .. } => "bne",
            HostOp::BranchLt { .. } => "blt",
            HostOp::BranchGt { .. } => "bgt",
            HostOp::Jump { .. } => "jmp",
            HostOp::SendCMsg { .. } => "send_cmsg",
            HostOp::ReceiveCMsg { .. } => "recv_cmsg",
            HostOp::RunLocalRoutine { .. } => "run_subroutine",
            HostOp::RunRequestRoutine { .. } => "run_request",
            HostOp::ReturnResult { .. } => "return_result",
            HostOp::BusyWait { .. } => "busy_wait",
        }
    }
}

// =============================================================================
// 4. LocalRoutine - Named quantum subroutine + metadata
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnVar {
    pub name: String,
    /// `None` for a scalar, `Some(size)` for a fixed-size vector. `size` may
    /// itself be an unresolved template before process instantiation.
    pub size: Option<Template<u32>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QubitUse {
    pub used: Vec<u32>,
    pub kept: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalRoutine {
    pub name: String,
    pub params: Vec<String>,
    pub subroutine: Vec<crate::netqasm::NetQasmInstr>,
    pub return_vars: Vec<ReturnVar>,
    pub qubit_use: QubitUse,
    pub request_name: Option<String>,
}

impl LocalRoutine {
    pub fn result_word_len(&self, resolved_sizes: &HashMap<String, u32>) -> usize {
        self.return_vars
            .iter()
            .map(|rv| match &rv.size {
                None => 1,
                Some(Template::Literal(n)) => *n as usize,
                Some(Template::Placeholder(name)) => {
                    *resolved_sizes.get(name).unwrap_or(&1) as usize
                }
            })
            .sum()
    }
}

// =============================================================================
// 5. RequestRoutine / Request - Entanglement-generation request template
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    CreateKeep,
    MeasureDirectly,
    RemoteStatePrep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Create,
    Receive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackType {
    Sequential,
    WaitAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtIdMapping {
    /// `all k`: every pair uses the same virtual id `k`.
    All(u32),
    /// `increment k`: pair `i` uses virtual id `k + i`.
    Increment(u32),
    /// `custom [v0, v1, ...]`: pair `i` uses `list[i]`.
    Custom(Vec<u32>),
}

impl VirtIdMapping {
    pub fn virt_id_for(&self, pair_index: usize) -> u32 {
        match self {
            VirtIdMapping::All(k) => *k,
            VirtIdMapping::Increment(k) => k + pair_index as u32,
            VirtIdMapping::Custom(list) => list[pair_index],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub remote_id: Template<u32>,
    pub epr_socket_id: u32,
    pub num_pairs: Template<u32>,
    pub virt_ids: VirtIdMapping,
    pub timeout: u64,
    pub fidelity: Template<f64>,
    pub typ: RequestType,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestRoutine {
    pub name: String,
    pub request: Request,
    pub return_vars: Vec<ReturnVar>,
    pub callback_type: CallbackType,
    pub callback_routine: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ql_block(calls: usize) -> BasicBlock {
        let instructions = (0..calls)
            .map(|_| HostOp::RunLocalRoutine {
                routine_name: "r".into(),
                args: vec![],
                result_vars: vec![],
            })
            .collect();
        BasicBlock {
            name: "b".into(),
            typ: BlockType::Ql,
            instructions,
            deadlines: HashMap::new(),
        }
    }

    #[test]
    fn test_ql_block_requires_exactly_one_local_routine() {
        assert!(ql_block(1).check_invariants().is_ok());
        assert!(ql_block(0).check_invariants().is_err());
        assert!(ql_block(2).check_invariants().is_err());
    }

    #[test]
    fn test_cl_block_rejects_quantum_calls() {
        let block = BasicBlock {
            name: "b".into(),
            typ: BlockType::Cl,
            instructions: vec![HostOp::RunLocalRoutine {
                routine_name: "r".into(),
                args: vec![],
                result_vars: vec![],
            }],
            deadlines: HashMap::new(),
        };
        assert!(block.check_invariants().is_err());
    }

    #[test]
    fn test_virt_id_mapping() {
        assert_eq!(VirtIdMapping::All(3).virt_id_for(5), 3);
        assert_eq!(VirtIdMapping::Increment(2).virt_id_for(3), 5);
        assert_eq!(VirtIdMapping::Custom(vec![9, 8, 7]).virt_id_for(1), 8);
    }
}
