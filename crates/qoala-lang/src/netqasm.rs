// =============================================================================
// Qoala Node Runtime - NetQASM Instruction Surface
// =============================================================================
// Table of Contents:
//   1. NetQasmInstr - Low-level quantum subroutine instruction
//   2. GateKind - Single/two-qubit gate selector
// =============================================================================
// Purpose: `LocalRoutine`'s "low-level quantum subroutine (imported opaque)"
//          is a closed instruction set small enough for a Qnos processor to
//          replay faithfully against `QDevice`, grounded in the teacher's
//          `GateInstruction`/`GateType` split (kernel_services::message)
//          rather than inventing a bespoke bytecode.
// =============================================================================

use serde::{Deserialize, Serialize};

// =============================================================================
// 2. GateKind - Single/two-qubit gate selector
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateKind {
    X,
    Y,
    Z,
    H,
    S,
    RotX,
    RotY,
    RotZ,
    Cnot,
    Cphase,
}

impl GateKind {
    pub fn is_two_qubit(&self) -> bool {
        matches!(self, GateKind::Cnot | GateKind::Cphase)
    }
}

// =============================================================================
// 1. NetQasmInstr - Low-level quantum subroutine instruction
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NetQasmInstr {
    /// Bring virtual qubit `qubit` into the |0> state at the start of a
    /// subroutine.
    InitQubit { qubit: u32 },
    /// Apply a single-qubit gate, with an optional rotation angle
    /// (multiples of pi/16, matching NetQASM's fixed-point angle encoding)
    /// for the `Rot*` kinds.
    ApplyGate {
        gate: GateKind,
        qubit: u32,
        angle_steps: Option<i32>,
    },
    /// Apply a two-qubit controlled gate.
    CtrlGate {
        gate: GateKind,
        control: u32,
        target: u32,
    },
    /// Measure `qubit` and store the outcome in return-variable slot
    /// `into_var` (resolved against the routine's return-variable list).
    Measure { qubit: u32, into_var: usize },
}

impl NetQasmInstr {
    pub fn qubits_touched(&self) -> Vec<u32> {
        match self {
            NetQasmInstr::InitQubit { qubit } => vec![*qubit],
            NetQasmInstr::ApplyGate { qubit, .. } => vec![*qubit],
            NetQasmInstr::CtrlGate { control, target, .. } => vec![*control, *target],
            NetQasmInstr::Measure { qubit, .. } => vec![*qubit],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_qubit_gate_classification() {
        assert!(GateKind::Cnot.is_two_qubit());
        assert!(!GateKind::H.is_two_qubit());
    }

    #[test]
    fn test_qubits_touched() {
        let instr = NetQasmInstr::CtrlGate {
            gate: GateKind::Cnot,
            control: 0,
            target: 1,
        };
        assert_eq!(instr.qubits_touched(), vec![0, 1]);
    }
}
