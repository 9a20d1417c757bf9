// =============================================================================
// Qoala Node Runtime - Exposed Hardware Interface
// =============================================================================
// Table of Contents:
//   1. QubitInfo - Per-physical-slot descriptor
//   2. Ehi - Exposed hardware descriptor
//   3. UnitModule - Per-process subset of the EHI a program may use
// =============================================================================
// Purpose: The hardware descriptor consumed by the (out of scope) compiler
//          and by the scheduler/memory manager to decide which physical
//          slots satisfy a virtual qubit's declared role.
// =============================================================================

use crate::qdevice::QubitCapability;
use std::collections::BTreeMap;

// =============================================================================
// 1. QubitInfo - Per-physical-slot descriptor
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QubitInfo {
    pub phys_id: u32,
    pub capability: QubitCapability,
    /// Single-qubit gate duration in ns, used by the task model's duration
    /// estimates.
    pub single_gate_duration_ns: u64,
    /// Two-qubit gate duration in ns.
    pub two_qubit_gate_duration_ns: u64,
}

// =============================================================================
// 2. Ehi - Exposed hardware descriptor
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct Ehi {
    qubits: BTreeMap<u32, QubitInfo>,
}

impl Ehi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_qubit(mut self, info: QubitInfo) -> Self {
        self.qubits.insert(info.phys_id, info);
        self
    }

    pub fn qubit(&self, phys_id: u32) -> Option<&QubitInfo> {
        self.qubits.get(&phys_id)
    }

    pub fn all_qubits(&self) -> impl Iterator<Item = &QubitInfo> {
        self.qubits.values()
    }

    /// Physical slots matching `capability`, in ascending id order — the
    /// order `MemoryManager::allocate` scans when looking for the
    /// lowest-numbered free slot.
    pub fn qubits_with_capability(&self, capability: QubitCapability) -> Vec<u32> {
        self.qubits
            .values()
            .filter(|q| q.capability == capability)
            .map(|q| q.phys_id)
            .collect()
    }
}

// =============================================================================
// 3. UnitModule - Per-process subset of the EHI a program may use
// =============================================================================

/// Declares, per virtual qubit id used by a program, whether it requires a
/// communication-capable slot. Built from a program's local routines
/// (`qubit_use`/`qubit_keep`) and request routines (virtual ids they touch)
/// at compile time; consumed by `MemoryManager::allocate`.
#[derive(Debug, Clone, Default)]
pub struct UnitModule {
    /// virt_id -> required capability
    roles: BTreeMap<u32, QubitCapability>,
}

impl UnitModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(mut self, virt_id: u32, capability: QubitCapability) -> Self {
        self.roles
            .entry(virt_id)
            .and_modify(|existing| {
                // A qubit touched by both a request routine (needs
                // Communication) and a local routine (MemoryOnly suffices)
                // is Communication-capable, the stricter of the two.
                if capability == QubitCapability::Communication {
                    *existing = QubitCapability::Communication;
                }
            })
            .or_insert(capability);
        self
    }

    pub fn required_capability(&self, virt_id: u32) -> QubitCapability {
        self.roles
            .get(&virt_id)
            .copied()
            .unwrap_or(QubitCapability::MemoryOnly)
    }

    /// Every virtual qubit id this program declares a role for, ascending.
    /// The scheduler uses this to pre-allocate a process's qubits at
    /// submission time rather than leaving purely-local routines (which
    /// never go through Netstack's per-pair allocation) with no physical
    /// slot to replay NetQASM against.
    pub fn declared_virt_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.roles.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qubits_with_capability_ascending() {
        let ehi = Ehi::new()
            .with_qubit(QubitInfo {
                phys_id: 1,
                capability: QubitCapability::Communication,
                single_gate_duration_ns: 10,
                two_qubit_gate_duration_ns: 20,
            })
            .with_qubit(QubitInfo {
                phys_id: 0,
                capability: QubitCapability::Communication,
                single_gate_duration_ns: 10,
                two_qubit_gate_duration_ns: 20,
            });
        assert_eq!(ehi.qubits_with_capability(QubitCapability::Communication), vec![0, 1]);
    }

    #[test]
    fn test_unit_module_escalates_to_communication() {
        let um = UnitModule::new()
            .declare(0, QubitCapability::MemoryOnly)
            .declare(0, QubitCapability::Communication);
        assert_eq!(um.required_capability(0), QubitCapability::Communication);
    }
}
