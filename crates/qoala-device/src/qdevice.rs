// =============================================================================
// Qoala Node Runtime - QDevice Abstraction
// =============================================================================
// Table of Contents:
//   1. QubitCapability - Communication vs memory-only slot kind
//   2. QDevice - Abstract physical qubit array
//   3. InMemoryQDevice - Deterministic test double
// =============================================================================
// Purpose: The physics-level simulator (noise models, density matrices) is
//          out of scope; every processor reaches the device only through
//          this trait. `InMemoryQDevice` is test infrastructure, grounded in
//          the teacher's `SimulatorDevice` stand-in role for its heavier
//          `QuantumExecutionEngine`.
// =============================================================================

use crate::error::DeviceError;
use qoala_lang::netqasm::GateKind;
use std::collections::HashMap;

// =============================================================================
// 1. QubitCapability - Communication vs memory-only slot kind
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QubitCapability {
    /// Can participate in entanglement generation (a "communication qubit").
    Communication,
    /// Local storage only.
    MemoryOnly,
}

// =============================================================================
// 2. QDevice - Abstract physical qubit array
// =============================================================================

/// Narrow contract reached by Qnos (local-routine execution) and Netstack
/// (entanglement delivery, direct measurement). Never touched directly by
/// the Host or the scheduler.
pub trait QDevice: Send + Sync {
    /// Declared capability of physical slot `phys_id`.
    fn capability(&self, phys_id: u32) -> Option<QubitCapability>;

    /// Number of physical slots this device exposes.
    fn num_slots(&self) -> u32;

    /// Bring `phys_id` into the |0> state. Occupies the slot if free.
    fn allocate_slot(&self, phys_id: u32) -> Result<(), DeviceError>;

    /// Release `phys_id` back to the free pool.
    fn free_slot(&self, phys_id: u32) -> Result<(), DeviceError>;

    /// Apply a single-qubit gate to `phys_id`.
    fn apply_gate(&self, phys_id: u32, gate: GateKind, angle_steps: Option<i32>) -> Result<(), DeviceError>;

    /// Apply a two-qubit controlled gate.
    fn apply_ctrl_gate(&self, control: u32, target: u32, gate: GateKind) -> Result<(), DeviceError>;

    /// Measure `phys_id` in the computational basis, returning 0 or 1.
    fn measure(&self, phys_id: u32) -> Result<u8, DeviceError>;

    /// Marks `phys_id` as now holding one half of a freshly generated Bell
    /// pair whose shared classical correlation is `correlated_outcome`.
    /// EntDist calls this once per node (each against that node's own
    /// `QDevice` instance) with the same `correlated_outcome`, since the two
    /// halves never share a device in a networked deployment.
    fn receive_entangled_qubit(&self, phys_id: u32, correlated_outcome: u8) -> Result<(), DeviceError>;
}

// =============================================================================
// 3. InMemoryQDevice - Deterministic test double
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    Occupied,
}

/// Tracks per-slot occupancy and a perfect-correlation Bell-pair table: two
/// slots given the same `correlated_outcome` via `receive_entangled_qubit`
/// always measure to the same classical bit, standing in for a real physics
/// backend in tests.
pub struct InMemoryQDevice {
    capabilities: HashMap<u32, QubitCapability>,
    slots: parking_lot::Mutex<HashMap<u32, SlotState>>,
    /// phys_id -> fixed outcome this slot will measure to, set at
    /// entanglement time so both halves of a pair agree.
    fixed_outcomes: parking_lot::Mutex<HashMap<u32, u8>>,
}

impl InMemoryQDevice {
    /// Builds a device with `num_comm` communication-capable slots followed
    /// by `num_memory` memory-only slots.
    pub fn new(num_comm: u32, num_memory: u32) -> Self {
        let mut capabilities = HashMap::new();
        let mut slots = HashMap::new();
        for i in 0..num_comm {
            capabilities.insert(i, QubitCapability::Communication);
            slots.insert(i, SlotState::Free);
        }
        for i in 0..num_memory {
            let id = num_comm + i;
            capabilities.insert(id, QubitCapability::MemoryOnly);
            slots.insert(id, SlotState::Free);
        }
        Self {
            capabilities,
            slots: parking_lot::Mutex::new(slots),
            fixed_outcomes: parking_lot::Mutex::new(HashMap::new()),
        }
    }
}

impl QDevice for InMemoryQDevice {
    fn capability(&self, phys_id: u32) -> Option<QubitCapability> {
        self.capabilities.get(&phys_id).copied()
    }

    fn num_slots(&self) -> u32 {
        self.capabilities.len() as u32
    }

    fn allocate_slot(&self, phys_id: u32) -> Result<(), DeviceError> {
        let mut slots = self.slots.lock();
        match slots.get(&phys_id) {
            Some(SlotState::Free) => {
                slots.insert(phys_id, SlotState::Occupied);
                Ok(())
            }
            Some(SlotState::Occupied) => Err(DeviceError::SlotOccupied(phys_id)),
            None => Err(DeviceError::SlotNotAllocated(phys_id)),
        }
    }

    fn free_slot(&self, phys_id: u32) -> Result<(), DeviceError> {
        let mut slots = self.slots.lock();
        if !slots.contains_key(&phys_id) {
            return Err(DeviceError::SlotNotAllocated(phys_id));
        }
        slots.insert(phys_id, SlotState::Free);
        self.fixed_outcomes.lock().remove(&phys_id);
        Ok(())
    }

    fn apply_gate(&self, phys_id: u32, _gate: GateKind, _angle_steps: Option<i32>) -> Result<(), DeviceError> {
        if !self.slots.lock().contains_key(&phys_id) {
            return Err(DeviceError::SlotNotAllocated(phys_id));
        }
        Ok(())
    }

    fn apply_ctrl_gate(&self, control: u32, target: u32, _gate: GateKind) -> Result<(), DeviceError> {
        let slots = self.slots.lock();
        if !slots.contains_key(&control) {
            return Err(DeviceError::SlotNotAllocated(control));
        }
        if !slots.contains_key(&target) {
            return Err(DeviceError::SlotNotAllocated(target));
        }
        Ok(())
    }

    fn measure(&self, phys_id: u32) -> Result<u8, DeviceError> {
        if !self.slots.lock().contains_key(&phys_id) {
            return Err(DeviceError::SlotNotAllocated(phys_id));
        }
        Ok(self.fixed_outcomes.lock().get(&phys_id).copied().unwrap_or(0))
    }

    fn receive_entangled_qubit(&self, phys_id: u32, correlated_outcome: u8) -> Result<(), DeviceError> {
        if !self.slots.lock().contains_key(&phys_id) {
            return Err(DeviceError::SlotNotAllocated(phys_id));
        }
        self.fixed_outcomes.lock().insert(phys_id, correlated_outcome);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_free_slot() {
        let dev = InMemoryQDevice::new(2, 2);
        dev.allocate_slot(0).unwrap();
        assert_eq!(dev.allocate_slot(0), Err(DeviceError::SlotOccupied(0)));
        dev.free_slot(0).unwrap();
        dev.allocate_slot(0).unwrap();
    }

    #[test]
    fn test_entangled_pair_measures_correlated() {
        let alice_dev = InMemoryQDevice::new(1, 0);
        let bob_dev = InMemoryQDevice::new(1, 0);
        alice_dev.allocate_slot(0).unwrap();
        bob_dev.allocate_slot(0).unwrap();
        alice_dev.receive_entangled_qubit(0, 1).unwrap();
        bob_dev.receive_entangled_qubit(0, 1).unwrap();
        assert_eq!(alice_dev.measure(0).unwrap(), bob_dev.measure(0).unwrap());
    }

    #[test]
    fn test_capability_split() {
        let dev = InMemoryQDevice::new(1, 1);
        assert_eq!(dev.capability(0), Some(QubitCapability::Communication));
        assert_eq!(dev.capability(1), Some(QubitCapability::MemoryOnly));
    }
}
