// =============================================================================
// Qoala Node Runtime - Device & Memory Errors
// =============================================================================
// Table of Contents:
//   1. DeviceError - QDevice-level failures
//   2. MemoryError - Virtual-qubit memory manager failures
//   3. SharedMemError - Shared-memory region failures
// =============================================================================
// Purpose: Per-concern `thiserror` enums, following the teacher's split
//          (`CircuitError`/`ExecutionError`/`MeasurementError`/`BackendError`)
//          rather than one flat global error.
// =============================================================================

use thiserror::Error;

// =============================================================================
// 1. DeviceError - QDevice-level failures
// =============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error("physical qubit slot {0} is already occupied")]
    SlotOccupied(u32),
    #[error("physical qubit slot {0} is not allocated")]
    SlotNotAllocated(u32),
    #[error("no physical slot satisfies the requested qubit capability")]
    NoMatchingCapability,
}

// =============================================================================
// 2. MemoryError - Virtual-qubit memory manager failures
// =============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MemoryError {
    #[error("no free physical qubit slot satisfies the requested capability")]
    OutOfQubits,
    #[error("process {0} is not registered with the memory manager")]
    UnknownProcess(u64),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

// =============================================================================
// 3. SharedMemError - Shared-memory region failures
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SharedMemError {
    #[error("address {0:?} was never allocated")]
    NotAllocated(crate::shared_mem::MemAddr),
    #[error("address {0:?} was allocated for a different region kind")]
    IllegalRegion(crate::shared_mem::MemAddr),
    #[error("offset+length exceeds the region's allocated size")]
    OutOfBounds,
}
