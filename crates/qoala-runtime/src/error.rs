// =============================================================================
// Qoala Node Runtime - Runtime Errors
// =============================================================================
// Table of Contents:
//   1. RuntimeError - Umbrella error for process execution
// =============================================================================
// Purpose: Every kind Host/Qnos/Netstack/Scheduler can produce, bridged into
//          one per-crate umbrella by `#[from]` where the source is itself a
//          thiserror enum, following the teacher's `QuantumRuntimeError`
//          wrapping `CircuitError`/`ExecutionError`/`MeasurementError`/
//          `BackendError`.
// =============================================================================

use qoala_device::error::{DeviceError, MemoryError, SharedMemError};
use qoala_entdist::error::EntDistError;
use thiserror::Error;

// =============================================================================
// 1. RuntimeError - Umbrella error for process execution
// =============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("template argument '{0}' was not provided")]
    RoutineArgMismatch(String),
    #[error("unknown local routine '{0}'")]
    UnknownRoutine(String),
    #[error("unknown request routine '{0}'")]
    UnknownRequest(String),
    #[error("receive timed out")]
    Timeout,
    #[error("entdist could not pair the request within its timeslot")]
    NoMatch,
    #[error("no peer configured for socket {0}")]
    UnknownPeer(u32),
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    SharedMem(#[from] SharedMemError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("invariant violation: {0}")]
    Fatal(String),
}

/// `EntDistError` carries its own `Timeout`/`NoMatch` split; translate rather
/// than derive `#[from]` so the distinct EntDist timeout doesn't collide with
/// a receive timeout raised elsewhere.
impl From<EntDistError> for RuntimeError {
    fn from(err: EntDistError) -> Self {
        match err {
            EntDistError::Timeout => RuntimeError::Timeout,
            EntDistError::NoMatch => RuntimeError::NoMatch,
        }
    }
}
