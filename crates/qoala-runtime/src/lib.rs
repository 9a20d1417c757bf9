// =============================================================================
// Qoala Node Runtime - Execution Substrate Crate
// =============================================================================
// Table of Contents:
//   1. Module Declarations
//   2. Re-exports
//   3. Prelude Module
// =============================================================================
// Purpose: The per-process Host/Qnos/Netstack processors, the CPU/QPU drivers
//          that drive a process's task graph, and the per-node Scheduler that
//          ties submission, task-graph installation, and execution together.
// =============================================================================

pub mod driver;
pub mod error;
pub mod host;
pub mod netstack;
pub mod process;
pub mod qnos;
pub mod scheduler;
pub mod socket;
pub mod task;
pub mod template;

pub mod prelude {
    pub use crate::driver::*;
    pub use crate::error::*;
    pub use crate::host::*;
    pub use crate::netstack::*;
    pub use crate::process::*;
    pub use crate::qnos::*;
    pub use crate::scheduler::*;
    pub use crate::socket::*;
    pub use crate::task::*;
    pub use crate::template::*;
}
