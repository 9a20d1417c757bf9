// =============================================================================
// Qoala Node Runtime - Simulation Wiring Crate
// =============================================================================
// Table of Contents:
//   1. Module Declarations
//   2. init_tracing - Ambient logging for demos and tests
//   3. Prelude Module
// =============================================================================
// Purpose: Wires one or more `qoala_runtime::scheduler::Scheduler`-backed
//          `Node`s to a shared `qoala_entdist::entdist::EntDist` so
//          integration tests and demos can run a full program across two or
//          more nodes without hand-rolling the network plumbing each time.
// =============================================================================

pub mod hub;
pub mod network;
pub mod node;

pub mod prelude {
    pub use crate::network::*;
    pub use crate::node::*;
}

/// Installs a `tracing-subscriber` fmt layer. Safe to call more than once
/// (e.g. once per test in a shared test binary); only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
