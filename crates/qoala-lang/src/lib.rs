// =============================================================================
// Qoala Node Runtime - Language Crate
// =============================================================================
// Table of Contents:
//   1. Module Declarations
//   2. Re-exports
//   3. Prelude Module
// =============================================================================
// Purpose: The program data model (basic blocks, local/request routines) and
//          the program-text parser/printer described by the external
//          interface. Everything here is pure data plus pure functions: no
//          I/O, no clock, no device access.
// =============================================================================

pub mod error;
pub mod netqasm;
pub mod parser;
pub mod printer;
pub mod program;
pub mod value;

pub mod prelude {
    pub use crate::error::*;
    pub use crate::netqasm::*;
    pub use crate::program::*;
    pub use crate::value::*;
}
