//! Architectural state of a simulation session.

/// Control/status register file.
pub mod csr;
/// Per-session machine state.
pub mod machine;
/// Register file storage.
pub mod registers;
/// Loop run-state machine.
pub mod run_state;

pub use csr::{CsrDecl, CsrFile};
pub use machine::MachineState;
pub use registers::{RegisterFile, RegisterFileConfig};
pub use run_state::RunState;
