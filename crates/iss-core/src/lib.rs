//! Retargetable instruction-set simulator core.
//!
//! An ISA is described as data: a table of bit patterns, each bound to a
//! semantic handler, plus a width selector for variable-length streams. The
//! [`Engine`] builds a [`Matcher`] from that table once and then drives any
//! number of [`MachineState`] sessions through the fetch/decode/dispatch loop.
//!
//! ```
//! use iss_core::isa::riscv::{self, Extensions};
//! use iss_core::{Engine, HaltingHost, Interpreter, MachineState, StopReason, Xlen};
//!
//! let engine = Engine::new(&riscv::isa(Xlen::Bits32, Extensions::NONE)).unwrap();
//! let mut machine =
//!     MachineState::new(&riscv::machine_config(Xlen::Bits32, Extensions::NONE)).unwrap();
//! // addi a0, zero, 7 ; ecall
//! let program = [0x0070_0513u32, 0x0000_0073];
//! let image: Vec<u8> = program.iter().flat_map(|w| w.to_le_bytes()).collect();
//! machine.load_program(0, &image).unwrap();
//!
//! let mut host = HaltingHost::new(riscv::EXIT_REGISTER);
//! let outcome = engine.run(&mut machine, &mut host, &mut Interpreter).unwrap();
//! assert_eq!(outcome.reason, StopReason::Halted);
//! assert_eq!(host.exit_code(), Some(7));
//! ```

/// Public host-facing API contract and session types.
pub mod api;
pub use api::{
    ConfigError, HaltingHost, HostAction, HostBridge, MachineConfig, RunOutcome, StepOutcome,
    StopReason, Xlen, DEFAULT_MEMORY_BYTES,
};

/// Bit-pattern matcher.
pub mod decoder;
pub use decoder::{Matcher, Resolved, TableId};

/// Disassembly listings.
pub mod disasm;
pub use disasm::{disassemble, DisassemblyRow};

/// Instruction words, bit patterns and decode entries.
pub mod encoding;
pub use encoding::{BitPattern, DecodeEntry, InstrWidth, InstructionWord, WidthRule, WidthSelector};

/// Decode-dispatch-execute loop.
pub mod execute;
pub use execute::{
    Dispatch, DispatchKey, Engine, ExecContext, Handler, HotPathCache, Interpreter, LoopBackend,
    LoopControl, DEFAULT_HOT_PATH_CAPACITY,
};

/// Trap taxonomy and table build errors.
pub mod fault;
pub use fault::{BuildError, Trap, TrapDetail, TrapEvent, TrapKind};

/// Floating-point capability.
pub mod fpu;
pub use fpu::{FloatUnit, FpFlags, HostFloat, RoundingMode};

/// Instruction-set tables.
pub mod isa;
pub use isa::Isa;

/// Byte-addressable memory.
pub mod memory;
pub use memory::{AccessWidth, Endianness, Memory};

/// Fixed-width integer helpers.
pub mod numeric;

/// Architectural state of a session.
pub mod state;
pub use state::{CsrDecl, CsrFile, MachineState, RegisterFile, RegisterFileConfig, RunState};

/// Address translation cache model.
pub mod tlb;
pub use tlb::{EvictionPolicy, PageSize, Tlb, TlbConfig, TlbEntry, TlbLookup, TlbStats};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
