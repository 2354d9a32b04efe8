//! Host-facing configuration, bridge traits and loop outcome types.

use thiserror::Error;

use crate::fault::Trap;
use crate::memory::Endianness;
use crate::state::{CsrDecl, MachineState, RegisterFileConfig};
use crate::tlb::TlbConfig;

/// Default simulated memory size in bytes.
pub const DEFAULT_MEMORY_BYTES: usize = 64 * 1024;

/// Native integer width of the simulated machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Xlen {
    /// 32-bit registers and addresses.
    #[default]
    Bits32,
    /// 64-bit registers and addresses.
    Bits64,
}

impl Xlen {
    /// Register width in bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Bits32 => 32,
            Self::Bits64 => 64,
        }
    }

    /// Mask applied to register values and addresses.
    #[must_use]
    pub const fn mask(self) -> u64 {
        match self {
            Self::Bits32 => 0xFFFF_FFFF,
            Self::Bits64 => u64::MAX,
        }
    }
}

/// Immutable configuration for one simulation session.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MachineConfig {
    /// Native integer width.
    pub xlen: Xlen,
    /// Integer register file shape.
    pub registers: RegisterFileConfig,
    /// Number of 64-bit floating-point registers (zero when absent).
    pub float_registers: usize,
    /// Memory capacity in bytes.
    pub memory_bytes: usize,
    /// Byte order of every memory access.
    pub endianness: Endianness,
    /// Program counter after reset.
    pub reset_pc: u64,
    /// Architecture-specific control/status registers.
    pub csrs: Vec<CsrDecl>,
    /// Translation cache model; `None` disables lookups.
    pub tlb: Option<TlbConfig>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            xlen: Xlen::Bits32,
            registers: RegisterFileConfig::with_zero(32, 32),
            float_registers: 0,
            memory_bytes: DEFAULT_MEMORY_BYTES,
            endianness: Endianness::Little,
            reset_pc: 0,
            csrs: Vec::new(),
            tlb: None,
        }
    }
}

impl MachineConfig {
    /// Checks internal consistency.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let regs = self.registers;
        if regs.count == 0 {
            return Err(ConfigError::EmptyRegisterFile);
        }
        if regs.width != 32 && regs.width != 64 {
            return Err(ConfigError::UnsupportedRegisterWidth(regs.width));
        }
        if regs.width < self.xlen.bits() {
            return Err(ConfigError::RegistersNarrowerThanXlen {
                width: regs.width,
                xlen: self.xlen.bits(),
            });
        }
        if let Some(index) = regs.zero_register {
            if index >= regs.count {
                return Err(ConfigError::ZeroRegisterOutOfRange {
                    index,
                    count: regs.count,
                });
            }
        }
        if self.memory_bytes == 0 {
            return Err(ConfigError::ZeroMemory);
        }
        let in_memory = usize::try_from(self.reset_pc).is_ok_and(|pc| pc < self.memory_bytes);
        if !in_memory {
            return Err(ConfigError::ResetPcOutOfBounds {
                pc: self.reset_pc,
                capacity: self.memory_bytes,
            });
        }
        if let Some(tlb) = &self.tlb {
            tlb.validate()?;
        }
        Ok(())
    }
}

/// Session configuration rejected before any state is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ConfigError {
    /// Translation cache with no entries.
    #[error("tlb capacity must be at least one entry")]
    ZeroTlbCapacity,
    /// Page size outside the supported set.
    #[error("unsupported tlb page size {0}; expected 8, 16, 32, 64 or 128")]
    UnsupportedPageSize(u64),
    /// Register file with no slots.
    #[error("register file needs at least one slot")]
    EmptyRegisterFile,
    /// Register slot width other than 32 or 64 bits.
    #[error("register width {0} is not 32 or 64 bits")]
    UnsupportedRegisterWidth(u32),
    /// Register slots cannot hold a full machine word.
    #[error("{width}-bit registers cannot hold {xlen}-bit values")]
    RegistersNarrowerThanXlen {
        /// Configured slot width.
        width: u32,
        /// Configured machine width.
        xlen: u32,
    },
    /// Zero register index outside the register file.
    #[error("zero register {index} is outside the {count}-slot register file")]
    ZeroRegisterOutOfRange {
        /// Configured zero slot.
        index: usize,
        /// Configured slot count.
        count: usize,
    },
    /// Memory with no bytes.
    #[error("memory capacity must be non-zero")]
    ZeroMemory,
    /// Reset vector outside memory.
    #[error("reset pc {pc:#x} lies outside {capacity}-byte memory")]
    ResetPcOutOfBounds {
        /// Configured reset pc.
        pc: u64,
        /// Configured memory capacity.
        capacity: usize,
    },
}

/// What the loop does after the host serviced an environment call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostAction {
    /// Continue with the next instruction.
    Resume,
    /// Stop the loop in the `Halted` state.
    Halt,
}

/// Bridge to the host environment for system calls and breakpoints.
///
/// The bridge sees the whole machine so it can read arguments and write results
/// using the target's calling convention. Returning an error traps the loop.
pub trait HostBridge {
    /// Services a system-call instruction.
    ///
    /// # Errors
    ///
    /// Returns a trap when the request cannot be serviced.
    fn syscall(&mut self, machine: &mut MachineState) -> Result<HostAction, Trap>;

    /// Services a breakpoint instruction. Halts by default.
    ///
    /// # Errors
    ///
    /// Returns a trap when the breakpoint cannot be serviced.
    fn breakpoint(&mut self, machine: &mut MachineState) -> Result<HostAction, Trap> {
        let _ = machine;
        Ok(HostAction::Halt)
    }
}

/// Minimal bridge: every system call halts and records an exit value register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HaltingHost {
    exit_register: usize,
    exit_code: Option<u64>,
    syscalls: u64,
}

impl HaltingHost {
    /// Records `exit_register` when a system call halts the machine.
    #[must_use]
    pub const fn new(exit_register: usize) -> Self {
        Self {
            exit_register,
            exit_code: None,
            syscalls: 0,
        }
    }

    /// Value of the exit register at the last system call.
    #[must_use]
    pub const fn exit_code(&self) -> Option<u64> {
        self.exit_code
    }

    /// Number of system calls serviced.
    #[must_use]
    pub const fn syscalls(&self) -> u64 {
        self.syscalls
    }
}

impl HostBridge for HaltingHost {
    fn syscall(&mut self, machine: &mut MachineState) -> Result<HostAction, Trap> {
        self.syscalls += 1;
        self.exit_code = Some(machine.regs.read(self.exit_register)?);
        Ok(HostAction::Halt)
    }
}

/// Result of one loop iteration that did not trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepOutcome {
    /// One instruction executed.
    Retired {
        /// Address of the executed instruction.
        pc: u64,
        /// Its mnemonic.
        mnemonic: &'static str,
    },
    /// Machine was already halted; nothing executed.
    Halted,
    /// Program counter reached the end of the loaded instruction stream.
    EndOfStream,
}

/// Why a run stopped without trapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// A handler or the host bridge cleared the running flag.
    Halted,
    /// Program counter reached the end of the loaded instruction stream.
    EndOfStream,
}

/// Aggregated outcome of running until the machine stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunOutcome {
    /// Instructions executed by this call.
    pub steps: u64,
    /// Stop condition observed.
    pub reason: StopReason,
}
