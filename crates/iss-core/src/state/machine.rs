use tracing::debug;

use crate::api::{ConfigError, MachineConfig, Xlen};
use crate::fault::TrapEvent;
use crate::memory::Memory;
use crate::tlb::Tlb;

use super::{CsrFile, RegisterFile, RegisterFileConfig, RunState};

/// Complete architectural state of one simulation session.
///
/// Owned by exactly one session; handlers mutate it through the execution
/// context and nothing else writes to it during a run.
#[derive(Debug, Clone)]
pub struct MachineState {
    /// Native integer width.
    pub xlen: Xlen,
    /// Address of the next instruction to fetch.
    pub pc: u64,
    /// Integer register file.
    pub regs: RegisterFile,
    /// Floating-point register file (64-bit slots; empty when absent).
    pub fregs: RegisterFile,
    /// Control/status registers.
    pub csrs: CsrFile,
    /// Byte-addressable memory.
    pub memory: Memory,
    /// Translation cache model, if configured.
    pub tlb: Option<Tlb>,
    /// Loop state.
    pub run_state: RunState,
    /// One past the last byte of the loaded instruction stream.
    pub stream_end: Option<u64>,
    /// Address reserved by a load-reserved instruction.
    pub reservation: Option<u64>,
    retired: u64,
}

impl MachineState {
    /// Allocates state for a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] reported by
    /// [`MachineConfig::validate`].
    pub fn new(config: &MachineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let tlb = config.tlb.map(Tlb::new).transpose()?;
        Ok(Self {
            xlen: config.xlen,
            pc: config.reset_pc,
            regs: RegisterFile::new(config.registers),
            fregs: RegisterFile::new(RegisterFileConfig::plain(config.float_registers, 64)),
            csrs: CsrFile::from_decls(&config.csrs),
            memory: Memory::new(config.memory_bytes, config.endianness),
            tlb,
            run_state: RunState::Running,
            stream_end: None,
            reservation: None,
            retired: 0,
        })
    }

    /// Copies a program image to `addr`, points the pc at it and marks the end
    /// of the instruction stream.
    ///
    /// # Errors
    ///
    /// Returns an `OutOfBounds` trap when the image does not fit in memory.
    pub fn load_program(&mut self, addr: u64, image: &[u8]) -> Result<(), crate::fault::Trap> {
        self.memory.load(addr, image)?;
        self.pc = addr;
        self.stream_end = Some(addr + image.len() as u64);
        Ok(())
    }

    /// Returns true while the loop may dispatch.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.run_state.is_running()
    }

    /// Clears the running flag.
    pub fn halt(&mut self) {
        if self.run_state.is_running() {
            self.run_state = RunState::Halted;
        }
    }

    /// Trap latched by the last run, if any.
    #[must_use]
    pub const fn latched_trap(&self) -> Option<TrapEvent> {
        self.run_state.latched_trap()
    }

    /// Halts and latches `event`; an already latched trap is kept.
    pub fn latch(&mut self, event: TrapEvent) {
        if self.run_state.latched_trap().is_none() {
            debug!(kind = %event.kind, pc = event.pc, "trap latched");
            self.run_state = RunState::Trapped(event);
        }
    }

    /// Resumes a halted session without touching architectural state.
    ///
    /// A latched trap is final: the session stays trapped and only a freshly
    /// allocated [`MachineState`] runs again.
    pub fn resume(&mut self) {
        if self.run_state == RunState::Halted {
            self.run_state = RunState::Running;
        }
    }

    /// Instructions executed since allocation.
    #[must_use]
    pub const fn retired(&self) -> u64 {
        self.retired
    }

    pub(crate) fn retire(&mut self) {
        self.retired = self.retired.wrapping_add(1);
    }

    /// Returns true when `pc` has reached the end of the loaded stream.
    #[must_use]
    pub fn at_stream_end(&self) -> bool {
        self.stream_end.is_some_and(|end| self.pc >= end)
    }
}
