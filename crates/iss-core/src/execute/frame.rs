//! Per-iteration execution context handed to instruction handlers.

use crate::api::{HostAction, HostBridge, Xlen};
use crate::encoding::InstructionWord;
use crate::fault::Trap;
use crate::fpu::FloatUnit;
use crate::memory::AccessWidth;
use crate::numeric::sign_extend;
use crate::state::MachineState;

/// Everything one handler invocation may read or mutate.
///
/// Handlers compute the next program counter explicitly through
/// [`ExecContext::advance`] or [`ExecContext::jump`]; nothing advances it
/// implicitly. Fallible reads should happen before the first architectural
/// write so that a trap leaves no partial update behind.
pub struct ExecContext<'a> {
    /// Session state.
    pub machine: &'a mut MachineState,
    /// Host environment bridge.
    pub host: &'a mut dyn HostBridge,
    /// Floating-point capability.
    pub fpu: &'a dyn FloatUnit,
    pc: u64,
    word: InstructionWord,
}

impl<'a> ExecContext<'a> {
    /// Context for the instruction `word` fetched at `pc`.
    pub fn new(
        machine: &'a mut MachineState,
        host: &'a mut dyn HostBridge,
        fpu: &'a dyn FloatUnit,
        pc: u64,
        word: InstructionWord,
    ) -> Self {
        Self {
            machine,
            host,
            fpu,
            pc,
            word,
        }
    }

    /// Address of the executing instruction.
    #[must_use]
    pub const fn pc(&self) -> u64 {
        self.pc
    }

    /// The executing instruction.
    #[must_use]
    pub const fn word(&self) -> InstructionWord {
        self.word
    }

    /// Native integer width.
    #[must_use]
    pub const fn xlen(&self) -> Xlen {
        self.machine.xlen
    }

    /// Address of the next sequential instruction.
    #[must_use]
    pub fn fallthrough(&self) -> u64 {
        self.pc.wrapping_add(self.word.byte_len()) & self.xlen().mask()
    }

    /// Continues with the next sequential instruction.
    pub fn advance(&mut self) {
        self.machine.pc = self.fallthrough();
    }

    /// Continues at `target`.
    pub fn jump(&mut self, target: u64) {
        self.machine.pc = target & self.xlen().mask();
    }

    /// Unsigned value of integer register `index`.
    ///
    /// # Errors
    ///
    /// Returns an `OutOfRange` trap for an invalid index.
    pub fn x(&self, index: usize) -> Result<u64, Trap> {
        Ok(self.machine.regs.read(index)? & self.xlen().mask())
    }

    /// Signed value of integer register `index`.
    ///
    /// # Errors
    ///
    /// Returns an `OutOfRange` trap for an invalid index.
    pub fn sx(&self, index: usize) -> Result<i64, Trap> {
        Ok(sign_extend(self.x(index)?, self.xlen().bits()))
    }

    /// Writes integer register `index`, truncated to the native width.
    ///
    /// # Errors
    ///
    /// Returns an `OutOfRange` trap for an invalid index.
    pub fn set_x(&mut self, index: usize, value: u64) -> Result<(), Trap> {
        let mask = self.xlen().mask();
        self.machine.regs.write(index, value & mask)
    }

    /// Raw bits of floating-point register `index`.
    ///
    /// # Errors
    ///
    /// Returns an `OutOfRange` trap for an invalid index.
    pub fn f(&self, index: usize) -> Result<u64, Trap> {
        self.machine.fregs.read(index)
    }

    /// Writes raw bits to floating-point register `index`.
    ///
    /// # Errors
    ///
    /// Returns an `OutOfRange` trap for an invalid index.
    pub fn set_f(&mut self, index: usize, bits: u64) -> Result<(), Trap> {
        self.machine.fregs.write(index, bits)
    }

    /// Reads memory through the translation cache model.
    ///
    /// # Errors
    ///
    /// Returns an `OutOfBounds` trap when the access exceeds memory.
    pub fn load(&mut self, addr: u64, width: AccessWidth) -> Result<u64, Trap> {
        let addr = addr & self.xlen().mask();
        if let Some(tlb) = self.machine.tlb.as_mut() {
            tlb.lookup(addr);
        }
        self.machine.memory.read(addr, width)
    }

    /// Writes memory through the translation cache model.
    ///
    /// # Errors
    ///
    /// Returns an `OutOfBounds` trap when the access exceeds memory.
    pub fn store(&mut self, addr: u64, width: AccessWidth, value: u64) -> Result<(), Trap> {
        let addr = addr & self.xlen().mask();
        if let Some(tlb) = self.machine.tlb.as_mut() {
            tlb.lookup(addr);
        }
        self.machine.memory.write(addr, width, value)
    }

    /// Hands a system call to the host and halts if it asks to.
    ///
    /// # Errors
    ///
    /// Propagates the host's trap.
    pub fn syscall(&mut self) -> Result<HostAction, Trap> {
        let action = self.host.syscall(self.machine)?;
        if action == HostAction::Halt {
            self.machine.halt();
        }
        Ok(action)
    }

    /// Hands a breakpoint to the host and halts if it asks to.
    ///
    /// # Errors
    ///
    /// Propagates the host's trap.
    pub fn breakpoint(&mut self) -> Result<HostAction, Trap> {
        let action = self.host.breakpoint(self.machine)?;
        if action == HostAction::Halt {
            self.machine.halt();
        }
        Ok(action)
    }

    /// Stops the loop after this instruction.
    pub fn halt(&mut self) {
        self.machine.halt();
    }

    /// Trap for the executing word, used when a handler rejects operands.
    #[must_use]
    pub const fn illegal(&self) -> Trap {
        Trap::illegal(self.word.bits(), self.word.width())
    }
}

#[cfg(test)]
mod tests {
    use super::ExecContext;
    use crate::api::{HaltingHost, MachineConfig, Xlen};
    use crate::encoding::{InstrWidth, InstructionWord};
    use crate::fpu::HostFloat;
    use crate::memory::AccessWidth;
    use crate::state::{MachineState, RegisterFileConfig};
    use crate::tlb::{EvictionPolicy, TlbConfig};

    fn machine(xlen: Xlen) -> MachineState {
        MachineState::new(&MachineConfig {
            xlen,
            registers: RegisterFileConfig::with_zero(32, 64),
            float_registers: 32,
            tlb: Some(TlbConfig {
                capacity: 2,
                page_size: 16,
                policy: EvictionPolicy::Lru,
            }),
            ..MachineConfig::default()
        })
        .expect("valid config")
    }

    #[test]
    fn register_writes_are_truncated_to_xlen() {
        let mut machine = machine(Xlen::Bits32);
        let mut host = HaltingHost::new(10);
        let word = InstructionWord::new(0x13, InstrWidth::W32);
        let mut ctx = ExecContext::new(&mut machine, &mut host, &HostFloat, 0x10, word);
        ctx.set_x(1, 0xFFFF_FFFF_8000_0000).expect("x1");
        assert_eq!(ctx.x(1), Ok(0x8000_0000));
        assert_eq!(ctx.sx(1), Ok(-2_147_483_648));
        ctx.advance();
        assert_eq!(machine.pc, 0x14);
    }

    #[test]
    fn jump_wraps_to_xlen() {
        let mut machine = machine(Xlen::Bits32);
        let mut host = HaltingHost::new(10);
        let word = InstructionWord::new(0x0001, InstrWidth::W16);
        let mut ctx = ExecContext::new(&mut machine, &mut host, &HostFloat, 0xFFFF_FFFE, word);
        assert_eq!(ctx.fallthrough(), 0);
        ctx.jump(0x1_0000_0040);
        assert_eq!(machine.pc, 0x40);
    }

    #[test]
    fn memory_accesses_consult_the_translation_cache() {
        let mut machine = machine(Xlen::Bits64);
        let mut host = HaltingHost::new(10);
        let word = InstructionWord::new(0x13, InstrWidth::W32);
        let mut ctx = ExecContext::new(&mut machine, &mut host, &HostFloat, 0, word);
        ctx.store(0x100, AccessWidth::Word, 7).expect("in bounds");
        assert_eq!(ctx.load(0x104, AccessWidth::Word), Ok(0));
        assert_eq!(ctx.load(0x100, AccessWidth::Word), Ok(7));
        let stats = machine.tlb.as_ref().expect("configured").stats();
        assert_eq!((stats.hits, stats.misses), (2, 1));
    }

    #[test]
    fn syscall_through_halting_host_stops_the_machine() {
        let mut machine = machine(Xlen::Bits32);
        let mut host = HaltingHost::new(10);
        let word = InstructionWord::new(0x73, InstrWidth::W32);
        let mut ctx = ExecContext::new(&mut machine, &mut host, &HostFloat, 0, word);
        ctx.set_x(10, 3).expect("a0");
        ctx.syscall().expect("serviced");
        assert!(!machine.is_running());
        assert_eq!(host.exit_code(), Some(3));
    }
}
