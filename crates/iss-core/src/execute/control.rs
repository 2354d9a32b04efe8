//! Control-invariant half of the dispatch loop.
//!
//! Nothing here changes while a session runs: the matcher and the float unit
//! are fixed when the engine is built. Fetch and dispatch read machine state
//! but never write architectural state.

use crate::decoder::{Matcher, Resolved, TableId};
use crate::encoding::InstructionWord;
use crate::fault::Trap;
use crate::fpu::FloatUnit;
use crate::memory::AccessWidth;
use crate::state::MachineState;

use super::backend::LoopBackend;
use super::Handler;

/// A resolved dispatch decision.
pub type Dispatch = Resolved<Handler>;

/// Identity of a merge point: which table decodes it, where the loop is and
/// what it fetched there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchKey {
    /// Decode table the word is resolved against.
    pub table: TableId,
    /// Program counter of the instruction.
    pub pc: u64,
    /// Instruction fetched at `pc` in this iteration.
    pub word: InstructionWord,
}

/// References shared by every iteration of a run.
#[derive(Clone, Copy)]
pub struct LoopControl<'e> {
    matcher: &'e Matcher<Handler>,
    fpu: &'e dyn FloatUnit,
}

impl<'e> LoopControl<'e> {
    /// Binds the matcher and float unit for a run.
    #[must_use]
    pub const fn new(matcher: &'e Matcher<Handler>, fpu: &'e dyn FloatUnit) -> Self {
        Self { matcher, fpu }
    }

    /// Identity of the bound decode table.
    #[must_use]
    pub const fn table(&self) -> TableId {
        self.matcher.id()
    }

    /// Float unit handed to handlers.
    #[must_use]
    pub const fn fpu(&self) -> &'e dyn FloatUnit {
        self.fpu
    }

    /// Fetches the instruction at `machine.pc`: first the parcel, then, once the
    /// width class is known, the full word.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` when either fetch exceeds memory and
    /// `IllegalInstruction` when no width rule accepts the parcel.
    pub fn fetch(&self, machine: &mut MachineState) -> Result<InstructionWord, Trap> {
        let pc = machine.pc;
        if let Some(tlb) = machine.tlb.as_mut() {
            tlb.lookup(pc);
        }
        let parcel_width = self.matcher.parcel();
        let parcel = machine.memory.read(pc, access_width(parcel_width.bytes()))?;
        let width = self
            .matcher
            .width_class(parcel)
            .ok_or_else(|| Trap::illegal(parcel, parcel_width))?;
        if width == parcel_width {
            return Ok(InstructionWord::new(parcel, width));
        }
        let bits = machine.memory.read(pc, access_width(width.bytes()))?;
        Ok(InstructionWord::new(bits, width))
    }

    /// Dispatch decision for `key`: the backend's specialisation if it has
    /// one, otherwise the matcher's, which the backend then observes.
    ///
    /// # Errors
    ///
    /// Returns `IllegalInstruction` when no entry matches the word.
    pub fn dispatch(
        &self,
        key: DispatchKey,
        backend: &mut dyn LoopBackend,
    ) -> Result<Dispatch, Trap> {
        if let Some(dispatch) = backend.specialized(key) {
            return Ok(dispatch);
        }
        let dispatch = self
            .matcher
            .resolve(key.word)
            .ok_or_else(|| Trap::illegal(key.word.bits(), key.word.width()))?;
        backend.observe(key, dispatch);
        Ok(dispatch)
    }
}

const fn access_width(bytes: usize) -> AccessWidth {
    match bytes {
        2 => AccessWidth::Half,
        4 => AccessWidth::Word,
        _ => AccessWidth::Double,
    }
}
