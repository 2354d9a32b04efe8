//! Decode-dispatch-execute loop.
//!
//! One iteration:
//! 1. Fetch the first parcel at the program counter.
//! 2. Classify its width and fetch the full word.
//! 3. Offer the `(pc, word)` merge point to the loop backend, falling back to
//!    the matcher.
//! 4. Invoke the handler, which updates state and sets the next pc.
//!
//! Any trap halts the session, is latched on the machine and is returned with
//! the pc of the instruction that raised it.

/// Loop backends (optimizer hook).
pub mod backend;
/// Control-invariant loop state.
pub mod control;
/// Per-iteration handler context.
pub mod frame;

use tracing::{debug, info, trace};

pub use backend::{HotPathCache, Interpreter, LoopBackend, DEFAULT_HOT_PATH_CAPACITY};
pub use control::{Dispatch, DispatchKey, LoopControl};
pub use frame::ExecContext;

use crate::api::{HostBridge, RunOutcome, StepOutcome, StopReason};
use crate::decoder::Matcher;
use crate::encoding::InstructionWord;
use crate::fault::{BuildError, Trap, TrapEvent};
use crate::fpu::{FloatUnit, HostFloat};
use crate::isa::Isa;
use crate::state::{MachineState, RunState};

/// Semantic action bound to a decode entry.
pub type Handler = fn(&mut ExecContext<'_>, InstructionWord) -> Result<(), Trap>;

/// Immutable simulator for one ISA; sessions share it by reference.
pub struct Engine {
    name: &'static str,
    register_names: &'static [&'static str],
    matcher: Matcher<Handler>,
    fpu: Box<dyn FloatUnit + Send + Sync>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("name", &self.name)
            .field("entries", &self.matcher.len())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Builds the matcher for `isa` with host floating point.
    ///
    /// # Errors
    ///
    /// Returns the table's [`BuildError`].
    pub fn new(isa: &Isa) -> Result<Self, BuildError> {
        Self::with_float_unit(isa, Box::new(HostFloat))
    }

    /// Builds the matcher for `isa` with a caller-supplied float unit.
    ///
    /// # Errors
    ///
    /// Returns the table's [`BuildError`].
    pub fn with_float_unit(
        isa: &Isa,
        fpu: Box<dyn FloatUnit + Send + Sync>,
    ) -> Result<Self, BuildError> {
        let matcher = Matcher::build(&isa.entries, isa.widths.clone())?;
        debug!(isa = isa.name, entries = matcher.len(), "decode table built");
        Ok(Self {
            name: isa.name,
            register_names: isa.register_names,
            matcher,
            fpu,
        })
    }

    /// ISA name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Assembly names of the integer registers.
    #[must_use]
    pub const fn register_names(&self) -> &'static [&'static str] {
        self.register_names
    }

    /// The built matcher.
    #[must_use]
    pub const fn matcher(&self) -> &Matcher<Handler> {
        &self.matcher
    }

    /// Control-invariant references for a run.
    #[must_use]
    pub fn control(&self) -> LoopControl<'_> {
        LoopControl::new(&self.matcher, self.fpu.as_ref())
    }

    /// Executes at most one instruction.
    ///
    /// # Errors
    ///
    /// Returns the trap raised by fetch, decode or the handler, or the trap
    /// latched by an earlier step.
    pub fn step(
        &self,
        machine: &mut MachineState,
        host: &mut dyn HostBridge,
        backend: &mut dyn LoopBackend,
    ) -> Result<StepOutcome, TrapEvent> {
        iterate(self.control(), machine, host, backend)
    }

    /// Steps until the machine halts, traps or leaves the loaded stream.
    ///
    /// There is no step limit; callers that need one drive [`Engine::step`].
    ///
    /// # Errors
    ///
    /// Returns the first trap.
    pub fn run(
        &self,
        machine: &mut MachineState,
        host: &mut dyn HostBridge,
        backend: &mut dyn LoopBackend,
    ) -> Result<RunOutcome, TrapEvent> {
        let control = self.control();
        let mut steps = 0u64;
        loop {
            let reason = match iterate(control, machine, host, backend)? {
                StepOutcome::Retired { .. } => {
                    steps += 1;
                    continue;
                }
                StepOutcome::Halted => StopReason::Halted,
                StepOutcome::EndOfStream => StopReason::EndOfStream,
            };
            info!(isa = self.name, steps, ?reason, pc = machine.pc, "run stopped");
            return Ok(RunOutcome { steps, reason });
        }
    }
}

fn iterate(
    control: LoopControl<'_>,
    machine: &mut MachineState,
    host: &mut dyn HostBridge,
    backend: &mut dyn LoopBackend,
) -> Result<StepOutcome, TrapEvent> {
    match machine.run_state {
        RunState::Trapped(event) => return Err(event),
        RunState::Halted => return Ok(StepOutcome::Halted),
        RunState::Running => {}
    }
    if machine.at_stream_end() {
        return Ok(StepOutcome::EndOfStream);
    }

    let pc = machine.pc;
    let result = control.fetch(machine).and_then(|word| {
        let key = DispatchKey {
            table: control.table(),
            pc,
            word,
        };
        let dispatch = control.dispatch(key, backend)?;
        trace!(pc, mnemonic = dispatch.mnemonic, bits = word.bits(), "dispatch");
        let mut ctx = ExecContext::new(machine, host, control.fpu(), pc, word);
        (dispatch.handler)(&mut ctx, word)?;
        Ok(dispatch.mnemonic)
    });

    match result {
        Ok(mnemonic) => {
            machine.retire();
            Ok(StepOutcome::Retired { pc, mnemonic })
        }
        Err(trap) => {
            let event = trap.at(pc);
            machine.latch(event);
            Err(event)
        }
    }
}
