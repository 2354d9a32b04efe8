use crate::fault::TrapEvent;

/// Execution state of one simulation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RunState {
    /// Ready to execute the next instruction.
    #[default]
    Running,
    /// Stopped by a handler or the host bridge.
    Halted,
    /// Stopped by a trap; further steps re-report it until the state is reset.
    Trapped(TrapEvent),
}

impl RunState {
    /// Returns true while the loop may dispatch.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns the latched trap, if the session stopped on one.
    #[must_use]
    pub const fn latched_trap(self) -> Option<TrapEvent> {
        match self {
            Self::Trapped(event) => Some(event),
            Self::Running | Self::Halted => None,
        }
    }
}
