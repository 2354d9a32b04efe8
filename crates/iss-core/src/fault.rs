use std::fmt;

use thiserror::Error;

use crate::encoding::InstrWidth;

/// Closed set of simulation-halting trap kinds, shared by every architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum TrapKind {
    /// No decode entry matched, or a handler rejected an operand combination.
    IllegalInstruction = 0x01,
    /// Memory access outside the configured capacity.
    OutOfBounds = 0x02,
    /// Register index outside the configured slot count.
    OutOfRange = 0x03,
    /// Valid opcode whose handler is intentionally incomplete.
    Unimplemented = 0x04,
}

impl TrapKind {
    /// Stable numeric code for host reporting.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts a stable numeric code back into a trap kind.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::IllegalInstruction),
            0x02 => Some(Self::OutOfBounds),
            0x03 => Some(Self::OutOfRange),
            0x04 => Some(Self::Unimplemented),
            _ => None,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::IllegalInstruction => "illegal instruction",
            Self::OutOfBounds => "memory access out of bounds",
            Self::OutOfRange => "register index out of range",
            Self::Unimplemented => "unimplemented operation",
        }
    }
}

impl fmt::Display for TrapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Structured payload describing what triggered a trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TrapDetail {
    /// Raw instruction bits that could not be executed.
    Word {
        /// Instruction bits, zero-extended.
        bits: u64,
        /// Width class the bits were fetched as.
        width: InstrWidth,
    },
    /// Offending memory range.
    Address {
        /// First byte of the access.
        addr: u64,
        /// Access width in bytes.
        width: u8,
    },
    /// Offending register index.
    Register {
        /// Requested slot.
        index: usize,
        /// Configured slot count.
        count: usize,
    },
    /// Mnemonic of an instruction whose semantics are not modeled.
    Mnemonic(&'static str),
    /// Control/status register address rejected by the architecture.
    Csr(u16),
}

impl fmt::Display for TrapDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Word { bits, width } => {
                let digits = width.bytes() * 2;
                write!(f, "word {bits:#0w$x}", w = digits + 2)
            }
            Self::Address { addr, width } => write!(f, "{width}-byte access at {addr:#x}"),
            Self::Register { index, count } => write!(f, "index {index} of {count}"),
            Self::Mnemonic(name) => write!(f, "`{name}`"),
            Self::Csr(addr) => write!(f, "csr {addr:#05x}"),
        }
    }
}

/// Trap raised by a handler or storage access, before the loop tags it with a pc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[error("{kind}: {detail}")]
pub struct Trap {
    /// Trap classification.
    pub kind: TrapKind,
    /// What triggered it.
    pub detail: TrapDetail,
}

impl Trap {
    /// Instruction word rejected by the matcher or by its handler.
    #[must_use]
    pub const fn illegal(bits: u64, width: InstrWidth) -> Self {
        Self {
            kind: TrapKind::IllegalInstruction,
            detail: TrapDetail::Word { bits, width },
        }
    }

    /// Access to a control/status register the architecture does not allow.
    #[must_use]
    pub const fn illegal_csr(addr: u16) -> Self {
        Self {
            kind: TrapKind::IllegalInstruction,
            detail: TrapDetail::Csr(addr),
        }
    }

    /// Memory access outside capacity.
    #[must_use]
    pub const fn out_of_bounds(addr: u64, width: u8) -> Self {
        Self {
            kind: TrapKind::OutOfBounds,
            detail: TrapDetail::Address { addr, width },
        }
    }

    /// Register index outside the slot count.
    #[must_use]
    pub const fn out_of_range(index: usize, count: usize) -> Self {
        Self {
            kind: TrapKind::OutOfRange,
            detail: TrapDetail::Register { index, count },
        }
    }

    /// Recognized instruction with no modeled semantics.
    #[must_use]
    pub const fn unimplemented(mnemonic: &'static str) -> Self {
        Self {
            kind: TrapKind::Unimplemented,
            detail: TrapDetail::Mnemonic(mnemonic),
        }
    }

    /// Tags this trap with the program counter of the faulting instruction.
    #[must_use]
    pub const fn at(self, pc: u64) -> TrapEvent {
        TrapEvent {
            kind: self.kind,
            pc,
            detail: self.detail,
        }
    }
}

/// Trap surfaced to the caller of the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[error("{kind} at pc {pc:#x}: {detail}")]
pub struct TrapEvent {
    /// Trap classification.
    pub kind: TrapKind,
    /// Program counter of the instruction that trapped.
    pub pc: u64,
    /// What triggered it.
    pub detail: TrapDetail,
}

/// Decode-table construction failures. A table that fails to build is never usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Two entries of the same width class can match one concrete word.
    #[error("ambiguous decode table: `{first}` and `{second}` overlap in the {width} class")]
    AmbiguousDecodeTable {
        /// Entry declared first.
        first: &'static str,
        /// Entry declared second.
        second: &'static str,
        /// Shared width class.
        width: InstrWidth,
    },
    /// Pattern text contains a character that is not a bit specifier or separator.
    #[error("pattern for `{mnemonic}` has invalid specifier {found:?}")]
    InvalidPattern {
        /// Offending entry.
        mnemonic: &'static str,
        /// First unexpected character.
        found: char,
    },
    /// Pattern length disagrees with the declared width.
    #[error("pattern for `{mnemonic}` has {actual} bits but declares {declared}")]
    WidthMismatch {
        /// Offending entry.
        mnemonic: &'static str,
        /// Declared width class.
        declared: InstrWidth,
        /// Number of bit specifiers found.
        actual: usize,
    },
    /// The width selector would fetch this entry's encodings with another width.
    #[error("`{mnemonic}` is not selected as {declared} by the width selector")]
    WidthClassMismatch {
        /// Offending entry.
        mnemonic: &'static str,
        /// Declared width class.
        declared: InstrWidth,
    },
    /// Table declares no entries.
    #[error("decode table is empty")]
    EmptyTable,
}
