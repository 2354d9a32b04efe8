//! RISC-V RV32/RV64 tables.
//!
//! The base integer set and Zicsr are always present; M, A, F, D and a
//! compressed subset are opt-in through [`Extensions`]. Enabling C turns the
//! fetch stream into a mixed 16/32-bit stream: parcels whose two low bits are
//! `11` start a 32-bit instruction, everything else is 16 bits wide.

mod atomic;
mod base;
mod compressed;
/// Operand and immediate extraction.
pub mod fields;
mod float;
mod mul;
/// Zicsr, privileged instructions and CSR addresses.
pub mod system;

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::api::{MachineConfig, Xlen};
use crate::encoding::{DecodeEntry, InstrWidth, WidthRule, WidthSelector};
use crate::execute::Handler;
use crate::isa::Isa;
use crate::memory::Endianness;
use crate::state::RegisterFileConfig;

/// ABI names of `x0..x31`.
pub const REGISTER_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// Register carrying the exit status of the `exit` system call (`a0`).
pub const EXIT_REGISTER: usize = 10;

/// Memory of the preset machine.
pub const MEMORY_BYTES: usize = 1 << 20;

fn entry(mnemonic: &'static str, pattern: &'static str, handler: Handler) -> DecodeEntry<Handler> {
    DecodeEntry::new(mnemonic, pattern, InstrWidth::W32, handler)
}

fn compact(
    mnemonic: &'static str,
    pattern: &'static str,
    handler: Handler,
) -> DecodeEntry<Handler> {
    DecodeEntry::new(mnemonic, pattern, InstrWidth::W16, handler)
}

/// Set of optional standard extensions.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Extensions(u8);

impl Extensions {
    /// Base integer set only.
    pub const NONE: Self = Self(0);
    /// Integer multiply/divide.
    pub const M: Self = Self(1 << 0);
    /// Atomics.
    pub const A: Self = Self(1 << 1);
    /// Single-precision floating point.
    pub const F: Self = Self(1 << 2);
    /// Double-precision floating point; implies F.
    pub const D: Self = Self(1 << 3);
    /// Compressed instructions.
    pub const C: Self = Self(1 << 4);
    /// The `G` general-purpose combination, IMAFD.
    pub const G: Self = Self(Self::M.0 | Self::A.0 | Self::F.0 | Self::D.0);
    /// Everything supported.
    pub const GC: Self = Self(Self::G.0 | Self::C.0);

    /// Returns true when every extension in `other` is enabled.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Adds the extensions implied by those enabled.
    #[must_use]
    pub const fn normalized(self) -> Self {
        if self.contains(Self::D) {
            Self(self.0 | Self::F.0)
        } else {
            self
        }
    }

    /// Letter bits of the `misa` register, `I` included.
    #[must_use]
    pub const fn misa_letters(self) -> u64 {
        let ext = self.normalized();
        let mut letters = 1 << (b'i' - b'a');
        let table = [
            (Self::M, b'm'),
            (Self::A, b'a'),
            (Self::F, b'f'),
            (Self::D, b'd'),
            (Self::C, b'c'),
        ];
        let mut i = 0;
        while i < table.len() {
            if ext.contains(table[i].0) {
                letters |= 1 << (table[i].1 - b'a');
            }
            i += 1;
        }
        letters
    }
}

impl BitOr for Extensions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Extensions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ext = self.normalized();
        f.write_str("i")?;
        for (flag, letter) in [
            (Self::M, "m"),
            (Self::A, "a"),
            (Self::F, "f"),
            (Self::D, "d"),
            (Self::C, "c"),
        ] {
            if ext.contains(flag) {
                f.write_str(letter)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Extensions({self})")
    }
}

/// Decode table for `xlen` with the requested extensions.
#[must_use]
pub fn isa(xlen: Xlen, extensions: Extensions) -> Isa {
    let ext = extensions.normalized();
    let mut entries = Vec::new();
    base::entries(xlen, &mut entries);
    system::entries(&mut entries);
    if ext.contains(Extensions::M) {
        mul::entries(xlen, &mut entries);
    }
    if ext.contains(Extensions::A) {
        atomic::entries(xlen, &mut entries);
    }
    if ext.contains(Extensions::F) {
        float::single_entries(xlen, &mut entries);
    }
    if ext.contains(Extensions::D) {
        float::double_entries(xlen, &mut entries);
    }

    let widths = if ext.contains(Extensions::C) {
        compressed::entries(xlen, &mut entries);
        WidthSelector::rules(vec![
            WidthRule {
                mask: 0b11,
                value: 0b11,
                width: InstrWidth::W32,
            },
            WidthRule {
                mask: 0,
                value: 0,
                width: InstrWidth::W16,
            },
        ])
    } else {
        WidthSelector::fixed(InstrWidth::W32)
    };

    Isa {
        name: match xlen {
            Xlen::Bits32 => "rv32",
            Xlen::Bits64 => "rv64",
        },
        entries,
        widths,
        register_names: &REGISTER_NAMES,
    }
}

/// Machine preset matching [`isa`]: little-endian, `x0` hard-wired, float
/// registers when F is enabled and the machine-mode CSR set.
#[must_use]
pub fn machine_config(xlen: Xlen, extensions: Extensions) -> MachineConfig {
    let ext = extensions.normalized();
    MachineConfig {
        xlen,
        registers: RegisterFileConfig::with_zero(32, xlen.bits()),
        float_registers: if ext.contains(Extensions::F) { 32 } else { 0 },
        memory_bytes: MEMORY_BYTES,
        endianness: Endianness::Little,
        reset_pc: 0,
        csrs: system::csr_decls(xlen, ext),
        tlb: None,
    }
}
