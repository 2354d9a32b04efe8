//! Disassembly listings.
//!
//! Walks memory the way the fetch stage does: the first parcel selects the
//! width class, the full word is then resolved against the engine's matcher.
//! Words no entry accepts are listed as illegal and skipped by their width
//! class; a parcel no width rule accepts is listed and skipped on its own.

use std::fmt;

use crate::encoding::{InstrWidth, InstructionWord};
use crate::execute::Engine;
use crate::memory::{AccessWidth, Memory};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single disassembled instruction row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisassemblyRow {
    /// Address of the first byte.
    pub address: u64,
    /// Encoded width.
    pub width: InstrWidth,
    /// Raw encoding, right-aligned.
    pub raw: u64,
    /// Mnemonic of the matching entry, or `.word` when illegal.
    pub mnemonic: &'static str,
    /// Whether no decode entry accepts the encoding.
    pub is_illegal: bool,
}

impl fmt::Display for DisassemblyRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.width.bytes() * 2;
        write!(f, "{:#010x}: {:0digits$x}  {}", self.address, self.raw, self.mnemonic)?;
        if self.is_illegal {
            f.write_str(" ; ILLEGAL")?;
        }
        Ok(())
    }
}

/// Lists up to `count` instructions starting at `start`.
///
/// The listing stops early when a fetch would leave memory.
#[must_use]
pub fn disassemble(
    engine: &Engine,
    memory: &Memory,
    start: u64,
    count: usize,
) -> Vec<DisassemblyRow> {
    let matcher = engine.matcher();
    let parcel_width = matcher.parcel();
    let mut rows = Vec::with_capacity(count);
    let mut address = start;

    while rows.len() < count {
        let Some(parcel) = read(memory, address, parcel_width) else {
            break;
        };
        let row = match matcher.width_class(parcel) {
            None => illegal(address, parcel_width, parcel),
            Some(width) => {
                let Some(raw) = read(memory, address, width) else {
                    break;
                };
                let word = InstructionWord::new(raw, width);
                match matcher.resolve(word) {
                    Some(resolved) => DisassemblyRow {
                        address,
                        width,
                        raw,
                        mnemonic: resolved.mnemonic,
                        is_illegal: false,
                    },
                    None => illegal(address, width, raw),
                }
            }
        };
        address = address.wrapping_add(u64::from(row.width.bits() / 8));
        rows.push(row);
    }
    rows
}

fn read(memory: &Memory, address: u64, width: InstrWidth) -> Option<u64> {
    let access = AccessWidth::from_bytes(width.bytes())?;
    memory.read(address, access).ok()
}

const fn illegal(address: u64, width: InstrWidth, raw: u64) -> DisassemblyRow {
    DisassemblyRow {
        address,
        width,
        raw,
        mnemonic: ".word",
        is_illegal: true,
    }
}
