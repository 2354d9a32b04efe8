//! Access width, byte order and bounds policy shared by every memory operation.

#![allow(clippy::cast_possible_truncation)]

use crate::fault::Trap;

/// Legal memory access widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum AccessWidth {
    /// One byte.
    Byte = 1,
    /// Two bytes.
    Half = 2,
    /// Four bytes.
    Word = 4,
    /// Eight bytes.
    Double = 8,
}

impl AccessWidth {
    /// Converts a byte count into an access width.
    #[must_use]
    pub const fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            1 => Some(Self::Byte),
            2 => Some(Self::Half),
            4 => Some(Self::Word),
            8 => Some(Self::Double),
            _ => None,
        }
    }

    /// Byte count.
    #[must_use]
    pub const fn bytes(self) -> usize {
        self as usize
    }

    /// Bit count.
    #[must_use]
    pub const fn bits(self) -> u32 {
        (self as u32) * 8
    }
}

/// Byte order applied to every multi-byte access of a memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Endianness {
    /// Least-significant byte at the lowest address.
    #[default]
    Little,
    /// Most-significant byte at the lowest address.
    Big,
}

impl Endianness {
    /// Assembles up to eight bytes into a zero-extended value.
    #[must_use]
    pub fn assemble(self, bytes: &[u8]) -> u64 {
        let fold = |acc: u64, byte: &u8| (acc << 8) | u64::from(*byte);
        match self {
            Self::Little => bytes.iter().rev().fold(0, fold),
            Self::Big => bytes.iter().fold(0, fold),
        }
    }

    /// Decomposes the low `out.len()` bytes of `value` into `out`.
    pub fn decompose(self, value: u64, out: &mut [u8]) {
        let len = out.len();
        for (i, slot) in out.iter_mut().enumerate() {
            let shift = match self {
                Self::Little => i * 8,
                Self::Big => (len - 1 - i) * 8,
            };
            *slot = (value >> shift) as u8;
        }
    }
}

/// Validates that `[addr, addr + len)` lies within a memory of `capacity` bytes
/// and returns the range as slice indices.
///
/// # Errors
///
/// Returns [`Trap::out_of_bounds`] when the range overflows or exceeds capacity.
pub fn validate_range(addr: u64, len: usize, capacity: usize) -> Result<(usize, usize), Trap> {
    let width = u8::try_from(len).unwrap_or(u8::MAX);
    let start = usize::try_from(addr).map_err(|_| Trap::out_of_bounds(addr, width))?;
    let end = start
        .checked_add(len)
        .ok_or(Trap::out_of_bounds(addr, width))?;
    if end > capacity {
        return Err(Trap::out_of_bounds(addr, width));
    }
    Ok((start, end))
}
