//! Byte-addressable memory with bounds-checked, fixed-endianness accesses.

/// Width, byte-order and bounds policy helpers.
pub mod access;

pub use access::{validate_range, AccessWidth, Endianness};

use crate::fault::Trap;

/// Flat simulated memory of fixed capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Memory {
    bytes: Box<[u8]>,
    endianness: Endianness,
}

impl Memory {
    /// Allocates zeroed memory.
    #[must_use]
    pub fn new(capacity: usize, endianness: Endianness) -> Self {
        Self {
            bytes: vec![0; capacity].into_boxed_slice(),
            endianness,
        }
    }

    /// Capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Byte order of multi-byte accesses.
    #[must_use]
    pub const fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Reads a zero-extended value of `width` bytes at `addr`.
    ///
    /// # Errors
    ///
    /// Returns an `OutOfBounds` trap when the access exceeds capacity.
    pub fn read(&self, addr: u64, width: AccessWidth) -> Result<u64, Trap> {
        let (start, end) = validate_range(addr, width.bytes(), self.bytes.len())?;
        Ok(self.endianness.assemble(&self.bytes[start..end]))
    }

    /// Writes the low `width` bytes of `value` at `addr`.
    ///
    /// # Errors
    ///
    /// Returns an `OutOfBounds` trap when the access exceeds capacity; memory is
    /// left untouched in that case.
    pub fn write(&mut self, addr: u64, width: AccessWidth, value: u64) -> Result<(), Trap> {
        let (start, end) = validate_range(addr, width.bytes(), self.bytes.len())?;
        self.endianness
            .decompose(value, &mut self.bytes[start..end]);
        Ok(())
    }

    /// Copies a prepared image into memory starting at `addr`.
    ///
    /// # Errors
    ///
    /// Returns an `OutOfBounds` trap when the image does not fit.
    pub fn load(&mut self, addr: u64, image: &[u8]) -> Result<(), Trap> {
        let (start, end) = validate_range(addr, image.len(), self.bytes.len())?;
        self.bytes[start..end].copy_from_slice(image);
        Ok(())
    }

    /// Borrows `len` bytes starting at `addr`.
    ///
    /// # Errors
    ///
    /// Returns an `OutOfBounds` trap when the range exceeds capacity.
    pub fn slice(&self, addr: u64, len: usize) -> Result<&[u8], Trap> {
        let (start, end) = validate_range(addr, len, self.bytes.len())?;
        Ok(&self.bytes[start..end])
    }
}
