use crate::fault::Trap;
use crate::numeric::truncate;

/// Shape of a register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterFileConfig {
    /// Number of slots.
    pub count: usize,
    /// Slot width in bits (32 or 64).
    pub width: u32,
    /// Slot hard-wired to zero, if the architecture has one.
    pub zero_register: Option<usize>,
}

impl RegisterFileConfig {
    /// `count` slots of `width` bits with slot 0 hard-wired to zero.
    #[must_use]
    pub const fn with_zero(count: usize, width: u32) -> Self {
        Self {
            count,
            width,
            zero_register: Some(0),
        }
    }

    /// `count` plain slots of `width` bits.
    #[must_use]
    pub const fn plain(count: usize, width: u32) -> Self {
        Self {
            count,
            width,
            zero_register: None,
        }
    }
}

/// Fixed-length sequence of fixed-width register slots.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterFile {
    slots: Vec<u64>,
    width: u32,
    zero_register: Option<usize>,
}

impl RegisterFile {
    /// Creates a zeroed register file.
    #[must_use]
    pub fn new(config: RegisterFileConfig) -> Self {
        Self {
            slots: vec![0; config.count],
            width: config.width,
            zero_register: config.zero_register,
        }
    }

    /// Number of slots.
    #[must_use]
    pub fn count(&self) -> usize {
        self.slots.len()
    }

    /// Slot width in bits.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Reads slot `index`.
    ///
    /// # Errors
    ///
    /// Returns an `OutOfRange` trap when `index` is not a slot.
    pub fn read(&self, index: usize) -> Result<u64, Trap> {
        let value = self
            .slots
            .get(index)
            .copied()
            .ok_or_else(|| Trap::out_of_range(index, self.slots.len()))?;
        if self.zero_register == Some(index) {
            return Ok(0);
        }
        Ok(value)
    }

    /// Writes slot `index`, truncating `value` to the slot width. Writes to the
    /// zero register are discarded.
    ///
    /// # Errors
    ///
    /// Returns an `OutOfRange` trap when `index` is not a slot.
    pub fn write(&mut self, index: usize, value: u64) -> Result<(), Trap> {
        let count = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or_else(|| Trap::out_of_range(index, count))?;
        if self.zero_register != Some(index) {
            *slot = truncate(value, self.width);
        }
        Ok(())
    }

    /// Current slot values in index order.
    #[must_use]
    pub fn as_slice(&self) -> &[u64] {
        &self.slots
    }
}
