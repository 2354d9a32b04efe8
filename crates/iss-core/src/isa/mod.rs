//! Instruction-set tables plugged into the engine.
//!
//! An ISA is data: decode entries binding patterns to handlers, the rules
//! that pick an instruction's width from its first parcel, and register
//! names for listings. Machine presets live next to each table.

/// MIPS-like 32-bit teaching ISA.
pub mod mips;
/// RISC-V RV32/RV64 with optional standard extensions.
pub mod riscv;

use crate::encoding::{DecodeEntry, WidthSelector};
use crate::execute::Handler;

/// Declarative description of one instruction set.
#[derive(Debug, Clone)]
pub struct Isa {
    /// Short name, e.g. `rv64` or `mips32`.
    pub name: &'static str,
    /// Decode table.
    pub entries: Vec<DecodeEntry<Handler>>,
    /// First-stage width rules.
    pub widths: WidthSelector,
    /// Assembly names of the integer registers, by index.
    pub register_names: &'static [&'static str],
}

impl Isa {
    /// Index of the integer register called `name`.
    #[must_use]
    pub fn register_index(&self, name: &str) -> Option<usize> {
        self.register_names
            .iter()
            .position(|candidate| *candidate == name)
    }
}

#[cfg(test)]
mod tests {
    use crate::api::Xlen;
    use crate::isa::{mips, riscv};

    #[test]
    fn register_names_resolve_to_indices() {
        let rv = riscv::isa(Xlen::Bits32, riscv::Extensions::NONE);
        assert_eq!(rv.register_index("a0"), Some(riscv::EXIT_REGISTER));
        assert_eq!(rv.register_index("x99"), None);
        let mips = mips::isa();
        assert_eq!(mips.register_index("ra"), Some(31));
        assert_eq!(mips.register_index("a0"), Some(mips::EXIT_REGISTER));
    }
}
