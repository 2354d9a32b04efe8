use std::collections::BTreeMap;

/// Declaration of one control/status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CsrDecl {
    /// Architectural address.
    pub addr: u16,
    /// Value after reset.
    pub reset: u64,
}

/// Architecture-specific control/status registers, addressed sparsely.
///
/// Only declared addresses exist; access checks beyond existence (privilege,
/// read-only counters) belong to the ISA handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CsrFile {
    values: BTreeMap<u16, u64>,
}

impl CsrFile {
    /// Builds a file holding every declared register at its reset value.
    #[must_use]
    pub fn from_decls(decls: &[CsrDecl]) -> Self {
        let mut file = Self::default();
        for decl in decls {
            file.define(decl.addr, decl.reset);
        }
        file
    }

    /// Declares (or resets) the register at `addr`.
    pub fn define(&mut self, addr: u16, reset: u64) {
        self.values.insert(addr, reset);
    }

    /// Returns true when `addr` is declared.
    #[must_use]
    pub fn contains(&self, addr: u16) -> bool {
        self.values.contains_key(&addr)
    }

    /// Reads a declared register.
    #[must_use]
    pub fn read(&self, addr: u16) -> Option<u64> {
        self.values.get(&addr).copied()
    }

    /// Writes a declared register; returns false when `addr` is not declared.
    pub fn write(&mut self, addr: u16, value: u64) -> bool {
        match self.values.get_mut(&addr) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Declared addresses in ascending order.
    pub fn addresses(&self) -> impl Iterator<Item = u16> + '_ {
        self.values.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::{CsrDecl, CsrFile};

    #[test]
    fn declared_registers_start_at_reset_value() {
        let csrs = CsrFile::from_decls(&[
            CsrDecl {
                addr: 0x300,
                reset: 0x1800,
            },
            CsrDecl { addr: 0x001, reset: 0 },
        ]);
        assert_eq!(csrs.read(0x300), Some(0x1800));
        assert_eq!(csrs.read(0x001), Some(0));
        assert_eq!(csrs.addresses().collect::<Vec<_>>(), vec![0x001, 0x300]);
    }

    #[test]
    fn undeclared_register_is_absent() {
        let mut csrs = CsrFile::default();
        assert!(!csrs.contains(0x7C0));
        assert_eq!(csrs.read(0x7C0), None);
        assert!(!csrs.write(0x7C0, 1));
        assert_eq!(csrs.read(0x7C0), None);
    }

    #[test]
    fn write_replaces_value() {
        let mut csrs = CsrFile::default();
        csrs.define(0x340, 0);
        assert!(csrs.write(0x340, 0xAB));
        assert_eq!(csrs.read(0x340), Some(0xAB));
    }
}
