//! Declarative instruction encodings: widths, bit patterns and decode entries.
//!
//! A pattern is written most-significant bit first. `0` and `1` are fixed
//! bits, `.`, `x` and `?` are wildcards, `_` and spaces only separate fields:
//!
//! ```text
//! "0000000 ..... ..... 000 ..... 0110011"   // add
//! ```

use std::fmt;

use crate::fault::BuildError;

/// Width class of an instruction encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum InstrWidth {
    /// 16-bit parcel (compressed encodings).
    W16,
    /// 32-bit word.
    W32,
    /// 64-bit word.
    W64,
}

impl InstrWidth {
    /// Number of bits in the encoding.
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::W16 => 16,
            Self::W32 => 32,
            Self::W64 => 64,
        }
    }

    /// Number of bytes fetched for the encoding.
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::W16 => 2,
            Self::W32 => 4,
            Self::W64 => 8,
        }
    }

    /// Mask covering every bit of the encoding.
    #[must_use]
    pub const fn mask(self) -> u64 {
        match self {
            Self::W16 => 0xFFFF,
            Self::W32 => 0xFFFF_FFFF,
            Self::W64 => u64::MAX,
        }
    }

    /// Converts a bit count into a width class.
    #[must_use]
    pub const fn from_bits(bits: usize) -> Option<Self> {
        match bits {
            16 => Some(Self::W16),
            32 => Some(Self::W32),
            64 => Some(Self::W64),
            _ => None,
        }
    }
}

impl fmt::Display for InstrWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// Raw instruction bits as fetched; immutable once fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstructionWord {
    bits: u64,
    width: InstrWidth,
}

impl InstructionWord {
    /// Wraps fetched bits, discarding anything above the width.
    #[must_use]
    pub const fn new(bits: u64, width: InstrWidth) -> Self {
        Self {
            bits: bits & width.mask(),
            width,
        }
    }

    /// Raw bits, zero-extended.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.bits
    }

    /// Width class the word was fetched as.
    #[must_use]
    pub const fn width(self) -> InstrWidth {
        self.width
    }

    /// Bytes consumed by this instruction in the stream.
    #[must_use]
    pub const fn byte_len(self) -> u64 {
        self.width.bytes() as u64
    }

    /// Extracts the inclusive bit range `hi..=lo`, shifted down to bit 0.
    #[must_use]
    pub const fn field(self, hi: u32, lo: u32) -> u64 {
        let span = hi - lo + 1;
        let mask = if span >= 64 { u64::MAX } else { (1 << span) - 1 };
        (self.bits >> lo) & mask
    }

    /// Extracts a single bit.
    #[must_use]
    pub const fn bit(self, n: u32) -> u64 {
        (self.bits >> n) & 1
    }
}

/// Compiled pattern: which bits are fixed and what they must equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitPattern {
    mask: u64,
    expected: u64,
    width: InstrWidth,
}

impl BitPattern {
    /// Parses pattern text and checks it against the declared width.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidPattern`] for unknown characters and
    /// [`BuildError::WidthMismatch`] when the specifier count differs from
    /// `width`.
    pub fn parse(
        mnemonic: &'static str,
        text: &str,
        width: InstrWidth,
    ) -> Result<Self, BuildError> {
        let mut mask = 0u64;
        let mut expected = 0u64;
        let mut count = 0usize;

        for ch in text.chars() {
            let (fixed, one) = match ch {
                '0' => (true, false),
                '1' => (true, true),
                '.' | 'x' | '?' => (false, false),
                ' ' | '_' => continue,
                other => {
                    return Err(BuildError::InvalidPattern {
                        mnemonic,
                        found: other,
                    })
                }
            };
            count += 1;
            if count > 64 {
                continue;
            }
            mask <<= 1;
            expected <<= 1;
            if fixed {
                mask |= 1;
            }
            if one {
                expected |= 1;
            }
        }

        if InstrWidth::from_bits(count) != Some(width) {
            return Err(BuildError::WidthMismatch {
                mnemonic,
                declared: width,
                actual: count,
            });
        }

        Ok(Self {
            mask,
            expected,
            width,
        })
    }

    /// Bits fixed by the pattern.
    #[must_use]
    pub const fn mask(self) -> u64 {
        self.mask
    }

    /// Required values of the fixed bits.
    #[must_use]
    pub const fn expected(self) -> u64 {
        self.expected
    }

    /// Declared width class.
    #[must_use]
    pub const fn width(self) -> InstrWidth {
        self.width
    }

    /// Returns true when `bits` satisfies every fixed position.
    #[must_use]
    pub const fn matches(self, bits: u64) -> bool {
        bits & self.mask == self.expected
    }

    /// Returns true when some concrete word of the same width matches both patterns.
    #[must_use]
    pub const fn overlaps(self, other: Self) -> bool {
        if self.width as u8 != other.width as u8 {
            return false;
        }
        let common = self.mask & other.mask;
        (self.expected ^ other.expected) & common == 0
    }
}

/// One row of an ISA table.
#[derive(Clone, Copy)]
pub struct DecodeEntry<H> {
    /// Assembly mnemonic reported by the resolver.
    pub mnemonic: &'static str,
    /// Pattern text, most-significant bit first.
    pub pattern: &'static str,
    /// Declared width class.
    pub width: InstrWidth,
    /// Semantic action bound to the encoding.
    pub handler: H,
}

impl<H> DecodeEntry<H> {
    /// Creates a table row.
    pub const fn new(
        mnemonic: &'static str,
        pattern: &'static str,
        width: InstrWidth,
        handler: H,
    ) -> Self {
        Self {
            mnemonic,
            pattern,
            width,
            handler,
        }
    }
}

impl<H> fmt::Debug for DecodeEntry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeEntry")
            .field("mnemonic", &self.mnemonic)
            .field("pattern", &self.pattern)
            .field("width", &self.width)
            .finish_non_exhaustive()
    }
}

/// First-stage width rule: if `parcel & mask == value` the instruction is `width` wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct WidthRule {
    /// Discriminating low-order bits.
    pub mask: u64,
    /// Required value of the discriminating bits.
    pub value: u64,
    /// Width selected by this rule.
    pub width: InstrWidth,
}

/// Ordered first-match rules picking a width class from the first fetched parcel.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct WidthSelector {
    rules: Vec<WidthRule>,
    parcel: InstrWidth,
}

impl WidthSelector {
    /// Every instruction has the same width.
    #[must_use]
    pub fn fixed(width: InstrWidth) -> Self {
        Self {
            rules: vec![WidthRule {
                mask: 0,
                value: 0,
                width,
            }],
            parcel: width,
        }
    }

    /// Mixed-width stream classified by ordered rules. The first parcel fetched is
    /// the narrowest width any rule selects.
    #[must_use]
    pub fn rules(rules: Vec<WidthRule>) -> Self {
        let parcel = rules
            .iter()
            .map(|rule| rule.width)
            .min()
            .unwrap_or(InstrWidth::W32);
        Self { rules, parcel }
    }

    /// Width of the parcel fetched before the width class is known.
    #[must_use]
    pub const fn parcel(&self) -> InstrWidth {
        self.parcel
    }

    /// Stage one of decoding: classifies the first parcel.
    #[must_use]
    pub fn classify(&self, parcel: u64) -> Option<InstrWidth> {
        self.rules
            .iter()
            .find(|rule| parcel & rule.mask == rule.value)
            .map(|rule| rule.width)
    }

    /// Returns true when every word matching `pattern` is classified as its own width.
    #[must_use]
    pub fn routes(&self, pattern: BitPattern) -> bool {
        let parcel_mask = self.parcel.mask();
        let entry_mask = pattern.mask() & parcel_mask;
        let entry_value = pattern.expected() & parcel_mask;

        for rule in &self.rules {
            let compatible = (entry_value ^ rule.value) & rule.mask & entry_mask == 0;
            if !compatible {
                continue;
            }
            if rule.width != pattern.width() {
                return false;
            }
            if rule.mask & !entry_mask == 0 {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::{BitPattern, InstrWidth, InstructionWord, WidthRule, WidthSelector};
    use crate::fault::BuildError;

    fn riscv_selector() -> WidthSelector {
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
    }

    #[test]
    fn pattern_parses_fixed_and_wildcard_bits() {
        let pattern =
            BitPattern::parse("add", "0000000 ..... ..... 000 ..... 0110011", InstrWidth::W32)
                .expect("valid pattern");
        assert_eq!(pattern.mask(), 0xFE00_707F);
        assert_eq!(pattern.expected(), 0x0000_0033);
        assert!(pattern.matches(0x0020_81B3));
        assert!(!pattern.matches(0x4020_81B3));
    }

    #[test]
    fn pattern_rejects_unknown_characters() {
        let err = BitPattern::parse("bad", "0000 z", InstrWidth::W16).expect_err("z is invalid");
        assert_eq!(
            err,
            BuildError::InvalidPattern {
                mnemonic: "bad",
                found: 'z'
            }
        );
    }

    #[test]
    fn pattern_length_must_equal_declared_width() {
        let err = BitPattern::parse("short", "0101", InstrWidth::W16).expect_err("too short");
        assert_eq!(
            err,
            BuildError::WidthMismatch {
                mnemonic: "short",
                declared: InstrWidth::W16,
                actual: 4
            }
        );
    }

    #[test]
    fn oversized_pattern_reports_its_full_length() {
        let text = format!("{} 1z", ".".repeat(70));
        let err = BitPattern::parse("long", &text, InstrWidth::W64).expect_err("bad char");
        assert_eq!(
            err,
            BuildError::InvalidPattern {
                mnemonic: "long",
                found: 'z'
            }
        );

        let text = "1".repeat(70);
        let err = BitPattern::parse("long", &text, InstrWidth::W64).expect_err("too long");
        assert_eq!(
            err,
            BuildError::WidthMismatch {
                mnemonic: "long",
                declared: InstrWidth::W64,
                actual: 70
            }
        );
    }

    #[test]
    fn overlap_requires_agreement_on_shared_fixed_bits() {
        let a = BitPattern::parse("a", "1... .... .... ....", InstrWidth::W16).expect("a");
        let b = BitPattern::parse("b", ".... .... .... ...0", InstrWidth::W16).expect("b");
        let c = BitPattern::parse("c", "0... .... .... ...0", InstrWidth::W16).expect("c");
        assert!(a.overlaps(b));
        assert!(!a.overlaps(c));
        assert!(b.overlaps(c));
    }

    #[test]
    fn field_extraction_is_inclusive() {
        let word = InstructionWord::new(0x0020_81B3, InstrWidth::W32);
        assert_eq!(word.field(6, 0), 0x33);
        assert_eq!(word.field(11, 7), 3);
        assert_eq!(word.field(19, 15), 1);
        assert_eq!(word.field(24, 20), 2);
        assert_eq!(word.bit(0), 1);
        assert_eq!(word.byte_len(), 4);
    }

    #[test]
    fn instruction_word_discards_bits_above_width() {
        let word = InstructionWord::new(0xABCD_1234, InstrWidth::W16);
        assert_eq!(word.bits(), 0x1234);
    }

    #[test]
    fn selector_classifies_low_order_bits() {
        let selector = riscv_selector();
        assert_eq!(selector.parcel(), InstrWidth::W16);
        assert_eq!(selector.classify(0x0013), Some(InstrWidth::W32));
        assert_eq!(selector.classify(0x4501), Some(InstrWidth::W16));
    }

    #[test]
    fn selector_routes_entries_by_their_own_low_bits() {
        let selector = riscv_selector();
        let wide = BitPattern::parse("addi", "........................ .0010011", InstrWidth::W32)
            .expect("wide");
        let narrow =
            BitPattern::parse("c.li", "010. .... .... ..01", InstrWidth::W16).expect("narrow");
        let misrouted =
            BitPattern::parse("c.bad", ".... .... .... ..11", InstrWidth::W16).expect("bad");
        assert!(selector.routes(wide));
        assert!(selector.routes(narrow));
        assert!(!selector.routes(misrouted));
    }

    #[test]
    fn fixed_selector_routes_everything_of_its_width() {
        let selector = WidthSelector::fixed(InstrWidth::W32);
        let any = BitPattern::parse("any", &".".repeat(32), InstrWidth::W32).expect("any");
        assert!(selector.routes(any));
        assert_eq!(selector.classify(0), Some(InstrWidth::W32));
    }
}
