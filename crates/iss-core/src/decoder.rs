//! Bit-pattern matcher turning an ISA table into a decision tree.
//!
//! Construction parses every pattern, checks that the width selector routes
//! it to its own width class and rejects tables in which two entries of one
//! class can match the same word. Resolution then walks a tree that, at every
//! level, hashes the bits fixed by all remaining candidates; leaves hold at
//! most a handful of patterns that share no common fixed bits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::encoding::{BitPattern, DecodeEntry, InstrWidth, InstructionWord, WidthSelector};
use crate::fault::BuildError;

/// Outcome of resolving one instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved<H> {
    /// Mnemonic of the matching entry.
    pub mnemonic: &'static str,
    /// Handler of the matching entry.
    pub handler: H,
    /// Width class of the matching entry.
    pub width: InstrWidth,
}

#[derive(Debug, Clone, Copy)]
struct Compiled<H> {
    mnemonic: &'static str,
    pattern: BitPattern,
    handler: H,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(Vec<usize>),
    Branch {
        mask: u64,
        children: HashMap<u64, Node>,
    },
}

/// Identity of one built decode table.
///
/// Every [`Matcher::build`] call draws a fresh identity, so two engines never
/// share one even when built from the same entries. Clones keep it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(u64);

static NEXT_TABLE: AtomicU64 = AtomicU64::new(0);

/// Immutable decoder built once per ISA table and shared by reference.
#[derive(Debug, Clone)]
pub struct Matcher<H> {
    id: TableId,
    entries: Vec<Compiled<H>>,
    trees: [Option<Node>; 3],
    widths: WidthSelector,
}

const fn slot(width: InstrWidth) -> usize {
    match width {
        InstrWidth::W16 => 0,
        InstrWidth::W32 => 1,
        InstrWidth::W64 => 2,
    }
}

impl<H: Copy> Matcher<H> {
    /// Validates `entries` and builds the decision trees.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::EmptyTable`], a pattern parse error,
    /// [`BuildError::WidthClassMismatch`] or
    /// [`BuildError::AmbiguousDecodeTable`] for the first problem found.
    pub fn build(entries: &[DecodeEntry<H>], widths: WidthSelector) -> Result<Self, BuildError> {
        if entries.is_empty() {
            return Err(BuildError::EmptyTable);
        }

        let mut compiled = Vec::with_capacity(entries.len());
        for entry in entries {
            let pattern = BitPattern::parse(entry.mnemonic, entry.pattern, entry.width)?;
            if !widths.routes(pattern) {
                return Err(BuildError::WidthClassMismatch {
                    mnemonic: entry.mnemonic,
                    declared: entry.width,
                });
            }
            compiled.push(Compiled {
                mnemonic: entry.mnemonic,
                pattern,
                handler: entry.handler,
            });
        }

        for (i, first) in compiled.iter().enumerate() {
            if let Some(second) = compiled[i + 1..]
                .iter()
                .find(|other| first.pattern.overlaps(other.pattern))
            {
                return Err(BuildError::AmbiguousDecodeTable {
                    first: first.mnemonic,
                    second: second.mnemonic,
                    width: first.pattern.width(),
                });
            }
        }

        let mut trees: [Option<Node>; 3] = [None, None, None];
        for width in [InstrWidth::W16, InstrWidth::W32, InstrWidth::W64] {
            let members: Vec<usize> = compiled
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.pattern.width() == width)
                .map(|(index, _)| index)
                .collect();
            if !members.is_empty() {
                trees[slot(width)] = Some(split(&compiled, members, 0));
            }
        }

        Ok(Self {
            id: TableId(NEXT_TABLE.fetch_add(1, Ordering::Relaxed)),
            entries: compiled,
            trees,
            widths,
        })
    }

    /// Identity of this table.
    #[must_use]
    pub const fn id(&self) -> TableId {
        self.id
    }

    /// Width of the parcel fetched before the width class is known.
    #[must_use]
    pub const fn parcel(&self) -> InstrWidth {
        self.widths.parcel()
    }

    /// Stage one: width class of the instruction starting with `parcel`.
    #[must_use]
    pub fn width_class(&self, parcel: u64) -> Option<InstrWidth> {
        self.widths.classify(parcel)
    }

    /// Stage two: the unique entry matching `word`, if any.
    #[must_use]
    pub fn resolve(&self, word: InstructionWord) -> Option<Resolved<H>> {
        let mut node = self.trees[slot(word.width())].as_ref()?;
        let bits = word.bits();
        loop {
            match node {
                Node::Branch { mask, children } => node = children.get(&(bits & mask))?,
                Node::Leaf(candidates) => {
                    return candidates
                        .iter()
                        .map(|index| &self.entries[*index])
                        .find(|entry| entry.pattern.matches(bits))
                        .map(|entry| Resolved {
                            mnemonic: entry.mnemonic,
                            handler: entry.handler,
                            width: entry.pattern.width(),
                        });
                }
            }
        }
    }

    /// Number of entries in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a built matcher.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mnemonics in table order.
    pub fn mnemonics(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|entry| entry.mnemonic)
    }
}

fn split<H>(entries: &[Compiled<H>], candidates: Vec<usize>, consumed: u64) -> Node {
    if candidates.len() <= 1 {
        return Node::Leaf(candidates);
    }
    let common = candidates
        .iter()
        .fold(!consumed, |acc, index| acc & entries[*index].pattern.mask());
    if common == 0 {
        return Node::Leaf(candidates);
    }

    let mut groups: HashMap<u64, Vec<usize>> = HashMap::new();
    for index in candidates {
        let key = entries[index].pattern.expected() & common;
        groups.entry(key).or_default().push(index);
    }
    let children = groups
        .into_iter()
        .map(|(key, group)| (key, split(entries, group, consumed | common)))
        .collect();
    Node::Branch {
        mask: common,
        children,
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::Matcher;
    use crate::encoding::{
        BitPattern, DecodeEntry, InstrWidth, InstructionWord, WidthRule, WidthSelector,
    };
    use crate::fault::BuildError;

    const W32: InstrWidth = InstrWidth::W32;
    const W16: InstrWidth = InstrWidth::W16;

    fn table() -> Vec<DecodeEntry<u8>> {
        vec![
            DecodeEntry::new("add", "0000000 ..... ..... 000 ..... 0110011", W32, 1),
            DecodeEntry::new("sub", "0100000 ..... ..... 000 ..... 0110011", W32, 2),
            DecodeEntry::new("xor", "0000000 ..... ..... 100 ..... 0110011", W32, 3),
            DecodeEntry::new("addi", "..... ..... .. ..... 000 ..... 0010011", W32, 4),
            DecodeEntry::new("ecall", "000000000000 00000 000 00000 1110011", W32, 5),
            DecodeEntry::new("ebreak", "000000000001 00000 000 00000 1110011", W32, 6),
            DecodeEntry::new("csrrw", "............ ..... 001 ..... 1110011", W32, 7),
            DecodeEntry::new("c.li", "010 . ..... ..... 01", W16, 8),
            DecodeEntry::new("c.j", "101 ........... 01", W16, 9),
        ]
    }

    fn mixed() -> WidthSelector {
        WidthSelector::rules(vec![
            WidthRule {
                mask: 0b11,
                value: 0b11,
                width: W32,
            },
            WidthRule {
                mask: 0,
                value: 0,
                width: W16,
            },
        ])
    }

    fn linear<H: Copy>(entries: &[DecodeEntry<H>], word: InstructionWord) -> Option<&'static str> {
        entries
            .iter()
            .filter(|entry| entry.width == word.width())
            .find(|entry| {
                BitPattern::parse(entry.mnemonic, entry.pattern, entry.width)
                    .expect("valid pattern")
                    .matches(word.bits())
            })
            .map(|entry| entry.mnemonic)
    }

    #[test]
    fn resolves_each_width_class() {
        let matcher = Matcher::build(&table(), mixed()).expect("valid table");
        assert_eq!(matcher.len(), 9);

        let add = matcher
            .resolve(InstructionWord::new(0x0020_81B3, W32))
            .expect("add");
        assert_eq!((add.mnemonic, add.handler), ("add", 1));

        let ebreak = matcher
            .resolve(InstructionWord::new(0x0010_0073, W32))
            .expect("ebreak");
        assert_eq!(ebreak.mnemonic, "ebreak");

        let li = matcher
            .resolve(InstructionWord::new(0x4515, W16))
            .expect("c.li");
        assert_eq!((li.mnemonic, li.width), ("c.li", W16));
    }

    #[test]
    fn each_build_gets_its_own_table_id() {
        let first = Matcher::build(&table(), mixed()).expect("valid table");
        let second = Matcher::build(&table(), mixed()).expect("valid table");
        assert_ne!(first.id(), second.id());
        assert_eq!(first.clone().id(), first.id());
    }

    #[test]
    fn unmatched_word_resolves_to_none() {
        let matcher = Matcher::build(&table(), mixed()).expect("valid table");
        assert!(matcher
            .resolve(InstructionWord::new(0xFFFF_FFFF, W32))
            .is_none());
        assert!(matcher.resolve(InstructionWord::new(0x0000, W16)).is_none());
    }

    #[test]
    fn overlapping_entries_fail_the_build() {
        let mut entries = table();
        entries.push(DecodeEntry::new(
            "addx",
            "0000000 ..... ..... 000 ..... 0110011",
            W32,
            10,
        ));
        let err = Matcher::build(&entries, mixed()).expect_err("add/addx overlap");
        assert_eq!(
            err,
            BuildError::AmbiguousDecodeTable {
                first: "add",
                second: "addx",
                width: W32
            }
        );
    }

    #[test]
    fn catch_all_entries_of_different_classes_coexist() {
        let entries = vec![
            DecodeEntry::new("wide", "........ ........ ........ ......11", W32, 0u8),
            DecodeEntry::new("narrow", "........ ......01", W16, 1u8),
        ];
        let matcher = Matcher::build(&entries, mixed()).expect("disjoint classes");
        let wide = matcher
            .resolve(InstructionWord::new(0xFFFF_FFFF, W32))
            .expect("wide");
        assert_eq!(wide.handler, 0);
        let narrow = matcher
            .resolve(InstructionWord::new(0xFFFD, W16))
            .expect("narrow");
        assert_eq!(narrow.handler, 1);
    }

    #[test]
    fn short_pattern_fails_the_build() {
        let entries = vec![DecodeEntry::new("short", "0101", W16, 0u8)];
        assert!(matches!(
            Matcher::build(&entries, WidthSelector::fixed(W16)),
            Err(BuildError::WidthMismatch { actual: 4, .. })
        ));
    }

    #[test]
    fn entries_routed_to_another_width_fail_the_build() {
        let entries = vec![DecodeEntry::new("c.bad", ".... .... .... ..11", W16, 0u8)];
        assert_eq!(
            Matcher::build(&entries, mixed()).expect_err("misrouted"),
            BuildError::WidthClassMismatch {
                mnemonic: "c.bad",
                declared: W16
            }
        );
    }

    #[test]
    fn empty_table_fails_the_build() {
        let entries: Vec<DecodeEntry<u8>> = Vec::new();
        assert_eq!(
            Matcher::build(&entries, mixed()).expect_err("empty"),
            BuildError::EmptyTable
        );
    }

    #[test]
    fn width_class_uses_first_parcel_only() {
        let matcher = Matcher::build(&table(), mixed()).expect("valid table");
        assert_eq!(matcher.parcel(), W16);
        assert_eq!(matcher.width_class(0x0093), Some(W32));
        assert_eq!(matcher.width_class(0x4515), Some(W16));
    }

    proptest! {
        #[test]
        fn tree_agrees_with_linear_scan(bits in any::<u32>()) {
            let entries = table();
            let matcher = Matcher::build(&entries, mixed()).expect("valid table");
            let word = InstructionWord::new(u64::from(bits), W32);
            let first = matcher.resolve(word).map(|resolved| resolved.mnemonic);
            prop_assert_eq!(first, linear(&entries, word));
            let second = matcher.resolve(word).map(|resolved| resolved.mnemonic);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn compressed_tree_agrees_with_linear_scan(bits in any::<u16>()) {
            let entries = table();
            let matcher = Matcher::build(&entries, mixed()).expect("valid table");
            let word = InstructionWord::new(u64::from(bits), W16);
            let resolved = matcher.resolve(word).map(|resolved| resolved.mnemonic);
            prop_assert_eq!(resolved, linear(&entries, word));
        }
    }
}
