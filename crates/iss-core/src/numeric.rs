//! Two's-complement truncation and extension helpers used by instruction handlers.

#![allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]

/// Keeps the low `bits` bits of `value`. `bits >= 64` returns `value` unchanged.
#[must_use]
pub const fn truncate(value: u64, bits: u32) -> u64 {
    if bits >= 64 {
        value
    } else {
        value & ((1u64 << bits) - 1)
    }
}

/// Interprets the low `bits` bits of `value` as unsigned.
#[must_use]
pub const fn zero_extend(value: u64, bits: u32) -> u64 {
    truncate(value, bits)
}

/// Interprets the low `bits` bits of `value` as a two's-complement number.
///
/// `bits == 0` yields zero; `bits >= 64` reinterprets the whole word.
#[must_use]
pub const fn sign_extend(value: u64, bits: u32) -> i64 {
    if bits == 0 {
        return 0;
    }
    if bits >= 64 {
        return value as i64;
    }
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

/// Returns true when `value` is representable as a `bits`-bit signed integer.
#[must_use]
pub const fn fits_signed(value: i64, bits: u32) -> bool {
    if bits >= 64 {
        return true;
    }
    if bits == 0 {
        return value == 0;
    }
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    value >= min && value <= max
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::{fits_signed, sign_extend, truncate, zero_extend};

    #[rstest]
    #[case(0x80, 8, -128)]
    #[case(0x7F, 8, 127)]
    #[case(0xFFFF, 16, -1)]
    #[case(0x8000_0000, 32, -2_147_483_648)]
    #[case(0x0000_0000_FFFF_F800, 12, -2048)]
    #[case(u64::MAX, 64, -1)]
    fn sign_extend_known_values(#[case] raw: u64, #[case] bits: u32, #[case] expected: i64) {
        assert_eq!(sign_extend(raw, bits), expected);
    }

    #[test]
    fn zero_width_extends_to_zero() {
        assert_eq!(sign_extend(u64::MAX, 0), 0);
        assert_eq!(truncate(u64::MAX, 0), 0);
    }

    #[test]
    fn zero_extend_discards_high_bits() {
        assert_eq!(zero_extend(0xFFFF_FFFF_8000_0000, 32), 0x8000_0000);
        assert_eq!(zero_extend(0x1234, 64), 0x1234);
    }

    #[test]
    fn fits_signed_respects_range_edges() {
        assert!(fits_signed(-128, 8));
        assert!(fits_signed(127, 8));
        assert!(!fits_signed(128, 8));
        assert!(!fits_signed(-129, 8));
        assert!(fits_signed(i64::MIN, 64));
    }

    proptest! {
        #[test]
        fn truncate_then_sign_extend_restores_representable_values(
            bits in prop::sample::select(vec![8u32, 16, 32, 64]),
            seed in any::<i64>(),
        ) {
            let value = if bits == 64 { seed } else { seed >> (64 - bits) };
            prop_assert!(fits_signed(value, bits));
            prop_assert_eq!(sign_extend(truncate(value as u64, bits), bits), value);
        }
    }
}
