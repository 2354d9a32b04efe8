//! Floating-point capability consumed by ISA handlers.
//!
//! The core never evaluates IEEE-754 primitives itself. Handlers call through
//! [`FloatUnit`], which returns each result together with the exception flags
//! it raised; how flags accrue is up to the architecture.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_lossless
)]

mod host;

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

pub use host::HostFloat;

/// IEEE-754 exception flags, laid out as the RISC-V `fflags` field.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FpFlags(u8);

impl FpFlags {
    /// Inexact.
    pub const NX: Self = Self(1 << 0);
    /// Underflow.
    pub const UF: Self = Self(1 << 1);
    /// Overflow.
    pub const OF: Self = Self(1 << 2);
    /// Divide by zero.
    pub const DZ: Self = Self(1 << 3);
    /// Invalid operation.
    pub const NV: Self = Self(1 << 4);

    /// No flags raised.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Flags from their packed representation; unknown bits are dropped.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x1F)
    }

    /// Packed representation.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns true when every flag in `other` is raised.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true when no flag is raised.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for FpFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for FpFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for FpFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; 5] = ["NX", "UF", "OF", "DZ", "NV"];
        let mut set = f.debug_set();
        for (bit, name) in NAMES.iter().enumerate() {
            if self.0 & (1 << bit) != 0 {
                set.entry(name);
            }
        }
        set.finish()
    }
}

/// Value produced by a floating-point operation plus the flags it raised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpResult<T> {
    /// Operation result.
    pub value: T,
    /// Exceptions raised while producing it.
    pub flags: FpFlags,
}

impl<T> FpResult<T> {
    /// Result that raised no flags.
    pub const fn exact(value: T) -> Self {
        Self {
            value,
            flags: FpFlags::empty(),
        }
    }
}

/// Two-operand arithmetic selectable through [`FloatUnit::arith_f32`] and
/// [`FloatUnit::arith_f64`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FpOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
    /// IEEE 754-2019 `minimumNumber`.
    Min,
    /// IEEE 754-2019 `maximumNumber`.
    Max,
}

/// Ordered comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FpCompare {
    /// Quiet equality; only signaling NaNs raise invalid.
    Eq,
    /// Signaling less-than.
    Lt,
    /// Signaling less-or-equal.
    Le,
}

/// Rounding direction for conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RoundingMode {
    /// Round to nearest, ties to even.
    #[default]
    NearestEven,
    /// Round toward zero.
    TowardZero,
    /// Round toward negative infinity.
    Down,
    /// Round toward positive infinity.
    Up,
    /// Round to nearest, ties away from zero.
    NearestMaxMagnitude,
}

impl RoundingMode {
    /// Decodes the three-bit static rounding-mode encoding; 5..=7 are not modes.
    #[must_use]
    pub const fn from_bits(bits: u64) -> Option<Self> {
        match bits {
            0 => Some(Self::NearestEven),
            1 => Some(Self::TowardZero),
            2 => Some(Self::Down),
            3 => Some(Self::Up),
            4 => Some(Self::NearestMaxMagnitude),
            _ => None,
        }
    }
}

/// Integer formats for conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntFormat {
    /// Signed 32-bit.
    I32,
    /// Unsigned 32-bit.
    U32,
    /// Signed 64-bit.
    I64,
    /// Unsigned 64-bit.
    U64,
}

impl IntFormat {
    /// Interprets the low bits of `raw` as this format.
    #[must_use]
    pub const fn interpret(self, raw: u64) -> i128 {
        match self {
            Self::I32 => raw as i32 as i128,
            Self::U32 => raw as u32 as i128,
            Self::I64 => raw as i64 as i128,
            Self::U64 => raw as i128,
        }
    }

    /// Smallest representable value.
    #[must_use]
    pub const fn min(self) -> i128 {
        match self {
            Self::I32 => i32::MIN as i128,
            Self::I64 => i64::MIN as i128,
            Self::U32 | Self::U64 => 0,
        }
    }

    /// Largest representable value.
    #[must_use]
    pub const fn max(self) -> i128 {
        match self {
            Self::I32 => i32::MAX as i128,
            Self::U32 => u32::MAX as i128,
            Self::I64 => i64::MAX as i128,
            Self::U64 => u64::MAX as i128,
        }
    }

    /// Bit pattern of `value` in this format, zero-extended to 64 bits.
    #[must_use]
    pub const fn encode(self, value: i128) -> u64 {
        match self {
            Self::I32 | Self::U32 => value as u64 & 0xFFFF_FFFF,
            Self::I64 | Self::U64 => value as u64,
        }
    }
}

/// IEEE-754 value class, ordered as the RISC-V `fclass` result bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FpClass {
    /// Negative infinity.
    NegInfinity = 0,
    /// Negative normal number.
    NegNormal = 1,
    /// Negative subnormal number.
    NegSubnormal = 2,
    /// Negative zero.
    NegZero = 3,
    /// Positive zero.
    PosZero = 4,
    /// Positive subnormal number.
    PosSubnormal = 5,
    /// Positive normal number.
    PosNormal = 6,
    /// Positive infinity.
    PosInfinity = 7,
    /// Signaling NaN.
    SignalingNan = 8,
    /// Quiet NaN.
    QuietNan = 9,
}

impl FpClass {
    /// One-hot mask with this class's bit set.
    #[must_use]
    pub const fn mask(self) -> u64 {
        1 << (self as u8)
    }
}

/// IEEE-754 binary32/binary64 operations.
///
/// NaN results are the canonical quiet NaN; signaling NaN operands raise
/// [`FpFlags::NV`].
pub trait FloatUnit {
    /// Binary arithmetic on singles.
    fn arith_f32(&self, op: FpOp, a: f32, b: f32) -> FpResult<f32>;
    /// Binary arithmetic on doubles.
    fn arith_f64(&self, op: FpOp, a: f64, b: f64) -> FpResult<f64>;
    /// Square root of a single.
    fn sqrt_f32(&self, a: f32) -> FpResult<f32>;
    /// Square root of a double.
    fn sqrt_f64(&self, a: f64) -> FpResult<f64>;
    /// `a * b + c` with a single rounding, singles.
    fn fma_f32(&self, a: f32, b: f32, c: f32) -> FpResult<f32>;
    /// `a * b + c` with a single rounding, doubles.
    fn fma_f64(&self, a: f64, b: f64, c: f64) -> FpResult<f64>;
    /// Comparison of singles.
    fn compare_f32(&self, op: FpCompare, a: f32, b: f32) -> FpResult<bool>;
    /// Comparison of doubles.
    fn compare_f64(&self, op: FpCompare, a: f64, b: f64) -> FpResult<bool>;
    /// Class of a single.
    fn classify_f32(&self, a: f32) -> FpClass;
    /// Class of a double.
    fn classify_f64(&self, a: f64) -> FpClass;
    /// Single to integer; out-of-range and NaN inputs saturate and raise invalid.
    fn f32_to_int(&self, a: f32, format: IntFormat, rm: RoundingMode) -> FpResult<u64>;
    /// Double to integer; out-of-range and NaN inputs saturate and raise invalid.
    fn f64_to_int(&self, a: f64, format: IntFormat, rm: RoundingMode) -> FpResult<u64>;
    /// Integer (low bits of `raw` in `format`) to single.
    fn int_to_f32(&self, raw: u64, format: IntFormat, rm: RoundingMode) -> FpResult<f32>;
    /// Integer (low bits of `raw` in `format`) to double.
    fn int_to_f64(&self, raw: u64, format: IntFormat, rm: RoundingMode) -> FpResult<f64>;
    /// Single to double; always exact for non-NaN inputs.
    fn widen(&self, a: f32) -> FpResult<f64>;
    /// Double to single.
    fn narrow(&self, a: f64, rm: RoundingMode) -> FpResult<f32>;
}
