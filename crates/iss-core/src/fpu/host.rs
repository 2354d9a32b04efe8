//! [`FloatUnit`] backed by host arithmetic.
//!
//! Arithmetic rounds to nearest-even. Inexactness is recovered from
//! error-free transformations (two-sum, fused residuals), which is exact for
//! add, sub, mul, div and sqrt; for fused multiply-add the inexact flag is an
//! approximation. Underflow is reported when a tiny result is inexact.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::float_cmp
)]

use std::ops::{Add, Div, Mul, Neg, Sub};

use super::{
    FloatUnit, FpClass, FpCompare, FpFlags, FpOp, FpResult, IntFormat, RoundingMode,
};

/// Host-arithmetic floating-point unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HostFloat;

trait HostFp:
    Copy
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    const ZERO: Self;
    const CANONICAL_NAN: Self;
    const QUIET_BIT: u64;

    fn nan(self) -> bool;
    fn infinite(self) -> bool;
    fn subnormal(self) -> bool;
    fn negative(self) -> bool;
    fn fused(self, b: Self, c: Self) -> Self;
    fn root(self) -> Self;
    fn raw(self) -> u64;
    fn from_raw(raw: u64) -> Self;
    fn to_f64(self) -> f64;
    fn from_i128(value: i128) -> Self;
    fn to_i128(self) -> i128;

    fn signaling(self) -> bool {
        self.nan() && self.raw() & Self::QUIET_BIT == 0
    }

    fn is_zero(self) -> bool {
        self == Self::ZERO
    }
}

macro_rules! host_fp {
    ($ty:ty, $bits:ty, $nan:expr, $quiet:expr) => {
        impl HostFp for $ty {
            const ZERO: Self = 0.0;
            const CANONICAL_NAN: Self = <$ty>::from_bits($nan);
            const QUIET_BIT: u64 = $quiet;

            fn nan(self) -> bool {
                self.is_nan()
            }

            fn infinite(self) -> bool {
                self.is_infinite()
            }

            fn subnormal(self) -> bool {
                self.is_subnormal()
            }

            fn negative(self) -> bool {
                self.is_sign_negative()
            }

            fn fused(self, b: Self, c: Self) -> Self {
                self.mul_add(b, c)
            }

            fn root(self) -> Self {
                self.sqrt()
            }

            fn raw(self) -> u64 {
                u64::from(self.to_bits())
            }

            fn from_raw(raw: u64) -> Self {
                <$ty>::from_bits(raw as $bits)
            }

            fn to_f64(self) -> f64 {
                f64::from(self)
            }

            fn from_i128(value: i128) -> Self {
                value as $ty
            }

            fn to_i128(self) -> i128 {
                self as i128
            }
        }
    };
}

host_fp!(f32, u32, 0x7FC0_0000, 0x0040_0000);
host_fp!(f64, u64, 0x7FF8_0000_0000_0000, 0x0008_0000_0000_0000);

fn next_toward_zero<T: HostFp>(x: T) -> T {
    if x.is_zero() {
        x
    } else {
        T::from_raw(x.raw() - 1)
    }
}

fn next_away_from_zero<T: HostFp>(x: T) -> T {
    T::from_raw(x.raw() + 1)
}

fn invalid_if_signaling<T: HostFp>(operands: &[T]) -> FpFlags {
    if operands.iter().any(|value| value.signaling()) {
        FpFlags::NV
    } else {
        FpFlags::empty()
    }
}

fn nan_result<T: HostFp>(flags: FpFlags) -> FpResult<T> {
    FpResult {
        value: T::CANONICAL_NAN,
        flags,
    }
}

fn finish<T: HostFp>(value: T, inexact: bool, mut flags: FpFlags) -> FpResult<T> {
    if inexact {
        flags |= FpFlags::NX;
        if value.subnormal() || value.is_zero() {
            flags |= FpFlags::UF;
        }
    }
    FpResult { value, flags }
}

fn two_sum_error<T: HostFp>(a: T, b: T, sum: T) -> T {
    let b_virtual = sum - a;
    let a_virtual = sum - b_virtual;
    (a - a_virtual) + (b - b_virtual)
}

fn arith<T: HostFp>(op: FpOp, a: T, b: T) -> FpResult<T> {
    let flags = invalid_if_signaling(&[a, b]);
    let value = match op {
        FpOp::Min | FpOp::Max => return min_max(op, a, b, flags),
        FpOp::Add => a + b,
        FpOp::Sub => a - b,
        FpOp::Mul => a * b,
        FpOp::Div => a / b,
    };
    if a.nan() || b.nan() {
        return nan_result(flags);
    }
    if value.nan() {
        return nan_result(flags | FpFlags::NV);
    }
    if a.infinite() || b.infinite() {
        return FpResult { value, flags };
    }
    if op == FpOp::Div && b.is_zero() {
        return FpResult {
            value,
            flags: flags | FpFlags::DZ,
        };
    }
    if value.infinite() {
        return FpResult {
            value,
            flags: flags | FpFlags::OF | FpFlags::NX,
        };
    }
    let residual = match op {
        FpOp::Add => two_sum_error(a, b, value),
        FpOp::Sub => two_sum_error(a, -b, value),
        FpOp::Mul => a.fused(b, -value),
        _ => (-value).fused(b, a),
    };
    finish(value, !residual.is_zero(), flags)
}

fn min_max<T: HostFp>(op: FpOp, a: T, b: T, flags: FpFlags) -> FpResult<T> {
    let value = match (a.nan(), b.nan()) {
        (true, true) => T::CANONICAL_NAN,
        (true, false) => b,
        (false, true) => a,
        (false, false) if a == b => {
            let pick_a = if op == FpOp::Min {
                a.negative()
            } else {
                !a.negative()
            };
            if pick_a {
                a
            } else {
                b
            }
        }
        (false, false) => {
            let a_wins = if op == FpOp::Min { a < b } else { a > b };
            if a_wins {
                a
            } else {
                b
            }
        }
    };
    FpResult { value, flags }
}

fn sqrt<T: HostFp>(a: T) -> FpResult<T> {
    let flags = invalid_if_signaling(&[a]);
    if a.nan() {
        return nan_result(flags);
    }
    if a.negative() && !a.is_zero() {
        return nan_result(flags | FpFlags::NV);
    }
    let value = a.root();
    if a.infinite() {
        return FpResult { value, flags };
    }
    let residual = (-value).fused(value, a);
    finish(value, !residual.is_zero(), flags)
}

fn fma<T: HostFp>(a: T, b: T, c: T) -> FpResult<T> {
    let mut flags = invalid_if_signaling(&[a, b, c]);
    let product_invalid =
        (a.infinite() && b.is_zero()) || (a.is_zero() && b.infinite());
    if product_invalid {
        flags |= FpFlags::NV;
    }
    if a.nan() || b.nan() || c.nan() || product_invalid {
        return nan_result(flags);
    }
    let value = a.fused(b, c);
    if value.nan() {
        return nan_result(flags | FpFlags::NV);
    }
    if a.infinite() || b.infinite() || c.infinite() {
        return FpResult { value, flags };
    }
    if value.infinite() {
        return FpResult {
            value,
            flags: flags | FpFlags::OF | FpFlags::NX,
        };
    }
    let residual = a.fused(b, -value) + c;
    finish(value, !residual.is_zero(), flags)
}

fn compare<T: HostFp>(op: FpCompare, a: T, b: T) -> FpResult<bool> {
    let any_nan = a.nan() || b.nan();
    let flags = match op {
        FpCompare::Eq => invalid_if_signaling(&[a, b]),
        FpCompare::Lt | FpCompare::Le if any_nan => FpFlags::NV,
        FpCompare::Lt | FpCompare::Le => FpFlags::empty(),
    };
    let value = match op {
        FpCompare::Eq => a == b,
        FpCompare::Lt => a < b,
        FpCompare::Le => a <= b,
    };
    FpResult { value, flags }
}

fn classify<T: HostFp>(a: T) -> FpClass {
    if a.nan() {
        return if a.signaling() {
            FpClass::SignalingNan
        } else {
            FpClass::QuietNan
        };
    }
    match (a.negative(), a.infinite(), a.is_zero(), a.subnormal()) {
        (true, true, _, _) => FpClass::NegInfinity,
        (false, true, _, _) => FpClass::PosInfinity,
        (true, _, true, _) => FpClass::NegZero,
        (false, _, true, _) => FpClass::PosZero,
        (true, _, _, true) => FpClass::NegSubnormal,
        (false, _, _, true) => FpClass::PosSubnormal,
        (true, _, _, false) => FpClass::NegNormal,
        (false, _, _, false) => FpClass::PosNormal,
    }
}

fn round_integral(x: f64, rm: RoundingMode) -> f64 {
    match rm {
        RoundingMode::NearestEven => x.round_ties_even(),
        RoundingMode::TowardZero => x.trunc(),
        RoundingMode::Down => x.floor(),
        RoundingMode::Up => x.ceil(),
        RoundingMode::NearestMaxMagnitude => x.round(),
    }
}

fn to_int<T: HostFp>(a: T, format: IntFormat, rm: RoundingMode) -> FpResult<u64> {
    if a.nan() {
        return FpResult {
            value: format.encode(format.max()),
            flags: FpFlags::NV,
        };
    }
    let wide = a.to_f64();
    let rounded = round_integral(wide, rm);
    // Bounds as f64: 2^31, 2^32, 2^63 and 2^64 are exact.
    let upper_exclusive = match format {
        IntFormat::I32 => 2_147_483_648.0,
        IntFormat::U32 => 4_294_967_296.0,
        IntFormat::I64 => 9_223_372_036_854_775_808.0,
        IntFormat::U64 => 18_446_744_073_709_551_616.0,
    };
    let lower = match format {
        IntFormat::I32 => -2_147_483_648.0,
        IntFormat::I64 => -9_223_372_036_854_775_808.0,
        IntFormat::U32 | IntFormat::U64 => 0.0,
    };
    if rounded >= upper_exclusive {
        return FpResult {
            value: format.encode(format.max()),
            flags: FpFlags::NV,
        };
    }
    if rounded < lower {
        return FpResult {
            value: format.encode(format.min()),
            flags: FpFlags::NV,
        };
    }
    let flags = if rounded == wide {
        FpFlags::empty()
    } else {
        FpFlags::NX
    };
    FpResult {
        value: format.encode(rounded as i128),
        flags,
    }
}

fn directed<T: HostFp>(nearest: T, nearest_above: bool, exact: bool, rm: RoundingMode) -> T {
    if exact {
        return nearest;
    }
    let step_up = |x: T| {
        if x.is_zero() {
            next_away_from_zero(T::ZERO)
        } else if x.negative() {
            next_toward_zero(x)
        } else {
            next_away_from_zero(x)
        }
    };
    let step_down = |x: T| {
        if x.is_zero() {
            next_away_from_zero(-T::ZERO)
        } else if x.negative() {
            next_away_from_zero(x)
        } else {
            next_toward_zero(x)
        }
    };
    match rm {
        RoundingMode::NearestEven | RoundingMode::NearestMaxMagnitude => nearest,
        RoundingMode::Up if !nearest_above => step_up(nearest),
        RoundingMode::Down if nearest_above => step_down(nearest),
        RoundingMode::TowardZero if nearest_above != nearest.negative() => {
            next_toward_zero(nearest)
        }
        RoundingMode::Up | RoundingMode::Down | RoundingMode::TowardZero => nearest,
    }
}

fn from_int<T: HostFp>(raw: u64, format: IntFormat, rm: RoundingMode) -> FpResult<T> {
    let value = format.interpret(raw);
    let nearest = T::from_i128(value);
    let back = nearest.to_i128();
    let exact = back == value;
    let rounded = directed(nearest, back > value, exact, rm);
    let rounded = if rm == RoundingMode::NearestMaxMagnitude && !exact {
        ties_away(nearest, value)
    } else {
        rounded
    };
    finish(rounded, !exact, FpFlags::empty())
}

fn ties_away<T: HostFp>(nearest: T, value: i128) -> T {
    let back = nearest.to_i128();
    let other = if (back > value) != nearest.negative() {
        next_toward_zero(nearest)
    } else {
        next_away_from_zero(nearest)
    };
    let other_back = other.to_i128();
    let tie = (back - value).abs() == (other_back - value).abs();
    if tie && other_back.abs() > back.abs() {
        other
    } else {
        nearest
    }
}

impl FloatUnit for HostFloat {
    fn arith_f32(&self, op: FpOp, a: f32, b: f32) -> FpResult<f32> {
        arith(op, a, b)
    }

    fn arith_f64(&self, op: FpOp, a: f64, b: f64) -> FpResult<f64> {
        arith(op, a, b)
    }

    fn sqrt_f32(&self, a: f32) -> FpResult<f32> {
        sqrt(a)
    }

    fn sqrt_f64(&self, a: f64) -> FpResult<f64> {
        sqrt(a)
    }

    fn fma_f32(&self, a: f32, b: f32, c: f32) -> FpResult<f32> {
        fma(a, b, c)
    }

    fn fma_f64(&self, a: f64, b: f64, c: f64) -> FpResult<f64> {
        fma(a, b, c)
    }

    fn compare_f32(&self, op: FpCompare, a: f32, b: f32) -> FpResult<bool> {
        compare(op, a, b)
    }

    fn compare_f64(&self, op: FpCompare, a: f64, b: f64) -> FpResult<bool> {
        compare(op, a, b)
    }

    fn classify_f32(&self, a: f32) -> FpClass {
        classify(a)
    }

    fn classify_f64(&self, a: f64) -> FpClass {
        classify(a)
    }

    fn f32_to_int(&self, a: f32, format: IntFormat, rm: RoundingMode) -> FpResult<u64> {
        to_int(a, format, rm)
    }

    fn f64_to_int(&self, a: f64, format: IntFormat, rm: RoundingMode) -> FpResult<u64> {
        to_int(a, format, rm)
    }

    fn int_to_f32(&self, raw: u64, format: IntFormat, rm: RoundingMode) -> FpResult<f32> {
        from_int(raw, format, rm)
    }

    fn int_to_f64(&self, raw: u64, format: IntFormat, rm: RoundingMode) -> FpResult<f64> {
        from_int(raw, format, rm)
    }

    fn widen(&self, a: f32) -> FpResult<f64> {
        let flags = invalid_if_signaling(&[a]);
        if a.is_nan() {
            return nan_result(flags);
        }
        FpResult {
            value: f64::from(a),
            flags,
        }
    }

    fn narrow(&self, a: f64, rm: RoundingMode) -> FpResult<f32> {
        let flags = invalid_if_signaling(&[a]);
        if a.is_nan() {
            return nan_result(flags);
        }
        let nearest = a as f32;
        if a.is_infinite() {
            return FpResult {
                value: nearest,
                flags,
            };
        }
        let back = f64::from(nearest);
        let exact = back == a;
        let value = directed(nearest, back > a, exact, rm);
        let mut result = finish(value, !exact, flags);
        if nearest.is_infinite() {
            result.flags |= FpFlags::OF | FpFlags::NX;
        }
        result
    }
}
