//! F and D extensions.
//!
//! Float registers are 64 bits wide. Singles are NaN-boxed: the upper half of
//! a register holding a single is all ones. Reading a single from a register
//! that is not properly boxed yields the canonical NaN.
//!
//! All arithmetic goes through the engine's [`FloatUnit`]; exception flags it
//! reports accrue into `fcsr`. A static rounding mode of 5 or 6, or the
//! dynamic mode while `frm` holds 5..=7, makes the instruction illegal.

#![allow(clippy::cast_possible_truncation)]

use crate::api::Xlen;
use crate::encoding::{DecodeEntry, InstructionWord};
use crate::execute::{ExecContext, Handler};
use crate::fault::Trap;
use crate::fpu::{FloatUnit, FpClass, FpCompare, FpFlags, FpOp, FpResult, IntFormat, RoundingMode};
use crate::memory::AccessWidth;

use super::base::sext32;
use super::entry;
use super::fields::{funct3, imm_i, imm_s, rd, rs1, rs2, rs3};
use super::system::{self, FCSR, FRM};

const BOX: u64 = 0xFFFF_FFFF_0000_0000;
const CANONICAL_SINGLE: u32 = 0x7FC0_0000;
const DYNAMIC: u64 = 0b111;

pub(super) fn single_entries(xlen: Xlen, out: &mut Vec<DecodeEntry<Handler>>) {
    out.extend([
        entry("flw", "............ ..... 010 ..... 0000111", flw),
        entry("fsw", "....... ..... ..... 010 ..... 0100111", fsw),
        entry("fmadd.s", "..... 00 ..... ..... ... ..... 1000011", fmadd_s),
        entry("fmsub.s", "..... 00 ..... ..... ... ..... 1000111", fmsub_s),
        entry("fnmsub.s", "..... 00 ..... ..... ... ..... 1001011", fnmsub_s),
        entry("fnmadd.s", "..... 00 ..... ..... ... ..... 1001111", fnmadd_s),
        entry("fadd.s", "0000000 ..... ..... ... ..... 1010011", fadd_s),
        entry("fsub.s", "0000100 ..... ..... ... ..... 1010011", fsub_s),
        entry("fmul.s", "0001000 ..... ..... ... ..... 1010011", fmul_s),
        entry("fdiv.s", "0001100 ..... ..... ... ..... 1010011", fdiv_s),
        entry("fsqrt.s", "0101100 00000 ..... ... ..... 1010011", fsqrt_s),
        entry("fsgnj.s", "0010000 ..... ..... 000 ..... 1010011", fsgnj_s),
        entry("fsgnjn.s", "0010000 ..... ..... 001 ..... 1010011", fsgnjn_s),
        entry("fsgnjx.s", "0010000 ..... ..... 010 ..... 1010011", fsgnjx_s),
        entry("fmin.s", "0010100 ..... ..... 000 ..... 1010011", fmin_s),
        entry("fmax.s", "0010100 ..... ..... 001 ..... 1010011", fmax_s),
        entry("fcvt.w.s", "1100000 00000 ..... ... ..... 1010011", fcvt_w_s),
        entry("fcvt.wu.s", "1100000 00001 ..... ... ..... 1010011", fcvt_wu_s),
        entry("fmv.x.w", "1110000 00000 ..... 000 ..... 1010011", fmv_x_w),
        entry("fclass.s", "1110000 00000 ..... 001 ..... 1010011", fclass_s),
        entry("feq.s", "1010000 ..... ..... 010 ..... 1010011", feq_s),
        entry("flt.s", "1010000 ..... ..... 001 ..... 1010011", flt_s),
        entry("fle.s", "1010000 ..... ..... 000 ..... 1010011", fle_s),
        entry("fcvt.s.w", "1101000 00000 ..... ... ..... 1010011", fcvt_s_w),
        entry("fcvt.s.wu", "1101000 00001 ..... ... ..... 1010011", fcvt_s_wu),
        entry("fmv.w.x", "1111000 00000 ..... 000 ..... 1010011", fmv_w_x),
    ]);
    if xlen == Xlen::Bits64 {
        out.extend([
            entry("fcvt.l.s", "1100000 00010 ..... ... ..... 1010011", fcvt_l_s),
            entry("fcvt.lu.s", "1100000 00011 ..... ... ..... 1010011", fcvt_lu_s),
            entry("fcvt.s.l", "1101000 00010 ..... ... ..... 1010011", fcvt_s_l),
            entry("fcvt.s.lu", "1101000 00011 ..... ... ..... 1010011", fcvt_s_lu),
        ]);
    }
}

pub(super) fn double_entries(xlen: Xlen, out: &mut Vec<DecodeEntry<Handler>>) {
    out.extend([
        entry("fld", "............ ..... 011 ..... 0000111", fld),
        entry("fsd", "....... ..... ..... 011 ..... 0100111", fsd),
        entry("fmadd.d", "..... 01 ..... ..... ... ..... 1000011", fmadd_d),
        entry("fmsub.d", "..... 01 ..... ..... ... ..... 1000111", fmsub_d),
        entry("fnmsub.d", "..... 01 ..... ..... ... ..... 1001011", fnmsub_d),
        entry("fnmadd.d", "..... 01 ..... ..... ... ..... 1001111", fnmadd_d),
        entry("fadd.d", "0000001 ..... ..... ... ..... 1010011", fadd_d),
        entry("fsub.d", "0000101 ..... ..... ... ..... 1010011", fsub_d),
        entry("fmul.d", "0001001 ..... ..... ... ..... 1010011", fmul_d),
        entry("fdiv.d", "0001101 ..... ..... ... ..... 1010011", fdiv_d),
        entry("fsqrt.d", "0101101 00000 ..... ... ..... 1010011", fsqrt_d),
        entry("fsgnj.d", "0010001 ..... ..... 000 ..... 1010011", fsgnj_d),
        entry("fsgnjn.d", "0010001 ..... ..... 001 ..... 1010011", fsgnjn_d),
        entry("fsgnjx.d", "0010001 ..... ..... 010 ..... 1010011", fsgnjx_d),
        entry("fmin.d", "0010101 ..... ..... 000 ..... 1010011", fmin_d),
        entry("fmax.d", "0010101 ..... ..... 001 ..... 1010011", fmax_d),
        entry("fcvt.s.d", "0100000 00001 ..... ... ..... 1010011", fcvt_s_d),
        entry("fcvt.d.s", "0100001 00000 ..... ... ..... 1010011", fcvt_d_s),
        entry("fcvt.w.d", "1100001 00000 ..... ... ..... 1010011", fcvt_w_d),
        entry("fcvt.wu.d", "1100001 00001 ..... ... ..... 1010011", fcvt_wu_d),
        entry("fclass.d", "1110001 00000 ..... 001 ..... 1010011", fclass_d),
        entry("feq.d", "1010001 ..... ..... 010 ..... 1010011", feq_d),
        entry("flt.d", "1010001 ..... ..... 001 ..... 1010011", flt_d),
        entry("fle.d", "1010001 ..... ..... 000 ..... 1010011", fle_d),
        entry("fcvt.d.w", "1101001 00000 ..... ... ..... 1010011", fcvt_d_w),
        entry("fcvt.d.wu", "1101001 00001 ..... ... ..... 1010011", fcvt_d_wu),
    ]);
    if xlen == Xlen::Bits64 {
        out.extend([
            entry("fcvt.l.d", "1100001 00010 ..... ... ..... 1010011", fcvt_l_d),
            entry("fcvt.lu.d", "1100001 00011 ..... ... ..... 1010011", fcvt_lu_d),
            entry("fmv.x.d", "1110001 00000 ..... 000 ..... 1010011", fmv_x_d),
            entry("fcvt.d.l", "1101001 00010 ..... ... ..... 1010011", fcvt_d_l),
            entry("fcvt.d.lu", "1101001 00011 ..... ... ..... 1010011", fcvt_d_lu),
            entry("fmv.d.x", "1111001 00000 ..... 000 ..... 1010011", fmv_d_x),
        ]);
    }
}

/// Register view and float-unit entry points of one IEEE format.
trait Precision {
    type Value: Copy;

    const WIDTH: AccessWidth;
    const SIGN: u64;

    fn to_bits(value: Self::Value) -> u64;
    fn from_bits(bits: u64) -> Self::Value;
    /// Register contents to the bits of a value.
    fn unbox(raw: u64) -> u64;
    /// Value bits to register contents.
    fn boxed(bits: u64) -> u64;

    fn arith(fpu: &dyn FloatUnit, op: FpOp, a: Self::Value, b: Self::Value) -> FpResult<Self::Value>;
    fn sqrt(fpu: &dyn FloatUnit, a: Self::Value) -> FpResult<Self::Value>;
    fn fma(
        fpu: &dyn FloatUnit,
        a: Self::Value,
        b: Self::Value,
        c: Self::Value,
    ) -> FpResult<Self::Value>;
    fn compare(fpu: &dyn FloatUnit, op: FpCompare, a: Self::Value, b: Self::Value)
        -> FpResult<bool>;
    fn classify(fpu: &dyn FloatUnit, a: Self::Value) -> FpClass;
    fn to_int(
        fpu: &dyn FloatUnit,
        a: Self::Value,
        format: IntFormat,
        rm: RoundingMode,
    ) -> FpResult<u64>;
    fn from_int(
        fpu: &dyn FloatUnit,
        raw: u64,
        format: IntFormat,
        rm: RoundingMode,
    ) -> FpResult<Self::Value>;

    fn read(ctx: &ExecContext<'_>, index: usize) -> Result<Self::Value, Trap> {
        Ok(Self::from_bits(Self::unbox(ctx.f(index)?)))
    }

    fn write(ctx: &mut ExecContext<'_>, index: usize, value: Self::Value) -> Result<(), Trap> {
        ctx.set_f(index, Self::boxed(Self::to_bits(value)))
    }
}

struct Single;
struct Double;

impl Precision for Single {
    type Value = f32;

    const WIDTH: AccessWidth = AccessWidth::Word;
    const SIGN: u64 = 1 << 31;

    fn to_bits(value: f32) -> u64 {
        u64::from(value.to_bits())
    }

    fn from_bits(bits: u64) -> f32 {
        f32::from_bits(bits as u32)
    }

    fn unbox(raw: u64) -> u64 {
        if raw & BOX == BOX {
            raw & !BOX
        } else {
            u64::from(CANONICAL_SINGLE)
        }
    }

    fn boxed(bits: u64) -> u64 {
        BOX | (bits & !BOX)
    }

    fn arith(fpu: &dyn FloatUnit, op: FpOp, a: f32, b: f32) -> FpResult<f32> {
        fpu.arith_f32(op, a, b)
    }

    fn sqrt(fpu: &dyn FloatUnit, a: f32) -> FpResult<f32> {
        fpu.sqrt_f32(a)
    }

    fn fma(fpu: &dyn FloatUnit, a: f32, b: f32, c: f32) -> FpResult<f32> {
        fpu.fma_f32(a, b, c)
    }

    fn compare(fpu: &dyn FloatUnit, op: FpCompare, a: f32, b: f32) -> FpResult<bool> {
        fpu.compare_f32(op, a, b)
    }

    fn classify(fpu: &dyn FloatUnit, a: f32) -> FpClass {
        fpu.classify_f32(a)
    }

    fn to_int(fpu: &dyn FloatUnit, a: f32, format: IntFormat, rm: RoundingMode) -> FpResult<u64> {
        fpu.f32_to_int(a, format, rm)
    }

    fn from_int(fpu: &dyn FloatUnit, raw: u64, format: IntFormat, rm: RoundingMode) -> FpResult<f32> {
        fpu.int_to_f32(raw, format, rm)
    }
}

impl Precision for Double {
    type Value = f64;

    const WIDTH: AccessWidth = AccessWidth::Double;
    const SIGN: u64 = 1 << 63;

    fn to_bits(value: f64) -> u64 {
        value.to_bits()
    }

    fn from_bits(bits: u64) -> f64 {
        f64::from_bits(bits)
    }

    fn unbox(raw: u64) -> u64 {
        raw
    }

    fn boxed(bits: u64) -> u64 {
        bits
    }

    fn arith(fpu: &dyn FloatUnit, op: FpOp, a: f64, b: f64) -> FpResult<f64> {
        fpu.arith_f64(op, a, b)
    }

    fn sqrt(fpu: &dyn FloatUnit, a: f64) -> FpResult<f64> {
        fpu.sqrt_f64(a)
    }

    fn fma(fpu: &dyn FloatUnit, a: f64, b: f64, c: f64) -> FpResult<f64> {
        fpu.fma_f64(a, b, c)
    }

    fn compare(fpu: &dyn FloatUnit, op: FpCompare, a: f64, b: f64) -> FpResult<bool> {
        fpu.compare_f64(op, a, b)
    }

    fn classify(fpu: &dyn FloatUnit, a: f64) -> FpClass {
        fpu.classify_f64(a)
    }

    fn to_int(fpu: &dyn FloatUnit, a: f64, format: IntFormat, rm: RoundingMode) -> FpResult<u64> {
        fpu.f64_to_int(a, format, rm)
    }

    fn from_int(fpu: &dyn FloatUnit, raw: u64, format: IntFormat, rm: RoundingMode) -> FpResult<f64> {
        fpu.int_to_f64(raw, format, rm)
    }
}

/// Rounding mode selected by the instruction's `rm` field.
fn rounding(ctx: &ExecContext<'_>, word: InstructionWord) -> Result<RoundingMode, Trap> {
    let mut bits = funct3(word);
    if bits == DYNAMIC {
        bits = system::read(ctx.machine, FRM).map_err(|_| ctx.illegal())?;
    }
    RoundingMode::from_bits(bits).ok_or_else(|| ctx.illegal())
}

fn accrue(ctx: &mut ExecContext<'_>, flags: FpFlags) {
    if flags.is_empty() {
        return;
    }
    if let Some(fcsr) = ctx.machine.csrs.read(FCSR) {
        ctx.machine
            .csrs
            .write(FCSR, fcsr | u64::from(flags.bits()));
    }
}

fn finish<P: Precision>(
    ctx: &mut ExecContext<'_>,
    word: InstructionWord,
    result: FpResult<P::Value>,
) -> Result<(), Trap> {
    P::write(ctx, rd(word), result.value)?;
    accrue(ctx, result.flags);
    ctx.advance();
    Ok(())
}

fn finish_int(
    ctx: &mut ExecContext<'_>,
    word: InstructionWord,
    result: FpResult<u64>,
) -> Result<(), Trap> {
    ctx.set_x(rd(word), result.value)?;
    accrue(ctx, result.flags);
    ctx.advance();
    Ok(())
}

fn load<P: Precision>(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let addr = ctx.x(rs1(word))?.wrapping_add(imm_i(word));
    let bits = ctx.load(addr, P::WIDTH)?;
    ctx.set_f(rd(word), P::boxed(bits))?;
    ctx.advance();
    Ok(())
}

fn store<P: Precision>(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let addr = ctx.x(rs1(word))?.wrapping_add(imm_s(word));
    let bits = ctx.f(rs2(word))?;
    ctx.store(addr, P::WIDTH, bits)?;
    ctx.advance();
    Ok(())
}

fn arith<P: Precision>(ctx: &mut ExecContext<'_>, word: InstructionWord, op: FpOp) -> Result<(), Trap> {
    if !matches!(op, FpOp::Min | FpOp::Max) {
        rounding(ctx, word)?;
    }
    let a = P::read(ctx, rs1(word))?;
    let b = P::read(ctx, rs2(word))?;
    let result = P::arith(ctx.fpu, op, a, b);
    finish::<P>(ctx, word, result)
}

fn sqrt<P: Precision>(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    rounding(ctx, word)?;
    let a = P::read(ctx, rs1(word))?;
    let result = P::sqrt(ctx.fpu, a);
    finish::<P>(ctx, word, result)
}

fn negate<P: Precision>(value: P::Value) -> P::Value {
    P::from_bits(P::to_bits(value) ^ P::SIGN)
}

/// `±(a * b) ± c` with a single rounding.
fn fused<P: Precision>(
    ctx: &mut ExecContext<'_>,
    word: InstructionWord,
    negate_product: bool,
    negate_addend: bool,
) -> Result<(), Trap> {
    rounding(ctx, word)?;
    let mut a = P::read(ctx, rs1(word))?;
    let b = P::read(ctx, rs2(word))?;
    let mut c = P::read(ctx, rs3(word))?;
    if negate_product {
        a = negate::<P>(a);
    }
    if negate_addend {
        c = negate::<P>(c);
    }
    let result = P::fma(ctx.fpu, a, b, c);
    finish::<P>(ctx, word, result)
}

#[derive(Clone, Copy)]
enum SignSource {
    Copy,
    Negate,
    Xor,
}

fn inject_sign<P: Precision>(
    ctx: &mut ExecContext<'_>,
    word: InstructionWord,
    source: SignSource,
) -> Result<(), Trap> {
    let a = P::unbox(ctx.f(rs1(word))?);
    let b = P::unbox(ctx.f(rs2(word))?);
    let sign = match source {
        SignSource::Copy => b & P::SIGN,
        SignSource::Negate => !b & P::SIGN,
        SignSource::Xor => (a ^ b) & P::SIGN,
    };
    ctx.set_f(rd(word), P::boxed((a & !P::SIGN) | sign))?;
    ctx.advance();
    Ok(())
}

fn compare<P: Precision>(
    ctx: &mut ExecContext<'_>,
    word: InstructionWord,
    op: FpCompare,
) -> Result<(), Trap> {
    let a = P::read(ctx, rs1(word))?;
    let b = P::read(ctx, rs2(word))?;
    let result = P::compare(ctx.fpu, op, a, b);
    finish_int(
        ctx,
        word,
        FpResult {
            value: u64::from(result.value),
            flags: result.flags,
        },
    )
}

fn classify<P: Precision>(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let a = P::read(ctx, rs1(word))?;
    let class = P::classify(ctx.fpu, a);
    finish_int(ctx, word, FpResult::exact(class.mask()))
}

fn to_int<P: Precision>(
    ctx: &mut ExecContext<'_>,
    word: InstructionWord,
    format: IntFormat,
) -> Result<(), Trap> {
    let rm = rounding(ctx, word)?;
    let a = P::read(ctx, rs1(word))?;
    let mut result = P::to_int(ctx.fpu, a, format, rm);
    if matches!(format, IntFormat::I32 | IntFormat::U32) {
        result.value = sext32(result.value);
    }
    finish_int(ctx, word, result)
}

fn from_int<P: Precision>(
    ctx: &mut ExecContext<'_>,
    word: InstructionWord,
    format: IntFormat,
) -> Result<(), Trap> {
    let rm = rounding(ctx, word)?;
    let raw = ctx.x(rs1(word))?;
    let result = P::from_int(ctx.fpu, raw, format, rm);
    finish::<P>(ctx, word, result)
}

macro_rules! handlers {
    ($($name:ident => $callee:ident::<$p:ty>($($arg:expr),*);)*) => {
        $(
            fn $name(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
                $callee::<$p>(ctx, word $(, $arg)*)
            }
        )*
    };
}

handlers! {
    flw => load::<Single>();
    fsw => store::<Single>();
    fld => load::<Double>();
    fsd => store::<Double>();

    fmadd_s => fused::<Single>(false, false);
    fmsub_s => fused::<Single>(false, true);
    fnmsub_s => fused::<Single>(true, false);
    fnmadd_s => fused::<Single>(true, true);
    fmadd_d => fused::<Double>(false, false);
    fmsub_d => fused::<Double>(false, true);
    fnmsub_d => fused::<Double>(true, false);
    fnmadd_d => fused::<Double>(true, true);

    fadd_s => arith::<Single>(FpOp::Add);
    fsub_s => arith::<Single>(FpOp::Sub);
    fmul_s => arith::<Single>(FpOp::Mul);
    fdiv_s => arith::<Single>(FpOp::Div);
    fmin_s => arith::<Single>(FpOp::Min);
    fmax_s => arith::<Single>(FpOp::Max);
    fadd_d => arith::<Double>(FpOp::Add);
    fsub_d => arith::<Double>(FpOp::Sub);
    fmul_d => arith::<Double>(FpOp::Mul);
    fdiv_d => arith::<Double>(FpOp::Div);
    fmin_d => arith::<Double>(FpOp::Min);
    fmax_d => arith::<Double>(FpOp::Max);
    fsqrt_s => sqrt::<Single>();
    fsqrt_d => sqrt::<Double>();

    fsgnj_s => inject_sign::<Single>(SignSource::Copy);
    fsgnjn_s => inject_sign::<Single>(SignSource::Negate);
    fsgnjx_s => inject_sign::<Single>(SignSource::Xor);
    fsgnj_d => inject_sign::<Double>(SignSource::Copy);
    fsgnjn_d => inject_sign::<Double>(SignSource::Negate);
    fsgnjx_d => inject_sign::<Double>(SignSource::Xor);

    feq_s => compare::<Single>(FpCompare::Eq);
    flt_s => compare::<Single>(FpCompare::Lt);
    fle_s => compare::<Single>(FpCompare::Le);
    feq_d => compare::<Double>(FpCompare::Eq);
    flt_d => compare::<Double>(FpCompare::Lt);
    fle_d => compare::<Double>(FpCompare::Le);
    fclass_s => classify::<Single>();
    fclass_d => classify::<Double>();

    fcvt_w_s => to_int::<Single>(IntFormat::I32);
    fcvt_wu_s => to_int::<Single>(IntFormat::U32);
    fcvt_l_s => to_int::<Single>(IntFormat::I64);
    fcvt_lu_s => to_int::<Single>(IntFormat::U64);
    fcvt_w_d => to_int::<Double>(IntFormat::I32);
    fcvt_wu_d => to_int::<Double>(IntFormat::U32);
    fcvt_l_d => to_int::<Double>(IntFormat::I64);
    fcvt_lu_d => to_int::<Double>(IntFormat::U64);
    fcvt_s_w => from_int::<Single>(IntFormat::I32);
    fcvt_s_wu => from_int::<Single>(IntFormat::U32);
    fcvt_s_l => from_int::<Single>(IntFormat::I64);
    fcvt_s_lu => from_int::<Single>(IntFormat::U64);
    fcvt_d_w => from_int::<Double>(IntFormat::I32);
    fcvt_d_wu => from_int::<Double>(IntFormat::U32);
    fcvt_d_l => from_int::<Double>(IntFormat::I64);
    fcvt_d_lu => from_int::<Double>(IntFormat::U64);
}

fn fcvt_s_d(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let rm = rounding(ctx, word)?;
    let a = Double::read(ctx, rs1(word))?;
    let result = ctx.fpu.narrow(a, rm);
    finish::<Single>(ctx, word, result)
}

fn fcvt_d_s(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    rounding(ctx, word)?;
    let a = Single::read(ctx, rs1(word))?;
    let result = ctx.fpu.widen(a);
    finish::<Double>(ctx, word, result)
}

fn fmv_x_w(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let bits = ctx.f(rs1(word))?;
    ctx.set_x(rd(word), sext32(bits))?;
    ctx.advance();
    Ok(())
}

fn fmv_w_x(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let bits = ctx.x(rs1(word))?;
    ctx.set_f(rd(word), Single::boxed(bits))?;
    ctx.advance();
    Ok(())
}

fn fmv_x_d(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let bits = ctx.f(rs1(word))?;
    ctx.set_x(rd(word), bits)?;
    ctx.advance();
    Ok(())
}

fn fmv_d_x(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let bits = ctx.x(rs1(word))?;
    ctx.set_f(rd(word), bits)?;
    ctx.advance();
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{BOX, CANONICAL_SINGLE};
    use crate::api::{HaltingHost, Xlen};
    use crate::decoder::Matcher;
    use crate::encoding::{InstrWidth, InstructionWord};
    use crate::execute::{ExecContext, Handler};
    use crate::fault::{Trap, TrapKind};
    use crate::fpu::{FpFlags, HostFloat};
    use crate::isa::riscv::system::{self, FCSR, FFLAGS, FRM};
    use crate::isa::riscv::{isa, machine_config, Extensions};
    use crate::state::MachineState;

    const OP_FP: u32 = 0b101_0011;

    fn setup() -> (MachineState, Matcher<Handler>) {
        let machine = MachineState::new(&machine_config(Xlen::Bits64, Extensions::D))
            .expect("valid preset");
        let table = isa(Xlen::Bits64, Extensions::D);
        let matcher = Matcher::build(&table.entries, table.widths).expect("table");
        (machine, matcher)
    }

    fn r_type(funct7: u32, rs2: u32, rs1: u32, funct3: u32, rd: u32) -> u32 {
        (funct7 << 25) | (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | OP_FP
    }

    fn exec(machine: &mut MachineState, matcher: &Matcher<Handler>, bits: u32) -> Result<(), Trap> {
        let word = InstructionWord::new(u64::from(bits), InstrWidth::W32);
        let handler = matcher.resolve(word).expect("decodes").handler;
        let mut host = HaltingHost::new(10);
        let mut ctx = ExecContext::new(machine, &mut host, &HostFloat, 0, word);
        handler(&mut ctx, word)
    }

    fn set_single(machine: &mut MachineState, index: usize, value: f32) {
        machine
            .fregs
            .write(index, BOX | u64::from(value.to_bits()))
            .expect("freg");
    }

    #[test]
    fn single_add_is_nan_boxed() {
        let (mut machine, matcher) = setup();
        set_single(&mut machine, 1, 1.5);
        set_single(&mut machine, 2, 2.25);
        exec(&mut machine, &matcher, r_type(0b000_0000, 2, 1, 0b000, 3)).expect("fadd.s");
        assert_eq!(machine.fregs.read(3), Ok(BOX | u64::from(3.75f32.to_bits())));
        assert_eq!(system::read(&machine, FFLAGS), Ok(0));
    }

    #[test]
    fn improperly_boxed_single_reads_as_canonical_nan() {
        let (mut machine, matcher) = setup();
        machine.fregs.write(1, u64::from(1.0f32.to_bits())).expect("unboxed");
        set_single(&mut machine, 2, 1.0);
        exec(&mut machine, &matcher, r_type(0b000_0000, 2, 1, 0b000, 3)).expect("fadd.s");
        assert_eq!(machine.fregs.read(3), Ok(BOX | u64::from(CANONICAL_SINGLE)));
    }

    #[test]
    fn divide_by_zero_accrues_flags() {
        let (mut machine, matcher) = setup();
        machine.fregs.write(1, 1.0f64.to_bits()).expect("f1");
        machine.fregs.write(2, 0.0f64.to_bits()).expect("f2");
        exec(&mut machine, &matcher, r_type(0b000_1101, 2, 1, 0b000, 3)).expect("fdiv.d");
        assert_eq!(machine.fregs.read(3), Ok(f64::INFINITY.to_bits()));
        let flags = system::read(&machine, FFLAGS).expect("fflags");
        assert_eq!(flags, u64::from(FpFlags::DZ.bits()));
    }

    #[rstest]
    // rne, rtz, rdn, rup, rmm
    #[case(0b000, 2)]
    #[case(0b001, 2)]
    #[case(0b010, 2)]
    #[case(0b011, 3)]
    #[case(0b100, 3)]
    fn conversion_honours_static_rounding_mode(#[case] rm: u32, #[case] expected: u64) {
        let (mut machine, matcher) = setup();
        machine.fregs.write(1, 2.5f64.to_bits()).expect("f1");
        exec(&mut machine, &matcher, r_type(0b110_0001, 0, 1, rm, 5)).expect("fcvt.w.d");
        assert_eq!(machine.regs.read(5), Ok(expected));
        assert_eq!(system::read(&machine, FFLAGS), Ok(u64::from(FpFlags::NX.bits())));
    }

    #[test]
    fn negative_word_conversion_sign_extends() {
        let (mut machine, matcher) = setup();
        set_single(&mut machine, 1, -3.0);
        exec(&mut machine, &matcher, r_type(0b110_0000, 0, 1, 0b001, 5)).expect("fcvt.w.s");
        assert_eq!(machine.regs.read(5), Ok(u64::MAX - 2));
    }

    #[test]
    fn dynamic_rounding_reads_frm() {
        let (mut machine, matcher) = setup();
        system::write(&mut machine, FRM, 0b011).expect("frm");
        machine.fregs.write(1, 2.1f64.to_bits()).expect("f1");
        exec(&mut machine, &matcher, r_type(0b110_0001, 0, 1, 0b111, 5)).expect("fcvt.w.d");
        assert_eq!(machine.regs.read(5), Ok(3));
    }

    #[test]
    fn reserved_rounding_modes_are_illegal() {
        let (mut machine, matcher) = setup();
        let trap = exec(&mut machine, &matcher, r_type(0b000_0001, 2, 1, 0b101, 3))
            .expect_err("static rm 5");
        assert_eq!(trap.kind, TrapKind::IllegalInstruction);

        system::write(&mut machine, FRM, 0b110).expect("frm");
        let trap = exec(&mut machine, &matcher, r_type(0b000_0001, 2, 1, 0b111, 3))
            .expect_err("dynamic rm 6");
        assert_eq!(trap.kind, TrapKind::IllegalInstruction);
        assert_eq!(machine.fregs.read(3), Ok(0));
    }

    #[test]
    fn sign_injection_and_moves() {
        let (mut machine, matcher) = setup();
        set_single(&mut machine, 1, 2.0);
        set_single(&mut machine, 2, 5.0);
        // fsgnjn.s f3, f1, f2
        exec(&mut machine, &matcher, r_type(0b001_0000, 2, 1, 0b001, 3)).expect("fsgnjn.s");
        assert_eq!(machine.fregs.read(3), Ok(BOX | u64::from((-2.0f32).to_bits())));
        // fmv.x.w x5, f3
        exec(&mut machine, &matcher, r_type(0b111_0000, 0, 3, 0b000, 5)).expect("fmv.x.w");
        assert_eq!(machine.regs.read(5), Ok(0xFFFF_FFFF_C000_0000));
    }

    #[test]
    fn compare_and_classify_write_integer_registers() {
        let (mut machine, matcher) = setup();
        machine.fregs.write(1, 1.0f64.to_bits()).expect("f1");
        machine.fregs.write(2, f64::NAN.to_bits()).expect("f2");
        // flt.d x5, f1, f2 with a quiet NaN operand signals invalid
        exec(&mut machine, &matcher, r_type(0b101_0001, 2, 1, 0b001, 5)).expect("flt.d");
        assert_eq!(machine.regs.read(5), Ok(0));
        assert_eq!(system::read(&machine, FCSR), Ok(u64::from(FpFlags::NV.bits())));
        // fclass.d x6, f1: positive normal
        exec(&mut machine, &matcher, r_type(0b111_0001, 0, 1, 0b001, 6)).expect("fclass.d");
        assert_eq!(machine.regs.read(6), Ok(1 << 6));
    }

    #[test]
    fn fused_multiply_subtract() {
        let (mut machine, matcher) = setup();
        machine.fregs.write(1, 2.0f64.to_bits()).expect("f1");
        machine.fregs.write(2, 3.0f64.to_bits()).expect("f2");
        machine.fregs.write(3, 1.0f64.to_bits()).expect("f3");
        // fmsub.d f4, f1, f2, f3: 2 * 3 - 1
        let bits = (3 << 27) | (0b01 << 25) | (2 << 20) | (1 << 15) | (4 << 7) | 0b100_0111;
        exec(&mut machine, &matcher, bits).expect("fmsub.d");
        assert_eq!(machine.fregs.read(4), Ok(5.0f64.to_bits()));
        // fnmadd.d f4, f1, f2, f3: -(2 * 3) - 1
        let bits = (3 << 27) | (0b01 << 25) | (2 << 20) | (1 << 15) | (4 << 7) | 0b100_1111;
        exec(&mut machine, &matcher, bits).expect("fnmadd.d");
        assert_eq!(machine.fregs.read(4), Ok((-7.0f64).to_bits()));
    }

    #[test]
    fn precision_conversions() {
        let (mut machine, matcher) = setup();
        machine.fregs.write(1, 0.1f64.to_bits()).expect("f1");
        // fcvt.s.d f2, f1
        exec(&mut machine, &matcher, r_type(0b010_0000, 1, 1, 0b000, 2)).expect("fcvt.s.d");
        assert_eq!(machine.fregs.read(2), Ok(BOX | u64::from(0.1f32.to_bits())));
        // fcvt.d.s f3, f2
        exec(&mut machine, &matcher, r_type(0b010_0001, 0, 2, 0b000, 3)).expect("fcvt.d.s");
        assert_eq!(machine.fregs.read(3), Ok(f64::from(0.1f32).to_bits()));
    }
}
