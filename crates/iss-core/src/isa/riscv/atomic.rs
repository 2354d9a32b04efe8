//! A extension: load-reserved/store-conditional and atomic memory operations.
//!
//! A single hart owns the machine, so atomics are plain read-modify-write
//! sequences. One reservation is tracked in [`MachineState::reservation`];
//! any `sc` clears it.
//!
//! [`MachineState::reservation`]: crate::state::MachineState::reservation

#![allow(clippy::cast_sign_loss)]

use crate::api::Xlen;
use crate::encoding::{DecodeEntry, InstructionWord};
use crate::execute::{ExecContext, Handler};
use crate::fault::Trap;
use crate::memory::AccessWidth;
use crate::numeric::{sign_extend, truncate};

use super::entry;
use super::fields::{rd, rs1, rs2};

pub(super) fn entries(xlen: Xlen, out: &mut Vec<DecodeEntry<Handler>>) {
    out.extend([
        entry("lr.w", "00010 .. 00000 ..... 010 ..... 0101111", lr_w),
        entry("sc.w", "00011 .. ..... ..... 010 ..... 0101111", sc_w),
        entry("amoswap.w", "00001 .. ..... ..... 010 ..... 0101111", amoswap_w),
        entry("amoadd.w", "00000 .. ..... ..... 010 ..... 0101111", amoadd_w),
        entry("amoxor.w", "00100 .. ..... ..... 010 ..... 0101111", amoxor_w),
        entry("amoand.w", "01100 .. ..... ..... 010 ..... 0101111", amoand_w),
        entry("amoor.w", "01000 .. ..... ..... 010 ..... 0101111", amoor_w),
        entry("amomin.w", "10000 .. ..... ..... 010 ..... 0101111", amomin_w),
        entry("amomax.w", "10100 .. ..... ..... 010 ..... 0101111", amomax_w),
        entry("amominu.w", "11000 .. ..... ..... 010 ..... 0101111", amominu_w),
        entry("amomaxu.w", "11100 .. ..... ..... 010 ..... 0101111", amomaxu_w),
    ]);
    if xlen == Xlen::Bits64 {
        out.extend([
            entry("lr.d", "00010 .. 00000 ..... 011 ..... 0101111", lr_d),
            entry("sc.d", "00011 .. ..... ..... 011 ..... 0101111", sc_d),
            entry("amoswap.d", "00001 .. ..... ..... 011 ..... 0101111", amoswap_d),
            entry("amoadd.d", "00000 .. ..... ..... 011 ..... 0101111", amoadd_d),
            entry("amoxor.d", "00100 .. ..... ..... 011 ..... 0101111", amoxor_d),
            entry("amoand.d", "01100 .. ..... ..... 011 ..... 0101111", amoand_d),
            entry("amoor.d", "01000 .. ..... ..... 011 ..... 0101111", amoor_d),
            entry("amomin.d", "10000 .. ..... ..... 011 ..... 0101111", amomin_d),
            entry("amomax.d", "10100 .. ..... ..... 011 ..... 0101111", amomax_d),
            entry("amominu.d", "11000 .. ..... ..... 011 ..... 0101111", amominu_d),
            entry("amomaxu.d", "11100 .. ..... ..... 011 ..... 0101111", amomaxu_d),
        ]);
    }
}

const fn widen(value: u64, width: AccessWidth) -> u64 {
    sign_extend(value, width.bits()) as u64
}

fn load_reserved(
    ctx: &mut ExecContext<'_>,
    word: InstructionWord,
    width: AccessWidth,
) -> Result<(), Trap> {
    let addr = ctx.x(rs1(word))?;
    let value = ctx.load(addr, width)?;
    ctx.set_x(rd(word), widen(value, width))?;
    ctx.machine.reservation = Some(addr);
    ctx.advance();
    Ok(())
}

fn store_conditional(
    ctx: &mut ExecContext<'_>,
    word: InstructionWord,
    width: AccessWidth,
) -> Result<(), Trap> {
    let addr = ctx.x(rs1(word))?;
    let value = ctx.x(rs2(word))?;
    let reserved = ctx.machine.reservation == Some(addr);
    if reserved {
        ctx.store(addr, width, value)?;
    }
    ctx.machine.reservation = None;
    ctx.set_x(rd(word), u64::from(!reserved))?;
    ctx.advance();
    Ok(())
}

fn amo(
    ctx: &mut ExecContext<'_>,
    word: InstructionWord,
    width: AccessWidth,
    op: impl FnOnce(u64, u64, u32) -> u64,
) -> Result<(), Trap> {
    let addr = ctx.x(rs1(word))?;
    let src = ctx.x(rs2(word))?;
    let old = ctx.load(addr, width)?;
    ctx.store(addr, width, op(old, src, width.bits()))?;
    ctx.set_x(rd(word), widen(old, width))?;
    ctx.advance();
    Ok(())
}

fn min_signed(a: u64, b: u64, bits: u32) -> u64 {
    if sign_extend(a, bits) <= sign_extend(b, bits) {
        a
    } else {
        b
    }
}

fn max_signed(a: u64, b: u64, bits: u32) -> u64 {
    if sign_extend(a, bits) >= sign_extend(b, bits) {
        a
    } else {
        b
    }
}

fn min_unsigned(a: u64, b: u64, bits: u32) -> u64 {
    truncate(a, bits).min(truncate(b, bits))
}

fn max_unsigned(a: u64, b: u64, bits: u32) -> u64 {
    truncate(a, bits).max(truncate(b, bits))
}

macro_rules! atomics {
    ($width:expr, $lr:ident, $sc:ident, $swap:ident, $add:ident, $xor:ident, $and:ident,
     $or:ident, $min:ident, $max:ident, $minu:ident, $maxu:ident) => {
        fn $lr(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
            load_reserved(ctx, word, $width)
        }

        fn $sc(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
            store_conditional(ctx, word, $width)
        }

        fn $swap(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
            amo(ctx, word, $width, |_, src, _| src)
        }

        fn $add(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
            amo(ctx, word, $width, |old, src, _| old.wrapping_add(src))
        }

        fn $xor(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
            amo(ctx, word, $width, |old, src, _| old ^ src)
        }

        fn $and(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
            amo(ctx, word, $width, |old, src, _| old & src)
        }

        fn $or(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
            amo(ctx, word, $width, |old, src, _| old | src)
        }

        fn $min(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
            amo(ctx, word, $width, min_signed)
        }

        fn $max(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
            amo(ctx, word, $width, max_signed)
        }

        fn $minu(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
            amo(ctx, word, $width, min_unsigned)
        }

        fn $maxu(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
            amo(ctx, word, $width, max_unsigned)
        }
    };
}

atomics!(
    AccessWidth::Word,
    lr_w,
    sc_w,
    amoswap_w,
    amoadd_w,
    amoxor_w,
    amoand_w,
    amoor_w,
    amomin_w,
    amomax_w,
    amominu_w,
    amomaxu_w
);

atomics!(
    AccessWidth::Double,
    lr_d,
    sc_d,
    amoswap_d,
    amoadd_d,
    amoxor_d,
    amoand_d,
    amoor_d,
    amomin_d,
    amomax_d,
    amominu_d,
    amomaxu_d
);
