//! M extension: integer multiply and divide.
//!
//! Division never traps. Dividing by zero yields all ones (quotient) or the
//! dividend (remainder); the signed overflow case `MIN / -1` yields `MIN` and
//! a zero remainder.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

use crate::api::Xlen;
use crate::encoding::{DecodeEntry, InstructionWord};
use crate::execute::{ExecContext, Handler};
use crate::fault::Trap;
use crate::numeric::sign_extend;

use super::base::{reg_reg, sext32, signed};
use super::entry;

pub(super) fn entries(xlen: Xlen, out: &mut Vec<DecodeEntry<Handler>>) {
    out.extend([
        entry("mul", "0000001 ..... ..... 000 ..... 0110011", mul),
        entry("mulh", "0000001 ..... ..... 001 ..... 0110011", mulh),
        entry("mulhsu", "0000001 ..... ..... 010 ..... 0110011", mulhsu),
        entry("mulhu", "0000001 ..... ..... 011 ..... 0110011", mulhu),
        entry("div", "0000001 ..... ..... 100 ..... 0110011", div),
        entry("divu", "0000001 ..... ..... 101 ..... 0110011", divu),
        entry("rem", "0000001 ..... ..... 110 ..... 0110011", rem),
        entry("remu", "0000001 ..... ..... 111 ..... 0110011", remu),
    ]);
    if xlen == Xlen::Bits64 {
        out.extend([
            entry("mulw", "0000001 ..... ..... 000 ..... 0111011", mulw),
            entry("divw", "0000001 ..... ..... 100 ..... 0111011", divw),
            entry("divuw", "0000001 ..... ..... 101 ..... 0111011", divuw),
            entry("remw", "0000001 ..... ..... 110 ..... 0111011", remw),
            entry("remuw", "0000001 ..... ..... 111 ..... 0111011", remuw),
        ]);
    }
}

const fn signed_div(a: i64, b: i64) -> u64 {
    if b == 0 {
        u64::MAX
    } else {
        a.wrapping_div(b) as u64
    }
}

const fn signed_rem(a: i64, b: i64) -> u64 {
    if b == 0 {
        a as u64
    } else {
        a.wrapping_rem(b) as u64
    }
}

const fn unsigned_div(a: u64, b: u64) -> u64 {
    match a.checked_div(b) {
        Some(quotient) => quotient,
        None => u64::MAX,
    }
}

const fn unsigned_rem(a: u64, b: u64) -> u64 {
    match a.checked_rem(b) {
        Some(remainder) => remainder,
        None => a,
    }
}

fn mul(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, _| a.wrapping_mul(b))
}

fn mulh(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, xlen| {
        let product = i128::from(signed(a, xlen)) * i128::from(signed(b, xlen));
        (product >> xlen.bits()) as u64
    })
}

fn mulhsu(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, xlen| {
        let product = i128::from(signed(a, xlen)) * i128::from(b);
        (product >> xlen.bits()) as u64
    })
}

fn mulhu(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, xlen| {
        ((u128::from(a) * u128::from(b)) >> xlen.bits()) as u64
    })
}

fn div(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, xlen| signed_div(signed(a, xlen), signed(b, xlen)))
}

fn divu(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, _| unsigned_div(a, b))
}

fn rem(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, xlen| signed_rem(signed(a, xlen), signed(b, xlen)))
}

fn remu(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, _| unsigned_rem(a, b))
}

fn mulw(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, _| sext32(a.wrapping_mul(b)))
}

fn divw(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, _| {
        sext32(signed_div(sign_extend(a, 32), sign_extend(b, 32)))
    })
}

fn divuw(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, _| {
        sext32(unsigned_div(a & 0xFFFF_FFFF, b & 0xFFFF_FFFF))
    })
}

fn remw(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, _| {
        sext32(signed_rem(sign_extend(a, 32), sign_extend(b, 32)))
    })
}

fn remuw(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, _| {
        sext32(unsigned_rem(a & 0xFFFF_FFFF, b & 0xFFFF_FFFF))
    })
}
