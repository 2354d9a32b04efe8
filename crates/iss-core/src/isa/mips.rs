//! MIPS-like 32-bit teaching ISA.
//!
//! Big-endian, fixed 32-bit encodings and `$zero` hard-wired. Branches and
//! jumps take effect immediately: there are no delay slots. `HI` and `LO`
//! are held in the CSR file at [`HI`] and [`LO`].
//!
//! Signed overflow on `add`, `sub` and `addi` is an architectural exception
//! with no place in the trap taxonomy, so those handlers report it as
//! `Unimplemented` and leave state untouched.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::unnecessary_wraps
)]

use crate::api::{MachineConfig, Xlen};
use crate::encoding::{DecodeEntry, InstrWidth, InstructionWord, WidthSelector};
use crate::execute::{ExecContext, Handler};
use crate::fault::Trap;
use crate::isa::Isa;
use crate::memory::{AccessWidth, Endianness};
use crate::numeric::{fits_signed, sign_extend};
use crate::state::{CsrDecl, RegisterFileConfig};

/// Conventional register names, `$` omitted.
pub const REGISTER_NAMES: [&str; 32] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5", "t6",
    "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1", "gp", "sp",
    "fp", "ra",
];

/// Register carrying the exit status of the `exit` system call (`$a0`).
pub const EXIT_REGISTER: usize = 4;

/// CSR slot holding `HI`.
pub const HI: u16 = 0;
/// CSR slot holding `LO`.
pub const LO: u16 = 1;

const RA: usize = 31;

/// Decode table.
#[must_use]
pub fn isa() -> Isa {
    let entries = vec![
        entry("sll", "000000 00000 ..... ..... ..... 000000", sll),
        entry("srl", "000000 00000 ..... ..... ..... 000010", srl),
        entry("sra", "000000 00000 ..... ..... ..... 000011", sra),
        entry("sllv", "000000 ..... ..... ..... 00000 000100", sllv),
        entry("srlv", "000000 ..... ..... ..... 00000 000110", srlv),
        entry("srav", "000000 ..... ..... ..... 00000 000111", srav),
        entry("jr", "000000 ..... 00000 00000 ..... 001000", jr),
        entry("jalr", "000000 ..... 00000 ..... ..... 001001", jalr),
        entry("syscall", "000000 .................... 001100", syscall),
        entry("break", "000000 .................... 001101", brk),
        entry("mfhi", "000000 00000 00000 ..... 00000 010000", mfhi),
        entry("mflo", "000000 00000 00000 ..... 00000 010010", mflo),
        entry("mult", "000000 ..... ..... 00000 00000 011000", mult),
        entry("multu", "000000 ..... ..... 00000 00000 011001", multu),
        entry("div", "000000 ..... ..... 00000 00000 011010", div),
        entry("divu", "000000 ..... ..... 00000 00000 011011", divu),
        entry("add", "000000 ..... ..... ..... 00000 100000", add),
        entry("addu", "000000 ..... ..... ..... 00000 100001", addu),
        entry("sub", "000000 ..... ..... ..... 00000 100010", sub),
        entry("subu", "000000 ..... ..... ..... 00000 100011", subu),
        entry("and", "000000 ..... ..... ..... 00000 100100", and),
        entry("or", "000000 ..... ..... ..... 00000 100101", or),
        entry("xor", "000000 ..... ..... ..... 00000 100110", xor),
        entry("nor", "000000 ..... ..... ..... 00000 100111", nor),
        entry("slt", "000000 ..... ..... ..... 00000 101010", slt),
        entry("sltu", "000000 ..... ..... ..... 00000 101011", sltu),
        entry("j", "000010 ..........................", j),
        entry("jal", "000011 ..........................", jal),
        entry("beq", "000100 ..... ..... ................", beq),
        entry("bne", "000101 ..... ..... ................", bne),
        entry("blez", "000110 ..... 00000 ................", blez),
        entry("bgtz", "000111 ..... 00000 ................", bgtz),
        entry("addi", "001000 ..... ..... ................", addi),
        entry("addiu", "001001 ..... ..... ................", addiu),
        entry("slti", "001010 ..... ..... ................", slti),
        entry("sltiu", "001011 ..... ..... ................", sltiu),
        entry("andi", "001100 ..... ..... ................", andi),
        entry("ori", "001101 ..... ..... ................", ori),
        entry("xori", "001110 ..... ..... ................", xori),
        entry("lui", "001111 00000 ..... ................", lui),
        entry("lb", "100000 ..... ..... ................", lb),
        entry("lh", "100001 ..... ..... ................", lh),
        entry("lw", "100011 ..... ..... ................", lw),
        entry("lbu", "100100 ..... ..... ................", lbu),
        entry("lhu", "100101 ..... ..... ................", lhu),
        entry("sb", "101000 ..... ..... ................", sb),
        entry("sh", "101001 ..... ..... ................", sh),
        entry("sw", "101011 ..... ..... ................", sw),
    ];
    Isa {
        name: "mips32",
        entries,
        widths: WidthSelector::fixed(InstrWidth::W32),
        register_names: &REGISTER_NAMES,
    }
}

/// Machine preset: big-endian, 32-bit, `$zero` hard-wired, `HI`/`LO` declared.
#[must_use]
pub fn machine_config() -> MachineConfig {
    MachineConfig {
        xlen: Xlen::Bits32,
        registers: RegisterFileConfig::with_zero(32, 32),
        float_registers: 0,
        memory_bytes: 1 << 20,
        endianness: Endianness::Big,
        reset_pc: 0,
        csrs: vec![CsrDecl { addr: HI, reset: 0 }, CsrDecl { addr: LO, reset: 0 }],
        tlb: None,
    }
}

fn entry(mnemonic: &'static str, pattern: &'static str, handler: Handler) -> DecodeEntry<Handler> {
    DecodeEntry::new(mnemonic, pattern, InstrWidth::W32, handler)
}

const fn rs(word: InstructionWord) -> usize {
    word.field(25, 21) as usize
}

const fn rt(word: InstructionWord) -> usize {
    word.field(20, 16) as usize
}

const fn rd(word: InstructionWord) -> usize {
    word.field(15, 11) as usize
}

const fn shamt(word: InstructionWord) -> u32 {
    word.field(10, 6) as u32
}

const fn simm(word: InstructionWord) -> u64 {
    sign_extend(word.field(15, 0), 16) as u64
}

const fn uimm(word: InstructionWord) -> u64 {
    word.field(15, 0)
}

const fn s32(value: u64) -> i64 {
    sign_extend(value, 32)
}

fn special(
    ctx: &mut ExecContext<'_>,
    word: InstructionWord,
    op: impl FnOnce(u64, u64) -> u64,
) -> Result<(), Trap> {
    let value = op(ctx.x(rs(word))?, ctx.x(rt(word))?);
    ctx.set_x(rd(word), value)?;
    ctx.advance();
    Ok(())
}

fn shift(
    ctx: &mut ExecContext<'_>,
    word: InstructionWord,
    op: impl FnOnce(u64, u32) -> u64,
) -> Result<(), Trap> {
    let value = op(ctx.x(rt(word))?, shamt(word));
    ctx.set_x(rd(word), value)?;
    ctx.advance();
    Ok(())
}

fn variable_shift(
    ctx: &mut ExecContext<'_>,
    word: InstructionWord,
    op: impl FnOnce(u64, u32) -> u64,
) -> Result<(), Trap> {
    let amount = (ctx.x(rs(word))? & 31) as u32;
    let value = op(ctx.x(rt(word))?, amount);
    ctx.set_x(rd(word), value)?;
    ctx.advance();
    Ok(())
}

fn immediate(
    ctx: &mut ExecContext<'_>,
    word: InstructionWord,
    op: impl FnOnce(u64, InstructionWord) -> u64,
) -> Result<(), Trap> {
    let value = op(ctx.x(rs(word))?, word);
    ctx.set_x(rt(word), value)?;
    ctx.advance();
    Ok(())
}

/// Signed 32-bit sum, or `Unimplemented` when it overflows.
fn checked(mnemonic: &'static str, a: u64, b: i64) -> Result<u64, Trap> {
    let sum = s32(a) + b;
    if fits_signed(sum, 32) {
        Ok(sum as u64)
    } else {
        Err(Trap::unimplemented(mnemonic))
    }
}

fn set_hilo(ctx: &mut ExecContext<'_>, hi: u64, lo: u64) -> Result<(), Trap> {
    if !(ctx.machine.csrs.contains(HI) && ctx.machine.csrs.contains(LO)) {
        return Err(ctx.illegal());
    }
    ctx.machine.csrs.write(HI, hi & 0xFFFF_FFFF);
    ctx.machine.csrs.write(LO, lo & 0xFFFF_FFFF);
    ctx.advance();
    Ok(())
}

fn move_from(ctx: &mut ExecContext<'_>, word: InstructionWord, addr: u16) -> Result<(), Trap> {
    let value = ctx.machine.csrs.read(addr).ok_or_else(|| ctx.illegal())?;
    ctx.set_x(rd(word), value)?;
    ctx.advance();
    Ok(())
}

fn branch(ctx: &mut ExecContext<'_>, word: InstructionWord, taken: bool) {
    if taken {
        let target = ctx.fallthrough().wrapping_add(simm(word) << 2);
        ctx.jump(target);
    } else {
        ctx.advance();
    }
}

fn load(
    ctx: &mut ExecContext<'_>,
    word: InstructionWord,
    width: AccessWidth,
    signed: bool,
) -> Result<(), Trap> {
    let addr = ctx.x(rs(word))?.wrapping_add(simm(word));
    let raw = ctx.load(addr, width)?;
    let value = if signed {
        sign_extend(raw, width.bits()) as u64
    } else {
        raw
    };
    ctx.set_x(rt(word), value)?;
    ctx.advance();
    Ok(())
}

fn store(ctx: &mut ExecContext<'_>, word: InstructionWord, width: AccessWidth) -> Result<(), Trap> {
    let addr = ctx.x(rs(word))?.wrapping_add(simm(word));
    let value = ctx.x(rt(word))?;
    ctx.store(addr, width, value)?;
    ctx.advance();
    Ok(())
}

fn sll(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    shift(ctx, word, |v, sh| v << sh)
}

fn srl(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    shift(ctx, word, |v, sh| v >> sh)
}

fn sra(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    shift(ctx, word, |v, sh| (s32(v) >> sh) as u64)
}

fn sllv(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    variable_shift(ctx, word, |v, sh| v << sh)
}

fn srlv(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    variable_shift(ctx, word, |v, sh| v >> sh)
}

fn srav(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    variable_shift(ctx, word, |v, sh| (s32(v) >> sh) as u64)
}

fn jr(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let target = ctx.x(rs(word))?;
    ctx.jump(target);
    Ok(())
}

fn jalr(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let target = ctx.x(rs(word))?;
    let link = ctx.fallthrough();
    ctx.set_x(rd(word), link)?;
    ctx.jump(target);
    Ok(())
}

fn syscall(ctx: &mut ExecContext<'_>, _word: InstructionWord) -> Result<(), Trap> {
    ctx.syscall()?;
    ctx.advance();
    Ok(())
}

fn brk(ctx: &mut ExecContext<'_>, _word: InstructionWord) -> Result<(), Trap> {
    ctx.breakpoint()?;
    ctx.advance();
    Ok(())
}

fn mfhi(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    move_from(ctx, word, HI)
}

fn mflo(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    move_from(ctx, word, LO)
}

fn mult(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let product = s32(ctx.x(rs(word))?) * s32(ctx.x(rt(word))?);
    set_hilo(ctx, (product >> 32) as u64, product as u64)
}

fn multu(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let product = ctx.x(rs(word))? * ctx.x(rt(word))?;
    set_hilo(ctx, product >> 32, product)
}

/// Division by zero leaves `HI` and `LO` unchanged.
fn div(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let a = s32(ctx.x(rs(word))?);
    let b = s32(ctx.x(rt(word))?);
    if b == 0 {
        ctx.advance();
        return Ok(());
    }
    set_hilo(ctx, (a % b) as u64, (a / b) as u64)
}

fn divu(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let a = ctx.x(rs(word))?;
    let b = ctx.x(rt(word))?;
    if b == 0 {
        ctx.advance();
        return Ok(());
    }
    set_hilo(ctx, a % b, a / b)
}

fn add(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let value = checked("add", ctx.x(rs(word))?, s32(ctx.x(rt(word))?))?;
    ctx.set_x(rd(word), value)?;
    ctx.advance();
    Ok(())
}

fn addu(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    special(ctx, word, u64::wrapping_add)
}

fn sub(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let value = checked("sub", ctx.x(rs(word))?, -s32(ctx.x(rt(word))?))?;
    ctx.set_x(rd(word), value)?;
    ctx.advance();
    Ok(())
}

fn subu(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    special(ctx, word, u64::wrapping_sub)
}

fn and(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    special(ctx, word, |a, b| a & b)
}

fn or(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    special(ctx, word, |a, b| a | b)
}

fn xor(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    special(ctx, word, |a, b| a ^ b)
}

fn nor(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    special(ctx, word, |a, b| !(a | b))
}

fn slt(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    special(ctx, word, |a, b| u64::from(s32(a) < s32(b)))
}

fn sltu(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    special(ctx, word, |a, b| u64::from(a < b))
}

fn j(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let region = ctx.fallthrough() & 0xF000_0000;
    ctx.jump(region | (word.field(25, 0) << 2));
    Ok(())
}

fn jal(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let link = ctx.fallthrough();
    ctx.set_x(RA, link)?;
    ctx.jump((link & 0xF000_0000) | (word.field(25, 0) << 2));
    Ok(())
}

fn beq(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let taken = ctx.x(rs(word))? == ctx.x(rt(word))?;
    branch(ctx, word, taken);
    Ok(())
}

fn bne(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let taken = ctx.x(rs(word))? != ctx.x(rt(word))?;
    branch(ctx, word, taken);
    Ok(())
}

fn blez(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let taken = s32(ctx.x(rs(word))?) <= 0;
    branch(ctx, word, taken);
    Ok(())
}

fn bgtz(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let taken = s32(ctx.x(rs(word))?) > 0;
    branch(ctx, word, taken);
    Ok(())
}

fn addi(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let value = checked("addi", ctx.x(rs(word))?, simm(word) as i64)?;
    ctx.set_x(rt(word), value)?;
    ctx.advance();
    Ok(())
}

fn addiu(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    immediate(ctx, word, |a, word| a.wrapping_add(simm(word)))
}

fn slti(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    immediate(ctx, word, |a, word| u64::from(s32(a) < simm(word) as i64))
}

fn sltiu(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    immediate(ctx, word, |a, word| u64::from(a < (simm(word) & 0xFFFF_FFFF)))
}

fn andi(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    immediate(ctx, word, |a, word| a & uimm(word))
}

fn ori(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    immediate(ctx, word, |a, word| a | uimm(word))
}

fn xori(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    immediate(ctx, word, |a, word| a ^ uimm(word))
}

fn lui(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    ctx.set_x(rt(word), uimm(word) << 16)?;
    ctx.advance();
    Ok(())
}

fn lb(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    load(ctx, word, AccessWidth::Byte, true)
}

fn lh(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    load(ctx, word, AccessWidth::Half, true)
}

fn lw(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    load(ctx, word, AccessWidth::Word, false)
}

fn lbu(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    load(ctx, word, AccessWidth::Byte, false)
}

fn lhu(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    load(ctx, word, AccessWidth::Half, false)
}

fn sb(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    store(ctx, word, AccessWidth::Byte)
}

fn sh(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    store(ctx, word, AccessWidth::Half)
}

fn sw(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    store(ctx, word, AccessWidth::Word)
}
