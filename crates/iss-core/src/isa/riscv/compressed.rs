//! Compressed (C) subset.
//!
//! Encodings whose operand fields select between two instructions share one
//! decode entry and the handler picks the variant. Reserved operand values
//! trap as illegal.

#![allow(clippy::cast_sign_loss)]

use crate::api::Xlen;
use crate::encoding::{DecodeEntry, InstructionWord};
use crate::execute::{ExecContext, Handler};
use crate::fault::Trap;
use crate::memory::AccessWidth;
use crate::numeric::sign_extend;

use super::base::{sext32, signed};
use super::compact;
use super::fields::{
    c_addi16sp_imm, c_addi4spn_imm, c_branch_offset, c_imm6, c_jump_offset, c_lui_imm,
    c_lwsp_offset, c_rd, c_rd_prime, c_rs1_prime, c_rs2, c_shamt, c_swsp_offset, c_word_offset,
};

const RA: usize = 1;
const SP: usize = 2;

pub(super) fn entries(xlen: Xlen, out: &mut Vec<DecodeEntry<Handler>>) {
    out.extend([
        compact("c.addi4spn", "000 ........ ... 00", c_addi4spn),
        compact("c.lw", "010 ... ... .. ... 00", c_lw),
        compact("c.sw", "110 ... ... .. ... 00", c_sw),
        compact("c.addi", "000 . ..... ..... 01", c_addi),
        compact("c.li", "010 . ..... ..... 01", c_li),
        compact("c.lui/c.addi16sp", "011 . ..... ..... 01", c_lui_addi16sp),
        compact("c.srli", "100 . 00 ... ..... 01", c_srli),
        compact("c.srai", "100 . 01 ... ..... 01", c_srai),
        compact("c.andi", "100 . 10 ... ..... 01", c_andi),
        compact("c.sub", "100 0 11 ... 00 ... 01", c_sub),
        compact("c.xor", "100 0 11 ... 01 ... 01", c_xor),
        compact("c.or", "100 0 11 ... 10 ... 01", c_or),
        compact("c.and", "100 0 11 ... 11 ... 01", c_and),
        compact("c.j", "101 ........... 01", c_j),
        compact("c.beqz", "110 ... ... ..... 01", c_beqz),
        compact("c.bnez", "111 ... ... ..... 01", c_bnez),
        compact("c.slli", "000 . ..... ..... 10", c_slli),
        compact("c.lwsp", "010 . ..... ..... 10", c_lwsp),
        compact("c.mv/c.jr", "100 0 ..... ..... 10", c_mv_jr),
        compact("c.add/c.jalr/c.ebreak", "100 1 ..... ..... 10", c_add_jalr_ebreak),
        compact("c.swsp", "110 ...... ..... 10", c_swsp),
    ]);
    out.push(match xlen {
        Xlen::Bits32 => compact("c.jal", "001 ........... 01", c_jal),
        Xlen::Bits64 => compact("c.addiw", "001 . ..... ..... 01", c_addiw),
    });
}

fn write_and_advance(ctx: &mut ExecContext<'_>, index: usize, value: u64) -> Result<(), Trap> {
    ctx.set_x(index, value)?;
    ctx.advance();
    Ok(())
}

fn load_word(ctx: &mut ExecContext<'_>, rd: usize, addr: u64) -> Result<(), Trap> {
    let raw = ctx.load(addr, AccessWidth::Word)?;
    write_and_advance(ctx, rd, sign_extend(raw, 32) as u64)
}

fn store_word(ctx: &mut ExecContext<'_>, src: usize, addr: u64) -> Result<(), Trap> {
    let value = ctx.x(src)?;
    ctx.store(addr, AccessWidth::Word, value)?;
    ctx.advance();
    Ok(())
}

/// Rejects shift amounts that do not fit the register width.
fn shamt(ctx: &ExecContext<'_>, word: InstructionWord) -> Result<u32, Trap> {
    let sh = c_shamt(word);
    if sh >= ctx.xlen().bits() {
        return Err(ctx.illegal());
    }
    Ok(sh)
}

fn c_addi4spn(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let imm = c_addi4spn_imm(word);
    if imm == 0 {
        return Err(ctx.illegal());
    }
    let value = ctx.x(SP)?.wrapping_add(imm);
    write_and_advance(ctx, c_rd_prime(word), value)
}

fn c_lw(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let addr = ctx.x(c_rs1_prime(word))?.wrapping_add(c_word_offset(word));
    load_word(ctx, c_rd_prime(word), addr)
}

fn c_sw(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let addr = ctx.x(c_rs1_prime(word))?.wrapping_add(c_word_offset(word));
    store_word(ctx, c_rd_prime(word), addr)
}

fn c_addi(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let rd = c_rd(word);
    let value = ctx.x(rd)?.wrapping_add(c_imm6(word));
    write_and_advance(ctx, rd, value)
}

fn c_jal(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let link = ctx.fallthrough();
    ctx.set_x(RA, link)?;
    ctx.jump(ctx.pc().wrapping_add(c_jump_offset(word)));
    Ok(())
}

fn c_addiw(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let rd = c_rd(word);
    if rd == 0 {
        return Err(ctx.illegal());
    }
    let value = sext32(ctx.x(rd)?.wrapping_add(c_imm6(word)));
    write_and_advance(ctx, rd, value)
}

fn c_li(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    write_and_advance(ctx, c_rd(word), c_imm6(word))
}

fn c_lui_addi16sp(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let rd = c_rd(word);
    if rd == SP {
        let imm = c_addi16sp_imm(word);
        if imm == 0 {
            return Err(ctx.illegal());
        }
        let value = ctx.x(SP)?.wrapping_add(imm);
        return write_and_advance(ctx, SP, value);
    }
    let imm = c_lui_imm(word);
    if imm == 0 {
        return Err(ctx.illegal());
    }
    write_and_advance(ctx, rd, imm)
}

fn c_srli(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let sh = shamt(ctx, word)?;
    let rd = c_rs1_prime(word);
    let value = ctx.x(rd)? >> sh;
    write_and_advance(ctx, rd, value)
}

fn c_srai(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let sh = shamt(ctx, word)?;
    let rd = c_rs1_prime(word);
    let value = (signed(ctx.x(rd)?, ctx.xlen()) >> sh) as u64;
    write_and_advance(ctx, rd, value)
}

fn c_andi(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let rd = c_rs1_prime(word);
    let value = ctx.x(rd)? & c_imm6(word);
    write_and_advance(ctx, rd, value)
}

fn c_arith(
    ctx: &mut ExecContext<'_>,
    word: InstructionWord,
    op: impl FnOnce(u64, u64) -> u64,
) -> Result<(), Trap> {
    let rd = c_rs1_prime(word);
    let value = op(ctx.x(rd)?, ctx.x(c_rd_prime(word))?);
    write_and_advance(ctx, rd, value)
}

fn c_sub(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    c_arith(ctx, word, u64::wrapping_sub)
}

fn c_xor(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    c_arith(ctx, word, |a, b| a ^ b)
}

fn c_or(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    c_arith(ctx, word, |a, b| a | b)
}

fn c_and(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    c_arith(ctx, word, |a, b| a & b)
}

fn c_j(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    ctx.jump(ctx.pc().wrapping_add(c_jump_offset(word)));
    Ok(())
}

fn c_branch(ctx: &mut ExecContext<'_>, word: InstructionWord, on_zero: bool) -> Result<(), Trap> {
    if (ctx.x(c_rs1_prime(word))? == 0) == on_zero {
        ctx.jump(ctx.pc().wrapping_add(c_branch_offset(word)));
    } else {
        ctx.advance();
    }
    Ok(())
}

fn c_beqz(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    c_branch(ctx, word, true)
}

fn c_bnez(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    c_branch(ctx, word, false)
}

fn c_slli(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let sh = shamt(ctx, word)?;
    let rd = c_rd(word);
    let value = ctx.x(rd)? << sh;
    write_and_advance(ctx, rd, value)
}

fn c_lwsp(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let rd = c_rd(word);
    if rd == 0 {
        return Err(ctx.illegal());
    }
    let addr = ctx.x(SP)?.wrapping_add(c_lwsp_offset(word));
    load_word(ctx, rd, addr)
}

fn c_swsp(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let addr = ctx.x(SP)?.wrapping_add(c_swsp_offset(word));
    store_word(ctx, c_rs2(word), addr)
}

fn c_mv_jr(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let rd = c_rd(word);
    let rs2 = c_rs2(word);
    if rs2 != 0 {
        let value = ctx.x(rs2)?;
        return write_and_advance(ctx, rd, value);
    }
    if rd == 0 {
        return Err(ctx.illegal());
    }
    let target = ctx.x(rd)? & !1;
    ctx.jump(target);
    Ok(())
}

fn c_add_jalr_ebreak(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let rd = c_rd(word);
    let rs2 = c_rs2(word);
    if rs2 != 0 {
        let value = ctx.x(rd)?.wrapping_add(ctx.x(rs2)?);
        return write_and_advance(ctx, rd, value);
    }
    if rd == 0 {
        ctx.breakpoint()?;
        ctx.advance();
        return Ok(());
    }
    let target = ctx.x(rd)? & !1;
    let link = ctx.fallthrough();
    ctx.set_x(RA, link)?;
    ctx.jump(target);
    Ok(())
}
