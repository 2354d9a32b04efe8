//! RV32I / RV64I base integer instructions.

#![allow(clippy::cast_sign_loss, clippy::unnecessary_wraps)]

use crate::api::Xlen;
use crate::encoding::{DecodeEntry, InstructionWord};
use crate::execute::{ExecContext, Handler};
use crate::fault::Trap;
use crate::memory::AccessWidth;
use crate::numeric::sign_extend;

use super::entry;
use super::fields::{imm_b, imm_i, imm_j, imm_s, imm_u, rd, rs1, rs2, shamt};

pub(super) fn entries(xlen: Xlen, out: &mut Vec<DecodeEntry<Handler>>) {
    out.extend([
        entry("lui", ".................... ..... 0110111", lui),
        entry("auipc", ".................... ..... 0010111", auipc),
        entry("jal", ".................... ..... 1101111", jal),
        entry("jalr", "............ ..... 000 ..... 1100111", jalr),
        entry("beq", "....... ..... ..... 000 ..... 1100011", beq),
        entry("bne", "....... ..... ..... 001 ..... 1100011", bne),
        entry("blt", "....... ..... ..... 100 ..... 1100011", blt),
        entry("bge", "....... ..... ..... 101 ..... 1100011", bge),
        entry("bltu", "....... ..... ..... 110 ..... 1100011", bltu),
        entry("bgeu", "....... ..... ..... 111 ..... 1100011", bgeu),
        entry("lb", "............ ..... 000 ..... 0000011", lb),
        entry("lh", "............ ..... 001 ..... 0000011", lh),
        entry("lw", "............ ..... 010 ..... 0000011", lw),
        entry("lbu", "............ ..... 100 ..... 0000011", lbu),
        entry("lhu", "............ ..... 101 ..... 0000011", lhu),
        entry("sb", "....... ..... ..... 000 ..... 0100011", sb),
        entry("sh", "....... ..... ..... 001 ..... 0100011", sh),
        entry("sw", "....... ..... ..... 010 ..... 0100011", sw),
        entry("addi", "............ ..... 000 ..... 0010011", addi),
        entry("slti", "............ ..... 010 ..... 0010011", slti),
        entry("sltiu", "............ ..... 011 ..... 0010011", sltiu),
        entry("xori", "............ ..... 100 ..... 0010011", xori),
        entry("ori", "............ ..... 110 ..... 0010011", ori),
        entry("andi", "............ ..... 111 ..... 0010011", andi),
        entry("add", "0000000 ..... ..... 000 ..... 0110011", add),
        entry("sub", "0100000 ..... ..... 000 ..... 0110011", sub),
        entry("sll", "0000000 ..... ..... 001 ..... 0110011", sll),
        entry("slt", "0000000 ..... ..... 010 ..... 0110011", slt),
        entry("sltu", "0000000 ..... ..... 011 ..... 0110011", sltu),
        entry("xor", "0000000 ..... ..... 100 ..... 0110011", xor),
        entry("srl", "0000000 ..... ..... 101 ..... 0110011", srl),
        entry("sra", "0100000 ..... ..... 101 ..... 0110011", sra),
        entry("or", "0000000 ..... ..... 110 ..... 0110011", or),
        entry("and", "0000000 ..... ..... 111 ..... 0110011", and),
        entry("fence", "............ ..... 000 ..... 0001111", fence),
        entry("fence.i", "............ ..... 001 ..... 0001111", fence),
        entry("ecall", "000000000000 00000 000 00000 1110011", ecall),
        entry("ebreak", "000000000001 00000 000 00000 1110011", ebreak),
    ]);

    match xlen {
        Xlen::Bits32 => out.extend([
            entry("slli", "0000000 ..... ..... 001 ..... 0010011", slli),
            entry("srli", "0000000 ..... ..... 101 ..... 0010011", srli),
            entry("srai", "0100000 ..... ..... 101 ..... 0010011", srai),
        ]),
        Xlen::Bits64 => out.extend([
            entry("slli", "000000 ...... ..... 001 ..... 0010011", slli),
            entry("srli", "000000 ...... ..... 101 ..... 0010011", srli),
            entry("srai", "010000 ...... ..... 101 ..... 0010011", srai),
            entry("lwu", "............ ..... 110 ..... 0000011", lwu),
            entry("ld", "............ ..... 011 ..... 0000011", ld),
            entry("sd", "....... ..... ..... 011 ..... 0100011", sd),
            entry("addiw", "............ ..... 000 ..... 0011011", addiw),
            entry("slliw", "0000000 ..... ..... 001 ..... 0011011", slliw),
            entry("srliw", "0000000 ..... ..... 101 ..... 0011011", srliw),
            entry("sraiw", "0100000 ..... ..... 101 ..... 0011011", sraiw),
            entry("addw", "0000000 ..... ..... 000 ..... 0111011", addw),
            entry("subw", "0100000 ..... ..... 000 ..... 0111011", subw),
            entry("sllw", "0000000 ..... ..... 001 ..... 0111011", sllw),
            entry("srlw", "0000000 ..... ..... 101 ..... 0111011", srlw),
            entry("sraw", "0100000 ..... ..... 101 ..... 0111011", sraw),
        ]),
    }
}

/// `value` interpreted as a signed `xlen`-bit integer.
pub(super) const fn signed(value: u64, xlen: Xlen) -> i64 {
    sign_extend(value, xlen.bits())
}

/// Low word of `value`, sign-extended to 64 bits.
pub(super) const fn sext32(value: u64) -> u64 {
    sign_extend(value, 32) as u64
}

fn shift_mask(xlen: Xlen) -> u64 {
    u64::from(xlen.bits()) - 1
}

pub(super) fn reg_reg(
    ctx: &mut ExecContext<'_>,
    word: InstructionWord,
    op: impl FnOnce(u64, u64, Xlen) -> u64,
) -> Result<(), Trap> {
    let value = op(ctx.x(rs1(word))?, ctx.x(rs2(word))?, ctx.xlen());
    ctx.set_x(rd(word), value)?;
    ctx.advance();
    Ok(())
}

fn reg_imm(
    ctx: &mut ExecContext<'_>,
    word: InstructionWord,
    op: impl FnOnce(u64, u64, Xlen) -> u64,
) -> Result<(), Trap> {
    let value = op(ctx.x(rs1(word))?, imm_i(word), ctx.xlen());
    ctx.set_x(rd(word), value)?;
    ctx.advance();
    Ok(())
}

fn reg_shamt(
    ctx: &mut ExecContext<'_>,
    word: InstructionWord,
    op: impl FnOnce(u64, u32, Xlen) -> u64,
) -> Result<(), Trap> {
    let value = op(ctx.x(rs1(word))?, shamt(word), ctx.xlen());
    ctx.set_x(rd(word), value)?;
    ctx.advance();
    Ok(())
}

fn branch(
    ctx: &mut ExecContext<'_>,
    word: InstructionWord,
    taken: impl FnOnce(u64, u64, Xlen) -> bool,
) -> Result<(), Trap> {
    if taken(ctx.x(rs1(word))?, ctx.x(rs2(word))?, ctx.xlen()) {
        ctx.jump(ctx.pc().wrapping_add(imm_b(word)));
    } else {
        ctx.advance();
    }
    Ok(())
}

fn load(
    ctx: &mut ExecContext<'_>,
    word: InstructionWord,
    width: AccessWidth,
    signed: bool,
) -> Result<(), Trap> {
    let addr = ctx.x(rs1(word))?.wrapping_add(imm_i(word));
    let raw = ctx.load(addr, width)?;
    let value = if signed {
        sign_extend(raw, width.bits()) as u64
    } else {
        raw
    };
    ctx.set_x(rd(word), value)?;
    ctx.advance();
    Ok(())
}

fn store(ctx: &mut ExecContext<'_>, word: InstructionWord, width: AccessWidth) -> Result<(), Trap> {
    let addr = ctx.x(rs1(word))?.wrapping_add(imm_s(word));
    let value = ctx.x(rs2(word))?;
    ctx.store(addr, width, value)?;
    ctx.advance();
    Ok(())
}

fn lui(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    ctx.set_x(rd(word), imm_u(word))?;
    ctx.advance();
    Ok(())
}

fn auipc(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    ctx.set_x(rd(word), ctx.pc().wrapping_add(imm_u(word)))?;
    ctx.advance();
    Ok(())
}

fn jal(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let link = ctx.fallthrough();
    ctx.set_x(rd(word), link)?;
    ctx.jump(ctx.pc().wrapping_add(imm_j(word)));
    Ok(())
}

fn jalr(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    let target = ctx.x(rs1(word))?.wrapping_add(imm_i(word)) & !1;
    let link = ctx.fallthrough();
    ctx.set_x(rd(word), link)?;
    ctx.jump(target);
    Ok(())
}

fn beq(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    branch(ctx, word, |a, b, _| a == b)
}

fn bne(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    branch(ctx, word, |a, b, _| a != b)
}

fn blt(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    branch(ctx, word, |a, b, xlen| signed(a, xlen) < signed(b, xlen))
}

fn bge(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    branch(ctx, word, |a, b, xlen| signed(a, xlen) >= signed(b, xlen))
}

fn bltu(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    branch(ctx, word, |a, b, _| a < b)
}

fn bgeu(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    branch(ctx, word, |a, b, _| a >= b)
}

fn lb(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    load(ctx, word, AccessWidth::Byte, true)
}

fn lh(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    load(ctx, word, AccessWidth::Half, true)
}

fn lw(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    load(ctx, word, AccessWidth::Word, true)
}

fn ld(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    load(ctx, word, AccessWidth::Double, false)
}

fn lbu(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    load(ctx, word, AccessWidth::Byte, false)
}

fn lhu(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    load(ctx, word, AccessWidth::Half, false)
}

fn lwu(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    load(ctx, word, AccessWidth::Word, false)
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

fn sd(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    store(ctx, word, AccessWidth::Double)
}

fn addi(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_imm(ctx, word, |a, imm, _| a.wrapping_add(imm))
}

fn slti(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_imm(ctx, word, |a, imm, xlen| {
        u64::from(signed(a, xlen) < signed(imm, xlen))
    })
}

fn sltiu(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_imm(ctx, word, |a, imm, xlen| u64::from(a < (imm & xlen.mask())))
}

fn xori(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_imm(ctx, word, |a, imm, _| a ^ imm)
}

fn ori(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_imm(ctx, word, |a, imm, _| a | imm)
}

fn andi(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_imm(ctx, word, |a, imm, _| a & imm)
}

fn slli(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_shamt(ctx, word, |a, sh, _| a << sh)
}

fn srli(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_shamt(ctx, word, |a, sh, _| a >> sh)
}

fn srai(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_shamt(ctx, word, |a, sh, xlen| (signed(a, xlen) >> sh) as u64)
}

fn add(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, _| a.wrapping_add(b))
}

fn sub(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, _| a.wrapping_sub(b))
}

fn sll(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, xlen| a << (b & shift_mask(xlen)))
}

fn slt(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, xlen| {
        u64::from(signed(a, xlen) < signed(b, xlen))
    })
}

fn sltu(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, _| u64::from(a < b))
}

fn xor(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, _| a ^ b)
}

fn srl(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, xlen| a >> (b & shift_mask(xlen)))
}

fn sra(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, xlen| {
        (signed(a, xlen) >> (b & shift_mask(xlen))) as u64
    })
}

fn or(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, _| a | b)
}

fn and(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, _| a & b)
}

fn addiw(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_imm(ctx, word, |a, imm, _| sext32(a.wrapping_add(imm)))
}

fn slliw(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_shamt(ctx, word, |a, sh, _| sext32(a << sh))
}

fn srliw(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_shamt(ctx, word, |a, sh, _| sext32((a & 0xFFFF_FFFF) >> sh))
}

fn sraiw(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_shamt(ctx, word, |a, sh, _| (sign_extend(a, 32) >> sh) as u64)
}

fn addw(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, _| sext32(a.wrapping_add(b)))
}

fn subw(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, _| sext32(a.wrapping_sub(b)))
}

fn sllw(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, _| sext32(a << (b & 31)))
}

fn srlw(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, _| sext32((a & 0xFFFF_FFFF) >> (b & 31)))
}

fn sraw(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    reg_reg(ctx, word, |a, b, _| (sign_extend(a, 32) >> (b & 31)) as u64)
}

fn fence(ctx: &mut ExecContext<'_>, _word: InstructionWord) -> Result<(), Trap> {
    ctx.advance();
    Ok(())
}

fn ecall(ctx: &mut ExecContext<'_>, _word: InstructionWord) -> Result<(), Trap> {
    ctx.syscall()?;
    ctx.advance();
    Ok(())
}

fn ebreak(ctx: &mut ExecContext<'_>, _word: InstructionWord) -> Result<(), Trap> {
    ctx.breakpoint()?;
    ctx.advance();
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::api::{HaltingHost, Xlen};
    use crate::encoding::{InstrWidth, InstructionWord};
    use crate::execute::ExecContext;
    use crate::fault::TrapKind;
    use crate::fpu::HostFloat;
    use crate::isa::riscv::{machine_config, Extensions};
    use crate::state::MachineState;

    fn exec(xlen: Xlen, setup: &[(usize, u64)], bits: u32) -> MachineState {
        let mut machine =
            MachineState::new(&machine_config(xlen, Extensions::NONE)).expect("valid preset");
        for &(reg, value) in setup {
            machine.regs.write(reg, value).expect("register");
        }
        let table = super::super::isa(xlen, Extensions::NONE);
        let matcher = crate::decoder::Matcher::build(&table.entries, table.widths).expect("table");
        let word = InstructionWord::new(u64::from(bits), InstrWidth::W32);
        let resolved = matcher.resolve(word).expect("decodes");
        let mut host = HaltingHost::new(10);
        let mut ctx = ExecContext::new(&mut machine, &mut host, &HostFloat, 0x100, word);
        (resolved.handler)(&mut ctx, word).expect("executes");
        machine
    }

    #[rstest]
    // add x3, x1, x2
    #[case(Xlen::Bits32, 0x0020_81B3, 7, 5, 12)]
    // sub x3, x1, x2
    #[case(Xlen::Bits32, 0x4020_81B3, 5, 7, 0xFFFF_FFFE)]
    #[case(Xlen::Bits64, 0x4020_81B3, 5, 7, u64::MAX - 1)]
    // slt x3, x1, x2
    #[case(Xlen::Bits32, 0x0020_A1B3, 0xFFFF_FFFF, 1, 1)]
    // sltu x3, x1, x2
    #[case(Xlen::Bits32, 0x0020_B1B3, 0xFFFF_FFFF, 1, 0)]
    // sra x3, x1, x2
    #[case(Xlen::Bits32, 0x4020_D1B3, 0x8000_0000, 4, 0xF800_0000)]
    // srl x3, x1, x2
    #[case(Xlen::Bits32, 0x0020_D1B3, 0x8000_0000, 4, 0x0800_0000)]
    // sll x3, x1, x2 (shift amount masked to five bits)
    #[case(Xlen::Bits32, 0x0020_91B3, 1, 33, 2)]
    // addw x3, x1, x2
    #[case(Xlen::Bits64, 0x0020_81BB, 0x7FFF_FFFF, 1, 0xFFFF_FFFF_8000_0000)]
    fn register_register_ops(
        #[case] xlen: Xlen,
        #[case] bits: u32,
        #[case] a: u64,
        #[case] b: u64,
        #[case] expected: u64,
    ) {
        let machine = exec(xlen, &[(1, a), (2, b)], bits);
        assert_eq!(machine.regs.read(3), Ok(expected));
        assert_eq!(machine.pc, 0x104);
    }

    #[test]
    fn writes_to_x0_are_discarded() {
        // addi x0, x0, 5
        let machine = exec(Xlen::Bits32, &[], 0x0050_0013);
        assert_eq!(machine.regs.read(0), Ok(0));
    }

    #[test]
    fn jal_links_and_jumps() {
        // jal x1, -4
        let machine = exec(Xlen::Bits32, &[], 0xFFDF_F0EF);
        assert_eq!(machine.regs.read(1), Ok(0x104));
        assert_eq!(machine.pc, 0xFC);
    }

    #[test]
    fn jalr_clears_the_low_bit() {
        // jalr x1, 3(x2)
        let machine = exec(Xlen::Bits32, &[(2, 0x200)], 0x0031_00E7);
        assert_eq!(machine.pc, 0x202);
        assert_eq!(machine.regs.read(1), Ok(0x104));
    }

    #[test]
    fn taken_branch_is_pc_relative() {
        // beq x0, x0, -8
        let machine = exec(Xlen::Bits32, &[], 0xFE00_0CE3);
        assert_eq!(machine.pc, 0xF8);
    }

    #[test]
    fn loads_sign_and_zero_extend() {
        let mut machine = exec(Xlen::Bits64, &[(1, 0x400), (2, 0x80)], 0x0020_8023); // sb x2, 0(x1)
        assert_eq!(machine.memory.read(0x400, crate::memory::AccessWidth::Byte), Ok(0x80));
        machine.regs.write(1, 0x400).expect("x1");
        let mut host = HaltingHost::new(10);
        let table = super::super::isa(Xlen::Bits64, Extensions::NONE);
        let matcher = crate::decoder::Matcher::build(&table.entries, table.widths).expect("table");
        for (bits, expected) in [(0x0000_8183_u32, u64::MAX - 0x7F), (0x0000_C183, 0x80)] {
            let word = InstructionWord::new(u64::from(bits), InstrWidth::W32);
            let handler = matcher.resolve(word).expect("load").handler;
            let mut ctx = ExecContext::new(&mut machine, &mut host, &HostFloat, 0, word);
            handler(&mut ctx, word).expect("in bounds");
            assert_eq!(machine.regs.read(3), Ok(expected));
        }
    }

    #[test]
    fn out_of_bounds_load_traps_without_writing() {
        let mut machine = MachineState::new(&machine_config(Xlen::Bits32, Extensions::NONE))
            .expect("valid preset");
        machine.regs.write(1, 0xFFFF_FFF0).expect("x1");
        machine.regs.write(3, 9).expect("x3");
        let table = super::super::isa(Xlen::Bits32, Extensions::NONE);
        let matcher = crate::decoder::Matcher::build(&table.entries, table.widths).expect("table");
        // lw x3, 0(x1)
        let word = InstructionWord::new(0x0000_A183, InstrWidth::W32);
        let handler = matcher.resolve(word).expect("lw").handler;
        let mut host = HaltingHost::new(10);
        let mut ctx = ExecContext::new(&mut machine, &mut host, &HostFloat, 0, word);
        let trap = handler(&mut ctx, word).expect_err("beyond memory");
        assert_eq!(trap.kind, TrapKind::OutOfBounds);
        assert_eq!(machine.regs.read(3), Ok(9));
        assert_eq!(machine.pc, 0);
    }
}
