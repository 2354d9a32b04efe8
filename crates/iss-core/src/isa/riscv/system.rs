//! Zicsr and the machine-mode privileged instructions.
//!
//! CSR storage lives in the machine's [`CsrFile`]; this module layers the
//! RISC-V access rules on top of it:
//! - addresses with bits `[11:10] == 0b11` are read-only;
//! - the counters are derived from the retired-instruction count;
//! - `fflags` and `frm` are views onto `fcsr`;
//! - `misa` ignores writes.
//!
//! [`CsrFile`]: crate::state::CsrFile

#![allow(clippy::unnecessary_wraps)]

use crate::api::Xlen;
use crate::encoding::{DecodeEntry, InstructionWord};
use crate::execute::{ExecContext, Handler};
use crate::fault::Trap;
use crate::state::{CsrDecl, MachineState};

use super::fields::{csr, rd, rs1};
use super::{entry, Extensions};

/// Accrued floating-point exception flags.
pub const FFLAGS: u16 = 0x001;
/// Dynamic rounding mode.
pub const FRM: u16 = 0x002;
/// Floating-point control and status.
pub const FCSR: u16 = 0x003;
/// Cycle counter.
pub const CYCLE: u16 = 0xC00;
/// Timer.
pub const TIME: u16 = 0xC01;
/// Retired-instruction counter.
pub const INSTRET: u16 = 0xC02;
/// Upper half of `cycle` on RV32.
pub const CYCLEH: u16 = 0xC80;
/// Upper half of `time` on RV32.
pub const TIMEH: u16 = 0xC81;
/// Upper half of `instret` on RV32.
pub const INSTRETH: u16 = 0xC82;
/// Machine status.
pub const MSTATUS: u16 = 0x300;
/// Machine ISA description.
pub const MISA: u16 = 0x301;
/// Machine interrupt enable.
pub const MIE: u16 = 0x304;
/// Machine trap vector base.
pub const MTVEC: u16 = 0x305;
/// Machine scratch.
pub const MSCRATCH: u16 = 0x340;
/// Machine exception pc.
pub const MEPC: u16 = 0x341;
/// Machine trap cause.
pub const MCAUSE: u16 = 0x342;
/// Machine trap value.
pub const MTVAL: u16 = 0x343;
/// Machine interrupt pending.
pub const MIP: u16 = 0x344;
/// Hart id.
pub const MHARTID: u16 = 0xF14;

const MSTATUS_MIE: u64 = 1 << 3;
const MSTATUS_MPIE: u64 = 1 << 7;
const FFLAGS_MASK: u64 = 0x1F;
const FRM_SHIFT: u32 = 5;

pub(super) fn entries(out: &mut Vec<DecodeEntry<Handler>>) {
    out.extend([
        entry("csrrw", "............ ..... 001 ..... 1110011", csrrw),
        entry("csrrs", "............ ..... 010 ..... 1110011", csrrs),
        entry("csrrc", "............ ..... 011 ..... 1110011", csrrc),
        entry("csrrwi", "............ ..... 101 ..... 1110011", csrrwi),
        entry("csrrsi", "............ ..... 110 ..... 1110011", csrrsi),
        entry("csrrci", "............ ..... 111 ..... 1110011", csrrci),
        entry("mret", "0011000 00010 00000 000 00000 1110011", mret),
        entry("sret", "0001000 00010 00000 000 00000 1110011", sret),
        entry("wfi", "0001000 00101 00000 000 00000 1110011", wfi),
        entry("sfence.vma", "0001001 ..... ..... 000 00000 1110011", sfence_vma),
    ]);
}

/// Storage-backed CSRs of the preset machine with their reset values.
#[must_use]
pub fn csr_decls(xlen: Xlen, extensions: Extensions) -> Vec<CsrDecl> {
    let mxl: u64 = match xlen {
        Xlen::Bits32 => 1,
        Xlen::Bits64 => 2,
    };
    let misa = (mxl << (xlen.bits() - 2)) | extensions.misa_letters();
    let mut decls: Vec<CsrDecl> = [
        (MSTATUS, 0),
        (MISA, misa),
        (MIE, 0),
        (MTVEC, 0),
        (MSCRATCH, 0),
        (MEPC, 0),
        (MCAUSE, 0),
        (MTVAL, 0),
        (MIP, 0),
        (MHARTID, 0),
    ]
    .into_iter()
    .map(|(addr, reset)| CsrDecl { addr, reset })
    .collect();
    if extensions.normalized().contains(Extensions::F) {
        decls.push(CsrDecl {
            addr: FCSR,
            reset: 0,
        });
    }
    decls
}

fn fcsr(machine: &MachineState, addr: u16) -> Result<u64, Trap> {
    machine
        .csrs
        .read(FCSR)
        .ok_or_else(|| Trap::illegal_csr(addr))
}

/// Reads CSR `addr` with the architectural views applied.
///
/// # Errors
///
/// Returns an illegal-instruction trap for an undeclared CSR.
pub fn read(machine: &MachineState, addr: u16) -> Result<u64, Trap> {
    let counter = machine.retired();
    match addr {
        CYCLE | TIME | INSTRET => Ok(counter & machine.xlen.mask()),
        CYCLEH | TIMEH | INSTRETH if machine.xlen == Xlen::Bits32 => Ok(counter >> 32),
        FFLAGS => Ok(fcsr(machine, addr)? & FFLAGS_MASK),
        FRM => Ok((fcsr(machine, addr)? >> FRM_SHIFT) & 0b111),
        _ => machine
            .csrs
            .read(addr)
            .ok_or_else(|| Trap::illegal_csr(addr)),
    }
}

/// Writes CSR `addr` with the architectural views applied.
///
/// # Errors
///
/// Returns an illegal-instruction trap for an undeclared or read-only CSR.
/// Nothing is modified in that case.
pub fn write(machine: &mut MachineState, addr: u16, value: u64) -> Result<(), Trap> {
    if addr >> 10 == 0b11 {
        return Err(Trap::illegal_csr(addr));
    }
    let value = value & machine.xlen.mask();
    let (target, stored) = match addr {
        FFLAGS => {
            let old = fcsr(machine, addr)?;
            (FCSR, (old & !FFLAGS_MASK) | (value & FFLAGS_MASK))
        }
        FRM => {
            let old = fcsr(machine, addr)?;
            (FCSR, (old & !(0b111 << FRM_SHIFT)) | ((value & 0b111) << FRM_SHIFT))
        }
        FCSR => (FCSR, value & 0xFF),
        MISA if machine.csrs.contains(MISA) => return Ok(()),
        _ => (addr, value),
    };
    if machine.csrs.write(target, stored) {
        Ok(())
    } else {
        Err(Trap::illegal_csr(addr))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CsrOp {
    Write,
    Set,
    Clear,
}

fn csr_access(
    ctx: &mut ExecContext<'_>,
    word: InstructionWord,
    op: CsrOp,
    immediate: bool,
) -> Result<(), Trap> {
    let addr = csr(word);
    let field = rs1(word);
    let src = if immediate {
        field as u64
    } else {
        ctx.x(field)?
    };
    let dest = rd(word);

    let old = if op == CsrOp::Write && dest == 0 {
        None
    } else {
        Some(read(ctx.machine, addr)?)
    };
    let update = match op {
        CsrOp::Write => Some(src),
        CsrOp::Set if field != 0 => old.map(|old| old | src),
        CsrOp::Clear if field != 0 => old.map(|old| old & !src),
        CsrOp::Set | CsrOp::Clear => None,
    };
    if let Some(value) = update {
        write(ctx.machine, addr, value)?;
    }
    if let Some(old) = old {
        ctx.set_x(dest, old)?;
    }
    ctx.advance();
    Ok(())
}

fn csrrw(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    csr_access(ctx, word, CsrOp::Write, false)
}

fn csrrs(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    csr_access(ctx, word, CsrOp::Set, false)
}

fn csrrc(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    csr_access(ctx, word, CsrOp::Clear, false)
}

fn csrrwi(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    csr_access(ctx, word, CsrOp::Write, true)
}

fn csrrsi(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    csr_access(ctx, word, CsrOp::Set, true)
}

fn csrrci(ctx: &mut ExecContext<'_>, word: InstructionWord) -> Result<(), Trap> {
    csr_access(ctx, word, CsrOp::Clear, true)
}

fn mret(ctx: &mut ExecContext<'_>, _word: InstructionWord) -> Result<(), Trap> {
    let target = ctx.machine.csrs.read(MEPC).ok_or_else(|| ctx.illegal())?;
    if let Some(status) = ctx.machine.csrs.read(MSTATUS) {
        let mie = if status & MSTATUS_MPIE == 0 { 0 } else { MSTATUS_MIE };
        ctx.machine
            .csrs
            .write(MSTATUS, (status & !MSTATUS_MIE) | mie | MSTATUS_MPIE);
    }
    ctx.jump(target);
    Ok(())
}

fn wfi(ctx: &mut ExecContext<'_>, _word: InstructionWord) -> Result<(), Trap> {
    ctx.advance();
    Ok(())
}

fn sret(_ctx: &mut ExecContext<'_>, _word: InstructionWord) -> Result<(), Trap> {
    Err(Trap::unimplemented("sret"))
}

fn sfence_vma(_ctx: &mut ExecContext<'_>, _word: InstructionWord) -> Result<(), Trap> {
    Err(Trap::unimplemented("sfence.vma"))
}
