//! Operand and immediate extraction for standard and compressed encodings.

#![allow(clippy::cast_possible_truncation)]

use crate::encoding::InstructionWord;
use crate::numeric::sign_extend;

const fn bits(word: InstructionWord, hi: u32, lo: u32) -> u64 {
    word.field(hi, lo)
}

const fn signed(value: u64, width: u32) -> u64 {
    sign_extend(value, width) as u64
}

/// Destination register `[11:7]`.
#[must_use]
pub const fn rd(word: InstructionWord) -> usize {
    bits(word, 11, 7) as usize
}

/// First source register `[19:15]`.
#[must_use]
pub const fn rs1(word: InstructionWord) -> usize {
    bits(word, 19, 15) as usize
}

/// Second source register `[24:20]`.
#[must_use]
pub const fn rs2(word: InstructionWord) -> usize {
    bits(word, 24, 20) as usize
}

/// Third source register of fused multiply-add `[31:27]`.
#[must_use]
pub const fn rs3(word: InstructionWord) -> usize {
    bits(word, 31, 27) as usize
}

/// `funct3` / rounding-mode field `[14:12]`.
#[must_use]
pub const fn funct3(word: InstructionWord) -> u64 {
    bits(word, 14, 12)
}

/// CSR address `[31:20]`.
#[must_use]
pub const fn csr(word: InstructionWord) -> u16 {
    bits(word, 31, 20) as u16
}

/// Shift amount `[25:20]` (the top bit is only legal on RV64).
#[must_use]
pub const fn shamt(word: InstructionWord) -> u32 {
    bits(word, 25, 20) as u32
}

/// I-type immediate, sign-extended.
#[must_use]
pub const fn imm_i(word: InstructionWord) -> u64 {
    signed(bits(word, 31, 20), 12)
}

/// S-type immediate, sign-extended.
#[must_use]
pub const fn imm_s(word: InstructionWord) -> u64 {
    signed((bits(word, 31, 25) << 5) | bits(word, 11, 7), 12)
}

/// B-type branch offset, sign-extended.
#[must_use]
pub const fn imm_b(word: InstructionWord) -> u64 {
    let imm = (bits(word, 31, 31) << 12)
        | (bits(word, 7, 7) << 11)
        | (bits(word, 30, 25) << 5)
        | (bits(word, 11, 8) << 1);
    signed(imm, 13)
}

/// U-type immediate (already shifted), sign-extended.
#[must_use]
pub const fn imm_u(word: InstructionWord) -> u64 {
    signed(bits(word, 31, 12) << 12, 32)
}

/// J-type jump offset, sign-extended.
#[must_use]
pub const fn imm_j(word: InstructionWord) -> u64 {
    let imm = (bits(word, 31, 31) << 20)
        | (bits(word, 19, 12) << 12)
        | (bits(word, 20, 20) << 11)
        | (bits(word, 30, 21) << 1);
    signed(imm, 21)
}

/// Full-width register field `[11:7]` of a compressed instruction.
#[must_use]
pub const fn c_rd(word: InstructionWord) -> usize {
    bits(word, 11, 7) as usize
}

/// Full-width second source `[6:2]` of a compressed instruction.
#[must_use]
pub const fn c_rs2(word: InstructionWord) -> usize {
    bits(word, 6, 2) as usize
}

/// Popular register `x8..x15` encoded in `[9:7]`.
#[must_use]
pub const fn c_rs1_prime(word: InstructionWord) -> usize {
    bits(word, 9, 7) as usize + 8
}

/// Popular register `x8..x15` encoded in `[4:2]`.
#[must_use]
pub const fn c_rd_prime(word: InstructionWord) -> usize {
    bits(word, 4, 2) as usize + 8
}

/// CI-format 6-bit immediate, sign-extended.
#[must_use]
pub const fn c_imm6(word: InstructionWord) -> u64 {
    signed((bits(word, 12, 12) << 5) | bits(word, 6, 2), 6)
}

/// CI-format shift amount.
#[must_use]
pub const fn c_shamt(word: InstructionWord) -> u32 {
    ((bits(word, 12, 12) << 5) | bits(word, 6, 2)) as u32
}

/// `c.lui` immediate (already shifted), sign-extended.
#[must_use]
pub const fn c_lui_imm(word: InstructionWord) -> u64 {
    c_imm6(word) << 12
}

/// `c.addi16sp` immediate, sign-extended.
#[must_use]
pub const fn c_addi16sp_imm(word: InstructionWord) -> u64 {
    let imm = (bits(word, 12, 12) << 9)
        | (bits(word, 4, 3) << 7)
        | (bits(word, 5, 5) << 6)
        | (bits(word, 2, 2) << 5)
        | (bits(word, 6, 6) << 4);
    signed(imm, 10)
}

/// `c.addi4spn` zero-extended immediate.
#[must_use]
pub const fn c_addi4spn_imm(word: InstructionWord) -> u64 {
    (bits(word, 10, 7) << 6)
        | (bits(word, 12, 11) << 4)
        | (bits(word, 5, 5) << 3)
        | (bits(word, 6, 6) << 2)
}

/// `c.lw` / `c.sw` word offset.
#[must_use]
pub const fn c_word_offset(word: InstructionWord) -> u64 {
    (bits(word, 5, 5) << 6) | (bits(word, 12, 10) << 3) | (bits(word, 6, 6) << 2)
}

/// `c.lwsp` stack offset.
#[must_use]
pub const fn c_lwsp_offset(word: InstructionWord) -> u64 {
    (bits(word, 3, 2) << 6) | (bits(word, 12, 12) << 5) | (bits(word, 6, 4) << 2)
}

/// `c.swsp` stack offset.
#[must_use]
pub const fn c_swsp_offset(word: InstructionWord) -> u64 {
    (bits(word, 8, 7) << 6) | (bits(word, 12, 9) << 2)
}

/// CJ-format jump offset, sign-extended.
#[must_use]
pub const fn c_jump_offset(word: InstructionWord) -> u64 {
    let imm = (bits(word, 12, 12) << 11)
        | (bits(word, 8, 8) << 10)
        | (bits(word, 10, 9) << 8)
        | (bits(word, 6, 6) << 7)
        | (bits(word, 7, 7) << 6)
        | (bits(word, 2, 2) << 5)
        | (bits(word, 11, 11) << 4)
        | (bits(word, 5, 3) << 1);
    signed(imm, 12)
}

/// CB-format branch offset, sign-extended.
#[must_use]
pub const fn c_branch_offset(word: InstructionWord) -> u64 {
    let imm = (bits(word, 12, 12) << 8)
        | (bits(word, 6, 5) << 6)
        | (bits(word, 2, 2) << 5)
        | (bits(word, 11, 10) << 3)
        | (bits(word, 4, 3) << 1);
    signed(imm, 9)
}
