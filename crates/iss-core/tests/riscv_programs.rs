//! End-to-end RISC-V programs run through the engine.

#![allow(
    clippy::pedantic,
    clippy::nursery,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use iss_core::isa::riscv::{self, system, Extensions};
use iss_core::{
    disassemble, Engine, EvictionPolicy, HaltingHost, HotPathCache, InstrWidth, InstructionWord,
    Interpreter, MachineState, RunOutcome, StopReason, TlbConfig, TrapKind, Xlen,
};
use proptest as _;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

const ZERO: u32 = 0;
const SP: u32 = 2;
const T0: u32 = 5;
const T1: u32 = 6;
const T2: u32 = 7;
const A0: u32 = 10;
const A1: u32 = 11;

const OP: u32 = 0x33;
const OP_IMM: u32 = 0x13;
const LOAD: u32 = 0x03;
const STORE: u32 = 0x23;
const BRANCH: u32 = 0x63;
const SYSTEM: u32 = 0x73;
const AMO: u32 = 0x2F;
const OP_FP: u32 = 0x53;

const ECALL: u32 = 0x0000_0073;
const EBREAK: u32 = 0x0010_0073;
const NOP: u32 = 0x0000_0013;

const fn r(funct7: u32, rs2: u32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    (funct7 << 25) | (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcode
}

const fn i(imm: i32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    (((imm as u32) & 0xFFF) << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcode
}

const fn s(imm: i32, rs2: u32, rs1: u32, funct3: u32) -> u32 {
    let imm = imm as u32;
    (((imm >> 5) & 0x7F) << 25)
        | (rs2 << 20)
        | (rs1 << 15)
        | (funct3 << 12)
        | ((imm & 0x1F) << 7)
        | STORE
}

const fn b(imm: i32, rs2: u32, rs1: u32, funct3: u32) -> u32 {
    let imm = imm as u32;
    (((imm >> 12) & 1) << 31)
        | (((imm >> 5) & 0x3F) << 25)
        | (rs2 << 20)
        | (rs1 << 15)
        | (funct3 << 12)
        | (((imm >> 1) & 0xF) << 8)
        | (((imm >> 11) & 1) << 7)
        | BRANCH
}

const fn lui(rd: u32, imm20: u32) -> u32 {
    (imm20 << 12) | (rd << 7) | 0x37
}

fn image(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_le_bytes()).collect()
}

fn machine(xlen: Xlen, ext: Extensions, image: &[u8]) -> MachineState {
    let mut machine = MachineState::new(&riscv::machine_config(xlen, ext)).expect("valid preset");
    machine.load_program(0, image).expect("program fits");
    machine
}

fn run(xlen: Xlen, ext: Extensions, words: &[u32]) -> (MachineState, HaltingHost, RunOutcome) {
    let engine = Engine::new(&riscv::isa(xlen, ext)).expect("table builds");
    let mut machine = machine(xlen, ext, &image(words));
    let mut host = HaltingHost::new(riscv::EXIT_REGISTER);
    let outcome = engine
        .run(&mut machine, &mut host, &mut Interpreter)
        .expect("program runs without trapping");
    (machine, host, outcome)
}

/// `a0 = 10 + 9 + ... + 1`, then exit.
fn sum_loop() -> Vec<u32> {
    vec![
        i(10, ZERO, 0, T0, OP_IMM),
        i(0, ZERO, 0, A0, OP_IMM),
        r(0, T0, A0, 0, A0, OP),
        i(-1, T0, 0, T0, OP_IMM),
        b(-8, ZERO, T0, 1),
        ECALL,
    ]
}

#[rstest]
fn every_preset_table_builds_an_engine(
    #[values(Xlen::Bits32, Xlen::Bits64)] xlen: Xlen,
    #[values(
        Extensions::NONE,
        Extensions::M,
        Extensions::A,
        Extensions::F,
        Extensions::D,
        Extensions::C,
        Extensions::F | Extensions::C,
        Extensions::G,
        Extensions::GC
    )]
    ext: Extensions,
) {
    let engine = Engine::new(&riscv::isa(xlen, ext)).expect("table builds");
    let matcher = engine.matcher();
    for (word, mnemonic) in [
        (lui(A0, 0x12345), "lui"),
        (0x0000_0517, "auipc"),
        (0x0080_00EF, "jal"),
        (ECALL, "ecall"),
    ] {
        let resolved = matcher
            .resolve(InstructionWord::new(u64::from(word), InstrWidth::W32))
            .map(|resolved| resolved.mnemonic);
        assert_eq!(resolved, Some(mnemonic), "{word:#010x}");
    }
}

#[rstest]
#[case(Xlen::Bits32)]
#[case(Xlen::Bits64)]
fn sum_loop_exits_with_total(#[case] xlen: Xlen) {
    let (machine, host, outcome) = run(xlen, Extensions::NONE, &sum_loop());
    assert_eq!(outcome.reason, StopReason::Halted);
    assert_eq!(outcome.steps, 33);
    assert_eq!(host.exit_code(), Some(55));
    assert_eq!(machine.retired(), 33);
    assert_eq!(machine.pc, 24);
}

#[test]
fn factorial_uses_the_multiplier() {
    let program = [
        i(1, ZERO, 0, A0, OP_IMM),
        i(5, ZERO, 0, T0, OP_IMM),
        r(1, T0, A0, 0, A0, OP),
        i(-1, T0, 0, T0, OP_IMM),
        b(-8, ZERO, T0, 1),
        ECALL,
    ];
    let (_, host, _) = run(Xlen::Bits64, Extensions::M, &program);
    assert_eq!(host.exit_code(), Some(120));
}

#[test]
fn multiplier_is_absent_without_m() {
    let engine = Engine::new(&riscv::isa(Xlen::Bits32, Extensions::NONE)).expect("table");
    let mut machine = machine(Xlen::Bits32, Extensions::NONE, &image(&[r(1, T0, A0, 0, A0, OP)]));
    let mut host = HaltingHost::new(riscv::EXIT_REGISTER);
    let trap = engine
        .run(&mut machine, &mut host, &mut Interpreter)
        .expect_err("mul is not decoded");
    assert_eq!(trap.kind, TrapKind::IllegalInstruction);
    assert_eq!(trap.pc, 0);
}

#[test]
fn doubleword_store_reloads_with_each_extension() {
    let program = [
        lui(SP, 1),
        i(-2, ZERO, 0, T0, OP_IMM),
        s(8, T0, SP, 0b011),
        i(8, SP, 0b010, A0, LOAD),
        i(12, SP, 0b110, A1, LOAD),
        i(8, SP, 0b011, T1, LOAD),
        ECALL,
    ];
    let (machine, _, _) = run(Xlen::Bits64, Extensions::NONE, &program);
    assert_eq!(machine.regs.read(A0 as usize), Ok(u64::MAX - 1));
    assert_eq!(machine.regs.read(A1 as usize), Ok(0xFFFF_FFFF));
    assert_eq!(machine.regs.read(T1 as usize), Ok(u64::MAX - 1));
}

#[test]
fn mixed_compressed_stream_advances_by_each_width() {
    let mut bytes = Vec::new();
    // c.li a0, 5
    bytes.extend_from_slice(&0x4515u16.to_le_bytes());
    bytes.extend_from_slice(&i(1, A0, 0, A0, OP_IMM).to_le_bytes());
    // c.addi a0, 1
    bytes.extend_from_slice(&0x0505u16.to_le_bytes());
    bytes.extend_from_slice(&ECALL.to_le_bytes());

    let engine = Engine::new(&riscv::isa(Xlen::Bits32, Extensions::C)).expect("table");
    let mut machine = machine(Xlen::Bits32, Extensions::C, &bytes);
    let mut host = HaltingHost::new(riscv::EXIT_REGISTER);
    let mut pcs = Vec::new();
    while let Ok(iss_core::StepOutcome::Retired { pc, .. }) =
        engine.step(&mut machine, &mut host, &mut Interpreter)
    {
        pcs.push(pc);
    }
    assert_eq!(pcs, [0, 2, 6, 8]);
    assert_eq!(host.exit_code(), Some(7));
}

#[test]
fn single_precision_round_trip_through_integers() {
    let program = [
        i(21, ZERO, 0, A0, OP_IMM),
        // fcvt.s.w f0, a0
        r(0b110_1000, 0, A0, 0, 0, OP_FP),
        // fadd.s f1, f0, f0
        r(0, 0, 0, 0, 1, OP_FP),
        // fcvt.w.s a0, f1
        r(0b110_0000, 0, 1, 0, A0, OP_FP),
        ECALL,
    ];
    let (machine, host, _) = run(Xlen::Bits32, Extensions::F, &program);
    assert_eq!(host.exit_code(), Some(42));
    assert_eq!(machine.csrs.read(system::FCSR), Some(0));
    assert_eq!(machine.fregs.read(1), Ok(0xFFFF_FFFF_4228_0000));
}

#[test]
fn instret_counts_retired_instructions() {
    let program = [NOP, NOP, i(0xC02, ZERO, 0b010, A0, SYSTEM), ECALL];
    let (_, host, _) = run(Xlen::Bits32, Extensions::NONE, &program);
    assert_eq!(host.exit_code(), Some(2));
}

#[test]
fn amoadd_returns_old_value_and_updates_memory() {
    let program = [
        i(0x100, ZERO, 0, T0, OP_IMM),
        i(5, ZERO, 0, T1, OP_IMM),
        s(0, T1, T0, 0b010),
        i(3, ZERO, 0, T2, OP_IMM),
        r(0, T2, T0, 0b010, A0, AMO),
        i(0, T0, 0b010, A1, LOAD),
        ECALL,
    ];
    let (machine, host, _) = run(Xlen::Bits32, Extensions::A, &program);
    assert_eq!(host.exit_code(), Some(5));
    assert_eq!(machine.regs.read(A1 as usize), Ok(8));
}

#[test]
fn out_of_bounds_load_traps_at_its_pc_and_stays_latched() {
    let program = [lui(T0, 0x100), i(0, T0, 0b010, A0, LOAD), ECALL];
    let engine = Engine::new(&riscv::isa(Xlen::Bits32, Extensions::NONE)).expect("table");
    let mut machine = machine(Xlen::Bits32, Extensions::NONE, &image(&program));
    let mut host = HaltingHost::new(riscv::EXIT_REGISTER);

    let first = engine
        .run(&mut machine, &mut host, &mut Interpreter)
        .expect_err("load past memory");
    assert_eq!(first.kind, TrapKind::OutOfBounds);
    assert_eq!(first.pc, 4);
    assert_eq!(machine.pc, 4);
    assert_eq!(machine.regs.read(A0 as usize), Ok(0));
    assert_eq!(machine.latched_trap(), Some(first));

    let again = engine
        .run(&mut machine, &mut host, &mut Interpreter)
        .expect_err("trap stays latched");
    assert_eq!(again, first);
    assert_eq!(host.syscalls(), 0);
}

#[test]
fn resume_cannot_restart_a_trapped_session() {
    let program = [0xFFFF_FFFF, i(7, ZERO, 0, A0, OP_IMM), ECALL];
    let engine = Engine::new(&riscv::isa(Xlen::Bits32, Extensions::NONE)).expect("table");
    let mut machine = machine(Xlen::Bits32, Extensions::NONE, &image(&program));
    let mut host = HaltingHost::new(riscv::EXIT_REGISTER);

    let trap = engine
        .run(&mut machine, &mut host, &mut Interpreter)
        .expect_err("first word is illegal");
    assert_eq!((trap.kind, trap.pc), (TrapKind::IllegalInstruction, 0));

    machine.resume();
    machine.pc = 4;
    let again = engine
        .run(&mut machine, &mut host, &mut Interpreter)
        .expect_err("trap stays latched");
    assert_eq!(again, trap);
    assert_eq!(machine.retired(), 0);
    assert_eq!(host.exit_code(), None);
}

#[test]
fn ebreak_halts_without_an_exit_code() {
    let (_, host, outcome) = run(Xlen::Bits32, Extensions::NONE, &[NOP, EBREAK, ECALL]);
    assert_eq!(outcome.reason, StopReason::Halted);
    assert_eq!(outcome.steps, 2);
    assert_eq!(host.exit_code(), None);
}

#[test]
fn falling_off_the_program_ends_the_stream() {
    let (machine, _, outcome) = run(Xlen::Bits32, Extensions::NONE, &[NOP, NOP]);
    assert_eq!(outcome.reason, StopReason::EndOfStream);
    assert!(machine.is_running());
}

#[test]
fn hot_path_cache_matches_the_interpreter() {
    let engine = Engine::new(&riscv::isa(Xlen::Bits64, Extensions::NONE)).expect("table");
    let mut machine = machine(Xlen::Bits64, Extensions::NONE, &image(&sum_loop()));
    let mut host = HaltingHost::new(riscv::EXIT_REGISTER);
    let mut cache = HotPathCache::new(2);
    let outcome = engine
        .run(&mut machine, &mut host, &mut cache)
        .expect("runs");
    assert_eq!(outcome.steps, 33);
    assert_eq!(host.exit_code(), Some(55));
    assert_eq!(cache.promoted(), 3);
    assert!(cache.reuses() > 0);
}

#[test]
fn instruction_fetches_feed_the_tlb() {
    let mut config = riscv::machine_config(Xlen::Bits32, Extensions::NONE);
    config.tlb = Some(TlbConfig {
        capacity: 4,
        page_size: 64,
        policy: EvictionPolicy::Lru,
    });
    let engine = Engine::new(&riscv::isa(Xlen::Bits32, Extensions::NONE)).expect("table");
    let mut machine = MachineState::new(&config).expect("valid config");
    machine.load_program(0, &image(&sum_loop())).expect("fits");
    let mut host = HaltingHost::new(riscv::EXIT_REGISTER);
    engine
        .run(&mut machine, &mut host, &mut Interpreter)
        .expect("runs");

    let stats = machine.tlb.as_ref().expect("configured").stats();
    assert_eq!(stats.hits + stats.misses, 33);
    assert_eq!(stats.misses, 1);
}

#[test]
fn listing_names_each_instruction() {
    let engine = Engine::new(&riscv::isa(Xlen::Bits32, Extensions::NONE)).expect("table");
    let machine = machine(Xlen::Bits32, Extensions::NONE, &image(&sum_loop()));
    let mnemonics: Vec<_> = disassemble(&engine, &machine.memory, 0, 6)
        .into_iter()
        .map(|row| row.mnemonic)
        .collect();
    assert_eq!(mnemonics, ["addi", "addi", "add", "addi", "bne", "ecall"]);
}
