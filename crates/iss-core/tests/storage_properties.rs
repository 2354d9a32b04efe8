//! Properties of the storage model and of trap precision across a full table.

#![allow(clippy::pedantic, clippy::nursery, clippy::cast_possible_truncation)]

use iss_core::isa::riscv::{self, Extensions};
use iss_core::numeric::truncate;
use iss_core::{
    AccessWidth, Endianness, Engine, HaltingHost, Interpreter, MachineState, Memory, RegisterFile,
    RegisterFileConfig, StepOutcome, TrapKind, Xlen,
};
use proptest::prelude::*;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

const CAPACITY: usize = 4096;

fn width_strategy() -> impl Strategy<Value = AccessWidth> {
    prop::sample::select(vec![
        AccessWidth::Byte,
        AccessWidth::Half,
        AccessWidth::Word,
        AccessWidth::Double,
    ])
}

#[rstest]
#[case(RegisterFileConfig::with_zero(32, 32))]
#[case(RegisterFileConfig::with_zero(32, 64))]
#[case(RegisterFileConfig::plain(16, 32))]
fn every_slot_starts_zeroed(#[case] config: RegisterFileConfig) {
    let file = RegisterFile::new(config);
    assert_eq!(file.count(), config.count);
    assert!(file.as_slice().iter().all(|value| *value == 0));
    assert_eq!(
        file.read(config.count).map_err(|trap| trap.kind),
        Err(TrapKind::OutOfRange)
    );
}

proptest! {
    #[test]
    fn zero_register_survives_any_write_sequence(
        width in prop::sample::select(vec![32u32, 64]),
        writes in prop::collection::vec((0usize..32, any::<u64>()), 0..64),
    ) {
        let mut file = RegisterFile::new(RegisterFileConfig::with_zero(32, width));
        let mut model = [0u64; 32];
        for (index, value) in writes {
            file.write(index, value).expect("index in range");
            if index != 0 {
                model[index] = truncate(value, width);
            }
        }
        prop_assert_eq!(file.read(0), Ok(0));
        prop_assert_eq!(file.as_slice(), &model[..]);
    }

    #[test]
    fn rejected_writes_leave_memory_untouched(
        addr in (CAPACITY as u64 - 16)..(CAPACITY as u64 + 16),
        width in width_strategy(),
        value in any::<u64>(),
    ) {
        let mut memory = Memory::new(CAPACITY, Endianness::Little);
        let before = memory.clone();
        let result = memory.write(addr, width, value);
        let fits = addr + width.bytes() as u64 <= CAPACITY as u64;
        prop_assert_eq!(result.is_ok(), fits);
        if fits {
            prop_assert_eq!(
                memory.read(addr, width),
                Ok(truncate(value, width.bits()))
            );
        } else {
            prop_assert_eq!(result.map_err(|trap| trap.kind), Err(TrapKind::OutOfBounds));
            prop_assert_eq!(memory, before);
        }
    }

    #[test]
    fn endianness_only_changes_byte_order(
        addr in 0u64..(CAPACITY as u64 - 8),
        width in width_strategy(),
        value in any::<u64>(),
    ) {
        let mut little = Memory::new(CAPACITY, Endianness::Little);
        let mut big = Memory::new(CAPACITY, Endianness::Big);
        little.write(addr, width, value).expect("in bounds");
        big.write(addr, width, value).expect("in bounds");

        let mut reversed = big.slice(addr, width.bytes()).expect("in bounds").to_vec();
        reversed.reverse();
        prop_assert_eq!(little.slice(addr, width.bytes()).expect("in bounds"), &reversed[..]);
        prop_assert_eq!(little.read(addr, width), big.read(addr, width));
    }

    #[test]
    fn trapping_instructions_leave_no_partial_update(
        bits in any::<u32>(),
        seed in prop::collection::vec(any::<u64>(), 31),
    ) {
        let ext = Extensions::GC;
        let engine = Engine::new(&riscv::isa(Xlen::Bits64, ext)).expect("table");
        let mut config = riscv::machine_config(Xlen::Bits64, ext);
        config.memory_bytes = CAPACITY;
        let mut machine = MachineState::new(&config).expect("valid config");
        machine.load_program(0, &bits.to_le_bytes()).expect("fits");
        for (index, value) in seed.iter().enumerate() {
            // Keep half the registers small so some accesses land in memory.
            let value = if index % 2 == 0 { value % CAPACITY as u64 } else { *value };
            machine.regs.write(index + 1, value).expect("register");
        }

        let regs = machine.regs.clone();
        let fregs = machine.fregs.clone();
        let memory = machine.memory.clone();
        let mut host = HaltingHost::new(riscv::EXIT_REGISTER);

        match engine.step(&mut machine, &mut host, &mut Interpreter) {
            Ok(outcome) => {
                let retired_first_word = matches!(outcome, StepOutcome::Retired { pc: 0, .. });
                prop_assert!(retired_first_word, "unexpected outcome {:?}", outcome);
            }
            Err(event) => {
                prop_assert_eq!(event.pc, 0);
                prop_assert_eq!(machine.pc, 0);
                prop_assert_eq!(machine.retired(), 0);
                prop_assert_eq!(&machine.regs, &regs);
                prop_assert_eq!(&machine.fregs, &fregs);
                prop_assert_eq!(&machine.memory, &memory);
                prop_assert_eq!(machine.latched_trap(), Some(event));
            }
        }
    }
}

#[test]
fn sessions_do_not_share_state() {
    let config = riscv::machine_config(Xlen::Bits32, Extensions::NONE);
    let mut first = MachineState::new(&config).expect("valid");
    let second = MachineState::new(&config).expect("valid");
    first.regs.write(5, 9).expect("x5");
    first
        .memory
        .write(0x40, AccessWidth::Word, 0xAB)
        .expect("in bounds");
    assert_eq!(second.regs.read(5), Ok(0));
    assert_eq!(second.memory.read(0x40, AccessWidth::Word), Ok(0));
}
