#![no_main]

use iss_core::isa::{mips, riscv};
use iss_core::{
    disassemble, AccessWidth, Engine, EvictionPolicy, HaltingHost, HotPathCache, Interpreter,
    LoopBackend, MachineState, StepOutcome, TlbConfig, Xlen,
};
use libfuzzer_sys::fuzz_target;

const STEP_LIMIT: usize = 256;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, program)) = data.split_first() else {
        return;
    };

    let (isa, mut config, exit_register) = if selector & 0x80 == 0 {
        let xlen = if selector & 0x40 == 0 { Xlen::Bits32 } else { Xlen::Bits64 };
        let ext = riscv::Extensions::GC;
        (riscv::isa(xlen, ext), riscv::machine_config(xlen, ext), riscv::EXIT_REGISTER)
    } else {
        (mips::isa(), mips::machine_config(), mips::EXIT_REGISTER)
    };
    config.memory_bytes = 4096;
    if selector & 0x20 != 0 {
        config.tlb = Some(TlbConfig {
            capacity: usize::from(selector & 0x7) + 1,
            page_size: 64,
            policy: match selector & 0x18 {
                0x00 => EvictionPolicy::Fifo,
                0x08 => EvictionPolicy::Lru,
                _ => EvictionPolicy::Lfu,
            },
        });
    }

    let Ok(engine) = Engine::new(&isa) else {
        return;
    };
    let Ok(mut machine) = MachineState::new(&config) else {
        return;
    };
    if machine.load_program(0, program).is_err() {
        return;
    }
    let _ = disassemble(&engine, &machine.memory, 0, 16);

    let mut host = HaltingHost::new(exit_register);
    let mut interpreter = Interpreter;
    let mut cache = HotPathCache::new(2);
    let backend: &mut dyn LoopBackend = if selector & 0x01 == 0 {
        &mut interpreter
    } else {
        &mut cache
    };
    for _ in 0..STEP_LIMIT {
        match engine.step(&mut machine, &mut host, backend) {
            Ok(StepOutcome::Retired { .. }) => {}
            Ok(_) => break,
            Err(event) => {
                assert_eq!(machine.latched_trap(), Some(event));
                break;
            }
        }
    }

    if let Some(tlb) = machine.tlb.as_ref() {
        let stats = tlb.stats();
        assert!(stats.evictions <= stats.misses);
        assert!(tlb.entries().len() <= tlb.capacity());
    }
    let _ = machine.memory.read(0, AccessWidth::Word);
});
