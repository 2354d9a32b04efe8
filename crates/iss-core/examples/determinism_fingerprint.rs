//! Final-state fingerprint of a fixed RISC-V program, used to compare hosts and
//! loop backends. Both backends must print the same value.

use iss_core::isa::riscv::{self, Extensions};
use iss_core::{Engine, HaltingHost, HotPathCache, Interpreter, LoopBackend, MachineState, Xlen};
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

// a0 = sum of i*i for i in 1..=20 via mul; fcvt.d.l and a store of the result.
const PROGRAM: [u32; 11] = [
    0x0140_0293, // addi t0, zero, 20
    0x0000_0513, // addi a0, zero, 0
    0x0252_8333, // mul t1, t0, t0
    0x0065_0533, // add a0, a0, t1
    0xFFF2_8293, // addi t0, t0, -1
    0xFE02_9AE3, // bne t0, zero, -12
    0xD225_7053, // fcvt.d.l f0, a0
    0x0000_13B7, // lui t2, 1
    0x0003_B027, // fsd f0, 0(t2)
    0x00A3_B423, // sd a0, 8(t2)
    0x0000_0073, // ecall
];

fn hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
}

fn fingerprint(backend: &mut dyn LoopBackend) -> String {
    let ext = Extensions::G;
    let engine = Engine::new(&riscv::isa(Xlen::Bits64, ext)).expect("table should build");
    let mut machine =
        MachineState::new(&riscv::machine_config(Xlen::Bits64, ext)).expect("preset is valid");
    let image: Vec<u8> = PROGRAM.iter().flat_map(|word| word.to_le_bytes()).collect();
    machine.load_program(0, &image).expect("program fits");

    let mut host = HaltingHost::new(riscv::EXIT_REGISTER);
    let outcome = engine
        .run(&mut machine, &mut host, backend)
        .expect("program should not trap");

    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    hash_bytes(&mut hash, &outcome.steps.to_le_bytes());
    hash_bytes(&mut hash, &machine.pc.to_le_bytes());
    hash_bytes(&mut hash, &host.exit_code().unwrap_or_default().to_le_bytes());
    for value in machine.regs.as_slice().iter().chain(machine.fregs.as_slice()) {
        hash_bytes(&mut hash, &value.to_le_bytes());
    }
    hash_bytes(
        &mut hash,
        machine.memory.slice(0x1000, 16).expect("result area is mapped"),
    );

    format!("{hash:016x}")
}

fn main() {
    let interpreted = fingerprint(&mut Interpreter);
    let cached = fingerprint(&mut HotPathCache::new(2));
    assert_eq!(interpreted, cached, "backends diverged");
    println!("{interpreted}");
}
