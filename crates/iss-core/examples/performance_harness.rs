//! Dispatch throughput harness.
//!
//! Runs a tight RV64 loop on several threads that share one [`Engine`], once
//! through the plain interpreter and once through the hot-path cache.
//!
//! ```sh
//! cargo run --release -p iss-core --example performance_harness
//! ```

#![allow(clippy::pedantic)]

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use iss_core::isa::riscv::{self, Extensions};
use iss_core::{
    Engine, HaltingHost, HotPathCache, Interpreter, LoopBackend, MachineState, StopReason, Xlen,
};
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

const NUM_THREADS: usize = 4;
const MEASURE: Duration = Duration::from_secs(2);

// Counts t0 down from 0x10000 while accumulating into a0.
const PROGRAM: [u32; 5] = [
    0x0001_02B7, // lui t0, 0x10
    0x0000_0513, // addi a0, zero, 0
    0x0055_0533, // add a0, a0, t0
    0xFFF2_8293, // addi t0, t0, -1
    0xFE02_9CE3, // bne t0, zero, -8
];

#[derive(Debug, Clone, Copy)]
struct BenchmarkResult {
    name: &'static str,
    instructions_per_second: f64,
}

fn session() -> MachineState {
    let config = riscv::machine_config(Xlen::Bits64, Extensions::NONE);
    let mut machine = MachineState::new(&config).expect("preset is valid");
    let image: Vec<u8> = PROGRAM.iter().flat_map(|word| word.to_le_bytes()).collect();
    machine.load_program(0, &image).expect("program fits");
    machine
}

fn benchmark<B>(name: &'static str, engine: &Engine, backend: fn() -> B) -> BenchmarkResult
where
    B: LoopBackend,
{
    let (tx, rx) = mpsc::channel();
    thread::scope(|scope| {
        for _ in 0..NUM_THREADS {
            let tx = tx.clone();
            scope.spawn(move || {
                let mut backend = backend();
                let mut host = HaltingHost::new(riscv::EXIT_REGISTER);
                let mut total = 0u64;
                let start = Instant::now();
                while start.elapsed() < MEASURE {
                    let mut machine = session();
                    let outcome = engine
                        .run(&mut machine, &mut host, &mut backend)
                        .expect("loop does not trap");
                    assert_eq!(outcome.reason, StopReason::EndOfStream);
                    total += outcome.steps;
                }
                tx.send((total, start.elapsed())).ok();
            });
        }
    });
    drop(tx);

    let instructions_per_second = rx
        .iter()
        .map(|(steps, elapsed)| steps as f64 / elapsed.as_secs_f64())
        .sum();
    BenchmarkResult {
        name,
        instructions_per_second,
    }
}

fn main() {
    let engine = Engine::new(&riscv::isa(Xlen::Bits64, Extensions::NONE)).expect("table");
    let results = [
        benchmark("interpreter", &engine, || Interpreter),
        benchmark("hot-path cache", &engine, || HotPathCache::new(16)),
    ];

    println!("{NUM_THREADS} threads, {MEASURE:?} per backend");
    for result in results {
        println!(
            "{:>16}: {:>8.2} M instructions/s",
            result.name,
            result.instructions_per_second / 1e6
        );
    }
}
