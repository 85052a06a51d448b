//! Fuzz target for parallel keystream generation
//!
//! # Invariants
//!
//! - The parallel Salsa path produces exactly the serial output for any
//!   seed, round count, worker count and request sizes
//! - Split requests continue one stream in both modes

#![no_main]

use arbitrary::Arbitrary;
use cipherkeep_crypto::{Generator, SalsaByteGenerator, SalsaConfig};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    long_key: bool,
    seed: [u8; 40],
    rounds: u8,
    workers: u8,
    requests: Vec<u16>,
}

fuzz_target!(|input: Input| {
    let seed = if input.long_key { &input.seed[..] } else { &input.seed[..24] };
    let rounds = 10 + 2 * (input.rounds as usize % 6);
    let workers = 2 + input.workers as usize % 15;

    let serial_config = SalsaConfig { parallel: false, workers, min_parallel_size: 0 };
    let parallel_config = SalsaConfig { parallel: true, workers, min_parallel_size: 0 };
    let (Ok(mut serial), Ok(mut parallel)) = (
        SalsaByteGenerator::with_config(rounds, serial_config),
        SalsaByteGenerator::with_config(rounds, parallel_config),
    ) else {
        return;
    };
    if serial.initialize(seed).is_err() || parallel.initialize(seed).is_err() {
        return;
    }

    for &len in input.requests.iter().take(8) {
        let mut a = vec![0u8; len as usize];
        let mut b = vec![0u8; len as usize];
        serial.generate(&mut a).unwrap();
        parallel.generate(&mut b).unwrap();
        assert_eq!(a, b, "parallel keystream diverged");
    }
});
