//! Property-based tests for the keystream generators
//!
//! 1. **Determinism**: the same seed always yields the same stream
//! 2. **Parallel equivalence**: the parallel Salsa path is byte-identical to
//!    the serial path for every length
//! 3. **Continuity**: block-aligned Salsa requests continue one stream
//! 4. **Seed sensitivity**: flipping one seed byte changes the output

use cipherkeep_crypto::{
    DigestCounterGenerator, Generator, SalsaByteGenerator, SalsaConfig, SeedMaterial,
};
use proptest::prelude::*;
use sha2::{Sha256, Sha512};

fn salsa(seed: &[u8], parallel: bool) -> SalsaByteGenerator {
    let config = SalsaConfig { parallel, workers: 4, min_parallel_size: 0 };
    let mut generator = SalsaByteGenerator::with_config(20, config).unwrap();
    generator.initialize(seed).unwrap();
    generator
}

fn salsa_seed() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 24..=24),
        prop::collection::vec(any::<u8>(), 40..=40),
    ]
}

#[test]
fn prop_dgc_deterministic() {
    proptest!(|(
        seed in prop::collection::vec(any::<u8>(), 8..256),
        len in 0usize..2048,
    )| {
        let mut a = DigestCounterGenerator::<Sha512>::new();
        let mut b = DigestCounterGenerator::<Sha512>::new();
        a.initialize(&seed).unwrap();
        b.initialize(&seed).unwrap();

        let mut out_a = vec![0u8; len];
        let mut out_b = vec![0u8; len];
        a.generate(&mut out_a).unwrap();
        b.generate(&mut out_b).unwrap();

        // PROPERTY: identical seeds give identical streams
        prop_assert_eq!(out_a, out_b);
    });
}

#[test]
fn prop_dgc_seed_sensitive() {
    proptest!(|(
        seed in prop::collection::vec(any::<u8>(), 8..128),
        index in any::<prop::sample::Index>(),
    )| {
        let mut flipped = seed.clone();
        let i = index.index(flipped.len());
        flipped[i] ^= 0x01;

        let mut a = DigestCounterGenerator::<Sha256>::new();
        let mut b = DigestCounterGenerator::<Sha256>::new();
        a.initialize(&seed).unwrap();
        b.initialize(&flipped).unwrap();

        let mut out_a = [0u8; 64];
        let mut out_b = [0u8; 64];
        a.generate(&mut out_a).unwrap();
        b.generate(&mut out_b).unwrap();

        // PROPERTY: a single flipped seed bit changes the stream
        prop_assert_ne!(out_a, out_b);
    });
}

#[test]
fn prop_material_initialization_matches_concatenated_seed() {
    proptest!(|(
        seed in prop::collection::vec(any::<u8>(), 8..64),
        nonce in prop::collection::vec(any::<u8>(), 0..32),
    )| {
        let material = SeedMaterial::new(seed.clone()).unwrap().with_nonce(nonce.clone());

        let mut from_material = DigestCounterGenerator::<Sha256>::new();
        from_material.initialize_material(&material).unwrap();
        let mut from_bytes = DigestCounterGenerator::<Sha256>::new();
        from_bytes.initialize(&[seed, nonce].concat()).unwrap();

        let mut a = [0u8; 96];
        let mut b = [0u8; 96];
        from_material.generate(&mut a).unwrap();
        from_bytes.generate(&mut b).unwrap();
        prop_assert_eq!(a, b);
    });
}

#[test]
fn prop_salsa_parallel_equals_serial() {
    proptest!(ProptestConfig::with_cases(64), |(
        seed in salsa_seed(),
        len in 0usize..20_000,
    )| {
        let mut serial = salsa(&seed, false);
        let mut parallel = salsa(&seed, true);

        let mut out_serial = vec![0u8; len];
        let mut out_parallel = vec![0u8; len];
        serial.generate(&mut out_serial).unwrap();
        parallel.generate(&mut out_parallel).unwrap();

        // PROPERTY: fan-out never changes the bytes or the final counter
        prop_assert_eq!(out_serial, out_parallel);
        prop_assert_eq!(serial.counter(), parallel.counter());
    });
}

#[test]
fn prop_salsa_block_aligned_requests_continue() {
    proptest!(|(
        seed in salsa_seed(),
        blocks in prop::collection::vec(0usize..40, 1..6),
    )| {
        let total: usize = blocks.iter().sum::<usize>() * 64;
        let mut whole = vec![0u8; total];
        salsa(&seed, false).generate(&mut whole).unwrap();

        let mut pieces = vec![0u8; total];
        let mut generator = salsa(&seed, true);
        let mut offset = 0;
        for count in blocks {
            let size = count * 64;
            generator.generate_range(&mut pieces, offset, size).unwrap();
            offset += size;
        }

        prop_assert_eq!(whole, pieces);
    });
}
