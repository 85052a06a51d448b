//! Cross-check of the Salsa generator against the `salsa20` crate
//!
//! With a 32-byte key the generator's keystream must match standard
//! Salsa20 for the same key and nonce, on both the serial and the parallel
//! path.

use cipherkeep_crypto::{Generator, SalsaByteGenerator, SalsaConfig};
use salsa20::{
    Salsa12, Salsa20,
    cipher::{KeyIvInit, StreamCipher},
};

const KEY: [u8; 32] = [
    0x80, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
    0x0f, 0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x1b, 0x1c, 0x1d,
    0x1e, 0x1f,
];
const NONCE: [u8; 8] = [0xd7, 0x6c, 0x3b, 0x8e, 0x11, 0x00, 0xa2, 0x5f];

fn seed() -> Vec<u8> {
    [NONCE.as_slice(), KEY.as_slice()].concat()
}

fn generator(rounds: usize, parallel: bool) -> SalsaByteGenerator {
    let config = SalsaConfig { parallel, workers: 4, min_parallel_size: 0 };
    let mut generator = SalsaByteGenerator::with_config(rounds, config).unwrap();
    generator.initialize(&seed()).unwrap();
    generator
}

fn reference<C: StreamCipher>(mut cipher: C, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    cipher.apply_keystream(&mut out);
    out
}

#[test]
fn serial_matches_salsa20() {
    let expected = reference(Salsa20::new_from_slices(&KEY, &NONCE).unwrap(), 4096);

    let mut out = vec![0u8; 4096];
    generator(20, false).generate(&mut out).unwrap();
    assert_eq!(out, expected);
}

#[test]
fn parallel_matches_salsa20() {
    let expected = reference(Salsa20::new_from_slices(&KEY, &NONCE).unwrap(), 64 * 1024 + 64);

    let mut generator = generator(20, true);
    assert!(generator.is_parallel());
    let mut out = vec![0u8; expected.len()];
    generator.generate(&mut out).unwrap();
    assert_eq!(out, expected);
}

#[test]
fn twelve_rounds_match_salsa12() {
    let expected = reference(Salsa12::new_from_slices(&KEY, &NONCE).unwrap(), 1024);

    let mut out = vec![0u8; 1024];
    generator(12, false).generate(&mut out).unwrap();
    assert_eq!(out, expected);
}

#[test]
fn block_aligned_calls_continue_the_reference_stream() {
    let expected = reference(Salsa20::new_from_slices(&KEY, &NONCE).unwrap(), 640);

    let mut generator = generator(20, false);
    let mut out = vec![0u8; 640];
    let (head, tail) = out.split_at_mut(128);
    generator.generate(head).unwrap();
    generator.generate(tail).unwrap();
    assert_eq!(out, expected);
}
