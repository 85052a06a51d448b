//! Salsa20 based generator (SBG).
//!
//! The seed is `iv (8) || key (16 | 32)`. The 16-word Salsa20 input block is
//! assembled from a 14-word schedule plus a 64-bit block counter:
//!
//! ```text
//!  c0  k0  k1  k2
//!  k3  c1  v0  v1
//!  n0  n1  c2  k4
//!  k5  k6  k7  c3
//! ```
//!
//! `c*` are the sigma ("expand 32-byte k") or tau ("expand 16-byte k")
//! constants, `k*` key words (a 16-byte key is repeated), `v*` IV words and
//! `n0/n1` the low and high counter words.
//!
//! # Parallel output
//!
//! Large requests are split into `workers` equal, block-aligned chunks. Chunk
//! `i` starts at counter `base + i * chunk_blocks`, computed directly rather
//! than by stepping, so workers share nothing. After the join the counter is
//! set to the end of the last chunk and any remainder is produced serially.
//! The output is byte-identical to the serial path.

use rayon::prelude::{IndexedParallelIterator, ParallelIterator, ParallelSliceMut};
use zeroize::Zeroize;

use super::{COUNTER_SIZE, Generator, ReKeyKind};
use crate::error::CryptoError;

const NAME: &str = "SBG";

/// Salsa20 block size in bytes.
pub const BLOCK_SIZE: usize = 64;

/// IV bytes at the front of every seed.
const IV_SIZE: usize = 8;

/// Seeds of at least this length re-initialize on `update`.
const FULL_REKEY_SIZE: usize = 32;

/// Default number of rounds.
pub const DEFAULT_ROUNDS: usize = 20;

/// Smallest and largest accepted round counts (even values only).
pub const MIN_ROUNDS: usize = 8;
/// See [`MIN_ROUNDS`].
pub const MAX_ROUNDS: usize = 30;

/// Per-worker output below which the parallel path is not worth it.
pub const MIN_PARALLEL_CHUNK: usize = 1024;

const SIGMA: &[u8; 16] = b"expand 32-byte k";
const TAU: &[u8; 16] = b"expand 16-byte k";

/// Parallel execution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SalsaConfig {
    /// Allow the parallel path
    pub parallel: bool,
    /// Number of worker chunks; forced even, parallel disabled below 2
    pub workers: usize,
    /// Requests shorter than this are always serial
    pub min_parallel_size: usize,
}

impl Default for SalsaConfig {
    fn default() -> Self {
        let workers = even_workers(rayon::current_num_threads());
        Self { parallel: workers > 1, workers, min_parallel_size: workers * MIN_PARALLEL_CHUNK }
    }
}

fn even_workers(count: usize) -> usize {
    if count > 1 { count & !1 } else { 1 }
}

/// Salsa20 keystream generator.
pub struct SalsaByteGenerator {
    rounds: usize,
    schedule: [u32; 14],
    counter: u64,
    initialized: bool,
    config: SalsaConfig,
}

impl Default for SalsaByteGenerator {
    /// Uninitialized, [`DEFAULT_ROUNDS`] rounds, default parallel settings.
    fn default() -> Self {
        Self {
            rounds: DEFAULT_ROUNDS,
            schedule: [0; 14],
            counter: 0,
            initialized: false,
            config: SalsaConfig::default(),
        }
    }
}

impl SalsaByteGenerator {
    /// Create an uninitialized generator with `rounds` rounds.
    ///
    /// `rounds` must be even and within `8..=30`.
    pub fn new(rounds: usize) -> Result<Self, CryptoError> {
        Self::with_config(rounds, SalsaConfig::default())
    }

    /// Create with explicit parallel settings.
    pub fn with_config(rounds: usize, config: SalsaConfig) -> Result<Self, CryptoError> {
        if !(MIN_ROUNDS..=MAX_ROUNDS).contains(&rounds) || rounds % 2 != 0 {
            return Err(CryptoError::InvalidRounds { rounds });
        }
        let workers = even_workers(config.workers);
        let config = SalsaConfig { parallel: config.parallel && workers > 1, workers, ..config };
        Ok(Self { rounds, schedule: [0; 14], counter: 0, initialized: false, config })
    }

    /// Configured round count.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Current parallel settings.
    pub fn config(&self) -> SalsaConfig {
        self.config
    }

    /// Whether large requests use the parallel path.
    pub fn is_parallel(&self) -> bool {
        self.config.parallel
    }

    /// Force the parallel path on or off.
    ///
    /// Enabling has no effect with fewer than two workers.
    pub fn set_parallel(&mut self, parallel: bool) {
        self.config.parallel = parallel && self.config.workers > 1;
    }

    /// The 64-bit block counter (low word first on the wire).
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Which re-key branch a seed of `len` bytes selects.
    pub fn rekey_kind(len: usize) -> Option<ReKeyKind> {
        if len >= FULL_REKEY_SIZE {
            Some(ReKeyKind::Full)
        } else if len >= COUNTER_SIZE {
            Some(ReKeyKind::CounterOnly)
        } else {
            None
        }
    }

    fn set_key(&mut self, key: &[u8], iv: &[u8]) {
        let constants = if key.len() == 32 { SIGMA } else { TAU };
        let tail = if key.len() == 32 { &key[16..] } else { key };

        let c = words::<4>(constants);
        let k0 = words::<4>(&key[..16]);
        let k1 = words::<4>(tail);
        let v = words::<2>(iv);

        self.schedule = [
            c[0], k0[0], k0[1], k0[2], k0[3], c[1], v[0], v[1], c[2], k1[0], k1[1], k1[2], k1[3],
            c[3],
        ];
        self.counter = 0;
    }

    fn generate_serial(&mut self, output: &mut [u8]) {
        self.counter = fill_blocks(self.rounds, &self.schedule, self.counter, output);
    }

    fn generate_parallel(&mut self, output: &mut [u8]) -> usize {
        let workers = self.config.workers;
        let chunk = (output.len() / workers) / BLOCK_SIZE * BLOCK_SIZE;
        if chunk == 0 {
            return 0;
        }
        let chunk_blocks = (chunk / BLOCK_SIZE) as u64;
        let parallel_len = chunk * workers;
        let base = self.counter;
        let rounds = self.rounds;
        let mut schedule = self.schedule;

        tracing::debug!(workers, chunk, parallel_len, "parallel keystream fan-out");

        // for_each returns only after every chunk is written
        output[..parallel_len].par_chunks_mut(chunk).enumerate().for_each(|(index, part)| {
            let start = base.wrapping_add(index as u64 * chunk_blocks);
            fill_blocks(rounds, &schedule, start, part);
        });

        schedule.zeroize();
        self.counter = base.wrapping_add(workers as u64 * chunk_blocks);
        parallel_len
    }
}

impl Generator for SalsaByteGenerator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Seed must be exactly 24 (8-byte IV + 16-byte key) or 40 bytes (8-byte
    /// IV + 32-byte key).
    fn initialize(&mut self, seed: &[u8]) -> Result<(), CryptoError> {
        if seed.len() != IV_SIZE + 16 && seed.len() != IV_SIZE + 32 {
            return Err(CryptoError::InvalidSeedLength { engine: NAME, actual: seed.len() });
        }
        let (iv, key) = seed.split_at(IV_SIZE);
        self.set_key(key, iv);
        self.initialized = true;
        Ok(())
    }

    fn generate(&mut self, output: &mut [u8]) -> Result<(), CryptoError> {
        if !self.initialized {
            return Err(CryptoError::NotInitialized { engine: NAME });
        }

        let done = if self.config.parallel && output.len() >= self.config.min_parallel_size {
            self.generate_parallel(output)
        } else {
            0
        };
        self.generate_serial(&mut output[done..]);
        Ok(())
    }

    /// `len >= 32` re-initializes, `len >= 8` overwrites the counter with the
    /// first 8 bytes (little-endian, low word first).
    fn update(&mut self, seed: &[u8]) -> Result<ReKeyKind, CryptoError> {
        let kind = Self::rekey_kind(seed.len())
            .ok_or(CryptoError::InvalidSeedLength { engine: NAME, actual: seed.len() })?;
        tracing::debug!(engine = NAME, ?kind, len = seed.len(), "re-keying generator");

        match kind {
            ReKeyKind::Full => self.initialize(seed)?,
            ReKeyKind::CounterOnly | ReKeyKind::SeedOnly => {
                if !self.initialized {
                    return Err(CryptoError::NotInitialized { engine: NAME });
                }
                let mut counter = [0u8; COUNTER_SIZE];
                counter.copy_from_slice(&seed[..COUNTER_SIZE]);
                self.counter = u64::from_le_bytes(counter);
            },
        }
        Ok(kind)
    }
}

impl Drop for SalsaByteGenerator {
    fn drop(&mut self) {
        self.schedule.zeroize();
        self.counter.zeroize();
    }
}

fn words<const N: usize>(bytes: &[u8]) -> [u32; N] {
    let mut out = [0u32; N];
    for (word, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    out
}

/// Write keystream blocks starting at `counter`; returns the next counter.
///
/// A trailing partial block is computed in full and truncated, and still
/// consumes a counter value.
fn fill_blocks(rounds: usize, schedule: &[u32; 14], mut counter: u64, output: &mut [u8]) -> u64 {
    for chunk in output.chunks_mut(BLOCK_SIZE) {
        let mut block = salsa_block(rounds, schedule, counter);
        chunk.copy_from_slice(&block[..chunk.len()]);
        block.zeroize();
        counter = counter.wrapping_add(1);
    }
    counter
}

fn salsa_block(rounds: usize, schedule: &[u32; 14], counter: u64) -> [u8; BLOCK_SIZE] {
    let s = schedule;
    let input: [u32; 16] = [
        s[0],
        s[1],
        s[2],
        s[3],
        s[4],
        s[5],
        s[6],
        s[7],
        counter as u32,
        (counter >> 32) as u32,
        s[8],
        s[9],
        s[10],
        s[11],
        s[12],
        s[13],
    ];

    let mut x = input;
    for _ in 0..rounds / 2 {
        // column round
        quarter_round(&mut x, 0, 4, 8, 12);
        quarter_round(&mut x, 5, 9, 13, 1);
        quarter_round(&mut x, 10, 14, 2, 6);
        quarter_round(&mut x, 15, 3, 7, 11);
        // row round
        quarter_round(&mut x, 0, 1, 2, 3);
        quarter_round(&mut x, 5, 6, 7, 4);
        quarter_round(&mut x, 10, 11, 8, 9);
        quarter_round(&mut x, 15, 12, 13, 14);
    }

    let mut out = [0u8; BLOCK_SIZE];
    for (i, chunk) in out.chunks_exact_mut(4).enumerate() {
        chunk.copy_from_slice(&x[i].wrapping_add(input[i]).to_le_bytes());
    }
    x.zeroize();
    out
}

#[inline]
fn quarter_round(x: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize) {
    x[b] ^= x[a].wrapping_add(x[d]).rotate_left(7);
    x[c] ^= x[b].wrapping_add(x[a]).rotate_left(9);
    x[d] ^= x[c].wrapping_add(x[b]).rotate_left(13);
    x[a] ^= x[d].wrapping_add(x[c]).rotate_left(18);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(parallel: bool) -> SalsaConfig {
        SalsaConfig { parallel, workers: 4, min_parallel_size: 4 * BLOCK_SIZE }
    }

    fn seeded(seed: &[u8], parallel: bool) -> SalsaByteGenerator {
        let mut generator = SalsaByteGenerator::with_config(DEFAULT_ROUNDS, config(parallel)).unwrap();
        generator.initialize(seed).unwrap();
        generator
    }

    #[test]
    fn odd_or_out_of_range_rounds_rejected() {
        for rounds in [0, 6, 9, 21, 32] {
            assert_eq!(
                SalsaByteGenerator::new(rounds).err(),
                Some(CryptoError::InvalidRounds { rounds })
            );
        }
        assert!(SalsaByteGenerator::new(8).is_ok());
        assert!(SalsaByteGenerator::new(30).is_ok());
    }

    #[test]
    fn default_uses_twenty_rounds() {
        let mut standard = SalsaByteGenerator::default();
        assert_eq!(standard.rounds(), DEFAULT_ROUNDS);
        assert!(!standard.is_initialized());

        let mut explicit = SalsaByteGenerator::new(20).unwrap();
        standard.initialize(&[3u8; 40]).unwrap();
        explicit.initialize(&[3u8; 40]).unwrap();
        let (mut a, mut b) = ([0u8; 200], [0u8; 200]);
        standard.generate(&mut a).unwrap();
        explicit.generate(&mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn seed_length_must_be_24_or_40() {
        let mut generator = SalsaByteGenerator::new(DEFAULT_ROUNDS).unwrap();
        for len in [0, 8, 23, 25, 32, 39, 41] {
            assert!(generator.initialize(&vec![0u8; len]).is_err(), "length {len}");
        }
        assert!(generator.initialize(&[0u8; 24]).is_ok());
        assert!(generator.initialize(&[0u8; 40]).is_ok());
    }

    #[test]
    fn schedule_uses_tau_for_short_key() {
        let mut generator = SalsaByteGenerator::new(DEFAULT_ROUNDS).unwrap();
        generator.initialize(&[0u8; 24]).unwrap();
        assert_eq!(generator.schedule[0], u32::from_le_bytes(*b"expa"));
        assert_eq!(generator.schedule[5], u32::from_le_bytes(*b"nd 1"));
    }

    #[test]
    fn counter_advances_per_block_including_partial() {
        let mut generator = seeded(&[1u8; 40], false);
        let mut out = [0u8; 130];
        generator.generate(&mut out).unwrap();
        assert_eq!(generator.counter(), 3);
    }

    #[test]
    fn counter_carries_into_high_word() {
        let mut generator = seeded(&[1u8; 40], false);
        generator.update(&u64::from(u32::MAX).to_le_bytes()).unwrap();

        let mut out = [0u8; 128];
        generator.generate(&mut out).unwrap();
        assert_eq!(generator.counter(), 1u64 << 32 | 1);
    }

    #[test]
    fn split_calls_continue_stream() {
        let seed = [7u8; 40];
        let mut whole = vec![0u8; 640];
        seeded(&seed, false).generate(&mut whole).unwrap();

        let mut generator = seeded(&seed, false);
        let mut first = vec![0u8; 320];
        let mut second = vec![0u8; 320];
        generator.generate(&mut first).unwrap();
        generator.generate(&mut second).unwrap();

        assert_eq!(&whole[..320], first.as_slice());
        assert_eq!(&whole[320..], second.as_slice());
    }

    #[test]
    fn parallel_matches_serial() {
        let seed = [0xC3u8; 40];
        let mut serial = vec![0u8; 64 * 37 + 11];
        let mut parallel = vec![0u8; 64 * 37 + 11];

        let mut a = seeded(&seed, false);
        let mut b = seeded(&seed, true);
        a.generate(&mut serial).unwrap();
        b.generate(&mut parallel).unwrap();

        assert_eq!(serial, parallel);
        assert_eq!(a.counter(), b.counter());
    }

    #[test]
    fn parallel_then_serial_has_no_gap() {
        let seed = [0x11u8; 24];
        let mut expected = vec![0u8; 2048 + 100];
        seeded(&seed, false).generate(&mut expected).unwrap();

        let mut generator = seeded(&seed, true);
        let mut big = vec![0u8; 2048];
        let mut small = vec![0u8; 100];
        generator.generate(&mut big).unwrap();
        generator.generate(&mut small).unwrap();

        assert_eq!(&expected[..2048], big.as_slice());
        assert_eq!(&expected[2048..], small.as_slice());
    }

    #[test]
    fn counter_update_overwrites_rather_than_increments() {
        let mut generator = seeded(&[2u8; 40], false);
        let mut out = [0u8; 64 * 5];
        generator.generate(&mut out).unwrap();

        assert_eq!(generator.update(&[9, 0, 0, 0, 0, 0, 0, 0]), Ok(ReKeyKind::CounterOnly));
        assert_eq!(generator.counter(), 9);
    }

    #[test]
    fn update_routes_by_length() {
        assert_eq!(SalsaByteGenerator::rekey_kind(40), Some(ReKeyKind::Full));
        assert_eq!(SalsaByteGenerator::rekey_kind(32), Some(ReKeyKind::Full));
        assert_eq!(SalsaByteGenerator::rekey_kind(24), Some(ReKeyKind::CounterOnly));
        assert_eq!(SalsaByteGenerator::rekey_kind(8), Some(ReKeyKind::CounterOnly));
        assert_eq!(SalsaByteGenerator::rekey_kind(7), None);
    }

    #[test]
    fn full_update_with_bad_length_fails() {
        let mut generator = seeded(&[2u8; 40], false);
        assert!(generator.update(&[0u8; 33]).is_err());
    }

    #[test]
    fn reduced_rounds_change_output() {
        let seed = [5u8; 40];
        let mut twenty = [0u8; 64];
        seeded(&seed, false).generate(&mut twenty).unwrap();

        let mut eight = SalsaByteGenerator::with_config(8, config(false)).unwrap();
        eight.initialize(&seed).unwrap();
        let mut out = [0u8; 64];
        eight.generate(&mut out).unwrap();

        assert_ne!(out, twenty);
    }

    #[test]
    fn single_worker_disables_parallel() {
        let generator = SalsaByteGenerator::with_config(
            DEFAULT_ROUNDS,
            SalsaConfig { parallel: true, workers: 1, min_parallel_size: 0 },
        )
        .unwrap();
        assert!(!generator.is_parallel());
    }

    #[test]
    fn odd_worker_count_rounds_down_to_even() {
        let generator = SalsaByteGenerator::with_config(
            DEFAULT_ROUNDS,
            SalsaConfig { parallel: true, workers: 5, min_parallel_size: 0 },
        )
        .unwrap();
        assert_eq!(generator.config().workers, 4);
    }
}
