//! Digest counter generator (DGC).
//!
//! Two digest-sized buffers, a seed state and an output state, chained
//! through the digest with two little-endian 64-bit counters:
//!
//! ```text
//! update_seed(k):    seed  = H(k || seed)
//! update_counter(c): seed  = H(c || seed)
//! generate_state():  state = H(state_ctr++ || state || seed)
//!                    every CYCLE_COUNT states: seed = H(seed || seed_ctr++)
//! ```
//!
//! Output is the concatenation of successive `state` values, truncated to
//! the requested length. Every `generate` call starts with a fresh state.

use std::{
    marker::PhantomData,
    sync::{Mutex, MutexGuard, PoisonError},
};

use sha2::digest::{Digest, Output, core_api::BlockSizeUser};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{COUNTER_SIZE, Generator, ReKeyKind};
use crate::error::CryptoError;

const NAME: &str = "DGC";

/// The seed state is re-derived after this many output states.
const CYCLE_COUNT: u64 = 10;

/// Both counters start here after initialization.
const INITIAL_COUNTER: u64 = 1;

#[derive(Zeroize, ZeroizeOnDrop)]
struct DigestState {
    seed: Vec<u8>,
    state: Vec<u8>,
    seed_counter: u64,
    state_counter: u64,
    initialized: bool,
}

impl DigestState {
    fn new(digest_size: usize) -> Self {
        Self {
            seed: vec![0u8; digest_size],
            state: vec![0u8; digest_size],
            seed_counter: INITIAL_COUNTER,
            state_counter: INITIAL_COUNTER,
            initialized: false,
        }
    }

    fn clear(&mut self) {
        self.seed.fill(0);
        self.state.fill(0);
        self.seed_counter = INITIAL_COUNTER;
        self.state_counter = INITIAL_COUNTER;
        self.initialized = false;
    }

    fn update_seed<D: Digest>(&mut self, key: &[u8]) {
        let mut hasher = D::new();
        hasher.update(key);
        hasher.update(&self.seed);
        hasher.finalize_into(Output::<D>::from_mut_slice(&mut self.seed));
    }

    fn update_counter<D: Digest>(&mut self, counter: u64) {
        let mut hasher = D::new();
        hasher.update(counter.to_le_bytes());
        hasher.update(&self.seed);
        hasher.finalize_into(Output::<D>::from_mut_slice(&mut self.seed));
    }

    fn cycle_seed<D: Digest>(&mut self) {
        let mut hasher = D::new();
        hasher.update(&self.seed);
        hasher.update(self.seed_counter.to_le_bytes());
        self.seed_counter = self.seed_counter.wrapping_add(1);
        hasher.finalize_into(Output::<D>::from_mut_slice(&mut self.seed));
    }

    fn generate_state<D: Digest>(&mut self) {
        let mut hasher = D::new();
        hasher.update(self.state_counter.to_le_bytes());
        self.state_counter = self.state_counter.wrapping_add(1);
        hasher.update(&self.state);
        hasher.update(&self.seed);
        hasher.finalize_into(Output::<D>::from_mut_slice(&mut self.state));

        if self.state_counter % CYCLE_COUNT == 0 {
            self.cycle_seed::<D>();
        }
    }
}

/// Digest-chained deterministic byte generator.
///
/// State lives behind a single mutex, so the `&self` methods
/// ([`init_from`](Self::init_from), [`fill`](Self::fill),
/// [`rekey`](Self::rekey)) may be called through a shared reference. Each
/// call holds the lock for its full duration; interleaved calls from
/// several threads still produce one well-defined stream, but callers that
/// need a particular split of that stream must serialize themselves.
pub struct DigestCounterGenerator<D> {
    state: Mutex<DigestState>,
    _digest: PhantomData<fn() -> D>,
}

impl<D: Digest + BlockSizeUser> DigestCounterGenerator<D> {
    /// Create an uninitialized generator.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DigestState::new(<D as Digest>::output_size())),
            _digest: PhantomData,
        }
    }

    /// Output size of the underlying digest; one state block.
    pub fn digest_size(&self) -> usize {
        <D as Digest>::output_size()
    }

    /// Input block size of the underlying digest.
    pub fn block_size(&self) -> usize {
        D::block_size()
    }

    /// Which re-key branch a seed of `len` bytes selects.
    ///
    /// `len >= block_size + 8` re-initializes, exactly 8 bytes replaces the
    /// counter, anything else (including exactly `block_size`) is folded into
    /// the seed state.
    pub fn rekey_kind(&self, len: usize) -> ReKeyKind {
        if len >= self.block_size() + COUNTER_SIZE {
            ReKeyKind::Full
        } else if len == self.block_size() {
            ReKeyKind::SeedOnly
        } else if len == COUNTER_SIZE {
            ReKeyKind::CounterOnly
        } else {
            ReKeyKind::SeedOnly
        }
    }

    /// Reset and initialize from `seed`.
    ///
    /// The trailing 8 bytes are a little-endian counter; the remainder is
    /// key material.
    pub fn init_from(&self, seed: &[u8]) -> Result<(), CryptoError> {
        if seed.len() < COUNTER_SIZE {
            return Err(CryptoError::InvalidSeedLength { engine: NAME, actual: seed.len() });
        }
        let (key, counter) = seed.split_at(seed.len() - COUNTER_SIZE);
        let counter = read_counter(counter);

        let mut state = self.lock();
        state.clear();
        state.update_seed::<D>(key);
        state.update_counter::<D>(counter);
        state.initialized = true;
        Ok(())
    }

    /// Fill `output` with keystream.
    pub fn fill(&self, output: &mut [u8]) -> Result<(), CryptoError> {
        let mut state = self.lock();
        if !state.initialized {
            return Err(CryptoError::NotInitialized { engine: NAME });
        }

        state.generate_state::<D>();
        let block = state.state.len();
        for (i, chunk) in output.chunks_mut(block).enumerate() {
            if i > 0 {
                state.generate_state::<D>();
            }
            chunk.copy_from_slice(&state.state[..chunk.len()]);
        }
        Ok(())
    }

    /// Re-key from `seed`, choosing the branch by length.
    pub fn rekey(&self, seed: &[u8]) -> Result<ReKeyKind, CryptoError> {
        if seed.is_empty() {
            return Err(CryptoError::InvalidSeedLength { engine: NAME, actual: 0 });
        }

        let kind = self.rekey_kind(seed.len());
        tracing::debug!(engine = NAME, ?kind, len = seed.len(), "re-keying generator");

        if kind == ReKeyKind::Full {
            self.init_from(seed)?;
            return Ok(kind);
        }

        let mut state = self.lock();
        if !state.initialized {
            return Err(CryptoError::NotInitialized { engine: NAME });
        }
        match kind {
            ReKeyKind::CounterOnly => state.update_counter::<D>(read_counter(seed)),
            ReKeyKind::SeedOnly | ReKeyKind::Full => state.update_seed::<D>(seed),
        }
        Ok(kind)
    }

    fn lock(&self) -> MutexGuard<'_, DigestState> {
        // A panic mid-update leaves digest-sized buffers, never partial keys
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<D: Digest + BlockSizeUser> Default for DigestCounterGenerator<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Digest + BlockSizeUser> Generator for DigestCounterGenerator<D> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    fn initialize(&mut self, seed: &[u8]) -> Result<(), CryptoError> {
        self.init_from(seed)
    }

    fn generate(&mut self, output: &mut [u8]) -> Result<(), CryptoError> {
        self.fill(output)
    }

    fn update(&mut self, seed: &[u8]) -> Result<ReKeyKind, CryptoError> {
        self.rekey(seed)
    }
}

fn read_counter(bytes: &[u8]) -> u64 {
    let mut counter = [0u8; COUNTER_SIZE];
    counter.copy_from_slice(&bytes[..COUNTER_SIZE]);
    u64::from_le_bytes(counter)
}
