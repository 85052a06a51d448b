//! Deterministic random byte generators.
//!
//! Two engines expand keying material into an arbitrarily long stream:
//!
//! - [`DigestCounterGenerator`]: digest-chained state with a seed counter and
//!   a state counter, re-deriving its seed every tenth block.
//! - [`SalsaByteGenerator`]: Salsa20 keystream with a configurable round
//!   count and a parallel path for large requests.
//!
//! [`KeyGenerator`] wraps the digest generator with environment entropy and
//! is the source of key material for the package factories.
//!
//! # Re-keying
//!
//! Both engines accept `update(seed)` and decide what to refresh from the
//! seed length alone. The decision is made once, up front, as a
//! [`ReKeyKind`], then dispatched.

mod dgc;
mod keygen;
mod sbg;

pub use dgc::DigestCounterGenerator;
pub use keygen::KeyGenerator;
pub use sbg::{DEFAULT_ROUNDS, MAX_ROUNDS, MIN_ROUNDS, SalsaByteGenerator, SalsaConfig};

use crate::{error::CryptoError, material::SeedMaterial};

/// Width of the little-endian counter carried in seeds.
pub const COUNTER_SIZE: usize = 8;

/// What an `update(seed)` call refreshes, derived from the seed length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReKeyKind {
    /// Discard all state and initialize from the new seed
    Full,
    /// Fold the bytes into the seed state, keep counters
    SeedOnly,
    /// Replace only the counter
    CounterOnly,
}

/// A keystream generator.
///
/// # State machine
///
/// `Uninitialized -> initialize() -> Initialized -> (generate | update)*`.
/// Calling `generate` or `update` before `initialize` fails with
/// [`CryptoError::NotInitialized`].
pub trait Generator {
    /// Engine name, used in errors and logs.
    fn name(&self) -> &'static str;

    /// Whether `initialize` has succeeded.
    fn is_initialized(&self) -> bool;

    /// Initialize from raw seed bytes.
    fn initialize(&mut self, seed: &[u8]) -> Result<(), CryptoError>;

    /// Initialize from seed material (`seed || nonce || info`).
    fn initialize_material(&mut self, material: &SeedMaterial) -> Result<(), CryptoError> {
        self.initialize(&material.concat())
    }

    /// Fill `output` with keystream.
    fn generate(&mut self, output: &mut [u8]) -> Result<(), CryptoError>;

    /// Fill `output[offset..offset + size]` with keystream.
    fn generate_range(
        &mut self,
        output: &mut [u8],
        offset: usize,
        size: usize,
    ) -> Result<(), CryptoError> {
        let len = output.len();
        let end = offset
            .checked_add(size)
            .filter(|&end| end <= len)
            .ok_or(CryptoError::OutputOutOfRange { offset, size, len })?;
        self.generate(&mut output[offset..end])
    }

    /// Re-key from `seed`; the branch taken is returned.
    fn update(&mut self, seed: &[u8]) -> Result<ReKeyKind, CryptoError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_range_rejects_overflowing_window() {
        let mut generator = DigestCounterGenerator::<sha2::Sha256>::new();
        generator.initialize(&[1u8; 16]).unwrap();

        let mut output = [0u8; 16];
        let result = generator.generate_range(&mut output, 10, 8);
        assert_eq!(result, Err(CryptoError::OutputOutOfRange { offset: 10, size: 8, len: 16 }));
        assert_eq!(output, [0u8; 16], "no bytes written on failure");
    }

    #[test]
    fn generate_range_fills_only_window() {
        let mut generator = DigestCounterGenerator::<sha2::Sha256>::new();
        generator.initialize(&[1u8; 16]).unwrap();

        let mut output = [0u8; 48];
        generator.generate_range(&mut output, 8, 32).unwrap();
        assert_eq!(&output[..8], &[0u8; 8]);
        assert_eq!(&output[40..], &[0u8; 8]);
        assert_ne!(&output[8..40], &[0u8; 32]);
    }
}
