//! Environment-seeded key generator

use sha2::{
    Sha512,
    digest::{Digest, core_api::BlockSizeUser},
};
use zeroize::Zeroizing;

use super::{COUNTER_SIZE, DigestCounterGenerator};
use crate::{
    env::Environment,
    error::CryptoError,
    material::{MacMaterial, SeedMaterial},
};

/// Source of key material for the package factories.
///
/// A [`DigestCounterGenerator`] seeded from [`Environment::random_bytes`].
/// Every request first folds one digest block of fresh entropy into the
/// seed state, so output never depends on the construction seed alone.
pub struct KeyGenerator<E: Environment, D: Digest + BlockSizeUser = Sha512> {
    engine: DigestCounterGenerator<D>,
    env: E,
}

impl<E: Environment, D: Digest + BlockSizeUser> KeyGenerator<E, D> {
    /// Create and seed a generator.
    pub fn new(env: E) -> Result<Self, CryptoError> {
        let engine = DigestCounterGenerator::<D>::new();
        let mut seed = Zeroizing::new(vec![0u8; engine.block_size() + COUNTER_SIZE]);
        env.random_bytes(&mut seed);
        engine.init_from(&seed)?;
        Ok(Self { engine, env })
    }

    /// `count` bytes of fresh key material.
    pub fn get_bytes(&self, count: usize) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        self.reseed()?;
        let mut out = Zeroizing::new(vec![0u8; count]);
        self.engine.fill(&mut out)?;
        Ok(out)
    }

    /// Fill `output` with fresh key material.
    pub fn fill(&self, output: &mut [u8]) -> Result<(), CryptoError> {
        self.reseed()?;
        self.engine.fill(output)
    }

    /// Seed material with a `seed_len`-byte seed and optional nonce.
    pub fn seed_material(
        &self,
        seed_len: usize,
        nonce_len: usize,
    ) -> Result<SeedMaterial, CryptoError> {
        let seed = self.get_bytes(seed_len)?;
        let nonce = self.get_bytes(nonce_len)?;
        Ok(SeedMaterial::new(seed.to_vec())?.with_nonce(nonce.to_vec()))
    }

    /// MAC material with a `key_len`-byte key and optional salt.
    pub fn mac_material(&self, key_len: usize, salt_len: usize) -> Result<MacMaterial, CryptoError> {
        let key = self.get_bytes(key_len)?;
        let salt = self.get_bytes(salt_len)?;
        Ok(MacMaterial::new(key.to_vec())?.with_salt(salt.to_vec()))
    }

    fn reseed(&self) -> Result<(), CryptoError> {
        let mut entropy = Zeroizing::new(vec![0u8; self.engine.block_size()]);
        self.env.random_bytes(&mut entropy);
        self.engine.rekey(&entropy).map(|_| ())
    }
}
