//! Seed material for keystream generators

use std::{
    fmt,
    io::{Read, Write},
};

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::codec;
use crate::error::CryptoError;

/// Seed, nonce and info bundle used to initialize a generator.
///
/// Immutable once built. Empty optional parts are normalized to `None`, so
/// serialization round-trips exactly. All buffers are zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SeedMaterial {
    seed: Vec<u8>,
    nonce: Option<Vec<u8>>,
    info: Option<Vec<u8>>,
}

impl SeedMaterial {
    /// Create seed material from a non-empty seed.
    pub fn new(seed: impl Into<Vec<u8>>) -> Result<Self, CryptoError> {
        let seed = seed.into();
        if seed.is_empty() {
            return Err(CryptoError::invalid("seed must not be empty"));
        }
        Ok(Self { seed, nonce: None, info: None })
    }

    /// Attach a nonce. An empty nonce is treated as absent.
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<Vec<u8>>) -> Self {
        self.nonce = Some(nonce.into()).filter(|n| !n.is_empty());
        self
    }

    /// Attach an info string. An empty info is treated as absent.
    #[must_use]
    pub fn with_info(mut self, info: impl Into<Vec<u8>>) -> Self {
        self.info = Some(info.into()).filter(|i| !i.is_empty());
        self
    }

    /// The primary seed bytes.
    pub fn seed(&self) -> &[u8] {
        &self.seed
    }

    /// Optional nonce.
    pub fn nonce(&self) -> Option<&[u8]> {
        self.nonce.as_deref()
    }

    /// Optional info string.
    pub fn info(&self) -> Option<&[u8]> {
        self.info.as_deref()
    }

    /// `seed || nonce || info`, as consumed by the single-seed initializers.
    pub fn concat(&self) -> Zeroizing<Vec<u8>> {
        let parts = self.parts();
        let mut out = Zeroizing::new(Vec::with_capacity(parts.iter().map(|p| p.len()).sum()));
        for part in parts {
            out.extend_from_slice(part);
        }
        out
    }

    /// Serialized size in bytes.
    pub fn encoded_len(&self) -> usize {
        codec::encoded_len(self.parts())
    }

    /// Serialize to the three-part length-prefixed format.
    pub fn to_bytes(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        codec::encode(self.parts()).map(Zeroizing::new)
    }

    /// Deserialize from the start of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let (parts, _) = codec::decode(bytes)?;
        Self::from_parts(parts)
    }

    /// Write to a stream in the three-part format.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), CryptoError> {
        codec::write_to(writer, self.parts())
    }

    /// Read one encoded value from a stream.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, CryptoError> {
        Self::from_parts(codec::read_from(reader)?)
    }

    fn parts(&self) -> [&[u8]; 3] {
        [&self.seed, self.nonce.as_deref().unwrap_or_default(), self.info.as_deref().unwrap_or_default()]
    }

    fn from_parts(parts: [Vec<u8>; 3]) -> Result<Self, CryptoError> {
        let [seed, nonce, info] = parts;
        Ok(Self::new(seed)?.with_nonce(nonce).with_info(info))
    }
}

impl fmt::Debug for SeedMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedMaterial")
            .field("seed_len", &self.seed.len())
            .field("nonce_len", &self.nonce.as_ref().map(Vec::len))
            .field("info_len", &self.info.as_ref().map(Vec::len))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_seed_is_rejected() {
        assert!(SeedMaterial::new(Vec::new()).is_err());
    }

    #[test]
    fn empty_optional_parts_are_absent() {
        let material = SeedMaterial::new(vec![1, 2, 3]).unwrap().with_nonce(Vec::new());
        assert_eq!(material.nonce(), None);
        assert_eq!(material.info(), None);
    }

    #[test]
    fn concat_orders_seed_nonce_info() {
        let material =
            SeedMaterial::new(vec![1, 2]).unwrap().with_nonce(vec![3]).with_info(vec![4, 5]);
        assert_eq!(material.concat().as_slice(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn roundtrip_preserves_absent_parts() {
        let material = SeedMaterial::new(vec![9; 40]).unwrap().with_info(b"label".to_vec());
        let bytes = material.to_bytes().unwrap();
        assert_eq!(bytes.len(), material.encoded_len());

        let decoded = SeedMaterial::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, material);
        assert_eq!(decoded.nonce(), None);
    }

    #[test]
    fn stream_roundtrip() {
        let material = SeedMaterial::new(vec![7; 24]).unwrap().with_nonce(vec![8; 8]);
        let mut buffer = Vec::new();
        material.write_to(&mut buffer).unwrap();

        let decoded = SeedMaterial::read_from(&mut buffer.as_slice()).unwrap();
        assert_eq!(decoded, material);
    }

    #[test]
    fn debug_does_not_leak_bytes() {
        let material = SeedMaterial::new(vec![0xAB; 4]).unwrap();
        let rendered = format!("{material:?}");
        assert!(rendered.contains("seed_len: 4"));
        assert!(!rendered.contains("171"));
    }
}
