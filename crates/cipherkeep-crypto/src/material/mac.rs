//! Key material for MAC engines

use std::{
    fmt,
    io::{Read, Write},
};

use zeroize::{Zeroize, ZeroizeOnDrop};

use super::codec;
use crate::error::CryptoError;

/// Key, salt and info bundle used to initialize a MAC engine.
///
/// The salt doubles as the engine IV: the CBC chaining value for CMAC, the
/// key-scheduling IV for VMPC-MAC, and a pre-hash input for HMAC.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct MacMaterial {
    key: Vec<u8>,
    salt: Option<Vec<u8>>,
    info: Option<Vec<u8>>,
}

impl MacMaterial {
    /// Create MAC material from a non-empty key.
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self, CryptoError> {
        let key = key.into();
        if key.is_empty() {
            return Err(CryptoError::invalid("MAC key must not be empty"));
        }
        Ok(Self { key, salt: None, info: None })
    }

    /// Attach a salt. An empty salt is treated as absent.
    #[must_use]
    pub fn with_salt(mut self, salt: impl Into<Vec<u8>>) -> Self {
        self.salt = Some(salt.into()).filter(|s| !s.is_empty());
        self
    }

    /// Attach an info string. An empty info is treated as absent.
    #[must_use]
    pub fn with_info(mut self, info: impl Into<Vec<u8>>) -> Self {
        self.info = Some(info.into()).filter(|i| !i.is_empty());
        self
    }

    /// The MAC key.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Optional salt / IV.
    pub fn salt(&self) -> Option<&[u8]> {
        self.salt.as_deref()
    }

    /// Optional info string.
    pub fn info(&self) -> Option<&[u8]> {
        self.info.as_deref()
    }

    /// Serialized size in bytes.
    pub fn encoded_len(&self) -> usize {
        codec::encoded_len(self.parts())
    }

    /// Serialize to the three-part length-prefixed format.
    pub fn to_bytes(&self) -> Result<zeroize::Zeroizing<Vec<u8>>, CryptoError> {
        codec::encode(self.parts()).map(zeroize::Zeroizing::new)
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
        [&self.key, self.salt.as_deref().unwrap_or_default(), self.info.as_deref().unwrap_or_default()]
    }

    fn from_parts(parts: [Vec<u8>; 3]) -> Result<Self, CryptoError> {
        let [key, salt, info] = parts;
        Ok(Self::new(key)?.with_salt(salt).with_info(info))
    }
}

impl fmt::Debug for MacMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacMaterial")
            .field("key_len", &self.key.len())
            .field("salt_len", &self.salt.as_ref().map(Vec::len))
            .field("info_len", &self.info.as_ref().map(Vec::len))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_rejected() {
        assert!(MacMaterial::new(Vec::new()).is_err());
    }

    #[test]
    fn roundtrip_with_all_parts() {
        let material =
            MacMaterial::new(vec![1; 32]).unwrap().with_salt(vec![2; 16]).with_info(b"ctx".to_vec());
        let decoded = MacMaterial::from_bytes(&material.to_bytes().unwrap()).unwrap();

        assert_eq!(decoded, material);
        assert_eq!(decoded.salt(), Some(&[2u8; 16][..]));
    }

    #[test]
    fn decoding_zero_length_key_fails() {
        let bytes = [0, 0, 4, 0, 0, 0, 1, 2, 3, 4];
        assert!(MacMaterial::from_bytes(&bytes).is_err());
    }
}
