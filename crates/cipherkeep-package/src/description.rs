//! Cipher description header.
//!
//! A fixed 12-byte record telling an external cipher factory how to rebuild
//! the symmetric cipher a package's keys belong to. Multi-byte fields are
//! little-endian.
//!
//! ```text
//! 0      engine          u8
//! 1..3   key_size        u16
//! 3      iv_size         u8
//! 4      cipher_mode     u8
//! 5      padding         u8
//! 6      block_size      u8
//! 7      round_count     u8
//! 8      kdf_engine      u8
//! 9..11  mac_key_size    u16
//! 11     mac_engine      u8
//! ```

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::PackageError;

/// Block or stream cipher family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SymmetricEngine {
    /// Unset
    None = 0,
    /// Rijndael extended
    Rhx = 1,
    /// Serpent extended
    Shx = 2,
    /// Twofish extended
    Thx = 3,
    /// ChaCha stream cipher
    ChaCha = 4,
    /// Salsa20 stream cipher
    Salsa = 5,
}

/// Block cipher mode of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CipherMode {
    /// Unset or stream cipher
    None = 0,
    /// Cipher block chaining
    Cbc = 1,
    /// Cipher feedback
    Cfb = 2,
    /// Counter
    Ctr = 3,
    /// Electronic codebook
    Ecb = 4,
    /// Output feedback
    Ofb = 5,
}

/// Block padding scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PaddingMode {
    /// No padding
    None = 0,
    /// ISO/IEC 7816-4
    Iso7816 = 1,
    /// PKCS #7
    Pkcs7 = 2,
    /// Trailing bit complement
    Tbc = 3,
    /// ANSI X9.23
    X923 = 4,
}

/// Digest used for key derivation or MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DigestKind {
    /// Unset
    None = 0,
    /// Blake 256
    Blake256 = 1,
    /// Blake 512
    Blake512 = 2,
    /// Keccak 256
    Keccak256 = 3,
    /// Keccak 512
    Keccak512 = 4,
    /// SHA-2 256
    Sha256 = 5,
    /// SHA-2 512
    Sha512 = 6,
    /// Skein 256
    Skein256 = 7,
    /// Skein 512
    Skein512 = 8,
    /// Skein 1024
    Skein1024 = 9,
}

macro_rules! byte_enum {
    ($name:ident { $($variant:ident),+ $(,)? }) => {
        impl $name {
            /// Decode from the stored byte.
            pub const fn from_u8(value: u8) -> Option<Self> {
                $(
                    if value == Self::$variant as u8 {
                        return Some(Self::$variant);
                    }
                )+
                None
            }

            /// The stored byte.
            pub const fn to_u8(self) -> u8 {
                self as u8
            }
        }
    };
}

byte_enum!(SymmetricEngine { None, Rhx, Shx, Thx, ChaCha, Salsa });
byte_enum!(CipherMode { None, Cbc, Cfb, Ctr, Ecb, Ofb });
byte_enum!(PaddingMode { None, Iso7816, Pkcs7, Tbc, X923 });
byte_enum!(DigestKind {
    None, Blake256, Blake512, Keccak256, Keccak512, Sha256, Sha512, Skein256, Skein512,
    Skein1024,
});

/// Fixed-width cipher description.
///
/// Fields are stored raw so any 12-byte pattern can be parsed; use
/// [`CipherDescription::is_valid`] before trusting one.
#[repr(C, packed)]
#[derive(Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct CipherDescription {
    engine: u8,
    key_size: [u8; 2],
    iv_size: u8,
    cipher_mode: u8,
    padding: u8,
    block_size: u8,
    round_count: u8,
    kdf_engine: u8,
    mac_key_size: [u8; 2],
    mac_engine: u8,
}

impl CipherDescription {
    /// Serialized size.
    pub const SIZE: usize = 12;

    /// Describe `engine` with the given key and IV sizes.
    ///
    /// Mode, padding and MAC default to none, block size to 16, the round
    /// count to 0 (engine default) and the KDF digest to SHA-512.
    pub fn new(engine: SymmetricEngine, key_size: u16, iv_size: u8) -> Self {
        Self {
            engine: engine.to_u8(),
            key_size: key_size.to_le_bytes(),
            iv_size,
            cipher_mode: CipherMode::None.to_u8(),
            padding: PaddingMode::None.to_u8(),
            block_size: 16,
            round_count: 0,
            kdf_engine: DigestKind::Sha512.to_u8(),
            mac_key_size: [0; 2],
            mac_engine: DigestKind::None.to_u8(),
        }
    }

    /// Set the block mode.
    #[must_use]
    pub fn with_mode(mut self, mode: CipherMode) -> Self {
        self.cipher_mode = mode.to_u8();
        self
    }

    /// Set the padding scheme.
    #[must_use]
    pub fn with_padding(mut self, padding: PaddingMode) -> Self {
        self.padding = padding.to_u8();
        self
    }

    /// Set the cipher block size in bytes.
    #[must_use]
    pub fn with_block_size(mut self, block_size: u8) -> Self {
        self.block_size = block_size;
        self
    }

    /// Set the round count.
    #[must_use]
    pub fn with_rounds(mut self, rounds: u8) -> Self {
        self.round_count = rounds;
        self
    }

    /// Set the key-derivation digest.
    #[must_use]
    pub fn with_kdf(mut self, kdf: DigestKind) -> Self {
        self.kdf_engine = kdf.to_u8();
        self
    }

    /// Attach a MAC key of `key_size` bytes keyed through `engine`.
    #[must_use]
    pub fn with_mac(mut self, engine: DigestKind, key_size: u16) -> Self {
        self.mac_engine = engine.to_u8();
        self.mac_key_size = key_size.to_le_bytes();
        self
    }

    /// Cipher engine, `None` if the byte is unknown.
    pub fn engine(&self) -> Option<SymmetricEngine> {
        SymmetricEngine::from_u8(self.engine)
    }

    /// Key size in bytes.
    pub fn key_size(&self) -> usize {
        u16::from_le_bytes(self.key_size) as usize
    }

    /// IV size in bytes.
    pub fn iv_size(&self) -> usize {
        self.iv_size as usize
    }

    /// Block mode.
    pub fn cipher_mode(&self) -> Option<CipherMode> {
        CipherMode::from_u8(self.cipher_mode)
    }

    /// Padding scheme.
    pub fn padding(&self) -> Option<PaddingMode> {
        PaddingMode::from_u8(self.padding)
    }

    /// Block size in bytes.
    pub fn block_size(&self) -> usize {
        self.block_size as usize
    }

    /// Round count.
    pub fn round_count(&self) -> usize {
        self.round_count as usize
    }

    /// Key-derivation digest.
    pub fn kdf_engine(&self) -> Option<DigestKind> {
        DigestKind::from_u8(self.kdf_engine)
    }

    /// MAC key size in bytes.
    pub fn mac_key_size(&self) -> usize {
        u16::from_le_bytes(self.mac_key_size) as usize
    }

    /// MAC digest.
    pub fn mac_engine(&self) -> Option<DigestKind> {
        DigestKind::from_u8(self.mac_engine)
    }

    /// `key_size + iv_size + mac_key_size`.
    pub fn material_size(&self) -> usize {
        self.key_size() + self.iv_size() + self.mac_key_size()
    }

    /// Every enum byte is known, the engine and KDF are set, the key is
    /// non-empty, and a MAC key implies a MAC engine.
    pub fn is_valid(&self) -> bool {
        let known = self.cipher_mode().is_some() && self.padding().is_some();
        let engine = matches!(self.engine(), Some(e) if e != SymmetricEngine::None);
        let kdf = matches!(self.kdf_engine(), Some(d) if d != DigestKind::None);
        let mac = match self.mac_engine() {
            None => false,
            Some(DigestKind::None) => self.mac_key_size() == 0,
            Some(_) => true,
        };
        known && engine && kdf && mac && self.key_size() > 0
    }

    /// Serialize.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }

    /// Parse the first [`Self::SIZE`] bytes of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PackageError> {
        Self::read_from_prefix(bytes)
            .map(|(description, _)| description)
            .map_err(|_| PackageError::corrupt("cipher description truncated"))
    }
}

impl std::fmt::Debug for CipherDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherDescription")
            .field("engine", &self.engine())
            .field("key_size", &self.key_size())
            .field("iv_size", &self.iv_size())
            .field("cipher_mode", &self.cipher_mode())
            .field("padding", &self.padding())
            .field("block_size", &self.block_size())
            .field("round_count", &self.round_count())
            .field("kdf_engine", &self.kdf_engine())
            .field("mac_key_size", &self.mac_key_size())
            .field("mac_engine", &self.mac_engine())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aes_ctr() -> CipherDescription {
        CipherDescription::new(SymmetricEngine::Rhx, 32, 16)
            .with_mode(CipherMode::Ctr)
            .with_rounds(22)
            .with_mac(DigestKind::Sha256, 32)
    }

    #[test]
    fn layout_is_twelve_bytes_little_endian() {
        let bytes = CipherDescription::new(SymmetricEngine::Shx, 0x0120, 16)
            .with_mac(DigestKind::Keccak512, 0x0203)
            .to_bytes();
        assert_eq!(bytes.len(), CipherDescription::SIZE);
        assert_eq!(bytes[0], 2);
        assert_eq!(&bytes[1..3], &[0x20, 0x01]);
        assert_eq!(bytes[3], 16);
        assert_eq!(&bytes[9..11], &[0x03, 0x02]);
        assert_eq!(bytes[11], DigestKind::Keccak512.to_u8());
    }

    #[test]
    fn parse_restores_fields() {
        let description = aes_ctr();
        let parsed = CipherDescription::from_bytes(&description.to_bytes()).unwrap();
        assert_eq!(parsed, description);
        assert_eq!(parsed.cipher_mode(), Some(CipherMode::Ctr));
        assert_eq!(parsed.material_size(), 80);
    }

    #[test]
    fn short_input_is_corrupt() {
        let err = CipherDescription::from_bytes(&[1u8; 11]).unwrap_err();
        assert!(matches!(err, PackageError::Corrupt { .. }));
    }

    #[test]
    fn validity_rules() {
        assert!(aes_ctr().is_valid());
        assert!(!CipherDescription::new(SymmetricEngine::None, 32, 16).is_valid());
        assert!(!CipherDescription::new(SymmetricEngine::Rhx, 0, 16).is_valid());
        assert!(!aes_ctr().with_kdf(DigestKind::None).is_valid());
        assert!(!aes_ctr().with_mac(DigestKind::None, 16).is_valid());

        let mut unknown = aes_ctr().to_bytes();
        unknown[4] = 0xEE;
        assert!(!CipherDescription::from_bytes(&unknown).unwrap().is_valid());
    }

    #[test]
    fn enum_bytes_roundtrip() {
        for value in 0..=255u8 {
            if let Some(kind) = DigestKind::from_u8(value) {
                assert_eq!(kind.to_u8(), value);
            }
        }
        assert_eq!(SymmetricEngine::from_u8(6), None);
    }
}
