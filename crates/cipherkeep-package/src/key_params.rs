//! Extracted key material handed to the external cipher layer.

use std::fmt;

use zeroize::Zeroizing;

/// Size of the per-slot extension key.
pub const EXT_KEY_SIZE: usize = 16;

/// Key, IV, MAC key and extension key read from one slot.
///
/// Every buffer is zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyParams {
    key: Zeroizing<Vec<u8>>,
    iv: Zeroizing<Vec<u8>>,
    ikm: Zeroizing<Vec<u8>>,
    ext_key: Zeroizing<Vec<u8>>,
}

impl KeyParams {
    /// Bundle material.
    pub fn new(key: Vec<u8>, iv: Vec<u8>, ikm: Vec<u8>, ext_key: Vec<u8>) -> Self {
        Self {
            key: Zeroizing::new(key),
            iv: Zeroizing::new(iv),
            ikm: Zeroizing::new(ikm),
            ext_key: Zeroizing::new(ext_key),
        }
    }

    /// Split a slot laid out as `key || iv || ikm || ext_key`.
    ///
    /// `slot` must be exactly `key_size + iv_size + mac_key_size + ext_size`
    /// bytes; callers compute offsets from the same description.
    pub(crate) fn from_slot(
        slot: &[u8],
        key_size: usize,
        iv_size: usize,
        mac_key_size: usize,
    ) -> Self {
        let (key, rest) = slot.split_at(key_size);
        let (iv, rest) = rest.split_at(iv_size);
        let (ikm, ext_key) = rest.split_at(mac_key_size);
        Self::new(key.to_vec(), iv.to_vec(), ikm.to_vec(), ext_key.to_vec())
    }

    /// Cipher key.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Cipher IV or nonce.
    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    /// MAC key (input keying material); empty when the cipher has no MAC.
    pub fn ikm(&self) -> &[u8] {
        &self.ikm
    }

    /// Extension key; empty for material without one.
    pub fn ext_key(&self) -> &[u8] {
        &self.ext_key
    }
}

impl fmt::Debug for KeyParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyParams")
            .field("key_len", &self.key.len())
            .field("iv_len", &self.iv.len())
            .field("ikm_len", &self.ikm.len())
            .field("ext_key_len", &self.ext_key.len())
            .finish()
    }
}
