//! Single-key store: one cipher key with its description.
//!
//! ```text
//! [CipherKey    44 bytes]  key_id, description, ext_key
//! [key || iv || mac_key ]  sized from the description
//! ```
//!
//! Stored in the clear; wrap the stream if it needs protection at rest.

use std::{
    fmt,
    io::{Read, Seek, SeekFrom, Write},
};

use cipherkeep_crypto::{Environment, KeyGenerator};
use sha2::digest::{Digest, core_api::BlockSizeUser};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
use zeroize::Zeroizing;

use crate::{
    authority::ID_SIZE,
    description::CipherDescription,
    error::PackageError,
    key_params::{EXT_KEY_SIZE, KeyParams},
};

/// Header of a stored single key.
#[repr(C, packed)]
#[derive(Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct CipherKey {
    key_id: [u8; ID_SIZE],
    description: CipherDescription,
    ext_key: [u8; EXT_KEY_SIZE],
}

impl CipherKey {
    /// Serialized size.
    pub const SIZE: usize = ID_SIZE + CipherDescription::SIZE + EXT_KEY_SIZE;

    /// Assemble a header.
    pub fn new(
        key_id: [u8; ID_SIZE],
        description: CipherDescription,
        ext_key: [u8; EXT_KEY_SIZE],
    ) -> Self {
        Self { key_id, description, ext_key }
    }

    /// Key identity.
    pub fn key_id(&self) -> [u8; ID_SIZE] {
        self.key_id
    }

    /// Cipher the key belongs to.
    pub fn description(&self) -> CipherDescription {
        self.description
    }

    /// Extension key.
    pub fn ext_key(&self) -> [u8; EXT_KEY_SIZE] {
        self.ext_key
    }

    /// Header plus material size.
    pub fn stream_size(&self) -> usize {
        Self::SIZE + self.description().material_size()
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherKey")
            .field("key_id", &hex::encode(self.key_id()))
            .field("description", &self.description())
            .finish_non_exhaustive()
    }
}

/// Creates and reads a single stored key.
pub struct KeyFactory<S> {
    stream: S,
}

impl<S: Read + Write + Seek> KeyFactory<S> {
    /// Wrap a stream.
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Give back the stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Generate and store a key for `description`.
    ///
    /// The key id, extension key and material all come from `keygen`. The
    /// stream must be empty.
    pub fn create<E, D>(
        &mut self,
        description: CipherDescription,
        keygen: &KeyGenerator<E, D>,
    ) -> Result<CipherKey, PackageError>
    where
        E: Environment,
        D: Digest + BlockSizeUser,
    {
        if !description.is_valid() {
            return Err(PackageError::InvalidDescription);
        }
        if self.stream.seek(SeekFrom::End(0))? != 0 {
            return Err(PackageError::invalid("stream already holds a key"));
        }

        let material = keygen.get_bytes(ID_SIZE + EXT_KEY_SIZE + description.material_size())?;
        let (key_id, rest) = material.split_at(ID_SIZE);
        let (ext_key, body) = rest.split_at(EXT_KEY_SIZE);

        let mut id = [0u8; ID_SIZE];
        id.copy_from_slice(key_id);
        let mut ext = [0u8; EXT_KEY_SIZE];
        ext.copy_from_slice(ext_key);
        let header = CipherKey::new(id, description, ext);

        let mut image = Zeroizing::new(Vec::with_capacity(header.stream_size()));
        image.extend_from_slice(header.as_bytes());
        image.extend_from_slice(body);

        self.stream.seek(SeekFrom::Start(0))?;
        self.stream.write_all(&image)?;
        self.stream.flush()?;
        tracing::info!(key_id = %hex::encode(header.key_id()), "created cipher key");
        Ok(header)
    }

    /// Read the stored key and its material.
    pub fn extract(&mut self) -> Result<(CipherKey, KeyParams), PackageError> {
        let mut image = Zeroizing::new(Vec::new());
        self.stream.seek(SeekFrom::Start(0))?;
        self.stream.read_to_end(&mut image)?;

        let (header, body) = CipherKey::read_from_prefix(&image)
            .map_err(|_| PackageError::corrupt("cipher key header truncated"))?;
        let description = header.description();
        if body.len() != description.material_size() {
            tracing::warn!(
                expected = description.material_size(),
                actual = body.len(),
                "cipher key material size mismatch"
            );
            return Err(PackageError::corrupt(format!(
                "expected {} material bytes, found {}",
                description.material_size(),
                body.len()
            )));
        }

        let (key, rest) = body.split_at(description.key_size());
        let (iv, ikm) = rest.split_at(description.iv_size());
        let params = KeyParams::new(key.to_vec(), iv.to_vec(), ikm.to_vec(), header.ext_key().to_vec());
        Ok((header, params))
    }
}
