//! Volume keys: one `key || iv` slot per file, indexed by a 32-bit file id.
//!
//! ```text
//! [tag                32 bytes]
//! [CipherDescription  12 bytes]
//! [u32 n]
//! [u32 file_id × n]
//! [u8 state × n]
//! [key || iv × n]
//! ```

use std::{
    collections::HashSet,
    io::{Read, Seek, SeekFrom, Write},
};

use cipherkeep_crypto::{Environment, KeyGenerator};
use sha2::digest::{Digest, core_api::BlockSizeUser};
use zeroize::Zeroizing;

use crate::{
    description::CipherDescription,
    error::PackageError,
    key_params::KeyParams,
    package_key::{MAX_SUBKEYS, MIN_SUBKEYS, read_u32},
};

/// Width of the volume tag.
pub const TAG_SIZE: usize = 32;

const FIXED_HEADER_SIZE: usize = TAG_SIZE + CipherDescription::SIZE + 4;

/// Lifecycle of one volume slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VolumeKeyState {
    /// Not yet handed out
    Unassigned = 0,
    /// Bound to a file
    Assigned = 1,
    /// Temporarily refused
    Locked = 2,
    /// Material zeroed
    Erased = 3,
}

impl VolumeKeyState {
    /// Parse a stored state byte.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Unassigned),
            1 => Some(Self::Assigned),
            2 => Some(Self::Locked),
            3 => Some(Self::Erased),
            _ => None,
        }
    }

    /// Stored state byte.
    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Header of a volume key store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeKey {
    tag: [u8; TAG_SIZE],
    description: CipherDescription,
    file_ids: Vec<u32>,
    states: Vec<VolumeKeyState>,
}

impl VolumeKey {
    /// Volume with `count` unique random file ids, all unassigned.
    pub fn new<E: Environment>(
        tag: [u8; TAG_SIZE],
        description: CipherDescription,
        count: usize,
        env: &E,
    ) -> Result<Self, PackageError> {
        if !(MIN_SUBKEYS..=MAX_SUBKEYS).contains(&count) {
            return Err(PackageError::invalid(format!(
                "volume size must be {MIN_SUBKEYS}..={MAX_SUBKEYS}, got {count}"
            )));
        }
        let mut seen = HashSet::with_capacity(count);
        let mut file_ids = Vec::with_capacity(count);
        while file_ids.len() < count {
            let id = env.random_u32();
            if seen.insert(id) {
                file_ids.push(id);
            }
        }
        Ok(Self { tag, description, file_ids, states: vec![VolumeKeyState::Unassigned; count] })
    }

    /// Caller-defined volume tag.
    pub fn tag(&self) -> &[u8; TAG_SIZE] {
        &self.tag
    }

    /// Cipher the slots belong to.
    pub fn description(&self) -> &CipherDescription {
        &self.description
    }

    /// File ids in slot order.
    pub fn file_ids(&self) -> &[u32] {
        &self.file_ids
    }

    /// Slot states in slot order.
    pub fn states(&self) -> &[VolumeKeyState] {
        &self.states
    }

    /// Number of slots.
    pub fn count(&self) -> usize {
        self.file_ids.len()
    }

    fn index_of(&self, file_id: u32) -> Option<usize> {
        self.file_ids.iter().position(|&id| id == file_id)
    }

    fn slot_size(&self) -> usize {
        self.description.key_size() + self.description.iv_size()
    }

    fn header_size(&self) -> usize {
        FIXED_HEADER_SIZE + 5 * self.count()
    }

    fn slot_offset(&self, index: usize) -> usize {
        self.header_size() + index * self.slot_size()
    }

    /// Total stream size.
    pub fn stream_size(&self) -> usize {
        self.slot_offset(self.count())
    }

    fn write_header(&self, out: &mut [u8]) {
        out[..TAG_SIZE].copy_from_slice(&self.tag);
        out[TAG_SIZE..TAG_SIZE + CipherDescription::SIZE]
            .copy_from_slice(&self.description.to_bytes());
        let mut at = TAG_SIZE + CipherDescription::SIZE;
        out[at..at + 4].copy_from_slice(&(self.count() as u32).to_le_bytes());
        at += 4;
        for id in &self.file_ids {
            out[at..at + 4].copy_from_slice(&id.to_le_bytes());
            at += 4;
        }
        for (byte, state) in out[at..at + self.count()].iter_mut().zip(&self.states) {
            *byte = state.to_u8();
        }
    }

    /// Parse a volume header from a stream image.
    pub fn decode(bytes: &[u8]) -> Result<Self, PackageError> {
        if bytes.len() < FIXED_HEADER_SIZE {
            return Err(PackageError::corrupt("volume header truncated"));
        }
        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(&bytes[..TAG_SIZE]);
        let description = CipherDescription::from_bytes(&bytes[TAG_SIZE..])?;
        let count = read_u32(bytes, TAG_SIZE + CipherDescription::SIZE)
            .ok_or_else(|| PackageError::corrupt("volume count truncated"))?
            as usize;
        if !(MIN_SUBKEYS..=MAX_SUBKEYS).contains(&count) {
            return Err(PackageError::corrupt(format!("volume count {count} out of range")));
        }
        if bytes.len() < FIXED_HEADER_SIZE + 5 * count {
            return Err(PackageError::corrupt("volume table truncated"));
        }

        let file_ids: Vec<u32> = bytes[FIXED_HEADER_SIZE..FIXED_HEADER_SIZE + 4 * count]
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        let mut seen = HashSet::with_capacity(count);
        if !file_ids.iter().all(|id| seen.insert(*id)) {
            return Err(PackageError::corrupt("duplicate volume file id"));
        }
        let states_start = FIXED_HEADER_SIZE + 4 * count;
        let states = bytes[states_start..states_start + count]
            .iter()
            .map(|&b| VolumeKeyState::from_u8(b))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| PackageError::corrupt("unknown volume slot state"))?;

        Ok(Self { tag, description, file_ids, states })
    }
}

/// Creates and serves keys from a volume store.
pub struct VolumeFactory<S> {
    stream: S,
    volume: Option<VolumeKey>,
}

impl<S: Read + Write + Seek> VolumeFactory<S> {
    /// Open `stream`, decoding the header if it is not empty.
    pub fn new(mut stream: S) -> Result<Self, PackageError> {
        let len = stream.seek(SeekFrom::End(0))?;
        let mut factory = Self { stream, volume: None };
        if len > 0 {
            let image = factory.read_all()?;
            let volume = VolumeKey::decode(&image)?;
            if image.len() != volume.stream_size() {
                tracing::warn!(len = image.len(), "volume stream size mismatch");
                return Err(PackageError::corrupt("volume stream size mismatch"));
            }
            factory.volume = Some(volume);
        }
        Ok(factory)
    }

    /// Decoded header.
    pub fn volume(&self) -> Result<&VolumeKey, PackageError> {
        self.volume.as_ref().ok_or(PackageError::Empty)
    }

    /// Give back the stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Write `volume` with fresh key material.
    pub fn create<E, D>(
        &mut self,
        volume: VolumeKey,
        keygen: &KeyGenerator<E, D>,
    ) -> Result<(), PackageError>
    where
        E: Environment,
        D: Digest + BlockSizeUser,
    {
        if self.volume.is_some() {
            return Err(PackageError::invalid("stream already holds a volume"));
        }
        if !volume.description().is_valid() {
            return Err(PackageError::InvalidDescription);
        }

        let mut image = Zeroizing::new(vec![0u8; volume.header_size()]);
        volume.write_header(&mut image);
        image.extend_from_slice(&keygen.get_bytes(volume.slot_size() * volume.count())?);
        self.write_all(&image)?;

        tracing::info!(files = volume.count(), "created volume key");
        self.volume = Some(volume);
        Ok(())
    }

    /// Material for `file_id`.
    pub fn extract(&mut self, file_id: u32) -> Result<KeyParams, PackageError> {
        let volume = self.volume()?.clone();
        let index = volume.index_of(file_id).ok_or(PackageError::FileNotFound { file_id })?;
        match volume.states[index] {
            VolumeKeyState::Erased => return Err(PackageError::FileErased { file_id }),
            VolumeKeyState::Locked => return Err(PackageError::FileLocked { file_id }),
            VolumeKeyState::Unassigned | VolumeKeyState::Assigned => {},
        }
        let image = self.read_image(&volume)?;
        Ok(read_slot(&volume, &image, index))
    }

    /// Assign the first unassigned slot.
    pub fn next_key(&mut self) -> Result<(u32, KeyParams), PackageError> {
        let mut volume = self.volume()?.clone();
        let index = volume
            .states
            .iter()
            .position(|&state| state == VolumeKeyState::Unassigned)
            .ok_or(PackageError::Exhausted)?;

        let mut image = self.read_image(&volume)?;
        let params = read_slot(&volume, &image, index);
        volume.states[index] = VolumeKeyState::Assigned;
        volume.write_header(&mut image);
        self.write_all(&image)?;

        let file_id = volume.file_ids[index];
        self.volume = Some(volume);
        tracing::info!(file_id, "assigned volume key");
        Ok((file_id, params))
    }

    /// Set the state of `file_id`. Erasing zeroes the slot material.
    pub fn set_state(&mut self, file_id: u32, state: VolumeKeyState) -> Result<(), PackageError> {
        let mut volume = self.volume()?.clone();
        let index = volume.index_of(file_id).ok_or(PackageError::FileNotFound { file_id })?;
        if volume.states[index] == VolumeKeyState::Erased && state != VolumeKeyState::Erased {
            return Err(PackageError::FileErased { file_id });
        }

        let mut image = self.read_image(&volume)?;
        if state == VolumeKeyState::Erased {
            let offset = volume.slot_offset(index);
            image[offset..offset + volume.slot_size()].fill(0);
            tracing::warn!(file_id, "erased volume key");
        }
        volume.states[index] = state;
        volume.write_header(&mut image);
        self.write_all(&image)?;
        self.volume = Some(volume);
        Ok(())
    }

    /// Number of unassigned slots.
    pub fn remaining(&self) -> Result<usize, PackageError> {
        Ok(self
            .volume()?
            .states
            .iter()
            .filter(|&&state| state == VolumeKeyState::Unassigned)
            .count())
    }

    /// Whether the volume has a slot for `file_id`.
    pub fn contains(&self, file_id: u32) -> Result<bool, PackageError> {
        Ok(self.volume()?.index_of(file_id).is_some())
    }

    fn read_all(&mut self) -> Result<Zeroizing<Vec<u8>>, PackageError> {
        let mut image = Zeroizing::new(Vec::new());
        self.stream.seek(SeekFrom::Start(0))?;
        self.stream.read_to_end(&mut image)?;
        Ok(image)
    }

    /// Read the full image, refusing a stream whose length no longer
    /// matches the header.
    fn read_image(&mut self, volume: &VolumeKey) -> Result<Zeroizing<Vec<u8>>, PackageError> {
        let len = self.stream.seek(SeekFrom::End(0))?;
        if len != volume.stream_size() as u64 {
            tracing::warn!(len, expected = volume.stream_size(), "volume stream size mismatch");
            return Err(PackageError::corrupt("volume stream size mismatch"));
        }
        let mut image = Zeroizing::new(vec![0u8; volume.stream_size()]);
        self.stream.seek(SeekFrom::Start(0))?;
        self.stream.read_exact(&mut image)?;
        Ok(image)
    }

    fn write_all(&mut self, image: &[u8]) -> Result<(), PackageError> {
        self.stream.seek(SeekFrom::Start(0))?;
        self.stream.write_all(image)?;
        self.stream.flush()?;
        Ok(())
    }
}

fn read_slot(volume: &VolumeKey, image: &[u8], index: usize) -> KeyParams {
    let offset = volume.slot_offset(index);
    let slot = &image[offset..offset + volume.slot_size()];
    let (key, iv) = slot.split_at(volume.description.key_size());
    KeyParams::new(key.to_vec(), iv.to_vec(), Vec::new(), Vec::new())
}
