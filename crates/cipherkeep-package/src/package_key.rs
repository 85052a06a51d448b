//! Key package header: authority, cipher description and subkey table.
//!
//! # Stream layout
//!
//! All integers little-endian. `n` is the subkey count.
//!
//! ```text
//! [u64 key_policy]                    always plaintext
//! [KeyAuthority       80 bytes]  ┐
//! [CipherDescription  12 bytes]  │
//! [u32 n]                        │ encrypted under PACKAGE_AUTH
//! [SubKeyId × n       16 bytes]  │
//! [u64 policy × n]               │
//! [slot × n]                     ┘
//! ```
//!
//! A slot is `key || iv || mac_key || ext_key`, sized from the description,
//! in subkey-id order. There is no version field.

use std::{collections::HashSet, fmt, str::FromStr};

use cipherkeep_crypto::Environment;

use crate::{
    authority::{ID_SIZE, KeyAuthority},
    description::CipherDescription,
    error::PackageError,
    key_params::EXT_KEY_SIZE,
    policy::{KeyPolicies, SubKeyPolicy},
};

/// Subkey count bounds.
pub const MIN_SUBKEYS: usize = 1;
/// See [`MIN_SUBKEYS`].
pub const MAX_SUBKEYS: usize = 100_000;

/// Size of the unencrypted policy prefix.
pub const POLICY_SIZE: usize = 8;

const FIXED_HEADER_SIZE: usize = KeyAuthority::SIZE + CipherDescription::SIZE + 4;
const PER_SUBKEY_HEADER_SIZE: usize = ID_SIZE + 8;

/// Opaque 16-byte subkey identifier, displayed as hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubKeyId([u8; ID_SIZE]);

impl SubKeyId {
    /// Wrap raw bytes.
    pub const fn from_bytes(bytes: [u8; ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub const fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }

    /// Random id from the environment.
    pub fn random<E: Environment>(env: &E) -> Self {
        let mut bytes = [0u8; ID_SIZE];
        env.random_bytes(&mut bytes);
        Self(bytes)
    }
}

impl fmt::Display for SubKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for SubKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubKeyId({self})")
    }
}

impl FromStr for SubKeyId {
    type Err = PackageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| PackageError::invalid(format!("subkey id: {e}")))?;
        let bytes: [u8; ID_SIZE] = bytes
            .try_into()
            .map_err(|_| PackageError::invalid(format!("subkey id must be {ID_SIZE} bytes")))?;
        Ok(Self(bytes))
    }
}

/// Policy descriptor and subkey table of one key package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageKey {
    authority: KeyAuthority,
    description: CipherDescription,
    key_policy: KeyPolicies,
    sub_key_ids: Vec<SubKeyId>,
    sub_key_policies: Vec<SubKeyPolicy>,
}

impl PackageKey {
    /// Build a package with `count` fresh, unique random subkey ids.
    ///
    /// The package policy is taken from `authority`.
    pub fn new<E: Environment>(
        authority: KeyAuthority,
        description: CipherDescription,
        count: usize,
        env: &E,
    ) -> Result<Self, PackageError> {
        check_count(count)?;
        let mut seen = HashSet::with_capacity(count);
        let mut ids = Vec::with_capacity(count);
        while ids.len() < count {
            let id = SubKeyId::random(env);
            if seen.insert(id) {
                ids.push(id);
            }
        }
        Self::with_ids(authority, description, ids)
    }

    /// Build a package with caller-chosen subkey ids.
    pub fn with_ids(
        authority: KeyAuthority,
        description: CipherDescription,
        ids: Vec<SubKeyId>,
    ) -> Result<Self, PackageError> {
        check_count(ids.len())?;
        if !all_unique(&ids) {
            return Err(PackageError::invalid("subkey ids must be unique"));
        }
        let key_policy = authority.key_policy();
        let sub_key_policies = vec![SubKeyPolicy::new(key_policy); ids.len()];
        Ok(Self { authority, description, key_policy, sub_key_ids: ids, sub_key_policies })
    }

    /// Creator identity and policy.
    pub fn authority(&self) -> &KeyAuthority {
        &self.authority
    }

    /// Cipher the subkeys belong to.
    pub fn description(&self) -> &CipherDescription {
        &self.description
    }

    /// Package policy flags.
    pub fn key_policy(&self) -> KeyPolicies {
        self.key_policy
    }

    /// Number of subkeys.
    pub fn sub_key_count(&self) -> usize {
        self.sub_key_ids.len()
    }

    /// Subkey ids in slot order.
    pub fn sub_key_ids(&self) -> &[SubKeyId] {
        &self.sub_key_ids
    }

    /// Per-subkey policy words in slot order.
    pub fn sub_key_policies(&self) -> &[SubKeyPolicy] {
        &self.sub_key_policies
    }

    /// Slot index of `id`.
    pub fn index_of(&self, id: &SubKeyId) -> Option<usize> {
        self.sub_key_ids.iter().position(|candidate| candidate == id)
    }

    pub(crate) fn sub_key_policy_mut(&mut self, index: usize) -> Option<&mut SubKeyPolicy> {
        self.sub_key_policies.get_mut(index)
    }

    /// Bytes per subkey slot.
    pub fn slot_size(&self) -> usize {
        self.description.material_size() + EXT_KEY_SIZE
    }

    /// Header size after the policy prefix.
    pub fn header_size(&self) -> usize {
        header_size(self.sub_key_count())
    }

    /// Total stream size: policy prefix, header and slot table.
    pub fn stream_size(&self) -> usize {
        POLICY_SIZE + self.header_size() + self.slot_size() * self.sub_key_count()
    }

    /// Stream offset of slot `index`.
    pub fn slot_offset(&self, index: usize) -> usize {
        POLICY_SIZE + self.header_size() + index * self.slot_size()
    }

    /// Serialize the header (without the policy prefix) into `out`.
    ///
    /// `out` must be at least [`Self::header_size`] bytes.
    pub(crate) fn write_header(&self, out: &mut [u8]) {
        let (authority, rest) = out.split_at_mut(KeyAuthority::SIZE);
        authority.copy_from_slice(&self.authority.to_bytes());
        let (description, rest) = rest.split_at_mut(CipherDescription::SIZE);
        description.copy_from_slice(&self.description.to_bytes());
        let (count, rest) = rest.split_at_mut(4);
        count.copy_from_slice(&(self.sub_key_count() as u32).to_le_bytes());

        let (ids, rest) = rest.split_at_mut(ID_SIZE * self.sub_key_count());
        for (chunk, id) in ids.chunks_exact_mut(ID_SIZE).zip(&self.sub_key_ids) {
            chunk.copy_from_slice(id.as_bytes());
        }
        for (chunk, policy) in rest.chunks_exact_mut(8).zip(&self.sub_key_policies) {
            chunk.copy_from_slice(&policy.bits().to_le_bytes());
        }
    }

    /// Serialize the policy prefix and header.
    pub fn header_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; POLICY_SIZE + self.header_size()];
        out[..POLICY_SIZE].copy_from_slice(&self.key_policy.bits().to_le_bytes());
        self.write_header(&mut out[POLICY_SIZE..]);
        out
    }

    /// Parse a header from a plaintext stream image (policy prefix first).
    ///
    /// Trailing slot bytes are not inspected.
    pub fn decode(stream: &[u8]) -> Result<Self, PackageError> {
        let policy = read_u64(stream, 0)
            .ok_or_else(|| PackageError::corrupt("stream shorter than policy prefix"))?;
        let body = &stream[POLICY_SIZE..];

        let authority = KeyAuthority::from_bytes(body)?;
        let description = CipherDescription::from_bytes(&body[KeyAuthority::SIZE..])?;
        let count = read_u32(body, KeyAuthority::SIZE + CipherDescription::SIZE)
            .ok_or_else(|| PackageError::corrupt("subkey count truncated"))?
            as usize;
        if !(MIN_SUBKEYS..=MAX_SUBKEYS).contains(&count) {
            return Err(PackageError::corrupt(format!("subkey count {count} out of range")));
        }
        if body.len() < header_size(count) {
            return Err(PackageError::corrupt("subkey table truncated"));
        }

        let ids_start = FIXED_HEADER_SIZE;
        let policies_start = ids_start + ID_SIZE * count;
        let sub_key_ids: Vec<SubKeyId> = body[ids_start..policies_start]
            .chunks_exact(ID_SIZE)
            .map(|chunk| {
                let mut id = [0u8; ID_SIZE];
                id.copy_from_slice(chunk);
                SubKeyId(id)
            })
            .collect();
        if !all_unique(&sub_key_ids) {
            return Err(PackageError::corrupt("duplicate subkey id"));
        }
        let sub_key_policies = (0..count)
            .map(|i| read_u64(body, policies_start + i * 8).map(SubKeyPolicy::from_bits))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| PackageError::corrupt("subkey policies truncated"))?;

        Ok(Self {
            authority,
            description,
            key_policy: KeyPolicies::from_bits(policy),
            sub_key_ids,
            sub_key_policies,
        })
    }
}

fn header_size(count: usize) -> usize {
    FIXED_HEADER_SIZE + PER_SUBKEY_HEADER_SIZE * count
}

fn check_count(count: usize) -> Result<(), PackageError> {
    if (MIN_SUBKEYS..=MAX_SUBKEYS).contains(&count) {
        Ok(())
    } else {
        Err(PackageError::invalid(format!(
            "subkey count must be {MIN_SUBKEYS}..={MAX_SUBKEYS}, got {count}"
        )))
    }
}

fn all_unique(ids: &[SubKeyId]) -> bool {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().all(|id| seen.insert(*id))
}

pub(crate) fn read_u64(bytes: &[u8], offset: usize) -> Option<u64> {
    let chunk = bytes.get(offset..offset.checked_add(8)?)?;
    let mut word = [0u8; 8];
    word.copy_from_slice(chunk);
    Some(u64::from_le_bytes(word))
}

pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let chunk = bytes.get(offset..offset.checked_add(4)?)?;
    let mut word = [0u8; 4];
    word.copy_from_slice(chunk);
    Some(u32::from_le_bytes(word))
}
