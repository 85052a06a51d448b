//! Package factory: lifecycle authority over one key package stream.
//!
//! # State machine
//!
//! ```text
//! new(stream, caller) ──empty stream──▶ Creator (may create)
//!         │
//!         └──non-empty──▶ authenticate ──▶ Creator | Operator | NoAccess
//! ```
//!
//! The scope is computed once, at construction, and gates every operation:
//!
//! | operation | scope |
//! |-----------|-------|
//! | `create`, `next_key`, `reset_sub_key_flag` | creator |
//! | `extract` and the read-only queries | creator or operator |
//!
//! # Persistence
//!
//! Every mutating call reads the whole stream, decrypts it into a zeroizing
//! working copy, applies the change and writes the re-encrypted image back
//! from offset 0. Errors leave the stream untouched except for a secure
//! erase that already ran. The factory takes no locks; one stream, one
//! factory.

use std::io::{Read, Seek, SeekFrom, Write};

use cipherkeep_crypto::{Environment, KeyGenerator};
use sha2::digest::{Digest, core_api::BlockSizeUser};
use zeroize::Zeroizing;

use crate::{
    authority::KeyAuthority,
    description::CipherDescription,
    error::PackageError,
    key_params::{EXT_KEY_SIZE, KeyParams},
    package_key::{PackageKey, SubKeyId},
    policy::{KeyPolicies, SubKeyPolicy},
    scope::{self, KeyScope},
    transform,
};

/// Creates, authenticates and serves keys from a package stream.
pub struct PackageFactory<S, E> {
    stream: S,
    caller: KeyAuthority,
    env: E,
    package: Option<PackageKey>,
    scope: KeyScope,
    expired: bool,
}

impl<S: Read + Write + Seek, E: Environment> PackageFactory<S, E> {
    /// Open `stream` on behalf of `caller`.
    ///
    /// An empty stream grants creator scope so a package can be created. A
    /// non-empty stream is authenticated immediately. An encrypted stream
    /// that does not decode under the caller's ids yields `NoAccess`; a
    /// plaintext stream that does not decode is an error.
    pub fn new(mut stream: S, caller: KeyAuthority, env: E) -> Result<Self, PackageError> {
        let len = stream.seek(SeekFrom::End(0))?;
        let mut factory =
            Self { stream, caller, env, package: None, scope: KeyScope::Creator, expired: false };
        if len > 0 {
            factory.authenticate()?;
        }
        Ok(factory)
    }

    /// Scope granted to the caller.
    pub fn access_scope(&self) -> KeyScope {
        self.scope
    }

    /// Whether the package is volatile and past its expiry.
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Give back the stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Decoded package header.
    pub fn package(&self) -> Result<&PackageKey, PackageError> {
        self.require_read("package")?;
        self.package.as_ref().ok_or(PackageError::Empty)
    }

    /// Cipher description of the package.
    pub fn description(&self) -> Result<CipherDescription, PackageError> {
        self.package().map(|package| *package.description())
    }

    /// Write a new package with freshly generated key material.
    ///
    /// Requires an empty stream. Under `PACKAGE_AUTH` everything after the
    /// policy prefix is encrypted with a key derived from the package's own
    /// authority.
    pub fn create<G, D>(
        &mut self,
        package: PackageKey,
        keygen: &KeyGenerator<G, D>,
    ) -> Result<(), PackageError>
    where
        G: Environment,
        D: Digest + BlockSizeUser,
    {
        self.require_creator("create")?;
        if self.package.is_some() {
            return Err(PackageError::invalid("stream already holds a key package"));
        }
        if !package.description().is_valid() {
            return Err(PackageError::InvalidDescription);
        }
        let authority = package.authority();
        if !authority.is_valid() || authority.key_policy() != package.key_policy() {
            return Err(PackageError::InvalidAuthority);
        }

        let header = Zeroizing::new(package.header_bytes());
        let material = keygen.get_bytes(package.slot_size() * package.sub_key_count())?;

        let mut image = Zeroizing::new(Vec::with_capacity(package.stream_size()));
        image.extend_from_slice(&header);
        image.extend_from_slice(&material);

        self.write_image(&package, &image)?;
        tracing::info!(
            subkeys = package.sub_key_count(),
            policy = %package.key_policy(),
            bytes = image.len(),
            "created key package"
        );

        self.expired = scope::is_expired(&package, self.env.wall_clock_secs());
        self.package = Some(package);
        Ok(())
    }

    /// Extract the material of subkey `id`.
    ///
    /// Under `POST_OVERWRITE` the slot is securely erased and the subkey
    /// marked erased; under `SINGLE_USE` it is marked locked.
    pub fn extract(&mut self, id: &SubKeyId) -> Result<(CipherDescription, KeyParams), PackageError> {
        self.require_key_access("extract")?;
        let mut package = self.loaded()?.clone();
        let index = package.index_of(id).ok_or(PackageError::SubKeyNotFound { id: *id })?;
        let word = package.sub_key_policies()[index];
        if word.is_erased() {
            return Err(PackageError::SubKeyErased { id: *id });
        }
        if word.is_locked() {
            return Err(PackageError::SubKeyLocked { id: *id });
        }

        let mut image = self.read_image(&package)?;
        let params = read_slot(&package, &image, index);
        let policy = word.policies();

        let state = if policy.contains(KeyPolicies::POST_OVERWRITE) {
            let offset = package.slot_offset(index);
            transform::secure_erase(
                &mut self.stream,
                offset as u64,
                package.slot_size(),
                &self.env,
            )?;
            image[offset..offset + package.slot_size()].fill(0);
            Some(SubKeyPolicy::ERASED)
        } else if policy.contains(KeyPolicies::SINGLE_USE) {
            Some(SubKeyPolicy::LOCKED)
        } else {
            None
        };

        if let Some(state) = state {
            if let Some(word) = package.sub_key_policy_mut(index) {
                word.set_state(state);
            }
            package.write_header(&mut image[crate::package_key::POLICY_SIZE..]);
            self.write_image(&package, &image)?;
            self.package = Some(package);
        }

        tracing::info!(%id, "extracted subkey");
        Ok((*self.loaded()?.description(), params))
    }

    /// Issue the first subkey that is not expired, locked or erased, then
    /// mark it expired.
    pub fn next_key(&mut self) -> Result<(SubKeyId, CipherDescription, KeyParams), PackageError> {
        self.require_creator("next_key")?;
        self.require_unexpired()?;
        let mut package = self.loaded()?.clone();
        let index = package
            .sub_key_policies()
            .iter()
            .position(|word| word.is_available())
            .ok_or(PackageError::Exhausted)?;
        let id = package.sub_key_ids()[index];

        let mut image = self.read_image(&package)?;
        let params = read_slot(&package, &image, index);

        if let Some(word) = package.sub_key_policy_mut(index) {
            word.set_state(SubKeyPolicy::EXPIRED);
        }
        package.write_header(&mut image[crate::package_key::POLICY_SIZE..]);
        self.write_image(&package, &image)?;

        let description = *package.description();
        self.package = Some(package);
        tracing::info!(%id, remaining = self.count_available(), "issued subkey");
        Ok((id, description, params))
    }

    /// Number of subkeys `next_key` can still issue.
    pub fn keys_remaining(&self) -> Result<usize, PackageError> {
        self.require_read("keys_remaining")?;
        self.loaded()?;
        Ok(self.count_available())
    }

    /// Extension key of subkey `id`.
    pub fn get_extension_key(&mut self, id: &SubKeyId) -> Result<[u8; EXT_KEY_SIZE], PackageError> {
        self.require_key_access("get_extension_key")?;
        let package = self.loaded()?.clone();
        let index = package.index_of(id).ok_or(PackageError::SubKeyNotFound { id: *id })?;
        if package.sub_key_policies()[index].is_erased() {
            return Err(PackageError::SubKeyErased { id: *id });
        }

        let image = self.read_image(&package)?;
        let end = package.slot_offset(index) + package.slot_size();
        let mut ext = [0u8; EXT_KEY_SIZE];
        ext.copy_from_slice(&image[end - EXT_KEY_SIZE..end]);
        Ok(ext)
    }

    /// Whether the package has a subkey `id`.
    pub fn contains_sub_key(&self, id: &SubKeyId) -> Result<bool, PackageError> {
        Ok(self.package()?.index_of(id).is_some())
    }

    /// Whether subkey `id` has been issued.
    pub fn has_expired(&self, id: &SubKeyId) -> Result<bool, PackageError> {
        Ok(self.policy(id)?.is_expired())
    }

    /// Policy word of subkey `id`.
    pub fn policy(&self, id: &SubKeyId) -> Result<SubKeyPolicy, PackageError> {
        let package = self.package()?;
        let index = package.index_of(id).ok_or(PackageError::SubKeyNotFound { id: *id })?;
        Ok(package.sub_key_policies()[index])
    }

    /// Clear the locked and expired flags of subkey `id`.
    ///
    /// Erased subkeys have no material left and cannot be reset.
    pub fn reset_sub_key_flag(&mut self, id: &SubKeyId) -> Result<(), PackageError> {
        self.require_creator("reset_sub_key_flag")?;
        let mut package = self.loaded()?.clone();
        let index = package.index_of(id).ok_or(PackageError::SubKeyNotFound { id: *id })?;
        if package.sub_key_policies()[index].is_erased() {
            return Err(PackageError::SubKeyErased { id: *id });
        }

        let mut image = self.read_image(&package)?;
        if let Some(word) = package.sub_key_policy_mut(index) {
            word.clear_state();
        }
        package.write_header(&mut image[crate::package_key::POLICY_SIZE..]);
        self.write_image(&package, &image)?;
        self.package = Some(package);
        tracing::info!(%id, "reset subkey flags");
        Ok(())
    }

    fn authenticate(&mut self) -> Result<(), PackageError> {
        let mut raw = Zeroizing::new(Vec::new());
        self.stream.seek(SeekFrom::Start(0))?;
        self.stream.read_to_end(&mut raw)?;

        let policy = crate::package_key::read_u64(&raw, 0)
            .map(KeyPolicies::from_bits)
            .ok_or_else(|| PackageError::corrupt("stream shorter than policy prefix"))?;
        if let Some(salt) = transform::package_salt(&self.caller, policy) {
            transform::transform_buffer(&mut raw[crate::package_key::POLICY_SIZE..], &salt)?;
        }

        let package = match decode_image(&raw, policy) {
            Ok(package) => package,
            Err(err) if policy.contains(KeyPolicies::PACKAGE_AUTH) => {
                tracing::warn!(%err, "encrypted package did not decode under caller authority");
                self.scope = KeyScope::NoAccess;
                return Ok(());
            },
            Err(err) => {
                tracing::warn!(%err, "corrupt key package");
                return Err(err);
            },
        };

        let auth = scope::authenticate(&self.caller, &package, self.env.wall_clock_secs());
        if auth.scope == KeyScope::NoAccess {
            tracing::warn!(expired = auth.expired, "key package access denied");
        }
        self.scope = auth.scope;
        self.expired = auth.expired;
        self.package = Some(package);
        Ok(())
    }

    fn loaded(&self) -> Result<&PackageKey, PackageError> {
        self.package.as_ref().ok_or(PackageError::Empty)
    }

    fn count_available(&self) -> usize {
        self.package.as_ref().map_or(0, |package| {
            package.sub_key_policies().iter().filter(|word| word.is_available()).count()
        })
    }

    /// Read and decrypt the full stream image.
    fn read_image(&mut self, package: &PackageKey) -> Result<Zeroizing<Vec<u8>>, PackageError> {
        let mut image = Zeroizing::new(vec![0u8; package.stream_size()]);
        self.stream.seek(SeekFrom::Start(0))?;
        self.stream.read_exact(&mut image)?;
        if let Some(salt) = transform::package_salt(package.authority(), package.key_policy()) {
            transform::transform_buffer(&mut image[crate::package_key::POLICY_SIZE..], &salt)?;
        }
        Ok(image)
    }

    /// Encrypt a copy of `image` if required and write it from offset 0.
    fn write_image(&mut self, package: &PackageKey, image: &[u8]) -> Result<(), PackageError> {
        let mut out = Zeroizing::new(image.to_vec());
        if let Some(salt) = transform::package_salt(package.authority(), package.key_policy()) {
            transform::transform_buffer(&mut out[crate::package_key::POLICY_SIZE..], &salt)?;
        }
        self.stream.seek(SeekFrom::Start(0))?;
        self.stream.write_all(&out)?;
        self.stream.flush()?;
        Ok(())
    }

    fn require_read(&self, operation: &'static str) -> Result<(), PackageError> {
        if self.scope.can_read() {
            Ok(())
        } else {
            tracing::warn!(operation, "denied: caller has no access");
            Err(PackageError::Unauthorized { operation, scope: self.scope })
        }
    }

    fn require_creator(&self, operation: &'static str) -> Result<(), PackageError> {
        if self.scope == KeyScope::Creator {
            Ok(())
        } else {
            tracing::warn!(operation, scope = %self.scope, "denied: creator scope required");
            Err(PackageError::Unauthorized { operation, scope: self.scope })
        }
    }

    fn require_unexpired(&self) -> Result<(), PackageError> {
        if self.expired { Err(PackageError::PackageExpired) } else { Ok(()) }
    }

    fn require_key_access(&self, operation: &'static str) -> Result<(), PackageError> {
        if self.expired {
            return Err(PackageError::PackageExpired);
        }
        self.require_read(operation)
    }
}

/// Decode a decrypted image and check it against its policy prefix.
fn decode_image(image: &[u8], policy: KeyPolicies) -> Result<PackageKey, PackageError> {
    let package = PackageKey::decode(image)?;
    if package.authority().key_policy() != policy {
        return Err(PackageError::corrupt("policy prefix does not match authority"));
    }
    if image.len() != package.stream_size() {
        return Err(PackageError::corrupt(format!(
            "stream is {} bytes, header describes {}",
            image.len(),
            package.stream_size()
        )));
    }
    Ok(package)
}

fn read_slot(package: &PackageKey, image: &[u8], index: usize) -> KeyParams {
    let offset = package.slot_offset(index);
    let description = package.description();
    KeyParams::from_slot(
        &image[offset..offset + package.slot_size()],
        description.key_size(),
        description.iv_size(),
        description.mac_key_size(),
    )
}
