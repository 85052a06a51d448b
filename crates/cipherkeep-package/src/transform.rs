//! At-rest encryption and secure erasure of package streams.

use std::io::{Seek, SeekFrom, Write};

use aes::Aes256;
use cipherkeep_crypto::Environment;
use ctr::{
    Ctr128BE,
    cipher::{KeyIvInit, StreamCipher},
};
use sha2::{Digest, Sha384};
use zeroize::Zeroizing;

use crate::{authority::KeyAuthority, error::PackageError, policy::KeyPolicies};

const KEY_SIZE: usize = 32;
const IV_SIZE: usize = 16;

/// Salt for the at-rest key, or `None` when the package is stored in the
/// clear.
///
/// Only `PACKAGE_AUTH` packages are encrypted. The salt concatenates, in
/// this order, the package id, then the domain id under `DOMAIN_RESTRICT`,
/// then the target id under `IDENTITY_RESTRICT`.
pub fn package_salt(authority: &KeyAuthority, policy: KeyPolicies) -> Option<Zeroizing<Vec<u8>>> {
    if !policy.contains(KeyPolicies::PACKAGE_AUTH) {
        return None;
    }
    let mut salt = Zeroizing::new(authority.package_id().to_vec());
    if policy.contains(KeyPolicies::DOMAIN_RESTRICT) {
        salt.extend_from_slice(&authority.domain_id());
    }
    if policy.contains(KeyPolicies::IDENTITY_RESTRICT) {
        salt.extend_from_slice(&authority.target_id());
    }
    Some(salt)
}

/// XOR `buffer` with AES-256-CTR keyed from `SHA-384(salt)`.
///
/// The first 32 digest bytes are the key, the remaining 16 the initial
/// counter block. Applying the transform twice restores the input.
pub fn transform_buffer(buffer: &mut [u8], salt: &[u8]) -> Result<(), PackageError> {
    let mut derived = Zeroizing::new([0u8; KEY_SIZE + IV_SIZE]);
    derived.copy_from_slice(&Sha384::digest(salt));

    let mut cipher =
        Ctr128BE::<Aes256>::new_from_slices(&derived[..KEY_SIZE], &derived[KEY_SIZE..])
            .map_err(|_| PackageError::invalid("at-rest key derivation produced bad lengths"))?;
    cipher.apply_keystream(buffer);
    Ok(())
}

/// Overwrite `len` bytes at `offset` with three passes: random bytes, the
/// same bytes reversed, then `0xFF`. Each pass is flushed before the next.
///
/// The caller writes the final zero fill.
pub fn secure_erase<S, E>(stream: &mut S, offset: u64, len: usize, env: &E) -> Result<(), PackageError>
where
    S: Write + Seek,
    E: Environment,
{
    let mut pass = Zeroizing::new(vec![0u8; len]);
    env.random_bytes(&mut pass);
    write_pass(stream, offset, &pass)?;

    pass.reverse();
    write_pass(stream, offset, &pass)?;

    pass.fill(0xFF);
    write_pass(stream, offset, &pass)?;

    tracing::warn!(offset, len, "securely erased stream region");
    Ok(())
}

fn write_pass<S: Write + Seek>(stream: &mut S, offset: u64, data: &[u8]) -> Result<(), PackageError> {
    stream.seek(SeekFrom::Start(offset))?;
    stream.write_all(data)?;
    stream.flush()?;
    Ok(())
}
