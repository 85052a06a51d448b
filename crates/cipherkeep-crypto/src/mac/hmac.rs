//! Keyed-hash MAC (RFC 2104)

use ::hmac::{Mac, SimpleHmac};
use sha2::digest::{Digest, core_api::BlockSizeUser};

use super::{MacEngine, check_output};
use crate::{error::CryptoError, material::MacMaterial};

/// HMAC over digest `D`.
///
/// When the material carries a salt the effective key is `D(key || salt)`.
/// A keyed copy of the inner state is kept so finalizing can re-prime the
/// engine without re-deriving the pads.
pub struct Hmac<D: Digest + BlockSizeUser + Clone> {
    primed: Option<SimpleHmac<D>>,
    active: Option<SimpleHmac<D>>,
}

impl<D: Digest + BlockSizeUser + Clone> Hmac<D> {
    /// Create an uninitialized engine.
    pub fn new() -> Self {
        Self { primed: None, active: None }
    }

    fn active(&mut self) -> Result<&mut SimpleHmac<D>, CryptoError> {
        self.active.as_mut().ok_or(CryptoError::NotInitialized { engine: "HMAC" })
    }
}

impl<D: Digest + BlockSizeUser + Clone> Default for Hmac<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Digest + BlockSizeUser + Clone> MacEngine for Hmac<D> {
    fn name(&self) -> &'static str {
        "HMAC"
    }

    fn mac_size(&self) -> usize {
        <D as Digest>::output_size()
    }

    fn block_size(&self) -> usize {
        <D as BlockSizeUser>::block_size()
    }

    fn is_initialized(&self) -> bool {
        self.primed.is_some()
    }

    fn initialize(&mut self, material: &MacMaterial) -> Result<(), CryptoError> {
        let keyed = match material.salt() {
            Some(salt) => {
                let key = D::new().chain_update(material.key()).chain_update(salt).finalize();
                SimpleHmac::<D>::new_from_slice(&key)
            },
            None => SimpleHmac::<D>::new_from_slice(material.key()),
        }
        .map_err(|_| CryptoError::invalid("HMAC key rejected"))?;

        self.active = Some(keyed.clone());
        self.primed = Some(keyed);
        Ok(())
    }

    fn update(&mut self, input: &[u8]) -> Result<(), CryptoError> {
        self.active()?.update(input);
        Ok(())
    }

    fn finalize_into(&mut self, output: &mut [u8]) -> Result<usize, CryptoError> {
        let Some(primed) = self.primed.as_ref() else {
            return Err(CryptoError::NotInitialized { engine: "HMAC" });
        };
        let size = <D as Digest>::output_size();
        check_output(output, size)?;

        let finished = self.active.replace(primed.clone());
        let Some(finished) = finished else {
            return Err(CryptoError::NotInitialized { engine: "HMAC" });
        };
        output[..size].copy_from_slice(&finished.finalize().into_bytes());
        Ok(size)
    }

    fn reset(&mut self) {
        self.active.clone_from(&self.primed);
    }
}
