//! Message authentication codes.
//!
//! Three engines behind one [`MacEngine`] trait:
//!
//! - [`Cmac`]: CBC-MAC over a block cipher with the SP800-38B subkey
//!   finalization.
//! - [`Hmac`]: two-pass keyed digest.
//! - [`VmpcMac`]: VMPC permutation MAC with a fixed 20-byte tag.
//!
//! All engines share one lifecycle: `initialize` with [`MacMaterial`], feed
//! input through `update`, then `finalize_into`. Finalizing returns the
//! engine to its freshly initialized state, so the same key can authenticate
//! another message straight away.

mod cmac;
mod hmac;
mod vmac;

pub use self::{
    cmac::Cmac,
    hmac::Hmac,
    vmac::{VMPC_TAG_SIZE, VmpcMac},
};

use crate::{error::CryptoError, material::MacMaterial};

/// A keyed message authentication code.
pub trait MacEngine {
    /// Engine name, used in errors and logs.
    fn name(&self) -> &'static str;

    /// Tag length in bytes.
    fn mac_size(&self) -> usize;

    /// Internal block length in bytes.
    fn block_size(&self) -> usize;

    /// Whether `initialize` has succeeded.
    fn is_initialized(&self) -> bool;

    /// Key the engine. Any in-progress message is discarded.
    fn initialize(&mut self, material: &MacMaterial) -> Result<(), CryptoError>;

    /// Absorb message bytes.
    fn update(&mut self, input: &[u8]) -> Result<(), CryptoError>;

    /// Write the tag into the front of `output` and reset.
    ///
    /// Returns the number of bytes written, always [`MacEngine::mac_size`].
    fn finalize_into(&mut self, output: &mut [u8]) -> Result<usize, CryptoError>;

    /// Discard the in-progress message, keeping the key.
    fn reset(&mut self);

    /// One-shot MAC over `input`.
    fn compute_mac(&mut self, input: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.update(input)?;
        let mut tag = vec![0u8; self.mac_size()];
        self.finalize_into(&mut tag)?;
        Ok(tag)
    }
}

/// Checks that `output` can hold a `mac_size`-byte tag.
fn check_output(output: &[u8], mac_size: usize) -> Result<(), CryptoError> {
    if output.len() < mac_size {
        return Err(CryptoError::OutputOutOfRange { offset: 0, size: mac_size, len: output.len() });
    }
    Ok(())
}
