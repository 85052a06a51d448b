//! Cipher-based MAC (SP800-38B / RFC 4493)

use std::marker::PhantomData;

use aes::cipher::{BlockEncrypt, BlockSizeUser, KeyInit, generic_array::GenericArray};
use zeroize::Zeroize;

use super::{MacEngine, check_output};
use crate::{error::CryptoError, material::MacMaterial};

/// Reduction constant for 128-bit blocks.
const RB_128: u8 = 0x87;
/// Reduction constant for 64-bit blocks.
const RB_64: u8 = 0x1b;

/// CMAC over block cipher `C`.
///
/// The optional salt in [`MacMaterial`] is used as the CBC IV and must be
/// exactly one block long; without it the IV is all zeros, which is the
/// RFC 4493 construction.
pub struct Cmac<C> {
    cipher: Option<C>,
    k1: Vec<u8>,
    k2: Vec<u8>,
    iv: Vec<u8>,
    chain: Vec<u8>,
    buffer: Vec<u8>,
    buffered: usize,
    _cipher: PhantomData<fn() -> C>,
}

impl<C: BlockEncrypt + KeyInit> Cmac<C> {
    /// Create an uninitialized engine.
    pub fn new() -> Self {
        let size = <C as BlockSizeUser>::block_size();
        Self {
            cipher: None,
            k1: vec![0; size],
            k2: vec![0; size],
            iv: vec![0; size],
            chain: vec![0; size],
            buffer: vec![0; size],
            buffered: 0,
            _cipher: PhantomData,
        }
    }

    fn cipher(&self) -> Result<&C, CryptoError> {
        self.cipher.as_ref().ok_or(CryptoError::NotInitialized { engine: "CMAC" })
    }

    /// Encrypt one block in place.
    fn encrypt(cipher: &C, block: &mut [u8]) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }

    /// Fold the full buffer into the CBC chain.
    fn absorb_buffer(&mut self) -> Result<(), CryptoError> {
        for (c, b) in self.chain.iter_mut().zip(&self.buffer) {
            *c ^= b;
        }
        let Some(cipher) = self.cipher.as_ref() else {
            return Err(CryptoError::NotInitialized { engine: "CMAC" });
        };
        Self::encrypt(cipher, &mut self.chain);
        self.buffered = 0;
        Ok(())
    }
}

impl<C: BlockEncrypt + KeyInit> Default for Cmac<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Multiply by x in GF(2^n): shift left one bit, reduce on carry.
fn double(input: &[u8], rb: u8) -> Vec<u8> {
    let mut out = vec![0u8; input.len()];
    let mut carry = 0u8;
    for i in (0..input.len()).rev() {
        out[i] = (input[i] << 1) | carry;
        carry = input[i] >> 7;
    }
    if carry == 1 {
        out[input.len() - 1] ^= rb;
    }
    out
}

impl<C: BlockEncrypt + KeyInit> MacEngine for Cmac<C> {
    fn name(&self) -> &'static str {
        "CMAC"
    }

    fn mac_size(&self) -> usize {
        <C as BlockSizeUser>::block_size()
    }

    fn block_size(&self) -> usize {
        <C as BlockSizeUser>::block_size()
    }

    fn is_initialized(&self) -> bool {
        self.cipher.is_some()
    }

    fn initialize(&mut self, material: &MacMaterial) -> Result<(), CryptoError> {
        let size = <C as BlockSizeUser>::block_size();
        let rb = match size {
            16 => RB_128,
            8 => RB_64,
            other => {
                return Err(CryptoError::invalid(format!(
                    "CMAC needs a 64 or 128-bit block cipher, got {} bits",
                    other * 8
                )));
            },
        };

        let iv = match material.salt() {
            None => vec![0u8; size],
            Some(salt) if salt.len() == size => salt.to_vec(),
            Some(salt) => {
                return Err(CryptoError::invalid(format!(
                    "CMAC IV must be {size} bytes, got {}",
                    salt.len()
                )));
            },
        };

        let cipher = C::new_from_slice(material.key()).map_err(|_| {
            CryptoError::invalid(format!("invalid CMAC key length: {}", material.key().len()))
        })?;

        let mut l = vec![0u8; size];
        Self::encrypt(&cipher, &mut l);
        self.k1.zeroize();
        self.k2.zeroize();
        self.k1 = double(&l, rb);
        self.k2 = double(&self.k1, rb);
        l.zeroize();

        self.iv.zeroize();
        self.iv = iv;
        self.cipher = Some(cipher);
        self.reset();
        Ok(())
    }

    fn update(&mut self, mut input: &[u8]) -> Result<(), CryptoError> {
        self.cipher()?;
        let size = self.buffer.len();
        while !input.is_empty() {
            // The final block is held back until finalize
            if self.buffered == size {
                self.absorb_buffer()?;
            }
            let take = (size - self.buffered).min(input.len());
            self.buffer[self.buffered..self.buffered + take].copy_from_slice(&input[..take]);
            self.buffered += take;
            input = &input[take..];
        }
        Ok(())
    }

    fn finalize_into(&mut self, output: &mut [u8]) -> Result<usize, CryptoError> {
        self.cipher()?;
        let size = self.buffer.len();
        check_output(output, size)?;

        let subkey = if self.buffered == size {
            &self.k1
        } else {
            self.buffer[self.buffered] = 0x80;
            self.buffer[self.buffered + 1..].fill(0);
            &self.k2
        };
        for (b, k) in self.buffer.iter_mut().zip(subkey) {
            *b ^= k;
        }
        self.absorb_buffer()?;

        output[..size].copy_from_slice(&self.chain);
        self.reset();
        Ok(size)
    }

    fn reset(&mut self) {
        self.chain.copy_from_slice(&self.iv);
        self.buffer.zeroize();
        self.buffered = 0;
    }
}

impl<C> Drop for Cmac<C> {
    fn drop(&mut self) {
        self.k1.zeroize();
        self.k2.zeroize();
        self.iv.zeroize();
        self.chain.zeroize();
        self.buffer.zeroize();
    }
}
