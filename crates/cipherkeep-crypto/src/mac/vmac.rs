//! VMPC-MAC
//!
//! MAC built on the VMPC one-way function. State is a 256-byte permutation
//! `p`, four running accumulators and a 32-byte scramble table `t`; every
//! input byte advances the VMPC stream and folds one keystream-masked byte
//! into four lanes of `t`. Finalizing runs three post-processing phases and
//! reads a fixed 20-byte tag out of the permutation.

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::{MacEngine, check_output};
use crate::{error::CryptoError, material::MacMaterial};

/// Tag length in bytes. Not configurable.
pub const VMPC_TAG_SIZE: usize = 20;

/// Longest accepted IV.
const MAX_IV_SIZE: usize = 768;
/// Key scheduling passes per key and per IV.
const KSA_ROUNDS: usize = 768;
/// Diffusion rounds at the start of finalization.
const POST_ROUNDS: u8 = 24;

/// Complete engine state. Owned by one [`VmpcMac`]; never shared.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct VmpcState {
    p: [u8; 256],
    t: [u8; 32],
    s: u8,
    n: u8,
    g: u8,
    x1: u8,
    x2: u8,
    x3: u8,
    x4: u8,
}

impl VmpcState {
    /// Identity permutation scheduled by key then IV.
    fn keyed(key: &[u8], iv: &[u8]) -> Self {
        let mut state = Self { p: [0; 256], t: [0; 32], s: 0, n: 0, g: 0, x1: 0, x2: 0, x3: 0, x4: 0 };
        for (i, slot) in state.p.iter_mut().enumerate() {
            *slot = i as u8;
        }
        state.schedule(|m| key[m % key.len()]);
        state.schedule(|m| iv[m % iv.len()]);
        state
    }

    fn swap(&mut self, m: u8) {
        self.p.swap(m as usize, self.s as usize);
    }

    /// One 768-round KSA pass keyed by `byte_at(m)`.
    fn schedule(&mut self, byte_at: impl Fn(usize) -> u8) {
        for m in 0..KSA_ROUNDS {
            let idx = m as u8;
            let sum = self.s.wrapping_add(self.p[idx as usize]).wrapping_add(byte_at(m));
            self.s = self.p[sum as usize];
            self.swap(idx);
        }
    }

    /// VMPC output byte for the current `s`.
    fn keystream(&self) -> u8 {
        let inner = self.p[self.p[self.s as usize] as usize];
        self.p[inner.wrapping_add(1) as usize]
    }

    fn scramble(&mut self) {
        let g = self.g as usize;
        self.t[g & 0x1f] ^= self.x1;
        self.t[(g + 1) & 0x1f] ^= self.x2;
        self.t[(g + 2) & 0x1f] ^= self.x3;
        self.t[(g + 3) & 0x1f] ^= self.x4;
        self.g = self.g.wrapping_add(4) & 0x1f;
    }

    fn absorb(&mut self, byte: u8) {
        self.s = self.p[self.s.wrapping_add(self.p[self.n as usize]) as usize];
        let c = byte ^ self.keystream();

        self.x4 = self.p[self.x4.wrapping_add(self.x3) as usize];
        self.x3 = self.p[self.x3.wrapping_add(self.x2) as usize];
        self.x2 = self.p[self.x2.wrapping_add(self.x1) as usize];
        self.x1 = self.p[self.x1.wrapping_add(self.s).wrapping_add(c) as usize];
        self.scramble();

        self.swap(self.n);
        self.n = self.n.wrapping_add(1);
    }

    fn tag(&mut self, out: &mut [u8]) {
        for r in 1..=POST_ROUNDS {
            self.s = self.p[self.s.wrapping_add(self.p[self.n as usize]) as usize];
            self.x4 = self.p[self.x4.wrapping_add(self.x3).wrapping_add(r) as usize];
            self.x3 = self.p[self.x3.wrapping_add(self.x2).wrapping_add(r) as usize];
            self.x2 = self.p[self.x2.wrapping_add(self.x1).wrapping_add(r) as usize];
            self.x1 = self.p[self.x1.wrapping_add(self.s).wrapping_add(r) as usize];
            self.scramble();

            self.swap(self.n);
            self.n = self.n.wrapping_add(1);
        }

        let t = self.t;
        self.schedule(|m| t[m & 0x1f]);

        for (i, byte) in out.iter_mut().enumerate().take(VMPC_TAG_SIZE) {
            let idx = i as u8;
            self.s = self.p[self.s.wrapping_add(self.p[idx as usize]) as usize];
            *byte = self.keystream();
            self.swap(idx);
        }
    }
}

/// VMPC-MAC engine.
///
/// Requires an IV of 1 to 768 bytes, supplied as the material salt.
#[derive(Default)]
pub struct VmpcMac {
    key: Zeroizing<Vec<u8>>,
    iv: Zeroizing<Vec<u8>>,
    state: Option<VmpcState>,
}

impl VmpcMac {
    /// Create an uninitialized engine.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&mut self) -> Result<&mut VmpcState, CryptoError> {
        self.state.as_mut().ok_or(CryptoError::NotInitialized { engine: "VMPC-MAC" })
    }
}

impl MacEngine for VmpcMac {
    fn name(&self) -> &'static str {
        "VMPC-MAC"
    }

    fn mac_size(&self) -> usize {
        VMPC_TAG_SIZE
    }

    fn block_size(&self) -> usize {
        1
    }

    fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    fn initialize(&mut self, material: &MacMaterial) -> Result<(), CryptoError> {
        let iv = material
            .salt()
            .ok_or_else(|| CryptoError::invalid("VMPC-MAC requires an IV"))?;
        if iv.len() > MAX_IV_SIZE {
            return Err(CryptoError::invalid(format!(
                "VMPC-MAC IV must be 1 to {MAX_IV_SIZE} bytes, got {}",
                iv.len()
            )));
        }

        self.key = Zeroizing::new(material.key().to_vec());
        self.iv = Zeroizing::new(iv.to_vec());
        self.state = Some(VmpcState::keyed(&self.key, &self.iv));
        Ok(())
    }

    fn update(&mut self, input: &[u8]) -> Result<(), CryptoError> {
        let state = self.state()?;
        for &byte in input {
            state.absorb(byte);
        }
        Ok(())
    }

    fn finalize_into(&mut self, output: &mut [u8]) -> Result<usize, CryptoError> {
        let state = self.state()?;
        check_output(output, VMPC_TAG_SIZE)?;
        state.tag(&mut output[..VMPC_TAG_SIZE]);
        self.reset();
        Ok(VMPC_TAG_SIZE)
    }

    fn reset(&mut self) {
        if self.state.is_some() {
            self.state = Some(VmpcState::keyed(&self.key, &self.iv));
        }
    }
}
