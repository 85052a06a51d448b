//! Fuzz target for keying-material decoding
//!
//! Length-prefixed material parsing must reject truncated and oversized
//! length fields without panicking or allocating the claimed size. Any
//! material that does decode must re-encode to the bytes it consumed.

#![no_main]

use cipherkeep_crypto::{MacMaterial, SeedMaterial};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(material) = SeedMaterial::from_bytes(data) {
        if let Ok(encoded) = material.to_bytes() {
            assert_eq!(&encoded[..], &data[..encoded.len()]);
        }
    }

    if let Ok(material) = MacMaterial::from_bytes(data) {
        if let Ok(encoded) = material.to_bytes() {
            assert_eq!(&encoded[..], &data[..encoded.len()]);
        }
    }
});
