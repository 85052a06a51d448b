//! Fuzz target for stored package parsing
//!
//! Feeds arbitrary bytes to every stream parser and to `PackageFactory`
//! opening an arbitrary stream, looking for:
//! - Panics on truncated or oversized subkey tables
//! - Integer overflows in slot geometry
//! - Out-of-range slices when a header claims more slots than exist
//!
//! Every invalid input must come back as an error or as `NoAccess`.

#![no_main]

use std::io::Cursor;

use cipherkeep_crypto::SystemEnv;
use cipherkeep_package::{
    KeyAuthority, KeyFactory, KeyPolicies, PackageFactory, PackageKey, VolumeFactory, VolumeKey,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = PackageKey::decode(data);
    let _ = VolumeKey::decode(data);
    let _ = KeyFactory::new(Cursor::new(data.to_vec())).extract();
    let _ = VolumeFactory::new(Cursor::new(data.to_vec()));

    // Opening must never panic, whatever the policy prefix claims
    let caller = KeyAuthority::new([0; 16], [0; 16], [0; 16], [0; 16], KeyPolicies::NONE);
    if let Ok(factory) = PackageFactory::new(Cursor::new(data.to_vec()), caller, SystemEnv::new()) {
        let _ = factory.keys_remaining();
    }
});
