//! Cipherkeep Cryptographic Primitives
//!
//! Low-level building blocks for the Cipherkeep key-package manager:
//! deterministic keystream generators, message authentication codes and the
//! keying-material containers that initialize both.
//!
//! # Data Flow
//!
//! ```text
//! Environment entropy
//!        │
//!        ▼
//! SeedMaterial / MacMaterial
//!        │
//!        ├──────────────────────────┐
//!        ▼                          ▼
//! Generator (DGC / SBG)       MacEngine (CMAC / HMAC / VMPC-MAC)
//!        │                          │
//!        ▼                          ▼
//! Keystream bytes             Authentication tag
//! ```
//!
//! [`KeyGenerator`] ties an [`Environment`] to the digest counter generator
//! and is what the package layer draws subkey material from.
//!
//! # Security
//!
//! - Generator, MAC and material state is zeroized on drop
//! - Material `Debug` output never includes key bytes
//! - Entropy is injected through [`Environment`], so tests run fully
//!   deterministic while production reads the OS RNG

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod drbg;
pub mod env;
pub mod error;
pub mod mac;
pub mod material;

pub use drbg::{
    DigestCounterGenerator, Generator, KeyGenerator, ReKeyKind, SalsaByteGenerator, SalsaConfig,
};
pub use env::{Environment, SystemEnv};
pub use error::CryptoError;
pub use mac::{Cmac, Hmac, MacEngine, VmpcMac};
pub use material::{MacMaterial, SeedMaterial};
