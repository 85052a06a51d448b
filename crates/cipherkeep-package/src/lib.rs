//! Cipherkeep Key Packages
//!
//! Policy-driven storage for symmetric key material. A key package holds a
//! creator identity, a cipher description and a table of subkeys; the
//! policy flags decide who may open it, whether it is encrypted at rest and
//! what happens to a subkey once it has been used.
//!
//! # Architecture
//!
//! ```text
//! caller KeyAuthority ──┐
//!                       ▼
//!   stream ──▶ PackageFactory ──authenticate──▶ KeyScope
//!                 │      ▲
//!        decrypt  │      │  encrypt (PACKAGE_AUTH)
//!                 ▼      │
//!             PackageKey header + subkey slots
//!                 │
//!                 ▼
//!   (CipherDescription, KeyParams) ──▶ external cipher layer
//! ```
//!
//! [`KeyFactory`] and [`VolumeFactory`] are simpler stores built on the same
//! conventions: one key, or one key per file id.
//!
//! # Subkey lifecycle
//!
//! - `next_key` issues the first subkey not yet issued and marks it expired
//! - `SINGLE_USE` subkeys are locked after their first extraction
//! - `POST_OVERWRITE` subkeys are securely erased after extraction
//!
//! Every state change is written back to the stream before the call
//! returns.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod authority;
pub mod description;
pub mod error;
pub mod factory;
pub mod key_factory;
pub mod key_params;
pub mod package_key;
pub mod policy;
pub mod scope;
pub mod transform;
pub mod volume_factory;

pub use authority::{ID_SIZE, KeyAuthority};
pub use description::{CipherDescription, CipherMode, DigestKind, PaddingMode, SymmetricEngine};
pub use error::{ErrorKind, PackageError};
pub use factory::PackageFactory;
pub use key_factory::{CipherKey, KeyFactory};
pub use key_params::{EXT_KEY_SIZE, KeyParams};
pub use package_key::{MAX_SUBKEYS, MIN_SUBKEYS, PackageKey, SubKeyId};
pub use policy::{KeyPolicies, SubKeyPolicy, has_policy};
pub use scope::{Authentication, KeyScope, authenticate};
pub use volume_factory::{TAG_SIZE, VolumeFactory, VolumeKey, VolumeKeyState};
