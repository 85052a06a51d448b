//! Key authority: who created a package and who may open it.

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{error::PackageError, policy::KeyPolicies};

/// Width of every identity field.
pub const ID_SIZE: usize = 16;

/// Identity record compared against a stored package to grant access.
///
/// Fixed 80-byte layout, integers little-endian:
///
/// ```text
/// 0..16   domain_id
/// 16..32  origin_id
/// 32..48  package_id
/// 48..64  target_id
/// 64..72  key_policy
/// 72..80  option_flag
/// ```
///
/// `option_flag` is policy-specific; under [`KeyPolicies::VOLATILE`] it is
/// the expiry time in unix seconds (0 for none).
#[repr(C, packed)]
#[derive(Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct KeyAuthority {
    domain_id: [u8; ID_SIZE],
    origin_id: [u8; ID_SIZE],
    package_id: [u8; ID_SIZE],
    target_id: [u8; ID_SIZE],
    key_policy: [u8; 8],
    option_flag: [u8; 8],
}

impl KeyAuthority {
    /// Serialized size.
    pub const SIZE: usize = 80;

    /// Create an authority with no option flag.
    pub fn new(
        domain_id: [u8; ID_SIZE],
        origin_id: [u8; ID_SIZE],
        package_id: [u8; ID_SIZE],
        target_id: [u8; ID_SIZE],
        key_policy: KeyPolicies,
    ) -> Self {
        Self {
            domain_id,
            origin_id,
            package_id,
            target_id,
            key_policy: key_policy.bits().to_le_bytes(),
            option_flag: [0; 8],
        }
    }

    /// Whether the policy word holds only defined flags.
    pub fn is_valid(&self) -> bool {
        self.key_policy().is_known()
    }

    /// Set the option flag.
    #[must_use]
    pub fn with_option_flag(mut self, option_flag: u64) -> Self {
        self.option_flag = option_flag.to_le_bytes();
        self
    }

    /// Domain the package belongs to.
    pub fn domain_id(&self) -> [u8; ID_SIZE] {
        self.domain_id
    }

    /// Identity of the creator.
    pub fn origin_id(&self) -> [u8; ID_SIZE] {
        self.origin_id
    }

    /// Package identity.
    pub fn package_id(&self) -> [u8; ID_SIZE] {
        self.package_id
    }

    /// Intended recipient.
    pub fn target_id(&self) -> [u8; ID_SIZE] {
        self.target_id
    }

    /// Policy flags.
    pub fn key_policy(&self) -> KeyPolicies {
        KeyPolicies::from_bits(u64::from_le_bytes(self.key_policy))
    }

    /// Replace the policy flags.
    pub fn set_key_policy(&mut self, policy: KeyPolicies) {
        self.key_policy = policy.bits().to_le_bytes();
    }

    /// Policy-specific option value.
    pub fn option_flag(&self) -> u64 {
        u64::from_le_bytes(self.option_flag)
    }

    /// Serialize.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }

    /// Parse the first [`Self::SIZE`] bytes of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PackageError> {
        Self::read_from_prefix(bytes)
            .map(|(authority, _)| authority)
            .map_err(|_| PackageError::corrupt("key authority truncated"))
    }
}

impl fmt::Debug for KeyAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyAuthority")
            .field("domain_id", &hex::encode(self.domain_id()))
            .field("origin_id", &hex::encode(self.origin_id()))
            .field("package_id", &hex::encode(self.package_id()))
            .field("target_id", &hex::encode(self.target_id()))
            .field("key_policy", &self.key_policy())
            .field("option_flag", &self.option_flag())
            .finish()
    }
}
