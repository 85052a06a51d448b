//! Policy bit flags.
//!
//! Package policy is a 64-bit word of independent flags. Each subkey carries
//! its own word: the package flags it was created with in the low bits and
//! lifecycle state (`LOCKED`, `EXPIRED`, `ERASED`) in the high bits. Bit
//! positions are part of the stored format and must not move.

use std::{
    fmt,
    ops::{BitOr, BitOrAssign},
};

/// `true` if every bit of `bit` is set in `flags`.
pub const fn has_policy(flags: u64, bit: u64) -> bool {
    flags & bit == bit
}

/// Package-level policy flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KeyPolicies(u64);

impl KeyPolicies {
    /// No restrictions.
    pub const NONE: Self = Self(0);
    /// Matching domain, package and target ids grant creator access
    pub const MASTER_AUTH: Self = Self(1);
    /// Caller target id must match
    pub const IDENTITY_RESTRICT: Self = Self(1 << 1);
    /// Caller domain id must match
    pub const DOMAIN_RESTRICT: Self = Self(1 << 2);
    /// Package id must match; the stream is encrypted at rest
    pub const PACKAGE_AUTH: Self = Self(1 << 3);
    /// Caller origin id must match
    pub const NO_EXPORT: Self = Self(1 << 4);
    /// A subkey can be extracted once, then it is locked
    pub const SINGLE_USE: Self = Self(1 << 5);
    /// A subkey is securely erased after extraction
    pub const POST_OVERWRITE: Self = Self(1 << 6);
    /// The package expires at the authority's option flag (unix seconds)
    pub const VOLATILE: Self = Self(1 << 7);
    /// Keys belong to a volume rather than a message stream
    pub const VOLUME_KEY: Self = Self(1 << 8);
    /// Messages carry no narrative metadata
    pub const NO_NARRATIVE: Self = Self(1 << 9);

    const KNOWN: u64 = (1 << 10) - 1;

    const NAMED: [(Self, &'static str); 10] = [
        (Self::MASTER_AUTH, "MasterAuth"),
        (Self::IDENTITY_RESTRICT, "IdentityRestrict"),
        (Self::DOMAIN_RESTRICT, "DomainRestrict"),
        (Self::PACKAGE_AUTH, "PackageAuth"),
        (Self::NO_EXPORT, "NoExport"),
        (Self::SINGLE_USE, "SingleUse"),
        (Self::POST_OVERWRITE, "PostOverwrite"),
        (Self::VOLATILE, "Volatile"),
        (Self::VOLUME_KEY, "VolumeKey"),
        (Self::NO_NARRATIVE, "NoNarrative"),
    ];

    /// Wrap raw bits. Unknown bits are kept.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw bits.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// `true` if every flag in `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        has_policy(self.0, other.0)
    }

    /// Set the flags in `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the flags in `other`.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Whether only defined flags are set.
    pub const fn is_known(self) -> bool {
        self.0 & !Self::KNOWN == 0
    }

    /// Whether no flag is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Look up a flag by its display name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMED
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|&(flag, _)| flag)
    }
}

impl BitOr for KeyPolicies {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for KeyPolicies {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for KeyPolicies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> =
            Self::NAMED.iter().filter(|(flag, _)| self.contains(*flag)).map(|&(_, n)| n).collect();
        if names.is_empty() { f.write_str("None") } else { f.write_str(&names.join("|")) }
    }
}

/// Per-subkey policy word: package flags plus lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SubKeyPolicy(u64);

impl SubKeyPolicy {
    /// Consumed under `SINGLE_USE`
    pub const LOCKED: u64 = 1 << 60;
    /// Issued by `next_key`
    pub const EXPIRED: u64 = 1 << 61;
    /// Material overwritten under `POST_OVERWRITE`
    pub const ERASED: u64 = 1 << 62;

    const STATE_MASK: u64 = Self::LOCKED | Self::EXPIRED | Self::ERASED;

    /// Fresh subkey carrying the package flags.
    pub const fn new(policies: KeyPolicies) -> Self {
        Self(policies.bits() & !Self::STATE_MASK)
    }

    /// Wrap a stored word.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// The stored word.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Package flags without state bits.
    pub const fn policies(self) -> KeyPolicies {
        KeyPolicies(self.0 & !Self::STATE_MASK)
    }

    /// Whether `state` (one of the state constants) is set.
    pub const fn has_state(self, state: u64) -> bool {
        has_policy(self.0, state)
    }

    /// Shorthand for `has_state(LOCKED)`.
    pub const fn is_locked(self) -> bool {
        self.has_state(Self::LOCKED)
    }

    /// Shorthand for `has_state(EXPIRED)`.
    pub const fn is_expired(self) -> bool {
        self.has_state(Self::EXPIRED)
    }

    /// Shorthand for `has_state(ERASED)`.
    pub const fn is_erased(self) -> bool {
        self.has_state(Self::ERASED)
    }

    /// Whether no state bit is set, so the subkey can still be issued.
    pub const fn is_available(self) -> bool {
        self.0 & Self::STATE_MASK == 0
    }

    /// Set a state bit.
    pub fn set_state(&mut self, state: u64) {
        self.0 |= state & Self::STATE_MASK;
    }

    /// Clear every state bit except `ERASED`.
    pub fn clear_state(&mut self) {
        self.0 &= !(Self::LOCKED | Self::EXPIRED);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_positions_are_stable() {
        assert_eq!(KeyPolicies::MASTER_AUTH.bits(), 1);
        assert_eq!(KeyPolicies::PACKAGE_AUTH.bits(), 8);
        assert_eq!(KeyPolicies::VOLATILE.bits(), 128);
        assert_eq!(KeyPolicies::NO_NARRATIVE.bits(), 512);
    }

    #[test]
    fn has_policy_requires_all_bits() {
        let flags = (KeyPolicies::SINGLE_USE | KeyPolicies::NO_EXPORT).bits();
        assert!(has_policy(flags, KeyPolicies::SINGLE_USE.bits()));
        assert!(!has_policy(flags, (KeyPolicies::SINGLE_USE | KeyPolicies::VOLATILE).bits()));
    }

    #[test]
    fn display_and_name_lookup() {
        let flags = KeyPolicies::PACKAGE_AUTH | KeyPolicies::SINGLE_USE;
        assert_eq!(flags.to_string(), "PackageAuth|SingleUse");
        assert_eq!(KeyPolicies::NONE.to_string(), "None");
        assert_eq!(KeyPolicies::from_name("postoverwrite"), Some(KeyPolicies::POST_OVERWRITE));
        assert_eq!(KeyPolicies::from_name("bogus"), None);
    }

    #[test]
    fn subkey_state_is_separate_from_policy() {
        let mut word = SubKeyPolicy::new(KeyPolicies::SINGLE_USE);
        word.set_state(SubKeyPolicy::LOCKED);
        assert!(word.is_locked());
        assert!(!word.is_expired());
        assert_eq!(word.policies(), KeyPolicies::SINGLE_USE);
    }

    #[test]
    fn clear_state_keeps_erased() {
        let mut word = SubKeyPolicy::new(KeyPolicies::NONE);
        word.set_state(SubKeyPolicy::EXPIRED);
        word.set_state(SubKeyPolicy::ERASED);
        word.clear_state();
        assert!(!word.is_expired());
        assert!(word.is_erased());
    }
}
