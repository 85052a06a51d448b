//! Access scope: what a caller may do with a stored package.

use std::fmt;

use crate::{authority::KeyAuthority, package_key::PackageKey, policy::KeyPolicies};

/// Result of authenticating a caller against a stored package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyScope {
    /// Full control: issue keys, reset flags
    Creator,
    /// May extract keys by id
    Operator,
    /// May not read the package
    NoAccess,
}

impl KeyScope {
    /// Creator or operator.
    pub fn can_read(self) -> bool {
        matches!(self, Self::Creator | Self::Operator)
    }
}

impl fmt::Display for KeyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Creator => "creator",
            Self::Operator => "operator",
            Self::NoAccess => "no",
        })
    }
}

/// Outcome of [`authenticate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authentication {
    /// Granted scope
    pub scope: KeyScope,
    /// Volatile package past its expiry
    pub expired: bool,
}

/// Whether a volatile package has passed its expiry at `now` (unix seconds).
pub fn is_expired(package: &PackageKey, now: u64) -> bool {
    let expiry = package.authority().option_flag();
    package.key_policy().contains(KeyPolicies::VOLATILE) && expiry != 0 && now > expiry
}

/// Compare `caller` against the stored package under its policy flags.
///
/// 1. An expired `VOLATILE` package: no access, for every caller.
/// 2. `MASTER_AUTH` with matching domain, package and target ids: creator.
/// 3. Each restrictive flag denies on mismatch of its field:
///    `IDENTITY_RESTRICT` target, `DOMAIN_RESTRICT` domain, `PACKAGE_AUTH`
///    package, `NO_EXPORT` origin.
/// 4. Otherwise creator if the origin matches, else operator.
pub fn authenticate(caller: &KeyAuthority, package: &PackageKey, now: u64) -> Authentication {
    let stored = package.authority();
    let policy = package.key_policy();
    let expired = is_expired(package, now);
    if expired {
        return Authentication { scope: KeyScope::NoAccess, expired };
    }

    let domain = caller.domain_id() == stored.domain_id();
    let origin = caller.origin_id() == stored.origin_id();
    let package_id = caller.package_id() == stored.package_id();
    let target = caller.target_id() == stored.target_id();

    if policy.contains(KeyPolicies::MASTER_AUTH) && domain && package_id && target {
        return Authentication { scope: KeyScope::Creator, expired };
    }

    let denied = (policy.contains(KeyPolicies::IDENTITY_RESTRICT) && !target)
        || (policy.contains(KeyPolicies::DOMAIN_RESTRICT) && !domain)
        || (policy.contains(KeyPolicies::PACKAGE_AUTH) && !package_id)
        || (policy.contains(KeyPolicies::NO_EXPORT) && !origin);

    let scope = if denied {
        KeyScope::NoAccess
    } else if origin {
        KeyScope::Creator
    } else {
        KeyScope::Operator
    };
    Authentication { scope, expired }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cipherkeep_crypto::Environment;

    use super::*;
    use crate::description::{CipherDescription, SymmetricEngine};

    #[derive(Clone)]
    struct FixedEnv(Arc<[u8; 1]>);

    impl Environment for FixedEnv {
        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(self.0[0]);
        }

        fn wall_clock_secs(&self) -> u64 {
            0
        }
    }

    fn stored(policy: KeyPolicies, option_flag: u64) -> PackageKey {
        let authority = KeyAuthority::new([1; 16], [2; 16], [3; 16], [4; 16], policy)
            .with_option_flag(option_flag);
        let description = CipherDescription::new(SymmetricEngine::Rhx, 32, 16);
        PackageKey::new(authority, description, 1, &FixedEnv(Arc::new([5]))).unwrap()
    }

    fn caller(domain: u8, origin: u8, package: u8, target: u8) -> KeyAuthority {
        KeyAuthority::new([domain; 16], [origin; 16], [package; 16], [target; 16], KeyPolicies::NONE)
    }

    #[test]
    fn origin_match_is_creator() {
        let auth = authenticate(&caller(1, 2, 3, 4), &stored(KeyPolicies::NONE, 0), 0);
        assert_eq!(auth.scope, KeyScope::Creator);
        assert!(!auth.expired);
    }

    #[test]
    fn foreign_origin_is_operator() {
        let auth = authenticate(&caller(9, 9, 9, 9), &stored(KeyPolicies::NONE, 0), 0);
        assert_eq!(auth.scope, KeyScope::Operator);
    }

    #[test]
    fn identity_restrict_denies_other_target() {
        let package = stored(KeyPolicies::IDENTITY_RESTRICT, 0);
        assert_eq!(authenticate(&caller(1, 2, 3, 5), &package, 0).scope, KeyScope::NoAccess);
        assert_eq!(authenticate(&caller(1, 9, 3, 4), &package, 0).scope, KeyScope::Operator);
    }

    #[test]
    fn each_restriction_checks_its_field() {
        let cases = [
            (KeyPolicies::DOMAIN_RESTRICT, caller(0, 2, 3, 4)),
            (KeyPolicies::PACKAGE_AUTH, caller(1, 2, 0, 4)),
            (KeyPolicies::NO_EXPORT, caller(1, 0, 3, 4)),
        ];
        for (policy, who) in cases {
            assert_eq!(authenticate(&who, &stored(policy, 0), 0).scope, KeyScope::NoAccess, "{policy}");
        }
    }

    #[test]
    fn master_auth_short_circuits_restrictions() {
        let package = stored(KeyPolicies::MASTER_AUTH | KeyPolicies::NO_EXPORT, 0);
        // origin differs, but domain/package/target match
        assert_eq!(authenticate(&caller(1, 9, 3, 4), &package, 0).scope, KeyScope::Creator);
        assert_eq!(authenticate(&caller(1, 9, 3, 5), &package, 0).scope, KeyScope::NoAccess);
    }

    #[test]
    fn volatile_expiry() {
        let package = stored(KeyPolicies::VOLATILE, 1_000);
        let before = authenticate(&caller(1, 2, 3, 4), &package, 1_000);
        assert_eq!(before.scope, KeyScope::Creator);
        assert!(!before.expired);

        let after = authenticate(&caller(1, 2, 3, 4), &package, 1_001);
        assert_eq!(after.scope, KeyScope::NoAccess);
        assert!(after.expired);
    }

    #[test]
    fn expiry_overrides_master_auth() {
        let package = stored(KeyPolicies::MASTER_AUTH | KeyPolicies::VOLATILE, 1_000);
        assert_eq!(authenticate(&caller(1, 9, 3, 4), &package, 1_000).scope, KeyScope::Creator);

        let after = authenticate(&caller(1, 9, 3, 4), &package, 1_001);
        assert_eq!(after.scope, KeyScope::NoAccess);
        assert!(after.expired);
    }

    #[test]
    fn volatile_without_expiry_never_expires() {
        let package = stored(KeyPolicies::VOLATILE, 0);
        assert!(!authenticate(&caller(1, 2, 3, 4), &package, u64::MAX).expired);
    }
}
