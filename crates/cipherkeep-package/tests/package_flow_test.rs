//! End-to-end key package flows against file-backed streams.
//!
//! Each test writes a package to a temporary file, drops the factory and
//! reopens the file, simulating separate processes sharing one package.

use std::{
    collections::HashSet,
    fs::{File, OpenOptions},
    path::Path,
};

use cipherkeep_crypto::{KeyGenerator, SystemEnv};
use cipherkeep_package::{
    CipherDescription, DigestKind, ErrorKind, KeyAuthority, KeyPolicies, KeyScope, PackageError,
    PackageFactory, PackageKey, SymmetricEngine,
};
use tempfile::tempdir;

fn owner(policy: KeyPolicies) -> KeyAuthority {
    KeyAuthority::new([0x10; 16], [0x20; 16], [0x30; 16], [0x40; 16], policy)
}

fn open(path: &Path) -> File {
    OpenOptions::new().read(true).write(true).create(true).truncate(false).open(path).unwrap()
}

fn create_package(path: &Path, authority: KeyAuthority, description: CipherDescription, count: usize) {
    let env = SystemEnv::new();
    let package = PackageKey::new(authority, description, count, &env).unwrap();
    let keygen: KeyGenerator<SystemEnv> = KeyGenerator::new(env).unwrap();
    let mut factory = PackageFactory::new(open(path), authority, env).unwrap();
    factory.create(package, &keygen).unwrap();
}

#[test]
fn three_subkeys_issue_then_exhaust() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("keys.pkg");
    let description = CipherDescription::new(SymmetricEngine::Rhx, 32, 16);
    create_package(&path, owner(KeyPolicies::NONE), description, 3);

    // Issue every key, then simulate a restart
    {
        let mut factory =
            PackageFactory::new(open(&path), owner(KeyPolicies::NONE), SystemEnv::new()).unwrap();
        assert_eq!(factory.keys_remaining().unwrap(), 3);

        let mut ids = HashSet::new();
        for _ in 0..3 {
            let (id, issued, params) = factory.next_key().unwrap();
            assert!(ids.insert(id), "subkey issued twice");
            assert_eq!(issued, description);
            assert_eq!(params.key().len(), 32);
            assert_eq!(params.iv().len(), 16);
        }

        let err = factory.next_key().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Exhaustion);
    }

    {
        let factory =
            PackageFactory::new(open(&path), owner(KeyPolicies::NONE), SystemEnv::new()).unwrap();
        assert_eq!(factory.keys_remaining().unwrap(), 0);
    }
}

#[test]
fn encrypted_package_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sealed.pkg");
    let policy = KeyPolicies::PACKAGE_AUTH | KeyPolicies::IDENTITY_RESTRICT;
    let description =
        CipherDescription::new(SymmetricEngine::Shx, 64, 16).with_mac(DigestKind::Sha512, 64);
    create_package(&path, owner(policy), description, 2);

    let raw = std::fs::read(&path).unwrap();
    assert_eq!(&raw[..8], &policy.bits().to_le_bytes());

    let mut factory =
        PackageFactory::new(open(&path), owner(KeyPolicies::NONE), SystemEnv::new()).unwrap();
    assert_eq!(factory.access_scope(), KeyScope::Creator);
    let (_, _, params) = factory.next_key().unwrap();
    assert_eq!(params.ikm().len(), 64);

    // Wrong target: the derived at-rest key differs and nothing decodes
    let stranger = KeyAuthority::new([0x10; 16], [0x20; 16], [0x30; 16], [0x41; 16], KeyPolicies::NONE);
    let denied = PackageFactory::new(open(&path), stranger, SystemEnv::new()).unwrap();
    assert_eq!(denied.access_scope(), KeyScope::NoAccess);
    assert_eq!(denied.keys_remaining().unwrap_err().kind(), ErrorKind::Authorization);
}

#[test]
fn single_use_lock_persists_across_processes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("single.pkg");
    let description = CipherDescription::new(SymmetricEngine::Rhx, 32, 16);
    create_package(&path, owner(KeyPolicies::SINGLE_USE), description, 1);

    let id = {
        let mut factory =
            PackageFactory::new(open(&path), owner(KeyPolicies::NONE), SystemEnv::new()).unwrap();
        let id = factory.package().unwrap().sub_key_ids()[0];
        factory.extract(&id).unwrap();
        id
    };

    let mut factory =
        PackageFactory::new(open(&path), owner(KeyPolicies::NONE), SystemEnv::new()).unwrap();
    assert_eq!(factory.extract(&id).unwrap_err(), PackageError::SubKeyLocked { id });

    factory.reset_sub_key_flag(&id).unwrap();
    assert!(factory.extract(&id).is_ok());
}

#[test]
fn post_overwrite_leaves_no_material_on_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("burn.pkg");
    let description = CipherDescription::new(SymmetricEngine::Rhx, 32, 16);
    create_package(&path, owner(KeyPolicies::POST_OVERWRITE), description, 2);

    let mut factory =
        PackageFactory::new(open(&path), owner(KeyPolicies::NONE), SystemEnv::new()).unwrap();
    let package = factory.package().unwrap().clone();
    let id = package.sub_key_ids()[1];
    let (_, params) = factory.extract(&id).unwrap();
    drop(factory);

    let raw = std::fs::read(&path).unwrap();
    let slot = &raw[package.slot_offset(1)..package.slot_offset(1) + package.slot_size()];
    assert!(slot.iter().all(|&b| b == 0));
    assert!(!raw.windows(params.key().len()).any(|w| w == params.key()));

    let mut factory =
        PackageFactory::new(open(&path), owner(KeyPolicies::NONE), SystemEnv::new()).unwrap();
    assert_eq!(factory.extract(&id).unwrap_err(), PackageError::SubKeyErased { id });
}
