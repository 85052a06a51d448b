//! Subcommand implementations. Each writes its result to `out`.

use std::{
    error::Error,
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
};

use cipherkeep_crypto::{
    Cmac, DigestCounterGenerator, Generator, Hmac, KeyGenerator, MacEngine, MacMaterial,
    SalsaByteGenerator, SystemEnv, VmpcMac,
};
use cipherkeep_package::{
    CipherDescription, DigestKind, KeyParams, KeyPolicies, PackageFactory, PackageKey, SubKeyId,
};
use sha2::{Sha256, Sha512};

use crate::{Command, CreateArgs, GeneratorKind, MacKind, PackageArgs};

type CliResult = Result<(), Box<dyn Error>>;

/// Dispatch one subcommand.
pub fn run(command: Command, out: &mut impl Write) -> CliResult {
    match command {
        Command::Create(args) => create(args, out),
        Command::Info(args) => info(&args, out),
        Command::Next(args) => next(&args, out),
        Command::Extract { package, id } => extract(&package, &id, out),
        Command::Keystream { engine, seed, length, rounds } => {
            keystream(engine, &seed.0, length, rounds, out)
        },
        Command::Mac { engine, key, iv, input } => {
            let message = std::fs::read(&input)?;
            mac(engine, key.0, iv.map(|iv| iv.0), &message, out)
        },
    }
}

fn open_existing(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().read(true).write(true).open(path)
}

fn open_package(args: &PackageArgs) -> Result<PackageFactory<File, SystemEnv>, Box<dyn Error>> {
    let file = open_existing(&args.path)?;
    let caller = args.identity.authority(KeyPolicies::NONE);
    Ok(PackageFactory::new(file, caller, SystemEnv::new())?)
}

fn create(args: CreateArgs, out: &mut impl Write) -> CliResult {
    let env = SystemEnv::new();
    let policy = args.policies.iter().fold(KeyPolicies::NONE, |acc, &flag| acc | flag);
    let mut owner = args.package.identity.authority(policy);
    if let Some(expires) = args.expires {
        owner = owner.with_option_flag(expires);
    }

    let mut description =
        CipherDescription::new(args.engine.into(), args.key_size, args.iv_size);
    if args.mac_size > 0 {
        description = description.with_mac(DigestKind::Sha256, args.mac_size);
    }

    let package = PackageKey::new(owner, description, args.count, &env)?;
    let keygen: KeyGenerator<SystemEnv> = KeyGenerator::new(env)?;
    let file = OpenOptions::new().read(true).write(true).create_new(true).open(&args.package.path)?;
    let mut factory = PackageFactory::new(file, owner, env)?;
    factory.create(package, &keygen)?;

    writeln!(
        out,
        "created {} with {} subkeys, policy {policy}",
        args.package.path.display(),
        args.count
    )?;
    Ok(())
}

fn info(args: &PackageArgs, out: &mut impl Write) -> CliResult {
    let factory = open_package(args)?;
    writeln!(out, "scope:     {}", factory.access_scope())?;
    if factory.is_expired() {
        writeln!(out, "expired:   yes")?;
    }
    if !factory.access_scope().can_read() {
        return Ok(());
    }

    let package = factory.package()?;
    writeln!(out, "policy:    {}", package.key_policy())?;
    writeln!(out, "cipher:    {:?}", package.description())?;
    writeln!(out, "subkeys:   {}", package.sub_key_count())?;
    writeln!(out, "remaining: {}", factory.keys_remaining()?)?;
    for (id, word) in package.sub_key_ids().iter().zip(package.sub_key_policies()) {
        let state = if word.is_erased() {
            "erased"
        } else if word.is_locked() {
            "locked"
        } else if word.is_expired() {
            "issued"
        } else {
            "available"
        };
        writeln!(out, "  {id}  {state}")?;
    }
    Ok(())
}

fn next(args: &PackageArgs, out: &mut impl Write) -> CliResult {
    let mut factory = open_package(args)?;
    let (id, _, params) = factory.next_key()?;
    write_params(out, &id, &params)
}

fn extract(args: &PackageArgs, id: &SubKeyId, out: &mut impl Write) -> CliResult {
    let mut factory = open_package(args)?;
    let (_, params) = factory.extract(id)?;
    write_params(out, id, &params)
}

fn write_params(out: &mut impl Write, id: &SubKeyId, params: &KeyParams) -> CliResult {
    writeln!(out, "id:  {id}")?;
    writeln!(out, "key: {}", hex::encode(params.key()))?;
    writeln!(out, "iv:  {}", hex::encode(params.iv()))?;
    if !params.ikm().is_empty() {
        writeln!(out, "mac: {}", hex::encode(params.ikm()))?;
    }
    writeln!(out, "ext: {}", hex::encode(params.ext_key()))?;
    Ok(())
}

fn keystream(
    engine: GeneratorKind,
    seed: &[u8],
    length: usize,
    rounds: usize,
    out: &mut impl Write,
) -> CliResult {
    let mut generator: Box<dyn Generator> = match engine {
        GeneratorKind::Dgc => Box::new(DigestCounterGenerator::<Sha512>::new()),
        GeneratorKind::Sbg => Box::new(SalsaByteGenerator::new(rounds)?),
    };
    generator.initialize(seed)?;
    let mut output = vec![0u8; length];
    generator.generate(&mut output)?;
    tracing::debug!(engine = generator.name(), length, "generated keystream");
    writeln!(out, "{}", hex::encode(output))?;
    Ok(())
}

fn mac(
    engine: MacKind,
    key: Vec<u8>,
    iv: Option<Vec<u8>>,
    message: &[u8],
    out: &mut impl Write,
) -> CliResult {
    let mut material = MacMaterial::new(key)?;
    if let Some(iv) = iv {
        material = material.with_salt(iv);
    }

    let mut engine: Box<dyn MacEngine> = match engine {
        MacKind::Hmac => Box::new(Hmac::<Sha256>::new()),
        MacKind::Cmac => match material.key().len() {
            16 => Box::new(Cmac::<aes::Aes128>::new()),
            24 => Box::new(Cmac::<aes::Aes192>::new()),
            32 => Box::new(Cmac::<aes::Aes256>::new()),
            other => return Err(format!("CMAC key must be 16, 24 or 32 bytes, got {other}").into()),
        },
        MacKind::Vmac => Box::new(VmpcMac::new()),
    };
    engine.initialize(&material)?;
    let tag = engine.compute_mac(message)?;
    writeln!(out, "{}", hex::encode(tag))?;
    Ok(())
}
