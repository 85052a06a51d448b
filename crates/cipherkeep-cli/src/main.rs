//! Cipherkeep command-line tool.
//!
//! # Usage
//!
//! ```bash
//! # Create a package of 8 AES-256 keys, encrypted at rest
//! cipherkeep create keys.pkg --count 8 --policy package-auth --package-id 00112233445566778899aabbccddeeff
//!
//! # Inspect and issue keys
//! cipherkeep info keys.pkg --package-id 00112233445566778899aabbccddeeff
//! cipherkeep next keys.pkg --package-id 00112233445566778899aabbccddeeff
//!
//! # Primitives
//! cipherkeep keystream --engine sbg --seed <40 bytes hex> --length 128
//! cipherkeep mac --engine hmac --key 0b0b0b0b --input message.bin
//! ```
//!
//! Results go to stdout; diagnostics go to stderr through `tracing`.

use std::{
    io::{self, Write},
    path::PathBuf,
    str::FromStr,
};

use cipherkeep_crypto::drbg::DEFAULT_ROUNDS;
use cipherkeep_package::{KeyAuthority, KeyPolicies, SubKeyId, SymmetricEngine};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// Cipherkeep key package manager
#[derive(Parser, Debug)]
#[command(name = "cipherkeep")]
#[command(about = "Policy-driven symmetric key packages")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a new key package file
    Create(CreateArgs),
    /// Print the header, access scope and remaining keys of a package
    Info(PackageArgs),
    /// Issue the next unissued subkey
    Next(PackageArgs),
    /// Extract a subkey by id
    Extract {
        #[command(flatten)]
        package: PackageArgs,
        /// Subkey id (32 hex digits)
        #[arg(long)]
        id: SubKeyId,
    },
    /// Print generator keystream as hex
    Keystream {
        /// Generator engine
        #[arg(long, value_enum)]
        engine: GeneratorKind,
        /// Seed bytes as hex
        #[arg(long)]
        seed: HexBytes,
        /// Number of bytes to generate
        #[arg(long, default_value = "64")]
        length: usize,
        /// Salsa round count
        #[arg(long, default_value_t = DEFAULT_ROUNDS)]
        rounds: usize,
    },
    /// Print the MAC of a file as hex
    Mac {
        /// MAC engine
        #[arg(long, value_enum)]
        engine: MacKind,
        /// Key as hex
        #[arg(long)]
        key: HexBytes,
        /// IV or salt as hex
        #[arg(long)]
        iv: Option<HexBytes>,
        /// File to authenticate
        #[arg(long)]
        input: PathBuf,
    },
}

/// Package file and caller identity.
#[derive(ClapArgs, Debug, Clone)]
struct PackageArgs {
    /// Package file
    path: PathBuf,

    #[command(flatten)]
    identity: Identity,
}

/// Caller identity; every id is 16 bytes of hex, zero by default.
#[derive(ClapArgs, Debug, Clone, Copy)]
struct Identity {
    /// Domain id
    #[arg(long, value_parser = parse_id, default_value = ZERO_ID)]
    domain: [u8; 16],
    /// Origin (creator) id
    #[arg(long, value_parser = parse_id, default_value = ZERO_ID)]
    origin: [u8; 16],
    /// Package id
    #[arg(long, value_parser = parse_id, default_value = ZERO_ID)]
    package_id: [u8; 16],
    /// Target (recipient) id
    #[arg(long, value_parser = parse_id, default_value = ZERO_ID)]
    target: [u8; 16],
}

impl Identity {
    fn authority(self, policy: KeyPolicies) -> KeyAuthority {
        KeyAuthority::new(self.domain, self.origin, self.package_id, self.target, policy)
    }
}

#[derive(ClapArgs, Debug, Clone)]
struct CreateArgs {
    #[command(flatten)]
    package: PackageArgs,
    /// Number of subkeys
    #[arg(long, default_value = "1")]
    count: usize,
    /// Policy flag, repeatable (e.g. package-auth, single-use)
    #[arg(long = "policy", value_parser = parse_policy)]
    policies: Vec<KeyPolicies>,
    /// Expiry in unix seconds for volatile packages
    #[arg(long)]
    expires: Option<u64>,
    /// Cipher engine the keys are for
    #[arg(long, value_enum, default_value = "rhx")]
    engine: EngineKind,
    /// Key size in bytes
    #[arg(long, default_value = "32")]
    key_size: u16,
    /// IV size in bytes
    #[arg(long, default_value = "16")]
    iv_size: u8,
    /// MAC key size in bytes; 0 for none
    #[arg(long, default_value = "0")]
    mac_size: u16,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum GeneratorKind {
    /// Digest counter generator (SHA-512)
    Dgc,
    /// Salsa20 byte generator
    Sbg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum MacKind {
    /// HMAC-SHA256
    Hmac,
    /// AES-CMAC; key size picks AES-128, -192 or -256
    Cmac,
    /// VMPC-MAC; requires --iv
    Vmac,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum EngineKind {
    Rhx,
    Shx,
    Thx,
    Chacha,
    Salsa,
}

impl From<EngineKind> for SymmetricEngine {
    fn from(kind: EngineKind) -> Self {
        match kind {
            EngineKind::Rhx => Self::Rhx,
            EngineKind::Shx => Self::Shx,
            EngineKind::Thx => Self::Thx,
            EngineKind::Chacha => Self::ChaCha,
            EngineKind::Salsa => Self::Salsa,
        }
    }
}

/// Byte string given on the command line as hex.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HexBytes(Vec<u8>);

impl FromStr for HexBytes {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex(s).map(Self)
    }
}

const ZERO_ID: &str = "00000000000000000000000000000000";

fn parse_hex(value: &str) -> Result<Vec<u8>, String> {
    hex::decode(value).map_err(|e| format!("invalid hex: {e}"))
}

fn parse_id(value: &str) -> Result<[u8; 16], String> {
    parse_hex(value)?.try_into().map_err(|_| "id must be exactly 16 bytes".to_string())
}

fn parse_policy(value: &str) -> Result<KeyPolicies, String> {
    let name: String = value.split(['-', '_']).collect();
    KeyPolicies::from_name(&name).ok_or_else(|| format!("unknown policy flag '{value}'"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    commands::run(args.command, &mut out)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn policy_names_accept_kebab_case() {
        assert_eq!(parse_policy("package-auth").unwrap(), KeyPolicies::PACKAGE_AUTH);
        assert_eq!(parse_policy("SingleUse").unwrap(), KeyPolicies::SINGLE_USE);
        assert_eq!(parse_policy("post_overwrite").unwrap(), KeyPolicies::POST_OVERWRITE);
        assert!(parse_policy("everything").is_err());
    }

    #[test]
    fn ids_must_be_sixteen_bytes() {
        assert_eq!(parse_id(ZERO_ID).unwrap(), [0; 16]);
        assert!(parse_id("abcd").is_err());
        assert!(parse_id("zz").is_err());
    }

    #[test]
    fn extract_parses_subkey_id() {
        let id = "0f".repeat(16);
        let args = Args::try_parse_from(["cipherkeep", "extract", "keys.pkg", "--id", &id]).unwrap();
        match args.command {
            Command::Extract { id: parsed, .. } => assert_eq!(parsed.to_string(), id),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn keystream_rounds_default_to_twenty() {
        let args =
            Args::try_parse_from(["cipherkeep", "keystream", "--engine", "sbg", "--seed", "00"]).unwrap();
        match args.command {
            Command::Keystream { rounds, .. } => assert_eq!(rounds, DEFAULT_ROUNDS),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
