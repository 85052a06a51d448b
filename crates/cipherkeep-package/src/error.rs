//! Error types for key package operations.
//!
//! Callers usually care about the class of failure rather than the exact
//! variant: "permission denied" is handled differently from "data corrupt"
//! or "no keys left". [`PackageError::kind`] gives that classification.

use std::io;

use cipherkeep_crypto::CryptoError;
use thiserror::Error;

use crate::{package_key::SubKeyId, scope::KeyScope};

/// Broad failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unusable input; fix the call and retry
    Argument,
    /// Engine used before initialization
    NotInitialized,
    /// Corrupt, missing or expired data; retrying will not help
    Processing,
    /// Caller lacks the access scope for the operation
    Authorization,
    /// Every subkey has been issued; provision a new package
    Exhaustion,
}

/// Errors from package, key and volume factories.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PackageError {
    /// Caller supplied an unusable package, id or count
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the input
        reason: String,
    },

    /// Cipher description failed validation
    #[error("invalid cipher description")]
    InvalidDescription,

    /// Key authority failed validation
    #[error("invalid key authority")]
    InvalidAuthority,

    /// Operation needs a wider access scope than the caller holds
    #[error("unauthorized: {operation} requires more than {scope} access")]
    Unauthorized {
        /// Operation that was attempted
        operation: &'static str,
        /// Scope the caller holds
        scope: KeyScope,
    },

    /// Stream holds no package yet
    #[error("stream holds no key package")]
    Empty,

    /// Stored bytes do not describe a consistent package
    #[error("corrupt package: {reason}")]
    Corrupt {
        /// What failed to parse or check
        reason: String,
    },

    /// No subkey with this id
    #[error("subkey {id} not found")]
    SubKeyNotFound {
        /// Requested id
        id: SubKeyId,
    },

    /// Subkey was already consumed under a single-use policy
    #[error("subkey {id} is locked")]
    SubKeyLocked {
        /// Requested id
        id: SubKeyId,
    },

    /// Subkey material was erased after use
    #[error("subkey {id} has been erased")]
    SubKeyErased {
        /// Requested id
        id: SubKeyId,
    },

    /// No volume slot with this file id
    #[error("volume file id {file_id} not found")]
    FileNotFound {
        /// Requested file id
        file_id: u32,
    },

    /// Volume slot is locked
    #[error("volume file {file_id} is locked")]
    FileLocked {
        /// Requested file id
        file_id: u32,
    },

    /// Volume slot material was zeroed
    #[error("volume file {file_id} has been erased")]
    FileErased {
        /// Requested file id
        file_id: u32,
    },

    /// Volatile package is past its expiry time
    #[error("key package has expired")]
    PackageExpired,

    /// Every subkey has been issued
    #[error("no unissued keys remain")]
    Exhausted,

    /// Backing stream failed
    #[error("I/O error: {0}")]
    Io(String),

    /// Key generation failed
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl PackageError {
    /// Shorthand for [`PackageError::InvalidArgument`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument { reason: reason.into() }
    }

    /// Shorthand for [`PackageError::Corrupt`].
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Self::Corrupt { reason: reason.into() }
    }

    /// Failure class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::Argument,
            Self::Unauthorized { .. } => ErrorKind::Authorization,
            Self::Exhausted => ErrorKind::Exhaustion,
            Self::InvalidDescription
            | Self::InvalidAuthority
            | Self::Empty
            | Self::Corrupt { .. }
            | Self::SubKeyNotFound { .. }
            | Self::SubKeyLocked { .. }
            | Self::SubKeyErased { .. }
            | Self::FileNotFound { .. }
            | Self::FileLocked { .. }
            | Self::FileErased { .. }
            | Self::PackageExpired
            | Self::Io(_) => ErrorKind::Processing,
            Self::Crypto(err) => match err {
                CryptoError::NotInitialized { .. } => ErrorKind::NotInitialized,
                CryptoError::Truncated { .. } | CryptoError::Io(_) => ErrorKind::Processing,
                CryptoError::InvalidArgument { .. }
                | CryptoError::InvalidSeedLength { .. }
                | CryptoError::InvalidRounds { .. }
                | CryptoError::OutputOutOfRange { .. } => ErrorKind::Argument,
            },
        }
    }
}

impl From<io::Error> for PackageError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
