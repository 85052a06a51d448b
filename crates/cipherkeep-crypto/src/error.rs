//! Error types for generator and MAC operations

use thiserror::Error;

/// Errors from keystream generators, MAC engines and keying material
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Caller supplied an unusable key, seed, IV or buffer
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the input
        reason: String,
    },

    /// Seed length is not one the engine accepts
    #[error("invalid seed length for {engine}: got {actual} bytes")]
    InvalidSeedLength {
        /// Engine that rejected the seed
        engine: &'static str,
        /// Length that was supplied
        actual: usize,
    },

    /// Round count outside the supported range
    #[error("invalid round count: {rounds}")]
    InvalidRounds {
        /// Requested round count
        rounds: usize,
    },

    /// Output range does not fit the destination buffer
    #[error("output range out of bounds: offset {offset} + size {size} exceeds {len}")]
    OutputOutOfRange {
        /// Start offset into the output buffer
        offset: usize,
        /// Number of bytes requested
        size: usize,
        /// Length of the output buffer
        len: usize,
    },

    /// Engine used before `initialize`
    #[error("{engine} has not been initialized")]
    NotInitialized {
        /// Engine that was used
        engine: &'static str,
    },

    /// Serialized material ended early or declared impossible lengths
    #[error("truncated material: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Underlying reader or writer failed
    #[error("I/O error: {0}")]
    Io(String),
}

impl CryptoError {
    /// Shorthand for [`CryptoError::InvalidArgument`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument { reason: reason.into() }
    }

    /// Returns true if retrying with corrected input cannot help.
    ///
    /// Argument and initialization errors are caller mistakes and recover
    /// once valid input is supplied. Truncated material and I/O failures
    /// point at the data source itself.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Truncated { .. } | Self::Io(_) => true,

            Self::InvalidArgument { .. }
            | Self::InvalidSeedLength { .. }
            | Self::InvalidRounds { .. }
            | Self::OutputOutOfRange { .. }
            | Self::NotInitialized { .. } => false,
        }
    }
}

impl From<std::io::Error> for CryptoError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
