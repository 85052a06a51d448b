//! Keying-material containers.
//!
//! [`SeedMaterial`] initializes keystream generators and [`MacMaterial`]
//! initializes MAC engines. Both share a compact wire format:
//!
//! ```text
//! [i16 len(part1)][i16 len(part2)][i16 len(part3)][part1][part2][part3]
//! ```
//!
//! All lengths are little-endian; absent parts have length 0.

mod codec;
mod mac;
mod seed;

pub use mac::MacMaterial;
pub use seed::SeedMaterial;
