//! Three-part length-prefixed encoding shared by seed and MAC material.
//!
//! ```text
//! [i16 len0][i16 len1][i16 len2][part0][part1][part2]
//! ```
//!
//! Lengths are little-endian. An absent part is written with length 0.

use std::io::{Read, Write};

use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Size of the three length fields.
pub(crate) const PREFIX_SIZE: usize = 6;

/// Largest part that fits an `i16` length field.
pub(crate) const MAX_PART_SIZE: usize = i16::MAX as usize;

pub(crate) fn encoded_len(parts: [&[u8]; 3]) -> usize {
    PREFIX_SIZE + parts.iter().map(|p| p.len()).sum::<usize>()
}

pub(crate) fn encode(parts: [&[u8]; 3]) -> Result<Vec<u8>, CryptoError> {
    let mut out = Vec::with_capacity(encoded_len(parts));
    for part in parts {
        if part.len() > MAX_PART_SIZE {
            return Err(CryptoError::invalid(format!(
                "material part of {} bytes exceeds {MAX_PART_SIZE}",
                part.len()
            )));
        }
        out.extend_from_slice(&(part.len() as i16).to_le_bytes());
    }
    for part in parts {
        out.extend_from_slice(part);
    }
    Ok(out)
}

pub(crate) fn write_to<W: Write>(writer: &mut W, parts: [&[u8]; 3]) -> Result<(), CryptoError> {
    let encoded = Zeroizing::new(encode(parts)?);
    writer.write_all(&encoded)?;
    Ok(())
}

fn lengths(prefix: &[u8]) -> Result<[usize; 3], CryptoError> {
    let mut lens = [0usize; 3];
    for (i, len) in lens.iter_mut().enumerate() {
        let raw = i16::from_le_bytes([prefix[i * 2], prefix[i * 2 + 1]]);
        *len = usize::try_from(raw)
            .map_err(|_| CryptoError::invalid(format!("negative material length {raw}")))?;
    }
    Ok(lens)
}

/// Decode from a byte slice. Returns the parts and the number of bytes
/// consumed.
pub(crate) fn decode(bytes: &[u8]) -> Result<([Vec<u8>; 3], usize), CryptoError> {
    if bytes.len() < PREFIX_SIZE {
        return Err(CryptoError::Truncated { expected: PREFIX_SIZE, actual: bytes.len() });
    }
    let lens = lengths(&bytes[..PREFIX_SIZE])?;
    let total = PREFIX_SIZE + lens.iter().sum::<usize>();
    if bytes.len() < total {
        return Err(CryptoError::Truncated { expected: total, actual: bytes.len() });
    }

    let mut offset = PREFIX_SIZE;
    let mut parts: [Vec<u8>; 3] = Default::default();
    for (part, len) in parts.iter_mut().zip(lens) {
        part.extend_from_slice(&bytes[offset..offset + len]);
        offset += len;
    }
    Ok((parts, total))
}

pub(crate) fn read_from<R: Read>(reader: &mut R) -> Result<[Vec<u8>; 3], CryptoError> {
    let mut prefix = [0u8; PREFIX_SIZE];
    reader.read_exact(&mut prefix)?;
    let lens = lengths(&prefix)?;

    let mut parts: [Vec<u8>; 3] = Default::default();
    for (part, len) in parts.iter_mut().zip(lens) {
        part.resize(len, 0);
        reader.read_exact(part)?;
    }
    Ok(parts)
}
