//! Content-id parsing and fleet sharding math.
//!
//! Work is partitioned among the members of a replica group without a
//! coordinator: every member computes the residue of the CID (taken as a
//! big-endian integer) modulo the group size and only pulls the files whose
//! residue matches its own position. The partition is a deterministic
//! function of `(cid, group size)` only.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CidError {
    #[error("unrecognized cid encoding: {0}")]
    UnknownEncoding(String),
    #[error("invalid character {1:?} in cid {0}")]
    InvalidCharacter(String, char),
    #[error("cid decodes to no bytes: {0}")]
    Empty(String),
}

const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const BASE32_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz234567";

/// Decode a CID string to its canonical byte form.
///
/// Accepts CIDv0 (bare base58btc, `Qm...`) and multibase-prefixed CIDv1 in
/// base32-lower (`b...`), base16 (`f...`) or base58btc (`z...`).
pub fn cid_bytes(cid: &str) -> Result<Vec<u8>, CidError> {
    let bytes = if cid.starts_with("Qm") {
        decode_base58(cid, cid)?
    } else {
        let mut chars = cid.chars();
        let prefix = chars
            .next()
            .ok_or_else(|| CidError::Empty(cid.to_string()))?;
        let rest = chars.as_str();
        match prefix {
            'b' => decode_base32(cid, rest)?,
            'f' => decode_base16(cid, rest)?,
            'z' => decode_base58(cid, rest)?,
            _ => return Err(CidError::UnknownEncoding(cid.to_string())),
        }
    };
    if bytes.is_empty() {
        return Err(CidError::Empty(cid.to_string()));
    }
    Ok(bytes)
}

/// Residue of the CID's canonical bytes, read as a big-endian integer,
/// modulo `modulus`. A modulus of 0 is treated as 1 (single-member group).
pub fn shard_residue(cid: &str, modulus: u64) -> Result<u64, CidError> {
    let m = modulus.max(1) as u128;
    let bytes = cid_bytes(cid)?;
    let mut acc: u128 = 0;
    for b in bytes {
        acc = (acc * 256 + b as u128) % m;
    }
    Ok(acc as u64)
}

fn decode_base58(cid: &str, input: &str) -> Result<Vec<u8>, CidError> {
    let mut out: Vec<u8> = Vec::new();
    for c in input.chars() {
        let digit = BASE58_ALPHABET
            .iter()
            .position(|&a| a as char == c)
            .ok_or_else(|| CidError::InvalidCharacter(cid.to_string(), c))?;
        let mut carry = digit as u32;
        for byte in out.iter_mut() {
            carry += (*byte as u32) * 58;
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            out.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }
    // leading '1's encode leading zero bytes
    for c in input.chars() {
        if c == '1' {
            out.push(0);
        } else {
            break;
        }
    }
    out.reverse();
    Ok(out)
}

fn decode_base32(cid: &str, input: &str) -> Result<Vec<u8>, CidError> {
    let mut out = Vec::new();
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    for c in input.chars() {
        let digit = BASE32_ALPHABET
            .iter()
            .position(|&a| a as char == c)
            .ok_or_else(|| CidError::InvalidCharacter(cid.to_string(), c))?;
        acc = (acc << 5) | digit as u32;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
            acc &= (1 << bits) - 1;
        }
    }
    Ok(out)
}

fn decode_base16(cid: &str, input: &str) -> Result<Vec<u8>, CidError> {
    if input.len() % 2 != 0 {
        let last = input.chars().last().unwrap_or(' ');
        return Err(CidError::InvalidCharacter(cid.to_string(), last));
    }
    let chars: Vec<char> = input.chars().collect();
    let mut out = Vec::with_capacity(chars.len() / 2);
    for pair in chars.chunks(2) {
        let hi = hex_digit(cid, pair[0])?;
        let lo = hex_digit(cid, pair[1])?;
        out.push((hi << 4) | lo);
    }
    Ok(out)
}

fn hex_digit(cid: &str, c: char) -> Result<u8, CidError> {
    c.to_digit(16)
        .map(|d| d as u8)
        .ok_or_else(|| CidError::InvalidCharacter(cid.to_string(), c))
}
