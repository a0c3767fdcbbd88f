//! Bech32 account addresses.
//!
//! An address is `bech32(prefix, ripemd160(sha256(compressed_pubkey)))`.
//! Only the `fetch` prefix is used for real accounts; `agent` addresses
//! appear as delegate endpoints and in test fixtures.

use bech32::{FromBase32, ToBase32, Variant};

use crate::error::CryptoError;
use crate::hash::hash160;

pub const ACCOUNT_PREFIX: &str = "fetch";
pub const AGENT_PREFIX: &str = "agent";

/// Prefixes accepted for messaging endpoints.
pub const ACCEPTED_PREFIXES: &[&str] = &[ACCOUNT_PREFIX, AGENT_PREFIX];

pub fn encode(prefix: &str, data: &[u8]) -> Result<String, CryptoError> {
    bech32::encode(prefix, data.to_base32(), Variant::Bech32)
        .map_err(|e| CryptoError::InvalidAddress(e.to_string()))
}

/// Address for a SEC1 compressed public key.
pub fn from_public_key(prefix: &str, compressed_pubkey: &[u8]) -> Result<String, CryptoError> {
    if compressed_pubkey.len() != 33 {
        return Err(CryptoError::InvalidKey(format!(
            "Compressed public key must be 33 bytes, got {}",
            compressed_pubkey.len()
        )));
    }
    encode(prefix, &hash160(compressed_pubkey))
}

/// Decode an address into its prefix and raw payload.
pub fn decode(address: &str) -> Result<(String, Vec<u8>), CryptoError> {
    let (hrp, data, variant) =
        bech32::decode(address).map_err(|e| CryptoError::InvalidAddress(e.to_string()))?;
    if variant != Variant::Bech32 {
        return Err(CryptoError::InvalidAddress(format!(
            "{address} is not a bech32 (non-m) string"
        )));
    }
    let bytes =
        Vec::<u8>::from_base32(&data).map_err(|e| CryptoError::InvalidAddress(e.to_string()))?;
    Ok((hrp, bytes))
}

/// Check that `address` is well-formed and carries an accepted prefix.
pub fn validate(address: &str) -> Result<(), CryptoError> {
    let (hrp, _) = decode(address)?;
    if !ACCEPTED_PREFIXES.contains(&hrp.as_str()) {
        return Err(CryptoError::InvalidAddress(format!(
            "unsupported prefix '{hrp}' in {address}"
        )));
    }
    Ok(())
}
