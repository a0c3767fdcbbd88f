//! Seed-derived identities.
//!
//! One 32-byte secret backs two keypairs:
//!   - a secp256k1 ECDSA signing key (account model of the target chain),
//!   - a secp256k1 ECIES key used to open envelopes addressed to us.
//!
//! `from_seed` is a pure function of the seed text: `sha256(sha256(seed))`.
//! Only `generate` draws from system entropy.

use base64::{engine::general_purpose::STANDARD, Engine};
use k256::ecdsa::{SigningKey, VerifyingKey};
use k256::SecretKey;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::address::{self, ACCOUNT_PREFIX};
use crate::error::CryptoError;
use crate::hash::sha256;

pub struct Identity {
    secret: Zeroizing<[u8; 32]>,
    signing_key: SigningKey,
    encryption_key: SecretKey,
    public_key: [u8; 33],
    address: String,
}

impl Identity {
    pub fn from_seed(seed: &str) -> Result<Self, CryptoError> {
        let secret = Zeroizing::new(sha256(&sha256(seed.as_bytes())));
        Self::from_secret(secret.as_slice())
    }

    pub fn generate() -> Result<Self, CryptoError> {
        let key = SecretKey::random(&mut OsRng);
        Self::from_secret(key.to_bytes().as_slice())
    }

    pub fn from_secret(bytes: &[u8]) -> Result<Self, CryptoError> {
        Self::with_prefix(bytes, ACCOUNT_PREFIX)
    }

    /// Build an identity whose address uses `prefix` instead of `fetch`.
    pub fn with_prefix(bytes: &[u8], prefix: &str) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKey(format!(
                "Identity secret must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = Zeroizing::new([0u8; 32]);
        arr.copy_from_slice(bytes);

        let signing_key = SigningKey::from_slice(arr.as_slice())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let encryption_key = SecretKey::from_slice(arr.as_slice())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

        let public_key = compressed(signing_key.verifying_key())?;
        let address = address::from_public_key(prefix, &public_key)?;

        Ok(Self {
            secret: arr,
            signing_key,
            encryption_key,
            public_key,
            address,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Compressed SEC1 public key, hex-encoded. This is the key peers
    /// encrypt to and the key registered with the relay.
    pub fn public_key(&self) -> String {
        hex::encode(self.public_key)
    }

    pub fn public_key_bytes(&self) -> &[u8; 33] {
        &self.public_key
    }

    /// Compressed public key, standard base64. Used where the chain's
    /// amino JSON conventions expect a `PubKeySecp256k1` value.
    pub fn public_key_b64(&self) -> String {
        STANDARD.encode(self.public_key)
    }

    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub(crate) fn encryption_key(&self) -> &SecretKey {
        &self.encryption_key
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("address", &self.address)
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

fn compressed(key: &VerifyingKey) -> Result<[u8; 33], CryptoError> {
    let point = key.to_encoded_point(true);
    point
        .as_bytes()
        .try_into()
        .map_err(|_| CryptoError::InvalidKey("compressed point is not 33 bytes".into()))
}
