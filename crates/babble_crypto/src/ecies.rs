//! Integrated encryption scheme over secp256k1.
//!
//! Each ciphertext carries its own ephemeral public key, so it can be opened
//! by the holder of the recipient's private key and nobody else.
//!
//! Wire format:
//!   [ ephemeral pubkey (65, uncompressed) | nonce (16) | tag (16) | ciphertext ]
//!
//! Key: HKDF-SHA256 over `ephemeral_pubkey || shared_point` (both
//! uncompressed), empty salt and info. Cipher: AES-256-GCM, 16-byte nonce.
//! This is the layout produced by the `eciespy` family of libraries.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use hkdf::Hkdf;
use k256::elliptic_curve::group::Curve as _;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::identity::Identity;

type Aes256Gcm16 = AesGcm<Aes256, U16>;

const EPHEMERAL_LEN: usize = 65;
const NONCE_LEN: usize = 16;
const TAG_LEN: usize = 16;

/// Encrypt `plaintext` to the holder of `recipient` (SEC1 public key bytes).
pub fn encrypt(recipient: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let recipient =
        PublicKey::from_sec1_bytes(recipient).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

    let ephemeral = SecretKey::random(&mut OsRng);
    let ephemeral_pub = ephemeral.public_key().to_encoded_point(false);
    let key = derive_key(ephemeral_pub.as_bytes(), &ephemeral, &recipient)?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let cipher = Aes256Gcm16::new_from_slice(key.as_slice()).map_err(|_| CryptoError::Encryption)?;
    let sealed = cipher
        .encrypt(GenericArray::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::Encryption)?;
    // aes-gcm appends the tag; the wire format wants it ahead of the body.
    let (body, tag) = sealed.split_at(sealed.len() - TAG_LEN);

    let mut out = Vec::with_capacity(EPHEMERAL_LEN + NONCE_LEN + sealed.len());
    out.extend_from_slice(ephemeral_pub.as_bytes());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(tag);
    out.extend_from_slice(body);
    Ok(out)
}

/// Same as [`encrypt`], with the recipient key given as hex.
pub fn encrypt_to_hex(recipient_hex: &str, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    encrypt(&hex::decode(recipient_hex)?, plaintext)
}

/// Open a ciphertext addressed to `identity`.
pub fn decrypt(identity: &Identity, data: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    decrypt_with(identity.encryption_key(), data)
}

fn decrypt_with(secret: &SecretKey, data: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if data.len() < EPHEMERAL_LEN + NONCE_LEN + TAG_LEN {
        return Err(CryptoError::Decryption);
    }
    let (ephemeral_pub, rest) = data.split_at(EPHEMERAL_LEN);
    let (nonce, rest) = rest.split_at(NONCE_LEN);
    let (tag, body) = rest.split_at(TAG_LEN);

    let ephemeral = PublicKey::from_sec1_bytes(ephemeral_pub).map_err(|_| CryptoError::Decryption)?;
    let key = derive_key(ephemeral_pub, secret, &ephemeral)?;

    let mut sealed = Vec::with_capacity(body.len() + TAG_LEN);
    sealed.extend_from_slice(body);
    sealed.extend_from_slice(tag);

    let cipher = Aes256Gcm16::new_from_slice(key.as_slice()).map_err(|_| CryptoError::Decryption)?;
    let plaintext = cipher
        .decrypt(GenericArray::from_slice(nonce), sealed.as_slice())
        .map_err(|_| CryptoError::Decryption)?;
    Ok(Zeroizing::new(plaintext))
}

/// HKDF-SHA256(ephemeral_pub || shared_point) -> 32-byte AES key.
fn derive_key(
    ephemeral_pub: &[u8],
    secret: &SecretKey,
    peer: &PublicKey,
) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
    let shared = (peer.to_projective() * *secret.to_nonzero_scalar()).to_affine();
    let shared = PublicKey::from_affine(shared)
        .map_err(|_| CryptoError::InvalidKey("shared point at infinity".into()))?;
    let shared = shared.to_encoded_point(false);

    let mut master = Zeroizing::new(Vec::with_capacity(ephemeral_pub.len() + shared.len()));
    master.extend_from_slice(ephemeral_pub);
    master.extend_from_slice(shared.as_bytes());

    let mut key = Zeroizing::new([0u8; 32]);
    Hkdf::<Sha256>::new(None, &master)
        .expand(&[], key.as_mut_slice())
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    Ok(key)
}
