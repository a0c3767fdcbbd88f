use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Signature verification failed")]
    SignatureVerification,

    #[error("ECIES encryption failed")]
    Encryption,

    #[error("ECIES decryption failed (wrong key or tampered ciphertext)")]
    Decryption,

    #[error("Non-canonical value: {0}")]
    NonCanonical(String),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}
