use thiserror::Error;

use babble_crypto::CryptoError;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("Envelope sender {envelope} does not match message sender {message}")]
    SenderMismatch { envelope: String, message: String },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),
}

impl CodecError {
    /// True when the ciphertext could not be opened with the reader's key.
    pub fn is_decryption(&self) -> bool {
        matches!(self, CodecError::Crypto(CryptoError::Decryption))
    }
}
