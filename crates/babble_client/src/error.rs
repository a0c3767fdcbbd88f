use thiserror::Error;

use babble_crypto::CryptoError;
use babble_proto::CodecError;

use crate::auth::AuthError;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid address: {0}")]
    AddressFormat(String),

    #[error("Authentication failed: {0}")]
    Authentication(#[from] AuthError),

    #[error("Unable to route to {0}: no messaging key registered")]
    Routing(String),

    #[error("Unable to decrypt message {id}")]
    Decryption { id: String },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Network-level failure (connection, timeout, HTTP status, relay
    /// error), including one hit while authenticating. These are the errors
    /// a caller may choose to retry.
    pub fn is_transport(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Authentication(err) => err.is_transport(),
            _ => false,
        }
    }

    /// Classify a failure to open one relay message.
    pub(crate) fn for_message(id: &str, err: CodecError) -> Self {
        if err.is_decryption() {
            ClientError::Decryption { id: id.to_string() }
        } else {
            ClientError::Codec(err)
        }
    }
}
