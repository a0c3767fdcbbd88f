//! babble_proto: wire types and envelope codec for the Babble protocol
//!
//! # Modules
//! - `envelope`: dual-encrypted, signed message envelope (what the relay sees)
//! - `message` : plaintext message inside the envelope ciphertexts
//! - `api`     : auth (REST) and mailbox (GraphQL) request/response schemas
//! - `error`   : codec error type

pub mod api;
pub mod envelope;
pub mod error;
pub mod message;

pub use api::RawMessage;
pub use envelope::{build_envelope, open_envelope, open_own_envelope, MessageEnvelope, MESSAGING_CHANNEL};
pub use error::CodecError;
pub use message::{InnerMessage, MSG_TYPE_TEXT};
