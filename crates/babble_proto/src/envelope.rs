//! Message envelope: what the relay stores and forwards.
//!
//! The relay sees both public keys, the timestamps and two opaque
//! ciphertexts. The same inner message is encrypted once to the sender (so
//! the sender can recover its own sent history) and once to the target.
//!
//! Layering, outermost first:
//!   contents  = base64(canonical(MessageEnvelope))
//!   data      = base64(canonical(EncryptedPayload))      signed by sender
//!   encrypted = base64(ecies(canonical(InnerMessage)))   x2

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use babble_crypto::{canonical, ecies, signing, Identity};

use crate::error::CodecError;
use crate::message::InnerMessage;

/// Fixed channel tag for direct messaging.
pub const MESSAGING_CHANNEL: &str = "MESSAGING";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    /// base64 of the canonical `EncryptedPayload` bytes.
    pub data: String,
    pub sender_public_key: String,
    pub target_public_key: String,
    pub group_last_seen_timestamp: String,
    pub last_seen_timestamp: String,
    /// Sender signature over the base64-decoded `data` bytes.
    pub signature: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPayload {
    pub encrypted_sender_data: String,
    pub encrypted_target_data: String,
}

/// Which of the two ciphertexts to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Sender,
    Target,
}

/// Build a signed, dual-encrypted envelope from `sender` to `target_public_key`.
pub fn build_envelope(
    sender: &Identity,
    target_public_key: &str,
    text: &str,
    msg_type: u32,
    now: DateTime<Utc>,
) -> Result<MessageEnvelope, CodecError> {
    let sender_public_key = sender.public_key();
    let inner = InnerMessage::new(&sender_public_key, target_public_key, text, msg_type, now);
    let raw = canonical::to_vec(&inner)?;

    let payload = EncryptedPayload {
        encrypted_sender_data: STANDARD.encode(ecies::encrypt(sender.public_key_bytes(), &raw)?),
        encrypted_target_data: STANDARD.encode(ecies::encrypt_to_hex(target_public_key, &raw)?),
    };
    let payload_bytes = canonical::to_vec(&payload)?;
    let signature = signing::sign(sender, &payload_bytes);

    Ok(MessageEnvelope {
        data: STANDARD.encode(&payload_bytes),
        sender_public_key,
        target_public_key: target_public_key.to_string(),
        group_last_seen_timestamp: inner.group_last_seen_timestamp,
        last_seen_timestamp: inner.last_seen_timestamp,
        signature,
        channel_id: MESSAGING_CHANNEL.to_string(),
    })
}

impl MessageEnvelope {
    /// Transport encoding: base64 of the canonical envelope JSON.
    pub fn encode(&self) -> Result<String, CodecError> {
        Ok(STANDARD.encode(canonical::to_vec(self)?))
    }

    pub fn decode(contents: &str) -> Result<Self, CodecError> {
        let raw = STANDARD.decode(contents.trim())?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Check the sender's signature over the payload bytes.
    pub fn verify(&self) -> Result<(), CodecError> {
        let payload_bytes = STANDARD.decode(&self.data)?;
        signing::verify_hex(&self.sender_public_key, &payload_bytes, &self.signature)?;
        Ok(())
    }

    pub fn payload(&self) -> Result<EncryptedPayload, CodecError> {
        let payload_bytes = STANDARD.decode(&self.data)?;
        Ok(serde_json::from_slice(&payload_bytes)?)
    }

    /// Verify, decrypt the chosen ciphertext with `reader`, and check that the
    /// inner message names the same sender as the envelope.
    pub fn open(&self, reader: &Identity, recipient: Recipient) -> Result<InnerMessage, CodecError> {
        if self.channel_id != MESSAGING_CHANNEL {
            return Err(CodecError::InvalidEnvelope(format!(
                "unexpected channel '{}'",
                self.channel_id
            )));
        }
        self.verify()?;

        let payload = self.payload()?;
        let ciphertext = match recipient {
            Recipient::Sender => &payload.encrypted_sender_data,
            Recipient::Target => &payload.encrypted_target_data,
        };
        let plaintext = ecies::decrypt(reader, &STANDARD.decode(ciphertext)?)?;
        let inner: InnerMessage = serde_json::from_slice(&plaintext)?;

        if inner.sender != self.sender_public_key {
            return Err(CodecError::SenderMismatch {
                envelope: self.sender_public_key.clone(),
                message: inner.sender,
            });
        }
        Ok(inner)
    }
}

/// Open relay `contents` addressed to `reader`.
pub fn open_envelope(reader: &Identity, contents: &str) -> Result<(MessageEnvelope, InnerMessage), CodecError> {
    let envelope = MessageEnvelope::decode(contents)?;
    let inner = envelope.open(reader, Recipient::Target)?;
    Ok((envelope, inner))
}

/// Open relay `contents` that `reader` itself sent (sent-history view).
pub fn open_own_envelope(reader: &Identity, contents: &str) -> Result<(MessageEnvelope, InnerMessage), CodecError> {
    let envelope = MessageEnvelope::decode(contents)?;
    let inner = envelope.open(reader, Recipient::Sender)?;
    Ok((envelope, inner))
}
