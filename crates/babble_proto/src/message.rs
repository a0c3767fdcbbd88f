//! Plaintext message carried (twice encrypted) inside an envelope.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Plain text chat message.
pub const MSG_TYPE_TEXT: u32 = 1;
/// Transaction data (opaque to this crate).
pub const MSG_TYPE_TRANSACTION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InnerMessage {
    /// Sender public key (hex, compressed).
    pub sender: String,
    /// Target public key (hex, compressed).
    pub target: String,
    pub group_last_seen_timestamp: String,
    pub last_seen_timestamp: String,
    #[serde(rename = "type")]
    pub msg_type: u32,
    pub content: MessageContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    pub text: String,
}

impl InnerMessage {
    pub fn new(sender: &str, target: &str, text: &str, msg_type: u32, now: DateTime<Utc>) -> Self {
        let ts = iso_timestamp(now);
        Self {
            sender: sender.to_string(),
            target: target.to_string(),
            group_last_seen_timestamp: ts.clone(),
            last_seen_timestamp: ts,
            msg_type,
            content: MessageContent {
                text: text.to_string(),
            },
        }
    }
}

/// ISO-8601 with an explicit `+00:00` offset, e.g. `2024-05-01T12:00:00.000000+00:00`.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, false)
}
