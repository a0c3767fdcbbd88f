//! Request/response schemas for the auth service (REST) and the mailbox
//! relay (GraphQL). These map directly to JSON bodies on the wire.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

// ── Auth ─────────────────────────────────────────────────────────────────────

/// Amino type tag for secp256k1 public keys.
pub const SECP256K1_PUBKEY_TYPE: &str = "tendermint/PubKeySecp256k1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeRequest {
    pub address: String,
    pub client_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub challenge: String,
    pub nonce: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyValue {
    /// Base64 compressed public key.
    pub value: String,
    #[serde(rename = "type")]
    pub key_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProveRequest {
    pub address: String,
    pub public_key: PublicKeyValue,
    pub nonce: String,
    pub challenge: String,
    /// Signature over the sign-arbitrary doc wrapping `challenge`.
    pub signature: String,
    pub client_id: String,
    pub scope: String,
}

/// Verification artifact exchanged for a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProveResponse {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: String,
}

impl TokenRequest {
    pub fn authorization_code(code: String) -> Self {
        Self {
            grant_type: "authorization_code".to_string(),
            code,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// Claims read from the access token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Hex compressed public key the token was issued to.
    pub pk: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default)]
    pub iss: Option<String>,
}

// ── GraphQL framing ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct GraphQlRequest<'a, V: Serialize> {
    pub query: &'a str,
    pub variables: V,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

// ── Mailbox operations ───────────────────────────────────────────────────────

pub const PRIVACY_EVERYBODY: &str = "EVERYBODY";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupVariables {
    pub address: String,
    pub chain_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupData {
    pub public_key: Option<PublicKeyRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyRecord {
    pub public_key: String,
}

/// Registration of a messaging key for an address, carrying the delegation
/// proof that lets the relay check the account → delegate binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyDetails {
    pub public_key: String,
    pub address: String,
    pub channel_id: String,
    pub chain_id: String,
    pub privacy_setting: String,
    pub read_receipt: bool,
    /// Base64 compressed public key of the delegate.
    pub signing_pub_key: String,
    pub signature: String,
    pub signed_obj_base64: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePublicKeyVariables {
    pub public_key_details: PublicKeyDetails,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputMessage {
    pub contents: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchVariables {
    pub messages: Vec<InputMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchData {
    pub dispatch_messages: Vec<MailboxMessage>,
}

#[derive(Debug, Deserialize)]
pub struct MailboxData {
    pub mailbox: MailboxMessages,
}

#[derive(Debug, Deserialize)]
pub struct MailboxMessages {
    pub messages: Vec<MailboxMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DropVariables {
    pub ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropData {
    pub drop_messages: Vec<IdRecord>,
}

#[derive(Debug, Deserialize)]
pub struct IdRecord {
    pub id: String,
}

/// Relay message as it appears on the wire (millisecond epoch timestamps).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxMessage {
    pub id: String,
    #[serde(default)]
    pub group_id: Option<String>,
    pub sender: String,
    pub target: String,
    pub contents: String,
    pub commit_timestamp: i64,
    pub expiry_timestamp: i64,
}

/// Relay message with timestamps converted to UTC instants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub id: String,
    pub group_id: Option<String>,
    pub sender: String,
    pub target: String,
    pub contents: String,
    pub sent_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TryFrom<MailboxMessage> for RawMessage {
    type Error = CodecError;

    fn try_from(msg: MailboxMessage) -> Result<Self, Self::Error> {
        Ok(Self {
            sent_at: from_millis(msg.commit_timestamp)?,
            expires_at: from_millis(msg.expiry_timestamp)?,
            id: msg.id,
            group_id: msg.group_id,
            sender: msg.sender,
            target: msg.target,
            contents: msg.contents,
        })
    }
}

pub fn from_millis(ms: i64) -> Result<DateTime<Utc>, CodecError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or(CodecError::InvalidTimestamp(ms))
}

pub fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}
