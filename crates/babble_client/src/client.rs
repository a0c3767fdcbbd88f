//! `ProtocolClient`: registration, send and receive on top of `AuthSession`.
//!
//! Two identities are involved. The *delegate* is the public endpoint: its
//! address is what peers send to and what the relay reports as `target`. The
//! *account* identity holds the messaging key: it authenticates, signs and
//! encrypts envelopes, and its public key is what the relay maps the delegate
//! address to. The delegation proof ties the two together at registration.

use std::collections::HashSet;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use babble_crypto::{address, CryptoError, DelegationProof, Identity};
use babble_proto::api::{PublicKeyDetails, RawMessage, PRIVACY_EVERYBODY};
use babble_proto::{build_envelope, open_envelope, MESSAGING_CHANNEL, MSG_TYPE_TEXT};

use crate::auth::AuthSession;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::transport::{
    AuthTransport, GraphQlMailbox, HttpAuthTransport, MailboxTransport, TransportError,
};

/// Public endpoint of a client plus the proof that it speaks for the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delegation {
    pub address: String,
    /// Base64 compressed public key of the delegate.
    pub public_key: String,
    pub proof: DelegationProof,
}

impl Delegation {
    /// Have `delegate` sign a proof over `account`'s public key.
    pub fn new(delegate: &Identity, account: &Identity) -> Result<Self, ClientError> {
        Ok(Self {
            address: delegate.address().to_string(),
            public_key: delegate.public_key_b64(),
            proof: DelegationProof::create(delegate, &account.public_key())?,
        })
    }

    /// Rebuild a delegation produced elsewhere.
    pub fn from_parts(
        address: &str,
        public_key_b64: &str,
        signature: &str,
        signed_obj_base64: &str,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            address: address.to_string(),
            public_key: public_key_b64.to_string(),
            proof: DelegationProof::from_parts(signed_obj_base64, signature)?,
        })
    }

    /// Check the address shape, that the address belongs to the delegate key,
    /// and that the proof binds `account`. Account-style addresses carry
    /// `hash160(key)`; `agent` addresses may also carry the key itself.
    fn check(&self, account: &Identity) -> Result<(), ClientError> {
        let (prefix, payload) = address::validate(&self.address)
            .and_then(|_| address::decode(&self.address))
            .map_err(|e| ClientError::AddressFormat(format!("{}: {e}", self.address)))?;

        let delegate_key = STANDARD
            .decode(&self.public_key)
            .map_err(CryptoError::from)?;
        let derived = address::from_public_key(&prefix, &delegate_key)?;
        let raw_key_agent = prefix == address::AGENT_PREFIX && payload == delegate_key;
        if derived != self.address && !raw_key_agent {
            return Err(ClientError::AddressFormat(format!(
                "{} does not belong to the delegate key (expected {derived})",
                self.address
            )));
        }

        self.proof.verify_binding(&delegate_key, &account.public_key())?;
        Ok(())
    }
}

/// A decrypted message addressed to this client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredMessage {
    pub id: String,
    /// Sender address as reported by the relay.
    pub sender: String,
    /// Envelope sender key, checked against the signature and the inner message.
    pub sender_public_key: String,
    pub target: String,
    pub text: String,
    pub msg_type: u32,
    pub sent_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ReceiveFailure {
    pub id: String,
    pub error: ClientError,
}

#[derive(Debug, Default)]
pub struct ReceiveBatch {
    pub messages: Vec<DeliveredMessage>,
    pub failures: Vec<ReceiveFailure>,
}

pub struct ProtocolClient {
    delegation: Delegation,
    identity: Identity,
    chain_id: String,
    auth: AuthSession,
    mailbox: Arc<dyn MailboxTransport>,
    last_seen: Option<DateTime<Utc>>,
    /// Listed messages already reported as unreadable before the mark could
    /// cover them.
    rejected: HashSet<String>,
}

impl std::fmt::Debug for ProtocolClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolClient")
            .field("address", &self.delegation.address)
            .field("public_key", &self.identity.public_key())
            .field("chain_id", &self.chain_id)
            .field("last_seen", &self.last_seen)
            .finish()
    }
}

impl ProtocolClient {
    /// Validate the delegation, authenticate `identity` and make sure the
    /// relay maps the delegate address to its messaging key.
    pub async fn connect(
        delegation: Delegation,
        identity: Identity,
        chain_id: &str,
        config: &ClientConfig,
        auth: Arc<dyn AuthTransport>,
        mailbox: Arc<dyn MailboxTransport>,
    ) -> Result<Self, ClientError> {
        delegation.check(&identity)?;

        let mut client = Self {
            delegation,
            identity,
            chain_id: chain_id.to_string(),
            auth: AuthSession::new(auth, config)?,
            mailbox,
            last_seen: None,
            rejected: HashSet::new(),
        };
        client.auth.authenticate(&client.identity).await?;
        client.ensure_registration().await?;
        Ok(client)
    }

    /// `connect` against the HTTP auth service and GraphQL relay in `config`.
    pub async fn connect_http(
        delegation: Delegation,
        identity: Identity,
        chain_id: &str,
        config: &ClientConfig,
    ) -> Result<Self, ClientError> {
        let auth = Arc::new(HttpAuthTransport::new(config)?);
        let mailbox = Arc::new(GraphQlMailbox::new(config)?);
        Self::connect(delegation, identity, chain_id, config, auth, mailbox).await
    }

    pub fn delegate_address(&self) -> &str {
        &self.delegation.address
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn auth(&self) -> &AuthSession {
        &self.auth
    }

    /// Commit time of the newest message this instance has consumed.
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_seen
    }

    /// Register the messaging key for the delegate address unless the relay
    /// already has it. Returns whether a registration was submitted.
    pub async fn ensure_registration(&mut self) -> Result<bool, ClientError> {
        let token = self.auth.ensure_fresh(&self.identity).await?;
        let registered = self
            .mailbox
            .lookup_public_key(&token, &self.delegation.address, &self.chain_id)
            .await;
        let registered = self.settle(registered)?;

        let public_key = self.identity.public_key();
        if registered.as_deref() == Some(public_key.as_str()) {
            debug!(address = %self.delegation.address, "messaging key already registered");
            return Ok(false);
        }

        info!(
            address = %self.delegation.address,
            account = %self.identity.address(),
            chain_id = %self.chain_id,
            "registering messaging key"
        );
        let details = PublicKeyDetails {
            public_key,
            address: self.delegation.address.clone(),
            channel_id: MESSAGING_CHANNEL.to_string(),
            chain_id: self.chain_id.clone(),
            privacy_setting: PRIVACY_EVERYBODY.to_string(),
            read_receipt: false,
            signing_pub_key: self.delegation.public_key.clone(),
            signature: self.delegation.proof.signature.clone(),
            signed_obj_base64: self.delegation.proof.signed_obj_base64.clone(),
        };
        let updated = self.mailbox.update_public_key(&token, &details).await;
        self.settle(updated)?;
        info!(address = %self.delegation.address, "messaging key registered");
        Ok(true)
    }

    /// Messaging key registered for `address` on this client's chain.
    pub async fn lookup_public_key(&mut self, address: &str) -> Result<Option<String>, ClientError> {
        address::validate(address)
            .map_err(|e| ClientError::AddressFormat(format!("{address}: {e}")))?;
        let token = self.auth.ensure_fresh(&self.identity).await?;
        let found = self
            .mailbox
            .lookup_public_key(&token, address, &self.chain_id)
            .await;
        self.settle(found)
    }

    pub async fn send(&mut self, target: &str, text: &str) -> Result<RawMessage, ClientError> {
        self.send_with_type(target, text, MSG_TYPE_TEXT).await
    }

    /// Encrypt `text` for `target` and hand it to the relay. Returns the
    /// relay's record of the dispatched message.
    pub async fn send_with_type(
        &mut self,
        target: &str,
        text: &str,
        msg_type: u32,
    ) -> Result<RawMessage, ClientError> {
        let target_key = self
            .lookup_public_key(target)
            .await?
            .ok_or_else(|| ClientError::Routing(target.to_string()))?;

        let envelope = build_envelope(&self.identity, &target_key, text, msg_type, Utc::now())?;
        let token = self.auth.ensure_fresh(&self.identity).await?;
        let acked = self
            .mailbox
            .dispatch_messages(&token, vec![envelope.encode()?])
            .await;
        let mut acked = self.settle(acked)?;

        if acked.is_empty() {
            return Err(TransportError::MalformedResponse {
                endpoint: "dispatchMessages".into(),
                reason: "relay acknowledged no messages".into(),
            }
            .into());
        }
        let sent = RawMessage::try_from(acked.swap_remove(0))?;
        debug!(id = %sent.id, target = %target, "message dispatched");
        Ok(sent)
    }

    /// New messages for this client, skipping any that fail to open.
    pub async fn receive(&mut self) -> Result<Vec<DeliveredMessage>, ClientError> {
        Ok(self.receive_batch().await?.messages)
    }

    /// New messages for this client together with the ones that could not be
    /// opened. Each failure is reported once per instance: the high-water
    /// mark covers messages with a commit time, and messages without a
    /// usable one are remembered by id while the relay still lists them.
    pub async fn receive_batch(&mut self) -> Result<ReceiveBatch, ClientError> {
        let token = self.auth.ensure_fresh(&self.identity).await?;
        let listed = self.mailbox.list_messages(&token).await;
        let listed = self.settle(listed)?;

        let mut fresh = Vec::new();
        let mut listed_ids = HashSet::new();
        let mut batch = ReceiveBatch::default();
        for msg in listed {
            if msg.target != self.delegation.address {
                continue;
            }
            let id = msg.id.clone();
            listed_ids.insert(id.clone());
            match RawMessage::try_from(msg) {
                Ok(raw) if self.last_seen.map_or(true, |mark| raw.sent_at > mark) => {
                    fresh.push(raw)
                }
                Ok(_) => {}
                Err(err) => {
                    if self.rejected.insert(id.clone()) {
                        warn!(id = %id, error = %err, "skipping message with bad timestamps");
                        batch.failures.push(ReceiveFailure { id, error: err.into() });
                    }
                }
            }
        }
        self.rejected.retain(|id| listed_ids.contains(id));

        if let Some(newest) = fresh.iter().map(|m| m.sent_at).max() {
            self.last_seen = Some(self.last_seen.map_or(newest, |mark| mark.max(newest)));
        }

        for raw in fresh {
            match self.open(&raw) {
                Ok(delivered) => batch.messages.push(delivered),
                Err(error) => {
                    warn!(id = %raw.id, sender = %raw.sender, error = %error, "skipping message");
                    batch.failures.push(ReceiveFailure { id: raw.id, error });
                }
            }
        }

        debug!(
            received = batch.messages.len(),
            failed = batch.failures.len(),
            "mailbox read"
        );
        Ok(batch)
    }

    /// Drop the cached token when the relay refuses it, so the next
    /// operation signs in again.
    fn settle<T>(&mut self, res: Result<T, TransportError>) -> Result<T, ClientError> {
        if let Err(TransportError::Status { status: 401, .. }) = &res {
            warn!(address = %self.delegation.address, "relay rejected token");
            self.auth.invalidate();
        }
        Ok(res?)
    }

    fn open(&self, raw: &RawMessage) -> Result<DeliveredMessage, ClientError> {
        let (envelope, inner) = open_envelope(&self.identity, &raw.contents)
            .map_err(|e| ClientError::for_message(&raw.id, e))?;
        Ok(DeliveredMessage {
            id: raw.id.clone(),
            sender: raw.sender.clone(),
            sender_public_key: envelope.sender_public_key,
            target: raw.target.clone(),
            text: inner.content.text,
            msg_type: inner.msg_type,
            sent_at: raw.sent_at,
            expires_at: raw.expires_at,
        })
    }
}
