//! In-memory auth service and relay used by the client integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};

use babble_client::config::ClientConfig;
use babble_client::transport::{AuthTransport, MailboxTransport, TransportError};
use babble_client::{ClientError, Delegation, ProtocolClient};
use babble_crypto::{canonical, signing, Identity};
use babble_proto::api::{
    ChallengeRequest, ChallengeResponse, MailboxMessage, ProveRequest, ProveResponse,
    PublicKeyDetails, TokenRequest, TokenResponse,
};
use babble_proto::MessageEnvelope;

pub const CHAIN_ID: &str = "dorado-1";

fn unavailable(endpoint: &str) -> TransportError {
    TransportError::Status {
        endpoint: endpoint.into(),
        status: 503,
        body: "offline".into(),
    }
}

fn bad_request(endpoint: &str, reason: impl ToString) -> TransportError {
    TransportError::Status {
        endpoint: endpoint.into(),
        status: 400,
        body: reason.to_string(),
    }
}

fn jwt(pk: &str, lifetime: Duration) -> String {
    let now = Utc::now();
    let claims = serde_json::json!({
        "pk": pk,
        "iat": now.timestamp(),
        "exp": (now + lifetime).timestamp(),
        "iss": "fake-auth",
    });
    format!(
        "{}.{}.c2ln",
        general_purpose::URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#),
        general_purpose::URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

#[derive(Default)]
struct AuthLedger {
    challenges: usize,
    tokens: usize,
    pending: HashMap<String, String>,
}

/// Auth service that checks challenge signatures and mints JWT-shaped tokens.
pub struct FakeAuth {
    lifetime: Duration,
    /// Issue every token for this key instead of the caller's.
    impostor: Option<String>,
    offline: bool,
    ledger: Mutex<AuthLedger>,
}

impl FakeAuth {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime,
            impostor: None,
            offline: false,
            ledger: Mutex::default(),
        }
    }

    pub fn long_lived() -> Self {
        Self::new(Duration::hours(1))
    }

    pub fn issuing_for(mut self, public_key: &str) -> Self {
        self.impostor = Some(public_key.to_string());
        self
    }

    pub fn offline() -> Self {
        let mut auth = Self::long_lived();
        auth.offline = true;
        auth
    }

    pub fn challenges(&self) -> usize {
        self.ledger.lock().unwrap().challenges
    }

    pub fn tokens(&self) -> usize {
        self.ledger.lock().unwrap().tokens
    }
}

#[async_trait]
impl AuthTransport for FakeAuth {
    async fn request_challenge(
        &self,
        req: &ChallengeRequest,
    ) -> Result<ChallengeResponse, TransportError> {
        if self.offline {
            return Err(unavailable("/auth/login/wallet/challenge"));
        }
        let mut ledger = self.ledger.lock().unwrap();
        ledger.challenges += 1;
        Ok(ChallengeResponse {
            challenge: format!("login {} #{}", req.address, ledger.challenges),
            nonce: format!("nonce-{}", ledger.challenges),
        })
    }

    async fn prove(&self, req: &ProveRequest) -> Result<ProveResponse, TransportError> {
        let public_key = general_purpose::STANDARD
            .decode(&req.public_key.value)
            .map_err(|e| bad_request("/auth/login/wallet/verify", e))?;
        let doc = canonical::to_vec(&signing::sign_doc(&req.address, req.challenge.as_bytes()))
            .map_err(|e| bad_request("/auth/login/wallet/verify", e))?;
        if signing::verify(&public_key, &doc, &req.signature).is_err() {
            return Err(TransportError::Status {
                endpoint: "/auth/login/wallet/verify".into(),
                status: 401,
                body: "bad signature".into(),
            });
        }
        let code = format!("code-{}", req.nonce);
        self.ledger
            .lock()
            .unwrap()
            .pending
            .insert(code.clone(), hex::encode(public_key));
        Ok(ProveResponse { code })
    }

    async fn issue_token(&self, req: &TokenRequest) -> Result<TokenResponse, TransportError> {
        let mut ledger = self.ledger.lock().unwrap();
        let pk = ledger.pending.remove(&req.code).ok_or_else(|| TransportError::Status {
            endpoint: "/tokens".into(),
            status: 400,
            body: "unknown code".into(),
        })?;
        ledger.tokens += 1;
        let pk = self.impostor.clone().unwrap_or(pk);
        Ok(TokenResponse {
            access_token: jwt(&pk, self.lifetime),
        })
    }
}

#[derive(Default)]
struct RelayState {
    keys: HashMap<(String, String), String>,
    messages: Vec<MailboxMessage>,
    registrations: usize,
    lookups: usize,
    next_id: u64,
    clock_ms: i64,
}

impl RelayState {
    fn address_for(&self, public_key: &str) -> Option<String> {
        self.keys
            .iter()
            .find(|(_, pk)| pk.as_str() == public_key)
            .map(|((address, _), _)| address.clone())
    }

    fn store(&mut self, sender: String, target: String, contents: String) -> MailboxMessage {
        self.next_id += 1;
        // Strictly increasing commit times, one second apart.
        self.clock_ms = self.clock_ms.max(Utc::now().timestamp_millis()) + 1000;
        let msg = MailboxMessage {
            id: format!("msg-{}", self.next_id),
            group_id: None,
            sender,
            target,
            contents,
            commit_timestamp: self.clock_ms,
            expiry_timestamp: self.clock_ms + Duration::days(7).num_milliseconds(),
        };
        self.messages.push(msg.clone());
        msg
    }
}

/// Relay that keeps registrations and messages in memory. `list_messages`
/// returns everything, so clients must filter by target themselves.
#[derive(Default)]
pub struct FakeRelay {
    state: Mutex<RelayState>,
    offline: Mutex<bool>,
    /// Refuse the next request's token with a 401.
    revoked: Mutex<bool>,
}

impl FakeRelay {
    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    pub fn registrations(&self) -> usize {
        self.state.lock().unwrap().registrations
    }

    pub fn lookups(&self) -> usize {
        self.state.lock().unwrap().lookups
    }

    pub fn revoke_token(&self) {
        *self.revoked.lock().unwrap() = true;
    }

    /// Store a relay record exactly as given.
    pub fn inject_record(&self, msg: MailboxMessage) {
        self.state.lock().unwrap().messages.push(msg);
    }

    /// Drop arbitrary `contents` into `target`'s mailbox.
    pub fn inject(&self, sender: &str, target: &str, contents: &str) -> MailboxMessage {
        self.state
            .lock()
            .unwrap()
            .store(sender.into(), target.into(), contents.into())
    }

    fn check_online(&self) -> Result<(), TransportError> {
        if *self.offline.lock().unwrap() {
            return Err(unavailable("/graphql"));
        }
        let mut revoked = self.revoked.lock().unwrap();
        if *revoked {
            *revoked = false;
            return Err(TransportError::Status {
                endpoint: "/graphql".into(),
                status: 401,
                body: "token revoked".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MailboxTransport for FakeRelay {
    async fn lookup_public_key(
        &self,
        _token: &str,
        address: &str,
        chain_id: &str,
    ) -> Result<Option<String>, TransportError> {
        self.check_online()?;
        let mut state = self.state.lock().unwrap();
        state.lookups += 1;
        Ok(state
            .keys
            .get(&(address.to_string(), chain_id.to_string()))
            .cloned())
    }

    async fn update_public_key(
        &self,
        _token: &str,
        details: &PublicKeyDetails,
    ) -> Result<(), TransportError> {
        self.check_online()?;
        let delegate_key = general_purpose::STANDARD
            .decode(&details.signing_pub_key)
            .map_err(|e| TransportError::GraphQl(e.to_string()))?;
        signing::DelegationProof::from_parts(&details.signed_obj_base64, &details.signature)
            .and_then(|proof| proof.verify_binding(&delegate_key, &details.public_key))
            .map_err(|e| TransportError::GraphQl(format!("delegation rejected: {e}")))?;

        let mut state = self.state.lock().unwrap();
        state.registrations += 1;
        state.keys.insert(
            (details.address.clone(), details.chain_id.clone()),
            details.public_key.clone(),
        );
        Ok(())
    }

    async fn dispatch_messages(
        &self,
        _token: &str,
        contents: Vec<String>,
    ) -> Result<Vec<MailboxMessage>, TransportError> {
        self.check_online()?;
        let mut state = self.state.lock().unwrap();
        let mut stored = Vec::new();
        for item in contents {
            let envelope =
                MessageEnvelope::decode(&item).map_err(|e| TransportError::GraphQl(e.to_string()))?;
            let sender = state.address_for(&envelope.sender_public_key).unwrap_or_default();
            let target = state
                .address_for(&envelope.target_public_key)
                .ok_or_else(|| TransportError::GraphQl("unknown target".into()))?;
            stored.push(state.store(sender, target, item));
        }
        Ok(stored)
    }

    async fn list_messages(&self, _token: &str) -> Result<Vec<MailboxMessage>, TransportError> {
        self.check_online()?;
        Ok(self.state.lock().unwrap().messages.clone())
    }

    async fn drop_messages(
        &self,
        _token: &str,
        ids: &[String],
    ) -> Result<Vec<String>, TransportError> {
        self.check_online()?;
        let mut state = self.state.lock().unwrap();
        state.messages.retain(|m| !ids.contains(&m.id));
        Ok(ids.to_vec())
    }
}

/// Delegate and account identities for `seed`, derived the way the CLI does.
pub fn identities(seed: &str) -> (Identity, Identity) {
    let delegate = Identity::from_seed(seed).unwrap();
    let account = Identity::from_seed(&format!("{seed} {CHAIN_ID}")).unwrap();
    (delegate, account)
}

pub async fn try_connect(
    seed: &str,
    auth: &Arc<FakeAuth>,
    relay: &Arc<FakeRelay>,
) -> Result<ProtocolClient, ClientError> {
    let (delegate, account) = identities(seed);
    let delegation = Delegation::new(&delegate, &account)?;
    ProtocolClient::connect(
        delegation,
        account,
        CHAIN_ID,
        &ClientConfig::default(),
        auth.clone(),
        relay.clone(),
    )
    .await
}

pub async fn connect(seed: &str, auth: &Arc<FakeAuth>, relay: &Arc<FakeRelay>) -> ProtocolClient {
    try_connect(seed, auth, relay).await.unwrap()
}
