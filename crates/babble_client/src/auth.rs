//! Bearer-token lifecycle against the wallet-login auth service.
//!
//! ```text
//! Unauthenticated ──authenticate──▶ Authenticating ──ok──▶ Authenticated
//!        ▲                               │                    │
//!        └────────────── failure ────────┘     stale ─────────┘ (re-authenticate)
//! ```
//!
//! A token is stale once `now >= expires_at - renewal_buffer`. Staleness is
//! checked lazily by `ensure_fresh`, which every public client operation calls
//! first; there is no background timer.
//!
//! The token payload is read without verifying the issuer signature (the
//! channel is TLS). Its public key, and the address derived from it, must be
//! the requesting identity's. Anything else aborts and caches nothing.

use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use babble_crypto::{signing, CryptoError, Identity};
use babble_proto::api::{
    from_millis, ChallengeRequest, ProveRequest, PublicKeyValue, TokenClaims, TokenRequest,
    SECP256K1_PUBKEY_TYPE,
};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::transport::{AuthTransport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    Challenge,
    Prove,
    Token,
}

impl fmt::Display for AuthStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthStage::Challenge => "challenge",
            AuthStage::Prove => "verify",
            AuthStage::Token => "token",
        })
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{stage} request failed: {source}")]
    Transport {
        stage: AuthStage,
        #[source]
        source: TransportError,
    },

    #[error("Signing challenge failed: {0}")]
    Signing(#[from] CryptoError),

    #[error("Malformed access token: {0}")]
    MalformedToken(String),

    #[error("Token was issued to {actual}, expected {expected}")]
    IdentityMismatch { expected: String, actual: String },
}

impl AuthError {
    pub fn is_transport(&self) -> bool {
        matches!(self, AuthError::Transport { .. })
    }

    fn at(stage: AuthStage) -> impl FnOnce(TransportError) -> Self {
        move |source| AuthError::Transport { stage, source }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub bearer: String,
    pub address: String,
    pub public_key: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    /// Renewal is due once `now` reaches `expires_at - renewal_buffer`. A
    /// buffer reaching past the representable range always counts as stale.
    pub fn is_stale(&self, now: DateTime<Utc>, renewal_buffer: Duration) -> bool {
        self.expires_at
            .checked_sub_signed(renewal_buffer)
            .map_or(true, |renew_at| now >= renew_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated(AuthToken),
}

pub struct AuthSession {
    transport: Arc<dyn AuthTransport>,
    client_id: String,
    scope: String,
    renewal_buffer: Duration,
    state: AuthState,
}

impl AuthSession {
    pub fn new(
        transport: Arc<dyn AuthTransport>,
        config: &ClientConfig,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            transport,
            client_id: config.client_id.clone(),
            scope: config.scope.clone(),
            renewal_buffer: config.renewal_buffer()?,
            state: AuthState::Unauthenticated,
        })
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn token(&self) -> Option<&AuthToken> {
        match &self.state {
            AuthState::Authenticated(token) => Some(token),
            _ => None,
        }
    }

    pub fn needs_renewal(&self, now: DateTime<Utc>) -> bool {
        self.token()
            .map_or(true, |token| token.is_stale(now, self.renewal_buffer))
    }

    /// Bearer string for the next request, re-authenticating first when the
    /// current token is missing or stale.
    pub async fn ensure_fresh(&mut self, identity: &Identity) -> Result<String, AuthError> {
        if self.needs_renewal(Utc::now()) {
            if self.token().is_some() {
                debug!(address = %identity.address(), "token stale, renewing");
            }
            self.authenticate(identity).await?;
        }
        self.token()
            .map(|token| token.bearer.clone())
            .ok_or_else(|| AuthError::MalformedToken("no token after authentication".into()))
    }

    /// Run the full challenge → verify → token exchange. On failure the
    /// session is left unauthenticated.
    pub async fn authenticate(&mut self, identity: &Identity) -> Result<(), AuthError> {
        self.state = AuthState::Authenticating;
        match self.exchange(identity).await {
            Ok(token) => {
                info!(
                    address = %token.address,
                    expires_at = %token.expires_at,
                    "authenticated"
                );
                self.state = AuthState::Authenticated(token);
                Ok(())
            }
            Err(err) => {
                warn!(address = %identity.address(), error = %err, "authentication failed");
                self.state = AuthState::Unauthenticated;
                Err(err)
            }
        }
    }

    pub fn invalidate(&mut self) {
        self.state = AuthState::Unauthenticated;
    }

    async fn exchange(&self, identity: &Identity) -> Result<AuthToken, AuthError> {
        let challenge = self
            .transport
            .request_challenge(&ChallengeRequest {
                address: identity.address().to_string(),
                client_id: self.client_id.clone(),
            })
            .await
            .map_err(AuthError::at(AuthStage::Challenge))?;

        let (_, signature) = signing::sign_arbitrary(identity, challenge.challenge.as_bytes())?;

        let proof = self
            .transport
            .prove(&ProveRequest {
                address: identity.address().to_string(),
                public_key: PublicKeyValue {
                    value: identity.public_key_b64(),
                    key_type: SECP256K1_PUBKEY_TYPE.to_string(),
                },
                nonce: challenge.nonce,
                challenge: challenge.challenge,
                signature,
                client_id: self.client_id.clone(),
                scope: self.scope.clone(),
            })
            .await
            .map_err(AuthError::at(AuthStage::Prove))?;

        let issued = self
            .transport
            .issue_token(&TokenRequest::authorization_code(proof.code))
            .await
            .map_err(AuthError::at(AuthStage::Token))?;

        token_for(identity, issued.access_token)
    }
}

/// Decode the claims segment of a JWT without checking its signature.
pub fn decode_claims(token: &str) -> Result<TokenClaims, AuthError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_sig), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::MalformedToken("expected three segments".into()));
    };
    let raw = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::MalformedToken(e.to_string()))?;
    serde_json::from_slice(&raw).map_err(|e| AuthError::MalformedToken(e.to_string()))
}

/// Build token metadata and check it is bound to `identity`. The address
/// follows from the key, so matching keys is enough.
fn token_for(identity: &Identity, bearer: String) -> Result<AuthToken, AuthError> {
    let claims = decode_claims(&bearer)?;

    let public_key = claims.pk.to_ascii_lowercase();
    if public_key != identity.public_key() {
        return Err(AuthError::IdentityMismatch {
            expected: identity.public_key(),
            actual: public_key,
        });
    }

    Ok(AuthToken {
        bearer,
        address: identity.address().to_string(),
        public_key,
        issued_at: from_seconds(claims.iat)?,
        expires_at: from_seconds(claims.exp)?,
    })
}

fn from_seconds(secs: i64) -> Result<DateTime<Utc>, AuthError> {
    secs.checked_mul(1000)
        .ok_or_else(|| AuthError::MalformedToken(format!("timestamp {secs} out of range")))
        .and_then(|ms| from_millis(ms).map_err(|e| AuthError::MalformedToken(e.to_string())))
}
