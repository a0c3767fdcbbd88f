//! Seams to the two external services.
//!
//! `AuthTransport` speaks to the challenge/response auth service and
//! `MailboxTransport` to the GraphQL relay. The client only depends on these
//! traits; `http` and `graphql` hold the reqwest implementations.

use async_trait::async_trait;
use thiserror::Error;

use babble_proto::api::{
    ChallengeRequest, ChallengeResponse, MailboxMessage, PublicKeyDetails, ProveRequest,
    ProveResponse, TokenRequest, TokenResponse,
};

mod graphql;
mod http;

pub use graphql::GraphQlMailbox;
pub use http::HttpAuthTransport;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{endpoint} returned status {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },
}

#[async_trait]
pub trait AuthTransport: Send + Sync {
    async fn request_challenge(
        &self,
        req: &ChallengeRequest,
    ) -> Result<ChallengeResponse, TransportError>;

    async fn prove(&self, req: &ProveRequest) -> Result<ProveResponse, TransportError>;

    async fn issue_token(&self, req: &TokenRequest) -> Result<TokenResponse, TransportError>;
}

#[async_trait]
pub trait MailboxTransport: Send + Sync {
    /// Messaging key registered for `address` on `chain_id`, if any.
    async fn lookup_public_key(
        &self,
        token: &str,
        address: &str,
        chain_id: &str,
    ) -> Result<Option<String>, TransportError>;

    async fn update_public_key(
        &self,
        token: &str,
        details: &PublicKeyDetails,
    ) -> Result<(), TransportError>;

    async fn dispatch_messages(
        &self,
        token: &str,
        contents: Vec<String>,
    ) -> Result<Vec<MailboxMessage>, TransportError>;

    async fn list_messages(&self, token: &str) -> Result<Vec<MailboxMessage>, TransportError>;

    /// Never called by the client: the relay does not support acknowledgement yet.
    async fn drop_messages(&self, token: &str, ids: &[String]) -> Result<Vec<String>, TransportError>;
}

/// Shared reqwest client with the configured timeout.
pub(crate) fn build_http_client(
    timeout: std::time::Duration,
) -> Result<reqwest::Client, TransportError> {
    Ok(reqwest::Client::builder()
        .use_rustls_tls()
        .user_agent(concat!("babble-client/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()?)
}

/// Read a response body, mapping non-success statuses and bad JSON to
/// `TransportError`.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned + Send>(
    endpoint: &str,
    res: reqwest::Response,
) -> Result<T, TransportError> {
    let status = res.status();
    let body = res.text().await?;
    if !status.is_success() {
        return Err(TransportError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|e| TransportError::MalformedResponse {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })
}
