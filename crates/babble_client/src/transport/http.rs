use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use babble_proto::api::{
    ChallengeRequest, ChallengeResponse, ProveRequest, ProveResponse, TokenRequest, TokenResponse,
};

use super::{build_http_client, read_json, AuthTransport, TransportError};
use crate::config::ClientConfig;

const CHALLENGE_PATH: &str = "/auth/login/wallet/challenge";
const VERIFY_PATH: &str = "/auth/login/wallet/verify";
const TOKEN_PATH: &str = "/tokens";

/// REST client for the wallet-login flow of the auth service.
#[derive(Clone)]
pub struct HttpAuthTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_http_client(config.request_timeout())?,
            base_url: config.auth_server.trim_end_matches('/').to_string(),
        })
    }

    async fn post<B: Serialize + Sync, R: serde::de::DeserializeOwned + Send>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "auth request");
        let res = self.client.post(&url).json(body).send().await?;
        read_json(path, res).await
    }
}

#[async_trait]
impl AuthTransport for HttpAuthTransport {
    async fn request_challenge(
        &self,
        req: &ChallengeRequest,
    ) -> Result<ChallengeResponse, TransportError> {
        self.post(CHALLENGE_PATH, req).await
    }

    async fn prove(&self, req: &ProveRequest) -> Result<ProveResponse, TransportError> {
        self.post(VERIFY_PATH, req).await
    }

    async fn issue_token(&self, req: &TokenRequest) -> Result<TokenResponse, TransportError> {
        self.post(TOKEN_PATH, req).await
    }
}
