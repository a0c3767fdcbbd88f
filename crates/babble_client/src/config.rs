//! Client configuration: service endpoints, timeouts and token policy.

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

pub const MAINNET_CHAIN_ID: &str = "fetchhub-4";
pub const TESTNET_CHAIN_ID: &str = "dorado-1";

pub const DEFAULT_AUTH_SERVER: &str = "https://accounts.fetch.ai/v1";
pub const DEFAULT_MAILBOX_SERVER: &str = "https://messaging.fetch-ai.network";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Tokens are renewed this long before they expire.
pub const DEFAULT_RENEWAL_BUFFER_SECS: i64 = 5 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub auth_server: String,
    pub mailbox_server: String,
    pub request_timeout_secs: u64,
    pub renewal_buffer_secs: i64,
    pub client_id: String,
    pub scope: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auth_server: DEFAULT_AUTH_SERVER.into(),
            mailbox_server: DEFAULT_MAILBOX_SERVER.into(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            renewal_buffer_secs: DEFAULT_RENEWAL_BUFFER_SECS,
            client_id: "agentverse".into(),
            scope: "av".into(),
        }
    }
}

impl ClientConfig {
    /// Defaults, overridden by `AUTH_SERVER`, `MEMORANDUM_SERVER` and
    /// `BABBLE_REQUEST_TIMEOUT_SECS` when set.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClientError> {
        let mut config = Self::default();
        if let Some(url) = lookup("AUTH_SERVER") {
            config.auth_server = url;
        }
        if let Some(url) = lookup("MEMORANDUM_SERVER") {
            config.mailbox_server = url;
        }
        if let Some(secs) = lookup("BABBLE_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = secs
                .parse()
                .map_err(|_| ClientError::Config(format!("invalid request timeout '{secs}'")))?;
        }
        Ok(config)
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    pub fn renewal_buffer(&self) -> Result<chrono::Duration, ClientError> {
        let secs = self.renewal_buffer_secs;
        if secs < 0 {
            return Err(ClientError::Config(format!("negative renewal buffer {secs}s")));
        }
        chrono::Duration::try_seconds(secs)
            .ok_or_else(|| ClientError::Config(format!("renewal buffer {secs}s out of range")))
    }
}
