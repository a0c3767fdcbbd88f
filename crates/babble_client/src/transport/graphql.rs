use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use babble_proto::api::{
    DispatchData, DispatchVariables, DropData, DropVariables, GraphQlRequest, GraphQlResponse,
    InputMessage, LookupData, LookupVariables, MailboxData, MailboxMessage, PublicKeyDetails,
    UpdatePublicKeyVariables,
};

use super::{build_http_client, read_json, MailboxTransport, TransportError};
use crate::config::ClientConfig;

const LOOKUP_PUBLIC_KEY: &str = r#"
query Query($address: String!, $chainId: String!) {
  publicKey(address: $address, channelId: MESSAGING, chainId: $chainId) {
    publicKey
  }
}"#;

const UPDATE_PUBLIC_KEY: &str = r#"
mutation Mutation($publicKeyDetails: InputPublicKey!) {
  updatePublicKey(publicKeyDetails: $publicKeyDetails) {
    publicKey
    privacySetting
    readReceipt
  }
}"#;

const DISPATCH_MESSAGES: &str = r#"
mutation Mutation($messages: [InputMessage!]!) {
  dispatchMessages(messages: $messages) {
    id
    sender
    target
    contents
    expiryTimestamp
    commitTimestamp
  }
}"#;

const LIST_MESSAGES: &str = r#"
query Messages {
  mailbox {
    messages {
      id
      groupId
      expiryTimestamp
      contents
      commitTimestamp
      sender
      target
    }
  }
}"#;

const DROP_MESSAGES: &str = r#"
mutation Mutation($ids: [ID!]!) {
  dropMessages(ids: $ids) {
    id
  }
}"#;

/// GraphQL client for the mailbox relay.
#[derive(Clone)]
pub struct GraphQlMailbox {
    client: reqwest::Client,
    endpoint: String,
}

impl GraphQlMailbox {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_http_client(config.request_timeout())?,
            endpoint: format!("{}/graphql", config.mailbox_server.trim_end_matches('/')),
        })
    }

    async fn execute<V: Serialize + Send + Sync, T: DeserializeOwned + Send>(
        &self,
        token: &str,
        query: &str,
        variables: V,
    ) -> Result<T, TransportError> {
        debug!(endpoint = %self.endpoint, "graphql request");
        let res = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, format!("bearer {token}"))
            .json(&GraphQlRequest { query, variables })
            .send()
            .await?;
        let body: GraphQlResponse<T> = read_json(&self.endpoint, res).await?;
        if !body.errors.is_empty() {
            let messages: Vec<String> = body.errors.into_iter().map(|e| e.message).collect();
            return Err(TransportError::GraphQl(messages.join("; ")));
        }
        body.data.ok_or_else(|| TransportError::MalformedResponse {
            endpoint: self.endpoint.clone(),
            reason: "response has neither data nor errors".into(),
        })
    }
}

#[async_trait]
impl MailboxTransport for GraphQlMailbox {
    async fn lookup_public_key(
        &self,
        token: &str,
        address: &str,
        chain_id: &str,
    ) -> Result<Option<String>, TransportError> {
        let vars = LookupVariables {
            address: address.to_string(),
            chain_id: chain_id.to_string(),
        };
        let data: LookupData = self.execute(token, LOOKUP_PUBLIC_KEY, vars).await?;
        Ok(data.public_key.map(|record| record.public_key))
    }

    async fn update_public_key(
        &self,
        token: &str,
        details: &PublicKeyDetails,
    ) -> Result<(), TransportError> {
        let vars = UpdatePublicKeyVariables {
            public_key_details: details.clone(),
        };
        let _: serde_json::Value = self.execute(token, UPDATE_PUBLIC_KEY, vars).await?;
        Ok(())
    }

    async fn dispatch_messages(
        &self,
        token: &str,
        contents: Vec<String>,
    ) -> Result<Vec<MailboxMessage>, TransportError> {
        let vars = DispatchVariables {
            messages: contents
                .into_iter()
                .map(|contents| InputMessage { contents })
                .collect(),
        };
        let data: DispatchData = self.execute(token, DISPATCH_MESSAGES, vars).await?;
        Ok(data.dispatch_messages)
    }

    async fn list_messages(&self, token: &str) -> Result<Vec<MailboxMessage>, TransportError> {
        let data: MailboxData = self
            .execute(token, LIST_MESSAGES, serde_json::Value::Null)
            .await?;
        Ok(data.mailbox.messages)
    }

    async fn drop_messages(&self, token: &str, ids: &[String]) -> Result<Vec<String>, TransportError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let vars = DropVariables { ids: ids.to_vec() };
        let data: DropData = self.execute(token, DROP_MESSAGES, vars).await?;
        Ok(data.drop_messages.into_iter().map(|r| r.id).collect())
    }
}
