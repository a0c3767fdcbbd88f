//! babble_client: authenticated relay client for the Babble protocol
//!
//! # Modules
//! - `client`   : `ProtocolClient`: registration, send, receive, high-water mark
//! - `auth`     : bearer-token lifecycle (challenge, verify, token, renewal)
//! - `transport`: auth and mailbox service seams plus their HTTP/GraphQL impls
//! - `config`   : endpoints, timeouts and chain ids
//! - `error`    : client error type

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod transport;

pub use auth::{AuthError, AuthSession, AuthState, AuthToken};
pub use client::{Delegation, DeliveredMessage, ProtocolClient, ReceiveBatch, ReceiveFailure};
pub use config::ClientConfig;
pub use error::ClientError;
pub use transport::{AuthTransport, MailboxTransport, TransportError};
