//! babble_crypto: identities and primitives for the Babble messaging protocol
//!
//! # Module layout
//! - `identity` : seed-derived secp256k1 identity (signing + encryption keys)
//! - `address`  : bech32 addresses and prefix validation
//! - `hash`     : SHA-256 / RIPEMD-160 helpers
//! - `canonical`: canonical JSON encoding for signed documents
//! - `signing`  : deterministic ECDSA, sign-arbitrary docs, delegation proofs
//! - `ecies`    : secp256k1 integrated encryption (envelope ciphertexts)
//! - `error`    : unified error type

pub mod address;
pub mod canonical;
pub mod ecies;
pub mod error;
pub mod hash;
pub mod identity;
pub mod signing;

pub use error::CryptoError;
pub use identity::Identity;
pub use signing::DelegationProof;
