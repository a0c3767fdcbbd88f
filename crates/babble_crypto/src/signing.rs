//! Deterministic secp256k1 signing and delegation proofs.
//!
//! Signatures are ECDSA over SHA-256 with RFC 6979 nonces, low-S
//! normalised, serialised as 64-byte `r || s` and base64-encoded. The same
//! identity and bytes always give the same signature.
//!
//! `sign_arbitrary` wraps a payload in the chain's "sign arbitrary data"
//! document so wallets and services can verify it without a transaction.

use base64::{engine::general_purpose::STANDARD, Engine};
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, VerifyingKey};
use serde::Serialize;
use serde_json::json;

use crate::canonical;
use crate::error::CryptoError;
use crate::identity::Identity;

/// Sign `bytes` with the identity's signing key; returns base64 `r || s`.
pub fn sign(identity: &Identity, bytes: &[u8]) -> String {
    let sig: Signature = identity.signing_key().sign(bytes);
    let sig = sig.normalize_s().unwrap_or(sig);
    STANDARD.encode(sig.to_bytes())
}

/// Verify a base64 signature against a compressed (or uncompressed) SEC1
/// public key.
pub fn verify(public_key: &[u8], bytes: &[u8], signature_b64: &str) -> Result<(), CryptoError> {
    let vk = VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let raw = STANDARD.decode(signature_b64)?;
    let sig = Signature::from_slice(&raw).map_err(|_| CryptoError::SignatureVerification)?;
    vk.verify(bytes, &sig)
        .map_err(|_| CryptoError::SignatureVerification)
}

/// Same as [`verify`], with the public key given as hex.
pub fn verify_hex(public_key_hex: &str, bytes: &[u8], signature_b64: &str) -> Result<(), CryptoError> {
    verify(&hex::decode(public_key_hex)?, bytes, signature_b64)
}

/// The sign-arbitrary-data document for `signer` over `payload`.
pub fn sign_doc(signer: &str, payload: &[u8]) -> serde_json::Value {
    json!({
        "chain_id": "",
        "account_number": "0",
        "sequence": "0",
        "fee": {
            "gas": "0",
            "amount": [],
        },
        "msgs": [
            {
                "type": "sign/MsgSignData",
                "value": {
                    "signer": signer,
                    "data": STANDARD.encode(payload),
                },
            },
        ],
        "memo": "",
    })
}

/// Sign `payload` wrapped in a canonical sign doc.
/// Returns `(base64(doc), base64(signature))`.
pub fn sign_arbitrary(identity: &Identity, payload: &[u8]) -> Result<(String, String), CryptoError> {
    let doc = canonical::to_vec(&sign_doc(identity.address(), payload))?;
    let signature = sign(identity, &doc);
    Ok((STANDARD.encode(&doc), signature))
}

// ── Delegation ────────────────────────────────────────────────────────────────

/// Proof that a delegate identity speaks for an account identity: the
/// delegate signs a sign doc whose payload is the account's public key (hex).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationProof {
    #[serde(skip)]
    pub signed_doc: Vec<u8>,
    pub signed_obj_base64: String,
    pub signature: String,
}

impl DelegationProof {
    pub fn create(delegate: &Identity, account_public_key_hex: &str) -> Result<Self, CryptoError> {
        let (signed_obj_base64, signature) =
            sign_arbitrary(delegate, account_public_key_hex.as_bytes())?;
        let signed_doc = STANDARD.decode(&signed_obj_base64)?;
        Ok(Self {
            signed_doc,
            signed_obj_base64,
            signature,
        })
    }

    /// Rebuild a proof received as `(signed_obj_base64, signature)`.
    pub fn from_parts(signed_obj_base64: &str, signature: &str) -> Result<Self, CryptoError> {
        Ok(Self {
            signed_doc: STANDARD.decode(signed_obj_base64)?,
            signed_obj_base64: signed_obj_base64.to_string(),
            signature: signature.to_string(),
        })
    }

    /// Check the signature against the delegate's compressed public key.
    pub fn verify(&self, delegate_public_key: &[u8]) -> Result<(), CryptoError> {
        verify(delegate_public_key, &self.signed_doc, &self.signature)
    }

    /// Verify, then check that the signed document binds `account_public_key_hex`.
    pub fn verify_binding(
        &self,
        delegate_public_key: &[u8],
        account_public_key_hex: &str,
    ) -> Result<(), CryptoError> {
        self.verify(delegate_public_key)?;
        let doc: serde_json::Value = serde_json::from_slice(&self.signed_doc)?;
        let data = doc["msgs"][0]["value"]["data"]
            .as_str()
            .ok_or_else(|| CryptoError::NonCanonical("sign doc has no data field".into()))?;
        if STANDARD.decode(data)? != account_public_key_hex.as_bytes() {
            return Err(CryptoError::SignatureVerification);
        }
        Ok(())
    }
}
