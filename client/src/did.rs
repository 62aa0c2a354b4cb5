//! # DID Document Model
//!
//! The provider asserts an identity with a W3C-style DID document: the
//! identity's `id` plus an ordered list of public key entries. During the
//! handshake the response names one of those keys by id; this module
//! resolves it and enforces the *controller invariant* — the resolved key
//! must be controlled by the document's own identity, not a third party.
//! A document that lists a foreign-controlled key is either malformed or
//! hostile, and either way the handshake aborts.
//!
//! Key material is passed through verbatim (base64-encoded SPKI DER as
//! supplied by the provider); decoding is the signature layer's job.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors resolving a signing key from a DID document.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DidError {
    /// No public key entry in the document carries the requested id.
    #[error("key '{0}' not found in DID document")]
    KeyNotFound(String),

    /// The matched key is controlled by a different identity than the
    /// document's own.
    #[error("key '{key_id}' is controlled by '{controller}', not by the identity '{id}'")]
    KeyNotControlled {
        /// The key id that was resolved.
        key_id: String,
        /// The controller the entry claims.
        controller: String,
        /// The DID document's own identity.
        id: String,
    },
}

// ---------------------------------------------------------------------------
// Document Model
// ---------------------------------------------------------------------------

/// One public key entry inside a [`DidDocument`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyEntry {
    /// Key identifier, referenced by the handshake response.
    pub id: String,

    /// The DID authorized to assert ownership of this key.
    pub controller: String,

    /// Base64-encoded public key material, passed through untouched.
    #[serde(rename = "publicKeyPem")]
    pub public_key_pem: String,
}

/// A DID document as supplied by the provider at authentication time.
///
/// Immutable once received; the client never mutates or re-serializes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidDocument {
    /// The DID this document describes.
    pub id: String,

    /// Ordered public key entries. Duplicate ids are a document
    /// malformation; resolution takes the first match and moves on.
    #[serde(rename = "publicKey")]
    pub public_keys: Vec<PublicKeyEntry>,
}

/// Resolves the key `key_id` from `doc`, enforcing the controller invariant.
///
/// First id match wins. Returns the entry's key material verbatim — no
/// decoding, no normalization.
///
/// # Errors
///
/// [`DidError::KeyNotFound`] when no entry matches, and
/// [`DidError::KeyNotControlled`] when the matched entry's controller is
/// not the document's own id.
pub fn resolve_signing_key<'a>(doc: &'a DidDocument, key_id: &str) -> Result<&'a str, DidError> {
    let entry = doc
        .public_keys
        .iter()
        .find(|entry| entry.id == key_id)
        .ok_or_else(|| DidError::KeyNotFound(key_id.to_string()))?;

    if entry.controller != doc.id {
        return Err(DidError::KeyNotControlled {
            key_id: key_id.to_string(),
            controller: entry.controller.clone(),
            id: doc.id.clone(),
        });
    }

    Ok(&entry.public_key_pem)
}
