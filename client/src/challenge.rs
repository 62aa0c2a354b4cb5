//! # Challenge Material
//!
//! Each authentication attempt is bound to a fresh `{challenge, nonce}`
//! pair. The provider signs the challenge to prove possession of the
//! identity's private key; the nonce ties the signed response back to the
//! attempt that issued it, so a captured response cannot be replayed into
//! a later handshake.
//!
//! Both identifiers are drawn from the OS CSPRNG and hex-encoded — 20
//! random bytes each, so collisions across a process lifetime are not a
//! practical concern.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::config::CHALLENGE_ID_BYTES;

/// A challenge/nonce pair for one authentication attempt.
///
/// Generated per attempt and persisted until consumed or invalidated. The
/// session enforces at most one in-flight pair: generating a new one
/// overwrites whatever was stored before.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Random value the provider must sign.
    pub challenge: String,

    /// Random value echoed back verbatim in the response.
    pub nonce: String,
}

impl Challenge {
    /// Generates a fresh challenge/nonce pair from the OS CSPRNG.
    pub fn generate() -> Self {
        Self {
            challenge: random_id(),
            nonce: random_id(),
        }
    }
}

/// Returns `CHALLENGE_ID_BYTES` of OS randomness as lowercase hex.
fn random_id() -> String {
    let mut bytes = [0u8; CHALLENGE_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
