//! # Signature Verification Capability
//!
//! The client does not implement signature verification itself — the host
//! injects it. The fixed scheme is RSASSA-PKCS1-v1_5 over SHA-256: the
//! key material resolved from the DID document is base64-encoded SPKI
//! DER, and the signed challenge arrives base64-encoded as well.
//!
//! ## Failing Closed
//!
//! Verification answers `bool`, never a structured error. A malformed
//! key, a malformed signature, and a genuinely invalid signature are all
//! just "no" — handing the protocol (or an attacker probing it) a reason
//! for the failure buys nothing and leaks implementation detail. The
//! base64 decoding happens here, before the capability is consulted, so
//! every implementation inherits the same fail-closed behavior.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::debug;

/// Host-injected signature verification over raw bytes.
///
/// * `public_key_der` — SPKI DER key material, already base64-decoded.
/// * `signature` — raw signature bytes.
/// * `message` — the exact bytes that were signed.
///
/// Returns `true` only for a valid RSASSA-PKCS1-v1_5 / SHA-256 signature.
/// Implementations must return `false` for keys they cannot parse rather
/// than panicking or erroring.
pub trait SignatureVerifier: Send + Sync {
    /// Verifies `signature` over `message` under `public_key_der`.
    fn verify(&self, public_key_der: &[u8], signature: &[u8], message: &[u8]) -> bool;
}

/// Verifies a signed challenge in its wire encoding.
///
/// Decodes the base64 key material and signature, then delegates to the
/// capability. Any decoding failure verifies as `false` — observably
/// identical to a bad signature.
pub fn verify_encoded(
    verifier: &dyn SignatureVerifier,
    public_key_b64: &str,
    signature_b64: &str,
    message: &str,
) -> bool {
    let key = match BASE64.decode(public_key_b64) {
        Ok(key) => key,
        Err(_) => {
            debug!("signature check failed: key material is not valid base64");
            return false;
        }
    };
    let signature = match BASE64.decode(signature_b64) {
        Ok(sig) => sig,
        Err(_) => {
            debug!("signature check failed: signature is not valid base64");
            return false;
        }
    };
    verifier.verify(&key, &signature, message.as_bytes())
}
