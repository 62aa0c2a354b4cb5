//! # Protocol Constants
//!
//! Every magic string in the Sigil client protocol lives here: wire
//! parameter names, persistent store keys, and lifecycle state codes.
//! These values are shared with the identity provider — changing one side
//! without the other breaks the handshake, so treat this file as part of
//! the wire contract.

// ---------------------------------------------------------------------------
// Redirect Query Parameters
// ---------------------------------------------------------------------------

/// Outbound: the challenge the provider must sign during registration.
pub const REGISTER_PARAM: &str = "identityRequest";

/// Outbound: the nonce binding one handshake attempt.
pub const NONCE_PARAM: &str = "nonce";

/// Outbound: the host origin the provider redirects back to.
pub const REFERRER_PARAM: &str = "referrer";

/// Inbound: URL-encoded JSON [`AuthResponse`](crate::wire::AuthResponse)
/// carried back on the redirect return.
pub const AUTH_RESPONSE_PARAM: &str = "authResponse";

// ---------------------------------------------------------------------------
// Lifecycle State Codes
// ---------------------------------------------------------------------------

/// The provider reports no authenticated end-user: registration required.
pub const STATE_LOGGED_OUT: i64 = 0;

/// The provider reports an authenticated end-user.
pub const STATE_AUTHENTICATED: i64 = 1;

// ---------------------------------------------------------------------------
// Persistent Store Keys
// ---------------------------------------------------------------------------
//
// All keys are namespaced under `sigil.` so the client never collides with
// the host application's own use of the same store.

/// In-flight challenge value, pending a signed response.
pub const CHALLENGE_KEY: &str = "sigil.challenge";

/// In-flight nonce value, pending a matching response.
pub const NONCE_KEY: &str = "sigil.nonce";

/// The access token issued on a successful handshake.
pub const ACCESS_TOKEN_KEY: &str = "sigil.access-token";

/// Cached public profile (versioned JSON, see [`crate::profile`]).
pub const PUBLIC_PROFILE_KEY: &str = "sigil.profile.public";

// ---------------------------------------------------------------------------
// Sizes & Versions
// ---------------------------------------------------------------------------

/// Random bytes per challenge/nonce identifier (hex-encoded on the wire).
pub const CHALLENGE_ID_BYTES: usize = 20;

/// Current on-disk format version of the persisted profile cache.
pub const PROFILE_CACHE_VERSION: u32 = 1;
