//! # Wire Protocol
//!
//! Message envelopes exchanged with the identity provider over the peer
//! channel. Everything is JSON, with field names fixed by the provider
//! protocol (camelCase on the wire, snake_case in Rust via serde renames).
//!
//! ## Envelope Shapes
//!
//! ```text
//! Lifecycle (provider → client):  {"state": 0 | 1}
//! Request   (client → provider):  {"action": "authenticate", "data": {challenge, nonce}}
//!                                 {"action": "getPublicProfile", "token": <access token>}
//! Reply     (provider → client):  {"action": <same action name>, "data": <payload>}
//! ```
//!
//! Lifecycle notifications are pushed by the provider independently of any
//! request. Replies are correlated to requests by action name — the
//! protocol allows at most one outstanding request per action, so no
//! correlation id is needed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::challenge::Challenge;
use crate::config::{STATE_AUTHENTICATED, STATE_LOGGED_OUT};
use crate::did::DidDocument;

// ---------------------------------------------------------------------------
// Session State
// ---------------------------------------------------------------------------

/// Coarse application state reported by the provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No end-user identity exists on the provider: registration required.
    LoggedOut,
    /// An end-user is authenticated on the provider side.
    Authenticated,
}

impl SessionState {
    /// Maps a wire state code to a [`SessionState`]. Unknown codes return
    /// `None` and are logged and ignored by the session.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            STATE_LOGGED_OUT => Some(SessionState::LoggedOut),
            STATE_AUTHENTICATED => Some(SessionState::Authenticated),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Request/reply action kinds. Replies are keyed by this, one pending
/// slot per kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// Challenge-response authentication.
    Authenticate,
    /// Public profile retrieval with the current access token.
    GetPublicProfile,
}

impl Action {
    /// The wire name of this action.
    pub fn name(self) -> &'static str {
        match self {
            Action::Authenticate => "authenticate",
            Action::GetPublicProfile => "getPublicProfile",
        }
    }

    /// Parses a wire action name. Unknown names return `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "authenticate" => Some(Action::Authenticate),
            "getPublicProfile" => Some(Action::GetPublicProfile),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// A request sent to the provider.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum OutboundMessage {
    /// Opens a handshake: carries the fresh challenge/nonce pair.
    Authenticate {
        /// The challenge material the provider must sign.
        data: Challenge,
    },
    /// Requests the public profile for the authenticated identity.
    GetPublicProfile {
        /// The access token from the completed handshake.
        token: String,
    },
}

impl OutboundMessage {
    /// The action kind this request corresponds to.
    pub fn action(&self) -> Action {
        match self {
            OutboundMessage::Authenticate { .. } => Action::Authenticate,
            OutboundMessage::GetPublicProfile { .. } => Action::GetPublicProfile,
        }
    }
}

/// A message received from the provider.
///
/// Untagged: a lifecycle notification carries `state`, an action reply
/// carries `action`. Anything else fails to parse and is discarded at the
/// transport boundary.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum InboundMessage {
    /// Provider-pushed lifecycle notification.
    Lifecycle {
        /// Raw state code; see [`SessionState::from_code`].
        state: i64,
    },
    /// Reply to a previously sent request.
    Reply {
        /// Wire action name. Kept as a string so unknown actions can be
        /// logged rather than rejected at parse time.
        action: String,
        /// Reply payload; absent or null when the provider has nothing
        /// to return.
        #[serde(default)]
        data: Option<Value>,
    },
}

// ---------------------------------------------------------------------------
// Auth Response
// ---------------------------------------------------------------------------

/// The provider's answer to an authentication challenge.
///
/// Arrives either as the `data` payload of an `authenticate` reply or
/// URL-encoded on the redirect return. Invalid unless `nonce` matches the
/// locally stored nonce exactly.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// Echo of the nonce from the challenge that started this attempt.
    pub nonce: String,

    /// Id of the signing key within `did_doc`.
    pub key: String,

    /// The DID document asserting the identity and its keys.
    pub did_doc: DidDocument,

    /// The challenge value, signed (base64).
    pub challenge: String,

    /// Opaque access token; persisted only after full validation.
    pub access_token: String,
}
