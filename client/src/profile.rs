//! # Public Profile & Cache
//!
//! The public profile is the caller-visible payoff of authentication: a
//! display name, an avatar reference, and whatever extra fields the
//! provider attaches. The client caches it twice — in memory for the
//! lifetime of a session instance, and in the key-value store across
//! instances — and invalidates the persisted copy whenever the provider
//! reports the access token invalid.
//!
//! ## Cache Format
//!
//! The persisted entry is versioned JSON:
//!
//! ```text
//! {"version": 1, "profile": {"displayName": "...", "avatar": "...", ...}}
//! ```
//!
//! Loading validates the version and the required profile fields. A
//! malformed or version-mismatched entry is evicted on sight and reported
//! to the caller, who falls back to a fresh fetch — stale garbage never
//! masquerades as a profile.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::{PROFILE_CACHE_VERSION, PUBLIC_PROFILE_KEY};
use crate::store::KeyStore;

/// Wire marker the provider uses to report a rejected access token in a
/// profile reply.
pub(crate) const INVALID_TOKEN_MARKER: &str = "Invalid access token";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors loading the persisted profile cache.
///
/// These never escape the session: a bad cache entry is evicted and the
/// profile is re-fetched from the provider.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProfileCacheError {
    /// The stored entry is not valid JSON or is missing required fields.
    #[error("persisted profile cache is malformed")]
    Malformed,

    /// The stored entry was written by an incompatible client version.
    #[error("persisted profile cache has unsupported version {0}")]
    UnsupportedVersion(u32),
}

// ---------------------------------------------------------------------------
// Public Profile
// ---------------------------------------------------------------------------

/// An identity's public profile as supplied by the provider.
///
/// `display_name` and `avatar` are required; any further fields the
/// provider sends ride along untouched in `extra` and survive the cache
/// round-trip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublicProfile {
    /// Human-readable name chosen by the identity's owner.
    #[serde(rename = "displayName")]
    pub display_name: String,

    /// Opaque avatar reference (URL or identifier, provider-defined).
    pub avatar: String,

    /// Provider-defined extra fields, passed through verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// How to act on the payload of a `getPublicProfile` reply.
#[derive(Clone, Debug, PartialEq)]
pub enum ProfileReply {
    /// A well-formed profile.
    Profile(PublicProfile),
    /// The provider rejected the presented access token.
    InvalidAccessToken,
    /// The payload is neither a profile nor a recognized error.
    Unusable,
}

/// Classifies a profile reply payload.
///
/// The provider signals a rejected token in-band with an `error` field;
/// everything else is expected to parse as a [`PublicProfile`].
pub fn interpret_reply(payload: &Value) -> ProfileReply {
    if payload.get("error").and_then(Value::as_str) == Some(INVALID_TOKEN_MARKER) {
        return ProfileReply::InvalidAccessToken;
    }
    match serde_json::from_value(payload.clone()) {
        Ok(profile) => ProfileReply::Profile(profile),
        Err(err) => {
            debug!(%err, "profile reply payload did not validate");
            ProfileReply::Unusable
        }
    }
}

// ---------------------------------------------------------------------------
// Persisted Cache
// ---------------------------------------------------------------------------

/// Versioned envelope for the persisted profile cache.
#[derive(Debug, Serialize, Deserialize)]
struct CachedProfile {
    version: u32,
    profile: PublicProfile,
}

/// Loads the persisted profile, validating format and version.
///
/// Returns `Ok(None)` when nothing is cached. On any validation failure
/// the entry is removed from the store before the error is returned, so a
/// bad entry is hit at most once.
pub fn load_cached(store: &dyn KeyStore) -> Result<Option<PublicProfile>, ProfileCacheError> {
    let Some(raw) = store.get(PUBLIC_PROFILE_KEY) else {
        return Ok(None);
    };

    let entry: CachedProfile = match serde_json::from_str(&raw) {
        Ok(entry) => entry,
        Err(err) => {
            debug!(%err, "evicting malformed profile cache entry");
            store.remove(PUBLIC_PROFILE_KEY);
            return Err(ProfileCacheError::Malformed);
        }
    };

    if entry.version != PROFILE_CACHE_VERSION {
        debug!(version = entry.version, "evicting profile cache entry with unsupported version");
        store.remove(PUBLIC_PROFILE_KEY);
        return Err(ProfileCacheError::UnsupportedVersion(entry.version));
    }

    Ok(Some(entry.profile))
}

/// Persists `profile` under the versioned cache key.
pub fn store_cached(store: &dyn KeyStore, profile: &PublicProfile) {
    let entry = CachedProfile {
        version: PROFILE_CACHE_VERSION,
        profile: profile.clone(),
    };
    // CachedProfile serialization cannot fail: it is a struct of strings
    // and already-valid JSON values.
    if let Ok(raw) = serde_json::to_string(&entry) {
        store.set(PUBLIC_PROFILE_KEY, &raw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKeyStore;

    fn sample_profile() -> PublicProfile {
        let mut extra = Map::new();
        extra.insert("pronouns".to_string(), Value::String("they/them".to_string()));
        PublicProfile {
            display_name: "Ada".to_string(),
            avatar: "https://cdn.example.com/ada.glb".to_string(),
            extra,
        }
    }

    #[test]
    fn cache_roundtrip_preserves_extra_fields() {
        let store = MemoryKeyStore::new();
        let profile = sample_profile();
        store_cached(&store, &profile);
        let loaded = load_cached(&store).unwrap().unwrap();
        assert_eq!(loaded, profile);
        assert_eq!(
            loaded.extra.get("pronouns").and_then(Value::as_str),
            Some("they/them")
        );
    }

    #[test]
    fn empty_store_loads_none() {
        let store = MemoryKeyStore::new();
        assert_eq!(load_cached(&store), Ok(None));
    }

    #[test]
    fn malformed_entry_is_evicted() {
        let store = MemoryKeyStore::new();
        store.set(PUBLIC_PROFILE_KEY, "{not json");
        assert_eq!(load_cached(&store), Err(ProfileCacheError::Malformed));
        // Entry is gone; the next load is a clean miss.
        assert_eq!(load_cached(&store), Ok(None));
    }

    #[test]
    fn unversioned_legacy_entry_is_evicted() {
        let store = MemoryKeyStore::new();
        store.set(
            PUBLIC_PROFILE_KEY,
            r#"{"displayName": "Ada", "avatar": "a"}"#,
        );
        assert_eq!(load_cached(&store), Err(ProfileCacheError::Malformed));
        assert_eq!(store.get(PUBLIC_PROFILE_KEY), None);
    }

    #[test]
    fn future_version_is_evicted() {
        let store = MemoryKeyStore::new();
        store.set(
            PUBLIC_PROFILE_KEY,
            r#"{"version": 99, "profile": {"displayName": "Ada", "avatar": "a"}}"#,
        );
        assert_eq!(
            load_cached(&store),
            Err(ProfileCacheError::UnsupportedVersion(99))
        );
        assert_eq!(store.get(PUBLIC_PROFILE_KEY), None);
    }

    #[test]
    fn reply_with_profile_classifies_as_profile() {
        let payload = serde_json::json!({"displayName": "Ada", "avatar": "a"});
        assert!(matches!(interpret_reply(&payload), ProfileReply::Profile(_)));
    }

    #[test]
    fn reply_with_token_error_classifies_as_invalid() {
        let payload = serde_json::json!({"error": "Invalid access token"});
        assert_eq!(interpret_reply(&payload), ProfileReply::InvalidAccessToken);
    }

    #[test]
    fn reply_missing_required_fields_is_unusable() {
        let payload = serde_json::json!({"avatar": "a"});
        assert_eq!(interpret_reply(&payload), ProfileReply::Unusable);
    }
}
