//! # Key-Value Store Capability
//!
//! The client persists a handful of string values between page loads and
//! process restarts: the in-flight challenge and nonce, the access token,
//! and the cached public profile. Hosts supply whatever durable storage
//! they have (browser local storage, a settings file, an OS keychain) by
//! implementing [`KeyStore`].
//!
//! ## Consistency Model
//!
//! The store is deliberately primitive: `get`/`set`/`remove`, string
//! values, last-write-wins, no transactions. The session layer is written
//! so that the one sequence that must *look* atomic to a concurrent
//! reader — "write token, clear nonce and challenge" — is ordered so the
//! token write lands first and `is_authenticated()` keys on the token
//! alone.

use std::collections::HashMap;

use parking_lot::RwLock;

// ---------------------------------------------------------------------------
// KeyStore
// ---------------------------------------------------------------------------

/// Durable string key-value storage supplied by the host.
///
/// Implementations must be safe to call from the session's inbound pump
/// task and from host threads concurrently, hence `Send + Sync`. All
/// operations are synchronous and infallible; a host whose backing store
/// can fail should degrade to in-memory behavior rather than panic.
pub trait KeyStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str);

    /// Removes `key` and its value. Removing an absent key is a no-op.
    fn remove(&self, key: &str);
}

// ---------------------------------------------------------------------------
// MemoryKeyStore
// ---------------------------------------------------------------------------

/// An in-memory [`KeyStore`] backed by a `RwLock<HashMap>`.
///
/// Suitable for tests and for hosts that accept losing the session on
/// process exit. Cloning is not provided; share via `Arc`.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.write().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }
}
