// Copyright (c) 2026 Sigil Project. MIT License.
// See LICENSE for details.

//! # Sigil Client
//!
//! Embeddable client for the Sigil decentralized identity provider. The
//! provider lives in an embedded peer frame the host application owns;
//! this crate speaks the challenge-response protocol over that frame,
//! verifies the provider's identity assertions against a DID document,
//! and caches the resulting access token and public profile locally.
//!
//! ## Architecture
//!
//! The crate is split into modules that mirror the actual concerns of the
//! protocol:
//!
//! - **config** — Wire parameter names, store keys, state codes.
//! - **store** — The durable key-value capability hosts inject.
//! - **challenge** — Fresh challenge/nonce material per attempt.
//! - **did** — DID document model and controller-checked key resolution.
//! - **signature** — The injected verification capability, failing closed.
//! - **wire** — JSON envelopes shared with the provider.
//! - **channel** — Transport seam: origin filtering in, fire-and-forget out.
//! - **profile** — Public profile model and the versioned persisted cache.
//! - **redirect** — Registration redirect URL and handoff decoding.
//! - **session** — The [`AuthSession`] state machine that drives it all.
//!
//! ## Capability Injection
//!
//! The session owns no I/O. Storage, signature verification, and both
//! transport directions are traits the host implements, which keeps the
//! core testable with in-process doubles and portable across embeddings
//! (browser frame, WebView bridge, native IPC).
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//! use sigil_client::{AuthSession, MemoryKeyStore, SessionConfig};
//! # use sigil_client::{ChannelError, MessageSender, SignatureVerifier};
//! # use sigil_client::wire::OutboundMessage;
//! # struct MySender;
//! # #[async_trait::async_trait]
//! # impl MessageSender for MySender {
//! #     async fn send(&self, _m: &OutboundMessage) -> Result<(), ChannelError> { Ok(()) }
//! # }
//! # struct MyVerifier;
//! # impl SignatureVerifier for MyVerifier {
//! #     fn verify(&self, _k: &[u8], _s: &[u8], _m: &[u8]) -> bool { false }
//! # }
//!
//! # async fn run() -> Result<(), sigil_client::AuthError> {
//! let (events_tx, events_rx) = mpsc::channel(32);
//! let session = AuthSession::connect(
//!     SessionConfig {
//!         provider_origin: "https://id.example.com".to_string(),
//!         referrer: "https://host.example.com".to_string(),
//!     },
//!     Arc::new(MemoryKeyStore::new()),
//!     Arc::new(MyVerifier),
//!     Arc::new(MySender),
//!     events_rx,
//! );
//! // The host transport feeds `events_tx`; once connected:
//! if session.requires_registration().await? {
//!     if let Some(url) = session.register()? {
//!         // navigate the host page to `url`
//!     }
//! } else if let Some(profile) = session.authenticate().await? {
//!     println!("hello, {}", profile.display_name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod challenge;
pub mod channel;
pub mod config;
pub mod did;
pub mod profile;
pub mod redirect;
pub mod session;
pub mod signature;
pub mod store;
pub mod wire;

pub use challenge::Challenge;
pub use channel::{decode_inbound, ChannelError, ChannelEvent, MessageSender};
pub use did::{DidDocument, DidError, PublicKeyEntry};
pub use profile::PublicProfile;
pub use redirect::RedirectError;
pub use session::{AuthError, AuthSession, SessionConfig};
pub use signature::SignatureVerifier;
pub use store::{KeyStore, MemoryKeyStore};
