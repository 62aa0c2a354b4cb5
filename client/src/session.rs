//! # Auth Session
//!
//! The protocol state machine. An [`AuthSession`] coordinates the
//! challenge-response handshake with the identity provider, caches the
//! resulting access token and public profile, and evicts both when the
//! provider reports the token invalid.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized ──connected──▶ Ready ──lifecycle 0──▶ RegistrationRequired
//!                                │  ──lifecycle 1──▶ Authenticated
//!                                └── authenticate() ─▶ Authenticating ─▶ Authenticated
//! ```
//!
//! Public operations suspend on the readiness gate until the transport
//! reports it is connected; readiness fires at most once per session.
//!
//! ## Single Actor
//!
//! All inbound traffic is consumed by one spawned pump task, one event at
//! a time in arrival order — protocol state is never mutated from two
//! places at once. Operations that need a peer reply park on a `oneshot`
//! slot keyed by action kind; the pump fills the slot when the matching
//! reply arrives. A repeated call while one is outstanding joins the
//! in-flight outcome instead of issuing a duplicate wire message
//! (coalescing is per action kind, so an `authenticate` and a
//! `getPublicProfile` can be in flight simultaneously).
//!
//! ## Token Persistence Policy
//!
//! The access token is persisted only after the nonce check and the
//! signature check both pass. The nonce and challenge are consumed on
//! every completed validation attempt, pass or fail, so challenge
//! material is single-use.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex as AsyncMutex};
use tracing::{debug, info, warn};
use url::Url;

use crate::challenge::Challenge;
use crate::channel::{ChannelError, ChannelEvent, MessageSender};
use crate::config::{ACCESS_TOKEN_KEY, CHALLENGE_KEY, NONCE_KEY, PUBLIC_PROFILE_KEY};
use crate::did::{self, DidError};
use crate::profile::{self, ProfileReply, PublicProfile};
use crate::redirect::{self, RedirectError};
use crate::signature::{verify_encoded, SignatureVerifier};
use crate::store::KeyStore;
use crate::wire::{Action, AuthResponse, InboundMessage, OutboundMessage, SessionState};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by session operations.
///
/// None of these are fatal to the session: after any failure the session
/// remains usable for subsequent calls. All variants are `Clone` so that
/// coalesced callers can share a single outcome.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The returned nonce does not match the locally stored nonce; the
    /// response belongs to a different (or replayed) attempt.
    #[error("returned nonce does not match the in-flight attempt")]
    NonceMismatch,

    /// The signed challenge failed verification.
    #[error("challenge signature verification failed")]
    AuthenticationFailed,

    /// The operation requires an access token and none is persisted.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The provider returned no usable profile.
    #[error("public profile unavailable")]
    ProfileUnavailable,

    /// The provider rejected the presented access token. The local token
    /// and cached profile have been evicted; re-run registration or
    /// authentication.
    #[error("provider rejected the access token")]
    InvalidAccessToken,

    /// An authorization response arrived but did not parse.
    #[error("authorization response is malformed: {0}")]
    MalformedResponse(String),

    /// Signing-key resolution against the DID document failed.
    #[error(transparent)]
    Did(#[from] DidError),

    /// The transport failed or went away.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The redirect contract was violated (bad origin, bad handoff).
    #[error(transparent)]
    Redirect(#[from] RedirectError),
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Deployment-specific session parameters.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Origin of the identity provider, e.g. `https://id.example.com`.
    /// Also the target of the registration redirect.
    pub provider_origin: String,

    /// The host origin the provider redirects back to after registration.
    pub referrer: String,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Shared outcome of a coalesced profile-producing operation.
type OpOutcome = Result<Option<PublicProfile>, AuthError>;

struct SessionInner {
    config: SessionConfig,
    store: Arc<dyn KeyStore>,
    verifier: Arc<dyn SignatureVerifier>,
    sender: Arc<dyn MessageSender>,
    /// Flips to `true` once the transport reports connected; never back.
    ready: watch::Receiver<bool>,
    /// `None` until the first lifecycle notification, then the current
    /// "registration required" answer.
    registration: watch::Receiver<Option<bool>>,
    /// In-memory profile memo for this session instance.
    profile: RwLock<Option<PublicProfile>>,
    /// One pending reply slot per action kind, filled by the pump.
    pending_replies: Mutex<HashMap<Action, oneshot::Sender<Option<Value>>>>,
    /// One in-flight operation per action kind; later callers subscribe.
    in_flight: AsyncMutex<HashMap<Action, broadcast::Sender<OpOutcome>>>,
}

/// An authenticated session with the identity provider.
///
/// Construct with [`AuthSession::connect`], injecting the four
/// capabilities the protocol needs: durable storage, signature
/// verification, the outbound message sender, and the inbound event
/// stream. Cloning is cheap and clones share all state.
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<SessionInner>,
}

impl AuthSession {
    /// Creates a session and spawns its inbound pump on the current tokio
    /// runtime.
    ///
    /// The host owns the sending half of `events` and must deliver
    /// [`ChannelEvent::Connected`] once the transport is up, followed by
    /// every origin-checked provider message in arrival order.
    pub fn connect(
        config: SessionConfig,
        store: Arc<dyn KeyStore>,
        verifier: Arc<dyn SignatureVerifier>,
        sender: Arc<dyn MessageSender>,
        events: mpsc::Receiver<ChannelEvent>,
    ) -> Self {
        let (ready_tx, ready_rx) = watch::channel(false);
        let (registration_tx, registration_rx) = watch::channel(None);

        let inner = Arc::new(SessionInner {
            config,
            store,
            verifier,
            sender,
            ready: ready_rx,
            registration: registration_rx,
            profile: RwLock::new(None),
            pending_replies: Mutex::new(HashMap::new()),
            in_flight: AsyncMutex::new(HashMap::new()),
        });

        tokio::spawn(run_pump(Arc::clone(&inner), events, ready_tx, registration_tx));

        AuthSession { inner }
    }

    // -- public operations --------------------------------------------------

    /// Whether an access token is persisted locally.
    ///
    /// Token-presence check only: freshness is discovered lazily, when
    /// the provider rejects a profile request.
    pub fn is_authenticated(&self) -> bool {
        self.inner.store.get(ACCESS_TOKEN_KEY).is_some()
    }

    /// Whether the end-user must register with the provider first.
    ///
    /// Suspends until the provider has reported its state at least once;
    /// thereafter answers immediately from the cached value.
    pub async fn requires_registration(&self) -> Result<bool, AuthError> {
        let mut registration = self.inner.registration.clone();
        let status = registration
            .wait_for(|status| status.is_some())
            .await
            .map_err(|_| ChannelError::Closed)?;
        Ok(*status == Some(true))
    }

    /// Prepares the full-page registration redirect.
    ///
    /// Returns `Ok(None)` — a no-op — unless the provider has reported
    /// that registration is required. Otherwise persists a fresh
    /// challenge/nonce pair (displacing any prior unconsumed one) and
    /// returns the URL the host must navigate to. Control leaves the
    /// process at that point; the response comes back through
    /// [`resume`](Self::resume).
    pub fn register(&self) -> Result<Option<Url>, AuthError> {
        if *self.inner.registration.borrow() != Some(true) {
            return Ok(None);
        }
        let challenge = self.issue_challenge();
        let url = redirect::registration_url(
            &self.inner.config.provider_origin,
            &challenge,
            &self.inner.config.referrer,
        )?;
        info!("registration redirect prepared; host must navigate");
        Ok(Some(url))
    }

    /// Runs the challenge-response handshake over the peer channel.
    ///
    /// Issues and persists a fresh challenge, sends the `authenticate`
    /// request, and suspends until the provider replies. A concurrent
    /// call while one is outstanding joins the same in-flight outcome
    /// rather than issuing a second challenge.
    ///
    /// Returns `Ok(None)` when the provider's reply carried no
    /// authorization response (the benign no-op); `Ok(Some(profile))` on
    /// a fully validated handshake.
    pub async fn authenticate(&self) -> Result<Option<PublicProfile>, AuthError> {
        self.await_ready().await?;
        let session = self.clone();
        self.coalesced(Action::Authenticate, move || async move {
            let challenge = session.issue_challenge();
            let payload = session
                .request(
                    Action::Authenticate,
                    OutboundMessage::Authenticate { data: challenge },
                )
                .await?;
            let Some(payload) = payload else {
                return Ok(None);
            };
            if payload.is_null() {
                return Ok(None);
            }
            let response: AuthResponse = serde_json::from_value(payload)
                .map_err(|err| AuthError::MalformedResponse(err.to_string()))?;
            session.complete_handshake(&response).await.map(Some)
        })
        .await
    }

    /// Consumes a redirect-return handoff captured by the host.
    ///
    /// `handoff` is whatever query string (or full URL) the host found on
    /// re-entry. Returns `Ok(None)` when it carries no authorization
    /// response. Otherwise waits for transport readiness and runs the
    /// same handshake validation as [`authenticate`](Self::authenticate);
    /// a concurrent `authenticate()` call coalesces onto this outcome.
    pub async fn resume(&self, handoff: &str) -> Result<Option<PublicProfile>, AuthError> {
        let Some(response) = redirect::parse_handoff(handoff)? else {
            return Ok(None);
        };
        self.await_ready().await?;
        let session = self.clone();
        self.coalesced(Action::Authenticate, move || async move {
            session.complete_handshake(&response).await.map(Some)
        })
        .await
    }

    /// Returns the public profile for the authenticated identity.
    ///
    /// Answered from the in-memory memo, then the persisted cache, and
    /// only then from the provider. Fails with
    /// [`AuthError::NotAuthenticated`] when no access token is persisted.
    pub async fn get_public_profile(&self) -> Result<PublicProfile, AuthError> {
        self.await_ready().await?;
        if !self.is_authenticated() {
            return Err(AuthError::NotAuthenticated);
        }

        if let Some(profile) = self.inner.profile.read().clone() {
            return Ok(profile);
        }

        match profile::load_cached(self.inner.store.as_ref()) {
            Ok(Some(profile)) => {
                *self.inner.profile.write() = Some(profile.clone());
                return Ok(profile);
            }
            Ok(None) => {}
            // A bad cache entry was already evicted; fall through to a
            // fresh fetch.
            Err(err) => debug!(%err, "profile cache unusable; fetching a fresh copy"),
        }

        let session = self.clone();
        let outcome = self
            .coalesced(Action::GetPublicProfile, move || async move {
                session.refresh_public_profile().await.map(Some)
            })
            .await?;
        outcome.ok_or(AuthError::ProfileUnavailable)
    }

    /// Clears all local session state: access token, persisted profile,
    /// in-memory memo. Purely local — the provider is not notified.
    pub fn logout(&self) {
        self.inner.store.remove(ACCESS_TOKEN_KEY);
        self.inner.store.remove(PUBLIC_PROFILE_KEY);
        *self.inner.profile.write() = None;
        info!("logged out; local session state cleared");
    }

    // -- internals ----------------------------------------------------------

    /// Suspends until the transport has reported connected.
    async fn await_ready(&self) -> Result<(), AuthError> {
        let mut ready = self.inner.ready.clone();
        ready
            .wait_for(|connected| *connected)
            .await
            .map(|_| ())
            .map_err(|_| ChannelError::Closed.into())
    }

    /// Generates and persists a fresh challenge/nonce pair. A new pair
    /// always displaces any prior unconsumed one.
    fn issue_challenge(&self) -> Challenge {
        let challenge = Challenge::generate();
        self.inner.store.set(CHALLENGE_KEY, &challenge.challenge);
        self.inner.store.set(NONCE_KEY, &challenge.nonce);
        challenge
    }

    /// Sends `message` and suspends until the reply for `action` arrives.
    async fn request(
        &self,
        action: Action,
        message: OutboundMessage,
    ) -> Result<Option<Value>, AuthError> {
        let (tx, rx) = oneshot::channel();
        self.inner.pending_replies.lock().insert(action, tx);

        if let Err(err) = self.inner.sender.send(&message).await {
            self.inner.pending_replies.lock().remove(&action);
            return Err(err.into());
        }

        rx.await.map_err(|_| ChannelError::Closed.into())
    }

    /// Validates an authorization response and, on success, persists the
    /// token and fetches the profile.
    ///
    /// Shared by the direct-reply path and the redirect-return path.
    async fn complete_handshake(&self, response: &AuthResponse) -> Result<PublicProfile, AuthError> {
        let stored_nonce = self.inner.store.get(NONCE_KEY);
        if stored_nonce.as_deref() != Some(response.nonce.as_str()) {
            warn!("authorization response nonce does not match the in-flight attempt");
            return Err(AuthError::NonceMismatch);
        }

        let key = did::resolve_signing_key(&response.did_doc, &response.key)?;

        let valid = match self.inner.store.get(CHALLENGE_KEY) {
            Some(challenge) => verify_encoded(
                self.inner.verifier.as_ref(),
                key,
                &response.challenge,
                &challenge,
            ),
            None => false,
        };

        // The attempt is consumed either way: challenge material is
        // single-use.
        self.inner.store.remove(NONCE_KEY);
        self.inner.store.remove(CHALLENGE_KEY);

        if !valid {
            warn!("challenge signature did not verify; rejecting handshake");
            return Err(AuthError::AuthenticationFailed);
        }

        // Token lands only after both freshness and signature checks pass.
        self.inner.store.set(ACCESS_TOKEN_KEY, &response.access_token);
        info!("handshake complete; access token persisted");

        self.get_public_profile().await
    }

    /// Fetches a fresh profile from the provider with the current token.
    async fn refresh_public_profile(&self) -> Result<PublicProfile, AuthError> {
        let token = self
            .inner
            .store
            .get(ACCESS_TOKEN_KEY)
            .ok_or(AuthError::NotAuthenticated)?;

        let payload = self
            .request(
                Action::GetPublicProfile,
                OutboundMessage::GetPublicProfile { token },
            )
            .await?;
        let Some(payload) = payload else {
            return Err(AuthError::ProfileUnavailable);
        };
        if payload.is_null() {
            return Err(AuthError::ProfileUnavailable);
        }

        match profile::interpret_reply(&payload) {
            ProfileReply::Profile(fetched) => {
                profile::store_cached(self.inner.store.as_ref(), &fetched);
                *self.inner.profile.write() = Some(fetched.clone());
                Ok(fetched)
            }
            ProfileReply::InvalidAccessToken => {
                warn!("provider rejected the access token; evicting local session");
                // Token first, so a concurrent is_authenticated() never
                // sees a token with a half-cleared cache behind it.
                self.inner.store.remove(ACCESS_TOKEN_KEY);
                self.inner.store.remove(PUBLIC_PROFILE_KEY);
                *self.inner.profile.write() = None;
                Err(AuthError::InvalidAccessToken)
            }
            ProfileReply::Unusable => Err(AuthError::ProfileUnavailable),
        }
    }

    /// Runs `run` as the leader for `action`, or joins the outcome of an
    /// already in-flight leader.
    async fn coalesced<F, Fut>(&self, action: Action, run: F) -> OpOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = OpOutcome>,
    {
        enum Role {
            Leader(broadcast::Sender<OpOutcome>),
            Follower(broadcast::Receiver<OpOutcome>),
        }

        let role = {
            let mut in_flight = self.inner.in_flight.lock().await;
            match in_flight.get(&action) {
                Some(tx) => Role::Follower(tx.subscribe()),
                None => {
                    let (tx, _) = broadcast::channel(1);
                    in_flight.insert(action, tx.clone());
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Follower(mut rx) => match rx.recv().await {
                Ok(outcome) => outcome,
                Err(_) => Err(ChannelError::Closed.into()),
            },
            Role::Leader(tx) => {
                let outcome = run().await;
                self.inner.in_flight.lock().await.remove(&action);
                let _ = tx.send(outcome.clone());
                outcome
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound Pump
// ---------------------------------------------------------------------------

/// Consumes the inbound event stream, one event at a time in arrival
/// order. This is the only place protocol state transitions happen.
async fn run_pump(
    inner: Arc<SessionInner>,
    mut events: mpsc::Receiver<ChannelEvent>,
    ready: watch::Sender<bool>,
    registration: watch::Sender<Option<bool>>,
) {
    while let Some(event) = events.recv().await {
        match event {
            ChannelEvent::Connected => {
                debug!("provider transport connected");
                let _ = ready.send(true);
            }
            ChannelEvent::Message(InboundMessage::Lifecycle { state }) => {
                match SessionState::from_code(state) {
                    Some(SessionState::LoggedOut) => {
                        debug!("provider reports logged out; registration required");
                        let _ = registration.send(Some(true));
                    }
                    Some(SessionState::Authenticated) => {
                        debug!("provider reports authenticated");
                        let _ = registration.send(Some(false));
                    }
                    None => debug!(state, "ignoring unknown provider state code"),
                }
            }
            ChannelEvent::Message(InboundMessage::Reply { action, data }) => {
                let Some(kind) = Action::from_name(&action) else {
                    debug!(%action, "ignoring reply for unknown action");
                    continue;
                };
                let slot = inner.pending_replies.lock().remove(&kind);
                match slot {
                    Some(tx) => {
                        let _ = tx.send(data);
                    }
                    None => warn!(%action, "dropping unsolicited reply"),
                }
            }
        }
    }

    // Transport gone: wake anything still parked on a reply so it can
    // fail with a closed-channel error instead of hanging.
    inner.pending_replies.lock().clear();
    debug!("peer event stream ended; session pump stopped");
}
