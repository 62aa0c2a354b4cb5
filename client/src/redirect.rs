//! # Redirect Contract
//!
//! Registration is the one flow the embedded channel cannot carry: the
//! end-user must visit the provider's own page to create an identity, so
//! control leaves the host entirely via a full-page redirect and comes
//! back the same way.
//!
//! ## Outbound
//!
//! The registration URL targets the provider origin and carries three
//! query parameters: `identityRequest` (the challenge to sign), `nonce`,
//! and `referrer` (the host origin the provider redirects back to).
//!
//! ## Inbound
//!
//! On return, the provider appends `authResponse` — URL-encoded JSON
//! [`AuthResponse`] — to the referrer. The host captures whatever query
//! string it finds on re-entry and hands it to
//! [`AuthSession::resume`](crate::session::AuthSession::resume); this
//! module does the decoding. Scrubbing the parameter from the visible
//! address afterwards is the host's business.

use thiserror::Error;
use url::form_urlencoded;
use url::Url;

use crate::challenge::Challenge;
use crate::config::{AUTH_RESPONSE_PARAM, NONCE_PARAM, REFERRER_PARAM, REGISTER_PARAM};
use crate::wire::AuthResponse;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors in the redirect contract.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RedirectError {
    /// The configured provider origin is not a valid URL.
    #[error("invalid provider origin: {0}")]
    InvalidOrigin(String),

    /// The `authResponse` parameter was present but did not decode to a
    /// well-formed authorization response.
    #[error("malformed authorization response in redirect handoff: {0}")]
    MalformedResponse(String),
}

// ---------------------------------------------------------------------------
// Outbound: Registration URL
// ---------------------------------------------------------------------------

/// Builds the full-page registration redirect URL.
///
/// `referrer` is the host origin the provider should send the end-user
/// back to once registration completes; percent-encoding of all three
/// parameters is handled by the URL serializer.
pub fn registration_url(
    provider_origin: &str,
    challenge: &Challenge,
    referrer: &str,
) -> Result<Url, RedirectError> {
    let mut url =
        Url::parse(provider_origin).map_err(|err| RedirectError::InvalidOrigin(err.to_string()))?;
    url.query_pairs_mut()
        .append_pair(REGISTER_PARAM, &challenge.challenge)
        .append_pair(NONCE_PARAM, &challenge.nonce)
        .append_pair(REFERRER_PARAM, referrer);
    Ok(url)
}

// ---------------------------------------------------------------------------
// Inbound: Handoff Parsing
// ---------------------------------------------------------------------------

/// Extracts the authorization response from a redirect-return handoff.
///
/// Accepts either a bare query string (`a=b&c=d`, with or without a
/// leading `?`) or a full URL — whatever the host captured on re-entry.
/// Returns `Ok(None)` when no `authResponse` parameter is present: a page
/// load that did not come back from registration is the common case, not
/// an error.
pub fn parse_handoff(handoff: &str) -> Result<Option<AuthResponse>, RedirectError> {
    let query = match handoff.split_once('?') {
        Some((_, query)) => query,
        None => handoff,
    };

    let Some(raw) = form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == AUTH_RESPONSE_PARAM)
        .map(|(_, value)| value.into_owned())
    else {
        return Ok(None);
    };

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|err| RedirectError::MalformedResponse(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROVIDER: &str = "https://id.example.com";

    #[test]
    fn registration_url_carries_all_parameters() {
        let challenge = Challenge {
            challenge: "a1b2".to_string(),
            nonce: "c3d4".to_string(),
        };
        let url = registration_url(PROVIDER, &challenge, "https://host.example.com").unwrap();
        assert!(url.as_str().starts_with(PROVIDER));

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&(REGISTER_PARAM.to_string(), "a1b2".to_string())));
        assert!(pairs.contains(&(NONCE_PARAM.to_string(), "c3d4".to_string())));
        assert!(pairs.contains(&(REFERRER_PARAM.to_string(), "https://host.example.com".to_string())));
    }

    #[test]
    fn invalid_origin_is_rejected() {
        let challenge = Challenge::generate();
        assert!(matches!(
            registration_url("not a url", &challenge, "https://host.example.com"),
            Err(RedirectError::InvalidOrigin(_))
        ));
    }

    #[test]
    fn handoff_roundtrips_through_url_encoding() {
        let response_json = serde_json::json!({
            "nonce": "c3d4",
            "key": "key-1",
            "didDoc": {
                "id": "did:ex:1",
                "publicKey": [
                    {"id": "key-1", "controller": "did:ex:1", "publicKeyPem": "AAAA"}
                ]
            },
            "challenge": "c2ln",
            "accessToken": "tok-xyz"
        });
        let query: String = form_urlencoded::Serializer::new(String::new())
            .append_pair(AUTH_RESPONSE_PARAM, &response_json.to_string())
            .finish();

        let resp = parse_handoff(&query).unwrap().unwrap();
        assert_eq!(resp.nonce, "c3d4");
        assert_eq!(resp.access_token, "tok-xyz");
    }

    #[test]
    fn handoff_accepts_full_url() {
        let query: String = form_urlencoded::Serializer::new(String::new())
            .append_pair(
                AUTH_RESPONSE_PARAM,
                r#"{"nonce":"n","key":"k","didDoc":{"id":"d","publicKey":[]},"challenge":"c","accessToken":"t"}"#,
            )
            .finish();
        let url = format!("https://host.example.com/app?{query}");
        assert!(parse_handoff(&url).unwrap().is_some());
    }

    #[test]
    fn handoff_without_response_is_benign() {
        assert!(parse_handoff("").unwrap().is_none());
        assert!(parse_handoff("?utm_source=mail").unwrap().is_none());
    }

    #[test]
    fn malformed_response_is_an_error() {
        let query: String = form_urlencoded::Serializer::new(String::new())
            .append_pair(AUTH_RESPONSE_PARAM, "{definitely not json")
            .finish();
        assert!(matches!(
            parse_handoff(&query),
            Err(RedirectError::MalformedResponse(_))
        ));
    }
}
