// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Entry point for login and protected calls.
//!
//! ## Login
//!
//! ```text
//! Start -> SignatureChecked -> NonceChecked -> ClientKnown -> TokenIssued
//!   \___________\__________________\_______________\-> Rejected(reason)
//! ```
//!
//! Any failing step ends the attempt. Rejections are logged once here, with
//! the stage reached and a reason that tells an unknown client apart from a
//! bad signature; the HTTP response does not.
//!
//! ## Protected calls
//!
//! `Authorization: Bearer <token>` is validated by the [`TokenIssuer`] and
//! the resulting [`TokenClaims`] are handed to the route.

use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use tracing::{debug, info, warn};

use super::claims::TokenClaims;
use super::clock::Clock;
use super::error::AuthError;
use super::nonce::NonceStore;
use super::registry::{ClientRegistry, MAX_CLIENT_ID_LEN};
use super::signature::{SignatureVerifier, SignedRequest};
use super::token::{IssuedToken, TokenIssuer};
use crate::config::Settings;
use crate::models::LoginRequest;

/// Progress of a login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
    Start,
    SignatureChecked,
    NonceChecked,
    ClientKnown,
    TokenIssued,
}

/// Orchestrates signature verification, replay protection and tokens.
pub struct AuthGate {
    registry: Arc<ClientRegistry>,
    nonces: Arc<NonceStore>,
    verifier: SignatureVerifier,
    tokens: TokenIssuer,
}

impl AuthGate {
    /// Wire every component from resolved settings around one clock.
    pub fn from_settings(settings: &Settings, clock: Arc<dyn Clock>) -> Result<Self, AuthError> {
        let registry = Arc::new(settings.registry.clone());
        let nonces = Arc::new(NonceStore::new(settings.nonce_window, clock.clone()));
        let verifier = SignatureVerifier::new(
            registry.clone(),
            nonces.clone(),
            clock.clone(),
            settings.clock_skew,
        )?;
        let tokens = TokenIssuer::new(&settings.token_signing_key, settings.token_ttl, clock);

        if settings.nonce_window < settings.clock_skew {
            warn!(
                nonce_window_secs = settings.nonce_window.as_secs(),
                clock_skew_secs = settings.clock_skew.as_secs(),
                "Nonce window is shorter than the clock skew tolerance; \
                 old requests may be replayable after their nonce expires"
            );
        }

        Ok(Self {
            registry,
            nonces,
            verifier,
            tokens,
        })
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Shared nonce store, for the background sweeper and health checks.
    pub fn nonce_store(&self) -> Arc<NonceStore> {
        self.nonces.clone()
    }

    pub fn token_issuer(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Handle a signed login request and mint a session token.
    pub fn login(
        &self,
        method: &str,
        path: &str,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<IssuedToken, AuthError> {
        let mut stage = LoginStage::Start;
        let result = self.run_login(&mut stage, method, path, headers, body);

        match &result {
            Ok(token) => info!(
                client_id = %headers_client_id(headers),
                expires_at = token.expires_at,
                "Session token issued"
            ),
            Err(e) => warn!(
                client_id = %headers_client_id(headers),
                stage = ?stage,
                reason = e.log_reason(),
                "Login rejected"
            ),
        }
        result
    }

    fn run_login(
        &self,
        stage: &mut LoginStage,
        method: &str,
        path: &str,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<IssuedToken, AuthError> {
        let request = SignedRequest::from_parts(method, path, headers, body)?;

        let verified_id = match self.verifier.verify(&request) {
            Ok(id) => id,
            Err(AuthError::Replay) => {
                advance(stage, LoginStage::SignatureChecked);
                debug!(nonce = %request.nonce_hint(), "Replayed nonce");
                return Err(AuthError::Replay);
            }
            Err(e) => return Err(e),
        };
        advance(stage, LoginStage::SignatureChecked);
        advance(stage, LoginStage::NonceChecked);

        let login: LoginRequest = serde_json::from_slice(body)
            .map_err(|_| AuthError::InvalidBody("expected a JSON object with client_id"))?;
        let len = login.client_id.chars().count();
        if len == 0 || len > MAX_CLIENT_ID_LEN {
            return Err(AuthError::InvalidBody("client_id must be 1-100 characters"));
        }
        if login.client_id != verified_id {
            return Err(AuthError::IdentityMismatch);
        }

        if !self.registry.contains(&verified_id) {
            return Err(AuthError::UnknownClient);
        }
        advance(stage, LoginStage::ClientKnown);

        let token = self.tokens.issue(&verified_id)?;
        advance(stage, LoginStage::TokenIssued);
        Ok(token)
    }

    /// Validate the bearer token of a protected call.
    pub fn protect(&self, headers: &HeaderMap) -> Result<TokenClaims, AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;
        self.tokens.validate(token).inspect_err(|e| {
            debug!(reason = e.log_reason(), "Bearer token rejected");
        })
    }
}

fn advance(stage: &mut LoginStage, next: LoginStage) {
    debug!(from = ?*stage, to = ?next, "Login stage");
    *stage = next;
}

/// Extract the token from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Asserted client id for log lines; may be unverified.
fn headers_client_id(headers: &HeaderMap) -> &str {
    headers
        .get(super::signature::CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use crate::auth::signature::{sign, SignatureHeaders};
    use axum::http::HeaderValue;
    use std::time::Duration;

    const T0: i64 = 1_700_000_000;
    const PATH: &str = "/v1/auth/login";

    fn settings() -> Settings {
        Settings {
            host: "127.0.0.1".to_string(),
            port: 0,
            registry: ClientRegistry::parse_pairs("c1:s1,c2:s2").unwrap(),
            token_signing_key: b"server-signing-key-0123456789abcdef".to_vec(),
            clock_skew: Duration::from_secs(60),
            nonce_window: Duration::from_secs(60),
            token_ttl: Duration::from_secs(1200),
            nonce_sweep_interval: Duration::from_secs(30),
        }
    }

    fn gate() -> (AuthGate, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        (AuthGate::from_settings(&settings(), clock.clone()).unwrap(), clock)
    }

    fn signed_headers(client_id: &str, secret: &[u8], body: &[u8], timestamp: i64) -> HeaderMap {
        let signed =
            SignatureHeaders::generate(client_id, secret, "POST", PATH, body, timestamp).unwrap();
        let mut map = HeaderMap::new();
        for (name, value) in signed.pairs() {
            map.insert(name, HeaderValue::from_str(&value).unwrap());
        }
        map
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        map
    }

    #[test]
    fn login_then_protect() {
        let (gate, _) = gate();
        let body = br#"{"client_id":"c1"}"#;
        let headers = signed_headers("c1", b"s1", body, T0);

        let token = gate.login("POST", PATH, &headers, body).unwrap();
        let claims = gate.protect(&bearer(&token.access_token)).unwrap();
        assert_eq!(claims.client_id, "c1");
    }

    #[test]
    fn replay_rejected() {
        let (gate, clock) = gate();
        let body = br#"{"client_id":"c1"}"#;
        let headers = signed_headers("c1", b"s1", body, T0);

        gate.login("POST", PATH, &headers, body).unwrap();
        clock.advance(1);
        assert!(matches!(
            gate.login("POST", PATH, &headers, body),
            Err(AuthError::Replay)
        ));
    }

    #[test]
    fn replay_at_skew_boundary_rejected() {
        let (gate, clock) = gate();
        let body = br#"{"client_id":"c1"}"#;
        let headers = signed_headers("c1", b"s1", body, T0);

        gate.login("POST", PATH, &headers, body).unwrap();

        // Still within the accepted skew, so only the nonce store can stop it.
        clock.advance(60);
        assert!(matches!(
            gate.login("POST", PATH, &headers, body),
            Err(AuthError::Replay)
        ));

        clock.advance(1);
        assert!(matches!(
            gate.login("POST", PATH, &headers, body),
            Err(AuthError::ClockSkew)
        ));
    }

    #[test]
    fn body_identity_must_match_headers() {
        let (gate, _) = gate();
        let body = br#"{"client_id":"c2"}"#;
        let headers = signed_headers("c1", b"s1", body, T0);

        assert!(matches!(
            gate.login("POST", PATH, &headers, body),
            Err(AuthError::IdentityMismatch)
        ));
    }

    #[test]
    fn invalid_body_rejected_after_verification() {
        let (gate, _) = gate();

        let body = b"client_id=c1";
        let headers = signed_headers("c1", b"s1", body, T0);
        assert!(matches!(
            gate.login("POST", PATH, &headers, body),
            Err(AuthError::InvalidBody(_))
        ));

        let body = br#"{"client_id":""}"#;
        let headers = signed_headers("c1", b"s1", body, T0);
        assert!(matches!(
            gate.login("POST", PATH, &headers, body),
            Err(AuthError::InvalidBody(_))
        ));
    }

    #[test]
    fn stale_timestamp_is_clock_skew() {
        let (gate, _) = gate();
        let body = br#"{"client_id":"c1"}"#;
        let headers = signed_headers("c1", b"s1", body, T0 - 200);

        assert!(matches!(
            gate.login("POST", PATH, &headers, body),
            Err(AuthError::ClockSkew)
        ));
    }

    #[test]
    fn unknown_client_rejected() {
        let (gate, _) = gate();
        let body = br#"{"client_id":"c9"}"#;
        let headers = signed_headers("c9", b"s9", body, T0);

        assert!(matches!(
            gate.login("POST", PATH, &headers, body),
            Err(AuthError::UnknownClient)
        ));
    }

    #[test]
    fn explicit_nonce_signature_accepted() {
        let (gate, _) = gate();
        let body = br#"{"client_id":"c2"}"#;
        let nonce = "6f9619ff-8b86-d011-b42d-00c04fd430c8";
        let signature = sign(b"s2", "POST", PATH, body, T0, nonce).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-client-id", HeaderValue::from_static("c2"));
        headers.insert("x-timestamp", HeaderValue::from_str(&T0.to_string()).unwrap());
        headers.insert("x-nonce", HeaderValue::from_static(nonce));
        headers.insert("x-signature", HeaderValue::from_str(&signature).unwrap());

        let token = gate.login("POST", PATH, &headers, body).unwrap();
        assert_eq!(token.token_type, "bearer");
    }

    #[test]
    fn protect_requires_bearer_token() {
        let (gate, _) = gate();
        assert!(matches!(
            gate.protect(&HeaderMap::new()),
            Err(AuthError::MissingToken)
        ));

        let mut basic = HeaderMap::new();
        basic.insert(AUTHORIZATION, HeaderValue::from_static("Basic YWJjOmRlZg=="));
        assert!(matches!(gate.protect(&basic), Err(AuthError::MissingToken)));

        assert!(matches!(
            gate.protect(&bearer("garbage")),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn protect_rejects_expired_token() {
        let (gate, clock) = gate();
        let token = gate.token_issuer().issue("c1").unwrap();

        clock.advance(1201);
        assert!(matches!(
            gate.protect(&bearer(&token.access_token)),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
