// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HMAC-SHA256 request signatures.
//!
//! ## Canonical signing string
//!
//! ```text
//! METHOD|PATH|HEX(SHA256(body))|timestamp|nonce
//! ```
//!
//! - `METHOD` is the upper-case HTTP method.
//! - `PATH` is the request path as received, without query string.
//! - The body hash is lower-case hex over the exact body bytes.
//! - `timestamp` and `nonce` are the header values exactly as sent.
//!
//! The signature is `base64(HMAC-SHA256(secret, canonical))`. Field order is
//! fixed; changing it breaks every deployed client.
//!
//! ## Headers
//!
//! | Header | Content |
//! |--------|---------|
//! | `X-Client-Id` | Registered client id |
//! | `X-Timestamp` | Decimal Unix seconds |
//! | `X-Nonce` | >= 16 random bytes as hex, UUID or base64 |
//! | `X-Signature` | Base64 HMAC-SHA256 digest |

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use base64ct::{Base64, Base64Unpadded, Base64Url, Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::clock::Clock;
use super::error::AuthError;
use super::nonce::NonceStore;
use super::registry::{is_valid_client_id, ClientRegistry, ClientSecret};

type HmacSha256 = Hmac<Sha256>;

pub const CLIENT_ID_HEADER: &str = "x-client-id";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";
pub const NONCE_HEADER: &str = "x-nonce";
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Minimum nonce entropy, in raw bytes before encoding.
pub const MIN_NONCE_BYTES: usize = 16;

/// Upper bound on the encoded nonce length.
pub const MAX_NONCE_LEN: usize = 256;

const SIGNATURE_LEN: usize = 32;

/// Everything needed to verify one login attempt. Never stored.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub method: String,
    pub path: String,
    pub body_hash: String,
    pub timestamp: i64,
    timestamp_raw: String,
    pub nonce: String,
    pub client_id: String,
    signature: Vec<u8>,
}

impl SignedRequest {
    /// Build from the request line, headers and raw body bytes.
    ///
    /// Fails with [`AuthError::MissingHeader`] naming the first absent or
    /// malformed header.
    pub fn from_parts(
        method: &str,
        path: &str,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<Self, AuthError> {
        let client_id = header_str(headers, CLIENT_ID_HEADER)?;
        if !is_valid_client_id(client_id) {
            return Err(AuthError::MissingHeader("X-Client-Id"));
        }

        let timestamp_raw = header_str(headers, TIMESTAMP_HEADER)?;
        let timestamp = parse_timestamp(timestamp_raw)?;

        let nonce = header_str(headers, NONCE_HEADER)?;
        if !nonce_has_min_entropy(nonce) {
            return Err(AuthError::MissingHeader("X-Nonce"));
        }

        let signature = decode_signature(header_str(headers, SIGNATURE_HEADER)?)?;

        Ok(Self {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            body_hash: body_hash(body),
            timestamp,
            timestamp_raw: timestamp_raw.to_string(),
            nonce: nonce.to_string(),
            client_id: client_id.to_string(),
            signature,
        })
    }

    /// The exact string covered by the signature.
    pub fn canonical_string(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.method, self.path, self.body_hash, self.timestamp_raw, self.nonce
        )
    }

    /// Short nonce prefix that is safe to log.
    pub fn nonce_hint(&self) -> &str {
        let end = self
            .nonce
            .char_indices()
            .nth(6)
            .map(|(i, _)| i)
            .unwrap_or(self.nonce.len());
        &self.nonce[..end]
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, AuthError> {
    let display = match name {
        CLIENT_ID_HEADER => "X-Client-Id",
        TIMESTAMP_HEADER => "X-Timestamp",
        NONCE_HEADER => "X-Nonce",
        _ => "X-Signature",
    };
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::MissingHeader(display))
}

fn parse_timestamp(raw: &str) -> Result<i64, AuthError> {
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AuthError::MissingHeader("X-Timestamp"));
    }
    raw.parse()
        .map_err(|_| AuthError::MissingHeader("X-Timestamp"))
}

fn decode_signature(raw: &str) -> Result<Vec<u8>, AuthError> {
    let bytes = Base64::decode_vec(raw)
        .or_else(|_| Base64Unpadded::decode_vec(raw))
        .map_err(|_| AuthError::MissingHeader("X-Signature"))?;
    if bytes.len() != SIGNATURE_LEN {
        return Err(AuthError::MissingHeader("X-Signature"));
    }
    Ok(bytes)
}

/// Raw byte length of a nonce, if it is hex, a UUID, or base64.
fn nonce_byte_len(nonce: &str) -> Option<usize> {
    // Even-length hex is read as hex only; odd-length may still be base64.
    if nonce.len() % 2 == 0 && nonce.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Some(nonce.len() / 2);
    }
    if uuid::Uuid::try_parse(nonce).is_ok() {
        return Some(16);
    }
    Base64::decode_vec(nonce)
        .or_else(|_| Base64Unpadded::decode_vec(nonce))
        .or_else(|_| Base64Url::decode_vec(nonce))
        .or_else(|_| Base64UrlUnpadded::decode_vec(nonce))
        .ok()
        .map(|bytes| bytes.len())
}

fn nonce_has_min_entropy(nonce: &str) -> bool {
    nonce.len() <= MAX_NONCE_LEN
        && nonce_byte_len(nonce).is_some_and(|len| len >= MIN_NONCE_BYTES)
}

/// Lower-case hex SHA-256 of the body bytes.
pub fn body_hash(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn mac_for(secret: &[u8], canonical: &str) -> Result<HmacSha256, AuthError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AuthError::InternalFault(format!("HMAC key rejected: {e}")))?;
    mac.update(canonical.as_bytes());
    Ok(mac)
}

// =============================================================================
// Client side
// =============================================================================

/// Compute the base64 signature for a request. This is what the desktop
/// client sends as `X-Signature`.
pub fn sign(
    secret: &[u8],
    method: &str,
    path: &str,
    body: &[u8],
    timestamp: i64,
    nonce: &str,
) -> Result<String, AuthError> {
    let canonical = format!(
        "{}|{}|{}|{}|{}",
        method.to_ascii_uppercase(),
        path,
        body_hash(body),
        timestamp,
        nonce
    );
    let tag = mac_for(secret, &canonical)?.finalize().into_bytes();
    Ok(Base64::encode_string(&tag))
}

/// Generate a fresh 16-byte nonce, URL-safe base64 without padding.
pub fn generate_nonce() -> Result<String, AuthError> {
    let mut bytes = [0u8; MIN_NONCE_BYTES];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AuthError::InternalFault("system RNG unavailable".to_string()))?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Header set for a signed request, ready to attach to an HTTP call.
#[derive(Debug, Clone)]
pub struct SignatureHeaders {
    pub client_id: String,
    pub timestamp: i64,
    pub nonce: String,
    pub signature: String,
}

impl SignatureHeaders {
    /// Sign a request with a freshly generated nonce.
    pub fn generate(
        client_id: &str,
        secret: &[u8],
        method: &str,
        path: &str,
        body: &[u8],
        timestamp: i64,
    ) -> Result<Self, AuthError> {
        let nonce = generate_nonce()?;
        let signature = sign(secret, method, path, body, timestamp, &nonce)?;
        Ok(Self {
            client_id: client_id.to_string(),
            timestamp,
            nonce,
            signature,
        })
    }

    /// Header name/value pairs in the order they are documented.
    pub fn pairs(&self) -> [(&'static str, String); 4] {
        [
            (CLIENT_ID_HEADER, self.client_id.clone()),
            (TIMESTAMP_HEADER, self.timestamp.to_string()),
            (NONCE_HEADER, self.nonce.clone()),
            (SIGNATURE_HEADER, self.signature.clone()),
        ]
    }
}

// =============================================================================
// Server side
// =============================================================================

/// Verifies signed login requests against the client registry.
pub struct SignatureVerifier {
    registry: Arc<ClientRegistry>,
    nonces: Arc<NonceStore>,
    clock: Arc<dyn Clock>,
    tolerance: u64,
    /// Stand-in secret so unknown clients cost the same HMAC work.
    dummy_secret: ClientSecret,
}

impl SignatureVerifier {
    pub fn new(
        registry: Arc<ClientRegistry>,
        nonces: Arc<NonceStore>,
        clock: Arc<dyn Clock>,
        tolerance: Duration,
    ) -> Result<Self, AuthError> {
        let mut dummy = [0u8; 32];
        SystemRandom::new()
            .fill(&mut dummy)
            .map_err(|_| AuthError::InternalFault("system RNG unavailable".to_string()))?;

        Ok(Self {
            registry,
            nonces,
            clock,
            tolerance: tolerance.as_secs(),
            dummy_secret: ClientSecret::new(dummy.to_vec()),
        })
    }

    /// Verify timestamp freshness, signature and nonce novelty.
    ///
    /// Returns the verified client id. The nonce is only recorded once the
    /// signature has been checked, so unauthenticated traffic cannot fill
    /// the nonce store.
    pub fn verify(&self, request: &SignedRequest) -> Result<String, AuthError> {
        let now = self.clock.now();
        if now.abs_diff(request.timestamp) > self.tolerance {
            debug!(
                client_id = %request.client_id,
                skew_secs = now.saturating_sub(request.timestamp),
                "Timestamp outside tolerance"
            );
            return Err(AuthError::ClockSkew);
        }

        let (secret, known) = match self.registry.get(&request.client_id) {
            Some(secret) => (secret, true),
            None => (&self.dummy_secret, false),
        };

        // Same HMAC + constant-time compare for known and unknown ids.
        let signature_ok = mac_for(secret.as_bytes(), &request.canonical_string())?
            .verify_slice(&request.signature)
            .is_ok();

        if !known {
            return Err(AuthError::UnknownClient);
        }
        if !signature_ok {
            return Err(AuthError::BadSignature);
        }

        self.nonces
            .check_and_record(&request.client_id, &request.nonce, request.timestamp)?;

        Ok(request.client_id.clone())
    }
}
