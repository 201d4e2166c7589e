// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Every variant is terminal for the request that produced it. Client-facing
//! messages never contain the received signature, nonce or any secret.
//! [`AuthError::UnknownClient`] and [`AuthError::BadSignature`] render the
//! same status, code and message so the response cannot be used to probe for
//! registered client ids; they stay separate variants for server-side logs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::models::ErrorResponse;

/// Authentication error type.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A signature header is absent or malformed
    #[error("Missing or malformed authentication header: {0}")]
    MissingHeader(&'static str),
    /// `X-Timestamp` is outside the accepted window
    #[error("Request timestamp is outside the accepted window")]
    ClockSkew,
    /// The `(client_id, nonce)` pair was already used
    #[error("Request nonce has already been used")]
    Replay,
    /// No registry entry for the asserted client id
    #[error("Request signature could not be verified")]
    UnknownClient,
    /// The HMAC did not match
    #[error("Request signature could not be verified")]
    BadSignature,
    /// Body `client_id` differs from the signed `X-Client-Id`
    #[error("Body client_id does not match the signed client identity")]
    IdentityMismatch,
    /// Login body is not a valid `{"client_id": ...}` object
    #[error("Invalid login body: {0}")]
    InvalidBody(&'static str),
    /// Bearer token has expired
    #[error("Token has expired")]
    TokenExpired,
    /// Bearer token failed decoding or signature checks
    #[error("Token is invalid")]
    TokenInvalid,
    /// No usable bearer token on a protected call
    #[error("Authorization header with a bearer token is required")]
    MissingToken,
    /// Unexpected failure; detail is logged, never returned
    #[error("Internal authentication error")]
    InternalFault(String),
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingHeader(_) => "missing_header",
            AuthError::ClockSkew => "clock_skew",
            AuthError::Replay => "replay",
            AuthError::UnknownClient | AuthError::BadSignature => "invalid_signature",
            AuthError::IdentityMismatch => "identity_mismatch",
            AuthError::InvalidBody(_) => "invalid_body",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenInvalid => "token_invalid",
            AuthError::MissingToken => "missing_token",
            AuthError::InternalFault(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingHeader(_)
            | AuthError::IdentityMismatch
            | AuthError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            AuthError::ClockSkew
            | AuthError::TokenExpired
            | AuthError::TokenInvalid
            | AuthError::MissingToken => StatusCode::UNAUTHORIZED,
            AuthError::Replay | AuthError::UnknownClient | AuthError::BadSignature => {
                StatusCode::FORBIDDEN
            }
            AuthError::InternalFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label for structured logs. Unlike [`Self::error_code`] this
    /// distinguishes an unknown client from a bad signature.
    pub fn log_reason(&self) -> &'static str {
        match self {
            AuthError::UnknownClient => "unknown_client",
            AuthError::BadSignature => "bad_signature",
            other => other.error_code(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::InternalFault(detail) = &self {
            tracing::error!(detail = %detail, "Internal fault during authentication");
        }

        let status = self.status_code();
        let body = Json(ErrorResponse {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
