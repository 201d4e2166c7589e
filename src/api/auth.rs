// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login and token verification endpoints.

use axum::{
    body::Bytes,
    extract::{OriginalUri, State},
    http::{HeaderMap, Method},
    Json,
};

use crate::auth::{AuthError, Authenticated, IssuedToken};
use crate::models::{ErrorResponse, LoginRequest, VerifyResponse};
use crate::state::AppState;

/// Exchange a signed login request for a session token.
///
/// The body is verified over its exact bytes, so it is taken raw and only
/// parsed after the signature checks out.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    params(
        ("x-client-id" = String, Header, description = "Registered client id"),
        ("x-timestamp" = i64, Header, description = "Unix seconds at signing time"),
        ("x-nonce" = String, Header, description = "Single-use random value, >= 16 bytes"),
        ("x-signature" = String, Header, description = "Base64 HMAC-SHA256 of the canonical request")
    ),
    responses(
        (status = 200, description = "Session token issued", body = IssuedToken),
        (status = 400, description = "Missing or malformed headers, invalid body, identity mismatch", body = ErrorResponse),
        (status = 401, description = "Timestamp outside the accepted window", body = ErrorResponse),
        (status = 403, description = "Signature not verified or nonce replayed", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IssuedToken>, AuthError> {
    let token = state
        .gate
        .login(method.as_str(), uri.path(), &headers, &body)?;
    Ok(Json(token))
}

/// Check a bearer token and report who it belongs to.
#[utoipa::path(
    get,
    path = "/v1/auth/verify",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Token is valid", body = VerifyResponse),
        (status = 401, description = "Token missing, invalid or expired", body = ErrorResponse)
    )
)]
pub async fn verify(Authenticated(claims): Authenticated) -> Json<VerifyResponse> {
    Json(claims.into())
}
