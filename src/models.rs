// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the authentication endpoints. All types
//! derive `ToSchema` for the OpenAPI document served under `/docs`.
//!
//! The login response itself is [`crate::auth::IssuedToken`].

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::TokenClaims;

/// Body of `POST /v1/auth/login`.
///
/// `client_id` must equal the signed `X-Client-Id` header.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct LoginRequest {
    /// Client identifier (1-100 characters)
    #[schema(min_length = 1, max_length = 100)]
    pub client_id: String,
}

/// Response of `GET /v1/auth/verify`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct VerifyResponse {
    /// Always `true`; invalid tokens get a 401 instead
    pub valid: bool,
    /// Client the token was issued to
    pub client_id: String,
    /// Token expiry (Unix seconds)
    pub expires_at: i64,
}

impl From<TokenClaims> for VerifyResponse {
    fn from(claims: TokenClaims) -> Self {
        Self {
            valid: true,
            client_id: claims.client_id,
            expires_at: claims.exp,
        }
    }
}

/// Error body shared by every failing auth endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable message
    pub error: String,
    /// Stable machine-readable code
    pub error_code: String,
}
