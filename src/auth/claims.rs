// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token claims and the authenticated client view.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Claims encoded into every session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// Client id the token was issued to
    pub sub: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
    /// Issuer label
    pub iss: String,
    /// Unique token id, for log correlation
    pub jti: String,
}

/// Verified identity of the caller of a protected endpoint.
///
/// Handlers must take the client id from here, never from request fields.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct TokenClaims {
    /// Client id (`sub` claim)
    pub client_id: String,
    /// Expiration (Unix seconds)
    pub exp: i64,
    /// Issued at (Unix seconds, not serialized)
    #[serde(skip)]
    pub issued_at: i64,
    /// Token id (not serialized)
    #[serde(skip)]
    pub token_id: String,
}

impl From<SessionClaims> for TokenClaims {
    fn from(claims: SessionClaims) -> Self {
        Self {
            client_id: claims.sub,
            exp: claims.exp,
            issued_at: claims.iat,
            token_id: claims.jti,
        }
    }
}
