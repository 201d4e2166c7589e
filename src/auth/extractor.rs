// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated clients.
//!
//! Use the `Authenticated` extractor in handlers to require a valid session
//! token:
//!
//! ```rust,ignore
//! async fn my_handler(Authenticated(claims): Authenticated) -> impl IntoResponse {
//!     // claims.client_id is the verified caller
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{AuthError, TokenClaims};
use crate::state::AppState;

/// Extractor for the verified client of a protected call.
///
/// If [`super::middleware::require_session`] already ran for this route the
/// claims it stored are reused; otherwise the bearer token is validated here.
pub struct Authenticated(pub TokenClaims);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(claims) = parts.extensions.get::<TokenClaims>().cloned() {
            return Ok(Authenticated(claims));
        }

        let claims = state.gate.protect(&parts.headers)?;
        Ok(Authenticated(claims))
    }
}
