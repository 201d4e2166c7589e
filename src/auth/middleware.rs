// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session middleware for protected router subtrees.
//!
//! ```rust,ignore
//! let protected = Router::new()
//!     .route("/auth/verify", get(verify))
//!     .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_session));
//! ```
//!
//! On success the verified [`TokenClaims`](super::TokenClaims) are stored in
//! the request extensions, where the [`Authenticated`](super::Authenticated)
//! extractor picks them up.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::state::AppState;

/// Reject the request unless it carries a valid bearer token.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match state.gate.protect(request.headers()) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Authenticated;
    use crate::state::tests::test_state;
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    async fn whoami(Authenticated(claims): Authenticated) -> String {
        claims.client_id
    }

    fn app(state: AppState) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                require_session,
            ))
            .with_state(state)
    }

    #[tokio::test]
    async fn rejects_without_token() {
        let (state, _) = test_state();
        let response = app(state)
            .oneshot(axum::http::Request::builder().uri("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn passes_claims_to_handler() {
        let (state, _) = test_state();
        let token = state.gate.token_issuer().issue("c2").unwrap();

        let response = app(state)
            .oneshot(
                axum::http::Request::builder()
                    .uri("/whoami")
                    .header("Authorization", format!("Bearer {}", token.access_token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"c2");
    }
}
