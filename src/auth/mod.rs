// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Signed client login and bearer session tokens.
//!
//! ## Auth Flow
//!
//! 1. A registered desktop client signs `POST /v1/auth/login` with its
//!    pre-shared secret (`X-Client-Id`, `X-Timestamp`, `X-Nonce`,
//!    `X-Signature`). The secret itself is never sent.
//! 2. The server:
//!    - rejects timestamps outside the skew tolerance
//!    - recomputes the HMAC-SHA256 over the canonical request string
//!    - rejects a `(client_id, nonce)` pair it has already seen
//!    - checks the body `client_id` against the signed identity
//!    - issues an HS256 session token
//! 3. The client sends `Authorization: Bearer <token>` on later calls.
//!
//! ## Security
//!
//! - Signature comparison is constant-time
//! - Unknown clients cost the same HMAC work as known ones and get the same
//!   response as a bad signature
//! - Tokens are stateless and cannot be revoked before expiry; the lifetime
//!   is kept short (20 minutes by default)

pub mod claims;
pub mod clock;
pub mod error;
pub mod extractor;
pub mod gate;
pub mod middleware;
pub mod nonce;
pub mod registry;
pub mod signature;
pub mod token;

pub use claims::{SessionClaims, TokenClaims};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::AuthError;
pub use extractor::Authenticated;
pub use gate::{AuthGate, LoginStage};
pub use nonce::{NonceStore, NonceSweeper};
pub use registry::{ClientRegistry, ClientSecret};
pub use signature::{SignatureHeaders, SignatureVerifier, SignedRequest};
pub use token::{IssuedToken, TokenIssuer};
