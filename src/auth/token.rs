// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token issuance and validation.
//!
//! Tokens are HS256 JWTs signed with a server-held key that is never shared
//! with clients. They are self-contained: the server keeps no per-token
//! state, so a token stays valid until `exp` and cannot be revoked earlier.
//! Keep the lifetime short.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::claims::{SessionClaims, TokenClaims};
use super::clock::Clock;
use super::error::AuthError;

/// Issuer label written to and required in every token.
pub const TOKEN_ISSUER: &str = "dealwatch-auth";

/// Token type label returned with every token.
pub const TOKEN_TYPE: &str = "bearer";

/// A freshly minted token, shaped as the login response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IssuedToken {
    /// Bearer token for subsequent calls
    pub access_token: String,
    /// Always `bearer`
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: u64,
    /// Expiry (Unix seconds, not serialized)
    #[serde(skip)]
    pub expires_at: i64,
}

/// Mints and validates session tokens.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(signing_key: &[u8], lifetime: Duration, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the injected clock in `validate`.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        Self {
            encoding_key: EncodingKey::from_secret(signing_key),
            decoding_key: DecodingKey::from_secret(signing_key),
            validation,
            lifetime,
            clock,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Mint a token for an already verified client id.
    pub fn issue(&self, client_id: &str) -> Result<IssuedToken, AuthError> {
        let iat = self.clock.now();
        let lifetime = self.lifetime.as_secs();
        let exp = iat.saturating_add(i64::try_from(lifetime).unwrap_or(i64::MAX));

        let claims = SessionClaims {
            sub: client_id.to_string(),
            iat,
            exp,
            iss: TOKEN_ISSUER.to_string(),
            jti: Uuid::new_v4().to_string(),
        };

        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InternalFault(format!("token encoding failed: {e}")))?;

        Ok(IssuedToken {
            access_token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: lifetime,
            expires_at: exp,
        })
    }

    /// Check signature, issuer and required claims, then expiry.
    pub fn validate(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| AuthError::TokenInvalid)?;

        let claims = data.claims;
        if claims.sub.is_empty() {
            return Err(AuthError::TokenInvalid);
        }
        if self.clock.now() > claims.exp {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    const T0: i64 = 1_700_000_000;
    const KEY: &[u8] = b"server-signing-key-0123456789abcdef";

    fn issuer() -> (TokenIssuer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        (
            TokenIssuer::new(KEY, Duration::from_secs(1200), clock.clone()),
            clock,
        )
    }

    #[test]
    fn round_trip_returns_client_id() {
        let (issuer, _) = issuer();
        let token = issuer.issue("c1").unwrap();

        assert_eq!(token.token_type, "bearer");
        assert_eq!(token.expires_in, 1200);
        assert_eq!(token.expires_at, T0 + 1200);

        let claims = issuer.validate(&token.access_token).unwrap();
        assert_eq!(claims.client_id, "c1");
        assert_eq!(claims.exp, T0 + 1200);
        assert_eq!(claims.issued_at, T0);
    }

    #[test]
    fn each_token_is_unique() {
        let (issuer, _) = issuer();
        let a = issuer.issue("c1").unwrap();
        let b = issuer.issue("c1").unwrap();
        assert_ne!(a.access_token, b.access_token);
    }

    #[test]
    fn expires_after_lifetime() {
        let (issuer, clock) = issuer();
        let token = issuer.issue("c1").unwrap();

        clock.advance(1200);
        assert!(issuer.validate(&token.access_token).is_ok());

        clock.advance(1);
        assert!(matches!(
            issuer.validate(&token.access_token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn garbage_token_is_invalid() {
        let (issuer, _) = issuer();
        assert!(matches!(issuer.validate("not-a-jwt"), Err(AuthError::TokenInvalid)));
        assert!(matches!(issuer.validate(""), Err(AuthError::TokenInvalid)));
    }

    #[test]
    fn token_from_other_key_is_invalid() {
        let (issuer, clock) = issuer();
        let other = TokenIssuer::new(b"another-key-0123456789abcdef0123", issuer.lifetime(), clock);
        let token = other.issue("c1").unwrap();
        assert!(matches!(
            issuer.validate(&token.access_token),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn tampered_claims_are_invalid() {
        let (issuer, _) = issuer();
        let token = issuer.issue("c1").unwrap().access_token;
        let parts: Vec<&str> = token.split('.').collect();

        let forged_claims = format!(
            r#"{{"sub":"c2","iat":{T0},"exp":{},"iss":"{TOKEN_ISSUER}","jti":"x"}}"#,
            T0 + 1200
        );
        let forged = format!(
            "{}.{}.{}",
            parts[0],
            URL_SAFE_NO_PAD.encode(forged_claims),
            parts[2]
        );
        assert!(matches!(issuer.validate(&forged), Err(AuthError::TokenInvalid)));
    }

    #[test]
    fn missing_claims_are_invalid() {
        let (issuer, _) = issuer();
        #[derive(Serialize)]
        struct Partial {
            sub: String,
            iss: String,
        }
        let token = encode(
            &Header::new(Algorithm::HS256),
            &Partial {
                sub: "c1".to_string(),
                iss: TOKEN_ISSUER.to_string(),
            },
            &EncodingKey::from_secret(KEY),
        )
        .unwrap();
        assert!(matches!(issuer.validate(&token), Err(AuthError::TokenInvalid)));
    }

    #[test]
    fn wrong_issuer_is_invalid() {
        let (issuer, _) = issuer();
        let claims = SessionClaims {
            sub: "c1".to_string(),
            iat: T0,
            exp: T0 + 60,
            iss: "someone-else".to_string(),
            jti: "x".to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(KEY),
        )
        .unwrap();
        assert!(matches!(issuer.validate(&token), Err(AuthError::TokenInvalid)));
    }
}
