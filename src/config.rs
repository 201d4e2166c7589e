// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! [`Settings`] loader used at startup. Nothing here is read again once the
//! server is running; the client registry and signing key are immutable for
//! the process lifetime.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `AUTH_CLIENTS` | Comma-separated `client_id:secret` pairs | - |
//! | `AUTH_CLIENTS_FILE` | JSON file with a `clients` array | - |
//! | `AUTH_TOKEN_SIGNING_KEY` | HS256 key for session tokens (>= 32 bytes) | Required |
//! | `AUTH_CLOCK_SKEW_SECS` | Accepted timestamp drift, either direction | `60` |
//! | `AUTH_NONCE_WINDOW_SECS` | How long a seen nonce is remembered | `60` |
//! | `AUTH_TOKEN_TTL_SECS` | Session token lifetime | `1200` |
//! | `AUTH_NONCE_SWEEP_SECS` | Background nonce eviction interval | `30` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! At least one client must be configured through `AUTH_CLIENTS`,
//! `AUTH_CLIENTS_FILE`, or both.

use std::path::PathBuf;
use std::time::Duration;

use crate::auth::registry::{ClientRegistry, RegistryError};

/// Environment variable name for the bind address.
pub const HOST_ENV: &str = "HOST";

/// Environment variable name for the bind port.
pub const PORT_ENV: &str = "PORT";

/// Inline client registry: `client_a:secret_a,client_b:secret_b`.
pub const CLIENTS_ENV: &str = "AUTH_CLIENTS";

/// Path to a JSON client registry file.
///
/// # Format
/// ```json
/// { "clients": [ { "client_id": "desktop-01", "secret": "..." } ] }
/// ```
pub const CLIENTS_FILE_ENV: &str = "AUTH_CLIENTS_FILE";

/// Server-held HS256 key used to sign session tokens.
///
/// Must differ from every client secret.
pub const TOKEN_SIGNING_KEY_ENV: &str = "AUTH_TOKEN_SIGNING_KEY";

/// Accepted clock skew for `X-Timestamp`, in seconds.
pub const CLOCK_SKEW_ENV: &str = "AUTH_CLOCK_SKEW_SECS";

/// Nonce retention window, in seconds.
pub const NONCE_WINDOW_ENV: &str = "AUTH_NONCE_WINDOW_SECS";

/// Session token lifetime, in seconds.
pub const TOKEN_TTL_ENV: &str = "AUTH_TOKEN_TTL_SECS";

/// Interval between background nonce sweeps, in seconds.
pub const NONCE_SWEEP_ENV: &str = "AUTH_NONCE_SWEEP_SECS";

/// Logging format selector (`json` or `pretty`).
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_CLOCK_SKEW_SECS: u64 = 60;
pub const DEFAULT_NONCE_WINDOW_SECS: u64 = 60;
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 1200;
pub const DEFAULT_NONCE_SWEEP_SECS: u64 = 30;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Minimum accepted length of the token signing key, in bytes.
pub const MIN_SIGNING_KEY_LEN: usize = 32;

/// Configuration errors. All of them abort startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("client registry: {0}")]
    Registry(#[from] RegistryError),
}

/// Fully resolved service settings.
#[derive(Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub registry: ClientRegistry,
    pub token_signing_key: Vec<u8>,
    pub clock_skew: Duration,
    pub nonce_window: Duration,
    pub token_ttl: Duration,
    pub nonce_sweep_interval: Duration,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("registry", &self.registry)
            .field("token_signing_key", &"<redacted>")
            .field("clock_skew", &self.clock_skew)
            .field("nonce_window", &self.nonce_window)
            .field("token_ttl", &self.token_ttl)
            .field("nonce_sweep_interval", &self.nonce_sweep_interval)
            .finish()
    }
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or(&lookup, PORT_ENV, DEFAULT_PORT)?;

        let mut registry = ClientRegistry::default();
        if let Some(inline) = lookup(CLIENTS_ENV).filter(|v| !v.trim().is_empty()) {
            registry.merge(ClientRegistry::parse_pairs(&inline)?)?;
        }
        if let Some(path) = lookup(CLIENTS_FILE_ENV).filter(|v| !v.trim().is_empty()) {
            registry.merge(ClientRegistry::from_json_file(PathBuf::from(path))?)?;
        }
        if registry.is_empty() {
            return Err(ConfigError::Missing("AUTH_CLIENTS or AUTH_CLIENTS_FILE"));
        }

        let token_signing_key = lookup(TOKEN_SIGNING_KEY_ENV)
            .ok_or(ConfigError::Missing(TOKEN_SIGNING_KEY_ENV))?
            .into_bytes();
        if token_signing_key.len() < MIN_SIGNING_KEY_LEN {
            return Err(ConfigError::Invalid {
                name: TOKEN_SIGNING_KEY_ENV,
                reason: format!("must be at least {MIN_SIGNING_KEY_LEN} bytes"),
            });
        }
        if registry.any_secret_matches(&token_signing_key) {
            return Err(ConfigError::Invalid {
                name: TOKEN_SIGNING_KEY_ENV,
                reason: "must not reuse a client secret".to_string(),
            });
        }

        Ok(Self {
            host,
            port,
            registry,
            token_signing_key,
            clock_skew: secs(&lookup, CLOCK_SKEW_ENV, DEFAULT_CLOCK_SKEW_SECS)?,
            nonce_window: secs(&lookup, NONCE_WINDOW_ENV, DEFAULT_NONCE_WINDOW_SECS)?,
            token_ttl: secs(&lookup, TOKEN_TTL_ENV, DEFAULT_TOKEN_TTL_SECS)?,
            nonce_sweep_interval: secs(&lookup, NONCE_SWEEP_ENV, DEFAULT_NONCE_SWEEP_SECS)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parse a positive number of seconds.
fn secs<F>(lookup: &F, name: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value: u64 = parse_or(lookup, name, default)?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_secs(value))
}
