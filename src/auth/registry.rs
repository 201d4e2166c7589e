// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Static registry of known client installations and their shared secrets.
//!
//! The registry is built once at startup and shared read-only behind an
//! `Arc`. Lookups go through [`ClientRegistry::get`] only; request paths
//! never iterate over the registered identifiers.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Maximum length of a client identifier, in characters.
pub const MAX_CLIENT_ID_LEN: usize = 100;

/// Errors raised while building the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid registry file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("entry #{0} is malformed (expected client_id:secret)")]
    MalformedEntry(usize),

    #[error("invalid client id {0:?} (1-100 visible ASCII characters)")]
    InvalidClientId(String),

    #[error("client {0:?} has an empty secret")]
    EmptySecret(String),

    #[error("client {0:?} is configured more than once")]
    DuplicateClient(String),
}

/// Shared secret of a client. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientSecret(Vec<u8>);

impl ClientSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClientSecret(<redacted>)")
    }
}

/// Check that a client id fits the identifier rules shared by the
/// registry and the login body.
pub fn is_valid_client_id(client_id: &str) -> bool {
    !client_id.is_empty()
        && client_id.len() <= MAX_CLIENT_ID_LEN
        && client_id.bytes().all(|b| b.is_ascii_graphic())
}

#[derive(Deserialize)]
struct RegistryFile {
    clients: Vec<RegistryFileEntry>,
}

#[derive(Deserialize)]
struct RegistryFileEntry {
    client_id: String,
    secret: String,
}

/// Mapping of client id to shared secret.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, ClientSecret>,
}

impl ClientRegistry {
    /// Parse the inline `client_id:secret,client_id:secret` format.
    ///
    /// The first `:` separates id from secret, so secrets may contain colons.
    pub fn parse_pairs(raw: &str) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        let entries = raw.split(',').map(str::trim).filter(|e| !e.is_empty());
        for (index, entry) in entries.enumerate() {
            let (client_id, secret) = entry
                .split_once(':')
                .ok_or(RegistryError::MalformedEntry(index + 1))?;
            registry.insert(client_id.trim(), ClientSecret::new(secret.trim()))?;
        }
        Ok(registry)
    }

    /// Load a JSON registry file of the form
    /// `{"clients": [{"client_id": "...", "secret": "..."}]}`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: RegistryFile = serde_json::from_str(&raw)?;

        let mut registry = Self::default();
        for entry in file.clients {
            registry.insert(&entry.client_id, ClientSecret::new(entry.secret))?;
        }
        Ok(registry)
    }

    /// Register a client. Rejects invalid ids, empty secrets and duplicates.
    pub fn insert(&mut self, client_id: &str, secret: ClientSecret) -> Result<(), RegistryError> {
        if !is_valid_client_id(client_id) {
            return Err(RegistryError::InvalidClientId(client_id.to_string()));
        }
        if secret.as_bytes().is_empty() {
            return Err(RegistryError::EmptySecret(client_id.to_string()));
        }
        if self.clients.contains_key(client_id) {
            return Err(RegistryError::DuplicateClient(client_id.to_string()));
        }
        self.clients.insert(client_id.to_string(), secret);
        Ok(())
    }

    /// Move every client of `other` into this registry.
    pub fn merge(&mut self, other: ClientRegistry) -> Result<(), RegistryError> {
        for (client_id, secret) in other.clients {
            self.insert(&client_id, secret)?;
        }
        Ok(())
    }

    pub fn get(&self, client_id: &str) -> Option<&ClientSecret> {
        self.clients.get(client_id)
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.clients.contains_key(client_id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Startup-only check used to keep the token key apart from client secrets.
    pub(crate) fn any_secret_matches(&self, candidate: &[u8]) -> bool {
        self.clients.values().any(|s| s.as_bytes() == candidate)
    }
}

impl fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("clients", &self.clients.len())
            .finish()
    }
}
