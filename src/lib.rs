// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! DealWatch Auth Server - signed client login and session tokens
//!
//! Registered desktop clients prove possession of a shared secret by signing
//! each login request with HMAC-SHA256. A valid, fresh, never-seen request is
//! exchanged for a short-lived HS256 session token that other endpoints
//! accept as a bearer credential.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Request signatures, replay protection and session tokens
//! - `config` - Environment-driven settings
//! - `telemetry` - Tracing subscriber setup

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod state;
pub mod telemetry;
