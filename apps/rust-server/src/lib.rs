// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Micro Stakes API - bearer token gate
//!
//! Verifies Keycloak-issued RSA access tokens against the realm's published
//! signing keys and resolves them to local users before requests reach the
//! API handlers.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token verification, key fetching and the auth middleware
//! - `storage` - User directory (in-memory or redb)
//! - `config` - Environment configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod state;
pub mod storage;

#[cfg(test)]
pub(crate) mod testutil;
