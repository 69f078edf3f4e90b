// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Bearer-token authentication against a Keycloak realm.
//!
//! ## Auth Flow
//!
//! 1. Client authenticates with Keycloak and sends `Authorization: Bearer <JWT>`
//! 2. [`require_auth`] parses the header
//! 3. [`TokenVerifier`]:
//!    - Pins `alg` to RS256/RS384/RS512 before touching the network
//!    - Resolves the public key for the header `kid` from the realm's certs
//!      endpoint (through [`CachedKeySource`] when caching is enabled)
//!    - Verifies signature and expiry
//! 4. [`IdentityResolver`] maps `sub` to a local user
//! 5. The handler reads the result with the [`CurrentUser`] extractor
//!
//! ## Security
//!
//! - Only `/health*`, `/docs` and the OpenAPI document are reachable without a token
//! - Every verification failure returns the same `INVALID_TOKEN` response; the
//!   reason is logged with the stage it failed at
//! - Failed key fetches are never cached

pub mod claims;
pub mod error;
pub mod extractor;
pub mod identity;
pub mod jwks;
pub mod key_cache;
pub mod middleware;
pub mod verifier;

pub use claims::{ResolvedIdentity, VerifiedClaims};
pub use error::AuthError;
pub use extractor::CurrentUser;
pub use identity::IdentityResolver;
pub use jwks::{KeySource, RemoteKeySet};
pub use key_cache::CachedKeySource;
pub use middleware::{require_auth, AuthGate};
pub use verifier::TokenVerifier;
