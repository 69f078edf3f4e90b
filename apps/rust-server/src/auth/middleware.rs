// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! Apply [`require_auth`] to a router subtree with
//! `axum::middleware::from_fn_with_state`:
//!
//! ```rust,ignore
//! let protected = Router::new()
//!     .route("/users/me", get(me))
//!     .route_layer(middleware::from_fn_with_state(gate, require_auth));
//! ```
//!
//! A request that passes carries a [`ResolvedIdentity`] in its extensions;
//! one that fails gets an [`AuthError`] response and never reaches the
//! handler.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use super::claims::ResolvedIdentity;
use super::identity::{IdentityResolver, ResolutionError};
use super::verifier::TokenVerifier;
use super::AuthError;

/// Verifier and resolver shared by every gated request.
#[derive(Clone)]
pub struct AuthGate {
    verifier: TokenVerifier,
    resolver: IdentityResolver,
}

impl AuthGate {
    pub fn new(verifier: TokenVerifier, resolver: IdentityResolver) -> Self {
        Self { verifier, resolver }
    }

    /// Authenticate a request from its headers.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<ResolvedIdentity, AuthError> {
        let token = parse_bearer(headers.get(AUTHORIZATION))?;

        let claims = self.verifier.verify(token).await.map_err(|e| {
            warn!(stage = %e.stage(), reason = %e, "Token verification failed");
            AuthError::InvalidToken
        })?;

        let identity = self.resolver.resolve(&claims).await.map_err(|e| {
            if let ResolutionError::InvalidSubjectClaim(reason) = &e {
                warn!(%reason, "Token subject claim rejected");
            }
            AuthError::from(&e)
        })?;

        debug!(
            user_id = %identity.user_id,
            expires_at = ?claims.expires_at(),
            "Request authenticated"
        );
        Ok(identity)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// The header must split on single spaces into exactly two parts, the first
/// being `Bearer`.
pub fn parse_bearer(header: Option<&HeaderValue>) -> Result<&str, AuthError> {
    let header = match header {
        Some(value) if !value.is_empty() => value,
        _ => return Err(AuthError::MissingToken),
    };
    let value = header.to_str().map_err(|_| AuthError::InvalidTokenFormat)?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Ok(token),
        _ => Err(AuthError::InvalidTokenFormat),
    }
}

/// Authentication middleware function.
pub async fn require_auth(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Response {
    match gate.authenticate(request.headers()).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}
