// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Maps a verified token's subject to an application user.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error};

use super::claims::{ClaimError, ResolvedIdentity, VerifiedClaims};
use crate::storage::{DirectoryError, IdentityProvider, UserDirectory};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("subject claim is unusable: {0}")]
    InvalidSubjectClaim(ClaimError),

    #[error("no user for subject")]
    UserNotFound,

    #[error("user lookup failed: {0}")]
    Internal(String),
}

/// Resolves token subjects against a [`UserDirectory`].
#[derive(Clone)]
pub struct IdentityResolver {
    directory: Arc<dyn UserDirectory>,
    provider: IdentityProvider,
}

impl IdentityResolver {
    /// Resolver for subjects issued by Keycloak.
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            directory,
            provider: IdentityProvider::Keycloak,
        }
    }

    pub async fn resolve(&self, claims: &VerifiedClaims) -> Result<ResolvedIdentity, ResolutionError> {
        let subject = claims
            .subject()
            .map_err(ResolutionError::InvalidSubjectClaim)?;

        match self.directory.find_by_identity(subject, self.provider).await {
            Ok(user) => Ok(ResolvedIdentity {
                user_id: user.id.to_string(),
                email: user.email,
            }),
            Err(DirectoryError::NotFound) => {
                debug!(subject, provider = %self.provider, "No user for token subject");
                Err(ResolutionError::UserNotFound)
            }
            Err(e) => {
                error!(
                    subject,
                    provider = %self.provider,
                    timestamp = %Utc::now().to_rfc3339(),
                    error = %e,
                    "Failed to resolve user"
                );
                Err(ResolutionError::Internal(e.to_string()))
            }
        }
    }
}
