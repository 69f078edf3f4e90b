// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verified token claims and the identity attached to authenticated requests.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Why a claim could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ClaimError {
    #[error("claim is missing")]
    Missing,
    #[error("claim has the wrong type")]
    WrongType,
}

/// Payload of a token whose signature and expiry have been checked.
///
/// Only [`TokenVerifier`](super::verifier::TokenVerifier) constructs this.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedClaims(Map<String, Value>);

impl VerifiedClaims {
    pub(crate) fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    /// The `sub` claim, which must be a string.
    pub fn subject(&self) -> Result<&str, ClaimError> {
        self.string("sub")
    }

    /// The `email` claim, if present as a string.
    pub fn email(&self) -> Option<&str> {
        self.string("email").ok()
    }

    /// The `exp` claim as Unix seconds.
    pub fn expires_at(&self) -> Option<i64> {
        self.0.get("exp").and_then(Value::as_i64)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    fn string(&self, name: &str) -> Result<&str, ClaimError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Err(ClaimError::Missing),
            Some(Value::String(value)) => Ok(value),
            Some(_) => Err(ClaimError::WrongType),
        }
    }
}

/// The application user behind an authenticated request.
///
/// Inserted into request extensions by the auth gate; read it with
/// [`CurrentUser`](super::extractor::CurrentUser).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResolvedIdentity {
    /// Application user ID
    pub user_id: String,
    pub email: String,
}
