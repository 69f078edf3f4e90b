// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # User Directory
//!
//! Application users keyed by the identity that signs them in. The auth
//! gate only reads from the directory; writes happen at startup (seed user)
//! and in tests.
//!
//! ## Backends
//!
//! - [`InMemoryUserDirectory`]: process-local, lost on restart
//! - [`RedbUserDirectory`]: embedded redb database at `{DATA_DIR}/users.redb`
//!
//! Both enforce unique emails and unique `(provider, identity_id)` pairs and
//! hand out ids sequentially from 1.

pub mod memory;
pub mod user_db;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

pub use memory::InMemoryUserDirectory;
pub use user_db::{RedbUserDirectory, UserDbError};

/// Issuer that vouches for a user's `identity_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityProvider {
    Keycloak,
}

impl IdentityProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityProvider::Keycloak => "keycloak",
        }
    }
}

impl fmt::Display for IdentityProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored application user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub full_name: String,
    pub email: String,
    /// Subject the identity provider issues for this user
    pub identity_id: String,
    pub identity_provider: IdentityProvider,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when creating a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub identity_id: String,
    pub identity_provider: IdentityProvider,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("user not found")]
    NotFound,

    #[error("user already exists: {0}")]
    AlreadyExists(String),

    #[error("user directory unavailable: {0}")]
    Storage(String),
}

/// Lookup and creation of application users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// User registered under `identity_id` with `provider`.
    async fn find_by_identity(
        &self,
        identity_id: &str,
        provider: IdentityProvider,
    ) -> Result<User, DirectoryError>;

    /// Store a new user and return it with its assigned id.
    async fn create_user(&self, user: NewUser) -> Result<User, DirectoryError>;
}

/// Return the user for `new_user`'s identity, creating it if absent.
pub async fn ensure_user(
    directory: &dyn UserDirectory,
    new_user: NewUser,
) -> Result<User, DirectoryError> {
    match directory
        .find_by_identity(&new_user.identity_id, new_user.identity_provider)
        .await
    {
        Ok(existing) => Ok(existing),
        Err(DirectoryError::NotFound) => {
            let user = directory.create_user(new_user).await?;
            info!(user_id = user.id, identity_id = %user.identity_id, "Created user");
            Ok(user)
        }
        Err(e) => Err(e),
    }
}

/// Index key for an email address; emails compare case-insensitively.
pub(crate) fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}
