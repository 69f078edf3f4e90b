// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process-local user directory.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{email_key, DirectoryError, IdentityProvider, NewUser, User, UserDirectory};

#[derive(Default)]
struct Users {
    by_id: HashMap<u64, User>,
    by_identity: HashMap<(IdentityProvider, String), u64>,
    by_email: HashMap<String, u64>,
    last_id: u64,
}

/// User directory held in memory; contents are lost on restart.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<Users>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.by_id.len()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_identity(
        &self,
        identity_id: &str,
        provider: IdentityProvider,
    ) -> Result<User, DirectoryError> {
        let users = self.users.read().await;
        users
            .by_identity
            .get(&(provider, identity_id.to_string()))
            .and_then(|id| users.by_id.get(id))
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, DirectoryError> {
        let mut users = self.users.write().await;

        let identity = (new_user.identity_provider, new_user.identity_id.clone());
        if users.by_identity.contains_key(&identity) {
            return Err(DirectoryError::AlreadyExists(format!(
                "identity {}",
                new_user.identity_id
            )));
        }
        let email = email_key(&new_user.email);
        if users.by_email.contains_key(&email) {
            return Err(DirectoryError::AlreadyExists(format!("email {}", new_user.email)));
        }

        users.last_id += 1;
        let user = User {
            id: users.last_id,
            full_name: new_user.full_name,
            email: new_user.email,
            identity_id: new_user.identity_id,
            identity_provider: new_user.identity_provider,
            created_at: Utc::now(),
        };
        users.by_identity.insert(identity, user.id);
        users.by_email.insert(email, user.id);
        users.by_id.insert(user.id, user.clone());
        Ok(user)
    }
}
