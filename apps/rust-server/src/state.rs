// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{path::PathBuf, sync::Arc};

use crate::auth::{AuthGate, IdentityResolver, KeySource, TokenVerifier};
use crate::storage::UserDirectory;

#[derive(Clone)]
pub struct AppState {
    pub gate: AuthGate,
    pub keys: Arc<dyn KeySource>,
    pub users: Arc<dyn UserDirectory>,
    /// Directory holding the user database, when persistent
    pub data_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(keys: Arc<dyn KeySource>, users: Arc<dyn UserDirectory>, leeway_secs: u64) -> Self {
        let gate = AuthGate::new(
            TokenVerifier::new(keys.clone(), leeway_secs),
            IdentityResolver::new(users.clone()),
        );
        Self {
            gate,
            keys,
            users,
            data_dir: None,
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }
}
