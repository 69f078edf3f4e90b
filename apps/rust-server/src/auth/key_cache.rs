// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory cache of decoded verification keys.
//!
//! Keys are cached per `kid` for a fixed TTL. Concurrent misses for the same
//! `kid` share one fetch. Failures are never cached, so an unknown `kid` is
//! looked up again on the next request; this is what lets a key rotated in by
//! the issuer become usable without a restart.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;

use super::jwks::{KeyError, KeySource, RsaPublicKey, SigningKeySet};

/// Default number of distinct `kid`s kept.
pub const DEFAULT_CACHE_CAPACITY: u64 = 64;

/// [`KeySource`] decorator caching decoded keys by `kid`.
pub struct CachedKeySource {
    inner: Arc<dyn KeySource>,
    cache: Cache<String, Arc<RsaPublicKey>>,
}

impl CachedKeySource {
    pub fn new(inner: Arc<dyn KeySource>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(DEFAULT_CACHE_CAPACITY)
            .time_to_live(ttl)
            .build();
        Self { inner, cache }
    }

    /// Drop every cached key.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

#[async_trait]
impl KeySource for CachedKeySource {
    /// Always fetched fresh; only decoded keys are cached.
    async fn key_set(&self) -> Result<SigningKeySet, KeyError> {
        self.inner.key_set().await
    }

    async fn public_key(&self, kid: &str) -> Result<Arc<RsaPublicKey>, KeyError> {
        if let Some(key) = self.cache.get(kid).await {
            return Ok(key);
        }

        debug!(kid, "Signing key cache miss");
        self.cache
            .try_get_with_by_ref(kid, self.inner.public_key(kid))
            .await
            .map_err(|e| (*e).clone())
    }
}
