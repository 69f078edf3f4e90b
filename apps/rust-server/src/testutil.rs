// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for unit tests: RSA signing keys, token minting and
//! in-process stand-ins for the key source and user directory.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, LazyLock, Mutex,
};

use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::{pkcs1::EncodeRsaPrivateKey, traits::PublicKeyParts, RsaPrivateKey};
use serde_json::{json, Value};

use crate::auth::jwks::{KeyError, KeySource, SigningKeyEntry, SigningKeySet};
use crate::storage::{DirectoryError, IdentityProvider, NewUser, User, UserDirectory};

pub const TEST_KID: &str = "test-key-id";
pub const CERTS_PATH: &str = "/realms/test-realm/protocol/openid-connect/certs";

/// An RSA key pair used to sign test tokens.
pub struct TestKeys {
    private: RsaPrivateKey,
    pkcs1_der: Vec<u8>,
}

impl TestKeys {
    fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, 2048).expect("Failed to generate RSA key");
        let pkcs1_der = private
            .to_pkcs1_der()
            .expect("Failed to encode RSA key")
            .as_bytes()
            .to_vec();
        Self { private, pkcs1_der }
    }

    pub fn modulus_bytes(&self) -> Vec<u8> {
        self.private.n().to_bytes_be()
    }

    /// Key set entry publishing this key under `kid`.
    pub fn entry(&self, kid: &str) -> SigningKeyEntry {
        SigningKeyEntry {
            kid: kid.to_string(),
            kty: "RSA".to_string(),
            alg: "RS256".to_string(),
            key_use: "sig".to_string(),
            n: Base64UrlUnpadded::encode_string(&self.modulus_bytes()),
            e: Base64UrlUnpadded::encode_string(&self.private.e().to_bytes_be()),
        }
    }

    pub fn key_set(&self) -> SigningKeySet {
        SigningKeySet {
            keys: vec![self.entry(TEST_KID)],
        }
    }

    pub fn key_set_json(&self) -> Value {
        serde_json::to_value(self.key_set()).expect("key set serializes")
    }

    pub fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_rsa_der(&self.pkcs1_der)
    }

    /// RS256 token with the given claims, signed under [`TEST_KID`].
    pub fn sign(&self, claims: &Value) -> String {
        self.sign_with(Algorithm::RS256, Some(TEST_KID), claims)
    }

    pub fn sign_with(&self, alg: Algorithm, kid: Option<&str>, claims: &Value) -> String {
        let mut header = Header::new(alg);
        header.kid = kid.map(str::to_string);
        jsonwebtoken::encode(&header, claims, &self.encoding_key()).expect("Failed to sign token")
    }
}

static PRIMARY_KEYS: LazyLock<TestKeys> = LazyLock::new(TestKeys::generate);
static FOREIGN_KEYS: LazyLock<TestKeys> = LazyLock::new(TestKeys::generate);

/// Key pair published by the test issuer.
pub fn test_keys() -> &'static TestKeys {
    &PRIMARY_KEYS
}

/// Key pair that no test key set publishes.
pub fn foreign_keys() -> &'static TestKeys {
    &FOREIGN_KEYS
}

pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// Claims for `sub` expiring an hour from now.
pub fn claims_for(sub: &str) -> Value {
    json!({
        "sub": sub,
        "email": "user@example.com",
        "exp": now() + 3600,
        "iat": now(),
    })
}

/// In-process key source serving a fixed key set and counting fetches.
#[derive(Default)]
pub struct StaticKeySource {
    set: SigningKeySet,
    fetches: AtomicUsize,
}

impl StaticKeySource {
    pub fn new(set: SigningKeySet) -> Self {
        Self {
            set,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Source publishing [`test_keys`] under [`TEST_KID`].
    pub fn with_test_keys() -> Arc<Self> {
        Arc::new(Self::new(test_keys().key_set()))
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn key_set(&self) -> Result<SigningKeySet, KeyError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.set.clone())
    }
}

/// Scripted outcome for [`StubDirectory`].
#[derive(Clone)]
pub enum Lookup {
    Found(User),
    NotFound,
    Fails(String),
}

/// User directory returning a scripted outcome and recording lookups.
pub struct StubDirectory {
    outcome: Lookup,
    calls: Mutex<Vec<(String, IdentityProvider)>>,
}

impl StubDirectory {
    pub fn new(outcome: Lookup) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(String, IdentityProvider)> {
        self.calls.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl UserDirectory for StubDirectory {
    async fn find_by_identity(
        &self,
        identity_id: &str,
        provider: IdentityProvider,
    ) -> Result<User, DirectoryError> {
        self.calls
            .lock()
            .expect("lock poisoned")
            .push((identity_id.to_string(), provider));
        match &self.outcome {
            Lookup::Found(user) => Ok(user.clone()),
            Lookup::NotFound => Err(DirectoryError::NotFound),
            Lookup::Fails(msg) => Err(DirectoryError::Storage(msg.clone())),
        }
    }

    async fn create_user(&self, _user: NewUser) -> Result<User, DirectoryError> {
        Err(DirectoryError::Storage("stub directory is read-only".to_string()))
    }
}

/// A stored user with the given numeric id.
pub fn user(id: u64, identity_id: &str, email: &str) -> User {
    User {
        id,
        full_name: "Test Player".to_string(),
        email: email.to_string(),
        identity_id: identity_id.to_string(),
        identity_provider: IdentityProvider::Keycloak,
        created_at: Utc::now(),
    }
}
