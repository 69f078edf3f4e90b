// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing key set (JWKS) fetching and RSA key decoding.
//!
//! Keycloak publishes each realm's signing keys at
//! `{url}/realms/{realm}/protocol/openid-connect/certs`. [`RemoteKeySet`]
//! fetches that document on every call; wrap it in
//! [`CachedKeySource`](super::key_cache::CachedKeySource) to avoid a network
//! round-trip per request.
//!
//! ## Failure modes
//!
//! | Failure | Error |
//! |---------|-------|
//! | transport error, timeout, non-2xx status | [`KeyError::FetchFailed`] |
//! | body is not a key set | [`KeyError::DecodeFailed`] |
//! | no entry with the requested `kid` | [`KeyError::NotFound`] |
//! | bad `n`/`e` encoding or non-RSA entry | [`KeyError::DecodeFailed`] |

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// Errors raised while obtaining a verification key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("failed to fetch signing keys: {0}")]
    FetchFailed(String),

    #[error("failed to decode signing keys: {0}")]
    DecodeFailed(String),

    #[error("no signing key with kid `{0}`")]
    NotFound(String),
}

/// One entry of a published key set.
///
/// Fields default to empty strings so that entries Keycloak publishes for
/// other purposes (for example `RSA-OAEP` encryption keys) still parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKeyEntry {
    #[serde(default)]
    pub kid: String,
    #[serde(default)]
    pub kty: String,
    #[serde(default)]
    pub alg: String,
    #[serde(default, rename = "use")]
    pub key_use: String,
    /// RSA modulus, base64url without padding, big-endian
    #[serde(default)]
    pub n: String,
    /// RSA public exponent, base64url without padding, big-endian
    #[serde(default)]
    pub e: String,
}

impl SigningKeyEntry {
    /// Decode the modulus and exponent into an RSA public key.
    pub fn to_public_key(&self) -> Result<RsaPublicKey, KeyError> {
        if !self.kty.is_empty() && self.kty != "RSA" {
            return Err(KeyError::DecodeFailed(format!(
                "key `{}` has unsupported key type `{}`",
                self.kid, self.kty
            )));
        }

        let modulus = Base64UrlUnpadded::decode_vec(&self.n)
            .map_err(|e| KeyError::DecodeFailed(format!("failed to decode n: {e}")))?;
        let exponent = Base64UrlUnpadded::decode_vec(&self.e)
            .map_err(|e| KeyError::DecodeFailed(format!("failed to decode e: {e}")))?;

        RsaPublicKey::from_be_bytes(&modulus, &exponent)
    }
}

/// The `keys` document served by the certs endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKeySet {
    #[serde(default)]
    pub keys: Vec<SigningKeyEntry>,
}

impl SigningKeySet {
    /// Parse a key set from a response body.
    pub fn from_json(body: &[u8]) -> Result<Self, KeyError> {
        serde_json::from_slice(body).map_err(|e| KeyError::DecodeFailed(e.to_string()))
    }

    /// First entry whose `kid` matches.
    pub fn find(&self, kid: &str) -> Result<&SigningKeyEntry, KeyError> {
        self.keys
            .iter()
            .find(|key| key.kid == kid)
            .ok_or_else(|| KeyError::NotFound(kid.to_string()))
    }

    /// Find the entry for `kid` and decode it.
    pub fn public_key(&self, kid: &str) -> Result<RsaPublicKey, KeyError> {
        self.find(kid)?.to_public_key()
    }
}

/// RSA public key decoded from a key set entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicKey {
    /// Big-endian modulus without leading zero bytes
    modulus: Vec<u8>,
    exponent: u64,
}

impl RsaPublicKey {
    pub fn from_be_bytes(modulus: &[u8], exponent: &[u8]) -> Result<Self, KeyError> {
        let modulus = strip_leading_zeros(modulus);
        if modulus.is_empty() {
            return Err(KeyError::DecodeFailed("modulus is empty".to_string()));
        }

        let exponent = strip_leading_zeros(exponent);
        if exponent.is_empty() || exponent.len() > 8 {
            return Err(KeyError::DecodeFailed(format!(
                "exponent must be 1 to 8 bytes, got {}",
                exponent.len()
            )));
        }
        let exponent = exponent
            .iter()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));

        Ok(Self {
            modulus: modulus.to_vec(),
            exponent,
        })
    }

    pub fn modulus(&self) -> &[u8] {
        &self.modulus
    }

    pub fn exponent(&self) -> u64 {
        self.exponent
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        let leading = self.modulus[0].leading_zeros() as usize;
        self.modulus.len() * 8 - leading
    }

    /// Key usable with `jsonwebtoken::decode`.
    pub fn decoding_key(&self) -> DecodingKey {
        let exponent = self.exponent.to_be_bytes();
        DecodingKey::from_rsa_raw_components(&self.modulus, strip_leading_zeros(&exponent))
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// Source of verification keys.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Current key set as published by the issuer.
    async fn key_set(&self) -> Result<SigningKeySet, KeyError>;

    /// Public key for `kid`.
    async fn public_key(&self, kid: &str) -> Result<Arc<RsaPublicKey>, KeyError> {
        let set = self.key_set().await?;
        set.public_key(kid).map(Arc::new)
    }
}

/// Fetches the key set from the issuer on every call.
#[derive(Debug, Clone)]
pub struct RemoteKeySet {
    certs_url: Url,
    client: reqwest::Client,
}

impl RemoteKeySet {
    /// Create a fetcher for `certs_url` whose requests give up after `timeout`.
    pub fn new(certs_url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { certs_url, client })
    }

    pub fn certs_url(&self) -> &Url {
        &self.certs_url
    }
}

#[async_trait]
impl KeySource for RemoteKeySet {
    async fn key_set(&self) -> Result<SigningKeySet, KeyError> {
        debug!(url = %self.certs_url, "Fetching signing keys");

        let response = self
            .client
            .get(self.certs_url.clone())
            .send()
            .await
            .map_err(|e| KeyError::FetchFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(KeyError::FetchFailed(format!(
                "HTTP {} from signing key endpoint",
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| KeyError::FetchFailed(e.to_string()))?;

        let set = SigningKeySet::from_json(&body)?;
        debug!(url = %self.certs_url, keys = set.keys.len(), "Fetched signing keys");
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{test_keys, CERTS_PATH, TEST_KID};
    use serde_json::json;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn remote(server: &MockServer) -> RemoteKeySet {
        let url = Url::parse(&format!("{}{CERTS_PATH}", server.uri())).unwrap();
        RemoteKeySet::new(url, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn decodes_valid_entry() {
        let keys = test_keys();
        let decoded = keys.entry(TEST_KID).to_public_key().unwrap();
        assert_eq!(decoded.modulus(), keys.modulus_bytes().as_slice());
        assert_eq!(decoded.exponent(), 65537);
        assert_eq!(decoded.bits(), 2048);
    }

    #[test]
    fn rejects_bad_modulus_encoding() {
        let mut entry = test_keys().entry(TEST_KID);
        entry.n = "invalid-base64!!!".to_string();
        assert!(matches!(entry.to_public_key(), Err(KeyError::DecodeFailed(_))));
    }

    #[test]
    fn rejects_bad_exponent_encoding() {
        let mut entry = test_keys().entry(TEST_KID);
        entry.e = "invalid-base64!!!".to_string();
        assert!(matches!(entry.to_public_key(), Err(KeyError::DecodeFailed(_))));
    }

    #[test]
    fn rejects_padded_encoding() {
        let mut entry = test_keys().entry(TEST_KID);
        entry.e = "AQAB==".to_string();
        assert!(matches!(entry.to_public_key(), Err(KeyError::DecodeFailed(_))));
    }

    #[test]
    fn rejects_non_rsa_entry() {
        let mut entry = test_keys().entry(TEST_KID);
        entry.kty = "EC".to_string();
        assert!(matches!(entry.to_public_key(), Err(KeyError::DecodeFailed(_))));
    }

    #[test]
    fn rejects_oversized_exponent() {
        let result = RsaPublicKey::from_be_bytes(&[0xC3; 256], &[1; 9]);
        assert!(matches!(result, Err(KeyError::DecodeFailed(_))));
    }

    #[test]
    fn rejects_empty_modulus() {
        let result = RsaPublicKey::from_be_bytes(&[0, 0], &[1, 0, 1]);
        assert!(matches!(result, Err(KeyError::DecodeFailed(_))));
    }

    #[test]
    fn leading_zero_bytes_are_ignored() {
        let key = RsaPublicKey::from_be_bytes(&[0, 0x80, 0x01], &[0, 0, 1, 0, 1]).unwrap();
        assert_eq!(key.modulus(), &[0x80, 0x01]);
        assert_eq!(key.exponent(), 65537);
        assert_eq!(key.bits(), 16);
    }

    #[test]
    fn find_selects_matching_kid() {
        let set = SigningKeySet {
            keys: vec![
                SigningKeyEntry {
                    kid: "enc-key".to_string(),
                    key_use: "enc".to_string(),
                    ..Default::default()
                },
                test_keys().entry(TEST_KID),
            ],
        };
        assert_eq!(set.find(TEST_KID).unwrap().kid, TEST_KID);
        assert_eq!(
            set.find("missing").unwrap_err(),
            KeyError::NotFound("missing".to_string())
        );
    }

    #[test]
    fn parses_keycloak_document_with_extra_fields() {
        let body = json!({
            "keys": [{
                "kid": "abc",
                "kty": "RSA",
                "alg": "RS256",
                "use": "sig",
                "n": "sXch",
                "e": "AQAB",
                "x5c": ["MIIC..."],
                "x5t": "thumb"
            }]
        });
        let set = SigningKeySet::from_json(body.to_string().as_bytes()).unwrap();
        assert_eq!(set.keys.len(), 1);
        assert_eq!(set.keys[0].key_use, "sig");
        assert_eq!(set.keys[0].alg, "RS256");
    }

    #[tokio::test]
    async fn fetches_key_from_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CERTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(test_keys().key_set_json()))
            .expect(1)
            .mount(&server)
            .await;

        let key = remote(&server).public_key(TEST_KID).await.unwrap();
        assert_eq!(key.exponent(), 65537);
    }

    #[tokio::test]
    async fn unknown_kid_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CERTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(test_keys().key_set_json()))
            .mount(&server)
            .await;

        let err = remote(&server).public_key("non-existent-key-id").await.unwrap_err();
        assert_eq!(err, KeyError::NotFound("non-existent-key-id".to_string()));
    }

    #[tokio::test]
    async fn malformed_body_is_decode_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CERTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let err = remote(&server).key_set().await.unwrap_err();
        assert!(matches!(err, KeyError::DecodeFailed(_)));
    }

    #[tokio::test]
    async fn error_status_is_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CERTS_PATH))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = remote(&server).key_set().await.unwrap_err();
        assert!(matches!(err, KeyError::FetchFailed(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_fetch_failure() {
        let url = Url::parse("http://127.0.0.1:9/realms/r/protocol/openid-connect/certs").unwrap();
        let source = RemoteKeySet::new(url, Duration::from_secs(2)).unwrap();
        let err = source.key_set().await.unwrap_err();
        assert!(matches!(err, KeyError::FetchFailed(_)));
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CERTS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(test_keys().key_set_json())
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}{CERTS_PATH}", server.uri())).unwrap();
        let source = RemoteKeySet::new(url, Duration::from_millis(200)).unwrap();
        let err = source.key_set().await.unwrap_err();
        assert!(matches!(err, KeyError::FetchFailed(_)));
    }

    #[tokio::test]
    async fn every_call_refetches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CERTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(test_keys().key_set_json()))
            .expect(2)
            .mount(&server)
            .await;

        let source = remote(&server);
        source.public_key(TEST_KID).await.unwrap();
        source.public_key(TEST_KID).await.unwrap();
    }
}
