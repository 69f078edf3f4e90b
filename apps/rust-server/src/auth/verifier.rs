// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification.
//!
//! A token passes through four checks, and the first failure stops it:
//!
//! 1. **Header**: three segments, decodable JSON header, `alg` pinned to
//!    RS256/RS384/RS512, non-empty string `kid`. Nothing is fetched for a
//!    token that fails here.
//! 2. **Key resolution**: public key for `kid` from the [`KeySource`].
//! 3. **Signature**: checked with the pinned algorithm.
//! 4. **Claims**: `exp` is required and must be in the future (within the
//!    configured leeway); `nbf` is honoured when present.
//!
//! [`VerifyError::stage`] reports where a token failed. HTTP callers collapse
//! every failure into one "invalid token" response and keep the detail for
//! logs.

use std::{fmt, sync::Arc};

use base64ct::{Base64UrlUnpadded, Encoding};
use jsonwebtoken::{errors::ErrorKind, Algorithm, Validation};
use serde_json::{Map, Value};

use super::claims::VerifiedClaims;
use super::jwks::{KeyError, KeySource};

/// Check a token stopped at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStage {
    Header,
    KeyResolution,
    Signature,
    Claims,
}

impl VerificationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStage::Header => "header",
            VerificationStage::KeyResolution => "key_resolution",
            VerificationStage::Signature => "signature",
            VerificationStage::Claims => "claims",
        }
    }
}

impl fmt::Display for VerificationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token verification failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VerifyError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("token header has no usable kid")]
    KeyIdMissing,

    #[error(transparent)]
    KeyResolution(#[from] KeyError),

    #[error("signature verification failed: {0}")]
    Signature(String),

    #[error("token has expired")]
    Expired,

    #[error("token is not valid yet")]
    NotYetValid,

    #[error("missing required claim `{0}`")]
    MissingClaim(String),
}

impl VerifyError {
    pub fn stage(&self) -> VerificationStage {
        match self {
            VerifyError::Malformed(_) | VerifyError::UnsupportedAlgorithm(_) => {
                VerificationStage::Header
            }
            VerifyError::KeyIdMissing | VerifyError::KeyResolution(_) => {
                VerificationStage::KeyResolution
            }
            VerifyError::Signature(_) => VerificationStage::Signature,
            VerifyError::Expired | VerifyError::NotYetValid | VerifyError::MissingClaim(_) => {
                VerificationStage::Claims
            }
        }
    }
}

/// Verifies RSA-signed tokens against keys from a [`KeySource`].
#[derive(Clone)]
pub struct TokenVerifier {
    keys: Arc<dyn KeySource>,
    leeway_secs: u64,
}

impl TokenVerifier {
    pub fn new(keys: Arc<dyn KeySource>, leeway_secs: u64) -> Self {
        Self { keys, leeway_secs }
    }

    /// Verify `token` and return its payload.
    pub async fn verify(&self, token: &str) -> Result<VerifiedClaims, VerifyError> {
        let header = parse_header(token)?;
        let algorithm = pinned_algorithm(&header)?;
        let kid = match header.get("kid") {
            Some(Value::String(kid)) if !kid.is_empty() => kid.as_str(),
            _ => return Err(VerifyError::KeyIdMissing),
        };

        let key = self.keys.public_key(kid).await?;

        let mut validation = Validation::new(algorithm);
        validation.leeway = self.leeway_secs;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        let data = jsonwebtoken::decode::<Map<String, Value>>(token, &key.decoding_key(), &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => VerifyError::Expired,
                ErrorKind::ImmatureSignature => VerifyError::NotYetValid,
                ErrorKind::MissingRequiredClaim(claim) => VerifyError::MissingClaim(claim.clone()),
                ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) | ErrorKind::InvalidToken => {
                    VerifyError::Malformed(e.to_string())
                }
                _ => VerifyError::Signature(e.to_string()),
            })?;

        Ok(VerifiedClaims::new(data.claims))
    }
}

/// Decode the header segment without trusting it.
fn parse_header(token: &str) -> Result<Map<String, Value>, VerifyError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(VerifyError::Malformed(format!(
            "expected 3 segments, got {}",
            segments.len()
        )));
    }

    let bytes = Base64UrlUnpadded::decode_vec(segments[0])
        .map_err(|e| VerifyError::Malformed(format!("header encoding: {e}")))?;
    match serde_json::from_slice(&bytes) {
        Ok(Value::Object(header)) => Ok(header),
        Ok(_) => Err(VerifyError::Malformed("header is not an object".to_string())),
        Err(e) => Err(VerifyError::Malformed(format!("header json: {e}"))),
    }
}

fn pinned_algorithm(header: &Map<String, Value>) -> Result<Algorithm, VerifyError> {
    match header.get("alg") {
        Some(Value::String(alg)) => match alg.as_str() {
            "RS256" => Ok(Algorithm::RS256),
            "RS384" => Ok(Algorithm::RS384),
            "RS512" => Ok(Algorithm::RS512),
            other => Err(VerifyError::UnsupportedAlgorithm(other.to_string())),
        },
        Some(other) => Err(VerifyError::UnsupportedAlgorithm(other.to_string())),
        None => Err(VerifyError::UnsupportedAlgorithm("none given".to_string())),
    }
}
