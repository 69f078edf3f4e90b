// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::identity::ResolutionError;

/// Rejection returned by the auth gate.
///
/// Messages are fixed; the cause of a verification failure is logged, never
/// returned to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No authorization header present
    MissingToken,
    /// Header is not `Bearer <token>`
    InvalidTokenFormat,
    /// Signature, expiry, algorithm or key failure
    InvalidToken,
    /// `sub` is missing or not a string
    InvalidSubjectClaim,
    /// Token is valid but no user is registered for it
    UserNotFound,
    /// User directory failure
    InternalError,
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: &'static str,
    code: &'static str,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::InvalidTokenFormat => "INVALID_TOKEN_FORMAT",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::InvalidSubjectClaim => "INVALID_SUBJECT_CLAIM",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "Authorization header required",
            AuthError::InvalidTokenFormat => "Invalid authorization format",
            AuthError::InvalidToken => "Invalid or expired token",
            AuthError::InvalidSubjectClaim => "Invalid subject claim in token",
            AuthError::UserNotFound => "User not found",
            AuthError::InternalError => "Failed to resolve user",
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for AuthError {}

impl From<&ResolutionError> for AuthError {
    fn from(err: &ResolutionError) -> Self {
        match err {
            ResolutionError::InvalidSubjectClaim(_) => AuthError::InvalidSubjectClaim,
            ResolutionError::UserNotFound => AuthError::UserNotFound,
            ResolutionError::Internal(_) => AuthError::InternalError,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(AuthErrorBody {
            error: self.message(),
            code: self.code(),
        });
        (self.status_code(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::ClaimError;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn missing_token_returns_401() {
        let response = AuthError::MissingToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error"], "Authorization header required");
        assert_eq!(body["code"], "MISSING_TOKEN");
    }

    #[tokio::test]
    async fn internal_error_returns_500() {
        let response = AuthError::InternalError.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error"], "Failed to resolve user");
        assert_eq!(body["code"], "INTERNAL_ERROR");
    }

    #[test]
    fn resolution_errors_map_to_codes() {
        let cases = [
            (
                ResolutionError::InvalidSubjectClaim(ClaimError::WrongType),
                "INVALID_SUBJECT_CLAIM",
                StatusCode::UNAUTHORIZED,
            ),
            (ResolutionError::UserNotFound, "USER_NOT_FOUND", StatusCode::UNAUTHORIZED),
            (
                ResolutionError::Internal("db down".to_string()),
                "INTERNAL_ERROR",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, code, status) in cases {
            let auth = AuthError::from(&err);
            assert_eq!(auth.code(), code);
            assert_eq!(auth.status_code(), status);
        }
    }

    #[test]
    fn display_uses_client_message() {
        assert_eq!(AuthError::InvalidToken.to_string(), "Invalid or expired token");
        assert_eq!(
            AuthError::InvalidTokenFormat.to_string(),
            "Invalid authorization format"
        );
    }
}
