// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{CurrentUser, ResolvedIdentity};

/// Response for GET /v1/users/me
#[derive(Debug, Serialize, ToSchema)]
pub struct UserMeResponse {
    /// Application user ID
    pub user_id: String,
    pub email: String,
}

impl From<ResolvedIdentity> for UserMeResponse {
    fn from(identity: ResolvedIdentity) -> Self {
        Self {
            user_id: identity.user_id,
            email: identity.email,
        }
    }
}

/// Get the current authenticated user's information.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User information", body = UserMeResponse),
        (status = 401, description = "Unauthorized - invalid or missing token, or unknown user"),
        (status = 500, description = "User directory unavailable"),
    )
)]
pub async fn get_current_user(CurrentUser(user): CurrentUser) -> Json<UserMeResponse> {
    Json(user.into())
}
