use axum::{extract::FromRequestParts, http::request::Parts, http::StatusCode, Json};
use serde_json::Value;

use super::{failure, AppState};
use crate::{
    models::users::UserId,
    services::{self, users::UserRequest},
};

/// Caller identity as asserted by the upstream auth layer.
pub struct VerifiedUser(pub UserId);

/// A verified caller that is also listed in `admin_users`.
pub struct AdminUser(pub UserId);

impl FromRequestParts<AppState> for VerifiedUser {
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(state.identity_header.as_ref())
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<UserId>().ok())
            .map(VerifiedUser)
            .ok_or_else(|| failure(StatusCode::UNAUTHORIZED, "Unauthorized"))
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let VerifiedUser(user_id) = VerifiedUser::from_request_parts(parts, state).await?;

        let is_admin = services::call(&state.user_channel, "users", |response| {
            UserRequest::IsAdmin { user_id, response }
        })
        .await;

        match is_admin {
            Ok(true) => Ok(AdminUser(user_id)),
            Ok(false) => Err(failure(StatusCode::FORBIDDEN, "Access denied")),
            Err(e) => {
                log::error!("Admin check for user {} failed: {}", user_id, e);
                Err(failure(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                ))
            }
        }
    }
}
