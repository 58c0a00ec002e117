use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use super::{
    extract::{Params, Payload},
    identity::VerifiedUser,
    AppState,
};
use crate::{
    models::users::Registration,
    services::{self, users::UserRequest, ServiceError},
};

#[derive(Deserialize)]
pub struct LedgerQuery {
    limit: Option<i64>,
}

pub async fn register(
    State(state): State<AppState>,
    VerifiedUser(user_id): VerifiedUser,
    Payload(registration): Payload<Registration>,
) -> Result<impl IntoResponse, ServiceError> {
    let registered = services::call(&state.user_channel, "users", |response| {
        UserRequest::Register {
            user_id,
            registration,
            response,
        }
    })
    .await?;

    let status = if registered.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(json!({
            "success": true,
            "created": registered.created,
            "join_bonus": registered.join_bonus,
            "user": registered.user
        })),
    ))
}

pub async fn profile(
    State(state): State<AppState>,
    VerifiedUser(user_id): VerifiedUser,
) -> Result<impl IntoResponse, ServiceError> {
    let profile = services::call(&state.user_channel, "users", |response| {
        UserRequest::GetProfile { user_id, response }
    })
    .await?;

    Ok(Json(json!(profile)))
}

pub async fn referrals(
    State(state): State<AppState>,
    VerifiedUser(user_id): VerifiedUser,
) -> Result<impl IntoResponse, ServiceError> {
    let referrals = services::call(&state.user_channel, "users", |response| {
        UserRequest::GetReferrals { user_id, response }
    })
    .await?;

    Ok(Json(json!(referrals)))
}

pub async fn referral_history(
    State(state): State<AppState>,
    VerifiedUser(user_id): VerifiedUser,
) -> Result<impl IntoResponse, ServiceError> {
    let history = services::call(&state.user_channel, "users", |response| {
        UserRequest::GetReferralHistory { user_id, response }
    })
    .await?;

    Ok(Json(json!(history)))
}

pub async fn ledger(
    State(state): State<AppState>,
    VerifiedUser(user_id): VerifiedUser,
    Params(query): Params<LedgerQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let limit = query.limit.unwrap_or(50);
    let entries = services::call(&state.user_channel, "users", |response| {
        UserRequest::GetLedger {
            user_id,
            limit,
            response,
        }
    })
    .await?;

    Ok(Json(json!(entries)))
}
