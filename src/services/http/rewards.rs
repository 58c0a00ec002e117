use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use super::{identity::VerifiedUser, AppState};
use crate::{
    ledger::rewards::RewardAction,
    models::users::UserId,
    services::{self, rewards::RewardRequest, ServiceError},
};

async fn claim(
    state: &AppState,
    user_id: UserId,
    action: RewardAction,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = services::call(&state.reward_channel, "rewards", |response| {
        RewardRequest::Claim {
            user_id,
            action,
            response,
        }
    })
    .await?;

    Ok(Json(json!({
        "success": true,
        "reward": outcome.reward,
        "coin_balance": outcome.coin_balance,
        "referral_bonus": outcome.referral_bonus
    })))
}

pub async fn tap(
    State(state): State<AppState>,
    VerifiedUser(user_id): VerifiedUser,
) -> Result<impl IntoResponse, ServiceError> {
    claim(&state, user_id, RewardAction::Tap).await
}

pub async fn reward_ad(
    State(state): State<AppState>,
    VerifiedUser(user_id): VerifiedUser,
) -> Result<impl IntoResponse, ServiceError> {
    claim(&state, user_id, RewardAction::WatchAd).await
}

pub async fn spin(
    State(state): State<AppState>,
    VerifiedUser(user_id): VerifiedUser,
) -> Result<impl IntoResponse, ServiceError> {
    claim(&state, user_id, RewardAction::Spin).await
}

pub async fn daily(
    State(state): State<AppState>,
    VerifiedUser(user_id): VerifiedUser,
) -> Result<impl IntoResponse, ServiceError> {
    claim(&state, user_id, RewardAction::Daily).await
}

pub async fn shortlink(
    State(state): State<AppState>,
    VerifiedUser(user_id): VerifiedUser,
) -> Result<impl IntoResponse, ServiceError> {
    claim(&state, user_id, RewardAction::Shortlink).await
}
