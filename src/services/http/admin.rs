use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use super::{
    extract::{Params, PathParam, Payload},
    identity::AdminUser,
    AppState,
};
use crate::{
    models::{economy::ConfigUpdate, users::UserId, withdrawals::WithdrawStatus},
    services::{self, admin::AdminRequest, ServiceError},
};

#[derive(Deserialize)]
pub struct Decision {
    #[serde(default)]
    request_id: String,
}

#[derive(Deserialize)]
pub struct StatusFilter {
    status: Option<WithdrawStatus>,
}

pub async fn approve_withdrawal(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Payload(decision): Payload<Decision>,
) -> Result<impl IntoResponse, ServiceError> {
    let request = services::call(&state.admin_channel, "admin", |response| {
        AdminRequest::ApproveWithdrawal {
            request_id: decision.request_id,
            response,
        }
    })
    .await?;

    log::info!("Admin {} approved withdrawal {}", admin_id, request.id);

    Ok(Json(json!({
        "success": true,
        "message": "Approved"
    })))
}

pub async fn reject_withdrawal(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Payload(decision): Payload<Decision>,
) -> Result<impl IntoResponse, ServiceError> {
    let request = services::call(&state.admin_channel, "admin", |response| {
        AdminRequest::RejectWithdrawal {
            request_id: decision.request_id,
            response,
        }
    })
    .await?;

    log::info!("Admin {} rejected withdrawal {}", admin_id, request.id);

    Ok(Json(json!({
        "success": true,
        "message": "Rejected and refunded"
    })))
}

pub async fn update_config(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Payload(update): Payload<ConfigUpdate>,
) -> Result<impl IntoResponse, ServiceError> {
    let (key, value) = services::call(&state.admin_channel, "admin", |response| {
        AdminRequest::UpdateConfig { update, response }
    })
    .await?;

    log::info!("Admin {} set {} to {}", admin_id, key, value);

    Ok(Json(json!({
        "success": true,
        "key": key,
        "value": value
    })))
}

pub async fn withdrawals(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Params(filter): Params<StatusFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let status = filter.status.unwrap_or(WithdrawStatus::Pending);
    let requests = services::call(&state.admin_channel, "admin", |response| {
        AdminRequest::ListWithdrawals { status, response }
    })
    .await?;

    Ok(Json(json!(requests)))
}

pub async fn reconcile(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    PathParam(user_id): PathParam<UserId>,
) -> Result<impl IntoResponse, ServiceError> {
    let report = services::call(&state.admin_channel, "admin", |response| {
        AdminRequest::Reconcile { user_id, response }
    })
    .await?;

    Ok(Json(json!({
        "balanced": report.is_balanced(),
        "report": report
    })))
}
