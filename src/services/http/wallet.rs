use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use super::{extract::Payload, identity::VerifiedUser, AppState};
use crate::{
    ledger::withdrawals::WithdrawalForm,
    services::{self, wallet::WalletRequest, ServiceError},
};

#[derive(Deserialize)]
pub struct ConvertBody {
    amount: Option<i64>,
}

pub async fn withdraw(
    State(state): State<AppState>,
    VerifiedUser(user_id): VerifiedUser,
    Payload(form): Payload<WithdrawalForm>,
) -> Result<impl IntoResponse, ServiceError> {
    let request = services::call(&state.wallet_channel, "wallet", |response| {
        WalletRequest::Withdraw {
            user_id,
            form,
            response,
        }
    })
    .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Withdraw request submitted",
        "request": request
    })))
}

pub async fn withdrawals(
    State(state): State<AppState>,
    VerifiedUser(user_id): VerifiedUser,
) -> Result<impl IntoResponse, ServiceError> {
    let requests = services::call(&state.wallet_channel, "wallet", |response| {
        WalletRequest::ListWithdrawals { user_id, response }
    })
    .await?;

    Ok(Json(json!(requests)))
}

pub async fn convert(
    State(state): State<AppState>,
    VerifiedUser(user_id): VerifiedUser,
    Payload(body): Payload<ConvertBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let conversion = services::call(&state.wallet_channel, "wallet", |response| {
        WalletRequest::Convert {
            user_id,
            cash_amount: body.amount,
            response,
        }
    })
    .await?;

    Ok(Json(json!({
        "success": true,
        "converted_cash": conversion.converted_cash,
        "used_coin": conversion.used_coin,
        "coin_balance": conversion.coin_balance,
        "cash_balance": conversion.cash_balance
    })))
}
