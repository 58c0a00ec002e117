use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use super::{
    admin::AdminRequest, rewards::RewardRequest, users::UserRequest, wallet::WalletRequest,
    ServiceError,
};
use crate::ledger::EconomyError;

mod admin;
mod extract;
mod identity;
mod rewards;
mod users;
mod wallet;

#[derive(Clone)]
pub struct AppState {
    user_channel: mpsc::Sender<UserRequest>,
    reward_channel: mpsc::Sender<RewardRequest>,
    wallet_channel: mpsc::Sender<WalletRequest>,
    admin_channel: mpsc::Sender<AdminRequest>,
    identity_header: Arc<str>,
}

impl AppState {
    pub fn new(
        user_channel: mpsc::Sender<UserRequest>,
        reward_channel: mpsc::Sender<RewardRequest>,
        wallet_channel: mpsc::Sender<WalletRequest>,
        admin_channel: mpsc::Sender<AdminRequest>,
        identity_header: &str,
    ) -> Self {
        AppState {
            user_channel,
            reward_channel,
            wallet_channel,
            admin_channel,
            identity_header: Arc::from(identity_header.to_ascii_lowercase()),
        }
    }
}

pub(crate) fn failure(status: StatusCode, message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        status,
        Json(json!({
            "success": false,
            "message": message
        })),
    )
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::Economy(error) => match error {
                EconomyError::Validation(_)
                | EconomyError::InsufficientBalance(_)
                | EconomyError::QuotaExceeded(_)
                | EconomyError::InvalidState(_)
                | EconomyError::NotFound(_) => StatusCode::BAD_REQUEST,
                EconomyError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
                EconomyError::ConfigMissing(_)
                | EconomyError::Misconfigured(_)
                | EconomyError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServiceError::Communication(_, _) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("Request failed: {}", self);
            return failure(status, "Internal server error").into_response();
        }

        failure(status, &self.to_string()).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/users/register", post(users::register))
        .route("/user", get(users::profile))
        .route("/referrals", get(users::referrals))
        .route("/referral-history", get(users::referral_history))
        .route("/ledger", get(users::ledger))
        .route("/tap", post(rewards::tap))
        .route("/reward-ad", post(rewards::reward_ad))
        .route("/spin", post(rewards::spin))
        .route("/daily", post(rewards::daily))
        .route("/shortlink", post(rewards::shortlink))
        .route("/withdraw", post(wallet::withdraw))
        .route("/withdrawals", get(wallet::withdrawals))
        .route("/convert", post(wallet::convert))
        .route("/admin/withdraw/approve", post(admin::approve_withdrawal))
        .route("/admin/withdraw/reject", post(admin::reject_withdrawal))
        .route("/admin/update-config", post(admin::update_config))
        .route("/admin/withdrawals", get(admin::withdrawals))
        .route("/admin/reconcile/{user_id}", get(admin::reconcile))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(state: AppState, listen: &str) -> Result<(), anyhow::Error> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
