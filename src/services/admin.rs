use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::{
    ledger::{self, economy, engine, withdrawals, EconomyError},
    models::{
        economy::{ConfigKey, ConfigUpdate},
        ledger::Reconciliation,
        users::UserId,
        withdrawals::{WithdrawRequest, WithdrawStatus},
    },
    repositories::Store,
};

pub enum AdminRequest {
    ApproveWithdrawal {
        request_id: String,
        response: oneshot::Sender<Result<WithdrawRequest, ServiceError>>,
    },
    RejectWithdrawal {
        request_id: String,
        response: oneshot::Sender<Result<WithdrawRequest, ServiceError>>,
    },
    UpdateConfig {
        update: ConfigUpdate,
        response: oneshot::Sender<Result<(ConfigKey, i64), ServiceError>>,
    },
    ListWithdrawals {
        status: WithdrawStatus,
        response: oneshot::Sender<Result<Vec<WithdrawRequest>, ServiceError>>,
    },
    Reconcile {
        user_id: UserId,
        response: oneshot::Sender<Result<Reconciliation, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct AdminRequestHandler {
    store: Arc<dyn Store>,
}

impl AdminRequestHandler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        AdminRequestHandler { store }
    }

    async fn decide(
        &self,
        request_id: &str,
        status: WithdrawStatus,
    ) -> Result<WithdrawRequest, ServiceError> {
        let request_id = request_id.trim();
        if request_id.is_empty() {
            return Err(EconomyError::Validation("Request id required".to_string()).into());
        }

        let mut uow = self.store.begin().await.map_err(EconomyError::Storage)?;
        let result = match status {
            WithdrawStatus::Approved => {
                withdrawals::approve(uow.as_mut(), request_id, Utc::now()).await
            }
            WithdrawStatus::Rejected => {
                withdrawals::reject(uow.as_mut(), request_id, Utc::now()).await
            }
            WithdrawStatus::Pending => Err(EconomyError::InvalidState(
                "Cannot move a request back to pending".to_string(),
            )),
        };

        Ok(ledger::finish(uow, result).await?)
    }

    async fn update_config(&self, update: ConfigUpdate) -> Result<(ConfigKey, i64), ServiceError> {
        let mut uow = self.store.begin().await.map_err(EconomyError::Storage)?;
        let result = economy::update(uow.as_mut(), update.key.as_deref(), update.value).await;

        Ok(ledger::finish(uow, result).await?)
    }

    async fn list_withdrawals(
        &self,
        status: WithdrawStatus,
    ) -> Result<Vec<WithdrawRequest>, ServiceError> {
        let mut uow = self.store.begin().await.map_err(EconomyError::Storage)?;
        let result = withdrawals::by_status(uow.as_mut(), status).await;

        Ok(ledger::finish(uow, result).await?)
    }

    async fn reconcile(&self, user_id: UserId) -> Result<Reconciliation, ServiceError> {
        let mut uow = self.store.begin().await.map_err(EconomyError::Storage)?;
        let result = engine::reconcile(uow.as_mut(), user_id).await;
        let report = ledger::finish(uow, result).await?;

        if !report.is_balanced() {
            log::error!("Ledger out of balance for user {}: {:?}", user_id, report);
        }

        Ok(report)
    }
}

#[async_trait]
impl RequestHandler<AdminRequest> for AdminRequestHandler {
    async fn handle_request(&self, request: AdminRequest) {
        match request {
            AdminRequest::ApproveWithdrawal {
                request_id,
                response,
            } => {
                let result = self.decide(&request_id, WithdrawStatus::Approved).await;
                let _ = response.send(result);
            }
            AdminRequest::RejectWithdrawal {
                request_id,
                response,
            } => {
                let result = self.decide(&request_id, WithdrawStatus::Rejected).await;
                let _ = response.send(result);
            }
            AdminRequest::UpdateConfig { update, response } => {
                let result = self.update_config(update).await;
                let _ = response.send(result);
            }
            AdminRequest::ListWithdrawals { status, response } => {
                let result = self.list_withdrawals(status).await;
                let _ = response.send(result);
            }
            AdminRequest::Reconcile { user_id, response } => {
                let result = self.reconcile(user_id).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct AdminService;

impl AdminService {
    pub fn new() -> Self {
        AdminService {}
    }
}

#[async_trait]
impl Service<AdminRequest, AdminRequestHandler> for AdminService {}
