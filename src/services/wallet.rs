use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::{
    ledger::{
        self, conversion,
        withdrawals::{self, WithdrawalForm},
        EconomyError,
    },
    models::{
        users::UserId,
        withdrawals::{Conversion, WithdrawRequest},
    },
    repositories::Store,
};

pub enum WalletRequest {
    Withdraw {
        user_id: UserId,
        form: WithdrawalForm,
        response: oneshot::Sender<Result<WithdrawRequest, ServiceError>>,
    },
    ListWithdrawals {
        user_id: UserId,
        response: oneshot::Sender<Result<Vec<WithdrawRequest>, ServiceError>>,
    },
    Convert {
        user_id: UserId,
        cash_amount: Option<i64>,
        response: oneshot::Sender<Result<Conversion, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct WalletRequestHandler {
    store: Arc<dyn Store>,
}

impl WalletRequestHandler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        WalletRequestHandler { store }
    }

    async fn withdraw(
        &self,
        user_id: UserId,
        form: WithdrawalForm,
    ) -> Result<WithdrawRequest, ServiceError> {
        let mut uow = self.store.begin().await.map_err(EconomyError::Storage)?;
        let result = withdrawals::create(uow.as_mut(), user_id, form, Utc::now()).await;

        Ok(ledger::finish(uow, result).await?)
    }

    async fn list_withdrawals(&self, user_id: UserId) -> Result<Vec<WithdrawRequest>, ServiceError> {
        let mut uow = self.store.begin().await.map_err(EconomyError::Storage)?;
        let result = withdrawals::for_user(uow.as_mut(), user_id).await;

        Ok(ledger::finish(uow, result).await?)
    }

    async fn convert(
        &self,
        user_id: UserId,
        cash_amount: Option<i64>,
    ) -> Result<Conversion, ServiceError> {
        let mut uow = self.store.begin().await.map_err(EconomyError::Storage)?;
        let result = conversion::convert(uow.as_mut(), user_id, cash_amount).await;

        Ok(ledger::finish(uow, result).await?)
    }
}

#[async_trait]
impl RequestHandler<WalletRequest> for WalletRequestHandler {
    async fn handle_request(&self, request: WalletRequest) {
        match request {
            WalletRequest::Withdraw {
                user_id,
                form,
                response,
            } => {
                let request = self.withdraw(user_id, form).await;
                let _ = response.send(request);
            }
            WalletRequest::ListWithdrawals { user_id, response } => {
                let requests = self.list_withdrawals(user_id).await;
                let _ = response.send(requests);
            }
            WalletRequest::Convert {
                user_id,
                cash_amount,
                response,
            } => {
                let conversion = self.convert(user_id, cash_amount).await;
                let _ = response.send(conversion);
            }
        }
    }
}

pub struct WalletService;

impl WalletService {
    pub fn new() -> Self {
        WalletService {}
    }
}

#[async_trait]
impl Service<WalletRequest, WalletRequestHandler> for WalletService {}
