use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::{
    ledger::{self, accounts, EconomyError},
    models::{
        ledger::LedgerEntry,
        referrals::ReferralLog,
        users::{Registered, Registration, ReferredUser, UserId, UserProfile},
    },
    repositories::Store,
};

const MAX_USERNAME_LEN: usize = 64;

pub enum UserRequest {
    Register {
        user_id: UserId,
        registration: Registration,
        response: oneshot::Sender<Result<Registered, ServiceError>>,
    },
    GetProfile {
        user_id: UserId,
        response: oneshot::Sender<Result<UserProfile, ServiceError>>,
    },
    GetReferrals {
        user_id: UserId,
        response: oneshot::Sender<Result<Vec<ReferredUser>, ServiceError>>,
    },
    GetReferralHistory {
        user_id: UserId,
        response: oneshot::Sender<Result<Vec<ReferralLog>, ServiceError>>,
    },
    GetLedger {
        user_id: UserId,
        limit: i64,
        response: oneshot::Sender<Result<Vec<LedgerEntry>, ServiceError>>,
    },
    IsAdmin {
        user_id: UserId,
        response: oneshot::Sender<Result<bool, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct UserRequestHandler {
    store: Arc<dyn Store>,
}

impl UserRequestHandler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        UserRequestHandler { store }
    }

    async fn register(
        &self,
        user_id: UserId,
        registration: Registration,
    ) -> Result<Registered, ServiceError> {
        let username = match registration.username.as_deref().map(str::trim) {
            Some(name) if name.chars().count() > MAX_USERNAME_LEN => {
                return Err(EconomyError::Validation("Username too long".to_string()).into())
            }
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("user{}", user_id),
        };

        let mut uow = self.store.begin().await.map_err(EconomyError::Storage)?;
        let result = accounts::register(
            uow.as_mut(),
            user_id,
            &username,
            registration.referrer_id,
            Utc::now(),
        )
        .await;

        Ok(ledger::finish(uow, result).await?)
    }

    async fn profile(&self, user_id: UserId) -> Result<UserProfile, ServiceError> {
        let mut uow = self.store.begin().await.map_err(EconomyError::Storage)?;
        let result = accounts::profile(uow.as_mut(), user_id, Utc::now()).await;

        Ok(ledger::finish(uow, result).await?)
    }

    async fn referrals(&self, user_id: UserId) -> Result<Vec<ReferredUser>, ServiceError> {
        let mut uow = self.store.begin().await.map_err(EconomyError::Storage)?;
        let result = accounts::referred_users(uow.as_mut(), user_id).await;

        Ok(ledger::finish(uow, result).await?)
    }

    async fn referral_history(&self, user_id: UserId) -> Result<Vec<ReferralLog>, ServiceError> {
        let mut uow = self.store.begin().await.map_err(EconomyError::Storage)?;
        let result = accounts::referral_history(uow.as_mut(), user_id).await;

        Ok(ledger::finish(uow, result).await?)
    }

    async fn ledger(&self, user_id: UserId, limit: i64) -> Result<Vec<LedgerEntry>, ServiceError> {
        let mut uow = self.store.begin().await.map_err(EconomyError::Storage)?;
        let result = accounts::ledger_history(uow.as_mut(), user_id, limit).await;

        Ok(ledger::finish(uow, result).await?)
    }

    async fn is_admin(&self, user_id: UserId) -> Result<bool, ServiceError> {
        let mut uow = self.store.begin().await.map_err(EconomyError::Storage)?;
        let result = uow
            .is_admin(user_id)
            .await
            .map_err(EconomyError::Storage);

        Ok(ledger::finish(uow, result).await?)
    }
}

#[async_trait]
impl RequestHandler<UserRequest> for UserRequestHandler {
    async fn handle_request(&self, request: UserRequest) {
        match request {
            UserRequest::Register {
                user_id,
                registration,
                response,
            } => {
                let registered = self.register(user_id, registration).await;
                let _ = response.send(registered);
            }
            UserRequest::GetProfile { user_id, response } => {
                let profile = self.profile(user_id).await;
                let _ = response.send(profile);
            }
            UserRequest::GetReferrals { user_id, response } => {
                let referrals = self.referrals(user_id).await;
                let _ = response.send(referrals);
            }
            UserRequest::GetReferralHistory { user_id, response } => {
                let history = self.referral_history(user_id).await;
                let _ = response.send(history);
            }
            UserRequest::GetLedger {
                user_id,
                limit,
                response,
            } => {
                let entries = self.ledger(user_id, limit).await;
                let _ = response.send(entries);
            }
            UserRequest::IsAdmin { user_id, response } => {
                let result = self.is_admin(user_id).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        UserService {}
    }
}

#[async_trait]
impl Service<UserRequest, UserRequestHandler> for UserService {}
