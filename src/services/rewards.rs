use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rand::{rngs::StdRng, SeedableRng};
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::{
    ledger::{
        self,
        quota::QuotaPolicies,
        rate_limit::TapRateLimiter,
        rewards::{self, RewardAction, RewardOutcome},
        EconomyError,
    },
    models::users::UserId,
    repositories::Store,
};

pub enum RewardRequest {
    Claim {
        user_id: UserId,
        action: RewardAction,
        response: oneshot::Sender<Result<RewardOutcome, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct RewardRequestHandler {
    store: Arc<dyn Store>,
    policies: Arc<QuotaPolicies>,
    limiter: TapRateLimiter,
}

impl RewardRequestHandler {
    pub fn new(store: Arc<dyn Store>, policies: QuotaPolicies, limiter: TapRateLimiter) -> Self {
        RewardRequestHandler {
            store,
            policies: Arc::new(policies),
            limiter,
        }
    }

    async fn claim(
        &self,
        user_id: UserId,
        action: RewardAction,
    ) -> Result<RewardOutcome, ServiceError> {
        // Throttle before the durable claim; a failed claim keeps its slot.
        if action == RewardAction::Tap {
            self.limiter.check(user_id)?;
        }

        let mut rng = StdRng::from_entropy();
        let mut uow = self.store.begin().await.map_err(EconomyError::Storage)?;
        let result = rewards::claim(
            uow.as_mut(),
            user_id,
            action,
            &self.policies,
            &mut rng,
            Utc::now(),
        )
        .await;

        Ok(ledger::finish(uow, result).await?)
    }
}

#[async_trait]
impl RequestHandler<RewardRequest> for RewardRequestHandler {
    async fn handle_request(&self, request: RewardRequest) {
        match request {
            RewardRequest::Claim {
                user_id,
                action,
                response,
            } => {
                let outcome = self.claim(user_id, action).await;
                let _ = response.send(outcome);
            }
        }
    }
}

pub struct RewardService;

impl RewardService {
    pub fn new() -> Self {
        RewardService {}
    }
}

#[async_trait]
impl Service<RewardRequest, RewardRequestHandler> for RewardService {}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::repositories::memory::MemoryStore;

    #[tokio::test]
    async fn test_failed_tap_claim_still_uses_throttle_slot() {
        let limiter = TapRateLimiter::new(
            Duration::ZERO,
            2,
            Duration::from_secs(60),
            Duration::from_secs(600),
        );
        let handler = RewardRequestHandler::new(
            Arc::new(MemoryStore::with_default_config()),
            QuotaPolicies::default(),
            limiter,
        );

        for _ in 0..2 {
            let result = handler.claim(5, RewardAction::Tap).await;
            assert!(matches!(
                result,
                Err(ServiceError::Economy(EconomyError::NotFound(_)))
            ));
        }

        let result = handler.claim(5, RewardAction::Tap).await;
        assert!(matches!(
            result,
            Err(ServiceError::Economy(EconomyError::RateLimited(_)))
        ));
    }
}
